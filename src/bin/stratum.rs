//! Stratum CLI — local smoke-test entrypoint for the coding-discovery
//! subsystem. The production HTTP/CLI surface lives in an external
//! front-end (spec'd only by its interfaces, see `SPEC_FULL.md` §6);
//! this binary exists so the crate is runnable stand-alone against a
//! local SQLite relational store and in-memory vector/graph stores,
//! the way the teacher's own `plexus` binary wires a single subcommand
//! rather than a full server.
//!
//! Usage:
//!   stratum ingest --project P --archivo FILE.txt --file turns.txt
//!   stratum verify --project P --archivo FILE.txt --db PATH

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use stratum::domain::ProjectId;
use stratum::embedding::HashEmbedder;
use stratum::graph::InMemoryGraphStore;
use stratum::ingestion::{IngestionPipeline, SplitConfig, TranscriptDocument, Turn};
use stratum::relational::RelationalStore;
use stratum::vector::InMemoryVectorStore;

/// Exit codes named in the interface contract: batch utilities never
/// invent their own numbering.
mod exit {
    pub const OK: u8 = 0;
    pub const VERIFICATION_FAILED: u8 = 2;
    pub const SAFETY_VIOLATION: u8 = 3;
}

#[derive(Parser)]
#[command(name = "stratum", version, about = "Grounded-Theory coding-discovery engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a plain-text transcript ("speaker: text" per line) and
    /// immediately verify tri-store consistency for the resulting archivo.
    Ingest {
        #[arg(long)]
        project: String,
        #[arg(long)]
        archivo: String,
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

/// One line per turn: "speaker: text", or bare text (no speaker) when
/// there is no colon-delimited prefix.
fn parse_turns(raw: &str) -> Vec<Turn> {
    raw.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| match line.split_once(':') {
            Some((speaker, text)) if !speaker.trim().is_empty() => Turn {
                speaker: Some(speaker.trim().to_string()),
                text: text.trim().to_string(),
            },
            _ => Turn { speaker: None, text: line.trim().to_string() },
        })
        .collect()
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt().with_target(false).init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Ingest { project, archivo, file, db } => run_ingest(project, archivo, file, db).await,
    }
}

async fn run_ingest(project: String, archivo: String, file: PathBuf, db: Option<PathBuf>) -> ExitCode {
    let raw = match std::fs::read_to_string(&file) {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!("error: reading {}: {e}", file.display());
            return ExitCode::from(exit::SAFETY_VIOLATION);
        }
    };

    let relational = match db {
        Some(path) => RelationalStore::open(path),
        None => RelationalStore::open_in_memory(),
    };
    let relational = match relational {
        Ok(store) => Arc::new(store),
        Err(e) => {
            eprintln!("error: opening relational store: {e}");
            return ExitCode::from(exit::SAFETY_VIOLATION);
        }
    };

    let pipeline = IngestionPipeline::new(
        relational,
        Arc::new(InMemoryVectorStore::new()),
        Arc::new(InMemoryGraphStore::new()),
        Arc::new(HashEmbedder::new(256)),
    );

    let project_id = ProjectId::from_string(project);
    let doc = TranscriptDocument { archivo: archivo.clone(), turns: parse_turns(&raw), metadata: Default::default() };

    let summary = match pipeline.ingest_document(&project_id, &doc, &SplitConfig::default()).await {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("error: ingestion failed: {e}");
            return ExitCode::from(exit::SAFETY_VIOLATION);
        }
    };
    println!(
        "ingested {}: {} fragments ({} embedded, partial={})",
        summary.archivo, summary.fragments_created, summary.fragments_embedded, summary.partial
    );
    if summary.partial {
        if let Some(err) = &summary.error {
            eprintln!("warning: partial ingest: {err}");
        }
    }

    let report = match pipeline.verify_consistency(&project_id, &archivo).await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("error: consistency check failed: {e}");
            return ExitCode::from(exit::SAFETY_VIOLATION);
        }
    };
    println!(
        "verify {}: relational={} vector={} orphans={}",
        report.archivo, report.relational_count, report.vector_count, report.orphans_in_vector
    );
    if report.orphans_in_vector > 0 || report.relational_count != report.vector_count {
        eprintln!("verification failed: tri-store counts diverge");
        return ExitCode::from(exit::VERIFICATION_FAILED);
    }

    ExitCode::from(exit::OK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_speaker_prefixed_lines() {
        let turns = parse_turns("interviewer: Que paso?\nparticipant: Llego el pueblo entero.\n");
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].speaker.as_deref(), Some("interviewer"));
        assert_eq!(turns[1].text, "Llego el pueblo entero.");
    }

    #[test]
    fn bare_lines_have_no_speaker() {
        let turns = parse_turns("just some text with no prefix\n");
        assert_eq!(turns.len(), 1);
        assert!(turns[0].speaker.is_none());
    }

    #[test]
    fn blank_lines_are_skipped() {
        let turns = parse_turns("a: one\n\n\nb: two\n");
        assert_eq!(turns.len(), 2);
    }
}
