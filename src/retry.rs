//! Shared backoff/jitter and transient-error classification, used
//! identically by the vector store's retry loop and the Semantic-Runner's
//! per-seed retry loop.

use rand::Rng;
use std::time::Duration;

/// The exact keyword set the original system checks for on a vector-store
/// error message to decide whether a retry is worthwhile.
const TRANSIENT_KEYWORDS: [&str; 4] = ["timeout", "gateway", "502", "temporarily unavailable"];

pub fn is_transient_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    TRANSIENT_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// `750ms * 2^(attempt-1)`, capped at 6s, plus up to 350ms of jitter.
/// `attempt` is 1-indexed (the first retry is attempt 1).
pub fn backoff_delay(attempt: u32) -> Duration {
    let base_ms: u64 = 750u64.saturating_mul(1u64 << attempt.saturating_sub(1).min(16));
    let capped_ms = base_ms.min(6_000);
    let jitter_ms: u64 = rand::thread_rng().gen_range(0..=350);
    Duration::from_millis(capped_ms + jitter_ms)
}

/// Sleep for the backoff duration of the given attempt.
pub async fn sleep_backoff(attempt: u32) {
    tokio::time::sleep(backoff_delay(attempt)).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_transient_keywords() {
        assert!(is_transient_message("upstream gateway timeout"));
        assert!(is_transient_message("HTTP 502 Bad Gateway"));
        assert!(is_transient_message("service temporarily unavailable"));
        assert!(!is_transient_message("invalid argument: bad dimension"));
    }

    #[test]
    fn backoff_grows_and_caps() {
        let d1 = backoff_delay(1);
        let d4 = backoff_delay(4);
        let d10 = backoff_delay(10);
        assert!(d1.as_millis() >= 750 && d1.as_millis() <= 1100);
        assert!(d4.as_millis() >= 6_000 - 1 || d4.as_millis() >= 750 * 8);
        assert!(d10.as_millis() <= 6_350);
    }
}
