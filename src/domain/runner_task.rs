//! The Semantic-Runner's task record: state machine and ownership.

use super::{ProjectId, RunnerTaskId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerStatus {
    Pending,
    Running,
    Saturated,
    Completed,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerTask {
    pub id: RunnerTaskId,
    pub project_id: ProjectId,
    pub owner: String,
    pub status: RunnerStatus,
    pub archivos: Vec<String>,
    #[serde(default)]
    pub resumed_from: Option<RunnerTaskId>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Minimal caller identity for the ownership check carried out before a
/// runner task is read, resumed, or cancelled.
pub struct Auth {
    pub user: String,
    pub is_admin: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthorizationError {
    #[error("user '{0}' is not the owner of this task and is not an admin")]
    Forbidden(String),
}

impl RunnerTask {
    /// Only the task's owner, or an admin, may read/resume/cancel it.
    /// A task with no recorded owner (legacy or system-created) is
    /// admin-only.
    pub fn authorize(&self, auth: &Auth) -> Result<(), AuthorizationError> {
        if auth.is_admin {
            return Ok(());
        }
        if self.owner.is_empty() {
            return Err(AuthorizationError::Forbidden(auth.user.clone()));
        }
        if self.owner == auth.user {
            return Ok(());
        }
        Err(AuthorizationError::Forbidden(auth.user.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(owner: &str) -> RunnerTask {
        RunnerTask {
            id: RunnerTaskId::new(),
            project_id: ProjectId::from_string("p1"),
            owner: owner.to_string(),
            status: RunnerStatus::Pending,
            archivos: vec![],
            resumed_from: None,
            created_at: chrono::Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn owner_is_authorized() {
        let t = task("alice");
        assert!(t
            .authorize(&Auth {
                user: "alice".into(),
                is_admin: false
            })
            .is_ok());
    }

    #[test]
    fn non_owner_is_forbidden() {
        let t = task("alice");
        assert!(t
            .authorize(&Auth {
                user: "bob".into(),
                is_admin: false
            })
            .is_err());
    }

    #[test]
    fn admin_bypasses_ownership() {
        let t = task("alice");
        assert!(t
            .authorize(&Auth {
                user: "bob".into(),
                is_admin: true
            })
            .is_ok());
    }

    #[test]
    fn ownerless_task_is_admin_only() {
        let t = task("");
        assert!(t
            .authorize(&Auth {
                user: "anyone".into(),
                is_admin: false
            })
            .is_err());
    }
}
