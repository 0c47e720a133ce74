//! Controller error types.

use thiserror::Error;

use crate::cert::CertError;
use crate::engine::CoreError;
use crate::iprecorder::RecorderError;
use crate::limiter::LimiterError;
use crate::panel::PanelError;

/// Startup failure, one variant per pipeline step.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("controller {0} already started")]
    AlreadyStarted(String),

    #[error("get node info error: {0}")]
    GetNodeInfo(#[source] PanelError),

    #[error("get user list error: {0}")]
    GetUserList(#[source] PanelError),

    /// Policy violation: the panel answered but the node has no users.
    #[error("no users: panel returned an empty user list")]
    NoUsers,

    #[error("update rule error: {0}")]
    UpdateRule(#[source] LimiterError),

    #[error("request cert error: {0}")]
    RequestCert(#[source] CertError),

    #[error("add new node error: {0}")]
    AddNode(#[source] CoreError),

    #[error("add users error: {0}")]
    AddUsers(#[source] CoreError),
}

impl ControllerError {
    /// Name of the startup step that failed.
    pub fn step(&self) -> &'static str {
        match self {
            ControllerError::AlreadyStarted(_) => "already_started",
            ControllerError::GetNodeInfo(_) => "get_node_info",
            ControllerError::GetUserList(_) => "get_user_list",
            ControllerError::NoUsers => "no_users",
            ControllerError::UpdateRule(_) => "update_rule",
            ControllerError::RequestCert(_) => "request_cert",
            ControllerError::AddNode(_) => "add_node",
            ControllerError::AddUsers(_) => "add_users",
        }
    }

    /// True for policy failures as opposed to collaborator errors.
    pub fn is_policy(&self) -> bool {
        matches!(self, ControllerError::NoUsers)
    }
}

/// Failure of a single background job run.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Panel(#[from] PanelError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Limiter(#[from] LimiterError),

    #[error(transparent)]
    Cert(#[from] CertError),

    #[error(transparent)]
    Recorder(#[from] RecorderError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_context_in_message() {
        let err = ControllerError::AddNode(CoreError::NodeExists("t".into()));
        assert_eq!(err.to_string(), "add new node error: node t already exists");
        assert_eq!(err.step(), "add_node");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_no_users_is_policy() {
        assert!(ControllerError::NoUsers.is_policy());
        assert!(!ControllerError::GetUserList(PanelError::Status {
            code: 500,
            body: String::new(),
        })
        .is_policy());
    }
}
