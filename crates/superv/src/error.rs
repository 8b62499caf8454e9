//! Error taxonomy shared by every superv operation.

use superv_backends_core::BackendError;
use superv_workflow_core::{JobId, WorkflowType};

pub type SupervResult<T> = Result<T, SupervError>;

#[derive(Debug, thiserror::Error)]
pub enum SupervError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("job order for {workflow_type} is corrupt: {reason}")]
    GraphCorrupt {
        workflow_type: WorkflowType,
        reason: String,
    },

    /// A staged link write failed; nothing from the reset was committed.
    #[error("reset of the {workflow_type} job order failed at job {job_id}: {source}")]
    PartialResetFailure {
        workflow_type: WorkflowType,
        job_id: JobId,
        #[source]
        source: BackendError,
    },

    #[error("request group {0:?} already exists")]
    DuplicateRequestGroup(String),

    #[error("backend unavailable: {0}")]
    BackendUnavailable(#[from] BackendError),

    #[error("invalid workflow type: {0}")]
    InvalidWorkflowType(String),

    #[error("invalid input: {}", .0.join("; "))]
    InvalidInput(Vec<String>),

    #[error("no valid tests were found in the request")]
    NoValidTests,

    #[error("image versions are frozen")]
    ImagesFrozen,
}

impl SupervError {
    pub(crate) fn invalid_input(problem: impl Into<String>) -> Self {
        Self::InvalidInput(vec![problem.into()])
    }

    pub(crate) fn corrupt(workflow_type: WorkflowType, reason: impl Into<String>) -> Self {
        Self::GraphCorrupt {
            workflow_type,
            reason: reason.into(),
        }
    }
}
