//! Backend capabilities for job chains and job definitions.

pub use superv_backends_core::{BackendError, BackendResult};
use superv_workflow_core::{JobDefinitionRow, JobId, JobLinkRow, NextJob, WorkflowType};

/// Backend capability for reading and rewriting a workflow's job chain.
#[async_trait::async_trait]
pub trait JobOrderBackend: Send + Sync {
    /// Every stored link of the workflow, in no particular order.
    async fn get_job_chain(&self, workflow_type: WorkflowType) -> BackendResult<Vec<JobLinkRow>>;

    /// Open a transaction for rewriting links of one workflow.
    ///
    /// Writes staged on the returned writer become visible only after
    /// [`LinkWriter::commit`]; dropping the writer discards them.
    async fn begin_link_writes(
        &self,
        workflow_type: WorkflowType,
    ) -> BackendResult<Box<dyn LinkWriter>>;
}

/// An open link-rewrite transaction scoped to one workflow.
#[async_trait::async_trait]
pub trait LinkWriter: Send {
    /// The workflow's links as seen inside this transaction, staged writes included.
    ///
    /// Implementations must keep the returned rows locked against other
    /// writers of the same workflow until commit or drop. Callers validate
    /// the whole chain from this view before staging a write, so a
    /// concurrent commit in between could store a cycle.
    async fn load_chain(&mut self) -> BackendResult<Vec<JobLinkRow>>;

    /// Stage a new `next` for one job. Fails if the job does not exist.
    async fn set_next_job(&mut self, job_id: JobId, next: NextJob) -> BackendResult<()>;

    async fn commit(self: Box<Self>) -> BackendResult<()>;
}

/// Backend capability for the per-job launch metadata.
#[async_trait::async_trait]
pub trait JobDefinitionBackend: Send + Sync {
    async fn get_job_definitions(&self) -> BackendResult<Vec<JobDefinitionRow>>;

    /// Returns `false` when no such job exists.
    async fn update_job_image(
        &self,
        workflow_type: WorkflowType,
        job_name: &str,
        image: &str,
    ) -> BackendResult<bool>;
}
