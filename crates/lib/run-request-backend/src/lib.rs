//! Backend capability for the test catalog, run requests and run status.

use std::collections::BTreeMap;

pub use superv_backends_core::{BackendError, BackendResult};
use superv_workflow_core::{
    CatalogKind, NewRunRequest, RunId, RunRequestRecord, RunStatus, RunSummary, TestCase,
};

/// Outcome of queuing one submission's run requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueuedRequests {
    /// Ids of the inserted requests, in input order.
    Inserted(Vec<i64>),
    /// The request group already had rows when the insert ran; nothing was written.
    GroupTaken(String),
}

#[async_trait::async_trait]
pub trait RunRequestBackend: Send + Sync {
    async fn list_test_cases(&self) -> BackendResult<Vec<TestCase>>;

    /// Names of one settings catalog, sorted.
    async fn list_catalog(&self, kind: CatalogKind) -> BackendResult<Vec<String>>;

    async fn test_request_name_exists(&self, request_group: &str) -> BackendResult<bool>;

    /// Insert all requests of one submission in a single transaction.
    ///
    /// Request group uniqueness is checked inside that transaction,
    /// serialized against concurrent inserts for the same group.
    async fn insert_run_requests(&self, requests: &[NewRunRequest])
    -> BackendResult<QueuedRequests>;

    /// Distinct request group names, most recent first.
    async fn list_request_groups(&self) -> BackendResult<Vec<String>>;

    async fn get_request_group(&self, request_group: &str)
    -> BackendResult<Vec<RunRequestRecord>>;

    /// Returns `false` when the run does not exist.
    async fn set_run_status(&self, run_id: RunId, status: RunStatus) -> BackendResult<bool>;

    async fn get_run_properties(
        &self,
        run_id: RunId,
    ) -> BackendResult<Option<BTreeMap<String, String>>>;

    /// Most recent runs first.
    async fn list_runs(&self, limit: i64) -> BackendResult<Vec<RunSummary>>;
}
