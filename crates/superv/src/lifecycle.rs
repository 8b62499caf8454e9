//! Run request submission and run status tracking.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use superv_observability_macros::obs;
use superv_run_request_backend::{QueuedRequests, RunRequestBackend};
use superv_workflow_core::{
    CatalogKind, DbType, NewRunRequest, RunId, RunRequestPayload, RunRequestRecord, RunStatus, RunSummary,
    TestBatch, WorkflowType,
};
use tracing::{info, warn};

use crate::batcher::RequestBatcher;
use crate::error::{SupervError, SupervResult};

pub const DEFAULT_OS_IMAGE: &str = "ubuntu-20.04:latest";
pub const DEFAULT_DB_IMAGE: &str = "postgres:14.11";
pub const DEFAULT_RUN_LIMIT: i64 = 100;

/// A request to run `tests` on `run_location`, queued under `request_group`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub workflow_type: WorkflowType,
    pub run_status: RunStatus,
    pub db_type: DbType,
    pub package_dir: String,
    pub os_image: String,
    pub db_image: String,
    pub run_location: String,
    pub tests: Vec<String>,
    pub request_group: String,
}

impl Submission {
    pub fn new(
        workflow_type: WorkflowType,
        run_location: impl Into<String>,
        tests: Vec<String>,
        request_group: impl Into<String>,
    ) -> Self {
        Self {
            workflow_type,
            run_status: RunStatus::New,
            db_type: DbType::default(),
            package_dir: String::new(),
            os_image: DEFAULT_OS_IMAGE.to_string(),
            db_image: DEFAULT_DB_IMAGE.to_string(),
            run_location: run_location.into(),
            tests,
            request_group: request_group.into(),
        }
    }

    fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.tests.iter().all(|test| test.trim().is_empty()) {
            problems.push("no tests were requested".to_string());
        }
        if self.request_group.trim().is_empty() {
            problems.push("request group name is empty".to_string());
        }
        if !self.package_dir.is_empty() && !Path::new(&self.package_dir).exists() {
            problems.push(format!("package directory {} does not exist", self.package_dir));
        }
        problems
    }

    fn payload(&self, tests: TestBatch) -> RunRequestPayload {
        RunRequestPayload {
            workflow_type: self.workflow_type,
            db_image: self.db_image.clone(),
            db_type: self.db_type,
            os_image: self.os_image.clone(),
            package_dir: self.package_dir.clone(),
            tests,
        }
    }
}

/// What a successful submission queued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionReceipt {
    pub request_group: String,
    pub request_ids: Vec<i64>,
}

pub struct RunLifecycle<B> {
    backend: B,
    batcher: RequestBatcher,
}

impl<B> RunLifecycle<B>
where
    B: RunRequestBackend,
{
    pub fn new(backend: B, batcher: RequestBatcher) -> Self {
        Self { backend, batcher }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Validate, batch and queue a submission as one run request per batch.
    ///
    /// Input problems and an already used request group are reported before
    /// any batch is computed. A used group on an otherwise valid submission
    /// is [`SupervError::DuplicateRequestGroup`]; alongside other problems it
    /// joins the [`SupervError::InvalidInput`] list. The backend checks the
    /// group again inside the insert transaction.
    #[obs]
    pub async fn submit(&self, submission: &Submission) -> SupervResult<SubmissionReceipt> {
        let mut problems = submission.problems();
        let group_taken = !submission.request_group.trim().is_empty()
            && self
                .backend
                .test_request_name_exists(&submission.request_group)
                .await?;
        if group_taken {
            if problems.is_empty() {
                return Err(SupervError::DuplicateRequestGroup(
                    submission.request_group.clone(),
                ));
            }
            problems.push(format!(
                "request group {:?} already exists",
                submission.request_group
            ));
        }
        if !problems.is_empty() {
            return Err(SupervError::InvalidInput(problems));
        }

        let batches = self
            .batcher
            .batch(&self.backend, &submission.run_location, &submission.tests)
            .await?;
        if batches.is_empty() {
            warn!(
                request_group = %submission.request_group,
                run_location = %submission.run_location,
                "submission produced no batches"
            );
            return Err(SupervError::NoValidTests);
        }

        let requests: Vec<NewRunRequest> = batches
            .into_iter()
            .map(|batch| NewRunRequest {
                status: submission.run_status,
                request_data: submission.payload(batch),
                request_group: submission.request_group.clone(),
            })
            .collect();
        let request_ids = match self.backend.insert_run_requests(&requests).await? {
            QueuedRequests::Inserted(ids) => ids,
            QueuedRequests::GroupTaken(request_group) => {
                warn!(%request_group, "request group was taken by a concurrent submission");
                return Err(SupervError::DuplicateRequestGroup(request_group));
            }
        };

        info!(
            request_group = %submission.request_group,
            workflow_type = %submission.workflow_type,
            batches = request_ids.len(),
            "queued run requests"
        );
        Ok(SubmissionReceipt {
            request_group: submission.request_group.clone(),
            request_ids,
        })
    }

    #[obs]
    pub async fn set_status(&self, run_id: RunId, status: RunStatus) -> SupervResult<()> {
        if run_id.0 <= 0 {
            return Err(SupervError::invalid_input(format!(
                "run id must be positive, got {run_id}"
            )));
        }
        if !self.backend.set_run_status(run_id, status).await? {
            return Err(SupervError::NotFound(format!("run {run_id}")));
        }
        info!(run_id = %run_id, status = %status, "run status updated");
        Ok(())
    }

    /// Run properties sorted by key.
    pub async fn get_run_props(&self, run_id: RunId) -> SupervResult<BTreeMap<String, String>> {
        self.backend
            .get_run_properties(run_id)
            .await?
            .ok_or_else(|| SupervError::NotFound(format!("run {run_id}")))
    }

    /// Names of one settings catalog, sorted.
    pub async fn catalog(&self, kind: CatalogKind) -> SupervResult<Vec<String>> {
        Ok(self.backend.list_catalog(kind).await?)
    }

    /// Request group names, most recently queued first.
    pub async fn request_groups(&self) -> SupervResult<Vec<String>> {
        Ok(self.backend.list_request_groups().await?)
    }

    pub async fn request_group_status(
        &self,
        request_group: &str,
    ) -> SupervResult<Vec<RunRequestRecord>> {
        let records = self.backend.get_request_group(request_group).await?;
        if records.is_empty() {
            return Err(SupervError::NotFound(format!(
                "request group {request_group:?}"
            )));
        }
        Ok(records)
    }

    pub async fn recent_runs(&self, limit: i64) -> SupervResult<Vec<RunSummary>> {
        if limit <= 0 {
            return Err(SupervError::invalid_input(format!(
                "run limit must be positive, got {limit}"
            )));
        }
        Ok(self.backend.list_runs(limit).await?)
    }
}
