//! Memory backend wrapper that fails selected operations on demand.

use std::collections::BTreeMap;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering},
};

use superv_backend_memory::MemoryBackend;
use superv_backends_core::{BackendError, BackendResult};
use superv_job_order_backend::{JobDefinitionBackend, JobOrderBackend, LinkWriter};
use superv_run_request_backend::{QueuedRequests, RunRequestBackend};
use superv_workflow_core::{
    CatalogKind, JobDefinitionRow, JobId, JobLinkRow, NewRunRequest, NextJob, RunId,
    RunRequestRecord, RunStatus, RunSummary, TestCase, WorkflowType,
};

#[derive(Clone, Default)]
pub struct FaultInjectingBackend {
    inner: MemoryBackend,
    /// 1-based index of the link write that fails; 0 disables the fault.
    fail_link_write_at: Arc<AtomicUsize>,
    link_write_calls: Arc<AtomicUsize>,
    fail_reads: Arc<AtomicBool>,
    fail_run_request_inserts: Arc<AtomicBool>,
    catalog_reads: Arc<AtomicUsize>,
    /// Run request inserts wait here before reaching the inner backend.
    insert_gate: Arc<Mutex<Option<Arc<tokio::sync::Barrier>>>>,
}

impl FaultInjectingBackend {
    pub fn new(inner: MemoryBackend) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    /// Fail the `k`-th link write (counted across every writer, starting at 1).
    pub fn with_link_write_failure(inner: MemoryBackend, k: usize) -> Self {
        let backend = Self::new(inner);
        backend.fail_link_write_at.store(k, AtomicOrdering::SeqCst);
        backend
    }

    pub fn with_read_failures(inner: MemoryBackend) -> Self {
        let backend = Self::new(inner);
        backend.fail_reads.store(true, AtomicOrdering::SeqCst);
        backend
    }

    pub fn with_run_request_insert_failures(inner: MemoryBackend) -> Self {
        let backend = Self::new(inner);
        backend
            .fail_run_request_inserts
            .store(true, AtomicOrdering::SeqCst);
        backend
    }

    /// Hold each run request insert until `parties` inserts are waiting.
    pub fn with_gated_run_request_inserts(inner: MemoryBackend, parties: usize) -> Self {
        let backend = Self::new(inner);
        *backend.insert_gate.lock().expect("insert gate poisoned") =
            Some(Arc::new(tokio::sync::Barrier::new(parties)));
        backend
    }

    pub fn clear_faults(&self) {
        self.fail_link_write_at.store(0, AtomicOrdering::SeqCst);
        self.fail_reads.store(false, AtomicOrdering::SeqCst);
        self.fail_run_request_inserts
            .store(false, AtomicOrdering::SeqCst);
        *self.insert_gate.lock().expect("insert gate poisoned") = None;
    }

    pub fn link_write_calls(&self) -> usize {
        self.link_write_calls.load(AtomicOrdering::SeqCst)
    }

    /// Number of test catalog reads attempted so far.
    pub fn catalog_reads(&self) -> usize {
        self.catalog_reads.load(AtomicOrdering::SeqCst)
    }

    pub fn inner(&self) -> &MemoryBackend {
        &self.inner
    }

    fn check_reads(&self) -> BackendResult<()> {
        if self.fail_reads.load(AtomicOrdering::SeqCst) {
            return Err(BackendError::Message("connection refused".to_string()));
        }
        Ok(())
    }
}

struct FaultInjectingLinkWriter {
    inner: Box<dyn LinkWriter>,
    fail_link_write_at: Arc<AtomicUsize>,
    link_write_calls: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl LinkWriter for FaultInjectingLinkWriter {
    async fn load_chain(&mut self) -> BackendResult<Vec<JobLinkRow>> {
        self.inner.load_chain().await
    }

    async fn set_next_job(&mut self, job_id: JobId, next: NextJob) -> BackendResult<()> {
        let call = self.link_write_calls.fetch_add(1, AtomicOrdering::SeqCst) + 1;
        if call == self.fail_link_write_at.load(AtomicOrdering::SeqCst) {
            return Err(BackendError::Message(format!(
                "injected failure on link write {call}"
            )));
        }
        self.inner.set_next_job(job_id, next).await
    }

    async fn commit(self: Box<Self>) -> BackendResult<()> {
        self.inner.commit().await
    }
}

#[async_trait::async_trait]
impl JobOrderBackend for FaultInjectingBackend {
    async fn get_job_chain(&self, workflow_type: WorkflowType) -> BackendResult<Vec<JobLinkRow>> {
        self.check_reads()?;
        self.inner.get_job_chain(workflow_type).await
    }

    async fn begin_link_writes(
        &self,
        workflow_type: WorkflowType,
    ) -> BackendResult<Box<dyn LinkWriter>> {
        let inner = self.inner.begin_link_writes(workflow_type).await?;
        Ok(Box::new(FaultInjectingLinkWriter {
            inner,
            fail_link_write_at: self.fail_link_write_at.clone(),
            link_write_calls: self.link_write_calls.clone(),
        }))
    }
}

#[async_trait::async_trait]
impl JobDefinitionBackend for FaultInjectingBackend {
    async fn get_job_definitions(&self) -> BackendResult<Vec<JobDefinitionRow>> {
        self.check_reads()?;
        self.inner.get_job_definitions().await
    }

    async fn update_job_image(
        &self,
        workflow_type: WorkflowType,
        job_name: &str,
        image: &str,
    ) -> BackendResult<bool> {
        self.inner
            .update_job_image(workflow_type, job_name, image)
            .await
    }
}

#[async_trait::async_trait]
impl RunRequestBackend for FaultInjectingBackend {
    async fn list_test_cases(&self) -> BackendResult<Vec<TestCase>> {
        self.catalog_reads.fetch_add(1, AtomicOrdering::SeqCst);
        self.check_reads()?;
        self.inner.list_test_cases().await
    }

    async fn list_catalog(&self, kind: CatalogKind) -> BackendResult<Vec<String>> {
        self.check_reads()?;
        self.inner.list_catalog(kind).await
    }

    async fn test_request_name_exists(&self, request_group: &str) -> BackendResult<bool> {
        self.check_reads()?;
        self.inner.test_request_name_exists(request_group).await
    }

    async fn insert_run_requests(
        &self,
        requests: &[NewRunRequest],
    ) -> BackendResult<QueuedRequests> {
        let gate = self
            .insert_gate
            .lock()
            .expect("insert gate poisoned")
            .clone();
        if let Some(gate) = gate {
            gate.wait().await;
        }
        if self.fail_run_request_inserts.load(AtomicOrdering::SeqCst) {
            return Err(BackendError::Message(
                "injected failure on run request insert".to_string(),
            ));
        }
        self.inner.insert_run_requests(requests).await
    }

    async fn list_request_groups(&self) -> BackendResult<Vec<String>> {
        self.check_reads()?;
        self.inner.list_request_groups().await
    }

    async fn get_request_group(
        &self,
        request_group: &str,
    ) -> BackendResult<Vec<RunRequestRecord>> {
        self.check_reads()?;
        self.inner.get_request_group(request_group).await
    }

    async fn set_run_status(&self, run_id: RunId, status: RunStatus) -> BackendResult<bool> {
        self.inner.set_run_status(run_id, status).await
    }

    async fn get_run_properties(
        &self,
        run_id: RunId,
    ) -> BackendResult<Option<BTreeMap<String, String>>> {
        self.check_reads()?;
        self.inner.get_run_properties(run_id).await
    }

    async fn list_runs(&self, limit: i64) -> BackendResult<Vec<RunSummary>> {
        self.check_reads()?;
        self.inner.list_runs(limit).await
    }
}

#[cfg(test)]
mod tests {
    use superv_workflow_core::{DbType, JobDefinition, RunLocation, RunRequestPayload, TestBatch};

    use super::*;

    fn seeded() -> MemoryBackend {
        let backend = MemoryBackend::new();
        for (id, name, next) in [
            (1, "staging", NextJob::Job(JobId(2))),
            (2, "database", NextJob::Job(JobId(3))),
            (3, "provider", NextJob::Complete),
        ] {
            backend.insert_job(
                WorkflowType::Core,
                JobId(id),
                name,
                next,
                JobDefinition::default(),
            );
        }
        backend
    }

    #[tokio::test]
    async fn fails_only_the_selected_link_write() {
        let backend = FaultInjectingBackend::with_link_write_failure(seeded(), 2);
        let mut writer = backend.begin_link_writes(WorkflowType::Core).await.unwrap();

        writer.set_next_job(JobId(1), NextJob::Complete).await.unwrap();
        assert!(writer.set_next_job(JobId(2), NextJob::Complete).await.is_err());
        writer.set_next_job(JobId(3), NextJob::Complete).await.unwrap();
        assert_eq!(backend.link_write_calls(), 3);
    }

    #[tokio::test]
    async fn read_failures_surface_as_backend_errors() {
        let backend = FaultInjectingBackend::with_read_failures(seeded());
        assert!(backend.get_job_chain(WorkflowType::Core).await.is_err());

        backend.clear_faults();
        assert_eq!(backend.get_job_chain(WorkflowType::Core).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn gated_inserts_wait_for_each_other() {
        let backend = FaultInjectingBackend::with_gated_run_request_inserts(seeded(), 2);
        let request = |group: &str| NewRunRequest {
            status: RunStatus::New,
            request_data: RunRequestPayload {
                workflow_type: WorkflowType::Core,
                db_image: "postgres:14.11".to_string(),
                db_type: DbType::Postgres,
                os_image: "ubuntu-20.04:latest".to_string(),
                package_dir: String::new(),
                tests: TestBatch::new(RunLocation::Consumer, vec!["t1".to_string()]),
            },
            request_group: group.to_string(),
        };
        let (first, second) = (request("a"), request("b"));

        let (a, b) = tokio::join!(
            backend.insert_run_requests(std::slice::from_ref(&first)),
            backend.insert_run_requests(std::slice::from_ref(&second)),
        );
        assert!(matches!(a.unwrap(), QueuedRequests::Inserted(_)));
        assert!(matches!(b.unwrap(), QueuedRequests::Inserted(_)));
        assert_eq!(backend.inner().run_requests().len(), 2);
    }
}
