//! In-memory backend for tests and local runs.

#[cfg(feature = "job-order-backend")]
mod job_order_backend;

#[cfg(feature = "run-request-backend")]
mod run_request_backend;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use superv_workflow_core::{
    CatalogKind, JobDefinition, JobId, NextJob, RunId, RunRequestRecord, TestCase, WorkflowType,
};

#[derive(Clone, Debug)]
struct JobRecord {
    job_name: String,
    next: NextJob,
    definition: JobDefinition,
}

#[derive(Clone, Debug)]
struct RunRecord {
    request_group: Option<String>,
    properties: BTreeMap<String, String>,
    created_at: DateTime<Utc>,
}

type WorkflowJobs = BTreeMap<JobId, JobRecord>;
type JobStore = HashMap<WorkflowType, WorkflowJobs>;
type LinkLocks = HashMap<WorkflowType, Arc<tokio::sync::Mutex<()>>>;

/// Backend that keeps every table in process memory.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    jobs: Arc<Mutex<JobStore>>,
    test_cases: Arc<Mutex<Vec<TestCase>>>,
    catalogs: Arc<Mutex<BTreeMap<CatalogKind, BTreeSet<String>>>>,
    run_requests: Arc<Mutex<Vec<RunRequestRecord>>>,
    runs: Arc<Mutex<BTreeMap<RunId, RunRecord>>>,
    link_commits: Arc<AtomicUsize>,
    /// Held by an open link writer until it commits or drops.
    link_locks: Arc<Mutex<LinkLocks>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or overwrite one job step.
    pub fn insert_job(
        &self,
        workflow_type: WorkflowType,
        job_id: JobId,
        job_name: impl Into<String>,
        next: NextJob,
        definition: JobDefinition,
    ) {
        let mut guard = self.jobs.lock().expect("jobs poisoned");
        guard.entry(workflow_type).or_default().insert(
            job_id,
            JobRecord {
                job_name: job_name.into(),
                next,
                definition,
            },
        );
    }

    pub fn insert_test_case(&self, test_case: TestCase) {
        let mut guard = self.test_cases.lock().expect("test cases poisoned");
        guard.retain(|existing| existing.label != test_case.label);
        guard.push(test_case);
    }

    pub fn insert_catalog_entry(&self, kind: CatalogKind, name: impl Into<String>) {
        let mut guard = self.catalogs.lock().expect("catalogs poisoned");
        guard.entry(kind).or_default().insert(name.into());
    }

    /// Seed a run with its initial properties.
    pub fn insert_run(
        &self,
        run_id: RunId,
        request_group: Option<&str>,
        properties: BTreeMap<String, String>,
    ) {
        let mut guard = self.runs.lock().expect("runs poisoned");
        guard.insert(
            run_id,
            RunRecord {
                request_group: request_group.map(str::to_string),
                properties,
                created_at: Utc::now(),
            },
        );
    }

    pub fn run_requests(&self) -> Vec<RunRequestRecord> {
        self.run_requests
            .lock()
            .expect("run requests poisoned")
            .clone()
    }

    /// Number of link transactions committed so far.
    pub fn link_commits(&self) -> usize {
        self.link_commits.load(AtomicOrdering::SeqCst)
    }
}
