use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

use superv_job_order_backend::{
    BackendError, BackendResult, JobDefinitionBackend, JobOrderBackend, LinkWriter,
};
use superv_workflow_core::{JobDefinitionRow, JobId, JobLinkRow, NextJob, WorkflowType};
use tokio::sync::OwnedMutexGuard;

use crate::{JobStore, WorkflowJobs};

fn chain_rows(jobs: &WorkflowJobs) -> Vec<JobLinkRow> {
    jobs.iter()
        .map(|(job_id, record)| JobLinkRow {
            job_id: *job_id,
            job_name: record.job_name.clone(),
            next: record.next,
        })
        .collect()
}

#[async_trait::async_trait]
impl JobOrderBackend for crate::MemoryBackend {
    async fn get_job_chain(&self, workflow_type: WorkflowType) -> BackendResult<Vec<JobLinkRow>> {
        let guard = self.jobs.lock().expect("jobs poisoned");
        Ok(guard.get(&workflow_type).map(chain_rows).unwrap_or_default())
    }

    async fn begin_link_writes(
        &self,
        workflow_type: WorkflowType,
    ) -> BackendResult<Box<dyn LinkWriter>> {
        let lock = {
            let mut locks = self.link_locks.lock().expect("link locks poisoned");
            locks.entry(workflow_type).or_default().clone()
        };
        let workflow_lock = lock.lock_owned().await;
        Ok(Box::new(MemoryLinkWriter {
            workflow_type,
            jobs: self.jobs.clone(),
            commits: self.link_commits.clone(),
            staged: Vec::new(),
            _workflow_lock: workflow_lock,
        }))
    }
}

/// Stages link writes locally and applies them under one lock on commit.
///
/// Only one writer per workflow is open at a time.
struct MemoryLinkWriter {
    workflow_type: WorkflowType,
    jobs: Arc<Mutex<JobStore>>,
    commits: Arc<AtomicUsize>,
    staged: Vec<(JobId, NextJob)>,
    _workflow_lock: OwnedMutexGuard<()>,
}

impl MemoryLinkWriter {
    fn missing_job(&self, job_id: JobId) -> BackendError {
        BackendError::Message(format!(
            "job {job_id} not found in workflow {}",
            self.workflow_type
        ))
    }
}

#[async_trait::async_trait]
impl LinkWriter for MemoryLinkWriter {
    async fn load_chain(&mut self) -> BackendResult<Vec<JobLinkRow>> {
        let guard = self.jobs.lock().expect("jobs poisoned");
        let mut jobs = guard.get(&self.workflow_type).cloned().unwrap_or_default();
        for (job_id, next) in &self.staged {
            if let Some(record) = jobs.get_mut(job_id) {
                record.next = *next;
            }
        }
        Ok(chain_rows(&jobs))
    }

    async fn set_next_job(&mut self, job_id: JobId, next: NextJob) -> BackendResult<()> {
        let exists = {
            let guard = self.jobs.lock().expect("jobs poisoned");
            guard
                .get(&self.workflow_type)
                .is_some_and(|jobs| jobs.contains_key(&job_id))
        };
        if !exists {
            return Err(self.missing_job(job_id));
        }
        self.staged.push((job_id, next));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> BackendResult<()> {
        let mut guard = self.jobs.lock().expect("jobs poisoned");
        let Some(jobs) = guard.get_mut(&self.workflow_type) else {
            if let Some((job_id, _)) = self.staged.first() {
                return Err(self.missing_job(*job_id));
            }
            self.commits.fetch_add(1, AtomicOrdering::SeqCst);
            return Ok(());
        };
        if let Some((job_id, _)) = self
            .staged
            .iter()
            .find(|(job_id, _)| !jobs.contains_key(job_id))
        {
            return Err(self.missing_job(*job_id));
        }
        for (job_id, next) in &self.staged {
            if let Some(record) = jobs.get_mut(job_id) {
                record.next = *next;
            }
        }
        self.commits.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(())
    }
}

#[async_trait::async_trait]
impl JobDefinitionBackend for crate::MemoryBackend {
    async fn get_job_definitions(&self) -> BackendResult<Vec<JobDefinitionRow>> {
        let guard = self.jobs.lock().expect("jobs poisoned");
        let mut rows = Vec::new();
        for (workflow_type, jobs) in guard.iter() {
            for record in jobs.values() {
                rows.push(JobDefinitionRow {
                    workflow_type: *workflow_type,
                    job_name: record.job_name.clone(),
                    definition: record.definition.clone(),
                });
            }
        }
        rows.sort_by(|a, b| {
            (a.workflow_type, &a.job_name).cmp(&(b.workflow_type, &b.job_name))
        });
        Ok(rows)
    }

    async fn update_job_image(
        &self,
        workflow_type: WorkflowType,
        job_name: &str,
        image: &str,
    ) -> BackendResult<bool> {
        let mut guard = self.jobs.lock().expect("jobs poisoned");
        let record = guard
            .get_mut(&workflow_type)
            .and_then(|jobs| jobs.values_mut().find(|record| record.job_name == job_name));
        match record {
            Some(record) => {
                record.definition.image = image.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
