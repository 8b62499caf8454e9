//! Per-workflow job chains: lookup, single-link edits and reset to default.
//!
//! Chains are loaded into an arena keyed by [`JobId`] and walked from the
//! head named by the [`WorkflowRegistry`]. Every edit runs inside one backend
//! [`LinkWriter`]; returning early drops the writer, which discards whatever
//! was staged.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use superv_job_order_backend::{JobOrderBackend, LinkWriter};
use superv_observability_macros::obs;
use superv_workflow_core::{JobId, JobLinkRow, NextJob, WorkflowType};
use tracing::{debug, info, warn};

use crate::error::{SupervError, SupervResult};
use crate::registry::{DefaultTopology, WorkflowRegistry};

/// One step of a workflow's job chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobStep {
    pub job_id: JobId,
    pub job_name: String,
    #[serde(rename = "next_job_id")]
    pub next: NextJob,
}

impl From<JobLinkRow> for JobStep {
    fn from(row: JobLinkRow) -> Self {
        Self {
            job_id: row.job_id,
            job_name: row.job_name,
            next: row.next,
        }
    }
}

struct ChainArena {
    steps: BTreeMap<JobId, JobStep>,
}

impl ChainArena {
    fn from_rows(rows: Vec<JobLinkRow>) -> Self {
        let steps = rows
            .into_iter()
            .map(|row| (row.job_id, JobStep::from(row)))
            .collect();
        Self { steps }
    }

    fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    fn find_by_name(&self, job_name: &str) -> Option<&JobStep> {
        self.steps
            .values()
            .find(|step| step.job_name.eq_ignore_ascii_case(job_name))
    }

    fn contains(&self, job_id: JobId) -> bool {
        self.steps.contains_key(&job_id)
    }

    fn set_next(&mut self, job_id: JobId, next: NextJob) {
        if let Some(step) = self.steps.get_mut(&job_id) {
            step.next = next;
        }
    }

    /// Follow `next` from `first` to COMPLETE. More hops than distinct ids
    /// means the chain loops.
    fn walk(&self, first: JobId) -> Result<Vec<JobStep>, String> {
        let mut order = Vec::with_capacity(self.steps.len());
        let mut cursor = NextJob::Job(first);
        while let NextJob::Job(job_id) = cursor {
            if order.len() == self.steps.len() {
                return Err(format!(
                    "no COMPLETE after {} hops from job {first}",
                    order.len()
                ));
            }
            let Some(step) = self.steps.get(&job_id) else {
                return Err(match order.last() {
                    Some(JobStep { job_name, .. }) => {
                        format!("job {job_name} points at missing job {job_id}")
                    }
                    None => format!("first job {job_id} is missing"),
                });
            };
            order.push(step.clone());
            cursor = step.next;
        }
        Ok(order)
    }

    /// Whether following links from `start` comes back around instead of ending.
    fn loops_from(&self, start: JobId) -> bool {
        let mut cursor = NextJob::Job(start);
        for _ in 0..=self.steps.len() {
            match cursor {
                NextJob::Complete => return false,
                NextJob::Job(job_id) => match self.steps.get(&job_id) {
                    Some(step) => cursor = step.next,
                    None => return false,
                },
            }
        }
        true
    }
}

/// The writes that restore one workflow's default chain, in table order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkPlan {
    workflow_type: WorkflowType,
    links: Vec<(JobId, NextJob)>,
}

impl LinkPlan {
    pub fn from_topology(topology: &DefaultTopology) -> Self {
        Self {
            workflow_type: topology.workflow_type(),
            links: topology
                .links()
                .iter()
                .map(|link| (link.job_id(), link.next))
                .collect(),
        }
    }

    pub fn links(&self) -> &[(JobId, NextJob)] {
        &self.links
    }

    /// Stage every link on `writer`, stopping at the first failed write.
    pub async fn apply(&self, writer: &mut dyn LinkWriter) -> SupervResult<()> {
        for (job_id, next) in &self.links {
            if let Err(source) = writer.set_next_job(*job_id, *next).await {
                warn!(
                    workflow_type = %self.workflow_type,
                    job_id = %job_id,
                    error = %source,
                    "default link write failed; abandoning reset"
                );
                return Err(SupervError::PartialResetFailure {
                    workflow_type: self.workflow_type,
                    job_id: *job_id,
                    source,
                });
            }
        }
        Ok(())
    }
}

pub struct JobOrderGraph<B> {
    backend: B,
    registry: Arc<WorkflowRegistry>,
}

impl<B> JobOrderGraph<B>
where
    B: JobOrderBackend,
{
    pub fn new(backend: B, registry: Arc<WorkflowRegistry>) -> Self {
        Self { backend, registry }
    }

    pub fn registry(&self) -> &WorkflowRegistry {
        &self.registry
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Steps in execution order, from the workflow's first job to COMPLETE.
    #[obs]
    pub async fn get_order(&self, workflow_type: WorkflowType) -> SupervResult<Vec<JobStep>> {
        let first = self.registry.first_job(workflow_type)?;
        let arena = ChainArena::from_rows(self.backend.get_job_chain(workflow_type).await?);
        if arena.is_empty() {
            return Err(SupervError::NotFound(format!(
                "no job order stored for {workflow_type}"
            )));
        }
        let order = arena
            .walk(first)
            .map_err(|reason| SupervError::corrupt(workflow_type, reason))?;
        debug!(workflow_type = %workflow_type, steps = order.len(), "loaded job order");
        Ok(order)
    }

    /// Point `job_name` at `next`. Rejects edits that would loop the chain.
    #[obs]
    pub async fn update_link(
        &self,
        workflow_type: WorkflowType,
        job_name: &str,
        next: NextJob,
    ) -> SupervResult<()> {
        let mut writer = self.backend.begin_link_writes(workflow_type).await?;
        let mut arena = ChainArena::from_rows(writer.load_chain().await?);
        if arena.is_empty() {
            return Err(SupervError::NotFound(format!(
                "no job order stored for {workflow_type}"
            )));
        }

        let job_id = arena
            .find_by_name(job_name)
            .map(|step| step.job_id)
            .ok_or_else(|| {
                SupervError::NotFound(format!("job {job_name:?} is not part of {workflow_type}"))
            })?;

        if let NextJob::Job(next_id) = next {
            if next_id == job_id {
                return Err(SupervError::InvalidTransition(format!(
                    "job {job_name:?} cannot be its own next job"
                )));
            }
            if !arena.contains(next_id) {
                return Err(SupervError::NotFound(format!(
                    "next job {next_id} is not part of {workflow_type}"
                )));
            }
        }

        arena.set_next(job_id, next);
        if arena.loops_from(job_id) {
            return Err(SupervError::InvalidTransition(format!(
                "pointing {job_name:?} at {next} would create a cycle in {workflow_type}"
            )));
        }

        writer.set_next_job(job_id, next).await?;
        writer.commit().await?;
        info!(
            workflow_type = %workflow_type,
            job_name,
            next = %next,
            "updated job link"
        );
        Ok(())
    }

    /// Restore the registry's default chain. All links land or none do.
    #[obs]
    pub async fn reset_to_default(&self, workflow_type: WorkflowType) -> SupervResult<()> {
        let plan = LinkPlan::from_topology(self.registry.topology(workflow_type)?);
        let mut writer = self.backend.begin_link_writes(workflow_type).await?;
        plan.apply(writer.as_mut()).await?;
        writer.commit().await?;
        info!(
            workflow_type = %workflow_type,
            links = plan.links().len(),
            "job order reset to default"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use superv_backend_memory::MemoryBackend;
    use superv_workflow_core::{JobDefinition, JobType};

    use super::*;
    use crate::test_support::seeded_graph;

    fn staging() -> JobId {
        JobType::Staging.id()
    }

    fn names(order: &[JobStep]) -> Vec<&str> {
        order.iter().map(|step| step.job_name.as_str()).collect()
    }

    #[tokio::test]
    async fn get_order_follows_links_from_the_first_job() {
        let graph = seeded_graph();
        let order = graph.get_order(WorkflowType::Ecflow).await.unwrap();
        assert_eq!(
            names(&order),
            vec!["staging", "obs-mod", "load-geo-server", "final-staging"]
        );
        assert_eq!(order.last().map(|step| step.next), Some(NextJob::Complete));
    }

    #[tokio::test]
    async fn get_order_without_rows_is_not_found() {
        let registry = Arc::new(WorkflowRegistry::builtin().unwrap());
        let graph = JobOrderGraph::new(MemoryBackend::new(), registry);
        let err = graph.get_order(WorkflowType::Core).await.unwrap_err();
        assert!(matches!(err, SupervError::NotFound(_)));
    }

    #[tokio::test]
    async fn get_order_reports_a_cycle_instead_of_truncating() {
        let graph = seeded_graph();
        // Bypass update_link validation to plant a loop.
        graph.backend().insert_job(
            WorkflowType::Unit,
            JobType::Provider.id(),
            "provider",
            NextJob::from(JobType::Database),
            JobDefinition::default(),
        );
        let err = graph.get_order(WorkflowType::Unit).await.unwrap_err();
        assert!(matches!(
            err,
            SupervError::GraphCorrupt {
                workflow_type: WorkflowType::Unit,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn get_order_reports_dangling_links() {
        let graph = seeded_graph();
        graph.backend().insert_job(
            WorkflowType::Hecras,
            JobType::Geotiff2Cog.id(),
            "geotiff2cog",
            NextJob::Job(JobId(77)),
            JobDefinition::default(),
        );
        let err = graph.get_order(WorkflowType::Hecras).await.unwrap_err();
        assert!(err.to_string().contains("points at missing job 77"));
    }

    #[tokio::test]
    async fn update_link_skips_a_step() {
        let graph = seeded_graph();
        graph
            .update_link(WorkflowType::Ecflow, "obs-mod", NextJob::from(JobType::FinalStaging))
            .await
            .unwrap();
        let order = graph.get_order(WorkflowType::Ecflow).await.unwrap();
        assert_eq!(names(&order), vec!["staging", "obs-mod", "final-staging"]);
    }

    #[tokio::test]
    async fn update_link_to_complete_ends_the_chain() {
        let graph = seeded_graph();
        graph
            .update_link(WorkflowType::Core, "staging", NextJob::Complete)
            .await
            .unwrap();
        let order = graph.get_order(WorkflowType::Core).await.unwrap();
        assert_eq!(names(&order), vec!["staging"]);
    }

    #[tokio::test]
    async fn update_link_rejects_self_reference() {
        let graph = seeded_graph();
        let before = graph.get_order(WorkflowType::Core).await.unwrap();
        let err = graph
            .update_link(WorkflowType::Core, "staging", NextJob::Job(staging()))
            .await
            .unwrap_err();
        assert!(matches!(err, SupervError::InvalidTransition(_)));
        assert_eq!(graph.get_order(WorkflowType::Core).await.unwrap(), before);
        assert_eq!(graph.backend().link_commits(), 0);
    }

    #[tokio::test]
    async fn update_link_rejects_longer_cycles() {
        let graph = seeded_graph();
        let err = graph
            .update_link(WorkflowType::Core, "provider", NextJob::from(JobType::Database))
            .await
            .unwrap_err();
        assert!(matches!(err, SupervError::InvalidTransition(_)));
        assert!(err.to_string().contains("cycle"));
    }

    #[tokio::test]
    async fn update_link_unknown_names_are_not_found() {
        let graph = seeded_graph();
        let err = graph
            .update_link(WorkflowType::Asgs, "consumer", NextJob::Complete)
            .await
            .unwrap_err();
        assert!(matches!(err, SupervError::NotFound(_)));

        let err = graph
            .update_link(WorkflowType::Asgs, "staging", NextJob::from(JobType::Database))
            .await
            .unwrap_err();
        assert!(matches!(err, SupervError::NotFound(_)));
    }

    #[tokio::test]
    async fn reset_restores_default_after_edits() {
        let graph = seeded_graph();
        graph
            .update_link(WorkflowType::Asgs, "staging", NextJob::from(JobType::LoadGeoServer))
            .await
            .unwrap();
        graph.reset_to_default(WorkflowType::Asgs).await.unwrap();

        let expected: Vec<&str> = graph
            .registry()
            .topology(WorkflowType::Asgs)
            .unwrap()
            .job_order()
            .into_iter()
            .map(JobType::as_str)
            .collect();
        let order = graph.get_order(WorkflowType::Asgs).await.unwrap();
        assert_eq!(names(&order), expected);
    }

    #[test]
    fn link_plan_mirrors_topology_order() {
        let registry = WorkflowRegistry::builtin().unwrap();
        let plan = LinkPlan::from_topology(registry.topology(WorkflowType::Unit).unwrap());
        assert_eq!(
            plan.links(),
            &[
                (JobType::Staging.id(), NextJob::from(JobType::Database)),
                (JobType::Database.id(), NextJob::from(JobType::Provider)),
                (JobType::Provider.id(), NextJob::from(JobType::FinalStaging)),
                (JobType::FinalStaging.id(), NextJob::Complete),
            ]
        );
    }
}
