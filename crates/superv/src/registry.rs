//! Canonical job chains per workflow type.
//!
//! Each [`DefaultTopology`] is the chain `reset_to_default` restores. The
//! table is compiled in and checked once when the registry is built, so a
//! malformed entry stops the process at startup instead of corrupting a
//! workflow's live chain later.

use std::collections::{BTreeSet, HashMap};

use superv_workflow_core::{JobId, JobType, NextJob, WorkflowType};

use crate::error::{SupervError, SupervResult};

/// One `(job_id, next_job_id)` pair of a default chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultLink {
    pub job: JobType,
    pub next: NextJob,
}

impl DefaultLink {
    pub fn job_id(&self) -> JobId {
        self.job.id()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultTopology {
    workflow_type: WorkflowType,
    links: Vec<DefaultLink>,
}

impl DefaultTopology {
    /// Linear chain through `jobs` in order, ending at COMPLETE.
    pub fn chain(workflow_type: WorkflowType, jobs: &[JobType]) -> Self {
        let links = jobs
            .iter()
            .enumerate()
            .map(|(index, job)| DefaultLink {
                job: *job,
                next: jobs
                    .get(index + 1)
                    .map_or(NextJob::Complete, |next| NextJob::from(*next)),
            })
            .collect();
        Self {
            workflow_type,
            links,
        }
    }

    /// Arbitrary link list; the first link names the chain head.
    pub fn from_links(workflow_type: WorkflowType, links: Vec<DefaultLink>) -> Self {
        Self {
            workflow_type,
            links,
        }
    }

    pub fn workflow_type(&self) -> WorkflowType {
        self.workflow_type
    }

    pub fn links(&self) -> &[DefaultLink] {
        &self.links
    }

    pub fn first_job(&self) -> Option<JobId> {
        self.links.first().map(DefaultLink::job_id)
    }

    /// Job types in execution order, following links from the head.
    ///
    /// Only meaningful for a validated topology; stops early on a broken link.
    pub fn job_order(&self) -> Vec<JobType> {
        let by_id: HashMap<JobId, &DefaultLink> =
            self.links.iter().map(|link| (link.job_id(), link)).collect();
        let mut order = Vec::with_capacity(self.links.len());
        let mut cursor = self.first_job();
        while let Some(job_id) = cursor {
            let Some(link) = by_id.get(&job_id) else {
                break;
            };
            if order.len() == self.links.len() {
                break;
            }
            order.push(link.job);
            cursor = link.next.job_id();
        }
        order
    }

    fn validate(&self) -> Result<(), String> {
        if self.links.is_empty() {
            return Err("topology has no jobs".to_string());
        }

        let mut ids = BTreeSet::new();
        for link in &self.links {
            if !ids.insert(link.job_id()) {
                return Err(format!("job {} appears more than once", link.job));
            }
        }

        for link in &self.links {
            match link.next {
                NextJob::Complete => {}
                NextJob::Job(next) if next == link.job_id() => {
                    return Err(format!("job {} points at itself", link.job));
                }
                NextJob::Job(next) if !ids.contains(&next) => {
                    return Err(format!(
                        "job {} points at job {next} outside the topology",
                        link.job
                    ));
                }
                NextJob::Job(_) => {}
            }
        }

        // Every start must reach COMPLETE within n hops, otherwise it is on a cycle.
        let next_of: HashMap<JobId, NextJob> = self
            .links
            .iter()
            .map(|link| (link.job_id(), link.next))
            .collect();
        for link in &self.links {
            let mut cursor = link.next;
            let mut hops = 0;
            while let NextJob::Job(job_id) = cursor {
                hops += 1;
                if hops > self.links.len() {
                    return Err(format!("job {} never reaches COMPLETE (cycle)", link.job));
                }
                cursor = next_of.get(&job_id).copied().unwrap_or(NextJob::Complete);
            }
        }

        let reachable = self.job_order();
        if reachable.len() != self.links.len() {
            let missing: Vec<String> = self
                .links
                .iter()
                .filter(|link| !reachable.contains(&link.job))
                .map(|link| link.job.to_string())
                .collect();
            return Err(format!(
                "jobs not reachable from {}: {}",
                self.links[0].job,
                missing.join(", ")
            ));
        }

        Ok(())
    }
}

/// Validated default topologies, one per workflow type.
#[derive(Debug, Clone)]
pub struct WorkflowRegistry {
    topologies: HashMap<WorkflowType, DefaultTopology>,
}

impl WorkflowRegistry {
    /// The compiled-in topologies, validated.
    pub fn builtin() -> SupervResult<Self> {
        Self::new(builtin_topologies())
    }

    /// Validate `topologies`; every workflow type must be covered exactly once.
    pub fn new(topologies: impl IntoIterator<Item = DefaultTopology>) -> SupervResult<Self> {
        let mut by_workflow = HashMap::new();
        for topology in topologies {
            let workflow_type = topology.workflow_type;
            topology.validate().map_err(|reason| {
                SupervError::InvalidWorkflowType(format!(
                    "default topology for {workflow_type} is invalid: {reason}"
                ))
            })?;
            if by_workflow.insert(workflow_type, topology).is_some() {
                return Err(SupervError::InvalidWorkflowType(format!(
                    "default topology for {workflow_type} is defined twice"
                )));
            }
        }

        let missing: Vec<&str> = WorkflowType::ALL
            .iter()
            .filter(|workflow_type| !by_workflow.contains_key(*workflow_type))
            .map(|workflow_type| workflow_type.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(SupervError::InvalidWorkflowType(format!(
                "no default topology for {}",
                missing.join(", ")
            )));
        }

        Ok(Self {
            topologies: by_workflow,
        })
    }

    pub fn topology(&self, workflow_type: WorkflowType) -> SupervResult<&DefaultTopology> {
        self.topologies.get(&workflow_type).ok_or_else(|| {
            SupervError::InvalidWorkflowType(format!("no default topology for {workflow_type}"))
        })
    }

    pub fn first_job(&self, workflow_type: WorkflowType) -> SupervResult<JobId> {
        self.topology(workflow_type)?.first_job().ok_or_else(|| {
            SupervError::InvalidWorkflowType(format!("default topology for {workflow_type} is empty"))
        })
    }

    /// Parse a workflow type name as given by an operator.
    pub fn parse_workflow_type(name: &str) -> SupervResult<WorkflowType> {
        WorkflowType::parse(name)
            .ok_or_else(|| SupervError::InvalidWorkflowType(format!("unknown workflow type {name:?}")))
    }
}

fn builtin_topologies() -> Vec<DefaultTopology> {
    use JobType::*;
    use WorkflowType::*;

    vec![
        DefaultTopology::chain(
            Core,
            &[Staging, Database, Provider, Consumer, Forensics, FinalStaging],
        ),
        DefaultTopology::chain(
            Federation,
            &[Staging, Database, Provider, Consumer, Forensics, FinalStaging],
        ),
        DefaultTopology::chain(Plugin, &[Staging, Database, Provider, Consumer, FinalStaging]),
        DefaultTopology::chain(Topology, &[Staging, Database, Provider, Consumer, FinalStaging]),
        DefaultTopology::chain(Unit, &[Staging, Database, Provider, FinalStaging]),
        DefaultTopology::chain(
            Asgs,
            &[Staging, ObsMod, Geotiff2Cog, LoadGeoServer, FinalStaging],
        ),
        DefaultTopology::chain(Ecflow, &[Staging, ObsMod, LoadGeoServer, FinalStaging]),
        DefaultTopology::chain(Hecras, &[Staging, Geotiff2Cog, LoadGeoServer, FinalStaging]),
    ]
}
