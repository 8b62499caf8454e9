//! Job launch definitions and the component image versions they pin.

use std::collections::BTreeMap;

use serde::Serialize;
use superv_job_order_backend::JobDefinitionBackend;
use superv_observability_macros::obs;
use superv_workflow_core::{JobDefinition, WorkflowType};
use tracing::info;

use crate::error::{SupervError, SupervResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentVersion {
    pub job_name: String,
    pub image: String,
}

pub struct JobDefinitions<B> {
    backend: B,
    image_freeze: bool,
}

impl<B> JobDefinitions<B>
where
    B: JobDefinitionBackend,
{
    /// `image_freeze` rejects every image update while set.
    pub fn new(backend: B, image_freeze: bool) -> Self {
        Self {
            backend,
            image_freeze,
        }
    }

    /// Definitions per workflow, keyed by job name.
    pub async fn all(
        &self,
    ) -> SupervResult<BTreeMap<WorkflowType, BTreeMap<String, JobDefinition>>> {
        let mut by_workflow: BTreeMap<WorkflowType, BTreeMap<String, JobDefinition>> =
            BTreeMap::new();
        for row in self.backend.get_job_definitions().await? {
            by_workflow
                .entry(row.workflow_type)
                .or_default()
                .insert(row.job_name, row.definition);
        }
        Ok(by_workflow)
    }

    /// Image pinned by each job, per workflow, in job name order.
    pub async fn component_versions(
        &self,
    ) -> SupervResult<BTreeMap<WorkflowType, Vec<ComponentVersion>>> {
        Ok(self
            .all()
            .await?
            .into_iter()
            .map(|(workflow_type, jobs)| {
                let versions = jobs
                    .into_iter()
                    .map(|(job_name, definition)| ComponentVersion {
                        job_name,
                        image: definition.image,
                    })
                    .collect();
                (workflow_type, versions)
            })
            .collect())
    }

    #[obs]
    pub async fn update_image(
        &self,
        workflow_type: WorkflowType,
        job_name: &str,
        image: &str,
    ) -> SupervResult<()> {
        if self.image_freeze {
            return Err(SupervError::ImagesFrozen);
        }
        let image = image.trim();
        if image.is_empty() {
            return Err(SupervError::invalid_input("image must not be empty"));
        }
        if !self
            .backend
            .update_job_image(workflow_type, job_name, image)
            .await?
        {
            return Err(SupervError::NotFound(format!(
                "job {job_name:?} is not part of {workflow_type}"
            )));
        }
        info!(workflow_type = %workflow_type, job_name, image, "component image updated");
        Ok(())
    }
}
