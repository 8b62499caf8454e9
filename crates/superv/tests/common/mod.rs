#![allow(dead_code)]

use std::sync::Arc;

use superv::WorkflowRegistry;
use superv::types::{DurationClass, JobDefinition, TestCase, WorkflowType};
use superv_backend_memory::MemoryBackend;

pub fn registry() -> Arc<WorkflowRegistry> {
    Arc::new(WorkflowRegistry::builtin().expect("builtin registry is valid"))
}

/// Every workflow's default chain, as deployment seeding would leave it.
pub fn seeded_backend(registry: &WorkflowRegistry) -> MemoryBackend {
    let backend = MemoryBackend::new();
    for workflow_type in WorkflowType::ALL {
        for link in registry.topology(workflow_type).unwrap().links() {
            backend.insert_job(
                workflow_type,
                link.job_id(),
                link.job.as_str(),
                link.next,
                JobDefinition {
                    image: format!("containers.renci.org/eds/{}:latest", link.job),
                    ..JobDefinition::default()
                },
            );
        }
    }
    backend
}

pub fn seed_catalog(backend: &MemoryBackend, entries: &[(&str, DurationClass)]) {
    for (label, duration_class) in entries {
        backend.insert_test_case(TestCase::new(*label, *duration_class));
    }
}

pub fn labels(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

pub fn default_order(registry: &WorkflowRegistry, workflow_type: WorkflowType) -> Vec<String> {
    registry
        .topology(workflow_type)
        .unwrap()
        .job_order()
        .into_iter()
        .map(|job| job.to_string())
        .collect()
}
