//! Seeded in-memory fixtures for unit tests.

use std::sync::Arc;

use superv_backend_memory::MemoryBackend;
use superv_workflow_core::{DurationClass, JobDefinition, TestCase};

use crate::job_order::JobOrderGraph;
use crate::registry::WorkflowRegistry;

pub(crate) fn registry() -> Arc<WorkflowRegistry> {
    Arc::new(WorkflowRegistry::builtin().expect("builtin registry is valid"))
}

/// Memory backend holding every workflow's default chain.
pub(crate) fn seeded_backend(registry: &WorkflowRegistry) -> MemoryBackend {
    let backend = MemoryBackend::new();
    for workflow_type in superv_workflow_core::WorkflowType::ALL {
        let topology = registry
            .topology(workflow_type)
            .expect("builtin registry covers every workflow");
        for link in topology.links() {
            backend.insert_job(
                workflow_type,
                link.job_id(),
                link.job.as_str(),
                link.next,
                JobDefinition {
                    image: format!("containers.renci.org/eds/{}:latest", link.job),
                    command_line: vec!["python".to_string(), "run.py".to_string()],
                    ..JobDefinition::default()
                },
            );
        }
    }
    backend
}

pub(crate) fn seeded_graph() -> JobOrderGraph<MemoryBackend> {
    let registry = registry();
    JobOrderGraph::new(seeded_backend(&registry), registry)
}

/// Catalog with `t1`, `t3` long and `t2`, `t4`, `t5` short.
pub(crate) fn seed_catalog(backend: &MemoryBackend) {
    for (label, duration_class) in [
        ("t1", DurationClass::Long),
        ("t2", DurationClass::Short),
        ("t3", DurationClass::Long),
        ("t4", DurationClass::Short),
        ("t5", DurationClass::Short),
    ] {
        backend.insert_test_case(TestCase::new(label, duration_class));
    }
}
