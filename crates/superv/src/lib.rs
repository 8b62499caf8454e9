//! superv - job ordering and test request admission for the workflow supervisor.
//!
//! The job-order graph, workflow registry, request batcher and run lifecycle
//! tracker live here; persistence is delegated to the backend trait crates.

pub mod batcher;
pub mod config;
pub mod error;
pub mod job_defs;
pub mod job_order;
pub mod lifecycle;
pub mod registry;
#[cfg(test)]
pub(crate) mod test_support;

pub use batcher::{BatchSizes, RequestBatcher, TestRequest, parse_test_request, partition_batches};
pub use config::Config;
pub use error::{SupervError, SupervResult};
pub use job_defs::{ComponentVersion, JobDefinitions};
pub use job_order::{JobOrderGraph, JobStep, LinkPlan};
pub use lifecycle::{RunLifecycle, Submission, SubmissionReceipt};
pub use registry::{DefaultLink, DefaultTopology, WorkflowRegistry};
pub use superv_observability_macros::obs;
pub use superv_workflow_core as types;
