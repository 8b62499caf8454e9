//! Splits requested tests into run-request sized batches.
//!
//! Long-running tests get small batches and short-running tests large ones,
//! so one slow test never holds a large group hostage.

use std::collections::HashSet;
use std::fmt;
use std::num::NonZeroUsize;

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use superv_run_request_backend::RunRequestBackend;
use superv_workflow_core::{DurationClass, RunLocation, TestBatch, TestCase};
use tracing::{debug, warn};

use crate::error::{SupervError, SupervResult};

pub const DEFAULT_SHORT_BATCH_SIZE: NonZeroUsize = match NonZeroUsize::new(10) {
    Some(size) => size,
    None => unreachable!(),
};

pub const DEFAULT_LONG_BATCH_SIZE: NonZeroUsize = match NonZeroUsize::new(2) {
    Some(size) => size,
    None => unreachable!(),
};

/// Maximum labels per batch for each duration class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSizes {
    pub short: NonZeroUsize,
    pub long: NonZeroUsize,
}

impl Default for BatchSizes {
    fn default() -> Self {
        Self {
            short: DEFAULT_SHORT_BATCH_SIZE,
            long: DEFAULT_LONG_BATCH_SIZE,
        }
    }
}

/// Partition `requested` by duration class and chunk each side.
///
/// Relative order is kept inside each class. Labels the catalog does not know
/// are treated as short. Long batches come first.
pub fn partition_batches(
    location: RunLocation,
    requested: &[String],
    catalog: &[TestCase],
    sizes: BatchSizes,
) -> Vec<TestBatch> {
    let long_labels: HashSet<&str> = catalog
        .iter()
        .filter(|test_case| test_case.duration_class == DurationClass::Long)
        .map(|test_case| test_case.label.as_str())
        .collect();

    let (long, short): (Vec<&String>, Vec<&String>) = requested
        .iter()
        .partition(|label| long_labels.contains(label.as_str()));

    let chunk = |labels: &[&String], size: NonZeroUsize| -> Vec<TestBatch> {
        labels
            .chunks(size.get())
            .map(|group| {
                TestBatch::new(location, group.iter().map(|label| (*label).clone()).collect())
            })
            .collect()
    };

    let mut batches = chunk(long.as_slice(), sizes.long);
    batches.extend(chunk(short.as_slice(), sizes.short));
    batches
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RequestBatcher {
    sizes: BatchSizes,
}

impl RequestBatcher {
    pub fn new(sizes: BatchSizes) -> Self {
        Self { sizes }
    }

    pub fn sizes(&self) -> BatchSizes {
        self.sizes
    }

    /// Batch `requested` against the backend's test catalog.
    ///
    /// An unrecognized run location yields no batches; callers treat an empty
    /// result as [`SupervError::NoValidTests`].
    pub async fn batch<B>(
        &self,
        backend: &B,
        run_location: &str,
        requested: &[String],
    ) -> SupervResult<Vec<TestBatch>>
    where
        B: RunRequestBackend + ?Sized,
    {
        let Some(location) = RunLocation::parse(run_location) else {
            warn!(run_location, "unrecognized run location; no batches produced");
            return Ok(Vec::new());
        };

        let catalog = backend.list_test_cases().await?;
        let batches = partition_batches(location, requested, &catalog, self.sizes);
        debug!(
            run_location = %location,
            requested = requested.len(),
            batches = batches.len(),
            "batched test request"
        );
        Ok(batches)
    }
}

/// A decoded `{"CONSUMER": ["t1", ...]}` request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRequest {
    pub run_location: String,
    pub tests: Vec<String>,
}

/// Parse a test request body. The first key names the run location.
pub fn parse_test_request(body: &str) -> SupervResult<TestRequest> {
    let entries: OrderedEntries = serde_json::from_str(body)
        .map_err(|err| SupervError::invalid_input(format!("malformed test request: {err}")))?;
    entries
        .0
        .into_iter()
        .next()
        .map(|(run_location, tests)| TestRequest {
            run_location,
            tests,
        })
        .ok_or_else(|| SupervError::invalid_input("test request names no run location"))
}

/// Map entries in document order.
struct OrderedEntries(Vec<(String, Vec<String>)>);

impl<'de> Deserialize<'de> for OrderedEntries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = OrderedEntries;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of run location to test names")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::new();
                while let Some(entry) = map.next_entry::<String, Vec<String>>()? {
                    entries.push(entry);
                }
                if entries.is_empty() {
                    return Err(de::Error::invalid_length(0, &self));
                }
                Ok(OrderedEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

#[cfg(test)]
mod tests {
    use superv_backend_memory::MemoryBackend;

    use super::*;
    use crate::test_support::seed_catalog;

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    fn sizes(short: usize, long: usize) -> BatchSizes {
        BatchSizes {
            short: NonZeroUsize::new(short).unwrap(),
            long: NonZeroUsize::new(long).unwrap(),
        }
    }

    #[tokio::test]
    async fn worked_example_splits_long_then_short() {
        let backend = MemoryBackend::new();
        seed_catalog(&backend);
        let batcher = RequestBatcher::new(sizes(2, 2));

        let batches = batcher
            .batch(&backend, "CONSUMER", &labels(&["t1", "t2", "t3", "t4", "t5"]))
            .await
            .unwrap();

        assert_eq!(
            batches,
            vec![
                TestBatch::Consumer(labels(&["t1", "t3"])),
                TestBatch::Consumer(labels(&["t2", "t4"])),
                TestBatch::Consumer(labels(&["t5"])),
            ]
        );
    }

    #[tokio::test]
    async fn default_sizes_keep_short_tests_together() {
        let backend = MemoryBackend::new();
        seed_catalog(&backend);
        let batches = RequestBatcher::default()
            .batch(&backend, "PROVIDER", &labels(&["t1", "t2", "t3", "t4", "t5"]))
            .await
            .unwrap();
        assert_eq!(
            batches,
            vec![
                TestBatch::Provider(labels(&["t1", "t3"])),
                TestBatch::Provider(labels(&["t2", "t4", "t5"])),
            ]
        );
    }

    #[tokio::test]
    async fn unknown_location_produces_no_batches() {
        let backend = MemoryBackend::new();
        seed_catalog(&backend);
        let batches = RequestBatcher::default()
            .batch(&backend, "consumer", &labels(&["t1"]))
            .await
            .unwrap();
        assert!(batches.is_empty());
    }

    #[test]
    fn uncatalogued_labels_are_short() {
        let catalog = vec![TestCase::new("slow", DurationClass::Long)];
        let batches = partition_batches(
            RunLocation::Consumer,
            &labels(&["mystery", "slow"]),
            &catalog,
            sizes(10, 1),
        );
        assert_eq!(
            batches,
            vec![
                TestBatch::Consumer(labels(&["slow"])),
                TestBatch::Consumer(labels(&["mystery"])),
            ]
        );
    }

    #[test]
    fn empty_request_yields_no_batches() {
        let batches = partition_batches(RunLocation::Provider, &[], &[], BatchSizes::default());
        assert!(batches.is_empty());
    }

    #[test]
    fn parse_test_request_takes_first_key() {
        let request =
            parse_test_request(r#"{"PROVIDER": ["test_ils"], "CONSUMER": ["test_iput"]}"#)
                .unwrap();
        assert_eq!(
            request,
            TestRequest {
                run_location: "PROVIDER".to_string(),
                tests: labels(&["test_ils"]),
            }
        );
    }

    #[test]
    fn parse_test_request_rejects_bad_bodies() {
        for body in ["{}", "[]", r#"{"CONSUMER": "test_ils"}"#, "not json"] {
            assert!(
                matches!(parse_test_request(body), Err(SupervError::InvalidInput(_))),
                "accepted {body}"
            );
        }
    }
}
