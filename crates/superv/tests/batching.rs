mod common;

use std::num::NonZeroUsize;

use proptest::prelude::*;
use superv::types::{DurationClass, RunLocation, TestBatch, TestCase};
use superv::{BatchSizes, partition_batches};

use common::labels;

fn catalog(entries: &[(&str, DurationClass)]) -> Vec<TestCase> {
    entries
        .iter()
        .map(|(label, duration_class)| TestCase::new(*label, *duration_class))
        .collect()
}

fn sizes(short: usize, long: usize) -> BatchSizes {
    BatchSizes {
        short: NonZeroUsize::new(short).unwrap(),
        long: NonZeroUsize::new(long).unwrap(),
    }
}

#[test]
fn worked_example_with_two_and_two() {
    let catalog = catalog(&[
        ("t1", DurationClass::Long),
        ("t2", DurationClass::Short),
        ("t3", DurationClass::Long),
        ("t4", DurationClass::Short),
        ("t5", DurationClass::Short),
    ]);
    let batches = partition_batches(
        RunLocation::Consumer,
        &labels(&["t1", "t2", "t3", "t4", "t5"]),
        &catalog,
        sizes(2, 2),
    );
    assert_eq!(
        batches,
        vec![
            TestBatch::Consumer(labels(&["t1", "t3"])),
            TestBatch::Consumer(labels(&["t2", "t4"])),
            TestBatch::Consumer(labels(&["t5"])),
        ]
    );
}

#[test]
fn batches_serialize_under_their_run_location() {
    let batches = partition_batches(
        RunLocation::Provider,
        &labels(&["test_ils"]),
        &[],
        BatchSizes::default(),
    );
    assert_eq!(
        serde_json::to_string(&batches).unwrap(),
        r#"[{"PROVIDER":["test_ils"]}]"#
    );
}

fn requested() -> impl Strategy<Value = Vec<(String, bool)>> {
    proptest::collection::vec(("[a-z]{1,6}", any::<bool>()), 0..40).prop_map(|entries| {
        entries
            .into_iter()
            .enumerate()
            .map(|(index, (label, long))| (format!("{label}{index}"), long))
            .collect()
    })
}

proptest! {
    #[test]
    fn batching_is_bounded_ordered_and_total(
        entries in requested(),
        short_size in 1usize..12,
        long_size in 1usize..5,
    ) {
        let catalog: Vec<TestCase> = entries
            .iter()
            .map(|(label, long)| {
                let class = if *long { DurationClass::Long } else { DurationClass::Short };
                TestCase::new(label.clone(), class)
            })
            .collect();
        let requested: Vec<String> = entries.iter().map(|(label, _)| label.clone()).collect();
        let long: Vec<String> = entries
            .iter()
            .filter(|(_, long)| *long)
            .map(|(label, _)| label.clone())
            .collect();
        let short: Vec<String> = entries
            .iter()
            .filter(|(_, long)| !*long)
            .map(|(label, _)| label.clone())
            .collect();

        let batches = partition_batches(
            RunLocation::Consumer,
            &requested,
            &catalog,
            sizes(short_size, long_size),
        );

        let long_batches = long.len().div_ceil(long_size);
        let short_batches = short.len().div_ceil(short_size);
        prop_assert_eq!(batches.len(), long_batches + short_batches);

        for (index, batch) in batches.iter().enumerate() {
            let bound = if index < long_batches { long_size } else { short_size };
            prop_assert!(!batch.is_empty());
            prop_assert!(batch.len() <= bound);
            prop_assert_eq!(batch.location(), RunLocation::Consumer);
        }

        let flattened: Vec<String> = batches
            .iter()
            .flat_map(|batch| batch.tests().iter().cloned())
            .collect();
        let expected: Vec<String> = long.into_iter().chain(short).collect();
        prop_assert_eq!(flattened, expected);
    }
}
