//! Property tests for the buffering engine.

use diskbuf_storage::{
    framed_len, DefaultTemporaryFileNamer, ManualClock, ReadOutcome, RecordDisposition, Storage,
    StorageConfiguration,
};
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn open(dir: &std::path::Path, max_file_size: u64, max_folder_size: u64) -> (Storage, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::default());
    let config = StorageConfiguration::builder()
        .max_file_age_for_write(Duration::from_secs(1))
        .min_file_age_for_read(Duration::from_millis(1500))
        .max_file_age_for_read(Duration::from_secs(10))
        .max_file_size(max_file_size)
        .max_folder_size(max_folder_size)
        .temporary_file_namer(Arc::new(DefaultTemporaryFileNamer::in_dir(dir.join("tmp"))))
        .build()
        .unwrap();
    let storage = Storage::open_with_clock(&dir.join("spans"), config, clock.clone()).unwrap();
    (storage, clock)
}

fn drain(storage: &Storage) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    while storage
        .read_and_process(|p| {
            out.push(p.to_vec());
            RecordDisposition::Consume
        })
        .unwrap()
        == ReadOutcome::Processed
    {}
    out
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 32, ..ProptestConfig::default() })]

    #[test]
    fn replay_preserves_append_order(
        writes in prop::collection::vec((prop::collection::vec(any::<u8>(), 0..120), 0u64..200), 1..40),
    ) {
        let dir = tempfile::tempdir().unwrap();
        let (storage, clock) = open(dir.path(), 500, 1_000_000);

        for (payload, gap) in &writes {
            storage.write(payload).unwrap();
            clock.advance(Duration::from_millis(*gap));
        }
        clock.advance(Duration::from_millis(1500));

        let expected: Vec<Vec<u8>> = writes.into_iter().map(|(p, _)| p).collect();
        prop_assert_eq!(drain(&storage), expected);
        prop_assert_eq!(storage.file_count().unwrap(), 0);
    }

    #[test]
    fn folder_never_exceeds_its_cap(
        sizes in prop::collection::vec(0usize..200, 1..60),
        max_folder_size in 400u64..2_000,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let (storage, clock) = open(dir.path(), 400, max_folder_size);

        for (i, size) in sizes.iter().enumerate() {
            storage.write(&vec![i as u8; *size]).unwrap();
            prop_assert!(storage.folder_size().unwrap() <= max_folder_size);
            clock.advance(Duration::from_millis(50));
        }

        let written: u64 = sizes.iter().map(|s| framed_len(*s)).sum();
        let snapshot = storage.stats().snapshot();
        prop_assert_eq!(snapshot.bytes_written, written);
        prop_assert_eq!(
            storage.folder_size().unwrap() + snapshot.bytes_evicted,
            written
        );
    }

    #[test]
    fn retained_records_are_never_skipped(
        payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 1..32), 1..20),
        failures in prop::collection::vec(any::<bool>(), 0..40),
    ) {
        let dir = tempfile::tempdir().unwrap();
        let (storage, clock) = open(dir.path(), 10_000, 30_000);
        for p in &payloads {
            storage.write(p).unwrap();
        }
        clock.advance(Duration::from_millis(1500));

        let mut delivered = Vec::new();
        let mut failures = failures.into_iter();
        loop {
            let fail = failures.next().unwrap_or(false);
            let outcome = storage
                .read_and_process(|p| {
                    if fail {
                        RecordDisposition::Retain
                    } else {
                        delivered.push(p.to_vec());
                        RecordDisposition::Consume
                    }
                })
                .unwrap();
            if outcome == ReadOutcome::NoData {
                break;
            }
        }
        prop_assert_eq!(delivered, payloads);
    }
}
