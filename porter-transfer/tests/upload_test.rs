/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! End-to-end upload tests against the scriptable in-memory store.


use porter_transfer::error::ErrorKind;
use porter_transfer::io::DataSource;
use porter_transfer::operation::upload::UploadInput;
use porter_transfer::store::mock::MockStore;
use porter_transfer::store::StoreErrorKind;
use porter_transfer::{Config, TransferCoordinator};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use test_utils::{init_tracing, patterned_bytes, test_config, upload_input, MEBIBYTE};

#[tokio::test]
async fn test_upload_round_trips_bytes() {
    init_tracing();
    let store = Arc::new(MockStore::new());
    let coordinator = TransferCoordinator::new(test_config(store.clone(), 4));
    let data = patterned_bytes(12 * MEBIBYTE as usize);

    let handle = coordinator.submit(upload_input("object", data.clone())).unwrap();
    let output = handle.join().await.unwrap();

    assert_eq!("test-bucket", output.bucket());
    assert_eq!("object", output.key());
    assert!(output.e_tag().is_some());
    assert_eq!(data, store.object("test-bucket", "object").unwrap());
    assert_eq!(0, store.open_uploads());
}

#[tokio::test]
async fn test_upload_from_file_on_disk() {
    init_tracing();
    let data = patterned_bytes(11 * MEBIBYTE as usize);
    let mut tmp = tempfile::NamedTempFile::new().unwrap();
    tmp.write_all(&data).unwrap();

    let store = Arc::new(MockStore::new());
    let coordinator = TransferCoordinator::new(test_config(store.clone(), 4));
    let input = UploadInput::builder()
        .bucket("test-bucket")
        .key("from-disk")
        .source(DataSource::from_path(tmp.path()).unwrap())
        .build()
        .unwrap();

    coordinator.submit(input).unwrap().join().await.unwrap();
    assert_eq!(data, store.object("test-bucket", "from-disk").unwrap());
}

#[tokio::test]
async fn test_concurrent_sessions_produce_identical_objects() {
    init_tracing();
    let store = Arc::new(MockStore::new());
    let coordinator = TransferCoordinator::new(test_config(store.clone(), 4));
    let data = patterned_bytes(12 * MEBIBYTE as usize);

    let first = coordinator.submit(upload_input("copy-1", data.clone())).unwrap();
    let second = coordinator.submit(upload_input("copy-2", data.clone())).unwrap();
    assert_eq!(2, coordinator.active_transfers());

    let (a, b) = tokio::join!(first.join(), second.join());
    a.unwrap();
    b.unwrap();

    assert_eq!(data, store.object("test-bucket", "copy-1").unwrap());
    assert_eq!(data, store.object("test-bucket", "copy-2").unwrap());
    assert_eq!(0, coordinator.active_transfers());
    assert_eq!(0, store.open_uploads());
}

#[tokio::test]
async fn test_cancel_mid_upload_aborts_remote_state() {
    init_tracing();
    let store = Arc::new(MockStore::new().with_part_delay(Duration::from_millis(200)));
    let coordinator = TransferCoordinator::new(test_config(store.clone(), 4));
    let data = patterned_bytes(15 * MEBIBYTE as usize);

    let handle = coordinator.submit(upload_input("cancelled", data)).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.cancel();

    let err = handle.join().await.unwrap_err();
    assert_eq!(ErrorKind::OperationCancelled, *err.kind());
    assert!(store.object("test-bucket", "cancelled").is_none());
    assert_eq!(1, store.abort_calls());
    assert_eq!(0, store.open_uploads());
}

#[tokio::test]
async fn test_cancel_with_failing_abort_requires_cleanup_sweep() {
    init_tracing();
    let store = Arc::new(MockStore::new().with_part_delay(Duration::from_millis(200)));
    store.fail_abort();
    let coordinator = TransferCoordinator::new(test_config(store.clone(), 4));
    let data = patterned_bytes(15 * MEBIBYTE as usize);

    let handle = coordinator.submit(upload_input("leaked", data)).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.cancel();

    let err = handle.join().await.unwrap_err();
    match err.kind() {
        ErrorKind::AbortIncomplete(failed) => {
            assert!(failed.upload_id().is_some());
            assert_eq!("leaked", failed.key());
        }
        other => panic!("expected abort failure context, got {other:?}"),
    }
    assert_eq!(1, store.abort_calls());
    // the abort never landed, so the upload stays open for a lifecycle sweep
    assert_eq!(1, store.open_uploads());
}

#[tokio::test(start_paused = true)]
async fn test_transient_part_failures_recover_within_budget() {
    init_tracing();
    let store = Arc::new(MockStore::new());
    store.fail_part(2, 4, StoreErrorKind::Throttling);
    let coordinator = TransferCoordinator::new(test_config(store.clone(), 4));
    let data = patterned_bytes(15 * MEBIBYTE as usize);

    coordinator
        .submit(upload_input("flaky", data.clone()))
        .unwrap()
        .join()
        .await
        .unwrap();

    assert_eq!(5, store.part_attempts(2));
    assert_eq!(data, store.object("test-bucket", "flaky").unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_part_failure_stops_later_dispatch() {
    init_tracing();
    let store = Arc::new(MockStore::new());
    store.fail_part(1, 5, StoreErrorKind::Server);
    // single worker so parts are dispatched strictly in order
    let coordinator = TransferCoordinator::new(test_config(store.clone(), 1));
    let data = patterned_bytes(15 * MEBIBYTE as usize);

    let err = coordinator
        .submit(upload_input("doomed", data))
        .unwrap()
        .join()
        .await
        .unwrap_err();

    match err.kind() {
        ErrorKind::PartFailed(failed) => assert_eq!(1, failed.part_number()),
        other => panic!("expected part failure, got {other:?}"),
    }
    assert_eq!(5, store.part_attempts(1));
    assert_eq!(0, store.part_attempts(2));
    assert_eq!(0, store.part_attempts(3));
    assert_eq!(1, store.abort_calls());
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_parts_bounded_across_sessions() {
    init_tracing();
    let store = Arc::new(MockStore::new().with_part_delay(Duration::from_millis(50)));
    let coordinator = TransferCoordinator::new(test_config(store.clone(), 2));
    let data = patterned_bytes(15 * MEBIBYTE as usize);

    let first = coordinator.submit(upload_input("bounded-1", data.clone())).unwrap();
    let second = coordinator.submit(upload_input("bounded-2", data.clone())).unwrap();
    let (a, b) = tokio::join!(first.join(), second.join());
    a.unwrap();
    b.unwrap();

    assert!(store.max_parts_in_flight() >= 1);
    assert!(
        store.max_parts_in_flight() <= 2,
        "ceiling breached: {} parts in flight",
        store.max_parts_in_flight()
    );
}

#[tokio::test(start_paused = true)]
async fn test_elapsed_deadline_is_retried_then_fails_the_part() {
    init_tracing();
    // every part call outlasts the 20ms deadline
    let store = Arc::new(MockStore::new().with_part_delay(Duration::from_millis(100)));
    let config = Config::builder()
        .store(store.clone())
        .connect_timeout(Duration::from_millis(10))
        .read_timeout(Duration::from_millis(10))
        .max_retry_attempts(2)
        .build();
    let coordinator = TransferCoordinator::new(config);
    let data = patterned_bytes(20 * MEBIBYTE as usize);

    let err = coordinator
        .submit(upload_input("stalled", data))
        .unwrap()
        .join()
        .await
        .unwrap_err();

    assert!(matches!(err.kind(), ErrorKind::PartFailed(_)));
    assert_eq!(1, store.abort_calls());
    assert!(store.object("test-bucket", "stalled").is_none());
}
