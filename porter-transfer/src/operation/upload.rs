/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Operation builders and orchestration for a single multipart upload.

mod input;
mod output;
mod service;
mod session;

pub use input::{UploadInput, UploadInputBuilder};
pub use output::UploadOutput;
pub use session::{SessionState, UploadSession};

use crate::config::Config;
use crate::error::{self, Error, ErrorKind, FailedTransfer};
use crate::io::DataSource;
use crate::runtime::scheduler::Scheduler;
use crate::store::{ObjectStore, StoreError};
use std::sync::Arc;
use tracing::Instrument;

/// Everything a part-upload worker needs, cheap to clone into spawned tasks.
#[derive(Debug, Clone)]
pub(crate) struct UploadContext {
    pub(crate) config: Config,
    pub(crate) scheduler: Scheduler,
    pub(crate) request: Arc<UploadInput>,
    pub(crate) source: Arc<DataSource>,
    pub(crate) session: Arc<UploadSession>,
}

impl UploadContext {
    fn store(&self) -> &Arc<dyn ObjectStore> {
        self.config.store()
    }

    fn bucket(&self) -> &str {
        self.request.bucket()
    }

    fn key(&self) -> &str {
        self.request.key()
    }

    fn upload_id(&self) -> Result<&str, Error> {
        self.session
            .upload_id()
            .ok_or_else(|| Error::new(ErrorKind::RuntimeError, "upload id not assigned"))
    }

    fn failed_transfer(&self) -> FailedTransfer {
        FailedTransfer::new(
            self.session.upload_id().map(str::to_string),
            self.request.key(),
            self.session.recorded_parts(),
        )
    }
}

/// Drive a planned upload to a terminal state.
///
/// Initiates the remote upload, fans the planned parts out to workers, and
/// then either completes, aborts, or records the failure depending on how the
/// part phase ended. The session always lands in a terminal state before this
/// returns.
pub(crate) async fn orchestrate(ctx: UploadContext) -> Result<UploadOutput, Error> {
    if ctx.session.cancelled() {
        // cancelled before anything was sent; nothing remote to clean up
        ctx.session.set_state(SessionState::Aborted);
        return Err(error::operation_cancelled());
    }

    let upload_id = match initiate(&ctx).await {
        Ok(upload_id) => upload_id,
        Err(err) => {
            ctx.session.set_state(SessionState::Failed);
            return Err(error::initiation_failed(err));
        }
    };
    ctx.session.set_upload_id(upload_id);
    ctx.session.set_state(SessionState::InProgress);
    tracing::debug!(
        upload_id = ctx.session.upload_id(),
        part_count = ctx.session.plan().part_count(),
        part_size = ctx.session.plan().part_size(),
        "multipart upload initiated"
    );

    let part_result = service::upload_parts(&ctx).await;

    if ctx.session.cancelled() {
        return match abort(&ctx).await {
            Ok(()) => {
                ctx.session.set_state(SessionState::Aborted);
                Err(error::operation_cancelled())
            }
            Err(abort_err) => {
                ctx.session.set_state(SessionState::Aborted);
                Err(error::abort_incomplete(ctx.failed_transfer(), abort_err))
            }
        };
    }

    if let Err(part_err) = part_result {
        return match abort(&ctx).await {
            Ok(()) => {
                ctx.session.set_state(SessionState::Aborted);
                Err(part_err)
            }
            Err(abort_err) => {
                tracing::warn!(
                    upload_id = ctx.session.upload_id(),
                    error = %abort_err,
                    "abort failed after part failure, parts remain stored remotely"
                );
                ctx.session.set_state(SessionState::Failed);
                Err(error::partial_upload_incomplete(
                    ctx.failed_transfer(),
                    part_err,
                ))
            }
        };
    }

    complete(&ctx).await
}

async fn initiate(ctx: &UploadContext) -> Result<String, StoreError> {
    let metadata = ctx.request.metadata();
    service::retry_transient(&ctx.config, "initiate-multipart-upload", || async move {
        ctx.store()
            .initiate_multipart_upload(ctx.bucket(), ctx.key(), metadata)
            .await
    })
    .instrument(tracing::debug_span!("send-initiate-multipart-upload"))
    .await
}

/// Abort the remote upload. A single deadline-bounded attempt; a failed abort
/// is surfaced to the caller rather than retried, since leaked parts are
/// recoverable through a lifecycle sweep.
async fn abort(ctx: &UploadContext) -> Result<(), StoreError> {
    ctx.session.set_state(SessionState::Aborting);
    let upload_id = match ctx.session.upload_id() {
        Some(upload_id) => upload_id,
        // initiate never succeeded, nothing to abort
        None => return Ok(()),
    };
    service::with_deadline(
        &ctx.config,
        ctx.store()
            .abort_multipart_upload(ctx.bucket(), ctx.key(), upload_id),
    )
    .instrument(tracing::debug_span!("send-abort-multipart-upload", upload_id))
    .await
}

/// Assemble the object. One transient retry; a persistent failure leaves the
/// stored parts in place so the caller can decide between re-driving
/// completion and aborting.
async fn complete(ctx: &UploadContext) -> Result<UploadOutput, Error> {
    ctx.session.set_state(SessionState::Completing);
    let parts = match ctx.session.completed_part_list() {
        Ok(parts) => parts,
        Err(err) => {
            ctx.session.set_state(SessionState::Failed);
            return Err(err);
        }
    };
    let upload_id = ctx.upload_id()?;

    let span = tracing::debug_span!("send-complete-multipart-upload", upload_id);
    let result = async {
        let first = service::with_deadline(
            &ctx.config,
            ctx.store()
                .complete_multipart_upload(ctx.bucket(), ctx.key(), upload_id, &parts),
        )
        .await;
        match first {
            Err(err) if err.is_transient() => {
                tracing::debug!(error = %err, "transient complete failure, retrying once");
                tokio::time::sleep(ctx.config.backoff().delay(0)).await;
                service::with_deadline(
                    &ctx.config,
                    ctx.store()
                        .complete_multipart_upload(ctx.bucket(), ctx.key(), upload_id, &parts),
                )
                .await
            }
            other => other,
        }
    }
    .instrument(span)
    .await;

    match result {
        Ok(version) => {
            ctx.session.set_state(SessionState::Completed);
            Ok(UploadOutput {
                bucket: ctx.bucket().to_owned(),
                key: ctx.key().to_owned(),
                upload_id: upload_id.to_owned(),
                e_tag: version.e_tag().map(str::to_string),
                version_id: version.version_id().map(str::to_string),
            })
        }
        Err(err) => {
            ctx.session.set_state(SessionState::Failed);
            Err(error::partial_upload_incomplete(ctx.failed_transfer(), err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::PartPlanner;
    use crate::store::mock::MockStore;
    use crate::store::StoreErrorKind;
    use bytes::Bytes;

    const DATA: &[u8] = b"the quick brown fox jumps over the lazy dog and keeps on running far";

    fn test_ctx(store: Arc<MockStore>, data: &'static [u8], part_size: u64) -> UploadContext {
        let config = Config::builder().store(store).build();
        let plan = PartPlanner::new(part_size, 1, 10_000, 1)
            .plan(data.len() as u64)
            .expect("valid plan");
        let mut request = UploadInput::builder()
            .bucket("bucket")
            .key("key")
            .source(data)
            .build()
            .expect("valid input");
        let source = request.take_source().expect("source present");
        UploadContext {
            config,
            scheduler: Scheduler::new(4),
            request: Arc::new(request),
            source: Arc::new(source),
            session: Arc::new(UploadSession::new(plan)),
        }
    }

    #[tokio::test]
    async fn test_multipart_upload_round_trips_bytes() {
        let store = Arc::new(MockStore::new());
        let ctx = test_ctx(store.clone(), DATA, 10);
        let session = ctx.session.clone();

        let output = orchestrate(ctx).await.unwrap();

        assert_eq!("bucket", output.bucket());
        assert_eq!("key", output.key());
        assert!(output.e_tag().is_some());
        assert_eq!(SessionState::Completed, session.state());
        assert_eq!(Bytes::from_static(DATA), store.object("bucket", "key").unwrap());
        assert_eq!(0, store.open_uploads());
    }

    #[tokio::test(start_paused = true)]
    async fn test_part_retry_budget_exhaustion_aborts_upload() {
        let store = Arc::new(MockStore::new());
        store.fail_part(2, 5, StoreErrorKind::Server);
        let ctx = test_ctx(store.clone(), DATA, 10);
        let session = ctx.session.clone();

        let err = orchestrate(ctx).await.unwrap_err();

        match err.kind() {
            ErrorKind::PartFailed(failed) => assert_eq!(2, failed.part_number()),
            other => panic!("expected part failure, got {other:?}"),
        }
        assert_eq!(SessionState::Aborted, session.state());
        assert_eq!(5, store.part_attempts(2));
        assert_eq!(1, store.abort_calls());
        assert!(store.object("bucket", "key").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_part_failures_recover_within_budget() {
        let store = Arc::new(MockStore::new());
        store.fail_part(3, 4, StoreErrorKind::Throttling);
        let ctx = test_ctx(store.clone(), DATA, 10);
        let session = ctx.session.clone();

        orchestrate(ctx).await.unwrap();

        assert_eq!(SessionState::Completed, session.state());
        assert_eq!(5, store.part_attempts(3));
        assert_eq!(Bytes::from_static(DATA), store.object("bucket", "key").unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_abort_after_part_failure_leaves_session_failed() {
        let store = Arc::new(MockStore::new());
        store.fail_part(1, 5, StoreErrorKind::Server);
        store.fail_abort();
        let ctx = test_ctx(store.clone(), DATA, 10);
        let session = ctx.session.clone();

        let err = orchestrate(ctx).await.unwrap_err();

        match err.kind() {
            ErrorKind::PartialUploadIncomplete(ctx) => {
                assert!(ctx.upload_id().is_some());
                assert_eq!("key", ctx.key());
            }
            other => panic!("expected partial upload, got {other:?}"),
        }
        assert_eq!(SessionState::Failed, session.state());
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_complete_failure_does_not_abort() {
        let store = Arc::new(MockStore::new());
        store.fail_complete(2, StoreErrorKind::Server);
        let ctx = test_ctx(store.clone(), DATA, 10);
        let session = ctx.session.clone();

        let err = orchestrate(ctx).await.unwrap_err();

        match err.kind() {
            ErrorKind::PartialUploadIncomplete(failed) => {
                assert_eq!(session.plan().part_count(), failed.completed_parts());
            }
            other => panic!("expected partial upload, got {other:?}"),
        }
        assert_eq!(SessionState::Failed, session.state());
        assert_eq!(2, store.complete_calls());
        // stored parts stay put so the caller can re-drive completion
        assert_eq!(0, store.abort_calls());
        assert_eq!(1, store.open_uploads());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_complete_failure_retried_once() {
        let store = Arc::new(MockStore::new());
        store.fail_complete(1, StoreErrorKind::Throttling);
        let ctx = test_ctx(store.clone(), DATA, 10);
        let session = ctx.session.clone();

        orchestrate(ctx).await.unwrap();

        assert_eq!(SessionState::Completed, session.state());
        assert_eq!(2, store.complete_calls());
    }

    #[tokio::test]
    async fn test_cancel_before_dispatch_sends_nothing() {
        let store = Arc::new(MockStore::new());
        let ctx = test_ctx(store.clone(), DATA, 10);
        let session = ctx.session.clone();
        session.cancel();

        let err = orchestrate(ctx).await.unwrap_err();

        assert_eq!(ErrorKind::OperationCancelled, *err.kind());
        assert_eq!(SessionState::Aborted, session.state());
        assert_eq!(0, store.total_part_attempts());
        assert_eq!(0, store.open_uploads());
    }

    #[tokio::test(start_paused = true)]
    async fn test_initiation_failure_uploads_no_parts() {
        let store = Arc::new(MockStore::new());
        store.fail_initiate(5, StoreErrorKind::Network);
        let ctx = test_ctx(store.clone(), DATA, 10);
        let session = ctx.session.clone();

        let err = orchestrate(ctx).await.unwrap_err();

        assert_eq!(ErrorKind::InitiationFailed, *err.kind());
        assert_eq!(SessionState::Failed, session.state());
        assert_eq!(0, store.total_part_attempts());
    }
}
