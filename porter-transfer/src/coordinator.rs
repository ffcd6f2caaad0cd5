/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Entry point for submitting and tracking concurrent uploads.

use crate::config::Config;
use crate::error::Error;
use crate::operation::upload::{
    self, SessionState, UploadContext, UploadInput, UploadOutput, UploadSession,
};
use crate::planner::PartPlanner;
use crate::runtime::scheduler::Scheduler;
use crate::types::{ProgressSnapshot, TransferId};
use crate::{MAX_PART_COUNT, MIN_PART_SIZE_BYTES};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::Instrument;

/// Owns the shared scheduler and the registry of active upload sessions.
///
/// All sessions submitted through one coordinator share a single pool of work
/// permits, so the configured concurrency is an engine-wide ceiling rather
/// than a per-upload one. The coordinator is internally reference-counted and
/// can be cloned freely.
#[derive(Debug, Clone)]
pub struct TransferCoordinator {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    config: Config,
    scheduler: Scheduler,
    planner: PartPlanner,
    sessions: Mutex<HashMap<TransferId, Arc<UploadSession>>>,
    next_id: AtomicU64,
}

impl TransferCoordinator {
    /// Create a new coordinator from the given config
    pub fn new(config: Config) -> Self {
        let scheduler = Scheduler::new(config.max_concurrent_parts());
        let planner = PartPlanner::new(
            config.part_size_bytes(),
            MIN_PART_SIZE_BYTES,
            MAX_PART_COUNT,
            config.part_size_alignment(),
        );
        Self {
            inner: Arc::new(Inner {
                config,
                scheduler,
                planner,
                sessions: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// The config this coordinator was constructed with
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Plan and start an upload, returning a handle to await or control it.
    ///
    /// Planning failures (source too small for multipart, part count limit)
    /// are returned immediately; nothing is sent to the store and no session
    /// is registered.
    pub fn submit(&self, mut input: UploadInput) -> Result<TransferHandle, Error> {
        let source = input
            .take_source()
            .ok_or_else(|| crate::error::invalid_input("input source already consumed"))?;
        let plan = self.inner.planner.plan(source.total_size())?;

        let id = TransferId::new(self.inner.next_id.fetch_add(1, Ordering::SeqCst));
        let session = Arc::new(UploadSession::new(plan));
        self.inner
            .sessions
            .lock()
            .expect("lock valid")
            .insert(id, session.clone());

        let ctx = UploadContext {
            config: self.inner.config.clone(),
            scheduler: self.inner.scheduler.clone(),
            request: Arc::new(input),
            source: Arc::new(source),
            session: session.clone(),
        };

        let inner = self.inner.clone();
        let task = tokio::spawn(
            async move {
                let result = upload::orchestrate(ctx).await;
                inner.sessions.lock().expect("lock valid").remove(&id);
                result
            }
            .instrument(tracing::debug_span!("upload-transfer", id = %id)),
        );

        tracing::debug!(id = %id, part_count = plan.part_count(), "upload submitted");
        Ok(TransferHandle { id, session, task })
    }

    /// Progress for an active transfer, `None` once it has finished and been
    /// removed from the registry (or was never known)
    pub fn progress(&self, id: TransferId) -> Option<ProgressSnapshot> {
        self.inner
            .sessions
            .lock()
            .expect("lock valid")
            .get(&id)
            .map(|session| session.progress())
    }

    /// Request cancellation of an active transfer. Returns false if the
    /// transfer is not in the registry. Cancellation is cooperative; parts
    /// already in flight run to completion before the upload is aborted.
    pub fn cancel(&self, id: TransferId) -> bool {
        let sessions = self.inner.sessions.lock().expect("lock valid");
        match sessions.get(&id) {
            Some(session) => {
                session.cancel();
                true
            }
            None => false,
        }
    }

    /// Number of transfers currently registered (submitted and not yet
    /// reached a terminal state)
    pub fn active_transfers(&self) -> usize {
        self.inner.sessions.lock().expect("lock valid").len()
    }
}

/// Handle to a single submitted upload.
///
/// Dropping the handle detaches the transfer rather than cancelling it; the
/// upload keeps running on the runtime. Use [`TransferHandle::cancel`] or
/// [`TransferCoordinator::cancel`] to stop it.
#[derive(Debug)]
pub struct TransferHandle {
    id: TransferId,
    session: Arc<UploadSession>,
    task: tokio::task::JoinHandle<Result<UploadOutput, Error>>,
}

impl TransferHandle {
    /// The coordinator-assigned identifier for this transfer
    pub fn id(&self) -> TransferId {
        self.id
    }

    /// Current lifecycle state of the upload
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Point-in-time progress snapshot
    pub fn progress(&self) -> ProgressSnapshot {
        self.session.progress()
    }

    /// Request cooperative cancellation of this upload
    pub fn cancel(&self) {
        self.session.cancel();
    }

    /// Wait for the upload to reach a terminal state and return its outcome
    pub async fn join(self) -> Result<UploadOutput, Error> {
        self.task.await?
    }
}
