/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use crate::error::{self, Error};
use crate::planner::UploadPlan;
use crate::store::CompletedPart;
use crate::types::{PartResult, ProgressSnapshot};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};

/// Lifecycle of an upload session.
///
/// Transitions only move forward; once a terminal state is reached the
/// session never changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Planned but the remote upload has not been initiated yet
    Created,
    /// Parts are being dispatched and uploaded
    InProgress,
    /// All parts recorded, the complete call is in flight
    Completing,
    /// The object was assembled successfully (terminal)
    Completed,
    /// An abort has been requested and is in flight
    Aborting,
    /// The upload was aborted (terminal)
    Aborted,
    /// The upload failed and could not be cleaned up (terminal)
    Failed,
}

impl SessionState {
    /// Whether the session can no longer change state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Aborted | SessionState::Failed
        )
    }
}

/// Shared state for a single in-flight multipart upload.
///
/// One instance per transfer, shared between the orchestrating task, the
/// part-upload workers, and the caller-facing handle. All interior
/// mutability; methods never hold more than one lock at a time.
#[derive(Debug)]
pub struct UploadSession {
    plan: UploadPlan,
    state: Mutex<SessionState>,
    upload_id: OnceLock<String>,
    completed_parts: Mutex<BTreeMap<u32, PartResult>>,
    cancelled: AtomicBool,
    abort_requested: AtomicBool,
}

impl UploadSession {
    pub(crate) fn new(plan: UploadPlan) -> Self {
        Self {
            plan,
            state: Mutex::new(SessionState::Created),
            upload_id: OnceLock::new(),
            completed_parts: Mutex::new(BTreeMap::new()),
            cancelled: AtomicBool::new(false),
            abort_requested: AtomicBool::new(false),
        }
    }

    /// The plan this session is executing
    pub fn plan(&self) -> &UploadPlan {
        &self.plan
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        *self.state.lock().expect("lock valid")
    }

    /// Advance the session state. Terminal states are sticky.
    pub(crate) fn set_state(&self, next: SessionState) {
        let mut state = self.state.lock().expect("lock valid");
        if state.is_terminal() {
            tracing::trace!(current = ?*state, requested = ?next, "ignoring transition out of terminal state");
            return;
        }
        tracing::trace!(from = ?*state, to = ?next, "session state transition");
        *state = next;
    }

    /// Record the upload ID assigned by the store. First write wins.
    pub(crate) fn set_upload_id(&self, upload_id: String) {
        let _ = self.upload_id.set(upload_id);
    }

    /// The store-assigned upload ID, if initiate has succeeded
    pub fn upload_id(&self) -> Option<&str> {
        self.upload_id.get().map(String::as_str)
    }

    /// Request cooperative cancellation. Parts already in flight run to
    /// completion; no further parts will be dispatched.
    pub(crate) fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested
    pub fn cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Mark the session for abort after a part failure so that sibling
    /// workers stop picking up new work.
    pub(crate) fn request_abort(&self) {
        self.abort_requested.store(true, Ordering::SeqCst);
    }

    /// Whether workers should stop dispatching new parts
    pub(crate) fn dispatch_stopped(&self) -> bool {
        self.cancelled() || self.abort_requested.load(Ordering::SeqCst)
    }

    /// Record a successfully uploaded part. Results arrive in completion
    /// order, not part order.
    pub(crate) fn record_part(&self, result: PartResult) {
        let mut parts = self.completed_parts.lock().expect("lock valid");
        if let Some(prev) = parts.insert(result.part_number(), result) {
            tracing::warn!(
                part_number = prev.part_number(),
                "duplicate part result recorded, keeping the latest"
            );
        }
    }

    /// Number of parts recorded so far
    pub(crate) fn recorded_parts(&self) -> u32 {
        self.completed_parts.lock().expect("lock valid").len() as u32
    }

    /// Point-in-time progress snapshot
    pub fn progress(&self) -> ProgressSnapshot {
        let parts = self.completed_parts.lock().expect("lock valid");
        let bytes_completed = parts.values().map(PartResult::size_uploaded).sum();
        ProgressSnapshot {
            bytes_completed,
            bytes_total: self.plan.total_size(),
            parts_completed: parts.len() as u32,
            parts_total: self.plan.part_count(),
        }
    }

    /// The `(part_number, e_tag)` list for the complete call, sorted
    /// ascending by part number. Fails if any planned part is missing.
    pub(crate) fn completed_part_list(&self) -> Result<Vec<CompletedPart>, Error> {
        let parts = self.completed_parts.lock().expect("lock valid");
        if parts.len() as u32 != self.plan.part_count() {
            return Err(error::incomplete_part_set(
                parts.len() as u32,
                self.plan.part_count(),
            ));
        }
        // BTreeMap iteration is already ascending by part number
        Ok(parts
            .values()
            .map(|p| CompletedPart::new(p.part_number(), p.e_tag()))
            .collect())
    }
}
