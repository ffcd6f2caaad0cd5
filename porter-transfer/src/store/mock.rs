/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! In-memory [`ObjectStore`] with scriptable failures.
//!
//! Backs the engine's unit and integration tests: it records every call,
//! validates the complete-call part ordering the way a real store does, and
//! can inject transient or permanent failures per operation.

use crate::store::{CompletedPart, ObjectStore, ObjectVersion, StoreError, StoreErrorKind};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Scriptable in-memory object store.
#[derive(Debug, Default)]
pub struct MockStore {
    inner: Mutex<Inner>,
    part_delay: Option<Duration>,
    in_flight: AtomicU32,
    max_in_flight: AtomicU32,
}

#[derive(Debug, Default)]
struct Inner {
    next_upload_id: u64,
    uploads: HashMap<String, MultipartUpload>,
    objects: HashMap<(String, String), Bytes>,
    initiate_failures: Option<FailureScript>,
    part_failures: HashMap<u32, FailureScript>,
    complete_failures: Option<FailureScript>,
    fail_abort: bool,
    initiate_calls: u32,
    part_attempts: HashMap<u32, u32>,
    complete_calls: u32,
    abort_calls: u32,
}

#[derive(Debug)]
struct MultipartUpload {
    bucket: String,
    key: String,
    parts: BTreeMap<u32, (String, Bytes)>,
    completed: bool,
    aborted: bool,
}

#[derive(Debug)]
struct FailureScript {
    remaining: u32,
    kind: StoreErrorKind,
}

impl FailureScript {
    /// Consume one scripted failure, if any remain.
    fn take(&mut self) -> Option<StoreErrorKind> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(self.kind)
    }
}

impl MockStore {
    /// Create a new mock store with no scripted failures
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every `upload_part` call by `delay` before responding
    pub fn with_part_delay(mut self, delay: Duration) -> Self {
        self.part_delay = Some(delay);
        self
    }

    /// Fail the next `times` initiate calls with the given error kind
    pub fn fail_initiate(&self, times: u32, kind: StoreErrorKind) {
        self.lock().initiate_failures = Some(FailureScript { remaining: times, kind });
    }

    /// Fail the next `times` uploads of `part_number` with the given error kind
    pub fn fail_part(&self, part_number: u32, times: u32, kind: StoreErrorKind) {
        self.lock()
            .part_failures
            .insert(part_number, FailureScript { remaining: times, kind });
    }

    /// Fail the next `times` complete calls with the given error kind
    pub fn fail_complete(&self, times: u32, kind: StoreErrorKind) {
        self.lock().complete_failures = Some(FailureScript { remaining: times, kind });
    }

    /// Fail every abort call with a server error
    pub fn fail_abort(&self) {
        self.lock().fail_abort = true;
    }

    /// The assembled object content for `(bucket, key)`, if completed
    pub fn object(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.lock()
            .objects
            .get(&(bucket.to_owned(), key.to_owned()))
            .cloned()
    }

    /// Whether the given upload was aborted
    pub fn aborted(&self, upload_id: &str) -> bool {
        self.lock()
            .uploads
            .get(upload_id)
            .map(|u| u.aborted)
            .unwrap_or(false)
    }

    /// Number of uploads initiated but neither completed nor aborted
    pub fn open_uploads(&self) -> usize {
        self.lock()
            .uploads
            .values()
            .filter(|u| !u.completed && !u.aborted)
            .count()
    }

    /// Total `upload_part` attempts observed for `part_number` (including failures)
    pub fn part_attempts(&self, part_number: u32) -> u32 {
        self.lock().part_attempts.get(&part_number).copied().unwrap_or(0)
    }

    /// Total `upload_part` attempts observed across all parts
    pub fn total_part_attempts(&self) -> u32 {
        self.lock().part_attempts.values().sum()
    }

    /// Number of complete calls observed
    pub fn complete_calls(&self) -> u32 {
        self.lock().complete_calls
    }

    /// Number of abort calls observed
    pub fn abort_calls(&self) -> u32 {
        self.lock().abort_calls
    }

    /// High-water mark of concurrently in-flight `upload_part` calls
    pub fn max_parts_in_flight(&self) -> u32 {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("lock valid")
    }
}

/// Decrements the in-flight counter even if the engine's deadline drops the
/// upload future mid-call.
struct InFlightGuard<'a> {
    store: &'a MockStore,
}

impl<'a> InFlightGuard<'a> {
    fn enter(store: &'a MockStore) -> Self {
        let current = store.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        store.max_in_flight.fetch_max(current, Ordering::SeqCst);
        Self { store }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.store.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

fn injected(kind: StoreErrorKind, operation: &str) -> StoreError {
    StoreError::new(kind, format!("injected {operation} failure"))
}

#[async_trait]
impl ObjectStore for MockStore {
    async fn initiate_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        _metadata: &HashMap<String, String>,
    ) -> Result<String, StoreError> {
        let mut inner = self.lock();
        inner.initiate_calls += 1;
        if let Some(kind) = inner.initiate_failures.as_mut().and_then(FailureScript::take) {
            return Err(injected(kind, "initiate"));
        }
        inner.next_upload_id += 1;
        let upload_id = format!("upload-{}", inner.next_upload_id);
        inner.uploads.insert(
            upload_id.clone(),
            MultipartUpload {
                bucket: bucket.to_owned(),
                key: key.to_owned(),
                parts: BTreeMap::new(),
                completed: false,
                aborted: false,
            },
        );
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        _bucket: &str,
        _key: &str,
        upload_id: &str,
        part_number: u32,
        body: Bytes,
    ) -> Result<String, StoreError> {
        let _guard = InFlightGuard::enter(self);
        {
            let mut inner = self.lock();
            *inner.part_attempts.entry(part_number).or_insert(0) += 1;
        }
        if let Some(delay) = self.part_delay {
            tokio::time::sleep(delay).await;
        }
        let mut inner = self.lock();
        if let Some(kind) = inner
            .part_failures
            .get_mut(&part_number)
            .and_then(FailureScript::take)
        {
            return Err(injected(kind, "upload-part"));
        }
        let upload = inner
            .uploads
            .get_mut(upload_id)
            .filter(|u| !u.aborted && !u.completed)
            .ok_or_else(|| StoreError::client(format!("no such upload: {upload_id}")))?;
        let e_tag = format!("\"{upload_id}-{part_number}-{}\"", body.len());
        // same part number overwrites any prior attempt, as the protocol guarantees
        upload.parts.insert(part_number, (e_tag.clone(), body));
        Ok(e_tag)
    }

    async fn complete_multipart_upload(
        &self,
        _bucket: &str,
        _key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<ObjectVersion, StoreError> {
        let mut inner = self.lock();
        inner.complete_calls += 1;
        if let Some(kind) = inner.complete_failures.as_mut().and_then(FailureScript::take) {
            return Err(injected(kind, "complete"));
        }
        // stores reject out-of-order or duplicated part lists
        let ordered = parts
            .windows(2)
            .all(|w| w[0].part_number() < w[1].part_number());
        if parts.is_empty() || !ordered {
            return Err(StoreError::client("part list must be ascending and non-empty"));
        }
        let upload = inner
            .uploads
            .get_mut(upload_id)
            .filter(|u| !u.aborted && !u.completed)
            .ok_or_else(|| StoreError::client(format!("no such upload: {upload_id}")))?;

        let mut assembled = Vec::new();
        for part in parts {
            let (e_tag, data) = upload
                .parts
                .get(&part.part_number())
                .ok_or_else(|| StoreError::client(format!("part {} never uploaded", part.part_number())))?;
            if e_tag != part.e_tag() {
                return Err(StoreError::client(format!("e_tag mismatch for part {}", part.part_number())));
            }
            assembled.extend_from_slice(data);
        }
        upload.completed = true;
        let location = (upload.bucket.clone(), upload.key.clone());
        inner.objects.insert(location, Bytes::from(assembled));
        Ok(ObjectVersion::new(
            Some(format!("\"etag-{upload_id}\"")),
            Some(format!("v-{upload_id}")),
        ))
    }

    async fn abort_multipart_upload(
        &self,
        _bucket: &str,
        _key: &str,
        upload_id: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.abort_calls += 1;
        if inner.fail_abort {
            return Err(StoreError::server("injected abort failure"));
        }
        let upload = inner
            .uploads
            .get_mut(upload_id)
            .filter(|u| !u.completed)
            .ok_or_else(|| StoreError::client(format!("no such upload: {upload_id}")))?;
        upload.aborted = true;
        upload.parts.clear();
        Ok(())
    }
}
