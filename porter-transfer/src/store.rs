/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Abstract wire-protocol seam to an S3-compatible object store.
//!
//! The engine is independent of any specific SDK; it drives a multipart
//! upload through the four operations of [`ObjectStore`]. Implementations are
//! expected to handle signing and transport; classification of failures into
//! transient/permanent is done through [`StoreError`].

/// In-memory [`ObjectStore`] implementation for tests and local development
pub mod mock;

use crate::error::BoxError;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;

/// A `(part_number, e_tag)` pair recorded for a completed part.
///
/// The complete call requires these sorted by part number ascending; the
/// engine restores that ordering at the protocol boundary regardless of the
/// order in which parts finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    part_number: u32,
    e_tag: String,
}

impl CompletedPart {
    /// Create a new completed part record
    pub fn new(part_number: u32, e_tag: impl Into<String>) -> Self {
        Self {
            part_number,
            e_tag: e_tag.into(),
        }
    }

    /// The 1-indexed part number
    pub fn part_number(&self) -> u32 {
        self.part_number
    }

    /// The entity tag the store returned for this part
    pub fn e_tag(&self) -> &str {
        &self.e_tag
    }
}

/// Identity of the object version produced by a completed multipart upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectVersion {
    e_tag: Option<String>,
    version_id: Option<String>,
}

impl ObjectVersion {
    /// Create a new object version
    pub fn new(e_tag: Option<String>, version_id: Option<String>) -> Self {
        Self { e_tag, version_id }
    }

    /// The entity tag of the assembled object, if the store returned one
    pub fn e_tag(&self) -> Option<&str> {
        self.e_tag.as_deref()
    }

    /// The version ID of the assembled object, if versioning is enabled
    pub fn version_id(&self) -> Option<&str> {
        self.version_id.as_deref()
    }
}

/// Errors produced by an [`ObjectStore`] implementation.
#[derive(Debug)]
pub struct StoreError {
    kind: StoreErrorKind,
    source: BoxError,
}

/// Classification of wire-protocol failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum StoreErrorKind {
    /// Connection-level failure (reset, refused, DNS, ...)
    Network,

    /// The per-call deadline elapsed before the store responded
    Timeout,

    /// The store signalled throttling (e.g. 503 SlowDown)
    Throttling,

    /// Server-side failure (5xx)
    Server,

    /// Client-side rejection (4xx other than throttling)
    Client,

    /// Authentication or signature failure
    Auth,
}

impl StoreError {
    /// Create a new [`StoreError`] from a kind and an arbitrary source
    pub fn new<E>(kind: StoreErrorKind, err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self {
            kind,
            source: err.into(),
        }
    }

    /// The classification of this failure
    pub fn kind(&self) -> StoreErrorKind {
        self.kind
    }

    /// Whether the failure is worth retrying.
    ///
    /// Network errors, timeouts, throttling and 5xx responses are transient;
    /// other 4xx and auth failures are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            StoreErrorKind::Network
                | StoreErrorKind::Timeout
                | StoreErrorKind::Throttling
                | StoreErrorKind::Server
        )
    }

    /// Convenience constructor for [`StoreErrorKind::Network`]
    pub fn network<E: Into<BoxError>>(err: E) -> Self {
        Self::new(StoreErrorKind::Network, err)
    }

    /// Convenience constructor for [`StoreErrorKind::Timeout`]
    pub fn timeout<E: Into<BoxError>>(err: E) -> Self {
        Self::new(StoreErrorKind::Timeout, err)
    }

    /// Convenience constructor for [`StoreErrorKind::Throttling`]
    pub fn throttling<E: Into<BoxError>>(err: E) -> Self {
        Self::new(StoreErrorKind::Throttling, err)
    }

    /// Convenience constructor for [`StoreErrorKind::Server`]
    pub fn server<E: Into<BoxError>>(err: E) -> Self {
        Self::new(StoreErrorKind::Server, err)
    }

    /// Convenience constructor for [`StoreErrorKind::Client`]
    pub fn client<E: Into<BoxError>>(err: E) -> Self {
        Self::new(StoreErrorKind::Client, err)
    }

    /// Convenience constructor for [`StoreErrorKind::Auth`]
    pub fn auth<E: Into<BoxError>>(err: E) -> Self {
        Self::new(StoreErrorKind::Auth, err)
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            StoreErrorKind::Network => write!(f, "network error"),
            StoreErrorKind::Timeout => write!(f, "request deadline elapsed"),
            StoreErrorKind::Throttling => write!(f, "throttled by the store"),
            StoreErrorKind::Server => write!(f, "store-side error"),
            StoreErrorKind::Client => write!(f, "request rejected by the store"),
            StoreErrorKind::Auth => write!(f, "authentication failure"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

/// The multipart upload operations of an S3-compatible object store.
///
/// Implementations must be safe to call concurrently; the engine issues
/// parallel `upload_part` calls for the same upload ID.
#[async_trait]
pub trait ObjectStore: fmt::Debug + Send + Sync {
    /// Start a multipart upload for `key`, returning the store-assigned
    /// upload ID. `metadata` carries object metadata such as content type.
    async fn initiate_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<String, StoreError>;

    /// Upload a single part, returning its entity tag.
    ///
    /// Re-uploading the same `part_number` overwrites any prior attempt for
    /// that part, which is what makes the engine's retries idempotent.
    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: u32,
        body: Bytes,
    ) -> Result<String, StoreError>;

    /// Assemble the object from the given parts. `parts` must be sorted by
    /// part number ascending; stores reject trailing or out-of-order lists.
    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<ObjectVersion, StoreError>;

    /// Abort the multipart upload, discarding any stored parts.
    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<(), StoreError>;
}
