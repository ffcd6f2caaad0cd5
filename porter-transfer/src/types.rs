/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::fmt;

/// The target part size for an upload request.
#[derive(Debug, Clone, Default)]
pub enum PartSize {
    /// Use the engine default target part size (8 MiB).
    #[default]
    Auto,

    /// Target part size explicitly given.
    ///
    /// NOTE: This is a suggestion and may be adjusted for an individual request
    /// as required by the underlying protocol (minimum part size, maximum part
    /// count).
    Target(u64),
}

/// The global concurrency setting shared by every upload session.
#[derive(Debug, Clone, Default)]
pub enum ConcurrencySetting {
    /// Use the engine default for concurrently in-flight parts (10).
    #[default]
    Auto,

    /// Explicitly configured number of concurrently in-flight parts.
    Explicit(usize),
}

/// Opaque identifier for a submitted transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransferId(u64);

impl TransferId {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transfer-{}", self.0)
    }
}

/// Result of uploading a single part. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartResult {
    part_number: u32,
    e_tag: String,
    size_uploaded: u64,
}

impl PartResult {
    pub(crate) fn new(part_number: u32, e_tag: impl Into<String>, size_uploaded: u64) -> Self {
        Self {
            part_number,
            e_tag: e_tag.into(),
            size_uploaded,
        }
    }

    /// The 1-indexed part number
    pub fn part_number(&self) -> u32 {
        self.part_number
    }

    /// The entity tag returned by the store for this part
    pub fn e_tag(&self) -> &str {
        &self.e_tag
    }

    /// Number of bytes uploaded for this part
    pub fn size_uploaded(&self) -> u64 {
        self.size_uploaded
    }
}

/// Point-in-time view of an upload's progress.
///
/// Produced by snapshotting the session's recorded parts; reading it never
/// blocks beyond the mutex protecting that record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub(crate) bytes_completed: u64,
    pub(crate) bytes_total: u64,
    pub(crate) parts_completed: u32,
    pub(crate) parts_total: u32,
}

impl ProgressSnapshot {
    /// Bytes confirmed uploaded so far
    pub fn bytes_completed(&self) -> u64 {
        self.bytes_completed
    }

    /// Total bytes the upload will transfer
    pub fn bytes_total(&self) -> u64 {
        self.bytes_total
    }

    /// Parts confirmed uploaded so far
    pub fn parts_completed(&self) -> u32 {
        self.parts_completed
    }

    /// Total number of planned parts
    pub fn parts_total(&self) -> u32 {
        self.parts_total
    }
}
