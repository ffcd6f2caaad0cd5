/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Multipart upload engine for S3-compatible object stores.
//!
//! The engine splits a byte source into parts, uploads the parts concurrently
//! over an abstract wire-protocol seam ([`store::ObjectStore`]), and completes
//! (or aborts) the multipart upload at the remote store. Concurrency across
//! every active upload is bounded by a single shared scheduler.
//!
//! The entry point is [`TransferCoordinator`].

#![warn(
    missing_debug_implementations,
    missing_docs,
    rustdoc::missing_crate_level_docs,
    unreachable_pub,
    rust_2018_idioms
)]

pub(crate) const MEBIBYTE: u64 = 1024 * 1024;

/// Minimum size of any part other than the last, imposed by the protocol
pub(crate) const MIN_PART_SIZE_BYTES: u64 = 5 * MEBIBYTE;

/// Maximum number of parts that a single multipart upload supports
pub(crate) const MAX_PART_COUNT: u32 = 10_000;

pub(crate) const DEFAULT_PART_SIZE_BYTES: u64 = 8 * MEBIBYTE;

pub(crate) const DEFAULT_CONCURRENCY: usize = 10;

/// Error types emitted by `porter-transfer`
pub mod error;

/// Common types used by `porter-transfer`
pub mod types;

/// Engine configuration
pub mod config;

/// Wire-protocol seam to the object store
pub mod store;

/// Part planning for multipart uploads
pub mod planner;

/// Types and helpers for I/O
pub mod io;

/// Transfer coordinator and handles
pub mod coordinator;

/// Upload operations
pub mod operation;

mod runtime;

pub use config::Config;
pub use coordinator::{TransferCoordinator, TransferHandle};
pub use runtime::backoff::BackoffPolicy;
