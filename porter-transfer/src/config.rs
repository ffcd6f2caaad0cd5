/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use crate::runtime::backoff::BackoffPolicy;
use crate::store::ObjectStore;
use crate::types::{ConcurrencySetting, PartSize};
use crate::{DEFAULT_CONCURRENCY, DEFAULT_PART_SIZE_BYTES, MEBIBYTE, MIN_PART_SIZE_BYTES};
use std::cmp;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 5;
const DEFAULT_PART_SIZE_ALIGNMENT: u64 = MEBIBYTE;
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_PRESIGNED_URL_EXPIRY: Duration = Duration::from_secs(15 * 60);

/// Configuration for a [`TransferCoordinator`](crate::coordinator::TransferCoordinator)
#[derive(Debug, Clone)]
pub struct Config {
    part_size: PartSize,
    part_size_alignment: u64,
    concurrency: ConcurrencySetting,
    max_retry_attempts: u32,
    backoff: BackoffPolicy,
    connect_timeout: Duration,
    read_timeout: Duration,
    presigned_url_expiry: Duration,
    store: Arc<dyn ObjectStore>,
}

impl Config {
    /// Create a new `Config` builder
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Returns a reference to the target part size policy
    pub fn part_size(&self) -> &PartSize {
        &self.part_size
    }

    /// The resolved target part size in bytes
    pub fn part_size_bytes(&self) -> u64 {
        match self.part_size {
            PartSize::Auto => DEFAULT_PART_SIZE_BYTES,
            PartSize::Target(bytes) => bytes,
        }
    }

    /// Alignment applied when the part size must be recomputed to honor the
    /// protocol's part count limit
    pub fn part_size_alignment(&self) -> u64 {
        self.part_size_alignment
    }

    /// Returns the concurrency setting shared by all upload sessions
    pub fn concurrency(&self) -> &ConcurrencySetting {
        &self.concurrency
    }

    /// The resolved ceiling on concurrently in-flight parts across sessions
    pub fn max_concurrent_parts(&self) -> usize {
        match self.concurrency {
            ConcurrencySetting::Auto => DEFAULT_CONCURRENCY,
            ConcurrencySetting::Explicit(n) => cmp::max(n, 1),
        }
    }

    /// Total attempts (first try included) for each retryable remote call
    pub fn max_retry_attempts(&self) -> u32 {
        self.max_retry_attempts
    }

    /// The backoff policy applied between retry attempts
    pub fn backoff(&self) -> BackoffPolicy {
        self.backoff
    }

    /// Time allowed to establish a connection to the store
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Time allowed for the store to respond once connected
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// The deadline applied to each individual remote call
    pub fn request_timeout(&self) -> Duration {
        self.connect_timeout + self.read_timeout
    }

    /// Expiry for presigned URLs.
    ///
    /// Recognized for the presigning collaborator that sits outside this
    /// engine; the upload path itself does not consume it.
    pub fn presigned_url_expiry(&self) -> Duration {
        self.presigned_url_expiry
    }

    /// The object store instance that will be used to send requests to
    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }
}

/// Fluent style builder for [Config]
#[derive(Debug, Default)]
pub struct Builder {
    part_size: PartSize,
    part_size_alignment: Option<u64>,
    concurrency: ConcurrencySetting,
    max_retry_attempts: Option<u32>,
    backoff: Option<BackoffPolicy>,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    presigned_url_expiry: Option<Duration>,
    store: Option<Arc<dyn ObjectStore>>,
}

impl Builder {
    /// The target size of each part of a multipart upload.
    ///
    /// The minimum part size is 5 MiB, any target less than that will be
    /// rounded up. The actual part size used may be larger than the
    /// configured part size if the current value would result in more than
    /// 10,000 parts for an upload request.
    ///
    /// Default is [PartSize::Auto] (8 MiB).
    pub fn part_size(mut self, part_size: PartSize) -> Self {
        self.part_size = match part_size {
            PartSize::Target(bytes) => PartSize::Target(cmp::max(bytes, MIN_PART_SIZE_BYTES)),
            tps => tps,
        };
        self
    }

    /// Alignment for recomputed part sizes (default 1 MiB)
    pub fn part_size_alignment(mut self, alignment: u64) -> Self {
        self.part_size_alignment = Some(cmp::max(alignment, 1));
        self
    }

    /// Set the concurrency level the engine is allowed to use.
    ///
    /// This is the maximum number of concurrently in-flight part requests
    /// across every active upload session, not per session.
    /// Default is [ConcurrencySetting::Auto] (10).
    pub fn concurrency(mut self, concurrency: ConcurrencySetting) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Total attempts for each retryable remote call (default 5, minimum 1)
    pub fn max_retry_attempts(mut self, attempts: u32) -> Self {
        self.max_retry_attempts = Some(cmp::max(attempts, 1));
        self
    }

    /// Backoff policy between retry attempts (default: 200ms base, factor 2,
    /// capped at 20s, jittered)
    pub fn backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = Some(backoff);
        self
    }

    /// Time allowed to establish a connection (default 5s)
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Time allowed for the store to respond once connected (default 60s)
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Expiry for presigned URLs issued by the surrounding service (default 15 minutes)
    pub fn presigned_url_expiry(mut self, expiry: Duration) -> Self {
        self.presigned_url_expiry = Some(expiry);
        self
    }

    /// Set the object store implementation to upload through
    pub fn store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Consumes the builder and constructs a [`Config`](crate::config::Config)
    pub fn build(self) -> Config {
        Config {
            part_size: self.part_size,
            part_size_alignment: self.part_size_alignment.unwrap_or(DEFAULT_PART_SIZE_ALIGNMENT),
            concurrency: self.concurrency,
            max_retry_attempts: self.max_retry_attempts.unwrap_or(DEFAULT_MAX_RETRY_ATTEMPTS),
            backoff: self.backoff.unwrap_or_default(),
            connect_timeout: self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            read_timeout: self.read_timeout.unwrap_or(DEFAULT_READ_TIMEOUT),
            presigned_url_expiry: self
                .presigned_url_expiry
                .unwrap_or(DEFAULT_PRESIGNED_URL_EXPIRY),
            store: self.store.expect("store set"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::mock::MockStore;

    #[test]
    fn test_part_size_clamped_to_protocol_minimum() {
        let config = Config::builder()
            .part_size(PartSize::Target(1024))
            .store(Arc::new(MockStore::new()))
            .build();
        assert_eq!(MIN_PART_SIZE_BYTES, config.part_size_bytes());
    }

    #[test]
    fn test_defaults() {
        let config = Config::builder().store(Arc::new(MockStore::new())).build();
        assert_eq!(DEFAULT_PART_SIZE_BYTES, config.part_size_bytes());
        assert_eq!(DEFAULT_CONCURRENCY, config.max_concurrent_parts());
        assert_eq!(DEFAULT_MAX_RETRY_ATTEMPTS, config.max_retry_attempts());
        assert_eq!(Duration::from_secs(65), config.request_timeout());
    }
}
