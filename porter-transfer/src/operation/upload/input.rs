/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use crate::error::{self, Error};
use crate::io::DataSource;
use std::collections::HashMap;

/// Input for a single multipart upload.
#[derive(Debug)]
#[non_exhaustive]
pub struct UploadInput {
    bucket: String,
    key: String,
    metadata: HashMap<String, String>,
    source: Option<DataSource>,
}

impl UploadInput {
    /// Create a new builder
    pub fn builder() -> UploadInputBuilder {
        UploadInputBuilder::default()
    }

    /// The bucket the object will be written to
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// The key of the object
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Object metadata forwarded to initiate (content type, user metadata, ...)
    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    /// Take the byte source out of the input for processing; the remaining
    /// fields stay available for the duration of the transfer.
    pub(crate) fn take_source(&mut self) -> Option<DataSource> {
        self.source.take()
    }
}

/// Fluent builder for [`UploadInput`]
#[derive(Debug, Default)]
pub struct UploadInputBuilder {
    bucket: Option<String>,
    key: Option<String>,
    metadata: HashMap<String, String>,
    source: Option<DataSource>,
}

impl UploadInputBuilder {
    /// The bucket the object will be written to
    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    /// The key of the object
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Add a single metadata entry (e.g. `Content-Type`)
    pub fn metadata(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(name.into(), value.into());
        self
    }

    /// Replace the full metadata map
    pub fn set_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    /// The byte source to upload
    pub fn source(mut self, source: impl Into<DataSource>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Validate and build the input
    pub fn build(self) -> Result<UploadInput, Error> {
        let bucket = self
            .bucket
            .filter(|b| !b.is_empty())
            .ok_or_else(|| error::invalid_input("bucket is required"))?;
        let key = self
            .key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| error::invalid_input("key is required"))?;
        let source = self
            .source
            .ok_or_else(|| error::invalid_input("source is required"))?;
        Ok(UploadInput {
            bucket,
            key,
            metadata: self.metadata,
            source: Some(source),
        })
    }
}
