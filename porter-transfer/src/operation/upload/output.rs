/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

/// Output of a completed multipart upload.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct UploadOutput {
    pub(crate) bucket: String,
    pub(crate) key: String,
    pub(crate) upload_id: String,
    pub(crate) e_tag: Option<String>,
    pub(crate) version_id: Option<String>,
}

impl UploadOutput {
    /// The bucket the object was written to
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// The key of the assembled object
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The upload ID the store assigned to this multipart upload
    pub fn upload_id(&self) -> &str {
        &self.upload_id
    }

    /// Entity tag of the assembled object, if the store returned one
    pub fn e_tag(&self) -> Option<&str> {
        self.e_tag.as_deref()
    }

    /// Version ID of the assembled object, if versioning is enabled
    pub fn version_id(&self) -> Option<&str> {
        self.version_id.as_deref()
    }
}
