/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::fmt;

/// A boxed error that is `Send` and `Sync`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors returned by this library
///
/// NOTE: Display only renders the top-level category; walk the
/// [`source`](std::error::Error::source) chain for the underlying cause.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    source: BoxError,
}

/// General categories of transfer errors.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Operation input validation issues
    InputInvalid,

    /// Part planning failed before anything was sent to the store
    Planning(PlanningErrorKind),

    /// The remote initiate call failed after exhausting its retry budget
    InitiationFailed,

    /// A single part failed all retry attempts or hit a permanent remote error
    PartFailed(PartFailed),

    /// Complete was attempted without every planned part recorded
    IncompletePartSet,

    /// The session failed with parts already stored remotely; caller-driven
    /// cleanup is required (retry completion, abort, or a lifecycle sweep)
    PartialUploadIncomplete(FailedTransfer),

    /// The remote abort call itself failed; a cleanup sweep is required
    AbortIncomplete(FailedTransfer),

    /// The operation was cancelled via its handle or the coordinator
    OperationCancelled,

    /// I/O errors
    IOError,

    /// Some kind of internal runtime issue (e.g. task failure, poisoned mutex, etc)
    RuntimeError,
}

/// Part planning violations. Local and never retried.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum PlanningErrorKind {
    /// The object is too small to be uploaded as a multipart upload; the
    /// caller should use a single-shot upload instead.
    SizeTooSmallForMultipart,

    /// The object cannot be split without exceeding the protocol's part count
    /// limit, even after recomputing the part size.
    TooManyParts,
}

/// Stores information about a failed part
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PartFailed {
    part_number: u32,
}

impl PartFailed {
    /// The 1-indexed number of the part that failed
    pub fn part_number(&self) -> u32 {
        self.part_number
    }
}

/// Context for a transfer that ended with parts (possibly) still stored at the
/// remote. Carries enough information for the caller to decide between
/// re-attempting completion, aborting, or leaving the parts for a periodic
/// cleanup sweep.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FailedTransfer {
    upload_id: Option<String>,
    key: String,
    completed_parts: u32,
}

impl FailedTransfer {
    pub(crate) fn new(upload_id: Option<String>, key: impl Into<String>, completed_parts: u32) -> Self {
        Self {
            upload_id,
            key: key.into(),
            completed_parts,
        }
    }

    /// The upload ID assigned by the remote store, if initiate succeeded
    pub fn upload_id(&self) -> Option<&str> {
        self.upload_id.as_deref()
    }

    /// The object key the transfer was writing
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Number of parts successfully uploaded before the failure
    pub fn completed_parts(&self) -> u32 {
        self.completed_parts
    }
}

impl Error {
    /// Creates a new transfer [`Error`] from a known kind of error as well as an arbitrary error
    /// source.
    pub fn new<E>(kind: ErrorKind, err: E) -> Error
    where
        E: Into<BoxError>,
    {
        Error {
            kind,
            source: err.into(),
        }
    }

    /// Returns the corresponding [`ErrorKind`] for this error.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::InputInvalid => write!(f, "invalid input"),
            ErrorKind::Planning(PlanningErrorKind::SizeTooSmallForMultipart) => {
                write!(f, "object too small for multipart upload")
            }
            ErrorKind::Planning(PlanningErrorKind::TooManyParts) => {
                write!(f, "part count would exceed the protocol limit")
            }
            ErrorKind::InitiationFailed => write!(f, "failed to initiate multipart upload"),
            ErrorKind::PartFailed(part_failed) => {
                write!(f, "failed to upload part {}", part_failed.part_number)
            }
            ErrorKind::IncompletePartSet => {
                write!(f, "not all planned parts have been uploaded")
            }
            ErrorKind::PartialUploadIncomplete(ctx) => write!(
                f,
                "upload failed with {} part(s) stored remotely (upload id: {:?}, key: {})",
                ctx.completed_parts, ctx.upload_id, ctx.key
            ),
            ErrorKind::AbortIncomplete(ctx) => write!(
                f,
                "failed to abort multipart upload (upload id: {:?}, key: {})",
                ctx.upload_id, ctx.key
            ),
            ErrorKind::OperationCancelled => write!(f, "operation cancelled"),
            ErrorKind::IOError => write!(f, "I/O error"),
            ErrorKind::RuntimeError => write!(f, "runtime error"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::new(ErrorKind::IOError, value)
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(value: tokio::task::JoinError) -> Self {
        Self::new(ErrorKind::RuntimeError, value)
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error
where
    T: Send + Sync + 'static,
{
    fn from(value: std::sync::PoisonError<T>) -> Self {
        Self::new(ErrorKind::RuntimeError, value)
    }
}

pub(crate) fn invalid_input<E>(err: E) -> Error
where
    E: Into<BoxError>,
{
    Error::new(ErrorKind::InputInvalid, err)
}

pub(crate) fn planning<E>(kind: PlanningErrorKind, err: E) -> Error
where
    E: Into<BoxError>,
{
    Error::new(ErrorKind::Planning(kind), err)
}

pub(crate) fn initiation_failed<E>(err: E) -> Error
where
    E: Into<BoxError>,
{
    Error::new(ErrorKind::InitiationFailed, err)
}

pub(crate) fn part_failed<E>(part_number: u32, err: E) -> Error
where
    E: Into<BoxError>,
{
    Error::new(ErrorKind::PartFailed(PartFailed { part_number }), err)
}

pub(crate) fn incomplete_part_set(recorded: u32, planned: u32) -> Error {
    Error::new(
        ErrorKind::IncompletePartSet,
        format!("{recorded} of {planned} planned parts recorded"),
    )
}

pub(crate) fn partial_upload_incomplete<E>(ctx: FailedTransfer, err: E) -> Error
where
    E: Into<BoxError>,
{
    Error::new(ErrorKind::PartialUploadIncomplete(ctx), err)
}

pub(crate) fn abort_incomplete<E>(ctx: FailedTransfer, err: E) -> Error
where
    E: Into<BoxError>,
{
    Error::new(ErrorKind::AbortIncomplete(ctx), err)
}

static CANCELLATION_ERROR: &str =
    "the operation has been cancelled, no further parts will be dispatched";

pub(crate) fn operation_cancelled() -> Error {
    Error::new(ErrorKind::OperationCancelled, CANCELLATION_ERROR)
}
