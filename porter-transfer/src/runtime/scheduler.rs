/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use pin_project_lite::pin_project;
use std::future::Future;
use std::sync::Arc;
use std::task::Poll;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio_util::sync::PollSemaphore;

use crate::error;

/// Manages scheduling of part-upload work across every active session.
///
/// One permit corresponds to one in-flight part request; the permit count is
/// the engine-wide ceiling on concurrently in-flight parts. Scheduler is
/// internally reference-counted and can be freely cloned.
#[derive(Debug, Clone)]
pub(crate) struct Scheduler {
    // NOTE: tokio semaphore is fair, permits are given out in the order requested
    semaphore: Arc<Semaphore>,
}

impl Scheduler {
    /// Create a new scheduler with the given number of work permits.
    pub(crate) fn new(permits: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(permits)),
        }
    }

    /// Acquire a permit to perform one unit of network work
    pub(crate) fn acquire_permit(&self) -> AcquirePermitFuture {
        match self.try_acquire_permit() {
            Ok(Some(permit)) => AcquirePermitFuture::ready(Ok(permit)),
            Ok(None) => AcquirePermitFuture::pending(PollSemaphore::new(self.semaphore.clone())),
            Err(err) => AcquirePermitFuture::ready(Err(err)),
        }
    }

    fn try_acquire_permit(&self) -> Result<Option<OwnedWorkPermit>, error::Error> {
        match self.semaphore.clone().try_acquire_owned() {
            Ok(permit) => Ok(Some(OwnedWorkPermit::from(permit))),
            Err(TryAcquireError::NoPermits) => Ok(None),
            Err(err @ TryAcquireError::Closed) => {
                Err(error::Error::new(error::ErrorKind::RuntimeError, err))
            }
        }
    }
}

/// An owned permit from the scheduler to perform some unit of work.
#[must_use]
#[clippy::has_significant_drop]
#[derive(Debug)]
pub(crate) struct OwnedWorkPermit {
    _inner: OwnedSemaphorePermit,
}

impl From<OwnedSemaphorePermit> for OwnedWorkPermit {
    fn from(value: OwnedSemaphorePermit) -> Self {
        Self { _inner: value }
    }
}

pin_project! {
    /// Future returned by [`Scheduler::acquire_permit`]
    #[derive(Debug)]
    pub(crate) struct AcquirePermitFuture {
        ready: Option<Result<OwnedWorkPermit, error::Error>>,
        sem: Option<PollSemaphore>,
    }
}

impl AcquirePermitFuture {
    fn ready(result: Result<OwnedWorkPermit, error::Error>) -> Self {
        Self {
            ready: Some(result),
            sem: None,
        }
    }

    fn pending(sem: PollSemaphore) -> Self {
        Self {
            ready: None,
            sem: Some(sem),
        }
    }
}

impl Future for AcquirePermitFuture {
    type Output = Result<OwnedWorkPermit, error::Error>;

    fn poll(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Self::Output> {
        let this = self.project();
        if let Some(result) = this.ready.take() {
            return Poll::Ready(result);
        }
        let sem = this.sem.as_mut().expect("future polled after completion");
        match sem.poll_acquire(cx) {
            Poll::Ready(Some(permit)) => Poll::Ready(Ok(OwnedWorkPermit::from(permit))),
            Poll::Ready(None) => Poll::Ready(Err(error::Error::new(
                error::ErrorKind::RuntimeError,
                "semaphore closed",
            ))),
            Poll::Pending => Poll::Pending,
        }
    }
}
