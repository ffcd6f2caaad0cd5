/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use crate::config::Config;
use crate::error::{self, Error};
use crate::operation::upload::UploadContext;
use crate::planner::PartTask;
use crate::store::StoreError;
use crate::types::PartResult;
use std::cmp;
use std::future::Future;
use tokio::task::JoinSet;
use tracing::Instrument;

/// Upload every planned part through a pool of workers.
///
/// Parts are fed through a bounded channel to `min(part_count, concurrency)`
/// workers. Dispatch stops at the channel boundary when the session is
/// cancelled or a part has failed; parts already in flight run to completion.
/// Returns the first error any worker hit.
pub(super) async fn upload_parts(ctx: &UploadContext) -> Result<(), Error> {
    let plan = *ctx.session.plan();
    let workers = cmp::max(
        cmp::min(plan.part_count() as usize, ctx.config.max_concurrent_parts()),
        1,
    );

    let (tx, rx) = async_channel::bounded::<PartTask>(workers);
    let mut tasks: JoinSet<Result<(), Error>> = JoinSet::new();
    for idx in 0..workers {
        let worker = upload_parts_worker(ctx.clone(), rx.clone())
            .instrument(tracing::debug_span!("upload-parts-worker", worker = idx));
        tasks.spawn(worker);
    }
    drop(rx);

    let session = ctx.session.clone();
    let feeder = async move {
        for task in plan.tasks() {
            if session.dispatch_stopped() {
                tracing::trace!("dispatch stopped, halting part feed");
                break;
            }
            // send fails only when every worker has exited
            if tx.send(task).await.is_err() {
                break;
            }
        }
        drop(tx);
    };

    let collector = async move {
        let mut first_err: Option<Error> = None;
        while let Some(joined) = tasks.join_next().await {
            let result = joined.unwrap_or_else(|join_err| Err(join_err.into()));
            if let Err(err) = result {
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    };

    let (_, result) = tokio::join!(feeder, collector);
    result
}

async fn upload_parts_worker(
    ctx: UploadContext,
    tasks: async_channel::Receiver<PartTask>,
) -> Result<(), Error> {
    while let Ok(task) = tasks.recv().await {
        if ctx.session.dispatch_stopped() {
            // drain the channel without dispatching further work
            continue;
        }
        let part_number = task.part_number();
        let span = tracing::debug_span!("upload-part", part_number);
        match upload_part(&ctx, task).instrument(span).await {
            Ok(result) => {
                // results finishing after a cancel are discarded
                if !ctx.session.cancelled() {
                    ctx.session.record_part(result);
                }
            }
            Err(err) => {
                tracing::debug!(part_number, error = %err, "part failed, requesting abort");
                ctx.session.request_abort();
                return Err(err);
            }
        }
    }
    Ok(())
}

/// Upload a single part: acquire a work permit, read the part's byte range,
/// then send it with the transient retry budget. The permit is held for the
/// full attempt sequence so retries never overcommit the global ceiling.
async fn upload_part(ctx: &UploadContext, task: PartTask) -> Result<PartResult, Error> {
    let _permit = ctx.scheduler.acquire_permit().await?;

    let body = ctx.source.read_range(task.byte_range()).await?;
    let part_number = task.part_number();
    let upload_id = ctx.upload_id()?;

    let e_tag = retry_transient(&ctx.config, "upload-part", || {
        let body = body.clone();
        async move {
            ctx.store()
                .upload_part(ctx.bucket(), ctx.key(), upload_id, part_number, body)
                .await
        }
    })
    .await
    .map_err(|err| error::part_failed(part_number, err))?;

    Ok(PartResult::new(part_number, e_tag, task.size()))
}

/// Run `call` until it succeeds, fails permanently, or the retry budget is
/// exhausted. Each attempt is bounded by the per-call deadline; an elapsed
/// deadline counts as a transient failure.
pub(super) async fn retry_transient<T, F, Fut>(
    config: &Config,
    operation: &'static str,
    mut call: F,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let max_attempts = config.max_retry_attempts();
    let backoff = config.backoff();
    let mut attempt = 0u32;
    loop {
        match with_deadline(config, call()).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt + 1 < max_attempts => {
                let delay = backoff.delay(attempt);
                tracing::debug!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient failure, backing off before retry"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Bound a single remote call by the configured per-call deadline.
pub(super) async fn with_deadline<T, Fut>(config: &Config, call: Fut) -> Result<T, StoreError>
where
    Fut: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(config.request_timeout(), call).await {
        Ok(result) => result,
        Err(elapsed) => Err(StoreError::timeout(elapsed)),
    }
}
