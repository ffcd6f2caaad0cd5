/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Part planning for multipart uploads.
//!
//! Planning is pure and deterministic: given a total size and the configured
//! part-size policy it produces an [`UploadPlan`] or fails before anything is
//! sent to the store.

use crate::error::{self, Error, PlanningErrorKind};
use std::cmp;
use std::ops::Range;

/// How a byte source is split into parts.
///
/// Invariants: every part except possibly the last is exactly `part_size`
/// bytes and at least the protocol minimum; `part_count` is the ceiling of
/// `total_size / part_size`; the last part is never empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadPlan {
    total_size: u64,
    part_size: u64,
    part_count: u32,
}

impl UploadPlan {
    /// Total number of bytes the plan covers
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Size of every part except possibly the last
    pub fn part_size(&self) -> u64 {
        self.part_size
    }

    /// Number of planned parts
    pub fn part_count(&self) -> u32 {
        self.part_count
    }

    /// Size of the final part
    pub fn last_part_size(&self) -> u64 {
        self.total_size - self.part_size * u64::from(self.part_count - 1)
    }

    /// The task describing the given 1-indexed part
    pub fn task(&self, part_number: u32) -> PartTask {
        debug_assert!(part_number >= 1 && part_number <= self.part_count);
        let start = self.part_size * u64::from(part_number - 1);
        let end = cmp::min(start + self.part_size, self.total_size);
        PartTask {
            part_number,
            byte_range: start..end,
        }
    }

    /// Iterate over every planned part in part-number order
    pub fn tasks(&self) -> impl Iterator<Item = PartTask> + '_ {
        (1..=self.part_count).map(|n| self.task(n))
    }
}

/// A single planned part: its 1-indexed number and the half-open byte range
/// it covers in the source. Owned exclusively by the session that planned it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartTask {
    part_number: u32,
    byte_range: Range<u64>,
}

impl PartTask {
    /// The 1-indexed part number
    pub fn part_number(&self) -> u32 {
        self.part_number
    }

    /// The `[start, end)` byte range this part covers
    pub fn byte_range(&self) -> Range<u64> {
        self.byte_range.clone()
    }

    /// Number of bytes this part covers
    pub fn size(&self) -> u64 {
        self.byte_range.end - self.byte_range.start
    }
}

/// Decides how to split a byte source into parts.
#[derive(Debug, Clone, Copy)]
pub struct PartPlanner {
    part_size: u64,
    min_part_size: u64,
    max_part_count: u32,
    alignment: u64,
}

impl PartPlanner {
    /// Create a planner from an explicit part-size policy.
    ///
    /// `alignment` is used when the configured part size would exceed the
    /// part count limit: the recomputed part size is rounded up to the next
    /// multiple of it.
    pub fn new(part_size: u64, min_part_size: u64, max_part_count: u32, alignment: u64) -> Self {
        Self {
            part_size: cmp::max(part_size, min_part_size),
            min_part_size,
            max_part_count,
            alignment,
        }
    }

    /// Plan a multipart upload for a source of `total_size` bytes.
    pub fn plan(&self, total_size: u64) -> Result<UploadPlan, Error> {
        if total_size < 2 * self.min_part_size {
            return Err(error::planning(
                PlanningErrorKind::SizeTooSmallForMultipart,
                format!(
                    "total size {total_size} is below the multipart minimum of {} bytes",
                    2 * self.min_part_size
                ),
            ));
        }
        if self.max_part_count == 0 {
            return Err(error::planning(
                PlanningErrorKind::TooManyParts,
                "maximum part count is zero",
            ));
        }

        let mut part_size = self.part_size;
        let mut part_count = total_size.div_ceil(part_size);
        if part_count > u64::from(self.max_part_count) {
            // one recompute: smallest aligned part size that fits the limit
            part_size = round_up(
                total_size.div_ceil(u64::from(self.max_part_count)),
                self.alignment,
            );
            part_count = total_size.div_ceil(part_size);
            if part_count > u64::from(self.max_part_count) {
                return Err(error::planning(
                    PlanningErrorKind::TooManyParts,
                    format!(
                        "{total_size} bytes cannot be split into {} or fewer parts",
                        self.max_part_count
                    ),
                ));
            }
        }

        Ok(UploadPlan {
            total_size,
            part_size,
            part_count: part_count as u32,
        })
    }
}

fn round_up(value: u64, alignment: u64) -> u64 {
    if alignment <= 1 {
        value
    } else {
        value.div_ceil(alignment) * alignment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, PlanningErrorKind};
    use crate::MEBIBYTE;

    fn planning_kind(err: Error) -> PlanningErrorKind {
        match err.kind() {
            ErrorKind::Planning(kind) => *kind,
            other => panic!("expected planning error, got {other:?}"),
        }
    }

    #[test]
    fn test_plan_100_mib_at_8_mib_parts() {
        let planner = PartPlanner::new(8 * MEBIBYTE, 5 * MEBIBYTE, 10_000, MEBIBYTE);
        let plan = planner.plan(100 * MEBIBYTE).unwrap();
        assert_eq!(13, plan.part_count());
        assert_eq!(8 * MEBIBYTE, plan.part_size());
        assert_eq!(4 * MEBIBYTE, plan.last_part_size());
    }

    #[test]
    fn test_parts_sum_to_total_size() {
        let planner = PartPlanner::new(8 * MEBIBYTE, 5 * MEBIBYTE, 10_000, MEBIBYTE);
        for total in [
            10 * MEBIBYTE,
            16 * MEBIBYTE,
            100 * MEBIBYTE,
            100 * MEBIBYTE + 1,
            100 * MEBIBYTE - 1,
            3 * 1024 * MEBIBYTE + 17,
        ] {
            let plan = planner.plan(total).unwrap();
            let summed: u64 = plan.tasks().map(|t| t.size()).sum();
            assert_eq!(total, summed, "parts must cover exactly {total} bytes");
            assert!(u64::from(plan.part_count()) <= 10_000);
            assert!(plan.last_part_size() > 0);
        }
    }

    #[test]
    fn test_tasks_are_contiguous_and_one_indexed() {
        let planner = PartPlanner::new(5, 2, 10_000, 1);
        let plan = planner.plan(23).unwrap();
        let tasks: Vec<_> = plan.tasks().collect();
        assert_eq!(1, tasks[0].part_number());
        assert_eq!(0..5, tasks[0].byte_range());
        for pair in tasks.windows(2) {
            assert_eq!(pair[0].part_number() + 1, pair[1].part_number());
            assert_eq!(pair[0].byte_range().end, pair[1].byte_range().start);
        }
        assert_eq!(23, tasks.last().unwrap().byte_range().end);
    }

    #[test]
    fn test_too_small_for_multipart() {
        let planner = PartPlanner::new(8 * MEBIBYTE, 5 * MEBIBYTE, 10_000, MEBIBYTE);
        let err = planner.plan(10 * MEBIBYTE - 1).unwrap_err();
        assert_eq!(
            PlanningErrorKind::SizeTooSmallForMultipart,
            planning_kind(err)
        );
    }

    #[test]
    fn test_part_size_recomputed_when_count_exceeds_limit() {
        // 100 bytes at part size 2 would be 50 parts; limit of 10 forces a
        // recompute to ceil(100/10)=10, aligned up to 12
        let planner = PartPlanner::new(2, 2, 10, 4);
        let plan = planner.plan(100).unwrap();
        assert_eq!(12, plan.part_size());
        assert_eq!(9, plan.part_count());
        let summed: u64 = plan.tasks().map(|t| t.size()).sum();
        assert_eq!(100, summed);
    }

    #[test]
    fn test_configured_part_size_clamped_to_minimum() {
        let planner = PartPlanner::new(1, 5 * MEBIBYTE, 10_000, MEBIBYTE);
        let plan = planner.plan(20 * MEBIBYTE).unwrap();
        assert_eq!(5 * MEBIBYTE, plan.part_size());
    }

    #[test]
    fn test_zero_part_limit_fails() {
        let planner = PartPlanner::new(8 * MEBIBYTE, 5 * MEBIBYTE, 0, MEBIBYTE);
        let err = planner.plan(100 * MEBIBYTE).unwrap_err();
        assert_eq!(PlanningErrorKind::TooManyParts, planning_kind(err));
    }
}
