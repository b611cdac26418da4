//! Dequeue ordering
//!
//! The store pre-sorts candidate batches for stability, but the ordering
//! contract lives here as one comparator so it can be tested in isolation
//! and never drifts apart between backends.

use std::cmp::Ordering;

use crate::models::Job;

/// Total order for claim-eligible jobs
///
/// Higher priority first; among equal priorities, earlier `scheduled_at`
/// first. Ties beyond that fall back to the job ID so the order is stable
/// across runs.
pub fn dequeue_order(a: &Job, b: &Job) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| a.scheduled_at.cmp(&b.scheduled_at))
        .then_with(|| a.id.cmp(&b.id))
}
