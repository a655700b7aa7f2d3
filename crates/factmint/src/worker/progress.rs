//! Progress estimation.
//!
//! Maps the worker's free-form step reports onto a display percentage.
//! The thresholds have no contract with the worker; the value feeds UI
//! display only and carries no correctness guarantee beyond looking
//! monotonic. Callers clamp with [`monotonic`] against the last value.

use crate::worker::status::{JobStatus, ProgressHint};

const QUEUED_PCT: u8 = 5;
const EXTRACTING_PCT: u8 = 15;
const PROCESSING_FLOOR: u8 = 25;
const PROCESSING_MIDPOINT: u8 = 35;
const PROCESSING_CEIL: u8 = 60;
const BATCHING_FLOOR: u8 = 60;
const BATCHING_MIDPOINT: u8 = 75;
const BATCHING_CEIL: u8 = 95;

/// Interpolates within `[floor, ceil]` from a done/total pair, or falls
/// back to `midpoint` when the hint has no usable pair.
fn band(hint: Option<&ProgressHint>, floor: u8, midpoint: u8, ceil: u8) -> u8 {
    match hint {
        Some(ProgressHint {
            done: Some(done),
            total: Some(total),
            ..
        }) if *total > 0 => {
            let frac = (*done as f64 / *total as f64).clamp(0.0, 1.0);
            floor + (frac * (ceil - floor) as f64).round() as u8
        }
        _ => midpoint,
    }
}

/// Estimates a display percentage for a worker status report.
pub fn estimate_percent(status: JobStatus, hint: Option<&ProgressHint>) -> u8 {
    match status {
        JobStatus::Queued => QUEUED_PCT,
        JobStatus::Extracting => EXTRACTING_PCT,
        JobStatus::Processing => band(hint, PROCESSING_FLOOR, PROCESSING_MIDPOINT, PROCESSING_CEIL),
        JobStatus::Batching => band(hint, BATCHING_FLOOR, BATCHING_MIDPOINT, BATCHING_CEIL),
        JobStatus::Completed => 100,
        // Display keeps whatever it last showed; the caller's monotonic
        // clamp turns 0 into a no-op.
        JobStatus::Failed => 0,
    }
}

/// Keeps the displayed value non-decreasing while a task is in progress.
pub fn monotonic(current: u8, proposed: u8) -> u8 {
    proposed.max(current).min(100)
}
