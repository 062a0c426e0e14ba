//! Counters for session activity, recorded through the `metrics` facade.
//!
//! Nothing is exported unless the application installs a recorder.

use metrics::counter;

pub const ITEMS_DELIVERED: &str = "demandweld_items_delivered_total";
pub const CHUNKS_DELIVERED: &str = "demandweld_chunks_delivered_total";
pub const SESSIONS_COMPLETED: &str = "demandweld_sessions_completed_total";

pub(crate) fn record_chunk(stage: &'static str, len: usize) {
    counter!(ITEMS_DELIVERED, "stage" => stage).increment(len as u64);
    counter!(CHUNKS_DELIVERED, "stage" => stage).increment(1);
}

pub(crate) fn record_outcome(stage: &'static str, outcome: &'static str) {
    counter!(SESSIONS_COMPLETED, "stage" => stage, "outcome" => outcome).increment(1);
}
