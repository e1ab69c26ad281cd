//! Call metrics
//!
//! Counters and histograms are emitted by the session manager through the
//! `metrics` facade; they are no-ops until a recorder is installed.

use metrics::{describe_counter, describe_histogram, Unit};

pub const CALLS_STARTED: &str = "calls_started_total";
pub const CALLS_ANSWERED: &str = "calls_answered_total";
pub const CALLS_REJECTED: &str = "calls_rejected_total";
pub const CALLS_ENDED: &str = "calls_ended_total";
pub const CALL_DURATION: &str = "call_duration_seconds";

/// Register descriptions for every call metric with the installed recorder
pub fn describe_call_metrics() {
    describe_counter!(CALLS_STARTED, "Total number of calls placed");
    describe_counter!(CALLS_ANSWERED, "Total number of calls answered");
    describe_counter!(CALLS_REJECTED, "Total number of incoming calls rejected");
    describe_counter!(CALLS_ENDED, "Total number of calls hung up");
    describe_histogram!(
        CALL_DURATION,
        Unit::Seconds,
        "Talk time of ended calls in seconds"
    );
}
