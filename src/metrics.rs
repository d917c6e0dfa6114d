//! Metrics instrumentation for mesos-dns.
//!
//! All metrics are prefixed with `mesos_dns.`

use metrics::{counter, gauge, histogram};
use std::time::Instant;

/// Record a handled DNS query.
pub fn record_query(origin: QueryOrigin, record_type: &str, result: QueryResult, duration: std::time::Duration) {
    let origin_str = match origin {
        QueryOrigin::InDomain => "in_domain",
        QueryOrigin::Forwarded => "forwarded",
    };
    let result_str = match result {
        QueryResult::Success => "success",
        QueryResult::NxDomain => "nxdomain",
        QueryResult::Failed => "failed",
    };

    counter!("mesos_dns.query.count", "origin" => origin_str, "type" => record_type.to_string(), "result" => result_str)
        .increment(1);
    histogram!("mesos_dns.query.duration.seconds", "origin" => origin_str)
        .record(duration.as_secs_f64());
}

/// Where a query was answered.
#[derive(Debug, Clone, Copy)]
pub enum QueryOrigin {
    /// Answered authoritatively from the record set.
    InDomain,
    /// Relayed to an upstream resolver.
    Forwarded,
}

/// Query outcome for metrics.
#[derive(Debug, Clone, Copy)]
pub enum QueryResult {
    /// Query answered successfully.
    Success,
    /// Name not found.
    NxDomain,
    /// Query failed (panic, transport error, or all upstreams down).
    Failed,
}

/// Record a refresh attempt.
pub fn record_refresh(outcome: RefreshOutcome, duration: std::time::Duration) {
    let outcome_str = match outcome {
        RefreshOutcome::Success => "success",
        RefreshOutcome::Failed => "failed",
    };

    counter!("mesos_dns.refresh.count", "outcome" => outcome_str).increment(1);
    histogram!("mesos_dns.refresh.duration.seconds").record(duration.as_secs_f64());
}

/// Refresh outcomes.
#[derive(Debug, Clone, Copy)]
pub enum RefreshOutcome {
    /// State fetched and records published.
    Success,
    /// Fetch or generation failed; previous records retained.
    Failed,
}

/// Record sizes of the published record set.
pub fn record_set_counts(a_names: usize, srv_names: usize) {
    gauge!("mesos_dns.records.a.count").set(a_names as f64);
    gauge!("mesos_dns.records.srv.count").set(srv_names as f64);
}

/// Record the current SOA serial (refresh generation).
pub fn record_serial(serial: u32) {
    gauge!("mesos_dns.records.serial").set(serial as f64);
}

/// Helper for timing operations.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration since timer start.
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}
