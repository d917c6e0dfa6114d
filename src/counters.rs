//! Per-refresh request counters.
//!
//! Handlers increment, the refresh loop drains. The struct is shared by
//! reference between the query path and the refresh loop; atomics keep the
//! query path lock-free.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters split by query origin, reset on every successful refresh.
#[derive(Debug, Default)]
pub struct Counters {
    in_domain_requests: AtomicU64,
    in_domain_success: AtomicU64,
    in_domain_nxdomain: AtomicU64,
    in_domain_failed: AtomicU64,
    forwarded_requests: AtomicU64,
    forwarded_success: AtomicU64,
    forwarded_nxdomain: AtomicU64,
    forwarded_failed: AtomicU64,
    recursed: AtomicU64,
}

/// A point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CounterSnapshot {
    /// Queries for the cluster domain.
    pub in_domain_requests: u64,
    /// In-domain queries answered without error.
    pub in_domain_success: u64,
    /// In-domain queries answered NXDOMAIN.
    pub in_domain_nxdomain: u64,
    /// In-domain queries that failed (panic or transport error).
    pub in_domain_failed: u64,
    /// Queries outside the cluster domain.
    pub forwarded_requests: u64,
    /// Forwarded queries answered without error by an upstream.
    pub forwarded_success: u64,
    /// Forwarded queries answered NXDOMAIN by an upstream.
    pub forwarded_nxdomain: u64,
    /// Forwarded queries where every upstream failed.
    pub forwarded_failed: u64,
    /// Queries actually sent to an upstream.
    pub recursed: u64,
}

impl Counters {
    /// Count an in-domain query.
    pub fn inc_in_domain_requests(&self) {
        self.in_domain_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an in-domain success.
    pub fn inc_in_domain_success(&self) {
        self.in_domain_success.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an in-domain NXDOMAIN.
    pub fn inc_in_domain_nxdomain(&self) {
        self.in_domain_nxdomain.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an in-domain failure.
    pub fn inc_in_domain_failed(&self) {
        self.in_domain_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a forwarded query.
    pub fn inc_forwarded_requests(&self) {
        self.forwarded_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a forwarded success.
    pub fn inc_forwarded_success(&self) {
        self.forwarded_success.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a forwarded NXDOMAIN.
    pub fn inc_forwarded_nxdomain(&self) {
        self.forwarded_nxdomain.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a forwarded failure.
    pub fn inc_forwarded_failed(&self) {
        self.forwarded_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a query dispatched to an upstream resolver.
    pub fn inc_recursed(&self) {
        self.recursed.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current values without resetting them.
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            in_domain_requests: self.in_domain_requests.load(Ordering::Relaxed),
            in_domain_success: self.in_domain_success.load(Ordering::Relaxed),
            in_domain_nxdomain: self.in_domain_nxdomain.load(Ordering::Relaxed),
            in_domain_failed: self.in_domain_failed.load(Ordering::Relaxed),
            forwarded_requests: self.forwarded_requests.load(Ordering::Relaxed),
            forwarded_success: self.forwarded_success.load(Ordering::Relaxed),
            forwarded_nxdomain: self.forwarded_nxdomain.load(Ordering::Relaxed),
            forwarded_failed: self.forwarded_failed.load(Ordering::Relaxed),
            recursed: self.recursed.load(Ordering::Relaxed),
        }
    }

    /// Copy the current values and reset them to zero. Called only by the
    /// refresh loop after a successful publish.
    pub fn snapshot_and_reset(&self) -> CounterSnapshot {
        CounterSnapshot {
            in_domain_requests: self.in_domain_requests.swap(0, Ordering::Relaxed),
            in_domain_success: self.in_domain_success.swap(0, Ordering::Relaxed),
            in_domain_nxdomain: self.in_domain_nxdomain.swap(0, Ordering::Relaxed),
            in_domain_failed: self.in_domain_failed.swap(0, Ordering::Relaxed),
            forwarded_requests: self.forwarded_requests.swap(0, Ordering::Relaxed),
            forwarded_success: self.forwarded_success.swap(0, Ordering::Relaxed),
            forwarded_nxdomain: self.forwarded_nxdomain.swap(0, Ordering::Relaxed),
            forwarded_failed: self.forwarded_failed.swap(0, Ordering::Relaxed),
            recursed: self.recursed.swap(0, Ordering::Relaxed),
        }
    }
}
