//! Observability and Metrics
//!
//! Per-pipeline counters for dispatch and framing activity.
//!
//! Uses relaxed atomic counters: firing only ever holds the shared chain lock,
//! so counters are bumped concurrently from every firing thread.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Event kinds counted at the pipeline entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Opened,
    Closed,
    Exception,
    Received,
    Sent,
}

/// Metrics collector owned by one pipeline
#[derive(Debug)]
pub struct Metrics {
    /// Session-opened events fired
    pub opened_fired: AtomicU64,
    /// Session-closed events fired
    pub closed_fired: AtomicU64,
    /// Exception events fired from outside the chain
    pub exceptions_fired: AtomicU64,
    /// Inbound messages fired
    pub received_fired: AtomicU64,
    /// Outbound messages fired
    pub sent_fired: AtomicU64,
    /// Payload routes answered from a node's cache
    pub route_cache_hits: AtomicU64,
    /// Payload routes computed by a linear scan
    pub route_cache_misses: AtomicU64,
    /// Inbound messages that reached the edge
    pub unclaimed_received: AtomicU64,
    /// Outbound messages that reached the edge
    pub outbound_at_edge: AtomicU64,
    /// Handler failures converted into exception events
    pub handler_failures: AtomicU64,
    /// Successful structural mutations
    pub mutations: AtomicU64,
    /// Frames serialized by a connection
    pub frames_packed: AtomicU64,
    /// Frames decoded by a connection
    pub frames_unpacked: AtomicU64,
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            opened_fired: AtomicU64::new(0),
            closed_fired: AtomicU64::new(0),
            exceptions_fired: AtomicU64::new(0),
            received_fired: AtomicU64::new(0),
            sent_fired: AtomicU64::new(0),
            route_cache_hits: AtomicU64::new(0),
            route_cache_misses: AtomicU64::new(0),
            unclaimed_received: AtomicU64::new(0),
            outbound_at_edge: AtomicU64::new(0),
            handler_failures: AtomicU64::new(0),
            mutations: AtomicU64::new(0),
            frames_packed: AtomicU64::new(0),
            frames_unpacked: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record an event entering the pipeline
    pub fn event_fired(&self, kind: EventKind) {
        let counter = match kind {
            EventKind::Opened => &self.opened_fired,
            EventKind::Closed => &self.closed_fired,
            EventKind::Exception => &self.exceptions_fired,
            EventKind::Received => &self.received_fired,
            EventKind::Sent => &self.sent_fired,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a payload route lookup
    pub fn route_lookup(&self, cached: bool) {
        if cached {
            self.route_cache_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.route_cache_misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn unclaimed_received(&self) {
        self.unclaimed_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn outbound_at_edge(&self) {
        self.outbound_at_edge.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handler_failure(&self) {
        self.handler_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mutation(&self) {
        self.mutations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frames_packed(&self, count: u64) {
        self.frames_packed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn frames_unpacked(&self, count: u64) {
        self.frames_unpacked.fetch_add(count, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            opened_fired: self.opened_fired.load(Ordering::Relaxed),
            closed_fired: self.closed_fired.load(Ordering::Relaxed),
            exceptions_fired: self.exceptions_fired.load(Ordering::Relaxed),
            received_fired: self.received_fired.load(Ordering::Relaxed),
            sent_fired: self.sent_fired.load(Ordering::Relaxed),
            route_cache_hits: self.route_cache_hits.load(Ordering::Relaxed),
            route_cache_misses: self.route_cache_misses.load(Ordering::Relaxed),
            unclaimed_received: self.unclaimed_received.load(Ordering::Relaxed),
            outbound_at_edge: self.outbound_at_edge.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            mutations: self.mutations.load(Ordering::Relaxed),
            frames_packed: self.frames_packed.load(Ordering::Relaxed),
            frames_unpacked: self.frames_unpacked.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_snapshot(&self) {
        let snapshot = self.snapshot();
        info!(
            opened_fired = snapshot.opened_fired,
            closed_fired = snapshot.closed_fired,
            exceptions_fired = snapshot.exceptions_fired,
            received_fired = snapshot.received_fired,
            sent_fired = snapshot.sent_fired,
            route_cache_hits = snapshot.route_cache_hits,
            route_cache_misses = snapshot.route_cache_misses,
            unclaimed_received = snapshot.unclaimed_received,
            outbound_at_edge = snapshot.outbound_at_edge,
            handler_failures = snapshot.handler_failures,
            mutations = snapshot.mutations,
            frames_packed = snapshot.frames_packed,
            frames_unpacked = snapshot.frames_unpacked,
            uptime_seconds = snapshot.uptime_seconds,
            "Pipeline metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub opened_fired: u64,
    pub closed_fired: u64,
    pub exceptions_fired: u64,
    pub received_fired: u64,
    pub sent_fired: u64,
    pub route_cache_hits: u64,
    pub route_cache_misses: u64,
    pub unclaimed_received: u64,
    pub outbound_at_edge: u64,
    pub handler_failures: u64,
    pub mutations: u64,
    pub frames_packed: u64,
    pub frames_unpacked: u64,
    pub uptime_seconds: u64,
}

impl MetricsSnapshot {
    /// Fraction of payload route lookups answered from cache, if any happened.
    pub fn route_hit_ratio(&self) -> Option<f64> {
        let total = self.route_cache_hits + self.route_cache_misses;
        if total == 0 {
            None
        } else {
            Some(self.route_cache_hits as f64 / total as f64)
        }
    }
}

/// Timer for measuring operation duration
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    /// Start timing an operation
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        debug!(
            operation = self.operation,
            duration_us = duration.as_micros() as u64,
            "Operation completed"
        );
    }
}
