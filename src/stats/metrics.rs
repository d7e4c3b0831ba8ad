//! Statistics and metrics for the broker
//!
//! Counters only ever grow; gauges go up when a worker or session starts and
//! down when it ends. Everything is a relaxed atomic: the numbers feed logs,
//! not control flow.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Live gauges tracked by [`BrokerStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gauge {
    /// Workers currently handling a request
    BusyWorkers,
    /// Publisher sessions attached to a box
    ActivePublishers,
    /// Subscriber sessions attached to a box
    ActiveSubscribers,
}

/// Broker-wide statistics
#[derive(Debug)]
pub struct BrokerStats {
    started_at: Instant,

    requests_received: AtomicU64,
    requests_invalid: AtomicU64,
    requests_dropped: AtomicU64,
    boxes_created: AtomicU64,
    boxes_removed: AtomicU64,
    admin_failures: AtomicU64,
    sessions_rejected: AtomicU64,
    messages_published: AtomicU64,
    bytes_published: AtomicU64,
    messages_delivered: AtomicU64,
    bytes_delivered: AtomicU64,

    busy_workers: AtomicU64,
    active_publishers: AtomicU64,
    active_subscribers: AtomicU64,
}

impl Default for BrokerStats {
    fn default() -> Self {
        Self::new()
    }
}

impl BrokerStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            requests_received: AtomicU64::new(0),
            requests_invalid: AtomicU64::new(0),
            requests_dropped: AtomicU64::new(0),
            boxes_created: AtomicU64::new(0),
            boxes_removed: AtomicU64::new(0),
            admin_failures: AtomicU64::new(0),
            sessions_rejected: AtomicU64::new(0),
            messages_published: AtomicU64::new(0),
            bytes_published: AtomicU64::new(0),
            messages_delivered: AtomicU64::new(0),
            bytes_delivered: AtomicU64::new(0),
            busy_workers: AtomicU64::new(0),
            active_publishers: AtomicU64::new(0),
            active_subscribers: AtomicU64::new(0),
        }
    }

    pub fn request_received(&self) {
        self.requests_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_invalid(&self) {
        self.requests_invalid.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests_dropped(&self, count: u64) {
        self.requests_dropped.fetch_add(count, Ordering::Relaxed);
    }

    pub fn box_created(&self) {
        self.boxes_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn box_removed(&self) {
        self.boxes_removed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn admin_failed(&self) {
        self.admin_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_rejected(&self) {
        self.sessions_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_published(&self, bytes: usize) {
        self.messages_published.fetch_add(1, Ordering::Relaxed);
        self.bytes_published.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn message_delivered(&self, bytes: usize) {
        self.messages_delivered.fetch_add(1, Ordering::Relaxed);
        self.bytes_delivered.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Raise a gauge until the returned guard is dropped
    pub fn track(&self, gauge: Gauge) -> GaugeGuard<'_> {
        let counter = self.gauge_counter(gauge);
        counter.fetch_add(1, Ordering::Relaxed);
        GaugeGuard { counter }
    }

    pub fn gauge(&self, gauge: Gauge) -> u64 {
        self.gauge_counter(gauge).load(Ordering::Relaxed)
    }

    fn gauge_counter(&self, gauge: Gauge) -> &AtomicU64 {
        match gauge {
            Gauge::BusyWorkers => &self.busy_workers,
            Gauge::ActivePublishers => &self.active_publishers,
            Gauge::ActiveSubscribers => &self.active_subscribers,
        }
    }

    /// Copy every counter, together with pool and queue figures
    pub fn snapshot(&self, workers: usize, queued: usize, queue_capacity: usize) -> StatsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            uptime: self.started_at.elapsed(),
            requests_received: load(&self.requests_received),
            requests_invalid: load(&self.requests_invalid),
            requests_dropped: load(&self.requests_dropped),
            boxes_created: load(&self.boxes_created),
            boxes_removed: load(&self.boxes_removed),
            admin_failures: load(&self.admin_failures),
            sessions_rejected: load(&self.sessions_rejected),
            messages_published: load(&self.messages_published),
            bytes_published: load(&self.bytes_published),
            messages_delivered: load(&self.messages_delivered),
            bytes_delivered: load(&self.bytes_delivered),
            busy_workers: load(&self.busy_workers),
            active_publishers: load(&self.active_publishers),
            active_subscribers: load(&self.active_subscribers),
            workers,
            queued,
            queue_capacity,
        }
    }
}

/// Lowers its gauge when dropped
#[derive(Debug)]
pub struct GaugeGuard<'a> {
    counter: &'a AtomicU64,
}

impl Drop for GaugeGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Point-in-time copy of [`BrokerStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub uptime: Duration,
    pub requests_received: u64,
    pub requests_invalid: u64,
    pub requests_dropped: u64,
    pub boxes_created: u64,
    pub boxes_removed: u64,
    pub admin_failures: u64,
    pub sessions_rejected: u64,
    pub messages_published: u64,
    pub bytes_published: u64,
    pub messages_delivered: u64,
    pub bytes_delivered: u64,
    pub busy_workers: u64,
    pub active_publishers: u64,
    pub active_subscribers: u64,
    /// Worker pool size (the cap on concurrent sessions)
    pub workers: usize,
    /// Requests waiting for a worker
    pub queued: usize,
    pub queue_capacity: usize,
}

impl StatsSnapshot {
    /// Every worker is busy and requests are waiting behind them
    ///
    /// Long-lived sessions hold their worker for their whole lifetime, so a
    /// pool full of sessions starves create/remove/list requests.
    pub fn is_saturated(&self) -> bool {
        self.busy_workers >= self.workers as u64 && self.queued > 0
    }

    /// Publisher and subscriber sessions currently attached
    pub fn active_sessions(&self) -> u64 {
        self.active_publishers + self.active_subscribers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let snapshot = BrokerStats::new().snapshot(4, 0, 8);
        assert_eq!(snapshot.requests_received, 0);
        assert_eq!(snapshot.messages_published, 0);
        assert_eq!(snapshot.busy_workers, 0);
        assert_eq!(snapshot.workers, 4);
        assert_eq!(snapshot.queue_capacity, 8);
    }

    #[test]
    fn test_counters() {
        let stats = BrokerStats::new();
        stats.request_received();
        stats.request_received();
        stats.message_published(6);
        stats.message_published(4);
        stats.message_delivered(6);
        stats.requests_dropped(3);

        let snapshot = stats.snapshot(1, 0, 2);
        assert_eq!(snapshot.requests_received, 2);
        assert_eq!(snapshot.messages_published, 2);
        assert_eq!(snapshot.bytes_published, 10);
        assert_eq!(snapshot.messages_delivered, 1);
        assert_eq!(snapshot.bytes_delivered, 6);
        assert_eq!(snapshot.requests_dropped, 3);
    }

    #[test]
    fn test_gauge_guard() {
        let stats = BrokerStats::new();
        {
            let _a = stats.track(Gauge::ActiveSubscribers);
            let _b = stats.track(Gauge::ActiveSubscribers);
            let _p = stats.track(Gauge::ActivePublishers);
            assert_eq!(stats.gauge(Gauge::ActiveSubscribers), 2);
            assert_eq!(stats.snapshot(1, 0, 1).active_sessions(), 3);
        }
        assert_eq!(stats.gauge(Gauge::ActiveSubscribers), 0);
        assert_eq!(stats.gauge(Gauge::ActivePublishers), 0);
    }

    #[test]
    fn test_saturation() {
        let stats = BrokerStats::new();
        let _w1 = stats.track(Gauge::BusyWorkers);
        let _w2 = stats.track(Gauge::BusyWorkers);

        assert!(!stats.snapshot(2, 0, 4).is_saturated());
        assert!(stats.snapshot(2, 1, 4).is_saturated());
        assert!(!stats.snapshot(3, 1, 4).is_saturated());
    }
}
