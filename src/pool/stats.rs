//! Aggregate pool metrics.
//!
//! Counters are atomics; a snapshot is point-in-time with no cross-counter
//! consistency guarantee. Throughput is measured over a rolling window of
//! completion timestamps.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub struct PoolStats {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    canceled: AtomicU64,
    in_flight: AtomicUsize,
    latency_total_ms: AtomicU64,
    latency_samples: AtomicU64,
    window: Mutex<VecDeque<Instant>>,
    window_span: Duration,
}

/// Point-in-time copy of the pool's counters.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsSnapshot {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub canceled: u64,
    pub in_flight: usize,
    /// Queue length per priority: high, normal, low.
    pub queued: [usize; 3],
    pub mean_latency: Option<Duration>,
    /// Results per second over the rolling window.
    pub throughput_rps: f64,
}

impl PoolStats {
    pub fn new(window_span: Duration) -> Self {
        Self {
            submitted: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            canceled: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            latency_total_ms: AtomicU64::new(0),
            latency_samples: AtomicU64::new(0),
            window: Mutex::new(VecDeque::new()),
            window_span,
        }
    }

    pub fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn worker_started(&self) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
    }

    pub fn worker_finished(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Record one published result.
    pub fn record_result(&self, success: bool, canceled: bool, elapsed: Duration) {
        if canceled {
            self.canceled.fetch_add(1, Ordering::Relaxed);
        } else if success {
            self.completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        self.latency_total_ms.fetch_add(elapsed.as_millis() as u64, Ordering::Relaxed);
        self.latency_samples.fetch_add(1, Ordering::Relaxed);

        let now = Instant::now();
        let mut window = self.window.lock().expect("stats window lock poisoned");
        window.push_back(now);
        while let Some(front) = window.front() {
            if now.duration_since(*front) > self.window_span {
                window.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn snapshot(&self, queued: [usize; 3]) -> StatsSnapshot {
        let samples = self.latency_samples.load(Ordering::Relaxed);
        let mean_latency = if samples > 0 {
            Some(Duration::from_millis(
                self.latency_total_ms.load(Ordering::Relaxed) / samples,
            ))
        } else {
            None
        };

        let throughput_rps = {
            let now = Instant::now();
            let mut window = self.window.lock().expect("stats window lock poisoned");
            while let Some(front) = window.front() {
                if now.duration_since(*front) > self.window_span {
                    window.pop_front();
                } else {
                    break;
                }
            }
            window.len() as f64 / self.window_span.as_secs_f64()
        };

        StatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            canceled: self.canceled.load(Ordering::Relaxed),
            in_flight: self.in_flight(),
            queued,
            mean_latency,
            throughput_rps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = PoolStats::new(Duration::from_secs(10));
        stats.record_submitted();
        stats.record_submitted();
        stats.record_result(true, false, Duration::from_millis(100));
        stats.record_result(false, false, Duration::from_millis(300));
        stats.record_result(false, true, Duration::from_millis(50));

        let snap = stats.snapshot([0, 1, 0]);
        assert_eq!(snap.submitted, 2);
        assert_eq!(snap.completed, 1);
        assert_eq!(snap.failed, 1);
        assert_eq!(snap.canceled, 1);
        assert_eq!(snap.queued, [0, 1, 0]);
        assert_eq!(snap.mean_latency, Some(Duration::from_millis(150)));
        assert!(snap.throughput_rps > 0.0);
    }

    #[test]
    fn in_flight_tracks_workers() {
        let stats = PoolStats::new(Duration::from_secs(10));
        stats.worker_started();
        stats.worker_started();
        assert_eq!(stats.in_flight(), 2);
        stats.worker_finished();
        assert_eq!(stats.in_flight(), 1);
    }
}
