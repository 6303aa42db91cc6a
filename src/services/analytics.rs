use crate::models::Stats;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Instant;

/// Process-wide deposit counters.
pub struct Analytics {
    deposits_created: AtomicU64,
    deposits_paid: AtomicU64,
    deposits_expired: AtomicU64,
    amount_credited: AtomicI64,
    upstream_failures: AtomicU64,
    start_time: Instant,
}

impl Default for Analytics {
    fn default() -> Self {
        Self::new()
    }
}

impl Analytics {
    pub fn new() -> Self {
        Self {
            deposits_created: AtomicU64::new(0),
            deposits_paid: AtomicU64::new(0),
            deposits_expired: AtomicU64::new(0),
            amount_credited: AtomicI64::new(0),
            upstream_failures: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_created(&self) {
        self.deposits_created.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_paid(&self, credited: i64) {
        self.deposits_paid.fetch_add(1, Ordering::SeqCst);
        self.amount_credited.fetch_add(credited, Ordering::SeqCst);
    }

    pub fn record_expired(&self) {
        self.deposits_expired.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_upstream_failure(&self) {
        self.upstream_failures.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get_stats(&self) -> Stats {
        Stats {
            deposits_created: self.deposits_created.load(Ordering::SeqCst),
            deposits_paid: self.deposits_paid.load(Ordering::SeqCst),
            deposits_expired: self.deposits_expired.load(Ordering::SeqCst),
            amount_credited: self.amount_credited.load(Ordering::SeqCst),
            upstream_failures: self.upstream_failures.load(Ordering::SeqCst),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
