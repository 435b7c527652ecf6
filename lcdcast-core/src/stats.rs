use std::sync::atomic::{AtomicU64, Ordering};

/// Pipeline counters, updated by the workers and readable at any time.
#[derive(Debug, Default)]
pub struct StreamStats {
    frames_diffed: AtomicU64,
    records_emitted: AtomicU64,
    batches_sent: AtomicU64,
    send_failures: AtomicU64,
    underflows: AtomicU64,
}

/// Point-in-time copy of [`StreamStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub frames_diffed: u64,
    pub records_emitted: u64,
    pub batches_sent: u64,
    pub send_failures: u64,
    pub underflows: u64,
}

impl StreamStats {
    pub fn record_frame(&self, records: usize) {
        self.frames_diffed.fetch_add(1, Ordering::Relaxed);
        self.records_emitted.fetch_add(records as u64, Ordering::Relaxed);
    }

    pub fn record_batch_sent(&self) {
        self.batches_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_send_failure(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_underflow(&self) {
        self.underflows.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_diffed: self.frames_diffed.load(Ordering::Relaxed),
            records_emitted: self.records_emitted.load(Ordering::Relaxed),
            batches_sent: self.batches_sent.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            underflows: self.underflows.load(Ordering::Relaxed),
        }
    }
}
