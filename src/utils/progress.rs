//! Progress sinks

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use crate::traits::Progress;

/// Counts steps; handy for tests and for reporting totals afterwards
#[derive(Debug, Default)]
pub struct CountingProgress {
    total: AtomicU64,
    completed: AtomicU64,
    finished: AtomicBool,
}

impl CountingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

impl Progress for CountingProgress {
    fn start(&self, _label: &str, total: u64) {
        self.total.store(total, Ordering::SeqCst);
        self.completed.store(0, Ordering::SeqCst);
        self.finished.store(false, Ordering::SeqCst);
    }

    fn advance(&self, steps: u64) {
        self.completed.fetch_add(steps, Ordering::SeqCst);
    }

    fn finish(&self) {
        self.finished.store(true, Ordering::SeqCst);
    }
}

/// Emits an `info` event every time another tenth of the work is done
#[derive(Debug, Default)]
pub struct TracingProgress {
    label: Mutex<String>,
    total: AtomicU64,
    completed: AtomicU64,
}

impl TracingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn label(&self) -> String {
        self.label
            .lock()
            .map(|label| label.clone())
            .unwrap_or_default()
    }
}

impl Progress for TracingProgress {
    fn start(&self, label: &str, total: u64) {
        if let Ok(mut current) = self.label.lock() {
            *current = label.to_string();
        }
        self.total.store(total, Ordering::SeqCst);
        self.completed.store(0, Ordering::SeqCst);
        tracing::info!(label, total, "Started");
    }

    fn advance(&self, steps: u64) {
        let before = self.completed.fetch_add(steps, Ordering::SeqCst);
        let after = before.saturating_add(steps);
        let total = self.total.load(Ordering::SeqCst);
        if total == 0 {
            return;
        }
        let step = (total / 10).max(1);
        if before / step != after / step {
            tracing::info!(
                label = %self.label(),
                completed = after,
                total,
                "Progress"
            );
        }
    }

    fn finish(&self) {
        tracing::info!(
            label = %self.label(),
            completed = self.completed.load(Ordering::SeqCst),
            total = self.total.load(Ordering::SeqCst),
            "Done"
        );
    }
}
