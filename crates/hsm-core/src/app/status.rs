//! Status - 実行結果のカウンタ
//!
//! worker がカウントし、`Arc` を持っていれば誰でも snapshot を取れる。

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use super::executor::{DropReason, Execution};

#[derive(Debug, Default)]
pub struct ExecutionStats {
    executed: AtomicU64,
    dropped_stale: AtomicU64,
    dropped_missing_machine: AtomicU64,
    deferred: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionCounts {
    pub executed: u64,
    pub dropped_stale: u64,
    pub dropped_missing_machine: u64,
    pub deferred: u64,
    pub failed: u64,
}

impl ExecutionCounts {
    pub fn total(&self) -> u64 {
        self.executed + self.dropped_stale + self.dropped_missing_machine + self.failed
    }
}

impl ExecutionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, execution: Execution) {
        let counter = match execution {
            Execution::Executed => &self.executed,
            Execution::Dropped(DropReason::Stale { .. }) => &self.dropped_stale,
            Execution::Dropped(DropReason::MachineNotFound) => &self.dropped_missing_machine,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deferred(&self) {
        self.deferred.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ExecutionCounts {
        ExecutionCounts {
            executed: self.executed.load(Ordering::Relaxed),
            dropped_stale: self.dropped_stale.load(Ordering::Relaxed),
            dropped_missing_machine: self.dropped_missing_machine.load(Ordering::Relaxed),
            deferred: self.deferred.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}
