//! WorkerLoop - delivery queue から envelope を取り出して実行するループ
//!
//! # フロー
//! 1. `DeliveryQueue::pop()`（poll timeout 付き）
//! 2. `Executor::execute()`（staleness check + handler）
//! 3. 結果を記録。version skew は `defer_unregistered` なら queue に戻す

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::executor::{ExecuteError, Executor};
use super::status::ExecutionStats;
use crate::config::RuntimeConfig;
use crate::domain::{ErrorKind, TaskEnvelope};
use crate::ports::DeliveryQueue;

/// Worker group handle.
/// - `shutdown_tx` を drop（= この handle を drop）するか送信するとワーカー全体が止まる
/// - `shutdown_and_join()` で全ワーカーの終了を待てる
pub struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
    stats: Arc<ExecutionStats>,
}

struct Worker {
    id: usize,
    queue: Arc<dyn DeliveryQueue>,
    executor: Arc<Executor>,
    stats: Arc<ExecutionStats>,
    config: RuntimeConfig,
}

impl WorkerGroup {
    /// Spawn `config.workers` workers.
    pub fn spawn(queue: Arc<dyn DeliveryQueue>, executor: Arc<Executor>, config: &RuntimeConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let stats = Arc::new(ExecutionStats::new());

        let mut joins = Vec::with_capacity(config.workers);
        for id in 0..config.workers {
            let worker = Worker {
                id,
                queue: Arc::clone(&queue),
                executor: Arc::clone(&executor),
                stats: Arc::clone(&stats),
                config: config.clone(),
            };
            let rx = shutdown_rx.clone();
            joins.push(tokio::spawn(worker.run(rx)));
        }

        Self {
            shutdown_tx,
            joins,
            stats,
        }
    }

    pub fn stats(&self) -> Arc<ExecutionStats> {
        Arc::clone(&self.stats)
    }

    /// 新しい task の取得を止める。実行中の handler は最後まで走る。
    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for j in self.joins {
            let _ = j.await;
        }
    }
}

impl Worker {
    async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let popped = tokio::select! {
                changed = shutdown_rx.changed() => {
                    // Err: WorkerGroup が drop された
                    if changed.is_err() {
                        debug!(worker = self.id, "shutdown sender dropped, stopping worker");
                        break;
                    }
                    continue;
                }
                popped = self.queue.pop(self.config.poll_timeout()) => popped,
            };

            let envelope = match popped {
                Ok(Some(envelope)) => envelope,
                Ok(None) => continue,
                Err(e) => {
                    warn!(worker = self.id, error = %e, "queue closed, stopping worker");
                    break;
                }
            };

            let result = self.executor.execute(&envelope).await;
            match result {
                Ok(execution) => {
                    debug!(worker = self.id, task_id = %envelope.task_id(), ?execution, "task done");
                    self.stats.record(execution);
                }
                Err(err) => self.on_error(envelope, err).await,
            }
        }
    }

    async fn on_error(&self, envelope: TaskEnvelope, err: ExecuteError) {
        let kind = err.kind();
        match kind {
            ErrorKind::VersionSkew if self.config.defer_unregistered => {
                warn!(
                    worker = self.id,
                    task_id = %envelope.task_id(),
                    type_id = envelope.record().type_id,
                    "deferring task of unregistered type"
                );
                self.stats.record_deferred();
                // Give other workers a chance before it comes around again.
                tokio::time::sleep(self.config.poll_timeout()).await;
                if let Err(e) = self.queue.push(envelope).await {
                    error!(worker = self.id, error = %e, "re-queue failed");
                }
            }
            _ => {
                error!(
                    worker = self.id,
                    task_id = %envelope.task_id(),
                    ?kind,
                    retryable = kind.is_retryable(),
                    error = %err,
                    "task failed"
                );
                self.stats.record_failed();
            }
        }
    }
}
