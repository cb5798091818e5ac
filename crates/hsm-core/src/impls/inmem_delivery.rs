//! InMemoryDeliveryQueue - 開発用の配送キュー
//!
//! # 学習ポイント
//! - `tokio::sync::Mutex` + `Notify` による async な blocking pop
//! - `QueueKey` ごとに FIFO を持ち、仕事のあるキーを round-robin で回す
//!   → 混んでいる destination が timer queue や他の destination を飢えさせない

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use crate::domain::TaskEnvelope;
use crate::ports::{DeliveryQueue, QueueError, QueueKey};

#[derive(Default)]
struct Queues {
    by_key: HashMap<QueueKey, VecDeque<TaskEnvelope>>,
    /// Keys with at least one envelope, in service order.
    ready: VecDeque<QueueKey>,
}

impl Queues {
    fn push(&mut self, envelope: TaskEnvelope) {
        let key = QueueKey::for_envelope(&envelope);
        let queue = self.by_key.entry(key.clone()).or_default();
        if queue.is_empty() {
            self.ready.push_back(key);
        }
        queue.push_back(envelope);
    }

    fn pop(&mut self) -> Option<TaskEnvelope> {
        let key = self.ready.pop_front()?;
        let queue = self.by_key.get_mut(&key)?;
        let envelope = queue.pop_front();
        if !queue.is_empty() {
            self.ready.push_back(key);
        }
        envelope
    }
}

pub struct InMemoryDeliveryQueue {
    queues: Mutex<Queues>,
    notify: Notify,
}

impl InMemoryDeliveryQueue {
    pub fn new() -> Self {
        Self {
            queues: Mutex::new(Queues::default()),
            notify: Notify::new(),
        }
    }

    pub async fn len(&self) -> usize {
        self.queues.lock().await.by_key.values().map(VecDeque::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn queue_len(&self, key: &QueueKey) -> usize {
        self.queues
            .lock()
            .await
            .by_key
            .get(key)
            .map_or(0, VecDeque::len)
    }
}

impl Default for InMemoryDeliveryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeliveryQueue for InMemoryDeliveryQueue {
    async fn push(&self, envelope: TaskEnvelope) -> Result<(), QueueError> {
        self.queues.lock().await.push(envelope);
        self.notify.notify_one();
        Ok(())
    }

    async fn pop(&self, timeout: Duration) -> Result<Option<TaskEnvelope>, QueueError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(envelope) = self.queues.lock().await.pop() {
                return Ok(Some(envelope));
            }
            // notify_one keeps a permit when nobody waits, so a push between
            // the check above and this wait is not lost.
            if tokio::time::timeout_at(deadline, self.notify.notified())
                .await
                .is_err()
            {
                return Ok(None);
            }
        }
    }
}
