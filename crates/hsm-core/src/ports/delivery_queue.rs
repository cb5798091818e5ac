//! DeliveryQueue port - 永続化された envelope が worker を待つ場所
//!
//! kind でキューを選ぶ: timer queue は 1 本、outbound は namespace + destination ごと。
//! 遅い destination は自分の task だけを詰まらせる。

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{TaskCategory, TaskEnvelope, TaskKind};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueueKey {
    Timer,
    Outbound { namespace: String, destination: String },
}

impl QueueKey {
    pub fn for_envelope(envelope: &TaskEnvelope) -> Self {
        match &envelope.record().kind {
            TaskKind::Timer { .. } => QueueKey::Timer,
            TaskKind::Outbound { destination } => QueueKey::Outbound {
                namespace: envelope.workflow_key().namespace.clone(),
                destination: destination.clone(),
            },
        }
    }

    pub fn category(&self) -> TaskCategory {
        match self {
            QueueKey::Timer => TaskCategory::Timer,
            QueueKey::Outbound { .. } => TaskCategory::Outbound,
        }
    }
}

impl fmt::Display for QueueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueKey::Timer => f.write_str("timer"),
            QueueKey::Outbound {
                namespace,
                destination,
            } => write!(f, "outbound/{namespace}/{destination}"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue is closed")]
    Closed,
}

#[async_trait]
pub trait DeliveryQueue: Send + Sync {
    async fn push(&self, envelope: TaskEnvelope) -> Result<(), QueueError>;

    /// Pop from any queue that has work, waiting up to `timeout`.
    async fn pop(&self, timeout: Duration) -> Result<Option<TaskEnvelope>, QueueError>;
}
