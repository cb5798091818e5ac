//! IdGenerator port - task id / run id の払い出し
//!
//! ULID なので複数プロセスが協調なしで払い出せる。

use crate::domain::ids::{RunId, TaskId};
use crate::ports::Clock;
use ulid::Ulid;

pub trait IdGenerator: Send + Sync {
    fn generate_task_id(&self) -> TaskId;

    fn generate_run_id(&self) -> RunId;
}

/// ULID generator; the timestamp part comes from `C`.
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_task_id(&self) -> TaskId {
        TaskId::from(self.next())
    }

    fn generate_run_id(&self) -> RunId {
        RunId::from(self.next())
    }
}
