//! InMemoryTaskStore - 開発用の machine / task ストア
//!
//! # 実装詳細
//! - transition count と生成された envelope を 1 つの lock の下で管理
//!   → `commit` で両方が同時に見える（transition と task を同一トランザクションで書くのと同じ）
//! - コミットされた envelope は `take_outbox` まで outbox に溜まる
//!
//! # 学習ポイント
//! - `parking_lot::Mutex`（poison なし、同期 API）

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::app::generate::generate;
use crate::domain::{MachinePath, TaskEnvelope, WorkflowKey};
use crate::ports::{IdGenerator, MachineLookup, StateMachine};
use crate::typed::{RegistryError, TaskRegistry};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Transition counts only move forward.
    #[error("machine {path} is at transition {stored}, cannot commit {committed}")]
    TransitionOutOfOrder {
        path: MachinePath,
        stored: u64,
        committed: u64,
    },
}

#[derive(Default)]
struct State {
    machines: HashMap<MachinePath, u64>,
    outbox: Vec<TaskEnvelope>,
}

#[derive(Default)]
pub struct InMemoryTaskStore {
    state: Mutex<State>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// machine の最新 transition を task と一緒に永続化する
    ///
    /// エラー時は何も書かない。
    pub fn commit(
        &self,
        registry: &TaskRegistry,
        machine: &dyn StateMachine,
        workflow_key: &WorkflowKey,
        ids: &dyn IdGenerator,
    ) -> Result<Vec<TaskEnvelope>, StoreError> {
        let generated = generate(registry, machine)?;
        let path = generated.path.clone();
        let committed = generated.transition_count;

        let mut state = self.state.lock();
        if let Some(&stored) = state.machines.get(&path)
            && committed <= stored
        {
            return Err(StoreError::TransitionOutOfOrder {
                path,
                stored,
                committed,
            });
        }

        let envelopes = generated.into_envelopes(workflow_key, ids);
        state.machines.insert(path.clone(), committed);
        state.outbox.extend(envelopes.iter().cloned());

        debug!(machine = %path, transition_count = committed, tasks = envelopes.len(), "committed transition");
        Ok(envelopes)
    }

    /// Seed or overwrite a machine's transition count.
    pub fn set_transition_count(&self, path: &MachinePath, count: u64) {
        self.state.lock().machines.insert(path.clone(), count);
    }

    /// Remove a machine; its pending non-concurrent tasks will be dropped.
    pub fn delete_machine(&self, path: &MachinePath) -> bool {
        let removed = self.state.lock().machines.remove(path).is_some();
        if removed {
            info!(machine = %path, "deleted machine");
        }
        removed
    }

    pub fn take_outbox(&self) -> Vec<TaskEnvelope> {
        std::mem::take(&mut self.state.lock().outbox)
    }
}

impl MachineLookup for InMemoryTaskStore {
    fn current_transition_count(&self, path: &MachinePath) -> Option<u64> {
        self.state.lock().machines.get(path).copied()
    }
}
