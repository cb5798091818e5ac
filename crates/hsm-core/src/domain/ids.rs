//! Domain identifiers (strongly-typed IDs).
//!
//! ## ULID
//! - **時刻でソート可能**: 別プロセスで払い出した id も生成順に並ぶ
//! - **分散生成可能**: 調整なしで複数ノードで生成できる
//!
//! ## Phantom Type パターン
//! `Id<T>` で共通実装を持ち、`T` はコンパイル時だけ使うマーカー型。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

pub trait IdMarker: Send + Sync + 'static {
    /// Display prefix, e.g. `"task-"`.
    fn prefix() -> &'static str;
}

#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Task {}

impl IdMarker for Task {
    fn prefix() -> &'static str {
        "task-"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Run {}

impl IdMarker for Run {
    fn prefix() -> &'static str {
        "run-"
    }
}

/// Identifier of a persisted task, allocated by the engine before storage.
pub type TaskId = Id<Task>;

/// Identifier of one workflow run.
pub type RunId = Id<Run>;

/// Workflow a machine (and its tasks) belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowKey {
    pub namespace: String,
    pub workflow_id: String,
    pub run_id: RunId,
}

impl WorkflowKey {
    pub fn new(namespace: impl Into<String>, workflow_id: impl Into<String>, run_id: RunId) -> Self {
        Self {
            namespace: namespace.into(),
            workflow_id: workflow_id.into(),
            run_id,
        }
    }
}

impl fmt::Display for WorkflowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.workflow_id, self.run_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_carry_their_prefix() {
        let task = TaskId::from_ulid(Ulid::new());
        let run = RunId::from_ulid(Ulid::new());
        assert!(task.to_string().starts_with("task-"));
        assert!(run.to_string().starts_with("run-"));

        // let _: RunId = task; // <- does not compile
    }

    #[test]
    fn ids_can_be_serialized() {
        let id = TaskId::from_ulid(Ulid::new());
        let s = serde_json::to_string(&id).unwrap();
        let back: TaskId = serde_json::from_str(&s).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        assert_eq!(std::mem::size_of::<TaskId>(), std::mem::size_of::<Ulid>());
    }
}
