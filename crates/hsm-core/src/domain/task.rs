//! Task - state machine の transition が emit する遅延実行の単位
//!
//! # 2 層構造
//! - **`TaskDefinition`**（型付き）: task 定義ごとに 1 つの Rust 型。
//!   type id / kind / concurrency を associated const で固定する
//! - **`Task`**（object-safe）: framework から見える面。payload の中身は見ず、
//!   type / kind / concurrency だけを見る
//!
//! # 学習ポイント
//! - blanket impl で全 `TaskDefinition` を `Task` にする
//!   → インスタンスごとに concurrency や type id が変わることはない

use std::any::Any;
use std::fmt::Debug;

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::kind::{KindTag, TaskKind};
use super::task_type::TaskType;

/// Object-safe view of a task.
pub trait Task: Debug + Send + Sync + 'static {
    /// Unique per task definition and stable across calls.
    fn task_type(&self) -> TaskType;

    /// Selects the queue category. The shape is fixed per `task_type`; only
    /// field values vary per instance.
    fn kind(&self) -> TaskKind;

    /// Concurrent tasks never carry a staleness reference; non-concurrent ones
    /// always do.
    fn concurrent(&self) -> bool;

    fn as_any(&self) -> &dyn Any;
}

/// A typed task definition.
///
/// # Example
/// ```ignore
/// #[derive(Debug, Clone, PartialEq)]
/// struct InvocationTask {
///     destination: String,
/// }
///
/// impl TaskDefinition for InvocationTask {
///     const TYPE: TaskType = TaskType::new(1, "callbacks.Invocation");
///     const KIND: KindTag = KindTag::Outbound;
///     const CONCURRENT: bool = false;
///     type Payload = ();
///
///     fn task_kind(&self) -> TaskKind {
///         TaskKind::outbound(&self.destination)
///     }
///
///     fn payload(&self) -> Self::Payload {}
///
///     fn from_parts(kind: TaskKind, _payload: ()) -> Option<Self> {
///         match kind {
///             TaskKind::Outbound { destination } => Some(Self { destination }),
///             TaskKind::Timer { .. } => None,
///         }
///     }
/// }
/// ```
///
/// # Payload
/// Kind fields travel in the persisted envelope, so `Payload` only holds what
/// the kind does not. `()` is a valid payload.
pub trait TaskDefinition: Debug + Send + Sync + Sized + 'static {
    const TYPE: TaskType;
    const KIND: KindTag;
    const CONCURRENT: bool;

    type Payload: Serialize + DeserializeOwned;

    fn task_kind(&self) -> TaskKind;

    fn payload(&self) -> Self::Payload;

    /// Rebuild the task from the envelope's kind and the decoded payload.
    ///
    /// Returns `None` when `kind` is not the shape this definition uses.
    fn from_parts(kind: TaskKind, payload: Self::Payload) -> Option<Self>;
}

impl<T: TaskDefinition> Task for T {
    fn task_type(&self) -> TaskType {
        T::TYPE
    }

    fn kind(&self) -> TaskKind {
        self.task_kind()
    }

    fn concurrent(&self) -> bool {
        T::CONCURRENT
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Recover the concrete definition from a `dyn Task`.
pub fn downcast<T: TaskDefinition>(task: &dyn Task) -> Option<&T> {
    task.as_any().downcast_ref::<T>()
}
