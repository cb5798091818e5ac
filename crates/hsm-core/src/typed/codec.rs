//! TaskSerializer - Task と payload bytes の相互変換
//!
//! # フロー
//! 1. 生成時: `serialize(&dyn Task)` → bytes（type id と kind の横に保存）
//! 2. 実行時: 保存された kind を `deserialize` に渡す
//!    → kind のフィールドを payload 側に重複して持たなくてよい
//!
//! # 学習ポイント
//! - `PhantomData<fn() -> T>` で `JsonTaskSerializer<T>` を Send + Sync に保つ

use std::marker::PhantomData;

use crate::domain::{ErrorKind, KindTag, Task, TaskDefinition, TaskKind, TaskType, downcast};

#[derive(Debug, thiserror::Error)]
pub enum SerializerError {
    /// The task or stored kind is not the kind this serializer handles.
    #[error("invalid task kind: expected {expected}, got {actual}")]
    InvalidKind { expected: KindTag, actual: KindTag },

    /// Right kind, but a different task definition.
    #[error("serializer for {expected} received task {actual}")]
    TypeMismatch { expected: TaskType, actual: TaskType },

    #[error("payload encoding for {task_type}: {source}")]
    Encoding {
        task_type: TaskType,
        #[source]
        source: serde_json::Error,
    },
}

impl SerializerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SerializerError::InvalidKind { .. }
            | SerializerError::TypeMismatch { .. }
            | SerializerError::Encoding { .. } => ErrorKind::Permanent,
        }
    }
}

/// Object-safe serializer, registered per task type id.
pub trait TaskSerializer: Send + Sync {
    /// Kind shape accepted by `serialize` and `deserialize`.
    fn kind(&self) -> KindTag;

    /// Fails with `InvalidKind` before producing any bytes when the task's
    /// kind is not `self.kind()`.
    fn serialize(&self, task: &dyn Task) -> Result<Vec<u8>, SerializerError>;

    /// `kind` comes from the persisted envelope, not from `data`.
    fn deserialize(&self, data: &[u8], kind: TaskKind) -> Result<Box<dyn Task>, SerializerError>;
}

/// serde_json backed serializer for a `TaskDefinition`.
pub struct JsonTaskSerializer<T: TaskDefinition> {
    _marker: PhantomData<fn() -> T>,
}

impl<T: TaskDefinition> JsonTaskSerializer<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }

    fn check_kind(actual: KindTag) -> Result<(), SerializerError> {
        if actual != T::KIND {
            return Err(SerializerError::InvalidKind {
                expected: T::KIND,
                actual,
            });
        }
        Ok(())
    }
}

impl<T: TaskDefinition> Default for JsonTaskSerializer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TaskDefinition> TaskSerializer for JsonTaskSerializer<T> {
    fn kind(&self) -> KindTag {
        T::KIND
    }

    fn serialize(&self, task: &dyn Task) -> Result<Vec<u8>, SerializerError> {
        Self::check_kind(task.kind().tag())?;
        let typed = downcast::<T>(task).ok_or(SerializerError::TypeMismatch {
            expected: T::TYPE,
            actual: task.task_type(),
        })?;
        serde_json::to_vec(&typed.payload()).map_err(|source| SerializerError::Encoding {
            task_type: T::TYPE,
            source,
        })
    }

    fn deserialize(&self, data: &[u8], kind: TaskKind) -> Result<Box<dyn Task>, SerializerError> {
        let actual = kind.tag();
        Self::check_kind(actual)?;
        let payload: T::Payload =
            serde_json::from_slice(data).map_err(|source| SerializerError::Encoding {
                task_type: T::TYPE,
                source,
            })?;
        let task = T::from_parts(kind, payload).ok_or(SerializerError::InvalidKind {
            expected: T::KIND,
            actual,
        })?;
        Ok(Box::new(task))
    }
}
