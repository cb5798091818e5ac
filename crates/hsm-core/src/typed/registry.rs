//! TaskRegistry - task type id → serializer の対応表
//!
//! # 学習ポイント
//! - Builder で組み立てて、`build()` 後は immutable にするライフサイクル
//! - `Arc<TaskRegistry>` で共有し、読み取りはロック不要
//! - 重複登録は起動時のエラーにする（同じ id の二重登録は上書きしない）

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::debug;

use super::codec::{JsonTaskSerializer, SerializerError, TaskSerializer};
use crate::domain::{ErrorKind, Task, TaskDefinition, TaskRecord, TaskType};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A type id may only ever map to one serializer.
    #[error("serializer for task type id={} already registered as {existing}", .task_type.id())]
    AlreadyRegistered {
        task_type: TaskType,
        existing: TaskType,
    },

    #[error("no serializer registered for task type id={0}")]
    NotFound(i32),

    /// The task reports a type whose registered serializer expects another
    /// definition name; usually two definitions sharing one id.
    #[error("task type {actual} does not match registered {registered}")]
    TypeConflict {
        registered: TaskType,
        actual: TaskType,
    },

    #[error(transparent)]
    Serializer(#[from] SerializerError),
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::NotFound(_) => ErrorKind::VersionSkew,
            RegistryError::AlreadyRegistered { .. } | RegistryError::TypeConflict { .. } => {
                ErrorKind::Permanent
            }
            RegistryError::Serializer(e) => e.kind(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing task types: {0:?}. These types were expected but not registered.")]
    MissingTaskTypes(Vec<i32>),
}

struct Entry {
    task_type: TaskType,
    serializer: Arc<dyn TaskSerializer>,
}

/// 起動時だけ使う serializer の登録器
///
/// # 使用例
/// ```ignore
/// let registry = RegistryBuilder::new()
///     .register::<InvocationTask>()?
///     .register::<BackoffTask>()?
///     .expect_types(&[1, 2])
///     .build()?;
/// ```
#[derive(Default)]
pub struct RegistryBuilder {
    entries: HashMap<i32, Entry>,
    expected: Option<Vec<i32>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the JSON serializer of a task definition.
    pub fn register<T: TaskDefinition>(self) -> Result<Self, RegistryError> {
        self.register_serializer(T::TYPE, Arc::new(JsonTaskSerializer::<T>::new()))
    }

    /// Register a custom serializer.
    ///
    /// 同じ id の二重登録は、等価な serializer でもエラー。
    pub fn register_serializer(
        mut self,
        task_type: TaskType,
        serializer: Arc<dyn TaskSerializer>,
    ) -> Result<Self, RegistryError> {
        if let Some(existing) = self.entries.get(&task_type.id()) {
            return Err(RegistryError::AlreadyRegistered {
                task_type,
                existing: existing.task_type,
            });
        }
        debug!(task_type = %task_type, kind = %serializer.kind(), "registered task serializer");
        self.entries.insert(
            task_type.id(),
            Entry {
                task_type,
                serializer,
            },
        );
        Ok(self)
    }

    /// Type ids that must be registered for `build()` to succeed.
    pub fn expect_types(mut self, type_ids: &[i32]) -> Self {
        self.expected = Some(type_ids.to_vec());
        self
    }

    pub fn build(self) -> Result<TaskRegistry, BuildError> {
        if let Some(expected) = &self.expected {
            let missing: BTreeSet<i32> = expected
                .iter()
                .copied()
                .filter(|id| !self.entries.contains_key(id))
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingTaskTypes(missing.into_iter().collect()));
            }
        }
        Ok(TaskRegistry {
            entries: self.entries,
        })
    }
}

/// Frozen registry, safe for concurrent lookups.
pub struct TaskRegistry {
    entries: HashMap<i32, Entry>,
}

impl TaskRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// 永続化された type id の serializer を返す
    ///
    /// rolling upgrade 中は未知の id が来るのが普通。panic せず `NotFound` を返す。
    /// ログは出さない（defer するかどうかを決める worker 側で出す）。
    pub fn get(&self, type_id: i32) -> Result<Arc<dyn TaskSerializer>, RegistryError> {
        self.entries
            .get(&type_id)
            .map(|entry| Arc::clone(&entry.serializer))
            .ok_or(RegistryError::NotFound(type_id))
    }

    pub fn task_type(&self, type_id: i32) -> Option<TaskType> {
        self.entries.get(&type_id).map(|e| e.task_type)
    }

    /// Sorted by id.
    pub fn registered_types(&self) -> Vec<TaskType> {
        let mut types: Vec<TaskType> = self.entries.values().map(|e| e.task_type).collect();
        types.sort_by_key(TaskType::id);
        types
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize a task with the serializer registered for its type.
    pub fn encode(&self, task: &dyn Task) -> Result<(i32, Vec<u8>), RegistryError> {
        let task_type = task.task_type();
        let entry = self
            .entries
            .get(&task_type.id())
            .ok_or(RegistryError::NotFound(task_type.id()))?;
        if entry.task_type != task_type {
            return Err(RegistryError::TypeConflict {
                registered: entry.task_type,
                actual: task_type,
            });
        }
        let payload = entry.serializer.serialize(task)?;
        Ok((task_type.id(), payload))
    }

    /// Rebuild the task stored in a record.
    pub fn decode(&self, record: &TaskRecord) -> Result<Box<dyn Task>, RegistryError> {
        let serializer = self.get(record.type_id)?;
        Ok(serializer.deserialize(&record.payload, record.kind.clone())?)
    }
}
