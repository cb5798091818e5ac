//! Handler trait - fresh と判定された Task を実行する
//!
//! # 学習ポイント
//! - ジェネリック trait (`Handler<T>`): handler は自分の TaskDefinition しか見ない
//! - Object-safe trait (`DynHandler`): 異なる定義の handler を `HandlerSet` に並べる
//! - Type erasure パターン (`TypedHandler<T, H>` → `DynHandler`、`dyn Task` を downcast)

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{ErrorKind, Task, TaskDefinition, TaskEnvelope, TaskType, downcast};

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// Retry later (destination unavailable, timeout, ...).
    #[error("transient: {0}")]
    Transient(String),

    #[error("permanent: {0}")]
    Permanent(String),

    #[error("handler for {expected} received task {actual}")]
    TypeMismatch { expected: TaskType, actual: TaskType },
}

impl HandlerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HandlerError::Transient(_) => ErrorKind::Transient,
            HandlerError::Permanent(_) | HandlerError::TypeMismatch { .. } => ErrorKind::Permanent,
        }
    }
}

/// 1 つの TaskDefinition を実行する Handler
///
/// # 使用例
/// ```ignore
/// struct InvocationHandler;
///
/// #[async_trait]
/// impl Handler<InvocationTask> for InvocationHandler {
///     async fn handle(&self, env: &TaskEnvelope, task: &InvocationTask) -> Result<(), HandlerError> {
///         call(&task.destination).await.map_err(|e| HandlerError::Transient(e.to_string()))
///     }
/// }
/// ```
#[async_trait]
pub trait Handler<T: TaskDefinition>: Send + Sync {
    async fn handle(&self, envelope: &TaskEnvelope, task: &T) -> Result<(), HandlerError>;
}

#[async_trait]
pub trait DynHandler: Send + Sync {
    async fn handle_dyn(&self, envelope: &TaskEnvelope, task: &dyn Task) -> Result<(), HandlerError>;
    fn task_type(&self) -> TaskType;
}

pub struct TypedHandler<T: TaskDefinition, H: Handler<T>> {
    handler: H,
    _marker: PhantomData<fn() -> T>,
}

impl<T: TaskDefinition, H: Handler<T>> TypedHandler<T, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T: TaskDefinition, H: Handler<T>> DynHandler for TypedHandler<T, H> {
    async fn handle_dyn(&self, envelope: &TaskEnvelope, task: &dyn Task) -> Result<(), HandlerError> {
        let typed = downcast::<T>(task).ok_or(HandlerError::TypeMismatch {
            expected: T::TYPE,
            actual: task.task_type(),
        })?;
        self.handler.handle(envelope, typed).await
    }

    fn task_type(&self) -> TaskType {
        T::TYPE
    }
}

#[derive(Debug, thiserror::Error)]
#[error("handler for task type {0} is already registered")]
pub struct DuplicateHandler(pub TaskType);

/// Handlers keyed by task type id. Built at startup, read-only afterwards.
#[derive(Default)]
pub struct HandlerSet {
    handlers: HashMap<i32, Arc<dyn DynHandler>>,
}

impl HandlerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: TaskDefinition, H: Handler<T> + 'static>(
        &mut self,
        handler: H,
    ) -> Result<(), DuplicateHandler> {
        if self.handlers.contains_key(&T::TYPE.id()) {
            return Err(DuplicateHandler(T::TYPE));
        }
        self.handlers
            .insert(T::TYPE.id(), Arc::new(TypedHandler::<T, H>::new(handler)));
        Ok(())
    }

    pub fn get(&self, type_id: i32) -> Option<Arc<dyn DynHandler>> {
        self.handlers.get(&type_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
