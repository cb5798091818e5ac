//! デモ用の小さな callback state machine
//!
//! - SCHEDULED: invocation を emit（outbound, transition に紐づく）
//! - BACKING_OFF: backoff timer を emit
//! - どの transition でも concurrent な refresh task を emit（いつ実行しても安全）

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use hsm_core::domain::{KindTag, MachinePath, Task, TaskDefinition, TaskEnvelope, TaskKind, TaskType};
use hsm_core::ports::{StateMachine, TransitionOutput};
use hsm_core::typed::{Handler, HandlerError};

pub const INVOCATION: TaskType = TaskType::new(1, "callbacks.Invocation");
pub const BACKOFF: TaskType = TaskType::new(2, "callbacks.Backoff");
pub const REFRESH: TaskType = TaskType::new(3, "callbacks.Refresh");

#[derive(Debug, Clone, PartialEq)]
pub struct InvocationTask {
    pub destination: String,
    pub attempt: u32,
}

#[derive(Serialize, Deserialize)]
pub struct InvocationPayload {
    attempt: u32,
}

impl TaskDefinition for InvocationTask {
    const TYPE: TaskType = INVOCATION;
    const KIND: KindTag = KindTag::Outbound;
    const CONCURRENT: bool = false;
    type Payload = InvocationPayload;

    fn task_kind(&self) -> TaskKind {
        TaskKind::outbound(&self.destination)
    }

    fn payload(&self) -> InvocationPayload {
        InvocationPayload {
            attempt: self.attempt,
        }
    }

    fn from_parts(kind: TaskKind, payload: InvocationPayload) -> Option<Self> {
        match kind {
            TaskKind::Outbound { destination } => Some(Self {
                destination,
                attempt: payload.attempt,
            }),
            TaskKind::Timer { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackoffTask {
    pub deadline: DateTime<Utc>,
}

impl TaskDefinition for BackoffTask {
    const TYPE: TaskType = BACKOFF;
    const KIND: KindTag = KindTag::Timer;
    const CONCURRENT: bool = false;
    type Payload = ();

    fn task_kind(&self) -> TaskKind {
        TaskKind::timer(self.deadline)
    }

    fn payload(&self) {}

    fn from_parts(kind: TaskKind, _payload: ()) -> Option<Self> {
        match kind {
            TaskKind::Timer { deadline } => Some(Self { deadline }),
            TaskKind::Outbound { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefreshTask {
    pub destination: String,
}

impl TaskDefinition for RefreshTask {
    const TYPE: TaskType = REFRESH;
    const KIND: KindTag = KindTag::Outbound;
    const CONCURRENT: bool = true;
    type Payload = ();

    fn task_kind(&self) -> TaskKind {
        TaskKind::outbound(&self.destination)
    }

    fn payload(&self) {}

    fn from_parts(kind: TaskKind, _payload: ()) -> Option<Self> {
        match kind {
            TaskKind::Outbound { destination } => Some(Self { destination }),
            TaskKind::Timer { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackState {
    Scheduled,
    BackingOff,
}

/// Callback machine; each call to `attempt_failed`/`rescheduled` is one
/// transition.
pub struct CallbackMachine {
    path: MachinePath,
    destination: String,
    state: CallbackState,
    attempt: u32,
    transition_count: u64,
}

impl CallbackMachine {
    pub fn new(path: MachinePath, destination: impl Into<String>) -> Self {
        Self {
            path,
            destination: destination.into(),
            state: CallbackState::Scheduled,
            attempt: 1,
            transition_count: 1,
        }
    }

    pub fn attempt_failed(&mut self) {
        self.state = CallbackState::BackingOff;
        self.transition_count += 1;
    }

    pub fn rescheduled(&mut self) {
        self.state = CallbackState::Scheduled;
        self.attempt += 1;
        self.transition_count += 1;
    }
}

impl StateMachine for CallbackMachine {
    fn path(&self) -> MachinePath {
        self.path.clone()
    }

    fn transition_output(&self) -> TransitionOutput {
        let mut tasks: Vec<Box<dyn Task>> = Vec::with_capacity(2);
        match self.state {
            CallbackState::Scheduled => tasks.push(Box::new(InvocationTask {
                destination: self.destination.clone(),
                attempt: self.attempt,
            })),
            CallbackState::BackingOff => tasks.push(Box::new(BackoffTask {
                deadline: Utc::now() + Duration::seconds(i64::from(self.attempt)),
            })),
        }
        tasks.push(Box::new(RefreshTask {
            destination: self.destination.clone(),
        }));
        TransitionOutput {
            transition_count: self.transition_count,
            tasks,
        }
    }
}

pub struct InvocationHandler;

#[async_trait]
impl Handler<InvocationTask> for InvocationHandler {
    async fn handle(&self, envelope: &TaskEnvelope, task: &InvocationTask) -> Result<(), HandlerError> {
        info!(task_id = %envelope.task_id(), destination = %task.destination, attempt = task.attempt, "invoking callback");
        Ok(())
    }
}

pub struct BackoffHandler;

#[async_trait]
impl Handler<BackoffTask> for BackoffHandler {
    async fn handle(&self, envelope: &TaskEnvelope, task: &BackoffTask) -> Result<(), HandlerError> {
        info!(task_id = %envelope.task_id(), deadline = %task.deadline, "backoff elapsed");
        Ok(())
    }
}

pub struct RefreshHandler;

#[async_trait]
impl Handler<RefreshTask> for RefreshHandler {
    async fn handle(&self, envelope: &TaskEnvelope, task: &RefreshTask) -> Result<(), HandlerError> {
        info!(task_id = %envelope.task_id(), destination = %task.destination, "refreshing");
        Ok(())
    }
}
