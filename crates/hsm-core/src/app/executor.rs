//! Executor - 永続化された task を検証して実行する
//!
//! # フロー
//! 1. type id で registry を引く（未登録 → `VersionSkew` エラー）
//! 2. `StalenessRef` を持つ record は staleness check
//! 3. envelope の kind で deserialize
//! 4. type に登録された handler を実行
//!
//! stale な task の破棄は通常の結果であってエラーではない。

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::{ErrorKind, Freshness, StalenessRef, Task, TaskEnvelope};
use crate::ports::MachineLookup;
use crate::typed::{HandlerError, HandlerSet, RegistryError, TaskRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The machine transitioned after the task was generated.
    Stale { generated_at: u64, current: u64 },

    /// The machine the task refers to no longer exists.
    MachineNotFound,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::Stale {
                generated_at,
                current,
            } => write!(f, "stale (generated at {generated_at}, machine at {current})"),
            DropReason::MachineNotFound => f.write_str("machine not found"),
        }
    }
}

#[derive(Debug)]
pub enum Prepared {
    Ready(Box<dyn Task>),
    Dropped(DropReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execution {
    Executed,
    Dropped(DropReason),
}

#[derive(Debug, thiserror::Error)]
pub enum ExecuteError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("no handler registered for task type id={0}")]
    HandlerNotFound(i32),

    #[error(transparent)]
    Handler(#[from] HandlerError),
}

impl ExecuteError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExecuteError::Registry(e) => e.kind(),
            ExecuteError::HandlerNotFound(_) => ErrorKind::Permanent,
            ExecuteError::Handler(e) => e.kind(),
        }
    }
}

pub struct Executor {
    registry: Arc<TaskRegistry>,
    handlers: Arc<HandlerSet>,
    machines: Arc<dyn MachineLookup>,
}

impl Executor {
    pub fn new(
        registry: Arc<TaskRegistry>,
        handlers: Arc<HandlerSet>,
        machines: Arc<dyn MachineLookup>,
    ) -> Self {
        Self {
            registry,
            handlers,
            machines,
        }
    }

    /// Everything up to, but excluding, the handler.
    pub fn prepare(&self, envelope: &TaskEnvelope) -> Result<Prepared, ExecuteError> {
        let record = envelope.record();
        let serializer = self.registry.get(record.type_id)?;

        if let Some(staleness_ref) = &record.staleness_ref
            && let Some(reason) = self.check(envelope, staleness_ref)
        {
            return Ok(Prepared::Dropped(reason));
        }

        let task = serializer
            .deserialize(&record.payload, record.kind.clone())
            .map_err(RegistryError::from)?;
        Ok(Prepared::Ready(task))
    }

    pub async fn execute(&self, envelope: &TaskEnvelope) -> Result<Execution, ExecuteError> {
        let task = match self.prepare(envelope)? {
            Prepared::Ready(task) => task,
            Prepared::Dropped(reason) => return Ok(Execution::Dropped(reason)),
        };

        let type_id = envelope.record().type_id;
        let handler = self
            .handlers
            .get(type_id)
            .ok_or(ExecuteError::HandlerNotFound(type_id))?;
        handler.handle_dyn(envelope, task.as_ref()).await?;
        Ok(Execution::Executed)
    }

    fn check(&self, envelope: &TaskEnvelope, staleness_ref: &StalenessRef) -> Option<DropReason> {
        let current = self.machines.current_transition_count(&staleness_ref.path);
        match staleness_ref.validate(current) {
            Freshness::Fresh => None,
            Freshness::Stale {
                generated_at,
                current,
            } => {
                info!(
                    task_id = %envelope.task_id(),
                    machine = %staleness_ref.path,
                    generated_at,
                    current,
                    "dropping stale task"
                );
                Some(DropReason::Stale {
                    generated_at,
                    current,
                })
            }
            Freshness::MachineNotFound => {
                warn!(
                    task_id = %envelope.task_id(),
                    workflow = %envelope.workflow_key(),
                    machine = %staleness_ref.path,
                    "dropping task of a machine that no longer exists"
                );
                Some(DropReason::MachineNotFound)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::domain::task::fixtures::{BackoffTask, NotifyTask};
    use crate::domain::{
        MachinePath, RunId, TaskDefinition, TaskId, TaskKind, TaskRecord, WorkflowKey,
    };
    use crate::typed::RegistryBuilder;
    use crate::typed::handler::test_handlers::Counting;
    use chrono::{TimeZone, Utc};
    use rstest::rstest;
    use ulid::Ulid;

    #[derive(Default)]
    struct Machines(Mutex<HashMap<MachinePath, u64>>);

    impl Machines {
        fn set(&self, path: &str, count: u64) {
            self.0.lock().unwrap().insert(path.parse().unwrap(), count);
        }
    }

    impl MachineLookup for Machines {
        fn current_transition_count(&self, path: &MachinePath) -> Option<u64> {
            self.0.lock().unwrap().get(path).copied()
        }
    }

    struct Fixture {
        executor: Executor,
        machines: Arc<Machines>,
        backoff_calls: Counting,
        notify_calls: Counting,
    }

    fn fixture() -> Fixture {
        let registry = RegistryBuilder::new()
            .register::<BackoffTask>()
            .unwrap()
            .register::<NotifyTask>()
            .unwrap()
            .build()
            .unwrap();
        let backoff_calls = Counting::default();
        let notify_calls = Counting::default();
        let mut handlers = HandlerSet::new();
        handlers
            .register::<BackoffTask, _>(backoff_calls.clone())
            .unwrap();
        handlers
            .register::<NotifyTask, _>(notify_calls.clone())
            .unwrap();
        let machines = Arc::new(Machines::default());
        let executor = Executor::new(Arc::new(registry), Arc::new(handlers), machines.clone());
        Fixture {
            executor,
            machines,
            backoff_calls,
            notify_calls,
        }
    }

    fn envelope(record: TaskRecord) -> TaskEnvelope {
        TaskEnvelope::new(
            TaskId::from_ulid(Ulid::new()),
            WorkflowKey::new("default", "wf1", RunId::from_ulid(Ulid::new())),
            record,
        )
    }

    fn timer_at(count: u64) -> TaskEnvelope {
        envelope(TaskRecord {
            type_id: BackoffTask::TYPE.id(),
            kind: TaskKind::timer(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()),
            payload: br#"{"attempt":1}"#.to_vec(),
            staleness_ref: Some(StalenessRef::new("wf1/step2".parse().unwrap(), count)),
        })
    }

    fn concurrent_outbound() -> TaskEnvelope {
        envelope(TaskRecord {
            type_id: NotifyTask::TYPE.id(),
            kind: TaskKind::outbound("my-endpoint"),
            payload: b"null".to_vec(),
            staleness_ref: None,
        })
    }

    #[tokio::test]
    async fn fresh_non_concurrent_task_executes() {
        let f = fixture();
        f.machines.set("wf1/step2", 5);
        let outcome = f.executor.execute(&timer_at(5)).await.unwrap();
        assert_eq!(outcome, Execution::Executed);
        assert_eq!(f.backoff_calls.calls(), 1);
    }

    #[rstest]
    #[case(6)]
    #[case(7)]
    #[case(4)]
    #[tokio::test]
    async fn stale_non_concurrent_task_is_dropped(#[case] current: u64) {
        let f = fixture();
        f.machines.set("wf1/step2", current);
        let outcome = f.executor.execute(&timer_at(5)).await.unwrap();
        assert_eq!(
            outcome,
            Execution::Dropped(DropReason::Stale {
                generated_at: 5,
                current
            })
        );
        assert_eq!(f.backoff_calls.calls(), 0);
    }

    #[tokio::test]
    async fn timer_from_transition_five_is_dropped_at_seven() {
        let f = fixture();
        f.machines.set("wf1/step2", 7);
        let prepared = f.executor.prepare(&timer_at(5)).unwrap();
        assert!(matches!(
            prepared,
            Prepared::Dropped(DropReason::Stale {
                generated_at: 5,
                current: 7
            })
        ));
        f.executor.execute(&timer_at(5)).await.unwrap();
        assert_eq!(f.backoff_calls.calls(), 0);
    }

    #[tokio::test]
    async fn concurrent_task_ignores_transitions() {
        let f = fixture();
        f.machines.set("wf1/step2", 9);
        let env = concurrent_outbound();
        match f.executor.prepare(&env).unwrap() {
            Prepared::Ready(task) => {
                assert_eq!(task.kind(), TaskKind::outbound("my-endpoint"));
                assert!(task.concurrent());
            }
            Prepared::Dropped(reason) => panic!("unexpected drop: {reason}"),
        }
        assert_eq!(f.executor.execute(&env).await.unwrap(), Execution::Executed);
        assert_eq!(f.notify_calls.calls(), 1);
    }

    #[tokio::test]
    async fn missing_machine_is_its_own_drop_reason() {
        let f = fixture();
        let outcome = f.executor.execute(&timer_at(5)).await.unwrap();
        assert_eq!(outcome, Execution::Dropped(DropReason::MachineNotFound));
        assert_eq!(f.backoff_calls.calls(), 0);
    }

    #[tokio::test]
    async fn unregistered_type_is_version_skew() {
        let f = fixture();
        let env = envelope(TaskRecord {
            type_id: 404,
            kind: TaskKind::outbound("x"),
            payload: Vec::new(),
            staleness_ref: None,
        });
        let err = f.executor.execute(&env).await.unwrap_err();
        assert!(matches!(err, ExecuteError::Registry(RegistryError::NotFound(404))));
        assert_eq!(err.kind(), ErrorKind::VersionSkew);
        assert!(err.kind().is_retryable());
    }

    #[tokio::test]
    async fn kind_mismatch_is_permanent() {
        let f = fixture();
        let env = envelope(TaskRecord {
            type_id: NotifyTask::TYPE.id(),
            kind: TaskKind::timer(Utc::now()),
            payload: b"null".to_vec(),
            staleness_ref: None,
        });
        let err = f.executor.execute(&env).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Permanent);
        assert_eq!(f.notify_calls.calls(), 0);
    }

    #[tokio::test]
    async fn missing_handler_is_reported() {
        let registry = RegistryBuilder::new()
            .register::<NotifyTask>()
            .unwrap()
            .build()
            .unwrap();
        let executor = Executor::new(
            Arc::new(registry),
            Arc::new(HandlerSet::new()),
            Arc::new(Machines::default()),
        );
        let err = executor.execute(&concurrent_outbound()).await.unwrap_err();
        assert!(matches!(err, ExecuteError::HandlerNotFound(11)));
    }
}
