//! Task 生成 - コミットされた 1 transition を永続化できる record に変換する
//!
//! # 実装詳細
//! - engine の transition commit の中で同期的に実行される（CPU のみ）
//! - non-concurrent task の `StalenessRef` は task と同じ `TransitionOutput`
//!   から作る → snapshot と transition がずれない
//! - 1 件でも serialize に失敗したらバッチ全体を返さない

use tracing::debug;

use crate::domain::{
    MachinePath, StalenessRef, TaskEnvelope, TaskRecord, WorkflowKey,
};
use crate::ports::{IdGenerator, StateMachine};
use crate::typed::{RegistryError, TaskRegistry};

/// Records produced by one transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Generated {
    pub path: MachinePath,
    pub transition_count: u64,
    pub records: Vec<TaskRecord>,
}

impl Generated {
    /// Attach workflow identity and fresh task ids.
    pub fn into_envelopes(self, workflow_key: &WorkflowKey, ids: &dyn IdGenerator) -> Vec<TaskEnvelope> {
        self.records
            .into_iter()
            .map(|record| TaskEnvelope::new(ids.generate_task_id(), workflow_key.clone(), record))
            .collect()
    }
}

/// Serialize the tasks of the machine's latest transition.
///
/// All or nothing: 最初の serialize 失敗でバッチ全体を中断する
/// → task の一部だけを持った transition がコミットされることはない
pub fn generate(registry: &TaskRegistry, machine: &dyn StateMachine) -> Result<Generated, RegistryError> {
    let path = machine.path();
    let output = machine.transition_output();

    let mut records = Vec::with_capacity(output.tasks.len());
    for task in &output.tasks {
        let (type_id, payload) = registry.encode(task.as_ref())?;
        let staleness_ref = if task.concurrent() {
            None
        } else {
            Some(StalenessRef::new(path.clone(), output.transition_count))
        };
        records.push(TaskRecord {
            type_id,
            kind: task.kind(),
            payload,
            staleness_ref,
        });
    }

    debug!(
        machine = %path,
        transition_count = output.transition_count,
        tasks = records.len(),
        "generated tasks"
    );

    Ok(Generated {
        path,
        transition_count: output.transition_count,
        records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::task::fixtures::{BackoffTask, NotifyTask};
    use crate::domain::{RunId, Task, TaskDefinition, TaskKind};
    use crate::ports::{SystemClock, TransitionOutput, UlidGenerator};
    use crate::typed::RegistryBuilder;
    use chrono::Utc;
    use ulid::Ulid;

    struct Machine {
        path: MachinePath,
        count: u64,
        tasks: fn() -> Vec<Box<dyn Task>>,
    }

    impl StateMachine for Machine {
        fn path(&self) -> MachinePath {
            self.path.clone()
        }

        fn transition_output(&self) -> TransitionOutput {
            TransitionOutput {
                transition_count: self.count,
                tasks: (self.tasks)(),
            }
        }
    }

    fn registry() -> TaskRegistry {
        RegistryBuilder::new()
            .register::<BackoffTask>()
            .unwrap()
            .register::<NotifyTask>()
            .unwrap()
            .build()
            .unwrap()
    }

    fn mixed_tasks() -> Vec<Box<dyn Task>> {
        vec![
            Box::new(BackoffTask {
                deadline: Utc::now(),
                attempt: 1,
            }),
            Box::new(NotifyTask {
                destination: "my-endpoint".to_string(),
            }),
        ]
    }

    #[test]
    fn only_non_concurrent_tasks_get_a_ref() {
        let machine = Machine {
            path: "wf1/step2".parse().unwrap(),
            count: 5,
            tasks: mixed_tasks,
        };
        let generated = generate(&registry(), &machine).unwrap();

        assert_eq!(generated.transition_count, 5);
        assert_eq!(generated.records.len(), 2);

        let timer = &generated.records[0];
        assert_eq!(timer.type_id, BackoffTask::TYPE.id());
        assert_eq!(
            timer.staleness_ref,
            Some(StalenessRef::new("wf1/step2".parse().unwrap(), 5))
        );

        let outbound = &generated.records[1];
        assert_eq!(outbound.kind, TaskKind::outbound("my-endpoint"));
        assert!(outbound.staleness_ref.is_none());
    }

    #[test]
    fn machine_without_tasks_generates_nothing() {
        let machine = Machine {
            path: "wf1".parse().unwrap(),
            count: 1,
            tasks: Vec::new,
        };
        let generated = generate(&registry(), &machine).unwrap();
        assert!(generated.records.is_empty());
    }

    #[test]
    fn unregistered_task_aborts_the_batch() {
        let machine = Machine {
            path: "wf1".parse().unwrap(),
            count: 1,
            tasks: mixed_tasks,
        };
        let registry = RegistryBuilder::new()
            .register::<BackoffTask>()
            .unwrap()
            .build()
            .unwrap();
        let err = generate(&registry, &machine).unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(11)));
    }

    #[test]
    fn envelopes_get_distinct_task_ids() {
        let machine = Machine {
            path: "wf1".parse().unwrap(),
            count: 2,
            tasks: mixed_tasks,
        };
        let key = WorkflowKey::new("default", "wf1", RunId::from_ulid(Ulid::new()));
        let envelopes = generate(&registry(), &machine)
            .unwrap()
            .into_envelopes(&key, &UlidGenerator::new(SystemClock));
        assert_eq!(envelopes.len(), 2);
        assert_ne!(envelopes[0].task_id(), envelopes[1].task_id());
        assert!(envelopes.iter().all(|e| e.workflow_key() == &key));
    }
}
