//! Domain model: task type, kind, task, staleness reference, record.

pub mod envelope;
pub mod errors;
pub mod ids;
pub mod kind;
pub mod reference;
pub mod task;
pub mod task_type;

pub use self::envelope::{OutboundTaskInfo, TaskEnvelope, TaskInfo, TaskRecord, TimerTaskInfo};
pub use self::errors::ErrorKind;
pub use self::ids::{RunId, TaskId, WorkflowKey};
pub use self::kind::{KindError, KindTag, TaskCategory, TaskKind};
pub use self::reference::{Freshness, MachinePath, PathError, StalenessRef};
pub use self::task::{Task, TaskDefinition, downcast};
pub use self::task_type::TaskType;
