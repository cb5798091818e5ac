//! 永続化される task record
//!
//! - `TaskRecord`: emit された task ごとに framework が作るもの
//! - `TaskEnvelope`: engine が task id + workflow key で包んで保存し、
//!   executor は queue から同じ envelope を受け取る

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{TaskId, WorkflowKey};
use super::kind::{TaskCategory, TaskKind};
use super::reference::StalenessRef;

/// Minimum persisted state of one task.
///
/// `staleness_ref` is present exactly for non-concurrent tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub type_id: i32,
    pub kind: TaskKind,
    #[serde(with = "payload_bytes")]
    pub payload: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staleness_ref: Option<StalenessRef>,
}

impl TaskRecord {
    pub fn concurrent(&self) -> bool {
        self.staleness_ref.is_none()
    }

    pub fn category(&self) -> TaskCategory {
        self.kind.category()
    }

    /// Concrete wire message for this record's kind.
    pub fn to_info(&self) -> TaskInfo {
        match &self.kind {
            TaskKind::Timer { deadline } => TaskInfo::Timer(TimerTaskInfo {
                type_id: self.type_id,
                deadline: *deadline,
                payload: self.payload.clone(),
                staleness_ref: self.staleness_ref.clone(),
            }),
            TaskKind::Outbound { destination } => TaskInfo::Outbound(OutboundTaskInfo {
                type_id: self.type_id,
                destination: destination.clone(),
                payload: self.payload.clone(),
                staleness_ref: self.staleness_ref.clone(),
            }),
        }
    }
}

/// Timer queue message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerTaskInfo {
    pub type_id: i32,
    pub deadline: DateTime<Utc>,
    pub payload: Vec<u8>,
    pub staleness_ref: Option<StalenessRef>,
}

/// Outbound queue message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundTaskInfo {
    pub type_id: i32,
    pub destination: String,
    pub payload: Vec<u8>,
    pub staleness_ref: Option<StalenessRef>,
}

/// One wire message per kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskInfo {
    Timer(TimerTaskInfo),
    Outbound(OutboundTaskInfo),
}

impl TaskInfo {
    pub fn category(&self) -> TaskCategory {
        match self {
            TaskInfo::Timer(_) => TaskCategory::Timer,
            TaskInfo::Outbound(_) => TaskCategory::Outbound,
        }
    }

    /// Back to the kind-agnostic record.
    pub fn into_record(self) -> TaskRecord {
        match self {
            TaskInfo::Timer(info) => TaskRecord {
                type_id: info.type_id,
                kind: TaskKind::Timer {
                    deadline: info.deadline,
                },
                payload: info.payload,
                staleness_ref: info.staleness_ref,
            },
            TaskInfo::Outbound(info) => TaskRecord {
                type_id: info.type_id,
                kind: TaskKind::Outbound {
                    destination: info.destination,
                },
                payload: info.payload,
                staleness_ref: info.staleness_ref,
            },
        }
    }
}

/// A stored task: record plus the identity the engine fills in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEnvelope {
    task_id: TaskId,
    workflow_key: WorkflowKey,
    record: TaskRecord,
}

impl TaskEnvelope {
    pub fn new(task_id: TaskId, workflow_key: WorkflowKey, record: TaskRecord) -> Self {
        Self {
            task_id,
            workflow_key,
            record,
        }
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn workflow_key(&self) -> &WorkflowKey {
        &self.workflow_key
    }

    pub fn record(&self) -> &TaskRecord {
        &self.record
    }
}

/// Payloads are opaque bytes; JSON stores them as a UTF-8 string when they
/// are valid UTF-8 and as a byte array otherwise.
mod payload_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Text(String),
        Bytes(Vec<u8>),
    }

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        match std::str::from_utf8(bytes) {
            Ok(text) => s.serialize_str(text),
            Err(_) => s.collect_seq(bytes),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        Ok(match Repr::deserialize(d)? {
            Repr::Text(text) => text.into_bytes(),
            Repr::Bytes(bytes) => bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::RunId;
    use chrono::TimeZone;
    use ulid::Ulid;

    fn timer_record() -> TaskRecord {
        TaskRecord {
            type_id: 10,
            kind: TaskKind::timer(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()),
            payload: br#"{"attempt":1}"#.to_vec(),
            staleness_ref: Some(StalenessRef::new("wf1/step2".parse().unwrap(), 5)),
        }
    }

    #[test]
    fn concurrency_is_implied_by_missing_ref() {
        let mut record = timer_record();
        assert!(!record.concurrent());
        record.staleness_ref = None;
        assert!(record.concurrent());
    }

    #[test]
    fn record_maps_to_wire_message_of_its_kind() {
        let info = timer_record().to_info();
        assert_eq!(info.category(), TaskCategory::Timer);
        assert!(matches!(info, TaskInfo::Timer(ref t) if t.type_id == 10));
        assert_eq!(info.into_record(), timer_record());

        let outbound = TaskRecord {
            type_id: 11,
            kind: TaskKind::outbound("my-endpoint"),
            payload: Vec::new(),
            staleness_ref: None,
        };
        let info = outbound.to_info();
        assert!(matches!(info, TaskInfo::Outbound(ref o) if o.destination == "my-endpoint"));
    }

    #[test]
    fn envelope_survives_json_storage() {
        let key = WorkflowKey::new("default", "wf1", RunId::from_ulid(Ulid::new()));
        let env = TaskEnvelope::new(TaskId::from_ulid(Ulid::new()), key, timer_record());

        let s = serde_json::to_string(&env).unwrap();
        let v: serde_json::Value = serde_json::from_str(&s).unwrap();
        assert_eq!(v["record"]["payload"], r#"{"attempt":1}"#);
        assert_eq!(v["record"]["staleness_ref"]["path"], "wf1/step2");

        let back: TaskEnvelope = serde_json::from_str(&s).unwrap();
        assert_eq!(back, env);
    }

    #[test]
    fn non_utf8_payload_is_kept_as_bytes() {
        let mut record = timer_record();
        record.payload = vec![0xff, 0x00, 0x7f];
        let s = serde_json::to_string(&record).unwrap();
        let back: TaskRecord = serde_json::from_str(&s).unwrap();
        assert_eq!(back.payload, vec![0xff, 0x00, 0x7f]);
    }
}
