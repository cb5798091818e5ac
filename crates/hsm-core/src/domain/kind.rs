//! Task kind と、それが対応する queue category
//!
//! kind は純粋なデータ: queue category がスケジュールに必要なものだけを持つ。
//!
//! # 学習ポイント
//! - 閉じた enum + wildcard なしの `match`
//!   → variant を足すと [`KindTag`], [`TaskCategory`], [`crate::domain::envelope`] の
//!   wire shape など、対応が必要な箇所をすべてコンパイラが指摘する

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The closed set of task kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskKind {
    /// Scheduled on the timer queue.
    ///
    /// `deadline` is a lower bound; firing may be delayed when the system is
    /// overloaded.
    Timer { deadline: DateTime<Utc> },

    /// Scheduled on an outbound queue (callbacks, operations, ...).
    ///
    /// `destination` groups tasks into a per namespace-and-destination
    /// scheduler.
    Outbound { destination: String },
}

impl TaskKind {
    pub fn timer(deadline: DateTime<Utc>) -> Self {
        Self::Timer { deadline }
    }

    pub fn outbound(destination: impl Into<String>) -> Self {
        Self::Outbound {
            destination: destination.into(),
        }
    }

    pub fn tag(&self) -> KindTag {
        match self {
            TaskKind::Timer { .. } => KindTag::Timer,
            TaskKind::Outbound { .. } => KindTag::Outbound,
        }
    }

    pub fn category(&self) -> TaskCategory {
        self.tag().category()
    }
}

/// Field-less discriminant of [`TaskKind`].
///
/// Serializers declare the tag they accept, and routing compares tags instead
/// of strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KindTag {
    Timer,
    Outbound,
}

impl KindTag {
    pub fn category(self) -> TaskCategory {
        match self {
            KindTag::Timer => TaskCategory::Timer,
            KindTag::Outbound => TaskCategory::Outbound,
        }
    }
}

impl fmt::Display for KindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KindTag::Timer => "timer",
            KindTag::Outbound => "outbound",
        };
        f.write_str(s)
    }
}

/// Execution queue category.
///
/// Ids are persisted by the queue layer, so they are fixed per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    Timer,
    Outbound,
}

impl TaskCategory {
    pub const ALL: [TaskCategory; 2] = [TaskCategory::Timer, TaskCategory::Outbound];

    pub fn id(self) -> i32 {
        match self {
            TaskCategory::Timer => 2,
            TaskCategory::Outbound => 7,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TaskCategory::Timer => "timer",
            TaskCategory::Outbound => "outbound",
        }
    }

    /// Resolve a persisted category id.
    ///
    /// Ids written by a newer binary are rejected instead of falling back to a
    /// default queue.
    pub fn from_id(id: i32) -> Result<Self, KindError> {
        Self::ALL
            .into_iter()
            .find(|category| category.id() == id)
            .ok_or(KindError::UnknownCategory(id))
    }
}

impl fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum KindError {
    #[error("unknown task category id={0}")]
    UnknownCategory(i32),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    #[rstest]
    #[case(TaskKind::timer(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()), KindTag::Timer, TaskCategory::Timer)]
    #[case(TaskKind::outbound("my-endpoint"), KindTag::Outbound, TaskCategory::Outbound)]
    fn kind_routes_to_its_category(
        #[case] kind: TaskKind,
        #[case] tag: KindTag,
        #[case] category: TaskCategory,
    ) {
        assert_eq!(kind.tag(), tag);
        assert_eq!(kind.category(), category);
    }

    #[test]
    fn category_ids_resolve_back() {
        for category in TaskCategory::ALL {
            assert_eq!(TaskCategory::from_id(category.id()), Ok(category));
        }
    }

    #[test]
    fn unknown_category_id_fails_loudly() {
        assert_eq!(TaskCategory::from_id(99), Err(KindError::UnknownCategory(99)));
    }

    #[test]
    fn kind_is_internally_tagged() {
        let v = serde_json::to_value(TaskKind::outbound("my-endpoint")).unwrap();
        assert_eq!(v["kind"], "outbound");
        assert_eq!(v["destination"], "my-endpoint");
    }

    #[test]
    fn unknown_kind_is_rejected_on_decode() {
        let err = serde_json::from_str::<TaskKind>(r#"{"kind":"visibility"}"#);
        assert!(err.is_err());
    }
}
