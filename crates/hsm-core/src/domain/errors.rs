//! ErrorKind - 実行エラーの運用上の分類
//!
//! 各エラー型が `ErrorKind` を返すので、呼び出し側は全 variant を match
//! しなくても task をどう扱うか決められる。

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Worth another try later (handler failure, unavailable destination).
    Transient,

    /// Retrying cannot help: programming error or corrupt payload.
    Permanent,

    /// This binary does not know the task type yet. Keep the task until a
    /// compatible serializer is registered (rolling upgrades).
    VersionSkew,
}

impl ErrorKind {
    pub fn is_retryable(self) -> bool {
        match self {
            ErrorKind::Transient | ErrorKind::VersionSkew => true,
            ErrorKind::Permanent => false,
        }
    }
}
