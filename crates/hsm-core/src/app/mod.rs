//! App - ports の上に組み立てる生成・実行ロジック
//!
//! - **generate**: transition → staleness ref 付きの task record
//! - **Executor**: staleness check + deserialize + handler
//! - **WorkerGroup**: delivery queue から供給される executor プール
//! - **ExecutionStats**: 結果カウンタ

pub mod executor;
pub mod generate;
pub mod status;
pub mod worker_loop;

pub use self::executor::{DropReason, ExecuteError, Execution, Executor, Prepared};
pub use self::generate::{Generated, generate};
pub use self::status::{ExecutionCounts, ExecutionStats};
pub use self::worker_loop::WorkerGroup;
