//! hsm-core
//!
//! 階層型ステートマシン framework の task contract:
//! transition が何を emit できるか、どう永続化されるか、いつまで実行してよいか。
//!
//! # モジュール構成
//! - **domain**: task type, kind, `Task` contract, staleness reference, 永続化 record
//! - **typed**: serializer, serializer registry, 型付き handler
//! - **ports**: state machine / delivery queue / clock / id の境界
//! - **app**: 生成、executor、worker プール、統計
//! - **impls**: in-memory 実装
//! - **config**: 実行時設定

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod typed;
