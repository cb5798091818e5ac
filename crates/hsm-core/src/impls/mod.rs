//! Impls - ports の in-memory 実装（開発・テスト用）
//!
//! - **InMemoryDeliveryQueue**: destination ごとの FIFO
//! - **InMemoryTaskStore**: machine の transition count + task outbox

pub mod inmem_delivery;
pub mod memory_store;

pub use self::inmem_delivery::InMemoryDeliveryQueue;
pub use self::memory_store::{InMemoryTaskStore, StoreError};
