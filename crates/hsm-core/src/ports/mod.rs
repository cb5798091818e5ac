//! Ports - この crate が持たない協調先との境界
//!
//! - `StateMachine` / `MachineLookup`: transition engine
//! - `DeliveryQueue`: 永続キュー層
//! - `Clock` / `IdGenerator`: 時刻と id

pub mod clock;
pub mod delivery_queue;
pub mod id_generator;
pub mod state_machine;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::delivery_queue::{DeliveryQueue, QueueError, QueueKey};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::state_machine::{MachineLookup, StateMachine, TransitionOutput};
