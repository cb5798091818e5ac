//! Typed - 型付き TaskDefinition の上に乗る serializer / registry / handler
//!
//! # 2 層構造
//! - **Typed**: `TaskDefinition`, `Handler<T>`, `JsonTaskSerializer<T>`
//! - **Dyn**: `TaskSerializer`, `DynHandler`（object-safe, 型消去済み）

pub mod codec;
pub mod handler;
pub mod registry;

pub use self::codec::{JsonTaskSerializer, SerializerError, TaskSerializer};
pub use self::handler::{DuplicateHandler, DynHandler, Handler, HandlerError, HandlerSet};
pub use self::registry::{BuildError, RegistryBuilder, RegistryError, TaskRegistry};
