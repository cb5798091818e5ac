//! TaskType - task 定義の永続的な識別子

use std::fmt;

/// TaskType pairs the storage-stable id with a human readable name.
///
/// # Durability
/// - `id` is persisted next to every task payload and is the key used to find
///   the serializer that can decode it. Once data exists for an id, the id must
///   never be reused for another definition.
/// - `name` is a label for logs and has no durability constraint.
///
/// # Example
/// ```ignore
/// const INVOCATION: TaskType = TaskType::new(1, "callbacks.Invocation");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskType {
    id: i32,
    name: &'static str,
}

impl TaskType {
    pub const fn new(id: i32, name: &'static str) -> Self {
        Self { id, name }
    }

    pub const fn id(&self) -> i32 {
        self.id
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BACKOFF: TaskType = TaskType::new(3, "callbacks.Backoff");

    #[test]
    fn const_task_type_exposes_parts() {
        assert_eq!(BACKOFF.id(), 3);
        assert_eq!(BACKOFF.name(), "callbacks.Backoff");
        assert_eq!(BACKOFF.to_string(), "callbacks.Backoff(3)");
    }

    #[test]
    fn equality_covers_id_and_name() {
        assert_eq!(BACKOFF, TaskType::new(3, "callbacks.Backoff"));
        assert_ne!(BACKOFF, TaskType::new(4, "callbacks.Backoff"));
    }
}
