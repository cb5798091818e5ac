//! StateMachine port - transition engine 側の契約
//!
//! transition と transition count は engine が持つ。この crate は読むだけ:
//! - transition コミット時に 1 回（task の収集）
//! - task 実行時に 1 回（staleness check）

use crate::domain::{MachinePath, Task};

/// Everything a committed transition produced.
///
/// The count and the tasks come from one call so they describe the same
/// transition; a caller persists them as one unit.
#[derive(Debug)]
pub struct TransitionOutput {
    pub transition_count: u64,
    pub tasks: Vec<Box<dyn Task>>,
}

/// A machine that has just transitioned.
pub trait StateMachine {
    fn path(&self) -> MachinePath;

    /// Transition count after the latest transition and the tasks it emitted.
    fn transition_output(&self) -> TransitionOutput;
}

/// Read access to live machines, used before executing non-concurrent tasks.
pub trait MachineLookup: Send + Sync {
    /// `None` when the machine no longer exists.
    fn current_transition_count(&self, path: &MachinePath) -> Option<u64>;
}
