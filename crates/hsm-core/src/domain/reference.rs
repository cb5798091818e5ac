//! Staleness reference - non-concurrent task 用
//!
//! # 実装詳細
//! - non-concurrent task は自分を生んだ transition に紐づく
//! - 生成時に machine の path と transition count を snapshot する
//! - 実行時に count がまだ current であることを確認する

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Location of a machine in the hierarchy, root first.
///
/// Displays and parses as `/`-separated keys, e.g. `wf1/step2`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MachinePath(Vec<String>);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PathError {
    #[error("machine path is empty")]
    Empty,

    #[error("machine path '{0}' contains an empty key")]
    EmptyKey(String),
}

impl MachinePath {
    pub fn new<I, S>(keys: I) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        if keys.is_empty() {
            return Err(PathError::Empty);
        }
        if keys.iter().any(|k| k.is_empty()) {
            return Err(PathError::EmptyKey(keys.join("/")));
        }
        Ok(Self(keys))
    }

    pub fn keys(&self) -> &[String] {
        &self.0
    }
}

impl FromStr for MachinePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(PathError::Empty);
        }
        Self::new(s.split('/'))
    }
}

impl TryFrom<String> for MachinePath {
    type Error = PathError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MachinePath> for String {
    fn from(path: MachinePath) -> Self {
        path.to_string()
    }
}

impl fmt::Display for MachinePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

/// `(machine path, transition count)` captured at generation time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StalenessRef {
    pub path: MachinePath,
    pub transition_count: u64,
}

/// Result of checking a reference against the live machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// The generating transition is still the latest one.
    Fresh,

    /// The machine has transitioned since the task was generated.
    Stale { generated_at: u64, current: u64 },

    /// The machine no longer exists.
    MachineNotFound,
}

impl StalenessRef {
    pub fn new(path: MachinePath, transition_count: u64) -> Self {
        Self {
            path,
            transition_count,
        }
    }

    /// `current` is the machine's transition count now, `None` if the machine
    /// is gone.
    pub fn validate(&self, current: Option<u64>) -> Freshness {
        match current {
            None => Freshness::MachineNotFound,
            Some(current) if current == self.transition_count => Freshness::Fresh,
            Some(current) => Freshness::Stale {
                generated_at: self.transition_count,
                current,
            },
        }
    }
}

impl fmt::Display for StalenessRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.path, self.transition_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn path(s: &str) -> MachinePath {
        s.parse().unwrap()
    }

    #[test]
    fn path_parses_and_displays() {
        let p = path("wf1/step2");
        assert_eq!(p.keys(), ["wf1", "step2"]);
        assert_eq!(p.to_string(), "wf1/step2");
    }

    #[rstest]
    #[case("", PathError::Empty)]
    #[case("wf1//step2", PathError::EmptyKey("wf1//step2".to_string()))]
    #[case("wf1/", PathError::EmptyKey("wf1/".to_string()))]
    fn bad_paths_are_rejected(#[case] input: &str, #[case] expected: PathError) {
        assert_eq!(input.parse::<MachinePath>(), Err(expected));
    }

    #[test]
    fn path_serializes_as_string() {
        let s = serde_json::to_string(&path("wf1/step2")).unwrap();
        assert_eq!(s, "\"wf1/step2\"");
        let back: MachinePath = serde_json::from_str(&s).unwrap();
        assert_eq!(back, path("wf1/step2"));
        assert!(serde_json::from_str::<MachinePath>("\"\"").is_err());
    }

    #[rstest]
    #[case(Some(5), Freshness::Fresh)]
    #[case(Some(6), Freshness::Stale { generated_at: 5, current: 6 })]
    #[case(Some(7), Freshness::Stale { generated_at: 5, current: 7 })]
    #[case(Some(4), Freshness::Stale { generated_at: 5, current: 4 })]
    #[case(None, Freshness::MachineNotFound)]
    fn validate_compares_transition_counts(
        #[case] current: Option<u64>,
        #[case] expected: Freshness,
    ) {
        let r = StalenessRef::new(path("wf1/step2"), 5);
        assert_eq!(r.validate(current), expected);
    }
}
