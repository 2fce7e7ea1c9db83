use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MigrationState {
    Pending,
    Success,
    Failure,
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationState::Pending => f.write_str("PENDING"),
            MigrationState::Success => f.write_str("SUCCESS"),
            MigrationState::Failure => f.write_str("FAILURE"),
        }
    }
}

/// One row per migration script, keyed by version. Created by the
/// migration engine before execution and mirrored into the history index
/// via `save_or_update`; never deleted by this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationScriptProtocol {
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub script_name: String,
    #[serde(default)]
    pub checksum: i32,
    pub state: MigrationState,
    #[serde(default)]
    pub execution_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub execution_duration_ms: u64,
}

impl MigrationScriptProtocol {
    pub fn new(version: impl Into<String>, state: MigrationState) -> Self {
        Self {
            version: version.into(),
            description: String::new(),
            script_name: String::new(),
            checksum: 0,
            state,
            execution_timestamp: None,
            execution_duration_ms: 0,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn script_name(mut self, script_name: impl Into<String>) -> Self {
        self.script_name = script_name.into();
        self
    }

    pub fn checksum(mut self, checksum: i32) -> Self {
        self.checksum = checksum;
        self
    }

    pub fn executed(mut self, at: DateTime<Utc>, duration_ms: u64) -> Self {
        self.execution_timestamp = Some(at);
        self.execution_duration_ms = duration_ms;
        self
    }
}

impl fmt::Display for MigrationScriptProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "version={} script={} state={} checksum={}",
            self.version, self.script_name, self.state, self.checksum
        )
    }
}

/// Orders migration versions segment-wise: `.`-separated parts compare
/// numerically when both sides are numeric ("2" < "10"), lexically
/// otherwise; a shorter version that is a prefix of a longer one sorts
/// first ("1.1" < "1.1.1").
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');

    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) => {
                let cmp = match (l.parse::<u64>(), r.parse::<u64>()) {
                    (Ok(l), Ok(r)) => l.cmp(&r),
                    _ => l.cmp(r),
                };

                if cmp != Ordering::Equal {
                    return cmp;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::compare_versions;
    use std::cmp::Ordering;

    #[test]
    fn numeric_segments() {
        assert_eq!(compare_versions("2", "10"), Ordering::Less);
        assert_eq!(compare_versions("1.2", "1.10"), Ordering::Less);
        assert_eq!(compare_versions("1.10", "1.2"), Ordering::Greater);
        assert_eq!(compare_versions("1.0", "1.0"), Ordering::Equal);
    }

    #[test]
    fn prefix_sorts_first() {
        assert_eq!(compare_versions("1.1", "1.1.1"), Ordering::Less);
        assert_eq!(compare_versions("1.1.1", "1.1"), Ordering::Greater);
    }

    #[test]
    fn non_numeric_segments_compare_lexically() {
        assert_eq!(compare_versions("1.alpha", "1.beta"), Ordering::Less);
        assert_eq!(compare_versions("1.beta", "1.alpha"), Ordering::Greater);
    }
}
