//! Module: config
//! Responsibility: spill, merge, and ordering policy for the hash grouping engine.
//! Does not own: reading configuration files; callers deserialize and hand it over.
//! Boundary: validated once, when an engine prepares for input.

use crate::error::{ErrorOrigin, GroupError};
use serde::Deserialize;
use std::path::PathBuf;

/// Default resident-memory estimate above which the hash table spills.
pub const DEFAULT_MEMORY_LIMIT: usize = 256 * 1024 * 1024;

/// Default number of runs read at once by one merge pass.
pub const DEFAULT_MAX_MERGE_FANIN: usize = 64;

///
/// GroupingConfig
///
/// Hash engine policy. Limits stay here rather than inside the table so one
/// deserialized config can drive many engines.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GroupingConfig {
    /// Parent directory for spill runs; the system temp dir when unset.
    pub temp_dir: Option<PathBuf>,

    /// Estimated table bytes that trigger a spill.
    pub memory_limit: usize,

    /// Maximum runs merged by one pass.
    pub max_merge_fanin: usize,

    /// Emit groups in ascending key order even when nothing spilled.
    pub sorted_output: bool,
}

impl GroupingConfig {
    /// Build one configuration with explicit spill limits.
    #[must_use]
    pub const fn with_limits(memory_limit: usize, max_merge_fanin: usize) -> Self {
        Self {
            temp_dir: None,
            memory_limit,
            max_merge_fanin,
            sorted_output: false,
        }
    }

    #[must_use]
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub const fn with_sorted_output(mut self, sorted: bool) -> Self {
        self.sorted_output = sorted;
        self
    }

    /// Reject limits that cannot drive a spill or a merge.
    pub fn validate(&self) -> Result<(), GroupError> {
        if self.memory_limit == 0 {
            return Err(GroupError::configuration(
                ErrorOrigin::Config,
                "memory_limit must be greater than zero",
            ));
        }
        if self.max_merge_fanin < 2 {
            return Err(GroupError::configuration(
                ErrorOrigin::Config,
                format!(
                    "max_merge_fanin must be at least 2, got {}",
                    self.max_merge_fanin
                ),
            ));
        }

        Ok(())
    }
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self::with_limits(DEFAULT_MEMORY_LIMIT, DEFAULT_MAX_MERGE_FANIN)
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: GroupingConfig =
            serde_json::from_str(r#"{ "sorted_output": true }"#).expect("partial config");

        assert_eq!(config.memory_limit, DEFAULT_MEMORY_LIMIT);
        assert_eq!(config.max_merge_fanin, DEFAULT_MAX_MERGE_FANIN);
        assert!(config.sorted_output);
        assert_eq!(config.temp_dir, None);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let parsed = serde_json::from_str::<GroupingConfig>(r#"{ "memroy_limit": 10 }"#);

        assert!(parsed.is_err());
    }

    #[test]
    fn temp_dir_deserializes_as_path() {
        let config: GroupingConfig =
            serde_json::from_str(r#"{ "temp_dir": "/var/tmp/flowbin", "memory_limit": 4096 }"#)
                .expect("config");

        assert_eq!(config.temp_dir, Some(PathBuf::from("/var/tmp/flowbin")));
        assert_eq!(config.memory_limit, 4096);
    }

    #[test]
    fn degenerate_limits_fail_validation() {
        let zero_memory = GroupingConfig::with_limits(0, 8).validate();
        let unary_fanin = GroupingConfig::with_limits(1024, 1).validate();

        assert_eq!(
            zero_memory.map_err(|err| (err.class, err.origin)),
            Err((ErrorClass::Configuration, ErrorOrigin::Config))
        );
        assert!(unary_fanin.is_err());
        assert!(GroupingConfig::default().validate().is_ok());
    }
}
