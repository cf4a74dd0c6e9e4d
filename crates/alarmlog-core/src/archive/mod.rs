// # Archive Sink Implementations
//
// Stand-ins for a host time-series archive, used by the daemon and tests.
// Both keep values per variable in timestamp order and only record writes
// for variables whose logging is enabled.

pub mod file;
pub mod memory;

pub use file::FileArchive;
pub use memory::MemoryArchive;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::traits::LoggedValue;

/// Logged values of one variable
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct VariableLog {
    logging: bool,
    values: Vec<LoggedValue>,
}

/// Archive contents shared by the memory and file archives
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct ArchiveData {
    variables: HashMap<String, VariableLog>,
}

impl ArchiveData {
    /// Record a value; returns `false` if logging is disabled
    pub(crate) fn write(&mut self, variable: &str, value: &str, timestamp: NaiveDateTime) -> bool {
        let Some(log) = self.variables.get_mut(variable).filter(|log| log.logging) else {
            return false;
        };

        let index = log.values.partition_point(|v| v.timestamp <= timestamp);
        log.values.insert(index, LoggedValue::new(value, timestamp));
        true
    }

    pub(crate) fn set_logging(&mut self, variable: &str, enabled: bool) {
        self.variables
            .entry(variable.to_string())
            .or_default()
            .logging = enabled;
    }

    pub(crate) fn logging(&self, variable: &str) -> bool {
        self.variables
            .get(variable)
            .map(|log| log.logging)
            .unwrap_or(false)
    }

    pub(crate) fn values(
        &self,
        variable: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Vec<LoggedValue> {
        self.variables
            .get(variable)
            .map(|log| {
                log.values
                    .iter()
                    .filter(|v| v.timestamp >= start && v.timestamp <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn delete(
        &mut self,
        variable: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> usize {
        let Some(log) = self.variables.get_mut(variable) else {
            return 0;
        };

        let before = log.values.len();
        log.values
            .retain(|v| v.timestamp < start || v.timestamp > end);
        before - log.values.len()
    }
}
