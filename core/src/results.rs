//! Measured outcomes and result extraction

use std::fmt;
use std::sync::Mutex;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{BenchError, BenchResult};

/// A measured outcome: numeric value plus its unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Numeric result.
    pub value: f64,
    /// Unit the result is expressed in (e.g. `"messages"`).
    pub unit: String,
}

impl Measurement {
    /// Create a measurement.
    pub fn new(value: f64, unit: impl Into<String>) -> Self {
        Self {
            value,
            unit: unit.into(),
        }
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}

/// Capability for tasks that produce a measured outcome.
///
/// Implemented by any task type with a measurable result; the
/// [`Manager`](crate::Manager) collects outcomes through
/// [`Task::as_results`](crate::Task::as_results) without downcasting.
pub trait ResultsProvider: Send + Sync {
    /// Record the outcome for later collection.
    fn set_result(&self, measurement: Measurement);

    /// The recorded outcome, if one was produced.
    fn result(&self) -> Option<Measurement>;
}

/// Shared slot behind a [`ResultsProvider`] implementation.
#[derive(Debug, Default)]
pub struct ResultSlot(Mutex<Option<Measurement>>);

impl ResultSlot {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a measurement, replacing any previous one.
    pub fn set(&self, measurement: Measurement) {
        *self.0.lock().unwrap() = Some(measurement);
    }

    /// The stored measurement, if any.
    pub fn get(&self) -> Option<Measurement> {
        self.0.lock().unwrap().clone()
    }
}

static MESSAGE_COUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^([0-9]+) messages").expect("valid regex"));

/// Scan captured load-generator output for the message-count result line.
///
/// Exactly one line matching `^<integer> messages` must be present; more or
/// fewer means the workload malfunctioned.
///
/// # Errors
///
/// [`BenchError::UnexpectedResultCount`] unless exactly one line matches.
pub fn extract_message_count(log: &str) -> BenchResult<u64> {
    let counts: Vec<&str> = MESSAGE_COUNT
        .captures_iter(log)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    if counts.len() != 1 {
        return Err(BenchError::UnexpectedResultCount {
            count: counts.len(),
        });
    }
    counts[0]
        .parse()
        .map_err(|_| BenchError::Config(format!("message count {:?} out of range", counts[0])))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_single_count() {
        let log = "delivery summary\n1234 messages delivered in 10.2s\n";
        assert_eq!(extract_message_count(log).unwrap(), 1234);
    }

    #[test]
    fn test_extract_two_counts_is_error() {
        let log = "100 messages\n200 messages\n";
        let err = extract_message_count(log).unwrap_err();
        assert!(matches!(
            err,
            BenchError::UnexpectedResultCount { count: 2 }
        ));
    }

    #[test]
    fn test_extract_no_count_is_error() {
        let err = extract_message_count("nothing to see\n").unwrap_err();
        assert!(matches!(
            err,
            BenchError::UnexpectedResultCount { count: 0 }
        ));
    }

    #[test]
    fn test_extract_requires_line_start() {
        // A count that is not at the start of a line is benchmark chatter.
        let err = extract_message_count("got 55 messages so far\n").unwrap_err();
        assert!(matches!(
            err,
            BenchError::UnexpectedResultCount { count: 0 }
        ));
    }

    #[test]
    fn test_measurement_display() {
        let m = Measurement::new(15.0, "messages");
        assert_eq!(m.to_string(), "15 messages");
    }

    #[test]
    fn test_measurement_serialization() {
        let m = Measurement::new(1234.0, "messages");
        let json = serde_json::to_string(&m).unwrap();
        let back: Measurement = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn test_result_slot_set_and_get() {
        let slot = ResultSlot::new();
        assert!(slot.get().is_none());

        slot.set(Measurement::new(10.0, "msg"));
        slot.set(Measurement::new(15.0, "msg"));
        assert_eq!(slot.get(), Some(Measurement::new(15.0, "msg")));
    }
}
