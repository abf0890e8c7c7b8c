use serde::{Deserialize, Serialize};

/// Outcome of one detector over one flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub detected: bool,
    pub count: usize,
    /// Worst observed value among the flagged events, if any.
    pub extremum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AnomalyReport {
    pub fn clear() -> Self {
        Self {
            detected: false,
            count: 0,
            extremum: None,
            message: None,
        }
    }

    /// Report for `count` events with their worst value.
    pub fn events(count: usize, extremum: Option<f64>) -> Self {
        Self {
            detected: count > 0,
            count,
            extremum,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}
