use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::logger::{LogLevel, Logger, LOGGER};

/// A hardware-control request that could not be honoured.
///
/// These never fail the caller; they are kept on the controller and written
/// to the diagnostic log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlDiagnostic {
    pub control: String,
    pub requested: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ControlDiagnostic {
    pub fn new(control: &str, requested: impl ToString, message: impl Into<String>) -> Self {
        Self {
            control: control.to_string(),
            requested: requested.to_string(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    /// Write this diagnostic to the process logger
    pub fn log(&self) {
        self.log_to(&LOGGER);
    }

    pub fn log_to(&self, logger: &Logger) {
        let mut context = HashMap::new();
        context.insert("control".to_string(), serde_json::json!(self.control));
        context.insert("requested".to_string(), serde_json::json!(self.requested));
        logger.log_with_context(
            LogLevel::Warn,
            &format!("{} control failed: {}", self.control, self.message),
            "capture",
            context,
        );
    }
}
