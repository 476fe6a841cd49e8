//! Widget-wide configuration

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration parsing errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Malformed widget config: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetConfig {
    /// Ticks after which an in-flight request is abandoned; `None` waits forever
    pub request_timeout_ticks: Option<u64>,
    /// Text shown by progress indicators
    pub progress_message: String,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            request_timeout_ticks: Some(600),
            progress_message: "Please wait...".to_string(),
        }
    }
}

impl WidgetConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_timeout(mut self, ticks: Option<u64>) -> Self {
        self.request_timeout_ticks = ticks;
        self
    }
}
