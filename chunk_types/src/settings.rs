//! Per-field settings delivered by the server
//!
//! The server attaches one JSON settings object to every chunks field it
//! renders. These types are the typed view of that object.

use crate::ids::{ChunkTypeId, InstanceName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Settings parsing errors
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Malformed field settings: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Settings a field instance applies to one chunk type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceTypeSettings {
    /// Build previews on the client with the type's registered renderer
    #[serde(default)]
    pub preview_on_client: bool,
    /// Edit the preview markup in place with a rich-text editor
    #[serde(default)]
    pub edit_in_place: bool,
    /// Text format; `plain_text` means values are escaped when rendered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl InstanceTypeSettings {
    /// Returns true if values should be escaped as plain text
    pub fn is_plain_text(&self) -> bool {
        self.format.as_deref() == Some("plain_text")
    }
}

/// A named, configured binding of a chunk type to a field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkInstance {
    #[serde(rename = "type")]
    pub chunk_type: ChunkTypeId,
    #[serde(default)]
    pub title: String,
    /// Module that provides the chunk type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(default)]
    pub settings: InstanceTypeSettings,
}

impl ChunkInstance {
    pub fn new(chunk_type: impl Into<ChunkTypeId>) -> Self {
        Self {
            chunk_type: chunk_type.into(),
            title: String::new(),
            module: None,
            settings: InstanceTypeSettings::default(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn previewed_on_client(mut self) -> Self {
        self.settings.preview_on_client = true;
        self
    }

    pub fn edited_in_place(mut self) -> Self {
        self.settings.edit_in_place = true;
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.settings.format = Some(format.into());
        self
    }
}

/// Settings of one chunks field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSettings {
    /// Field accepts an unlimited number of chunks
    #[serde(default)]
    pub unlimited: bool,
    /// Instances selectable in this field, by name
    #[serde(default)]
    pub instances: BTreeMap<InstanceName, ChunkInstance>,
}

impl FieldSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses settings from the server's JSON blob
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn unlimited(mut self) -> Self {
        self.unlimited = true;
        self
    }

    pub fn with_instance(mut self, name: impl Into<InstanceName>, instance: ChunkInstance) -> Self {
        self.instances.insert(name.into(), instance);
        self
    }

    pub fn instance(&self, name: &InstanceName) -> Option<&ChunkInstance> {
        self.instances.get(name)
    }

    /// Returns true if the named instance renders previews on the client
    pub fn previews_on_client(&self, name: &InstanceName) -> bool {
        self.instance(name)
            .map(|i| i.settings.preview_on_client)
            .unwrap_or(false)
    }
}
