//! Configuration types for the discovery system
//!
//! This module defines the browser configuration and the settings of the
//! optional hosting loop.

use crate::names::{self, WILDCARD_NAME};
use crate::txt::TxtRecord;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Browser configuration
///
/// Leaving `type` unset selects wildcard mode, which enumerates every
/// service type on the network and then browses each of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Service type to browse, e.g. "http" (None = wildcard)
    #[serde(rename = "type", default)]
    pub service_type: Option<String>,

    /// Only browse this instance name
    #[serde(default)]
    pub name: Option<String>,

    /// Transport protocol
    #[serde(default = "default_protocol")]
    pub protocol: String,

    /// Subtypes of interest (informational)
    #[serde(default)]
    pub subtypes: Vec<String>,

    /// TXT attribute pattern services must satisfy
    #[serde(default)]
    pub txt: Option<TxtRecord>,

    /// Decode TXT values as raw bytes instead of UTF-8 text
    #[serde(default)]
    pub txt_binary: bool,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl BrowserConfig {
    /// Browse a single service type over TCP
    pub fn for_type(service_type: impl Into<String>) -> Self {
        Self {
            service_type: Some(service_type.into()),
            ..Self::wildcard()
        }
    }

    /// Browse every advertised service type
    pub fn wildcard() -> Self {
        Self {
            service_type: None,
            name: None,
            protocol: default_protocol(),
            subtypes: Vec::new(),
            txt: None,
            txt_binary: false,
            engine: EngineConfig::default(),
        }
    }

    /// Set the instance name filter
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the transport protocol
    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    /// Set the subtypes of interest
    pub fn with_subtypes(mut self, subtypes: Vec<String>) -> Self {
        self.subtypes = subtypes;
        self
    }

    /// Set the TXT attribute pattern
    pub fn with_txt(mut self, pattern: TxtRecord) -> Self {
        self.txt = Some(pattern);
        self
    }

    /// Decode TXT values as raw bytes
    pub fn with_txt_binary(mut self, binary: bool) -> Self {
        self.txt_binary = binary;
        self
    }

    /// Set the engine settings
    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    /// Whether this configuration selects wildcard mode
    pub fn is_wildcard(&self) -> bool {
        self.service_type.is_none() && self.name.is_none()
    }

    /// Name the browser PTR-queries
    ///
    /// Returns `None` for configurations that cannot be browsed (an empty
    /// type, or an instance name without a type); such a browser stays idle.
    pub fn query_name(&self) -> Option<String> {
        match (self.service_type.as_deref(), self.name.as_deref()) {
            (None, None) => Some(WILDCARD_NAME.to_string()),
            (None, Some(_)) => None,
            (Some(t), _) if t.trim().is_empty() => None,
            (Some(t), name) => Some(names::query_name(t, &self.protocol, name)),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.engine.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }

        if !is_label(&self.protocol) {
            return Err(crate::Error::config(format!(
                "Protocol '{}' is not a single DNS label",
                self.protocol
            )));
        }

        if let Some(service_type) = &self.service_type
            && !service_type.is_empty()
            && !is_label(service_type)
        {
            return Err(crate::Error::config(format!(
                "Service type '{}' is not a single DNS label",
                service_type
            )));
        }

        Ok(())
    }

    /// Parse a configuration from JSON
    pub fn from_json_str(json: &str) -> Result<Self, crate::Error> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, crate::Error> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self::wildcard()
    }
}

fn is_label(s: &str) -> bool {
    !s.is_empty() && !s.contains('.') && !s.chars().any(char::is_whitespace)
}

fn default_protocol() -> String {
    "tcp".to_string()
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Capacity of the event channel
    ///
    /// When full, new events are dropped (with a warning log).
    ///
    /// Default: 1000 events
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Interval between PTR re-queries in the hosting loop (0 = never)
    #[serde(default)]
    pub refresh_interval_secs: u64,

    /// Interval between expiry sweeps in the hosting loop (0 = never)
    #[serde(default = "default_expire_interval_secs")]
    pub expire_interval_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: default_event_channel_capacity(),
            refresh_interval_secs: 0,
            expire_interval_secs: default_expire_interval_secs(),
        }
    }
}

fn default_event_channel_capacity() -> usize {
    1000
}

fn default_expire_interval_secs() -> u64 {
    1
}
