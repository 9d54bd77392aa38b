// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bridge configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{BridgeError, Result};

/// Per-instance bridge settings.
///
/// Every field has a default matching the stock `WebViewJavascriptBridge`
/// script, so an empty JSON object is a valid configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Tag prepended to generated correlation ids (`native_cb_1`, ...).
    pub callback_prefix: String,
    /// Remote function that receives outbound envelopes.
    pub remote_entry_point: String,
    /// Name under which the host exposes the inbound `notice` entry point.
    pub native_interface_name: String,
    /// Load progress (0-100) that must be exceeded before the bridge script
    /// is injected.
    pub ready_progress_threshold: u8,
    /// Path of the bootstrap script asset.
    pub bootstrap_script: PathBuf,
    /// Drop callbacks that have waited longer than this many seconds.
    /// `None` keeps them until teardown.
    pub callback_ttl_secs: Option<u64>,
    /// Name given to the designated thread when the bridge spawns its own.
    pub designated_thread_name: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            callback_prefix: "native_cb_".into(),
            remote_entry_point: "WebViewJavascriptBridge._handleMessageFromJava".into(),
            native_interface_name: "WVJBInterface".into(),
            ready_progress_threshold: 80,
            bootstrap_script: PathBuf::from("WebViewJavascriptBridge.js"),
            callback_ttl_secs: None,
            designated_thread_name: "wvbridge-main".into(),
        }
    }
}

impl BridgeConfig {
    /// Read and validate a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`load`](Self::load), but falls back to defaults (with a
    /// warning) when the file is missing or invalid.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "using default bridge configuration");
                Self::default()
            }
        }
    }

    /// Persist as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.callback_prefix.is_empty() {
            return Err(BridgeError::Config("callback_prefix must not be empty".into()));
        }
        if self.remote_entry_point.trim().is_empty() {
            return Err(BridgeError::Config("remote_entry_point must not be empty".into()));
        }
        if self.native_interface_name.trim().is_empty() {
            return Err(BridgeError::Config("native_interface_name must not be empty".into()));
        }
        if self.ready_progress_threshold > 100 {
            return Err(BridgeError::Config(format!(
                "ready_progress_threshold must be 0-100, got {}",
                self.ready_progress_threshold
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = BridgeConfig::default();
        config.validate().expect("defaults validate");
        assert_eq!(config.callback_prefix, "native_cb_");
        assert_eq!(config.ready_progress_threshold, 80);
        assert!(config.callback_ttl_secs.is_none());
    }

    #[test]
    fn empty_object_yields_defaults() {
        let config: BridgeConfig = serde_json::from_str("{}").expect("parse");
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bridge.json");

        let config = BridgeConfig {
            callback_prefix: "host_cb_".into(),
            callback_ttl_secs: Some(30),
            ..Default::default()
        };
        config.save(&path).expect("save");

        let loaded = BridgeConfig::load(&path).expect("load");
        assert_eq!(loaded, config);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let config = BridgeConfig {
            callback_prefix: String::new(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(BridgeError::Config(_))));

        let config = BridgeConfig {
            native_interface_name: " ".into(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(BridgeError::Config(_))));

        let config = BridgeConfig {
            ready_progress_threshold: 101,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(BridgeError::Config(_))));
    }

    #[test]
    fn load_or_default_falls_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("absent.json");
        assert_eq!(BridgeConfig::load_or_default(&missing), BridgeConfig::default());

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{ not json").expect("write");
        assert_eq!(BridgeConfig::load_or_default(&broken), BridgeConfig::default());
    }
}
