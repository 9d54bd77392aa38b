// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bootstrap script sources.

use std::path::{Path, PathBuf};

use wvbridge_core::error::{BridgeError, Result};

use crate::traits::ScriptSource;

/// A bootstrap script held in memory (e.g. embedded with `include_str!`).
#[derive(Debug, Clone)]
pub struct StaticScript(pub String);

impl StaticScript {
    pub fn new(script: impl Into<String>) -> Self {
        Self(script.into())
    }
}

impl ScriptSource for StaticScript {
    fn bootstrap_script(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// A bootstrap script read from disk each time the bridge is injected.
#[derive(Debug, Clone)]
pub struct FileScript {
    path: PathBuf,
}

impl FileScript {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ScriptSource for FileScript {
    fn bootstrap_script(&self) -> Result<String> {
        std::fs::read_to_string(&self.path)
            .map_err(|e| BridgeError::Script(format!("{}: {e}", self.path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_script_returns_contents() {
        let source = StaticScript::new("window.bridge = {};");
        assert_eq!(source.bootstrap_script().expect("script"), "window.bridge = {};");
    }

    #[test]
    fn file_script_reads_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bridge.js");
        std::fs::write(&path, "/* bridge */").expect("write");

        let source = FileScript::new(&path);
        assert_eq!(source.path(), path.as_path());
        assert_eq!(source.bootstrap_script().expect("script"), "/* bridge */");
    }

    #[test]
    fn missing_file_is_a_script_error() {
        let source = FileScript::new("/nonexistent/WebViewJavascriptBridge.js");
        assert!(matches!(source.bootstrap_script(), Err(BridgeError::Script(_))));
    }
}
