// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait definitions for the bridge's collaborators.
//
// The bridge never talks to a web view directly. Hosts implement these
// traits on top of whatever rendering engine they embed (Android WebView,
// WKWebView, wry, a test double, ...).

use std::collections::HashMap;

use serde_json::Value;
use wvbridge_core::error::Result;

use crate::engine::Responder;

/// The rendering surface a bridge instance is bound to.
///
/// Every method is only ever called on the designated thread. Errors are
/// logged by the bridge and otherwise ignored: the callers returned long ago
/// and have no way to receive them.
pub trait RenderSurface: Send + Sync {
    /// Evaluate a script in the page's main frame.
    fn evaluate_script(&self, script: &str) -> Result<()>;

    /// Navigate to `url`.
    fn load_url(&self, url: &str) -> Result<()>;

    /// Navigate to `url`, sending extra HTTP request headers.
    fn load_url_with_headers(&self, url: &str, headers: &HashMap<String, String>) -> Result<()>;

    /// Close the hosting page (e.g. pop the activity / dismiss the window).
    fn close(&self) -> Result<()>;
}

/// Veto hook consulted when page script asks to close the hosting surface.
pub trait CloseWindowListener: Send + Sync {
    /// Return `true` to let the close proceed.
    fn on_close(&self) -> bool;
}

impl<F> CloseWindowListener for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn on_close(&self) -> bool {
        self()
    }
}

/// Supplies the bootstrap script injected when the page becomes ready.
pub trait ScriptSource: Send + Sync {
    fn bootstrap_script(&self) -> Result<String>;
}

/// A native request handler callable from page script.
///
/// `responder` is present only when the caller asked for a response. It may
/// be used immediately or moved elsewhere and answered later, from any
/// thread; dropping it unanswered sends nothing.
pub trait Handler: Send + Sync {
    fn handle(&self, data: Value, responder: Option<Responder>);
}

impl<F> Handler for F
where
    F: Fn(Value, Option<Responder>) + Send + Sync,
{
    fn handle(&self, data: Value, responder: Option<Responder>) {
        self(data, responder)
    }
}
