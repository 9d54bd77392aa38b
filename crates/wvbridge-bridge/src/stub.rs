// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Recording surface for desktop/CI builds and tests.
//
// Nothing is rendered; every call is logged and kept, together with the
// thread it arrived on, so callers can assert on exactly what the bridge
// asked the page to do.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use wvbridge_core::Envelope;
use wvbridge_core::codec::parse_outbound_script;
use wvbridge_core::error::Result;

use crate::traits::RenderSurface;

/// One call made on a [`RecordingSurface`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceCall {
    EvaluateScript(String),
    LoadUrl(String),
    LoadUrlWithHeaders {
        url: String,
        headers: HashMap<String, String>,
    },
    Close,
}

/// Surface that records instead of rendering.
#[derive(Default)]
pub struct RecordingSurface {
    calls: Mutex<Vec<(ThreadId, SurfaceCall)>>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(ThreadId, SurfaceCall)>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: SurfaceCall) {
        tracing::debug!(?call, "recording surface call");
        self.lock().push((thread::current().id(), call));
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.lock().iter().map(|(_, call)| call.clone()).collect()
    }

    /// Threads the calls arrived on, parallel to [`calls`](Self::calls).
    pub fn threads(&self) -> Vec<ThreadId> {
        self.lock().iter().map(|(thread, _)| *thread).collect()
    }

    /// Evaluated scripts only.
    pub fn scripts(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|(_, call)| match call {
                SurfaceCall::EvaluateScript(script) => Some(script.clone()),
                _ => None,
            })
            .collect()
    }

    /// Envelopes delivered to `entry_point`, decoded back from the scripts.
    pub fn delivered(&self, entry_point: &str) -> Vec<Envelope> {
        self.scripts()
            .iter()
            .filter_map(|script| parse_outbound_script(entry_point, script))
            .collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl RenderSurface for RecordingSurface {
    fn evaluate_script(&self, script: &str) -> Result<()> {
        self.record(SurfaceCall::EvaluateScript(script.to_owned()));
        Ok(())
    }

    fn load_url(&self, url: &str) -> Result<()> {
        self.record(SurfaceCall::LoadUrl(url.to_owned()));
        Ok(())
    }

    fn load_url_with_headers(&self, url: &str, headers: &HashMap<String, String>) -> Result<()> {
        self.record(SurfaceCall::LoadUrlWithHeaders {
            url: url.to_owned(),
            headers: headers.clone(),
        });
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.record(SurfaceCall::Close);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wvbridge_core::codec::outbound_script;

    const ENTRY: &str = "WebViewJavascriptBridge._handleMessageFromJava";

    #[test]
    fn records_calls_in_order() {
        let surface = RecordingSurface::new();
        surface.load_url("https://example.org").expect("load");
        surface.evaluate_script("1 + 1").expect("eval");
        surface.close().expect("close");

        assert_eq!(
            surface.calls(),
            vec![
                SurfaceCall::LoadUrl("https://example.org".into()),
                SurfaceCall::EvaluateScript("1 + 1".into()),
                SurfaceCall::Close,
            ]
        );
        assert!(surface.threads().iter().all(|t| *t == thread::current().id()));
    }

    #[test]
    fn delivered_decodes_bridge_scripts_only() {
        let surface = RecordingSurface::new();
        let env = Envelope::request("greet", json!("hi"), None);
        surface.evaluate_script("/* bootstrap */").expect("eval");
        surface.evaluate_script(&outbound_script(ENTRY, &env)).expect("eval");

        assert_eq!(surface.scripts().len(), 2);
        assert_eq!(surface.delivered(ENTRY), vec![env]);

        surface.clear();
        assert!(surface.calls().is_empty());
    }
}
