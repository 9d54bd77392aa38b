// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-process stand-in for a page running the JavaScript half of the bridge.
//
// Delivery scripts addressed to the remote entry point are decoded and
// answered the way the page-side bridge would answer them; every other
// evaluated script counts as a bootstrap injection. Page messages travel back
// through `notice`, the page's view of the native interface object. Used by
// the demo binary and by end-to-end tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use serde_json::Value;
use tracing::debug;
use wvbridge_core::{BridgeConfig, Envelope};
use wvbridge_core::codec::{self, parse_outbound_script};
use wvbridge_core::error::Result;

use crate::callbacks::ResponseCallback;
use crate::engine::{Bridge, WeakBridge};
use crate::handlers::HAS_JAVASCRIPT_METHOD;
use crate::traits::RenderSurface;

/// A page-side handler: takes the request data, returns the response data.
pub type RemoteHandler = Arc<dyn Fn(Value) -> Value + Send + Sync>;

const REMOTE_CALLBACK_PREFIX: &str = "js_cb_";

#[derive(Default)]
struct PageState {
    handlers: HashMap<String, RemoteHandler>,
    pending: HashMap<String, ResponseCallback>,
    next_callback: u64,
    injections: usize,
    closed: bool,
    urls: Vec<String>,
}

/// Simulated page that talks back to the bridge it is attached to.
pub struct LoopbackSurface {
    entry_point: String,
    interface: String,
    bridge: OnceLock<WeakBridge>,
    page: Mutex<PageState>,
}

impl LoopbackSurface {
    pub fn new(entry_point: impl Into<String>, interface: impl Into<String>) -> Self {
        Self {
            entry_point: entry_point.into(),
            interface: interface.into(),
            bridge: OnceLock::new(),
            page: Mutex::new(PageState::default()),
        }
    }

    /// A page speaking to the entry point and native interface named in
    /// `config`.
    pub fn for_config(config: &BridgeConfig) -> Self {
        Self::new(
            config.remote_entry_point.clone(),
            config.native_interface_name.clone(),
        )
    }

    /// Name of the native object page script posts messages through.
    pub fn interface_name(&self) -> &str {
        &self.interface
    }

    fn page(&self) -> MutexGuard<'_, PageState> {
        self.page.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Connect the page to `bridge`. Only the first attachment sticks.
    pub fn attach(&self, bridge: &Bridge) -> bool {
        self.bridge.set(bridge.downgrade()).is_ok()
    }

    /// Register a page-side handler native code can call.
    pub fn register(&self, name: &str, handler: impl Fn(Value) -> Value + Send + Sync + 'static) {
        self.page().handlers.insert(name.to_owned(), Arc::new(handler));
    }

    /// Call a native handler the way page script would.
    pub fn call_native(&self, handler_name: &str, data: Value, on_response: Option<ResponseCallback>) {
        let callback_id = on_response.map(|callback| {
            let mut page = self.page();
            page.next_callback += 1;
            let id = format!("{REMOTE_CALLBACK_PREFIX}{}", page.next_callback);
            page.pending.insert(id.clone(), callback);
            id
        });
        self.post(&Envelope::request(handler_name, data, callback_id));
    }

    /// How many non-delivery scripts (bootstrap injections) were evaluated.
    pub fn injections(&self) -> usize {
        self.page().injections
    }

    pub fn is_closed(&self) -> bool {
        self.page().closed
    }

    pub fn urls(&self) -> Vec<String> {
        self.page().urls.clone()
    }

    /// Page-side callbacks still waiting for a native response.
    pub fn pending_callbacks(&self) -> usize {
        self.page().pending.len()
    }

    /// Page script's `<interface>.notice(text)`: hand raw message text to
    /// the native side.
    pub fn notice(&self, text: impl Into<String>) {
        match self.bridge.get().and_then(WeakBridge::upgrade) {
            Some(bridge) => bridge.on_inbound_text(text),
            None => debug!(
                interface = %self.interface,
                "page not attached to a live bridge; message dropped"
            ),
        }
    }

    fn post(&self, envelope: &Envelope) {
        self.notice(codec::encode(envelope));
    }

    fn receive(&self, envelope: Envelope) {
        let Envelope {
            data,
            callback_id,
            handler_name,
            response_id,
            response_data,
        } = envelope;

        match (handler_name, response_id) {
            (None, Some(response_id)) => {
                let callback = self.page().pending.remove(&response_id);
                match callback {
                    Some(callback) => callback(response_data),
                    None => debug!(callback_id = %response_id, "page has no callback for response"),
                }
            }
            (Some(name), None) => {
                let answer = if name == HAS_JAVASCRIPT_METHOD {
                    let page = self.page();
                    Some(Value::Bool(
                        data.as_str().is_some_and(|n| page.handlers.contains_key(n)),
                    ))
                } else {
                    let handler = self.page().handlers.get(&name).cloned();
                    handler.map(|handler| handler(data))
                };
                match (answer, callback_id) {
                    (Some(answer), Some(callback_id)) => {
                        self.post(&Envelope::response(callback_id, answer));
                    }
                    (None, _) => debug!(handler = %name, "page has no handler; ignoring"),
                    _ => {}
                }
            }
            _ => debug!("page ignoring envelope with no usable shape"),
        }
    }
}

impl RenderSurface for LoopbackSurface {
    fn evaluate_script(&self, script: &str) -> Result<()> {
        match parse_outbound_script(&self.entry_point, script) {
            Some(envelope) => self.receive(envelope),
            None => {
                self.page().injections += 1;
                debug!(bytes = script.len(), "page evaluated script");
            }
        }
        Ok(())
    }

    fn load_url(&self, url: &str) -> Result<()> {
        self.page().urls.push(url.to_owned());
        Ok(())
    }

    fn load_url_with_headers(&self, url: &str, headers: &HashMap<String, String>) -> Result<()> {
        debug!(url, headers = headers.len(), "page navigating with headers");
        self.load_url(url)
    }

    fn close(&self) -> Result<()> {
        self.page().closed = true;
        Ok(())
    }
}
