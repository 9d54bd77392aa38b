// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bridge engine: ties the registries, startup buffer and dispatch queue
// together into the request/response protocol.
//
// Outbound: `call_handler` → envelope (+ pending callback) → startup buffer
// or dispatch queue → delivery script evaluated on the designated thread.
// Inbound: `on_inbound_text` → dispatch queue → decode → resolve a pending
// callback (response) or invoke a registered handler (request).
//
// Every failure on these paths degrades to a dropped message. The remote
// side's state is never fully known here, so nothing is reported back to it
// and nothing is surfaced to callers, which have already returned.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::time::Duration;

use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};
use wvbridge_core::codec::{self, outbound_script};
use wvbridge_core::error::{BridgeError, Result};
use wvbridge_core::{BridgeConfig, BridgeId, BridgeState, Envelope};

use crate::callbacks::{CallbackRegistry, ResponseCallback};
use crate::dispatch::{DispatchQueue, Mailbox, Operation};
use crate::handlers::{
    CLOSE_PAGE, DISABLE_ALERT_BOX_SAFETY_TIMEOUT, HAS_JAVASCRIPT_METHOD, HAS_NATIVE_METHOD,
    HandlerRegistry,
};
use crate::script::FileScript;
use crate::startup::StartupBuffer;
use crate::traits::{CloseWindowListener, Handler, RenderSurface, ScriptSource};

/// What became of one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundOutcome {
    /// A response that fulfilled a pending callback.
    Resolved,
    /// A request passed to a registered handler.
    Handled,
    /// A response whose id matched no pending callback.
    OrphanResponse,
    /// A request naming a handler that is not registered.
    UnknownHandler,
    /// Neither a request nor a response.
    InvalidShape,
    /// Not decodable as an envelope.
    Malformed,
    /// The bridge has been disposed.
    Disposed,
}

/// Sends at most one response back to page script for one inbound request.
///
/// Consumed by [`respond`](Self::respond). May be answered later, from any
/// thread; dropping it unanswered sends nothing.
pub struct Responder {
    callback_id: String,
    bridge: Weak<Inner>,
}

impl Responder {
    /// Correlation id of the request being answered.
    pub fn callback_id(&self) -> &str {
        &self.callback_id
    }

    pub fn respond(self, data: Value) {
        match self.bridge.upgrade() {
            Some(inner) => inner.send(Envelope::response(self.callback_id, data)),
            None => debug!(callback_id = %self.callback_id, "bridge gone; response dropped"),
        }
    }
}

impl std::fmt::Debug for Responder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Responder")
            .field("callback_id", &self.callback_id)
            .finish_non_exhaustive()
    }
}

struct Inner {
    id: BridgeId,
    /// Back-reference handed to responders and reserved handlers.
    this: Weak<Inner>,
    config: BridgeConfig,
    surface: Arc<dyn RenderSurface>,
    script: Box<dyn ScriptSource>,
    callbacks: CallbackRegistry,
    handlers: HandlerRegistry,
    startup: StartupBuffer,
    queue: DispatchQueue,
    close_listener: RwLock<Option<Arc<dyn CloseWindowListener>>>,
    next_callback: AtomicU64,
    ready_signalled: AtomicBool,
    alert_timeout_disabled: AtomicBool,
    disposed: AtomicBool,
}

impl Inner {
    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn next_callback_id(&self) -> String {
        let n = self.next_callback.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}{n}", self.config.callback_prefix)
    }

    fn submit(&self, op: Operation) {
        if self.is_disposed() {
            debug!(instance = %self.id, op = op.label(), "bridge disposed; dropping operation");
            return;
        }
        self.queue.dispatch(op, |op| self.execute(op));
    }

    /// Route an outbound envelope through the startup buffer.
    fn send(&self, envelope: Envelope) {
        if self.is_disposed() {
            debug!(instance = %self.id, "bridge disposed; outbound envelope dropped");
            return;
        }
        if let Some(envelope) = self.startup.admit(envelope) {
            self.deliver(&envelope);
        }
    }

    fn deliver(&self, envelope: &Envelope) {
        let script = outbound_script(&self.config.remote_entry_point, envelope);
        self.submit(Operation::EvaluateScript(script));
    }

    /// Run one operation. Only ever called on the designated thread.
    fn execute(&self, op: Operation) {
        let label = op.label();
        let result = match op {
            Operation::EvaluateScript(script) => self.surface.evaluate_script(&script),
            Operation::Navigate(url) => self.surface.load_url(&url),
            Operation::NavigateWithHeaders { url, headers } => {
                self.surface.load_url_with_headers(&url, &headers)
            }
            Operation::DeliverInbound(text) => {
                self.process_inbound(&text);
                Ok(())
            }
            Operation::InjectBridge => {
                self.inject_and_flush();
                Ok(())
            }
        };
        if let Err(e) = result {
            warn!(instance = %self.id, op = label, error = %e, "surface operation failed");
        }
    }

    fn process_inbound(&self, text: &str) -> InboundOutcome {
        if self.is_disposed() {
            return InboundOutcome::Disposed;
        }

        let envelope = match codec::decode(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(instance = %self.id, error = %e, "discarding inbound message");
                return InboundOutcome::Malformed;
            }
        };

        let Envelope {
            data,
            callback_id,
            handler_name,
            response_id,
            response_data,
        } = envelope;

        // Same shape rules as `Envelope::kind`, destructured to move fields out.
        match (handler_name, response_id) {
            (None, Some(response_id)) => {
                if self.callbacks.resolve(&response_id, response_data) {
                    debug!(instance = %self.id, callback_id = %response_id, "response delivered");
                    InboundOutcome::Resolved
                } else {
                    debug!(instance = %self.id, callback_id = %response_id, "no pending callback for response");
                    InboundOutcome::OrphanResponse
                }
            }
            (Some(name), None) => match self.handlers.lookup(&name) {
                Some(handler) => {
                    let responder = callback_id.map(|callback_id| Responder {
                        callback_id,
                        bridge: self.this.clone(),
                    });
                    debug!(instance = %self.id, handler = %name, "invoking native handler");
                    handler.handle(data, responder);
                    InboundOutcome::Handled
                }
                None => {
                    debug!(instance = %self.id, handler = %name, "no native handler registered");
                    InboundOutcome::UnknownHandler
                }
            },
            _ => {
                debug!(instance = %self.id, "inbound envelope is neither request nor response");
                InboundOutcome::InvalidShape
            }
        }
    }

    /// Evaluate the bootstrap script, then release the startup buffer.
    ///
    /// Runs as a single designated-thread operation, so the drained envelopes
    /// reach the surface before anything posted after the flip. The buffer
    /// keeps admitting while batches are delivered: anything a reentrant
    /// surface or callback sends mid-flush goes out after the earlier batch.
    fn inject_and_flush(&self) {
        if self.is_disposed() {
            return;
        }

        match self.script.bootstrap_script() {
            Ok(script) => {
                if let Err(e) = self.surface.evaluate_script(&script) {
                    warn!(instance = %self.id, error = %e, "bootstrap injection failed");
                }
            }
            Err(e) => warn!(instance = %self.id, error = %e, "bootstrap script unavailable"),
        }

        let mut flushed = 0;
        while let Some(batch) = self.startup.next_flush_batch() {
            for envelope in &batch {
                self.deliver(envelope);
            }
            flushed += batch.len();
        }
        info!(instance = %self.id, flushed, "bridge ready; startup buffer flushed");
    }

    fn request_close(&self) {
        let listener = self
            .close_listener
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if listener.is_some_and(|l| !l.on_close()) {
            info!(instance = %self.id, "close request vetoed by listener");
            return;
        }
        if let Err(e) = self.surface.close() {
            warn!(instance = %self.id, error = %e, "failed to close surface");
        }
    }

    fn set_alert_box_safety_timeout_disabled(&self, disabled: bool) {
        self.alert_timeout_disabled.store(disabled, Ordering::Relaxed);
        debug!(instance = %self.id, disabled, "alert box safety timeout toggled");
    }
}

/// Install the reserved handlers. Each holds only a weak reference back to
/// the engine.
fn install_reserved_handlers(handlers: &HandlerRegistry, this: &Weak<Inner>) {
    let weak = this.clone();
    handlers.register(
        HAS_NATIVE_METHOD,
        Arc::new(move |data: Value, responder: Option<Responder>| {
            let Some(responder) = responder else { return };
            let exists = match (weak.upgrade(), data.as_str()) {
                (Some(inner), Some(name)) => inner.handlers.contains(name),
                _ => false,
            };
            responder.respond(Value::Bool(exists));
        }),
    );

    let weak = this.clone();
    handlers.register(
        CLOSE_PAGE,
        Arc::new(move |_data: Value, _responder: Option<Responder>| {
            if let Some(inner) = weak.upgrade() {
                inner.request_close();
            }
        }),
    );

    let weak = this.clone();
    handlers.register(
        DISABLE_ALERT_BOX_SAFETY_TIMEOUT,
        Arc::new(move |data: Value, _responder: Option<Responder>| {
            let Some(inner) = weak.upgrade() else { return };
            match data.as_bool() {
                Some(disabled) => inner.set_alert_box_safety_timeout_disabled(disabled),
                None => debug!(instance = %inner.id, "ignoring non-boolean safety timeout toggle"),
            }
        }),
    );
}

/// Builder for a [`Bridge`].
pub struct BridgeBuilder {
    surface: Arc<dyn RenderSurface>,
    config: BridgeConfig,
    script: Option<Box<dyn ScriptSource>>,
    close_listener: Option<Arc<dyn CloseWindowListener>>,
}

impl BridgeBuilder {
    fn new(surface: Arc<dyn RenderSurface>) -> Self {
        Self {
            surface,
            config: BridgeConfig::default(),
            script: None,
            close_listener: None,
        }
    }

    pub fn config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    /// Where the bootstrap script comes from. Defaults to reading
    /// `config.bootstrap_script` from disk.
    pub fn script(mut self, source: impl ScriptSource + 'static) -> Self {
        self.script = Some(Box::new(source));
        self
    }

    pub fn close_listener(mut self, listener: impl CloseWindowListener + 'static) -> Self {
        self.close_listener = Some(Arc::new(listener));
        self
    }

    /// Build a bridge whose designated thread is the calling thread.
    ///
    /// The returned [`MainLoop`] must be pumped on this same thread.
    pub fn build(self) -> (Bridge, MainLoop) {
        let BridgeBuilder {
            surface,
            config,
            script,
            close_listener,
        } = self;
        let script = script.unwrap_or_else(|| Box::new(FileScript::new(&config.bootstrap_script)));
        let (queue, mailbox) = DispatchQueue::bound_to_current_thread();

        let inner = Arc::new_cyclic(|this: &Weak<Inner>| {
            let handlers = HandlerRegistry::new();
            install_reserved_handlers(&handlers, this);
            Inner {
                id: BridgeId::new(),
                this: this.clone(),
                config,
                surface,
                script,
                callbacks: CallbackRegistry::new(),
                handlers,
                startup: StartupBuffer::new(),
                queue,
                close_listener: RwLock::new(close_listener),
                next_callback: AtomicU64::new(0),
                ready_signalled: AtomicBool::new(false),
                alert_timeout_disabled: AtomicBool::new(false),
                disposed: AtomicBool::new(false),
            }
        });

        info!(instance = %inner.id, "bridge created");
        let main_loop = MainLoop {
            mailbox,
            bridge: Arc::downgrade(&inner),
        };
        (Bridge { inner }, main_loop)
    }

    /// Build a bridge on a freshly spawned designated thread that pumps the
    /// mailbox until the bridge is disposed or dropped.
    pub fn spawn(self) -> Result<Bridge> {
        let name = self.config.designated_thread_name.clone();
        let (tx, rx) = std::sync::mpsc::channel();

        std::thread::Builder::new()
            .name(name)
            .spawn(move || {
                let (bridge, main_loop) = self.build();
                if tx.send(bridge).is_ok() {
                    main_loop.run();
                }
            })
            .map_err(|e| BridgeError::ThreadSpawn(e.to_string()))?;

        rx.recv().map_err(|_| {
            BridgeError::ThreadSpawn("designated thread exited before the bridge was built".into())
        })
    }
}

/// Consumer end of the dispatch queue, pumped on the designated thread.
///
/// Holds only a weak reference to the engine: once the bridge is disposed or
/// every [`Bridge`] handle is dropped, remaining work is discarded.
pub struct MainLoop {
    mailbox: Mailbox,
    bridge: Weak<Inner>,
}

impl MainLoop {
    /// Process operations until the bridge is disposed or dropped.
    ///
    /// Blocks the calling thread; must not be called from async code.
    pub fn run(mut self) {
        while let Some(op) = self.mailbox.recv_blocking() {
            if !self.execute(op) {
                break;
            }
        }
        debug!("designated thread loop finished");
    }

    /// Process every operation already waiting, without blocking. For hosts
    /// that own the designated thread's event loop and pump the bridge from
    /// it. Returns how many operations ran.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Some(op) = self.mailbox.try_recv() {
            if !self.execute(op) {
                break;
            }
            ran += 1;
        }
        ran
    }

    fn execute(&self, op: Operation) -> bool {
        match self.bridge.upgrade() {
            Some(inner) if !inner.is_disposed() => {
                inner.execute(op);
                true
            }
            _ => {
                debug!(op = op.label(), "bridge gone; dropping queued operation");
                false
            }
        }
    }
}

/// Handle to one bridge instance. Cheap to clone and safe to share across
/// threads.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<Inner>,
}

/// Non-owning handle; see [`Bridge::downgrade`].
#[derive(Clone)]
pub struct WeakBridge {
    inner: Weak<Inner>,
}

impl WeakBridge {
    pub fn upgrade(&self) -> Option<Bridge> {
        self.inner.upgrade().map(|inner| Bridge { inner })
    }
}

impl Bridge {
    pub fn builder(surface: Arc<dyn RenderSurface>) -> BridgeBuilder {
        BridgeBuilder::new(surface)
    }

    /// Shorthand for `Bridge::builder(surface).config(config).build()`.
    pub fn new(surface: Arc<dyn RenderSurface>, config: BridgeConfig) -> (Bridge, MainLoop) {
        Self::builder(surface).config(config).build()
    }

    /// A handle that does not keep the bridge alive. Handlers that need to
    /// call back into the bridge should capture one of these.
    pub fn downgrade(&self) -> WeakBridge {
        WeakBridge {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn instance_id(&self) -> BridgeId {
        self.inner.id
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    pub fn state(&self) -> BridgeState {
        if self.inner.is_disposed() {
            BridgeState::Disposed
        } else if self.inner.startup.is_ready() {
            BridgeState::Ready
        } else {
            BridgeState::NotReady
        }
    }

    /// Invoke `handler_name` in page script.
    ///
    /// With `on_response`, a fresh correlation id is attached and the
    /// callback runs (on the designated thread) when the page answers. The
    /// page silently ignores unknown handlers, so an unanswered callback is
    /// simply never called. Empty handler names are rejected.
    #[instrument(skip_all, fields(instance = %self.inner.id, handler = handler_name))]
    pub fn call_handler(
        &self,
        handler_name: &str,
        data: Value,
        on_response: Option<ResponseCallback>,
    ) {
        let inner = &self.inner;
        if inner.is_disposed() {
            debug!("bridge disposed; call dropped");
            return;
        }
        if handler_name.is_empty() {
            warn!("rejecting call without a handler name");
            return;
        }

        if let Some(ttl) = inner.config.callback_ttl_secs {
            inner.callbacks.expire_older_than(Duration::from_secs(ttl));
        }

        let callback_id = match on_response {
            Some(callback) => {
                let id = inner.next_callback_id();
                // Refused once dispose has closed the registry.
                if !inner.callbacks.register(id.clone(), callback) {
                    debug!("bridge disposed; call dropped");
                    return;
                }
                Some(id)
            }
            None => None,
        };
        debug!(callback_id = ?callback_id, "calling page handler");
        inner.send(Envelope::request(handler_name, data, callback_id));
    }

    /// Invoke `handler_name` with no payload and no response.
    pub fn call_handler_simple(&self, handler_name: &str) {
        self.call_handler(handler_name, Value::Null, None);
    }

    /// Invoke `handler_name` with `data`, ignoring any response.
    pub fn call_handler_with(&self, handler_name: &str, data: Value) {
        self.call_handler(handler_name, data, None);
    }

    /// Invoke `handler_name` with `data` and run `on_response` with the answer.
    pub fn call_handler_then<F>(&self, handler_name: &str, data: Value, on_response: F)
    where
        F: FnOnce(Value) + Send + 'static,
    {
        self.call_handler(handler_name, data, Some(Box::new(on_response)));
    }

    /// Ask page script whether it has a handler called `handler_name`.
    /// Anything but a boolean answer counts as `false`.
    pub fn has_javascript_method<F>(&self, handler_name: &str, on_result: F)
    where
        F: FnOnce(bool) + Send + 'static,
    {
        self.call_handler_then(HAS_JAVASCRIPT_METHOD, json!(handler_name), move |answer| {
            on_result(answer.as_bool().unwrap_or(false))
        });
    }

    /// Register a native handler callable from page script.
    ///
    /// Replaces any handler of the same name, including the reserved ones
    /// (see [`RESERVED_HANDLERS`](crate::handlers::RESERVED_HANDLERS)).
    /// The empty name is ignored. A handler that captures a [`Bridge`] keeps
    /// it alive until [`dispose`](Self::dispose); capture a [`WeakBridge`]
    /// instead where that matters.
    pub fn register_handler(&self, name: &str, handler: impl Handler + 'static) {
        if self.inner.is_disposed() {
            debug!(instance = %self.inner.id, handler = name, "bridge disposed; registration ignored");
            return;
        }
        if name.is_empty() {
            warn!(instance = %self.inner.id, "ignoring handler registration without a name");
            return;
        }
        self.inner.handlers.register(name, Arc::new(handler));
    }

    pub fn unregister_handler(&self, name: &str) -> bool {
        self.inner.handlers.unregister(name)
    }

    pub fn has_native_method(&self, name: &str) -> bool {
        self.inner.handlers.contains(name)
    }

    /// Hand a message text posted by page script to the bridge. Callable
    /// from any thread; routing happens on the designated thread.
    pub fn on_inbound_text(&self, text: impl Into<String>) {
        self.inner.submit(Operation::DeliverInbound(text.into()));
    }

    /// Route one inbound message immediately and report what happened.
    ///
    /// This is the designated-thread step behind
    /// [`on_inbound_text`](Self::on_inbound_text); call it directly only
    /// from the designated thread.
    pub fn process_inbound(&self, text: &str) -> InboundOutcome {
        self.inner.process_inbound(text)
    }

    /// Evaluate `script` in the page. Callable from any thread.
    pub fn evaluate_script(&self, script: impl Into<String>) {
        self.inner.submit(Operation::EvaluateScript(script.into()));
    }

    /// Navigate the page. Callable from any thread.
    pub fn navigate(&self, url: impl Into<String>) {
        self.inner.submit(Operation::Navigate(url.into()));
    }

    /// Navigate the page with extra request headers. Callable from any thread.
    pub fn navigate_with_headers(&self, url: impl Into<String>, headers: HashMap<String, String>) {
        self.inner.submit(Operation::NavigateWithHeaders {
            url: url.into(),
            headers,
        });
    }

    /// Page load progress (0-100) reported by the surface. Crossing the
    /// configured threshold signals readiness.
    pub fn on_progress_changed(&self, progress: u8) {
        if progress > self.inner.config.ready_progress_threshold {
            self.signal_ready();
        }
    }

    /// Inject the bootstrap script and flush the startup buffer. Only the
    /// first call has any effect.
    pub fn signal_ready(&self) {
        let inner = &self.inner;
        if inner.is_disposed() || inner.ready_signalled.swap(true, Ordering::AcqRel) {
            return;
        }
        info!(instance = %inner.id, "readiness signalled");
        inner.submit(Operation::InjectBridge);
    }

    /// Install (or with `None`, remove) the veto consulted when page script
    /// asks to close the surface.
    pub fn set_close_window_listener(&self, listener: Option<Arc<dyn CloseWindowListener>>) {
        *self
            .inner
            .close_listener
            .write()
            .unwrap_or_else(PoisonError::into_inner) = listener;
    }

    /// Hook behind the reserved safety-timeout handler. The bridge only
    /// records the flag; hosts that implement an alert timeout read it back
    /// with [`alert_box_safety_timeout_disabled`](Self::alert_box_safety_timeout_disabled).
    pub fn disable_alert_box_safety_timeout(&self, disabled: bool) {
        self.inner.set_alert_box_safety_timeout_disabled(disabled);
    }

    pub fn alert_box_safety_timeout_disabled(&self) -> bool {
        self.inner.alert_timeout_disabled.load(Ordering::Relaxed)
    }

    /// Number of outbound requests still waiting for a response.
    pub fn pending_callbacks(&self) -> usize {
        self.inner.callbacks.len()
    }

    /// Number of envelopes held until readiness.
    pub fn buffered_messages(&self) -> usize {
        self.inner.startup.pending()
    }

    /// Tear the bridge down. Pending callbacks are dropped without being
    /// called, handlers and buffered messages are discarded, and the
    /// designated-thread loop stops. Every later call is a no-op.
    pub fn dispose(&self) {
        let inner = &self.inner;
        if inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let dropped_callbacks = inner.callbacks.close();
        let dropped_messages = inner.startup.discard();
        inner.handlers.clear();
        inner.queue.close();
        info!(
            instance = %inner.id,
            dropped_callbacks,
            dropped_messages,
            "bridge disposed"
        );
    }
}
