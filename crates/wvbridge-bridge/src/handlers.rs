// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Named request handlers callable from page script.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, warn};

use crate::traits::Handler;

/// Reserved: answers whether a native handler with the given name exists.
pub const HAS_NATIVE_METHOD: &str = "_hasNativeMethod";

/// Reserved: page script asks to close the hosting surface.
pub const CLOSE_PAGE: &str = "_closePage";

/// Reserved: page script toggles the alert-box safety timeout.
pub const DISABLE_ALERT_BOX_SAFETY_TIMEOUT: &str = "_disableJavascriptAlertBoxSafetyTimeout";

/// Handlers every bridge installs before user code can register anything.
///
/// Registering one of these names again replaces the built-in behaviour.
/// That is allowed, but logged.
pub const RESERVED_HANDLERS: [&str; 3] =
    [HAS_NATIVE_METHOD, CLOSE_PAGE, DISABLE_ALERT_BOX_SAFETY_TIMEOUT];

/// Remote-side counterpart of [`HAS_NATIVE_METHOD`], installed by the page's
/// bridge script.
pub const HAS_JAVASCRIPT_METHOD: &str = "_hasJavascriptMethod";

pub fn is_reserved(name: &str) -> bool {
    RESERVED_HANDLERS.contains(&name)
}

/// Name → handler table. Last registration wins.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn Handler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<dyn Handler>>> {
        self.handlers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<dyn Handler>>> {
        self.handlers.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `handler` under `name`, replacing any previous one.
    ///
    /// Returns `true` if an existing handler was replaced.
    pub fn register(&self, name: &str, handler: Arc<dyn Handler>) -> bool {
        let replaced = self.write().insert(name.to_owned(), handler).is_some();
        if replaced && is_reserved(name) {
            warn!(handler = name, "reserved handler overridden");
        } else if replaced {
            debug!(handler = name, "handler replaced");
        } else {
            debug!(handler = name, "handler registered");
        }
        replaced
    }

    /// Look up a handler. The returned `Arc` is cloned out so the caller can
    /// invoke it without holding the registry lock.
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Handler>> {
        self.read().get(name).cloned()
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.write().remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Remove every handler, reserved ones included.
    pub fn clear(&self) {
        let drained = std::mem::take(&mut *self.write());
        debug!(count = drained.len(), "handler registry cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Responder;
    use serde_json::{Value, json};
    use std::sync::Mutex;

    fn recording(log: &Arc<Mutex<Vec<(String, Value)>>>, tag: &str) -> Arc<dyn Handler> {
        let log = Arc::clone(log);
        let tag = tag.to_owned();
        Arc::new(move |data: Value, _responder: Option<Responder>| {
            log.lock().expect("log lock").push((tag.clone(), data));
        })
    }

    #[test]
    fn register_and_lookup() {
        let registry = HandlerRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        assert!(!registry.register("greet", recording(&log, "first")));
        let handler = registry.lookup("greet").expect("registered");
        handler.handle(json!("hi"), None);

        assert_eq!(*log.lock().expect("log lock"), vec![("first".into(), json!("hi"))]);
        assert!(registry.lookup("missing").is_none());
    }

    #[test]
    fn last_registration_wins() {
        let registry = HandlerRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        registry.register("greet", recording(&log, "first"));
        assert!(registry.register("greet", recording(&log, "second")));

        registry.lookup("greet").expect("registered").handle(json!(1), None);
        assert_eq!(log.lock().expect("log lock")[0].0, "second");
    }

    #[test]
    fn unregister_and_clear() {
        let registry = HandlerRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        registry.register("a", recording(&log, "a"));
        registry.register("b", recording(&log, "b"));
        assert_eq!(registry.names(), vec!["a".to_string(), "b".to_string()]);

        assert!(registry.unregister("a"));
        assert!(!registry.unregister("a"));
        assert!(!registry.contains("a"));

        registry.clear();
        assert!(registry.names().is_empty());
    }

    #[test]
    fn reserved_names() {
        assert!(is_reserved(HAS_NATIVE_METHOD));
        assert!(is_reserved(CLOSE_PAGE));
        assert!(is_reserved(DISABLE_ALERT_BOX_SAFETY_TIMEOUT));
        assert!(!is_reserved(HAS_JAVASCRIPT_METHOD));
        assert!(!is_reserved("greet"));
    }
}
