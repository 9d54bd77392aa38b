// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pending response callbacks, keyed by correlation id.
//
// A callback is consumed by the first response carrying its id and never
// invoked again. Nothing times out unless the host opts into expiry; an
// unanswered callback otherwise lives until the bridge is disposed, at which
// point it is dropped without being called.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

/// One-shot handler for the response to an outbound request.
pub type ResponseCallback = Box<dyn FnOnce(Value) + Send>;

struct Pending {
    callback: ResponseCallback,
    registered_at: DateTime<Utc>,
}

#[derive(Default)]
struct Table {
    entries: HashMap<String, Pending>,
    /// Set by `close`; later registrations are refused.
    closed: bool,
}

/// Correlation id → pending response callback.
#[derive(Default)]
pub struct CallbackRegistry {
    table: Mutex<Table>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `callback` under `id`. Ids are generated by the engine and never
    /// reused within one bridge instance.
    ///
    /// Returns `false`, dropping the callback uninvoked, once the registry
    /// has been closed.
    pub fn register(&self, id: impl Into<String>, callback: ResponseCallback) -> bool {
        let id = id.into();
        let mut table = self.lock();
        if table.closed {
            debug!(callback_id = %id, "registry closed; response callback dropped");
            return false;
        }
        debug!(callback_id = %id, "registering response callback");
        table.entries.insert(
            id,
            Pending {
                callback,
                registered_at: Utc::now(),
            },
        );
        true
    }

    /// Remove the callback for `id` and invoke it with `data`.
    ///
    /// Returns `false` if no callback was pending (unknown id, already
    /// resolved, expired, or cleared). The callback runs after the registry
    /// lock is released, so it may freely call back into the bridge.
    pub fn resolve(&self, id: &str, data: Value) -> bool {
        let pending = self.lock().entries.remove(id);
        match pending {
            Some(pending) => {
                (pending.callback)(data);
                true
            }
            None => false,
        }
    }

    /// Drop (without invoking) every callback registered more than `max_age`
    /// ago. Returns how many were dropped.
    pub fn expire_older_than(&self, max_age: Duration) -> usize {
        let Ok(max_age) = chrono::Duration::from_std(max_age) else {
            return 0;
        };
        let cutoff = Utc::now() - max_age;

        let expired: Vec<Pending> = {
            let mut pending = self.lock();
            let stale: Vec<String> = pending
                .entries
                .iter()
                .filter(|(_, p)| p.registered_at < cutoff)
                .map(|(id, _)| id.clone())
                .collect();
            stale.iter().filter_map(|id| pending.entries.remove(id)).collect()
        };

        if !expired.is_empty() {
            debug!(count = expired.len(), "expired stale response callbacks");
        }
        expired.len()
    }

    /// Drop every pending callback without invoking it. Returns how many
    /// were dropped.
    pub fn clear(&self) -> usize {
        let drained = std::mem::take(&mut self.lock().entries);
        drained.len()
    }

    /// Like [`clear`](Self::clear), and refuse every later registration.
    /// Both happen under one lock, so no callback can slip in afterwards.
    pub fn close(&self) -> usize {
        let drained = {
            let mut table = self.lock();
            table.closed = true;
            std::mem::take(&mut table.entries)
        };
        drained.len()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }
}
