// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Startup buffering of outbound traffic.
//
// Until the page has loaded far enough for the bridge script to be injected,
// there is nobody on the remote side to receive messages. Outbound envelopes
// are held here in order and released when the bridge becomes ready; after
// that the buffer is gone for good and `admit` passes every envelope straight
// through.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;
use wvbridge_core::Envelope;

/// Ordered holding area for envelopes issued before readiness.
///
/// `Some(queue)` means not ready (buffering or flushing); `None` means
/// flushed. Flushing drains in batches and keeps buffering while a batch is
/// delivered, so an envelope admitted mid-flush (say, by a surface that
/// answers synchronously) queues behind the rest. The flip to `None` happens
/// under the same lock that guards appends, and only once a take finds the
/// buffer empty.
pub struct StartupBuffer {
    queue: Mutex<Option<Vec<Envelope>>>,
}

impl Default for StartupBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl StartupBuffer {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(Some(Vec::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Vec<Envelope>>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Buffer `envelope` if not ready yet (returns `None`), otherwise hand it
    /// back for immediate dispatch.
    pub fn admit(&self, envelope: Envelope) -> Option<Envelope> {
        match self.lock().as_mut() {
            Some(queue) => {
                queue.push(envelope);
                debug!(pending = queue.len(), "outbound envelope buffered until ready");
                None
            }
            None => Some(envelope),
        }
    }

    /// Take the next batch of buffered envelopes, in insertion order.
    ///
    /// The buffer stays in place, so envelopes admitted while the batch is
    /// being delivered land in the following one. A take that finds nothing
    /// left flips to ready and returns `None`, as does any take after that.
    pub fn next_flush_batch(&self) -> Option<Vec<Envelope>> {
        let mut queue = self.lock();
        if let Some(pending) = queue.as_mut().filter(|pending| !pending.is_empty()) {
            return Some(std::mem::take(pending));
        }
        *queue = None;
        None
    }

    /// Drop buffered envelopes without changing readiness (used at teardown).
    pub fn discard(&self) -> usize {
        self.lock().as_mut().map(std::mem::take).map_or(0, |dropped| dropped.len())
    }

    pub fn is_ready(&self) -> bool {
        self.lock().is_none()
    }

    /// Number of envelopes waiting for readiness.
    pub fn pending(&self) -> usize {
        self.lock().as_ref().map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn req(n: u32) -> Envelope {
        Envelope::request("step", json!(n), None)
    }

    #[test]
    fn buffers_until_flushed_then_passes_through() {
        let buffer = StartupBuffer::new();
        assert!(!buffer.is_ready());

        assert!(buffer.admit(req(1)).is_none());
        assert!(buffer.admit(req(2)).is_none());
        assert_eq!(buffer.pending(), 2);

        let drained = buffer.next_flush_batch().expect("first batch");
        assert_eq!(drained, vec![req(1), req(2)]);
        assert_eq!(buffer.pending(), 0);

        assert!(buffer.next_flush_batch().is_none());
        assert!(buffer.is_ready());
        assert_eq!(buffer.admit(req(3)), Some(req(3)));
    }

    #[test]
    fn admits_during_flush_queue_behind_the_batch() {
        let buffer = StartupBuffer::new();
        buffer.admit(req(1));
        buffer.admit(req(2));

        let first = buffer.next_flush_batch().expect("first batch");
        assert!(!buffer.is_ready());
        assert!(buffer.admit(req(3)).is_none());

        assert_eq!(first, vec![req(1), req(2)]);
        assert_eq!(buffer.next_flush_batch(), Some(vec![req(3)]));
        assert!(buffer.next_flush_batch().is_none());
        assert!(buffer.next_flush_batch().is_none());
        assert!(buffer.is_ready());
    }

    #[test]
    fn empty_buffer_flips_on_first_take() {
        let buffer = StartupBuffer::new();
        assert!(buffer.next_flush_batch().is_none());
        assert!(buffer.is_ready());
    }

    #[test]
    fn discard_keeps_state() {
        let buffer = StartupBuffer::new();
        buffer.admit(req(1));
        assert_eq!(buffer.discard(), 1);
        assert!(!buffer.is_ready());
        assert!(buffer.next_flush_batch().is_none());
        assert!(buffer.is_ready());
    }

    #[test]
    fn concurrent_admits_are_all_accounted_for() {
        let buffer = StartupBuffer::new();
        let flushed = std::sync::Mutex::new(Vec::new());
        let passed = std::sync::Mutex::new(Vec::new());

        std::thread::scope(|s| {
            for t in 0..4u32 {
                let buffer = &buffer;
                let passed = &passed;
                s.spawn(move || {
                    for i in 0..50u32 {
                        if let Some(env) = buffer.admit(req(t * 1000 + i)) {
                            passed.lock().expect("passed lock").push(env);
                        }
                    }
                });
            }
            s.spawn(|| {
                while let Some(batch) = buffer.next_flush_batch() {
                    flushed.lock().expect("flushed lock").extend(batch);
                }
            });
        });

        let total = flushed.lock().expect("flushed lock").len()
            + passed.lock().expect("passed lock").len();
        assert_eq!(total, 200);
    }
}
