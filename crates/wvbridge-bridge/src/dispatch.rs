// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Designated-thread dispatch queue.
//
// Everything that touches the rendering surface has to happen on one thread
// (the UI thread on most platforms). Callers on that thread run their
// operation immediately; everyone else posts it to an unbounded FIFO mailbox
// that the designated thread drains. Posting never blocks and never reports
// failure to the caller: once the mailbox is closed, work is dropped.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, error::TryRecvError, unbounded_channel};
use tracing::{debug, trace};

/// A unit of surface-facing work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Evaluate a script in the page.
    EvaluateScript(String),
    /// Navigate to a URL.
    Navigate(String),
    /// Navigate to a URL with extra request headers.
    NavigateWithHeaders {
        url: String,
        headers: HashMap<String, String>,
    },
    /// Route a message text received from page script.
    DeliverInbound(String),
    /// Inject the bootstrap script and flush the startup buffer.
    InjectBridge,
}

impl Operation {
    pub fn label(&self) -> &'static str {
        match self {
            Operation::EvaluateScript(_) => "evaluate-script",
            Operation::Navigate(_) => "navigate",
            Operation::NavigateWithHeaders { .. } => "navigate-with-headers",
            Operation::DeliverInbound(_) => "deliver-inbound",
            Operation::InjectBridge => "inject-bridge",
        }
    }
}

/// Producer side of the mailbox, shareable across threads.
pub struct DispatchQueue {
    designated: ThreadId,
    sender: Mutex<Option<UnboundedSender<Operation>>>,
}

/// Consumer side of the mailbox. Lives on the designated thread.
pub struct Mailbox {
    receiver: UnboundedReceiver<Operation>,
}

impl DispatchQueue {
    /// Create a queue whose designated thread is the calling thread.
    pub fn bound_to_current_thread() -> (Self, Mailbox) {
        Self::bound_to(thread::current().id())
    }

    /// Create a queue whose designated thread is `designated`.
    pub fn bound_to(designated: ThreadId) -> (Self, Mailbox) {
        let (sender, receiver) = unbounded_channel();
        (
            Self {
                designated,
                sender: Mutex::new(Some(sender)),
            },
            Mailbox { receiver },
        )
    }

    fn sender(&self) -> MutexGuard<'_, Option<UnboundedSender<Operation>>> {
        self.sender.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn designated_thread(&self) -> ThreadId {
        self.designated
    }

    pub fn is_designated_thread(&self) -> bool {
        thread::current().id() == self.designated
    }

    /// Run `op` through `execute` right away when called on the designated
    /// thread, otherwise post it to the mailbox.
    pub fn dispatch(&self, op: Operation, execute: impl FnOnce(Operation)) {
        if self.is_designated_thread() {
            trace!(op = op.label(), "running on designated thread");
            execute(op);
        } else {
            self.post(op);
        }
    }

    /// Append `op` to the mailbox. Returns `false` (and drops `op`) once the
    /// queue is closed or the consumer is gone.
    pub fn post(&self, op: Operation) -> bool {
        let label = op.label();
        let posted = match self.sender().as_ref() {
            Some(sender) => sender.send(op).is_ok(),
            None => false,
        };
        if posted {
            trace!(op = label, "posted to designated thread");
        } else {
            debug!(op = label, "designated thread unavailable; dropping operation");
        }
        posted
    }

    /// Stop accepting work. Operations already in the mailbox are still
    /// handed to the consumer, which decides whether to run them.
    pub fn close(&self) {
        self.sender().take();
    }

    pub fn is_closed(&self) -> bool {
        self.sender().as_ref().is_none_or(|s| s.is_closed())
    }
}

impl Mailbox {
    /// Block until the next operation arrives. Returns `None` once the queue
    /// is closed and drained.
    ///
    /// Must not be called from inside an async runtime.
    pub fn recv_blocking(&mut self) -> Option<Operation> {
        self.receiver.blocking_recv()
    }

    /// Take the next operation if one is waiting.
    pub fn try_recv(&mut self) -> Option<Operation> {
        match self.receiver.try_recv() {
            Ok(op) => Some(op),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fast_path_on_designated_thread() {
        let (queue, mut mailbox) = DispatchQueue::bound_to_current_thread();
        assert!(queue.is_designated_thread());

        let mut ran = Vec::new();
        queue.dispatch(Operation::Navigate("https://example.org".into()), |op| {
            ran.push(op)
        });

        assert_eq!(ran, vec![Operation::Navigate("https://example.org".into())]);
        assert!(mailbox.try_recv().is_none());
    }

    #[test]
    fn off_thread_calls_are_posted_in_order() {
        let (queue, mut mailbox) = DispatchQueue::bound_to_current_thread();

        thread::scope(|s| {
            s.spawn(|| {
                assert!(!queue.is_designated_thread());
                for i in 0..5 {
                    queue.dispatch(Operation::EvaluateScript(format!("step({i})")), |_| {
                        panic!("must not run off the designated thread");
                    });
                }
            });
        });

        let received: Vec<Operation> = std::iter::from_fn(|| mailbox.try_recv()).collect();
        let expected: Vec<Operation> = (0..5)
            .map(|i| Operation::EvaluateScript(format!("step({i})")))
            .collect();
        assert_eq!(received, expected);
    }

    #[test]
    fn closed_queue_drops_posts() {
        let (queue, mut mailbox) = DispatchQueue::bound_to_current_thread();
        assert!(queue.post(Operation::DeliverInbound("{}".into())));
        queue.close();
        assert!(queue.is_closed());
        assert!(!queue.post(Operation::InjectBridge));

        // Work posted before the close is still delivered, then the mailbox ends.
        assert_eq!(mailbox.recv_blocking(), Some(Operation::DeliverInbound("{}".into())));
        assert_eq!(mailbox.recv_blocking(), None);
    }

    #[test]
    fn dropped_mailbox_closes_queue() {
        let (queue, mailbox) = DispatchQueue::bound_to_current_thread();
        drop(mailbox);
        assert!(queue.is_closed());
        assert!(!queue.post(Operation::Navigate("about:blank".into())));
    }
}
