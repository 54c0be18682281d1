// SPDX-FileCopyrightText: © 2026 Airwave Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Single-producer/single-consumer message mailboxes.
//!
//! Each direction between two actors gets its own mailbox: the producer
//! enqueues and the enqueue itself is the wake signal, so wakes can coalesce
//! and the consumer drains until the queue is empty rather than assuming one
//! message per wake.
//!
//! The single-producer contract is enforced by ownership: [`MailboxSender`]
//! is deliberately not `Clone`. Mailboxes are unbounded - the fan-out path
//! must never block the orchestrator; backpressure is applied at the
//! per-connection send queues instead.

use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::mpsc;

/// Creates a connected mailbox pair.
pub fn mailbox<T>() -> (MailboxSender<T>, MailboxReceiver<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (MailboxSender { tx }, MailboxReceiver { rx })
}

/// The producing half of a mailbox. Exactly one producer per direction.
#[derive(Debug)]
pub struct MailboxSender<T> {
    tx: mpsc::UnboundedSender<T>,
}

impl<T> MailboxSender<T> {
    /// Enqueues a message and wakes the consumer.
    ///
    /// # Errors
    ///
    /// Returns the message back if the consumer is gone. A dead peer is
    /// advisory for most callers - the kill signal is what actually stops
    /// the system - so many call sites discard this result.
    pub fn send(&self, message: T) -> Result<(), T> {
        self.tx.send(message).map_err(|e| e.0)
    }

    /// Whether the consuming half has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// The consuming half of a mailbox.
#[derive(Debug)]
pub struct MailboxReceiver<T> {
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> MailboxReceiver<T> {
    /// Waits for the next message. Returns `None` once the producer is gone
    /// and the queue is drained.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Drains every message that is ready right now, without waiting.
    pub fn drain_ready(&mut self) -> Vec<T> {
        let mut drained = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            drained.push(message);
        }
        drained
    }

    /// Closes the mailbox so further sends fail, without dropping queued
    /// messages.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

// Mailboxes participate in `select_all` merges on the orchestrator side, so
// the receiver is also a Stream.
impl<T> futures::Stream for MailboxReceiver<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        Pin::into_inner(self).rx.poll_recv(cx)
    }
}
