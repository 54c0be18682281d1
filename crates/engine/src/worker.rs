// SPDX-FileCopyrightText: © 2026 Airwave Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The broadcast worker.
//!
//! A worker owns a set of WebSocket connections and their subscription map
//! (channel id -> connection ids). Fan-out messages from the orchestrator
//! are pushed onto each subscribed connection's bounded frame queue - the
//! socket task drains it strictly in order - and the broadcast buffer is
//! released exactly once per message, independent of how many subscribers
//! the worker has.
//!
//! A connection whose queue is full is a consumer that stopped consuming;
//! it is disconnected rather than allowed to stall the fleet.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use opentelemetry::metrics::{Counter, Gauge};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{interval, MissedTickBehavior};

use airwave_core::{BufferStore, ChannelId, ConnectionId, MailboxReceiver, MailboxSender, WorkerId};

use crate::constants::WS_PING_INTERVAL;
use crate::messages::{ConnectionRequest, Frame, Subscription, WorkerEvent, WorkerMessage};

struct Connection {
    frames: mpsc::Sender<Frame>,
    /// Set once the orchestrator has resolved the subscription.
    channel: Option<ChannelId>,
}

pub(crate) struct Worker {
    id: WorkerId,
    store: Arc<BufferStore>,
    events: MailboxSender<WorkerEvent>,
    subscribers: HashMap<ChannelId, HashSet<ConnectionId>>,
    connections: HashMap<ConnectionId, Connection>,
    next_connection: u64,
    // Telemetry
    frames_enqueued: Counter<u64>,
    slow_disconnects: Counter<u64>,
    connections_gauge: Gauge<u64>,
}

impl Worker {
    pub(crate) fn new(
        id: WorkerId,
        store: Arc<BufferStore>,
        events: MailboxSender<WorkerEvent>,
    ) -> Self {
        let meter = opentelemetry::global::meter("airwave_worker");
        let frames_enqueued = meter
            .u64_counter("worker.frames_enqueued")
            .with_description("Broadcast frames enqueued toward connections")
            .build();
        let slow_disconnects = meter
            .u64_counter("worker.slow_disconnects")
            .with_description("Connections dropped because their send queue overflowed")
            .build();
        let connections_gauge = meter
            .u64_gauge("worker.connections")
            .with_description("Connections currently owned by this worker")
            .build();

        Self {
            id,
            store,
            events,
            subscribers: HashMap::new(),
            connections: HashMap::new(),
            next_connection: 0,
            frames_enqueued,
            slow_disconnects,
            connections_gauge,
        }
    }

    /// The worker actor loop.
    pub(crate) async fn run(
        mut self,
        mut messages: MailboxReceiver<WorkerMessage>,
        mut requests: mpsc::UnboundedReceiver<ConnectionRequest>,
    ) {
        tracing::debug!(worker = self.id.0, "worker started");

        let mut ping = interval(WS_PING_INTERVAL);
        ping.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                // Fan-out and resolutions win over new connections.
                biased;

                msg = messages.recv() => match msg {
                    Some(WorkerMessage::Broadcast { buffer, frame, channel }) => {
                        self.deliver(channel, &frame);
                        self.store.release(buffer);
                    },
                    Some(WorkerMessage::ListenerResolved { conn, subscription }) => {
                        self.resolve(conn, subscription);
                    },
                    Some(WorkerMessage::Shutdown) | None => break,
                },
                Some(req) = requests.recv() => match req {
                    ConnectionRequest::Attach { station, endpoint, frames, reply } => {
                        self.attach(station, endpoint, frames, &reply);
                    },
                    ConnectionRequest::Detach { conn } => self.drop_connection(conn),
                },
                _ = ping.tick() => self.ping_all(),
            }
        }

        // Dropping the frame senders closes every socket task's queue.
        self.connections.clear();
        tracing::debug!(worker = self.id.0, "worker stopped");
    }

    /// Pushes `frame` onto every subscriber of `channel`.
    fn deliver(&mut self, channel: ChannelId, frame: &bytes::Bytes) {
        let mut dead: Vec<ConnectionId> = Vec::new();
        let mut sent = 0u64;

        if let Some(subs) = self.subscribers.get(&channel) {
            for &conn_id in subs {
                let Some(conn) = self.connections.get(&conn_id) else {
                    continue;
                };
                match conn.frames.try_send(Frame::Data(frame.clone())) {
                    Ok(()) => sent += 1,
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!(
                            worker = self.id.0,
                            conn = conn_id.0,
                            "send queue overflow, disconnecting slow consumer"
                        );
                        self.slow_disconnects.add(1, &[]);
                        dead.push(conn_id);
                    },
                    Err(TrySendError::Closed(_)) => dead.push(conn_id),
                }
            }
        }

        for conn in dead {
            self.drop_connection(conn);
        }
        if sent > 0 {
            self.frames_enqueued.add(sent, &[]);
        }
    }

    /// Registers a new socket and posts its station/endpoint request to the
    /// orchestrator.
    fn attach(
        &mut self,
        station: String,
        endpoint: String,
        frames: mpsc::Sender<Frame>,
        reply: &mpsc::Sender<ConnectionId>,
    ) {
        let conn = ConnectionId(self.next_connection);
        self.next_connection += 1;

        self.connections.insert(conn, Connection { frames, channel: None });
        self.connections_gauge.record(self.connections.len() as u64, &[]);
        let _ = reply.try_send(conn);

        if self
            .events
            .send(WorkerEvent::NewListener { worker: self.id, conn, station, endpoint })
            .is_err()
        {
            // Orchestrator is gone; the connection can never be resolved.
            self.connections.remove(&conn);
        }
    }

    /// Applies the orchestrator's answer to a pending registration.
    fn resolve(&mut self, conn: ConnectionId, subscription: Option<Subscription>) {
        let Some(subscription) = subscription else {
            // Unknown station or endpoint: dropping the sender closes the
            // socket.
            self.connections.remove(&conn);
            self.connections_gauge.record(self.connections.len() as u64, &[]);
            return;
        };

        let Some(connection) = self.connections.get_mut(&conn) else {
            // The socket went away while the registration was in flight.
            let _ = self
                .events
                .send(WorkerEvent::ListenerLeft { worker: self.id, channel: subscription.channel });
            return;
        };

        connection.channel = Some(subscription.channel);

        // Primers replay the cached broadcasts, second-last first, each once.
        let mut primer_failed = false;
        for primer in subscription.primers {
            if connection.frames.try_send(Frame::Data(primer)).is_err() {
                primer_failed = true;
                break;
            }
        }

        self.subscribers.entry(subscription.channel).or_default().insert(conn);
        if primer_failed {
            self.drop_connection(conn);
        }
    }

    /// Removes a connection from the worker and from every channel it was
    /// subscribed to.
    fn drop_connection(&mut self, conn: ConnectionId) {
        let Some(connection) = self.connections.remove(&conn) else {
            return;
        };
        self.connections_gauge.record(self.connections.len() as u64, &[]);

        if let Some(channel) = connection.channel {
            if let Some(subs) = self.subscribers.get_mut(&channel) {
                subs.remove(&conn);
            }
            let _ = self.events.send(WorkerEvent::ListenerLeft { worker: self.id, channel });
        }
    }

    /// Queues a ping on every connection. A full queue is left alone - the
    /// connection is already drowning in frames and the next broadcast will
    /// settle its fate.
    fn ping_all(&mut self) {
        let mut dead: Vec<ConnectionId> = Vec::new();
        for (&conn_id, conn) in &self.connections {
            if let Err(TrySendError::Closed(_)) = conn.frames.try_send(Frame::Ping) {
                dead.push(conn_id);
            }
        }
        for conn in dead {
            self.drop_connection(conn);
        }
    }
}
