// SPDX-FileCopyrightText: © 2026 Airwave Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Message types for the engine's mailbox plane.
//!
//! Every event that crosses a task boundary is one of the tagged enums here.
//! Request/response pairs carry a capacity-1 reply sender; the replying actor
//! uses `try_send`, so a requester that gave up (or a full reply slot) never
//! blocks an actor loop.

use std::net::IpAddr;
use std::path::PathBuf;

use bytes::Bytes;
use tokio::sync::mpsc;

use airwave_core::{BufferId, ChannelId, ConnectionId, StationId, WorkerId};

/// Reply sender for a control round trip.
pub type Reply<T> = mpsc::Sender<T>;

// --- Listener control surface (HTTP layer -> orchestrator) ---

/// Requests posted by the HTTP layer into the orchestrator.
#[derive(Debug)]
pub enum ControlRequest {
    /// `/station_list`
    StationList { reply: Reply<ControlResponse> },
    /// `/audio_list/<station>`
    TrackList { station: String, reply: Reply<ControlResponse> },
    /// `/audio_queue/<station>`
    QueueList { station: String, reply: Reply<ControlResponse> },
    /// `/audio_req/<station>/<track>`
    QueueTrack { station: String, track: String, reply: Reply<ControlResponse> },
    /// `/skip_track/<station>`, one vote per source IP per track
    SkipVote { station: String, ip: IpAddr, reply: Reply<ControlResponse> },
    /// Begin the kill walk: stations drain, workers drop their connections,
    /// the orchestrator exits.
    Shutdown,
}

/// Replies to [`ControlRequest`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlResponse {
    Stations(Vec<String>),
    TrackList { slash_separated: String, tracks: Vec<String> },
    Queue(Vec<String>),
    /// The accepted title, or `None` when the request was rejected.
    Queued(Option<String>),
    /// Whether the skip vote was counted.
    Skip(bool),
    UnknownStation,
}

// --- Station engine mailboxes ---

/// Commands into a station engine. The orchestrator is the only producer.
#[derive(Debug)]
pub enum StationCommand {
    /// The bytes of a previously requested track file.
    FileReady { path: PathBuf, bytes: Bytes },
    /// The requested track file could not be read.
    FileFailed { path: PathBuf },
    ListRequest { reply: Reply<ControlResponse> },
    QueueList { reply: Reply<ControlResponse> },
    QueueRequest { track: String, reply: Reply<ControlResponse> },
    SkipRequest { ip: IpAddr, reply: Reply<ControlResponse> },
    Kill,
}

/// Directory-change notifications (watcher -> station). Names arrive with
/// the `.opus` extension already stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirEvent {
    Added(String),
    Removed(String),
}

/// Events out of a station engine toward the orchestrator.
#[derive(Debug)]
pub enum StationEvent {
    /// Ask the orchestrator to read a track file on the station's behalf.
    FileRequest { station: StationId, path: PathBuf },
    /// A finished chunk, serialized once per endpoint kind.
    Broadcast { station: StationId, audio: Bytes, metadata: Bytes },
    /// The track list changed (directory scan picked up a change).
    ListChanged { station: StationId, added: bool, track: String },
    /// The station cannot continue (e.g. empty audio directory at tick
    /// time) and its task is exiting.
    Fatal { station: StationId, reason: String },
}

// --- Worker mailboxes ---

/// Messages into a worker from the orchestrator.
#[derive(Debug)]
pub enum WorkerMessage {
    /// Deliver `frame` to every subscriber of `channel`, then release
    /// `buffer` exactly once - also when there are no subscribers.
    Broadcast { buffer: BufferId, frame: Bytes, channel: ChannelId },
    /// Resolution of a previously posted new-listener registration.
    /// `None` closes the connection (unknown station or endpoint).
    ListenerResolved { conn: ConnectionId, subscription: Option<Subscription> },
    Shutdown,
}

/// A resolved subscription: the channel plus up to two primer frames
/// (second-last first) replayed so the stream starts without a dead
/// interval.
#[derive(Debug)]
pub struct Subscription {
    pub channel: ChannelId,
    pub primers: Vec<Bytes>,
}

/// Connection lifecycle requests into a worker from the WebSocket tasks.
#[derive(Debug)]
pub enum ConnectionRequest {
    /// A freshly upgraded socket hands over its outbound frame queue.
    Attach {
        station: String,
        endpoint: String,
        frames: mpsc::Sender<Frame>,
        reply: Reply<ConnectionId>,
    },
    /// The socket is gone; forget the connection.
    Detach { conn: ConnectionId },
}

/// Events out of a worker toward the orchestrator.
#[derive(Debug)]
pub enum WorkerEvent {
    /// A new subscriber asked for `station`/`endpoint`; the orchestrator
    /// answers with [`WorkerMessage::ListenerResolved`].
    NewListener { worker: WorkerId, conn: ConnectionId, station: String, endpoint: String },
    /// A connection left the given channel.
    ListenerLeft { worker: WorkerId, channel: ChannelId },
}

/// Frames queued toward one connection; written strictly in order.
#[derive(Debug, Clone)]
pub enum Frame {
    /// A broadcast payload (JSON in a text frame).
    Data(Bytes),
    /// A WebSocket ping.
    Ping,
}
