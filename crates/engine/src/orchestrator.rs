// SPDX-FileCopyrightText: © 2026 Airwave Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The orchestrator.
//!
//! One loop owns the station registry and the worker fleet. It reads track
//! files on the stations' behalf, wraps every finished chunk into the buffer
//! store with a refcount equal to the worker count, keeps the two most
//! recent frames per channel as primers for new listeners, and routes the
//! listener control surface (station list, track list, queue, skip) to the
//! owning station.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use futures::stream::{SelectAll, StreamExt};
use opentelemetry::metrics::{Counter, Gauge};
use tokio::sync::mpsc;

use airwave_api::{ENDPOINT_AUDIO, ENDPOINT_METADATA};
use airwave_core::{
    BufferStore, ChannelId, MailboxReceiver, MailboxSender, StationId,
};

use crate::messages::{
    ControlRequest, ControlResponse, StationCommand, StationEvent, Subscription, WorkerEvent,
    WorkerMessage,
};

/// A registered station, addressed by its id.
pub(crate) struct StationEntry {
    pub(crate) name: String,
    pub(crate) commands: MailboxSender<StationCommand>,
    pub(crate) alive: bool,
}

/// The last two frames broadcast on one channel, replayed to new
/// subscribers. `second_last` is empty until the second broadcast.
#[derive(Default)]
struct ChannelCache {
    last: Option<Bytes>,
    second_last: Option<Bytes>,
}

/// File-read completions from the spawned read tasks.
pub(crate) enum IoEvent {
    FileLoaded { station: StationId, path: PathBuf, result: std::io::Result<Vec<u8>> },
}

pub(crate) struct Orchestrator {
    stations: Vec<StationEntry>,
    station_ids: HashMap<String, StationId>,
    workers: Vec<MailboxSender<WorkerMessage>>,
    store: Arc<BufferStore>,
    caches: Vec<ChannelCache>,
    /// Subscriber count per channel, maintained from worker notices.
    listeners: Vec<usize>,
    io_tx: mpsc::UnboundedSender<IoEvent>,
    // Telemetry
    broadcasts_counter: Counter<u64>,
    buffers_live_gauge: Gauge<u64>,
}

impl Orchestrator {
    pub(crate) fn new(
        stations: Vec<StationEntry>,
        workers: Vec<MailboxSender<WorkerMessage>>,
        store: Arc<BufferStore>,
        io_tx: mpsc::UnboundedSender<IoEvent>,
    ) -> Self {
        let meter = opentelemetry::global::meter("airwave_orchestrator");
        let broadcasts_counter = meter
            .u64_counter("orchestrator.broadcasts")
            .with_description("Chunks fanned out to the worker fleet")
            .build();
        let buffers_live_gauge = meter
            .u64_gauge("orchestrator.buffers_live")
            .with_description("Broadcast buffers awaiting release")
            .build();

        let station_ids = stations
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.clone(), StationId(i)))
            .collect();
        let channels = stations.len() * 2;

        Self {
            stations,
            station_ids,
            workers,
            store,
            caches: (0..channels).map(|_| ChannelCache::default()).collect(),
            listeners: vec![0; channels],
            io_tx,
            broadcasts_counter,
            buffers_live_gauge,
        }
    }

    /// The orchestrator loop.
    pub(crate) async fn run(
        mut self,
        mut station_events: SelectAll<MailboxReceiver<StationEvent>>,
        mut worker_events: SelectAll<MailboxReceiver<WorkerEvent>>,
        mut control_rx: mpsc::UnboundedReceiver<ControlRequest>,
        mut io_rx: mpsc::UnboundedReceiver<IoEvent>,
    ) {
        tracing::info!(
            stations = self.stations.len(),
            workers = self.workers.len(),
            "orchestrator started"
        );

        loop {
            tokio::select! {
                Some(request) = control_rx.recv() => {
                    if !self.handle_control(request) {
                        break;
                    }
                },
                Some(event) = station_events.next() => self.handle_station_event(event),
                Some(event) = worker_events.next() => self.handle_worker_event(event),
                Some(io) = io_rx.recv() => self.handle_io(io),
                else => break,
            }
        }

        // Kill walk: stations drain first, then the workers drop their
        // connections.
        for station in &self.stations {
            let _ = station.commands.send(StationCommand::Kill);
        }
        for worker in &self.workers {
            let _ = worker.send(WorkerMessage::Shutdown);
        }
        tracing::info!("orchestrator stopped");
    }

    /// Returns `false` when a shutdown was requested.
    fn handle_control(&mut self, request: ControlRequest) -> bool {
        match request {
            ControlRequest::StationList { reply } => {
                let stations = self.stations.iter().map(|s| s.name.clone()).collect();
                let _ = reply.try_send(ControlResponse::Stations(stations));
            },
            ControlRequest::TrackList { station, reply } => {
                self.route(&station, reply, |reply| StationCommand::ListRequest { reply });
            },
            ControlRequest::QueueList { station, reply } => {
                self.route(&station, reply, |reply| StationCommand::QueueList { reply });
            },
            ControlRequest::QueueTrack { station, track, reply } => {
                self.route(&station, reply, move |reply| StationCommand::QueueRequest {
                    track,
                    reply,
                });
            },
            ControlRequest::SkipVote { station, ip, reply } => {
                self.route(&station, reply, move |reply| StationCommand::SkipRequest {
                    ip,
                    reply,
                });
            },
            ControlRequest::Shutdown => return false,
        }
        true
    }

    /// Forwards a request to the named station, passing the reply sender
    /// straight through so the station answers the requester directly.
    fn route(
        &self,
        station: &str,
        reply: mpsc::Sender<ControlResponse>,
        command: impl FnOnce(mpsc::Sender<ControlResponse>) -> StationCommand,
    ) {
        let entry = self
            .station_ids
            .get(station)
            .and_then(|id| self.stations.get(id.0))
            .filter(|entry| entry.alive);

        match entry {
            Some(entry) => {
                if entry.commands.send(command(reply.clone())).is_err() {
                    let _ = reply.try_send(ControlResponse::UnknownStation);
                }
            },
            None => {
                let _ = reply.try_send(ControlResponse::UnknownStation);
            },
        }
    }

    fn handle_station_event(&mut self, event: StationEvent) {
        match event {
            StationEvent::FileRequest { station, path } => {
                let io_tx = self.io_tx.clone();
                tokio::spawn(async move {
                    let result = tokio::fs::read(&path).await;
                    let _ = io_tx.send(IoEvent::FileLoaded { station, path, result });
                });
            },
            StationEvent::Broadcast { station, audio, metadata } => {
                self.fan_out(ChannelId::audio(station), audio);
                self.fan_out(ChannelId::metadata(station), metadata);
                self.buffers_live_gauge.record(self.store.len() as u64, &[]);
            },
            StationEvent::ListChanged { station, added, track } => {
                let name = self.station_name(station);
                tracing::info!(station = %name, track = %track, added, "track list changed");
            },
            StationEvent::Fatal { station, reason } => {
                let name = self.station_name(station).to_string();
                tracing::error!(station = %name, reason = %reason, "station died");
                if let Some(entry) = self.stations.get_mut(station.0) {
                    entry.alive = false;
                }
            },
        }
    }

    /// Inserts one serialized frame with `uses = worker_count`, rotates the
    /// channel's primer cache and posts a handle to every worker.
    fn fan_out(&mut self, channel: ChannelId, frame: Bytes) {
        let cache = &mut self.caches[channel.0];
        cache.second_last = cache.last.take();
        cache.last = Some(frame.clone());

        if self.workers.is_empty() {
            return;
        }

        let buffer = self.store.insert(frame.clone(), self.workers.len());
        for worker in &self.workers {
            if worker
                .send(WorkerMessage::Broadcast { buffer, frame: frame.clone(), channel })
                .is_err()
            {
                // A dead worker can never release its handle; consume its
                // use so the buffer still frees.
                self.store.release(buffer);
            }
        }
        self.broadcasts_counter.add(1, &[]);
    }

    fn handle_worker_event(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::NewListener { worker, conn, station, endpoint } => {
                let subscription = self.resolve_listener(&station, &endpoint);
                if let Some(sub) = &subscription {
                    self.listeners[sub.channel.0] += 1;
                    tracing::info!(
                        station = %station,
                        endpoint = %endpoint,
                        channel = %sub.channel,
                        listeners = self.listeners[sub.channel.0],
                        "listener joined"
                    );
                } else {
                    tracing::debug!(
                        station = %station,
                        endpoint = %endpoint,
                        "rejecting listener for unknown station or endpoint"
                    );
                }
                if let Some(entry) = self.workers.get(worker.0) {
                    let _ = entry.send(WorkerMessage::ListenerResolved { conn, subscription });
                }
            },
            WorkerEvent::ListenerLeft { worker: _, channel } => {
                if let Some(count) = self.listeners.get_mut(channel.0) {
                    *count = count.saturating_sub(1);
                    tracing::info!(channel = %channel, listeners = *count, "listener left");
                }
            },
        }
    }

    /// Resolves `station/endpoint` to a channel and primer frames. The
    /// primer order is second-last first; an empty slot is skipped, so a
    /// channel with a single broadcast behind it yields one primer.
    fn resolve_listener(&self, station: &str, endpoint: &str) -> Option<Subscription> {
        let id = *self.station_ids.get(station)?;
        let channel = match endpoint {
            ENDPOINT_AUDIO => ChannelId::audio(id),
            ENDPOINT_METADATA => ChannelId::metadata(id),
            _ => return None,
        };
        let cache = &self.caches[channel.0];
        let primers =
            [cache.second_last.clone(), cache.last.clone()].into_iter().flatten().collect();
        Some(Subscription { channel, primers })
    }

    fn handle_io(&mut self, event: IoEvent) {
        match event {
            IoEvent::FileLoaded { station, path, result } => {
                let Some(entry) = self.stations.get(station.0) else { return };
                let command = match result {
                    Ok(bytes) => {
                        StationCommand::FileReady { path, bytes: Bytes::from(bytes) }
                    },
                    Err(e) => {
                        tracing::warn!(
                            station = %entry.name,
                            path = %path.display(),
                            error = %e,
                            "track read failed"
                        );
                        StationCommand::FileFailed { path }
                    },
                };
                let _ = entry.commands.send(command);
            },
        }
    }

    fn station_name(&self, station: StationId) -> &str {
        self.stations.get(station.0).map_or("?", |s| s.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use airwave_core::mailbox;
    use futures::stream::select_all;

    struct Fixture {
        orch: Orchestrator,
        station_cmd_rx: MailboxReceiver<StationCommand>,
        worker_rxs: Vec<MailboxReceiver<WorkerMessage>>,
        store: Arc<BufferStore>,
    }

    fn fixture(worker_count: usize) -> Fixture {
        let (cmd_tx, cmd_rx) = mailbox();
        let stations =
            vec![StationEntry { name: "test".into(), commands: cmd_tx, alive: true }];

        let mut worker_txs = Vec::new();
        let mut worker_rxs = Vec::new();
        for _ in 0..worker_count {
            let (tx, rx) = mailbox();
            worker_txs.push(tx);
            worker_rxs.push(rx);
        }

        let store = Arc::new(BufferStore::new());
        let (io_tx, _io_rx) = mpsc::unbounded_channel();
        Fixture {
            orch: Orchestrator::new(stations, worker_txs, store.clone(), io_tx),
            station_cmd_rx: cmd_rx,
            worker_rxs,
            store,
        }
    }

    #[tokio::test]
    async fn broadcast_inserts_with_refcount_equal_to_worker_count() {
        let mut fix = fixture(4);
        fix.orch.handle_station_event(StationEvent::Broadcast {
            station: StationId(0),
            audio: Bytes::from_static(b"audio"),
            metadata: Bytes::from_static(b"meta"),
        });

        // Two artifacts live until each worker releases each once.
        assert_eq!(fix.store.len(), 2);
        let mut released = 0;
        for rx in &mut fix.worker_rxs {
            for msg in rx.drain_ready() {
                if let WorkerMessage::Broadcast { buffer, .. } = msg {
                    fix.store.release(buffer);
                    released += 1;
                }
            }
        }
        assert_eq!(released, 8);
        assert!(fix.store.is_empty());
    }

    #[tokio::test]
    async fn audio_and_metadata_land_on_adjacent_channels() {
        let mut fix = fixture(1);
        fix.orch.handle_station_event(StationEvent::Broadcast {
            station: StationId(0),
            audio: Bytes::from_static(b"audio"),
            metadata: Bytes::from_static(b"meta"),
        });

        let msgs = fix.worker_rxs[0].drain_ready();
        assert_eq!(msgs.len(), 2);
        assert!(matches!(
            &msgs[0],
            WorkerMessage::Broadcast { channel: ChannelId(0), frame, .. } if frame.as_ref() == b"audio"
        ));
        assert!(matches!(
            &msgs[1],
            WorkerMessage::Broadcast { channel: ChannelId(1), frame, .. } if frame.as_ref() == b"meta"
        ));
    }

    #[tokio::test]
    async fn primer_cache_holds_the_last_two_broadcasts() {
        let mut fix = fixture(1);
        for body in [&b"one"[..], b"two", b"three"] {
            fix.orch.handle_station_event(StationEvent::Broadcast {
                station: StationId(0),
                audio: Bytes::copy_from_slice(body),
                metadata: Bytes::from_static(b"m"),
            });
        }

        let sub = fix.orch.resolve_listener("test", ENDPOINT_AUDIO).expect("known station");
        assert_eq!(sub.channel, ChannelId(0));
        let primers: Vec<&[u8]> = sub.primers.iter().map(AsRef::as_ref).collect();
        assert_eq!(primers, vec![&b"two"[..], b"three"]);
    }

    #[tokio::test]
    async fn single_broadcast_yields_a_single_primer() {
        let mut fix = fixture(1);
        fix.orch.handle_station_event(StationEvent::Broadcast {
            station: StationId(0),
            audio: Bytes::from_static(b"only"),
            metadata: Bytes::from_static(b"m"),
        });

        let sub = fix.orch.resolve_listener("test", ENDPOINT_AUDIO).expect("known station");
        assert_eq!(sub.primers.len(), 1);
        assert_eq!(sub.primers[0].as_ref(), b"only");
    }

    #[tokio::test]
    async fn unknown_station_or_endpoint_is_rejected() {
        let fix = fixture(1);
        assert!(fix.orch.resolve_listener("nope", ENDPOINT_AUDIO).is_none());
        assert!(fix.orch.resolve_listener("test", "something_else").is_none());
        // Before any broadcast the subscription exists with no primers.
        let sub = fix.orch.resolve_listener("test", ENDPOINT_METADATA).expect("known station");
        assert!(sub.primers.is_empty());
    }

    #[tokio::test]
    async fn control_requests_route_to_the_station() {
        let mut fix = fixture(1);
        let (reply_tx, mut reply_rx) = mpsc::channel(1);
        fix.orch.handle_control(ControlRequest::TrackList {
            station: "test".into(),
            reply: reply_tx,
        });
        assert!(matches!(
            fix.station_cmd_rx.recv().await,
            Some(StationCommand::ListRequest { .. })
        ));
        assert!(reply_rx.try_recv().is_err());

        let (reply_tx, mut reply_rx) = mpsc::channel(1);
        fix.orch.handle_control(ControlRequest::TrackList {
            station: "unknown".into(),
            reply: reply_tx,
        });
        assert_eq!(reply_rx.try_recv().ok(), Some(ControlResponse::UnknownStation));
    }

    #[tokio::test]
    async fn listener_counts_follow_join_and_leave() {
        let mut fix = fixture(1);
        fix.orch.handle_worker_event(WorkerEvent::NewListener {
            worker: airwave_core::WorkerId(0),
            conn: airwave_core::ConnectionId(0),
            station: "test".into(),
            endpoint: ENDPOINT_AUDIO.into(),
        });
        assert_eq!(fix.orch.listeners[0], 1);

        // The worker was told about the resolution.
        let msgs = fix.worker_rxs[0].drain_ready();
        assert!(matches!(
            msgs.as_slice(),
            [WorkerMessage::ListenerResolved { subscription: Some(_), .. }]
        ));

        fix.orch.handle_worker_event(WorkerEvent::ListenerLeft {
            worker: airwave_core::WorkerId(0),
            channel: ChannelId(0),
        });
        assert_eq!(fix.orch.listeners[0], 0);
    }

    #[tokio::test]
    async fn shutdown_walks_stations_then_workers() {
        let fix = fixture(2);
        let (_control_tx, control_rx) = mpsc::unbounded_channel::<ControlRequest>();
        let (_io_tx2, io_rx) = mpsc::unbounded_channel();

        // Run the loop with no event sources; closing control_rx by sending
        // Shutdown ends it.
        let orch = fix.orch;
        let mut station_cmd_rx = fix.station_cmd_rx;
        let mut worker_rxs = fix.worker_rxs;

        let handle = tokio::spawn(orch.run(
            select_all(Vec::<MailboxReceiver<StationEvent>>::new()),
            select_all(Vec::<MailboxReceiver<WorkerEvent>>::new()),
            control_rx,
            io_rx,
        ));
        _control_tx.send(ControlRequest::Shutdown).expect("orchestrator is alive");
        handle.await.expect("orchestrator exits cleanly");

        assert!(matches!(station_cmd_rx.recv().await, Some(StationCommand::Kill)));
        for rx in &mut worker_rxs {
            assert!(matches!(rx.recv().await, Some(WorkerMessage::Shutdown)));
        }
    }
}
