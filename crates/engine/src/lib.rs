// SPDX-FileCopyrightText: © 2026 Airwave Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! engine: The concurrent broadcast engine for Airwave.
//!
//! [`Radio::start`] spawns the whole fleet: one station engine per
//! configured audio directory, a directory watcher beside each, `N` fan-out
//! workers and the one orchestrator that connects them. The HTTP layer
//! talks to the engine through two narrow seams: the control mailbox
//! ([`messages::ControlRequest`]) and the per-worker connection links that
//! WebSocket tasks attach through.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::stream::select_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use airwave_core::error::{AirwaveError, Result};
use airwave_core::{mailbox, BufferStore, StationId, WorkerId};

// --- Public Modules ---

pub mod constants;
pub mod messages;

mod orchestrator;
mod station;
mod watcher;
mod worker;

// Re-exports
pub use messages::{ConnectionRequest, ControlRequest, ControlResponse, Frame};

use orchestrator::{Orchestrator, StationEntry};
use station::StationEngine;
use worker::Worker;

/// One configured station.
#[derive(Debug, Clone)]
pub struct StationSpec {
    /// Display name; normalized with [`normalize_station_name`] for the
    /// wire.
    pub name: String,
    /// Directory of `*.opus` tracks.
    pub dir: PathBuf,
}

/// Engine configuration, already validated by the caller's config layer.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub stations: Vec<StationSpec>,
    /// Worker count (the `SERVER_THREADS` setting).
    pub workers: usize,
}

/// Normalizes a station name for the wire: lowercase, spaces become
/// underscores.
pub fn normalize_station_name(name: &str) -> String {
    name.chars()
        .map(|c| if c == ' ' { '_' } else { c.to_ascii_lowercase() })
        .collect()
}

/// A running broadcast engine.
pub struct Radio {
    control_tx: mpsc::UnboundedSender<ControlRequest>,
    connection_txs: Vec<mpsc::UnboundedSender<ConnectionRequest>>,
    next_worker: AtomicUsize,
    store: Arc<BufferStore>,
    tasks: tokio::sync::Mutex<Option<Vec<JoinHandle<()>>>>,
}

impl Radio {
    /// Validates the station directories and spawns the engine.
    ///
    /// # Errors
    ///
    /// Fails when no station is configured, a directory cannot be scanned,
    /// or a directory holds no `*.opus` files - all fatal at startup.
    pub async fn start(config: EngineConfig) -> Result<Self> {
        if config.stations.is_empty() {
            return Err(AirwaveError::Configuration("no stations configured".into()));
        }
        let worker_count = config.workers.max(1);

        let store = Arc::new(BufferStore::new());
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (io_tx, io_rx) = mpsc::unbounded_channel();

        let mut tasks = Vec::new();
        let mut entries = Vec::new();
        let mut station_event_rxs = Vec::new();
        let mut seen_names = HashSet::new();

        for (i, spec) in config.stations.iter().enumerate() {
            let name = normalize_station_name(&spec.name);
            if !seen_names.insert(name.clone()) {
                return Err(AirwaveError::Configuration(format!(
                    "duplicate station name '{name}'"
                )));
            }

            let tracks = watcher::scan(&spec.dir).await.map_err(|e| {
                AirwaveError::Configuration(format!(
                    "cannot scan audio directory {}: {e}",
                    spec.dir.display()
                ))
            })?;
            if tracks.is_empty() {
                return Err(AirwaveError::Station(format!(
                    "no opus files in the audio directory {}",
                    spec.dir.display()
                )));
            }
            let mut tracks: Vec<String> = tracks.into_iter().collect();
            tracks.sort();

            let (cmd_tx, cmd_rx) = mailbox();
            let (event_tx, event_rx) = mailbox();
            let (dir_tx, dir_rx) = mailbox();

            let initial: HashSet<String> = tracks.iter().cloned().collect();
            let engine = StationEngine::new(
                StationId(i),
                name.clone(),
                spec.dir.clone(),
                tracks,
                event_tx,
            );
            tasks.push(tokio::spawn(engine.run(cmd_rx, dir_rx)));
            tasks.push(tokio::spawn(watcher::watch(spec.dir.clone(), initial, dir_tx)));

            entries.push(StationEntry { name, commands: cmd_tx, alive: true });
            station_event_rxs.push(event_rx);
        }

        let mut worker_txs = Vec::new();
        let mut connection_txs = Vec::new();
        let mut worker_event_rxs = Vec::new();
        for i in 0..worker_count {
            let (msg_tx, msg_rx) = mailbox();
            let (link_tx, link_rx) = mpsc::unbounded_channel();
            let (event_tx, event_rx) = mailbox();

            let worker = Worker::new(WorkerId(i), store.clone(), event_tx);
            tasks.push(tokio::spawn(worker.run(msg_rx, link_rx)));

            worker_txs.push(msg_tx);
            connection_txs.push(link_tx);
            worker_event_rxs.push(event_rx);
        }

        let orchestrator = Orchestrator::new(entries, worker_txs, store.clone(), io_tx);
        tasks.push(tokio::spawn(orchestrator.run(
            select_all(station_event_rxs),
            select_all(worker_event_rxs),
            control_rx,
            io_rx,
        )));

        Ok(Self {
            control_tx,
            connection_txs,
            next_worker: AtomicUsize::new(0),
            store,
            tasks: tokio::sync::Mutex::new(Some(tasks)),
        })
    }

    /// A sender for listener control requests. Cloneable; every HTTP
    /// handler takes one.
    pub fn control(&self) -> mpsc::UnboundedSender<ControlRequest> {
        self.control_tx.clone()
    }

    /// Picks a worker round-robin and returns its connection link for a new
    /// WebSocket.
    pub fn connection_link(&self) -> mpsc::UnboundedSender<ConnectionRequest> {
        let idx = self.next_worker.fetch_add(1, Ordering::Relaxed) % self.connection_txs.len();
        self.connection_txs[idx].clone()
    }

    /// The shared broadcast buffer store (exposed for tests and gauges).
    pub fn buffer_store(&self) -> Arc<BufferStore> {
        self.store.clone()
    }

    /// Sends the kill signal and waits for every task to drain.
    ///
    /// # Errors
    ///
    /// Returns an error if the fleet does not shut down within the timeout
    /// or a task panicked.
    pub async fn shutdown_and_wait(&self) -> std::result::Result<(), String> {
        let _ = self.control_tx.send(ControlRequest::Shutdown);

        let Some(tasks) = self.tasks.lock().await.take() else {
            tracing::warn!("shutdown_and_wait called twice, engine already shut down");
            return Ok(());
        };

        for task in tasks {
            match tokio::time::timeout(constants::SHUTDOWN_TIMEOUT, task).await {
                Ok(Ok(())) => {},
                Ok(Err(e)) => return Err(format!("engine task panicked: {e}")),
                Err(_) => return Err("engine shutdown timeout".to_string()),
            }
        }
        tracing::debug!("engine shut down gracefully");
        Ok(())
    }
}
