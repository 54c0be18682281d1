// SPDX-FileCopyrightText: © 2026 Airwave Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The per-station producer.
//!
//! Each station owns one directory of `*.opus` tracks and runs as its own
//! actor: a broadcast tick paces chunk emission against wall clock, commands
//! arrive from the orchestrator, and directory events arrive from the
//! watcher. File I/O is delegated to the orchestrator - the station asks for
//! a track's bytes and keeps ticking until they arrive.
//!
//! Two clocks drive pacing. `finish_time` is the wall-clock instant the last
//! loaded track will have finished playing; when less than one broadcast
//! interval remains, the next track is selected and requested.
//! `playback_time` advances by exactly one chunk duration per emission and
//! never rewinds.

use std::collections::{HashSet, VecDeque};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use bytes::Bytes;
use rand::Rng;
use tokio::time::{interval, Instant, MissedTickBehavior};

use airwave_api::{AudioFramePayload, MetadataPayload, PagePayload};
use airwave_core::error::{AirwaveError, Result};
use airwave_core::{MailboxReceiver, MailboxSender, StationId, BROADCAST_INTERVAL_MS};
use airwave_media::{assemble_chunks, parse_track, Chunk};

use crate::messages::{
    ControlResponse, DirEvent, StationCommand, StationEvent,
};

/// How many recently played track indices are excluded from random
/// selection, once the library is at least this large.
const RECENT_TRACK_MEMORY: usize = 10;

pub(crate) struct StationEngine {
    id: StationId,
    name: String,
    dir: PathBuf,
    track_list: Vec<String>,
    track_set: HashSet<String>,
    queue: VecDeque<String>,
    queued_set: HashSet<String>,
    recent_indices: VecDeque<usize>,
    chunks: VecDeque<Chunk>,
    /// Name of the track whose file is currently being loaded.
    processing_track: Option<String>,
    playback_time: Instant,
    finish_time: Instant,
    skip_voters: HashSet<IpAddr>,
    current_title: Option<String>,
    events: MailboxSender<StationEvent>,
}

impl StationEngine {
    pub(crate) fn new(
        id: StationId,
        name: String,
        dir: PathBuf,
        tracks: Vec<String>,
        events: MailboxSender<StationEvent>,
    ) -> Self {
        let track_set = tracks.iter().cloned().collect();
        let now = Instant::now();
        Self {
            id,
            name,
            dir,
            track_list: tracks,
            track_set,
            queue: VecDeque::new(),
            queued_set: HashSet::new(),
            recent_indices: VecDeque::new(),
            chunks: VecDeque::new(),
            processing_track: None,
            playback_time: now,
            finish_time: now,
            skip_voters: HashSet::new(),
            current_title: None,
            events,
        }
    }

    /// The station actor loop.
    pub(crate) async fn run(
        mut self,
        mut commands: MailboxReceiver<StationCommand>,
        mut dir_events: MailboxReceiver<DirEvent>,
    ) {
        tracing::info!(station = %self.name, "station engine started");

        let mut ticker = interval(Duration::from_millis(BROADCAST_INTERVAL_MS));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let now = Instant::now();
        self.playback_time = now;
        self.finish_time = now;

        loop {
            let step = tokio::select! {
                // Commands win over the tick so a kill lands promptly.
                biased;

                cmd = commands.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    // The orchestrator is gone; nothing left to broadcast to.
                    None => Ok(false),
                },
                Some(event) = dir_events.recv() => {
                    self.handle_dir_event(event);
                    Ok(true)
                },
                _ = ticker.tick() => self.broadcast_routine().map(|()| true),
            };

            match step {
                Ok(true) => {},
                Ok(false) => break,
                Err(e) => {
                    tracing::error!(station = %self.name, error = %e, "station engine is fatal");
                    let _ = self.events.send(StationEvent::Fatal {
                        station: self.id,
                        reason: e.to_string(),
                    });
                    break;
                },
            }
        }

        tracing::info!(station = %self.name, "station engine stopped");
    }

    /// Returns `Ok(false)` when the engine should exit.
    fn handle_command(&mut self, command: StationCommand) -> Result<bool> {
        match command {
            StationCommand::FileReady { path, bytes } => {
                self.process_audio(&path, &bytes)?;
            },
            StationCommand::FileFailed { path } => {
                tracing::warn!(station = %self.name, path = %path.display(), "track file failed to load");
                self.processing_track = None;
            },
            StationCommand::ListRequest { reply } => {
                let _ = reply.try_send(ControlResponse::TrackList {
                    slash_separated: self.track_list.join("/"),
                    tracks: self.track_list.clone(),
                });
            },
            StationCommand::QueueList { reply } => {
                let _ = reply.try_send(ControlResponse::Queue(self.queue.iter().cloned().collect()));
            },
            StationCommand::QueueRequest { track, reply } => {
                let _ = reply.try_send(ControlResponse::Queued(self.admit_queue_request(track)));
            },
            StationCommand::SkipRequest { ip, reply } => {
                let _ = reply.try_send(ControlResponse::Skip(self.admit_skip_vote(ip)));
            },
            StationCommand::Kill => return Ok(false),
        }
        Ok(true)
    }

    /// Admits a track request iff the track exists and is not already
    /// queued; returns the accepted title.
    fn admit_queue_request(&mut self, track: String) -> Option<String> {
        if self.track_set.contains(&track) && !self.queued_set.contains(&track) {
            self.queued_set.insert(track.clone());
            self.queue.push_back(track.clone());
            tracing::debug!(station = %self.name, track = %track, "track queued");
            Some(track)
        } else {
            None
        }
    }

    /// One vote per source IP per track; the set clears on track change.
    fn admit_skip_vote(&mut self, ip: IpAddr) -> bool {
        let counted = self.skip_voters.insert(ip);
        if counted {
            tracing::debug!(
                station = %self.name,
                votes = self.skip_voters.len(),
                "skip vote counted"
            );
        }
        counted
    }

    fn handle_dir_event(&mut self, event: DirEvent) {
        match event {
            DirEvent::Added(track) => {
                if self.track_set.insert(track.clone()) {
                    self.track_list.push(track.clone());
                    let _ = self.events.send(StationEvent::ListChanged {
                        station: self.id,
                        added: true,
                        track,
                    });
                }
            },
            DirEvent::Removed(track) => {
                if self.track_set.remove(&track) {
                    self.track_list.retain(|t| t != &track);
                    let _ = self.events.send(StationEvent::ListChanged {
                        station: self.id,
                        added: false,
                        track,
                    });
                }
            },
        }
    }

    /// One broadcast tick: request the next track when the pipeline is about
    /// to run dry, and emit the oldest finished chunk.
    fn broadcast_routine(&mut self) -> Result<()> {
        let now = Instant::now();
        let about_to_run_dry =
            now + Duration::from_millis(BROADCAST_INTERVAL_MS) >= self.finish_time;

        if self.chunks.is_empty() && self.processing_track.is_none() && about_to_run_dry {
            self.request_next_track()?;
        }

        if let Some(chunk) = self.chunks.pop_front() {
            self.emit(&chunk);
        }
        Ok(())
    }

    /// Picks the next track and asks the orchestrator for its file.
    ///
    /// User requests drain first (skipping tracks that have since
    /// disappeared); otherwise selection is uniform at random, avoiding the
    /// last ten picks once the library is big enough.
    fn request_next_track(&mut self) -> Result<()> {
        let mut selected = None;
        while let Some(track) = self.queue.pop_front() {
            self.queued_set.remove(&track);
            if self.track_set.contains(&track) {
                selected = Some(track);
                break;
            }
        }

        let track = match selected {
            Some(track) => track,
            None => {
                if self.track_list.is_empty() {
                    return Err(AirwaveError::Station(format!(
                        "no opus files in the audio directory {}",
                        self.dir.display()
                    )));
                }
                let idx = pick_index(
                    self.track_list.len(),
                    &self.recent_indices,
                    &mut rand::rng(),
                );
                if self.track_list.len() >= RECENT_TRACK_MEMORY {
                    if self.recent_indices.len() == RECENT_TRACK_MEMORY {
                        self.recent_indices.pop_front();
                    }
                    self.recent_indices.push_back(idx);
                }
                self.track_list[idx].clone()
            },
        };

        let path = self.dir.join(format!("{track}.opus"));
        self.processing_track = Some(track);
        let _ = self.events.send(StationEvent::FileRequest { station: self.id, path });
        Ok(())
    }

    /// Chops a loaded track into chunks and extends the fifo.
    fn process_audio(&mut self, path: &std::path::Path, bytes: &Bytes) -> Result<()> {
        let title = self
            .processing_track
            .take()
            .or_else(|| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_default();

        let pages = match parse_track(bytes) {
            Ok(pages) => pages,
            Err(e) => {
                tracing::warn!(station = %self.name, track = %title, error = %e, "unparseable track, skipping");
                return Ok(());
            },
        };

        let new_chunks = assemble_chunks(pages, &title);
        let Some(total_ms) = new_chunks.first().map(|c| c.total_length_ms) else {
            tracing::warn!(station = %self.name, track = %title, "track has no playable pages, skipping");
            return Ok(());
        };

        tracing::info!(
            station = %self.name,
            track = %title,
            duration_ms = total_ms,
            chunks = new_chunks.len(),
            "track loaded"
        );

        let was_empty = self.chunks.is_empty();
        self.finish_time += Duration::from_millis(total_ms);
        self.chunks.extend(new_chunks);

        self.broadcast_routine()?;
        if was_empty {
            // Right at the start (or after running dry) emit a second chunk
            // immediately so new listeners have a primer pair.
            self.broadcast_routine()?;
        }
        Ok(())
    }

    /// Serializes and posts one chunk, advancing the playback clock.
    fn emit(&mut self, chunk: &Chunk) {
        let audio = AudioFramePayload {
            duration: chunk.duration_ms,
            start_offset: chunk.start_offset_ms,
            pages: chunk
                .pages
                .iter()
                .map(|p| PagePayload { duration: p.duration_ms, buff: p.bytes.to_vec() })
                .collect(),
        };
        let metadata = MetadataPayload {
            duration: chunk.duration_ms,
            start_offset: chunk.start_offset_ms,
            total_length: chunk.total_length_ms,
            title: chunk.title.clone(),
        };

        let (Ok(audio), Ok(metadata)) =
            (serde_json::to_string(&audio), serde_json::to_string(&metadata))
        else {
            tracing::error!(station = %self.name, "chunk payload failed to serialize");
            return;
        };

        self.playback_time += Duration::from_millis(chunk.duration_ms);
        if self.current_title.as_deref() != Some(chunk.title.as_str()) {
            self.current_title = Some(chunk.title.clone());
            self.skip_voters.clear();
        }

        let headroom = self.playback_time.saturating_duration_since(Instant::now());
        tracing::debug!(
            station = %self.name,
            chunk_ms = chunk.duration_ms,
            headroom_ms = headroom.as_millis() as u64,
            "broadcasting chunk"
        );

        let _ = self.events.send(StationEvent::Broadcast {
            station: self.id,
            audio: Bytes::from(audio),
            metadata: Bytes::from(metadata),
        });
    }
}

/// Uniform random pick over `0..len`, excluding `recent` once the library
/// holds at least [`RECENT_TRACK_MEMORY`] tracks.
fn pick_index(len: usize, recent: &VecDeque<usize>, rng: &mut impl Rng) -> usize {
    if len < RECENT_TRACK_MEMORY {
        return rng.random_range(0..len);
    }
    loop {
        let idx = rng.random_range(0..len);
        if !recent.contains(&idx) {
            return idx;
        }
    }
}
