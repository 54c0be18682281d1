// SPDX-FileCopyrightText: © 2026 Airwave Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Identifier types shared across the broadcaster.
//!
//! Everything that crosses a task boundary is addressed by a small copyable
//! id into a flat registry rather than by reference. Stations and workers are
//! registered once at startup, so their ids are plain indices; connection ids
//! are a per-worker 64-bit counter that is never recycled, which makes a
//! stale reference to a closed connection impossible to confuse with a live
//! one.

use serde::{Deserialize, Serialize};

/// Index of a station in the orchestrator's registry (registration order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StationId(pub usize);

/// Index of a worker in the fan-out fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerId(pub usize);

/// A WebSocket connection owned by one worker. Monotonically assigned,
/// never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(pub u64);

/// Slot index into the [`crate::BufferStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BufferId(pub usize);

/// A broadcast channel: one (station, endpoint-kind) pair.
///
/// Station `S` (0-based) owns channel `2S` for the audio payload stream and
/// channel `2S + 1` for metadata-only subscribers. Subscribers of a channel
/// all receive identical frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId(pub usize);

impl ChannelId {
    /// The audio payload channel of a station.
    pub const fn audio(station: StationId) -> Self {
        Self(station.0 * 2)
    }

    /// The metadata-only channel of a station.
    pub const fn metadata(station: StationId) -> Self {
        Self(station.0 * 2 + 1)
    }

    /// The station this channel belongs to.
    pub const fn station(self) -> StationId {
        StationId(self.0 / 2)
    }

    /// Whether this is a metadata-only channel.
    pub const fn is_metadata(self) -> bool {
        self.0 % 2 == 1
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
