// SPDX-FileCopyrightText: © 2026 Airwave Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Airwave Core - Fundamental data structures for the radio broadcaster.
//!
//! This crate defines the pieces every other Airwave crate builds on:
//!
//! - [`error`]: Error types and handling
//! - [`ids`]: Station, channel, worker, connection and buffer identifiers
//! - [`buffer_store`]: Reference-counted broadcast buffer store
//! - [`mailbox`]: Single-producer/single-consumer message mailboxes

// Module declarations
pub mod buffer_store;
pub mod error;
pub mod ids;
pub mod mailbox;

// Convenience re-exports for commonly used types

// Error handling
pub use error::AirwaveError;

// Identifiers
pub use ids::{BufferId, ChannelId, ConnectionId, StationId, WorkerId};

// Fan-out plumbing
pub use buffer_store::BufferStore;
pub use mailbox::{mailbox, MailboxReceiver, MailboxSender};

/// Length of one broadcast chunk. Stations pack Ogg pages into chunks of at
/// least this duration and emit one chunk per interval, so listeners always
/// hold a full interval of headroom.
pub const BROADCAST_INTERVAL_MS: u64 = 3000;
