// SPDX-FileCopyrightText: © 2026 Airwave Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Shared timing and capacity constants for the broadcast engine.

use std::time::Duration;

/// How often each worker pings every WebSocket connection it holds.
pub const WS_PING_INTERVAL: Duration = Duration::from_secs(30);

/// Capacity of one connection's outbound frame queue.
///
/// At one chunk per broadcast interval this is close to a minute of audio; a
/// connection that falls this far behind is not going to catch up, so queue
/// overflow disconnects it rather than stalling the station.
pub const CONNECTION_SEND_QUEUE_CAPACITY: usize = 16;

/// Period of the directory rescan that keeps a station's track list in sync
/// with its audio directory.
pub const DIR_RESCAN_INTERVAL: Duration = Duration::from_millis(5000);

/// Capacity of control reply channels. Every control round trip carries its
/// own single-use reply sender.
pub const REPLY_CAPACITY: usize = 1;

/// How long shutdown waits for the actor tasks to drain.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);
