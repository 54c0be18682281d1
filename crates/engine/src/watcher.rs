// SPDX-FileCopyrightText: © 2026 Airwave Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Directory-change notification source.
//!
//! Rescans a station's audio directory on an interval and diffs the `.opus`
//! file set against the previous scan, posting `Added`/`Removed` events to
//! the station's mailbox. The station only consumes the event stream, so
//! this polling implementation can be swapped for a kernel-level watcher
//! without touching the engine.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tokio::time::{interval, MissedTickBehavior};

use airwave_core::MailboxSender;

use crate::constants::DIR_RESCAN_INTERVAL;
use crate::messages::DirEvent;

/// File extension a track must carry to be part of a station's library.
pub(crate) const TRACK_EXTENSION: &str = "opus";

/// Lists the track names (no extension) currently present in `dir`.
pub(crate) async fn scan(dir: &Path) -> std::io::Result<HashSet<String>> {
    let mut names = HashSet::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some(TRACK_EXTENSION) {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.insert(stem.to_string());
            }
        }
    }
    Ok(names)
}

/// Watches `dir` until the station's mailbox closes.
pub(crate) async fn watch(dir: PathBuf, known: HashSet<String>, events: MailboxSender<DirEvent>) {
    let mut known = known;
    let mut ticker = interval(DIR_RESCAN_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick fires immediately and would re-diff the initial scan.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if events.is_closed() {
            break;
        }

        let current = match scan(&dir).await {
            Ok(current) => current,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "directory rescan failed");
                continue;
            },
        };

        for added in current.difference(&known) {
            if events.send(DirEvent::Added(added.clone())).is_err() {
                return;
            }
        }
        for removed in known.difference(&current) {
            if events.send(DirEvent::Removed(removed.clone())).is_err() {
                return;
            }
        }
        known = current;
    }
}
