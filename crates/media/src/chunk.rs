// SPDX-FileCopyrightText: © 2026 Airwave Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Chunk assembly.
//!
//! Pages are packed greedily into chunks until each chunk reaches the
//! broadcast interval; the last chunk of a track is folded into its
//! predecessor when it falls short, so listeners never receive a runt.

use airwave_core::BROADCAST_INTERVAL_MS;

use crate::ogg::Page;

/// A contiguous run of pages, the unit of broadcast.
///
/// Invariant: `duration_ms` equals the sum of the page durations.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub pages: Vec<Page>,
    pub duration_ms: u64,
    /// Playback offset of this chunk within its track.
    pub start_offset_ms: u64,
    /// Total duration of the track this chunk came from.
    pub total_length_ms: u64,
    pub title: String,
}

impl Chunk {
    fn new(title: &str, start_offset_ms: u64) -> Self {
        Self {
            pages: Vec::new(),
            duration_ms: 0,
            start_offset_ms,
            total_length_ms: 0,
            title: title.to_string(),
        }
    }

    /// Accepts the page while the chunk is still below the broadcast
    /// interval; a full chunk refuses it.
    fn insert(&mut self, page: Page) -> Option<Page> {
        if self.duration_ms < BROADCAST_INTERVAL_MS {
            self.duration_ms += page.duration_ms;
            self.pages.push(page);
            None
        } else {
            Some(page)
        }
    }

    /// Whether the chunk has reached the broadcast interval.
    pub const fn is_full(&self) -> bool {
        self.duration_ms >= BROADCAST_INTERVAL_MS
    }
}

/// Packs a track's pages into broadcast chunks.
///
/// Every chunk except possibly the last reaches `BROADCAST_INTERVAL_MS`; a
/// short final chunk is merged into the one before it. A track shorter than
/// one interval yields a single short chunk.
pub fn assemble_chunks(pages: Vec<Page>, title: &str) -> Vec<Chunk> {
    let total_length_ms: u64 = pages.iter().map(|p| p.duration_ms).sum();

    let mut chunks: Vec<Chunk> = Vec::new();
    let mut current = Chunk::new(title, 0);

    for page in pages {
        if let Some(rejected) = current.insert(page) {
            let next_offset = current.start_offset_ms + current.duration_ms;
            chunks.push(current);
            current = Chunk::new(title, next_offset);
            // A fresh chunk always has room.
            current.insert(rejected);
        }
    }

    if !current.pages.is_empty() {
        match chunks.last_mut() {
            // Fold a runt tail into its predecessor.
            Some(last) if !current.is_full() => {
                last.duration_ms += current.duration_ms;
                last.pages.append(&mut current.pages);
            },
            _ => chunks.push(current),
        }
    }

    for chunk in &mut chunks {
        chunk.total_length_ms = total_length_ms;
    }
    chunks
}
