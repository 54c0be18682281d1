// SPDX-FileCopyrightText: © 2026 Airwave Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Airwave Media - Ogg/Opus framing math and chunk assembly.
//!
//! The broadcaster never decodes audio. Everything it needs - per-page
//! durations and byte extents - is derived from Ogg page headers, lacing
//! tables and the first byte (TOC) of each Opus packet. Parsing is a pure
//! function from a track's bytes to a list of pages; the chunker then packs
//! pages into broadcast-interval sized chunks.

pub mod chunk;
pub mod ogg;
pub mod opus;
pub mod test_utils;

pub use chunk::{assemble_chunks, Chunk};
pub use ogg::{parse_pages, parse_track, Page};
