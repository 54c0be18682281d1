// SPDX-FileCopyrightText: © 2026 Airwave Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Opus TOC byte inspection.
//!
//! The first byte of every Opus packet encodes the configuration (mode,
//! bandwidth, frame size) in its high five bits, which is enough to know the
//! packet's duration without touching the codec.
//! <https://www.rfc-editor.org/rfc/rfc6716#section-3.1>

// --- Opus Constants ---

/// Frame durations for SILK-only configs 0..=11, one entry per frame size.
const SILK_ONLY_US: [u64; 4] = [10_000, 20_000, 40_000, 60_000];

/// Frame durations for hybrid configs 12..=15.
const HYBRID_US: [u64; 2] = [10_000, 20_000];

/// Frame durations for CELT-only configs 16..=31. The 2.5 ms frame makes
/// microseconds the smallest exact unit.
const CELT_ONLY_US: [u64; 4] = [2_500, 5_000, 10_000, 20_000];

/// Extracts the configuration number from a packet's TOC byte.
pub const fn config(toc: u8) -> u8 {
    (toc >> 3) & 31
}

/// Duration of one frame for a configuration, in microseconds.
///
/// The five config bits cover all 32 values, so every packet maps to a
/// duration; 20 ms is the fallback should the table ever be narrowed.
pub const fn frame_duration_us(config: u8) -> u64 {
    match config {
        0..=11 => SILK_ONLY_US[(config % 4) as usize],
        12..=15 => HYBRID_US[(config % 2) as usize],
        16..=31 => CELT_ONLY_US[(config % 4) as usize],
        _ => 20_000,
    }
}

/// Duration of the packet starting with `toc`, in microseconds.
pub const fn packet_duration_us(toc: u8) -> u64 {
    frame_duration_us(config(toc))
}

/// Builds a TOC byte for a configuration (stereo flag and frame-count code
/// zero). Used by fixture builders and tests.
pub const fn toc_for_config(config: u8) -> u8 {
    (config & 31) << 3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_reads_high_five_bits() {
        assert_eq!(config(0b0000_0000), 0);
        assert_eq!(config(0b1111_1000), 31);
        // Low three bits (stereo + frame count code) are ignored.
        assert_eq!(config(0b0110_1111), 13);
    }

    #[test]
    fn silk_only_durations() {
        assert_eq!(frame_duration_us(0), 10_000);
        assert_eq!(frame_duration_us(1), 20_000);
        assert_eq!(frame_duration_us(2), 40_000);
        assert_eq!(frame_duration_us(3), 60_000);
        // Same frame sizes repeat for every SILK bandwidth.
        assert_eq!(frame_duration_us(7), 60_000);
        assert_eq!(frame_duration_us(9), 20_000);
    }

    #[test]
    fn hybrid_durations() {
        assert_eq!(frame_duration_us(12), 10_000);
        assert_eq!(frame_duration_us(13), 20_000);
        assert_eq!(frame_duration_us(14), 10_000);
        assert_eq!(frame_duration_us(15), 20_000);
    }

    #[test]
    fn celt_durations() {
        assert_eq!(frame_duration_us(16), 2_500);
        assert_eq!(frame_duration_us(17), 5_000);
        assert_eq!(frame_duration_us(18), 10_000);
        assert_eq!(frame_duration_us(19), 20_000);
        assert_eq!(frame_duration_us(31), 20_000);
    }

    #[test]
    fn toc_round_trips() {
        for cfg in 0..32u8 {
            assert_eq!(config(toc_for_config(cfg)), cfg);
        }
    }
}
