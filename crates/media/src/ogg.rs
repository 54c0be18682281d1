// SPDX-FileCopyrightText: © 2026 Airwave Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Ogg page walking.
//!
//! A page is 27 header bytes, a lacing table of `segment_count` entries
//! (byte 26), and the concatenated packet payload. Packets are rebuilt from
//! the lacing table: segments of 255 bytes coalesce with the next segment
//! until one shorter than 255 terminates the packet. A trailing run of 255s
//! with no terminator means the packet straddles into the next page - the
//! residual rule - and its duration is attributed to the page where it
//! *terminates*.
//!
//! Only page structure and each packet's TOC byte are inspected; payloads
//! are sliced out of the parent buffer without copying and checksums are not
//! verified (the data comes straight off disk, not a lossy transport).

use bytes::Bytes;

use airwave_core::error::{AirwaveError, Result};

use crate::opus;

/// `OggS`, the capture pattern every page starts with.
pub const CAPTURE_PATTERN: &[u8] = b"OggS";

/// Fixed part of the page header, up to and including the segment count.
pub const PAGE_HEADER_SIZE: usize = 27;

/// One Ogg page: its raw bytes (header included) and the playback duration
/// attributed to it.
#[derive(Debug, Clone)]
pub struct Page {
    pub bytes: Bytes,
    pub duration_ms: u64,
}

/// Outcome of walking a single page's lacing table.
struct WalkedPage {
    byte_length: usize,
    duration_us: u64,
    /// Duration carried into the next page by an unterminated packet.
    carry_us: u64,
    /// Whether the page ends mid-packet.
    continues: bool,
}

/// Walks one page starting at `buf[0]`.
///
/// `continuing` and `carry_us` describe a packet left open by the previous
/// page. Returns `None` when the buffer is too short to hold the page.
fn walk_page(buf: &[u8], continuing: bool, carry_us: u64) -> Option<WalkedPage> {
    if buf.len() < PAGE_HEADER_SIZE {
        return None;
    }

    let segment_count = buf[26] as usize;
    let table_end = PAGE_HEADER_SIZE + segment_count;
    if buf.len() < table_end {
        return None;
    }

    let table = &buf[PAGE_HEADER_SIZE..table_end];
    let payload_len: usize = table.iter().map(|&s| s as usize).sum();
    let byte_length = table_end + payload_len;
    if buf.len() < byte_length {
        return None;
    }
    let payload = &buf[table_end..byte_length];

    let mut duration_us = 0u64;
    let mut carry_us = carry_us;
    let mut continuing = continuing;
    // Offset of the packet currently being assembled, if it started in this
    // page.
    let mut packet_start: Option<usize> = None;
    let mut offset = 0usize;

    for &segment in table {
        if packet_start.is_none() && !continuing {
            packet_start = Some(offset);
        }
        offset += segment as usize;

        if segment < 255 {
            // Packet terminates here.
            if continuing {
                duration_us += carry_us;
                carry_us = 0;
                continuing = false;
            } else if let Some(start) = packet_start.take() {
                if offset > start {
                    duration_us += opus::packet_duration_us(payload[start]);
                }
                // A zero-length packet carries no TOC and no duration.
            }
        }
    }

    // Trailing 255-run: the packet defers to the next page.
    if let Some(start) = packet_start {
        carry_us = opus::packet_duration_us(payload[start]);
        continuing = true;
    }

    Some(WalkedPage { byte_length, duration_us, carry_us, continues: continuing })
}

/// Parses every page in `data`, in order.
///
/// Parsing is best-effort past the first page: a malformed or truncated page
/// mid-stream ends the walk with the pages gathered so far, while a buffer
/// that does not even begin with a capture pattern is rejected outright.
pub fn parse_pages(data: &Bytes) -> Result<Vec<Page>> {
    if data.len() < PAGE_HEADER_SIZE || &data[..4] != CAPTURE_PATTERN {
        return Err(AirwaveError::Parse("track does not start with an Ogg capture pattern".into()));
    }

    let mut pages = Vec::new();
    let mut read_head = 0usize;
    let mut continuing = false;
    let mut carry_us = 0u64;

    while read_head < data.len() {
        let rest = &data[read_head..];
        if rest.len() < 4 || &rest[..4] != CAPTURE_PATTERN {
            tracing::warn!(offset = read_head, "lost the Ogg capture pattern, stopping the walk");
            break;
        }

        let Some(walked) = walk_page(rest, continuing, carry_us) else {
            tracing::warn!(offset = read_head, "truncated Ogg page, stopping the walk");
            break;
        };

        pages.push(Page {
            bytes: data.slice(read_head..read_head + walked.byte_length),
            duration_ms: (walked.duration_us + 500) / 1000,
        });

        read_head += walked.byte_length;
        continuing = walked.continues;
        carry_us = walked.carry_us;
    }

    Ok(pages)
}

/// Parses a whole track for broadcasting: drops the two header pages
/// (OpusHead and OpusTags) and any page with no decodable duration.
pub fn parse_track(data: &Bytes) -> Result<Vec<Page>> {
    let pages = parse_pages(data)?;
    Ok(pages
        .into_iter()
        .skip(2)
        .filter(|page| {
            if page.duration_ms == 0 {
                tracing::debug!("dropping a page with no decodable duration");
                false
            } else {
                true
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        continuation_page, opus_packet, packet_20ms, page, page_with_open_tail,
        track_of_20ms_packets,
    };

    #[test]
    fn page_duration_sums_packets() {
        // 20 ms + 60 ms + 2.5 ms, rounded at page granularity.
        let p1 = opus_packet(1, 40);
        let p2 = opus_packet(3, 80);
        let p3 = opus_packet(16, 10);
        let data = Bytes::from(page(&[&p1, &p2, &p3]));

        let pages = parse_pages(&data).expect("well-formed page");
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].duration_ms, 83); // 82.5 ms rounds up
        assert_eq!(pages[0].bytes.len(), data.len());
    }

    #[test]
    fn walk_lands_on_every_capture_pattern() {
        let mut data = Vec::new();
        for packets in 1..=4usize {
            let packet = packet_20ms();
            let refs: Vec<&[u8]> = (0..packets).map(|_| packet.as_slice()).collect();
            data.extend_from_slice(&page(&refs));
        }
        let data = Bytes::from(data);

        let pages = parse_pages(&data).expect("well-formed pages");
        assert_eq!(pages.len(), 4);
        let mut read_head = 0usize;
        for (i, p) in pages.iter().enumerate() {
            assert_eq!(&data[read_head..read_head + 4], CAPTURE_PATTERN);
            assert_eq!(p.duration_ms, 20 * (i as u64 + 1));
            read_head += p.bytes.len();
        }
        assert_eq!(read_head, data.len());
    }

    #[test]
    fn residual_packet_counts_toward_the_terminating_page() {
        // A 60 ms packet of 510 bytes is left open at the end of page one and
        // terminated by 30 bytes at the start of page two.
        let long_packet = opus_packet(3, 540);
        let short = packet_20ms();

        let mut data = page_with_open_tail(&[&short], &long_packet[..510]);
        data.extend_from_slice(&continuation_page(&long_packet[510..], &[&short]));
        let data = Bytes::from(data);

        let pages = parse_pages(&data).expect("well-formed pages");
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].duration_ms, 20);
        assert_eq!(pages[1].duration_ms, 80); // 60 ms residual + 20 ms
    }

    #[test]
    fn residual_spanning_multiple_pages() {
        // A 40 ms packet of 775 bytes: two 255-runs open it, a middle page is
        // nothing but another 255-run, and a 10-byte segment terminates it.
        let long_packet = opus_packet(2, 255 * 3 + 10);
        let first = page_with_open_tail(&[], &long_packet[..510]);
        let mut middle = page_with_open_tail(&[], &long_packet[510..765]);
        middle[5] = 0x01; // continued-packet flag, as a real muxer would set
        let last = continuation_page(&long_packet[765..], &[]);

        let mut data = first;
        data.extend_from_slice(&middle);
        data.extend_from_slice(&last);
        let data = Bytes::from(data);

        let pages = parse_pages(&data).expect("well-formed pages");
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0].duration_ms, 0);
        assert_eq!(pages[1].duration_ms, 0);
        assert_eq!(pages[2].duration_ms, 40);
    }

    #[test]
    fn zero_length_packet_contributes_nothing() {
        let short = packet_20ms();
        let empty: &[u8] = &[];
        let data = Bytes::from(page(&[&short, empty, &short]));

        let pages = parse_pages(&data).expect("well-formed page");
        assert_eq!(pages[0].duration_ms, 40);
    }

    #[test]
    fn garbage_mid_stream_stops_the_walk() {
        let mut data = page(&[&packet_20ms()]);
        data.extend_from_slice(b"definitely not a page");
        let data = Bytes::from(data);

        let pages = parse_pages(&data).expect("first page is fine");
        assert_eq!(pages.len(), 1);
    }

    #[test]
    fn truncated_final_page_is_dropped() {
        let full = page(&[&packet_20ms()]);
        let mut data = full.clone();
        data.extend_from_slice(&full[..full.len() - 5]);
        let data = Bytes::from(data);

        let pages = parse_pages(&data).expect("first page is fine");
        assert_eq!(pages.len(), 1);
    }

    #[test]
    fn non_ogg_input_is_rejected() {
        let data = Bytes::from_static(b"ID3\x04this is an mp3, not opus");
        assert!(parse_pages(&data).is_err());
    }

    #[test]
    fn parse_track_drops_headers() {
        let data = Bytes::from(track_of_20ms_packets(3, 5));
        let all = parse_pages(&data).expect("well-formed track");
        assert_eq!(all.len(), 5);
        // Header payloads are not Opus packets; whatever duration their
        // first byte happens to decode to is discarded with the page.
        let pages = parse_track(&data).expect("well-formed track");
        assert_eq!(pages.len(), 3);
        assert!(pages.iter().all(|p| p.duration_ms == 100));
    }
}

