// SPDX-FileCopyrightText: © 2026 Airwave Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Builders for synthetic Opus-in-Ogg streams.
//!
//! Tests across the workspace need tracks with known page layouts and
//! durations; these helpers assemble them byte by byte so fixtures never
//! depend on an encoder. Checksums are left zeroed - the parser does not
//! verify them.

use crate::ogg::PAGE_HEADER_SIZE;
use crate::opus::toc_for_config;

/// An Opus packet of `len` bytes whose TOC selects `config`.
pub fn opus_packet(config: u8, len: usize) -> Vec<u8> {
    assert!(len >= 1, "an Opus packet is at least its TOC byte");
    let mut packet = vec![0u8; len];
    packet[0] = toc_for_config(config);
    packet
}

/// A 20 ms packet (SILK config 1), the common case.
pub fn packet_20ms() -> Vec<u8> {
    opus_packet(1, 40)
}

fn raw_page(header_type: u8, lacing: &[u8], payload: &[u8]) -> Vec<u8> {
    assert_eq!(
        lacing.iter().map(|&l| l as usize).sum::<usize>(),
        payload.len(),
        "lacing table must cover the payload"
    );
    assert!(lacing.len() <= 255, "a page holds at most 255 segments");

    let mut page = Vec::with_capacity(PAGE_HEADER_SIZE + lacing.len() + payload.len());
    page.extend_from_slice(b"OggS");
    page.push(0); // stream structure version
    page.push(header_type);
    page.extend_from_slice(&[0u8; 8]); // granule position
    page.extend_from_slice(&[0u8; 4]); // serial
    page.extend_from_slice(&[0u8; 4]); // page sequence
    page.extend_from_slice(&[0u8; 4]); // checksum, unverified
    page.push(lacing.len() as u8);
    page.extend_from_slice(lacing);
    page.extend_from_slice(payload);
    page
}

/// Lacing entries for one complete packet of `len` bytes.
fn lace_packet(len: usize, lacing: &mut Vec<u8>) {
    let mut remaining = len;
    while remaining >= 255 {
        lacing.push(255);
        remaining -= 255;
    }
    // The terminating segment; a multiple of 255 needs an explicit zero.
    lacing.push(remaining as u8);
}

/// One page holding the given complete packets.
pub fn page(packets: &[&[u8]]) -> Vec<u8> {
    let mut lacing = Vec::new();
    let mut payload = Vec::new();
    for packet in packets {
        lace_packet(packet.len(), &mut lacing);
        payload.extend_from_slice(packet);
    }
    raw_page(0, &lacing, &payload)
}

/// A page whose final packet is left open: `open_tail` is emitted as a run
/// of 255-byte segments with no terminator, deferring the packet to the next
/// page (the residual rule).
pub fn page_with_open_tail(packets: &[&[u8]], open_tail: &[u8]) -> Vec<u8> {
    assert!(
        !open_tail.is_empty() && open_tail.len() % 255 == 0,
        "an open tail is a whole number of 255-byte segments"
    );
    let mut lacing = Vec::new();
    let mut payload = Vec::new();
    for packet in packets {
        lace_packet(packet.len(), &mut lacing);
        payload.extend_from_slice(packet);
    }
    for _ in 0..open_tail.len() / 255 {
        lacing.push(255);
    }
    payload.extend_from_slice(open_tail);
    raw_page(0, &lacing, &payload)
}

/// A continuation page: the first `closing` bytes terminate the packet left
/// open by the previous page, then the given complete packets follow.
pub fn continuation_page(closing: &[u8], packets: &[&[u8]]) -> Vec<u8> {
    assert!(closing.len() < 255, "the closing segment must terminate the packet");
    let mut lacing = vec![closing.len() as u8];
    let mut payload = closing.to_vec();
    for packet in packets {
        lace_packet(packet.len(), &mut lacing);
        payload.extend_from_slice(packet);
    }
    // 0x01 marks a continued packet; the parser tracks this itself but real
    // muxers set the flag.
    raw_page(0x01, &lacing, &payload)
}

/// The OpusHead identification page (19-byte payload, beginning-of-stream).
pub fn id_header_page() -> Vec<u8> {
    let mut payload = Vec::with_capacity(19);
    payload.extend_from_slice(b"OpusHead");
    payload.push(1); // version
    payload.push(2); // channels
    payload.extend_from_slice(&3840u16.to_le_bytes()); // pre-skip
    payload.extend_from_slice(&48_000u32.to_le_bytes()); // input sample rate
    payload.extend_from_slice(&0u16.to_le_bytes()); // output gain
    payload.push(0); // channel mapping family
    raw_page(0x02, &[payload.len() as u8], &payload)
}

/// The OpusTags comment page.
pub fn comment_header_page() -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(b"OpusTags");
    payload.extend_from_slice(&7u32.to_le_bytes());
    payload.extend_from_slice(b"airwave");
    payload.extend_from_slice(&0u32.to_le_bytes());
    raw_page(0, &[payload.len() as u8], &payload)
}

/// A complete track: both header pages followed by `pages` audio pages each
/// holding `packets_per_page` packets of 20 ms.
///
/// Total duration is `pages * packets_per_page * 20` ms.
pub fn track_of_20ms_packets(pages: usize, packets_per_page: usize) -> Vec<u8> {
    let mut track = id_header_page();
    track.extend_from_slice(&comment_header_page());
    let packet = packet_20ms();
    let packets: Vec<&[u8]> = (0..packets_per_page).map(|_| packet.as_slice()).collect();
    for _ in 0..pages {
        track.extend_from_slice(&page(&packets));
    }
    track
}

/// A track of exactly `duration_ms` (a multiple of 20), split into pages of
/// one second each where possible.
pub fn track_with_duration_ms(duration_ms: u64) -> Vec<u8> {
    assert!(duration_ms % 20 == 0, "fixture tracks are built from 20 ms packets");
    let mut track = id_header_page();
    track.extend_from_slice(&comment_header_page());
    let packet = packet_20ms();

    let mut remaining = duration_ms / 20; // packets left to place
    while remaining > 0 {
        let in_page = remaining.min(50); // 50 * 20 ms = one second per page
        let packets: Vec<&[u8]> = (0..in_page).map(|_| packet.as_slice()).collect();
        track.extend_from_slice(&page(&packets));
        remaining -= in_page;
    }
    track
}
