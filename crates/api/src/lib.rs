// SPDX-FileCopyrightText: © 2026 Airwave Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! api: The wire contract between the Airwave server and its listeners.
//!
//! Broadcast frames travel as JSON inside WebSocket text frames; the small
//! control surface (station list, track list, track requests, skip votes) is
//! plain HTTP GET. Both payload shapes are defined here so the station
//! engines that produce them and the integration tests that consume them
//! agree on every field name.

use serde::{Deserialize, Serialize};

/// Sentinel body returned when a track request is rejected (unknown track or
/// already queued).
pub const REQUEST_FAILURE: &str = "//FAILURE";

/// The `audio_broadcast` endpoint of a station.
pub const ENDPOINT_AUDIO: &str = "audio_broadcast";

/// The `metadata_only` endpoint of a station.
pub const ENDPOINT_METADATA: &str = "metadata_only";

// --- Broadcast payloads ---

/// One Ogg page inside an audio frame.
///
/// `buff` is the page's raw bytes (header included), serialized as a JSON
/// array of numbers so the browser can feed it straight into a decoder.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PagePayload {
    /// Playback duration of this page in milliseconds.
    pub duration: u64,
    pub buff: Vec<u8>,
}

/// A chunk on the audio channel (`/ws/<station>/audio_broadcast`).
///
/// # Example
/// ```json
/// {
///   "duration": 3020,
///   "start_offset": 9060,
///   "pages": [ { "duration": 1000, "buff": [79, 103, 103, 83, ...] } ]
/// }
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AudioFramePayload {
    /// Chunk duration in milliseconds.
    pub duration: u64,
    /// Offset of the chunk within its track, in milliseconds.
    pub start_offset: u64,
    pub pages: Vec<PagePayload>,
}

/// A chunk on the metadata channel (`/ws/<station>/metadata_only`).
///
/// # Example
/// ```json
/// {
///   "duration": 3020,
///   "start_offset": 9060,
///   "total_length": 184000,
///   "title": "audionautix-trippin-coffee"
/// }
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MetadataPayload {
    /// Chunk duration in milliseconds.
    pub duration: u64,
    /// Offset of the chunk within its track, in milliseconds.
    pub start_offset: u64,
    /// Total track duration in milliseconds.
    pub total_length: u64,
    pub title: String,
}

// --- HTTP responses ---

/// Body of `GET /station_list`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StationListResponse {
    pub stations: Vec<String>,
}

/// Renders the `GET /broadcast_metadata` body: the broadcast interval and
/// the server's start time, which together let a client line its playback
/// clock up with the stream.
pub fn broadcast_metadata_body(interval_ms: u64, start_time_s: u64) -> String {
    format!("BROADCAST_INTERVAL_MS: {interval_ms}\nSTART_TIME_S: {start_time_s}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_frame_field_names() {
        let frame = AudioFramePayload {
            duration: 3000,
            start_offset: 6000,
            pages: vec![PagePayload { duration: 1000, buff: vec![79, 103, 103, 83] }],
        };
        let json = serde_json::to_value(&frame).expect("serializes");
        assert_eq!(json["duration"], 3000);
        assert_eq!(json["start_offset"], 6000);
        assert_eq!(json["pages"][0]["duration"], 1000);
        assert_eq!(json["pages"][0]["buff"][0], 79);
    }

    #[test]
    fn metadata_field_names() {
        let meta = MetadataPayload {
            duration: 3000,
            start_offset: 0,
            total_length: 12_000,
            title: "first-track".into(),
        };
        let json = serde_json::to_value(&meta).expect("serializes");
        assert_eq!(json["total_length"], 12_000);
        assert_eq!(json["title"], "first-track");
        // The audio payload shape is absent on the metadata channel.
        assert!(json.get("pages").is_none());
    }

    #[test]
    fn payloads_round_trip() {
        let frame = AudioFramePayload {
            duration: 3020,
            start_offset: 9060,
            pages: vec![PagePayload { duration: 20, buff: vec![0, 1, 2] }],
        };
        let text = serde_json::to_string(&frame).expect("serializes");
        let back: AudioFramePayload = serde_json::from_str(&text).expect("parses");
        assert_eq!(back, frame);
    }

    #[test]
    fn broadcast_metadata_shape() {
        assert_eq!(
            broadcast_metadata_body(3000, 1_700_000_000),
            "BROADCAST_INTERVAL_MS: 3000\nSTART_TIME_S: 1700000000"
        );
    }
}
