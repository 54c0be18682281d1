// SPDX-FileCopyrightText: © 2026 Airwave Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! End-to-end engine tests: a real station directory, the full actor fleet,
//! and fake listener connections attached straight to the worker links.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use airwave_api::{AudioFramePayload, MetadataPayload, ENDPOINT_AUDIO, ENDPOINT_METADATA};
use airwave_core::BROADCAST_INTERVAL_MS;
use airwave_engine::{ConnectionRequest, EngineConfig, Frame, Radio, StationSpec};
use airwave_media::test_utils::track_with_duration_ms;

const RECV_TIMEOUT: Duration = Duration::from_secs(60);

fn station_dir(tracks: &[(&str, u64)]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    for (name, duration_ms) in tracks {
        std::fs::write(
            dir.path().join(format!("{name}.opus")),
            track_with_duration_ms(*duration_ms),
        )
        .expect("write fixture track");
    }
    dir
}

async fn attach(
    radio: &Radio,
    station: &str,
    endpoint: &str,
) -> mpsc::Receiver<Frame> {
    let (frames_tx, frames_rx) = mpsc::channel(16);
    let (reply_tx, mut reply_rx) = mpsc::channel(1);
    radio
        .connection_link()
        .send(ConnectionRequest::Attach {
            station: station.to_string(),
            endpoint: endpoint.to_string(),
            frames: frames_tx,
            reply: reply_tx,
        })
        .expect("worker is alive");
    timeout(RECV_TIMEOUT, reply_rx.recv()).await.expect("attach reply").expect("connection id");
    frames_rx
}

async fn next_data_frame(rx: &mut mpsc::Receiver<Frame>) -> bytes::Bytes {
    loop {
        match timeout(RECV_TIMEOUT, rx.recv()).await.expect("frame arrives") {
            Some(Frame::Data(bytes)) => return bytes,
            Some(Frame::Ping) => {},
            None => panic!("connection closed while waiting for a frame"),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn audio_listener_receives_paced_full_chunks() {
    let _ = tracing_subscriber::fmt::try_init();

    let dir = station_dir(&[("first", 9000), ("second", 6000)]);
    let radio = Radio::start(EngineConfig {
        stations: vec![StationSpec { name: "Test".into(), dir: dir.path().to_path_buf() }],
        workers: 2,
    })
    .await
    .expect("engine starts");

    let mut rx = attach(&radio, "test", ENDPOINT_AUDIO).await;

    let mut offsets = Vec::new();
    for _ in 0..4 {
        let frame = next_data_frame(&mut rx).await;
        let payload: AudioFramePayload =
            serde_json::from_slice(&frame).expect("audio payload shape");
        assert!(
            payload.duration >= BROADCAST_INTERVAL_MS,
            "chunk of {} ms is shorter than the broadcast interval",
            payload.duration
        );
        assert!(!payload.pages.is_empty());
        let page_sum: u64 = payload.pages.iter().map(|p| p.duration).sum();
        assert_eq!(payload.duration, page_sum);
        // Every page is a whole Ogg page.
        for page in &payload.pages {
            assert_eq!(&page.buff[..4], b"OggS");
        }
        offsets.push(payload.start_offset);
    }

    // Offsets restart per track but never move backwards within one.
    for pair in offsets.windows(2) {
        assert!(pair[1] > pair[0] || pair[1] == 0);
    }

    drop(rx);
    radio.shutdown_and_wait().await.expect("clean shutdown");
    assert!(radio.buffer_store().is_empty(), "all broadcast buffers must be released");
}

#[tokio::test(start_paused = true)]
async fn metadata_listener_never_sees_audio_payloads() {
    let dir = station_dir(&[("only", 9000)]);
    let radio = Radio::start(EngineConfig {
        stations: vec![StationSpec { name: "Meta Station".into(), dir: dir.path().to_path_buf() }],
        workers: 1,
    })
    .await
    .expect("engine starts");

    let mut rx = attach(&radio, "meta_station", ENDPOINT_METADATA).await;

    for _ in 0..3 {
        let frame = next_data_frame(&mut rx).await;
        let value: serde_json::Value = serde_json::from_slice(&frame).expect("json frame");
        assert!(value.get("pages").is_none(), "audio payload leaked onto the metadata channel");
        let payload: MetadataPayload =
            serde_json::from_slice(&frame).expect("metadata payload shape");
        assert_eq!(payload.title, "only");
        assert_eq!(payload.total_length, 9000);
    }

    drop(rx);
    radio.shutdown_and_wait().await.expect("clean shutdown");
}

#[tokio::test(start_paused = true)]
async fn primer_pair_is_replayed_to_late_joiners() {
    let dir = station_dir(&[("long", 30_000)]);
    let radio = Radio::start(EngineConfig {
        stations: vec![StationSpec { name: "Test".into(), dir: dir.path().to_path_buf() }],
        workers: 1,
    })
    .await
    .expect("engine starts");

    // Let the station get a few broadcasts ahead.
    let mut early = attach(&radio, "test", ENDPOINT_AUDIO).await;
    let mut seen = Vec::new();
    for _ in 0..3 {
        seen.push(next_data_frame(&mut early).await);
    }

    // A late joiner's first two frames are exactly the last two cached
    // broadcasts, second-last first.
    let mut late = attach(&radio, "test", ENDPOINT_AUDIO).await;
    let first = next_data_frame(&mut late).await;
    let second = next_data_frame(&mut late).await;
    assert_eq!(first, seen[seen.len() - 2]);
    assert_eq!(second, seen[seen.len() - 1]);

    drop(early);
    drop(late);
    radio.shutdown_and_wait().await.expect("clean shutdown");
}

#[tokio::test(start_paused = true)]
async fn unknown_station_or_endpoint_closes_the_connection() {
    let dir = station_dir(&[("a", 6000)]);
    let radio = Radio::start(EngineConfig {
        stations: vec![StationSpec { name: "Test".into(), dir: dir.path().to_path_buf() }],
        workers: 1,
    })
    .await
    .expect("engine starts");

    let mut rx = attach(&radio, "no_such_station", ENDPOINT_AUDIO).await;
    assert!(
        timeout(RECV_TIMEOUT, rx.recv()).await.expect("closed promptly").is_none(),
        "rejected listener must be disconnected"
    );

    let mut rx = attach(&radio, "test", "not_an_endpoint").await;
    assert!(timeout(RECV_TIMEOUT, rx.recv()).await.expect("closed promptly").is_none());

    radio.shutdown_and_wait().await.expect("clean shutdown");
}

#[tokio::test(start_paused = true)]
async fn buffers_are_released_with_no_subscribers_at_all() {
    let dir = station_dir(&[("a", 6000)]);
    let radio = Radio::start(EngineConfig {
        stations: vec![StationSpec { name: "Test".into(), dir: dir.path().to_path_buf() }],
        workers: 4,
    })
    .await
    .expect("engine starts");

    // No listeners: let several broadcast intervals elapse.
    tokio::time::sleep(Duration::from_millis(4 * BROADCAST_INTERVAL_MS)).await;

    radio.shutdown_and_wait().await.expect("clean shutdown");
    assert!(
        radio.buffer_store().is_empty(),
        "every buffer must see exactly one release per worker"
    );
}
