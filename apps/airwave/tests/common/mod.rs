// SPDX-FileCopyrightText: © 2026 Airwave Contributors
//
// SPDX-License-Identifier: MPL-2.0

#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;

use airwave_engine::Radio;
use airwave_media::test_utils::track_with_duration_ms;
use airwave_server::config::{Config, LogConfig, ServerConfig, StationConfig};
use airwave_server::server;

pub struct TestServer {
    pub addr: SocketAddr,
    pub radio: Arc<Radio>,
    _station_dir: tempfile::TempDir,
    _public_dir: tempfile::TempDir,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }
}

/// Starts a real server on port 0 with one station ("Test FM") holding the
/// given fixture tracks.
pub async fn start_test_server(tracks: &[(&str, u64)]) -> TestServer {
    let station_dir = tempfile::tempdir().expect("station tempdir");
    for (name, duration_ms) in tracks {
        std::fs::write(
            station_dir.path().join(format!("{name}.opus")),
            track_with_duration_ms(*duration_ms),
        )
        .expect("write fixture track");
    }

    let public_dir = tempfile::tempdir().expect("public tempdir");
    std::fs::write(
        public_dir.path().join("index.html"),
        "<!doctype html><title>airwave</title>",
    )
    .expect("write index.html");
    std::fs::write(public_dir.path().join("style.css"), "body { margin: 0 }")
        .expect("write style.css");

    let config = Config {
        server: ServerConfig {
            port: Some(0),
            threads: 2,
            public_root: public_dir.path().to_path_buf(),
            ..ServerConfig::default()
        },
        stations: vec![StationConfig {
            name: "Test FM".to_string(),
            dir: PathBuf::from(station_dir.path()),
        }],
        log: LogConfig::default(),
    };
    config.validate().expect("test config is valid");

    let radio = Arc::new(server::build_radio(&config).await.expect("engine starts"));
    let (app, _state) = server::create_app(radio.clone(), Arc::new(config));

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .expect("test server runs");
    });

    // Give server time to start
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    TestServer { addr, radio, _station_dir: station_dir, _public_dir: public_dir }
}
