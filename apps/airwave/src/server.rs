// SPDX-FileCopyrightText: © 2026 Airwave Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The HTTP front door.
//!
//! Everything a listener can do arrives here as a GET: the static listen
//! page, the little control surface (station list, track list, track
//! requests, skip votes) and the WebSocket upgrade for the broadcast
//! channels. Control requests are round trips through the orchestrator's
//! mailbox; the broadcast path never touches HTTP handlers.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::ws::WebSocketUpgrade,
    extract::{ConnectInfo, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tokio::sync::mpsc;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use airwave_api::{broadcast_metadata_body, StationListResponse, REQUEST_FAILURE};
use airwave_core::BROADCAST_INTERVAL_MS;
use airwave_engine::constants::REPLY_CAPACITY;
use airwave_engine::{ControlRequest, ControlResponse, EngineConfig, Radio, StationSpec};

use crate::config::Config;
use crate::state::AppState;
use crate::websocket;

/// How long an HTTP handler waits for the engine to answer a control
/// round trip.
const CONTROL_TIMEOUT: Duration = Duration::from_secs(5);

/// Builds the router for a running engine.
pub fn create_app(radio: Arc<Radio>, config: Arc<Config>) -> (Router, AppState) {
    let state = AppState::new(radio, config.clone());

    let public_root = config.server.public_root.clone();
    let index = public_root.join("index.html");

    let router = Router::new()
        .route("/broadcast_metadata", get(broadcast_metadata_handler))
        .route("/station_list", get(station_list_handler))
        .route("/audio_list/{station}", get(audio_list_handler))
        .route("/audio_queue/{station}", get(audio_queue_handler))
        .route("/audio_req/{station}/{track}", get(audio_req_handler))
        .route("/skip_track/{station}", get(skip_track_handler))
        .route("/ws/{station}/{endpoint}", get(websocket_handler))
        // The listen page negotiates its station client-side, so every
        // /listen/* path serves the same shell.
        .route_service("/listen", ServeFile::new(index.clone()))
        .route_service("/listen/{*rest}", ServeFile::new(index))
        .fallback_service(ServeDir::new(public_root))
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    (router, state)
}

/// Sends one control request and waits for the reply.
async fn round_trip(
    state: &AppState,
    make: impl FnOnce(mpsc::Sender<ControlResponse>) -> ControlRequest,
) -> Option<ControlResponse> {
    let (reply_tx, mut reply_rx) = mpsc::channel(REPLY_CAPACITY);
    state.radio.control().send(make(reply_tx)).ok()?;
    tokio::time::timeout(CONTROL_TIMEOUT, reply_rx.recv()).await.ok().flatten()
}

fn engine_unavailable() -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, "engine unavailable").into_response()
}

async fn broadcast_metadata_handler(State(state): State<AppState>) -> String {
    broadcast_metadata_body(BROADCAST_INTERVAL_MS, state.start_time_s)
}

async fn station_list_handler(State(state): State<AppState>) -> Response {
    match round_trip(&state, |reply| ControlRequest::StationList { reply }).await {
        Some(ControlResponse::Stations(stations)) => {
            Json(StationListResponse { stations }).into_response()
        },
        _ => engine_unavailable(),
    }
}

async fn audio_list_handler(
    State(state): State<AppState>,
    Path(station): Path<String>,
) -> Response {
    match round_trip(&state, |reply| ControlRequest::TrackList { station, reply }).await {
        Some(ControlResponse::TrackList { slash_separated, .. }) => {
            slash_separated.into_response()
        },
        Some(ControlResponse::UnknownStation) => StatusCode::NOT_FOUND.into_response(),
        _ => engine_unavailable(),
    }
}

async fn audio_queue_handler(
    State(state): State<AppState>,
    Path(station): Path<String>,
) -> Response {
    match round_trip(&state, |reply| ControlRequest::QueueList { station, reply }).await {
        Some(ControlResponse::Queue(titles)) => titles.join("/").into_response(),
        Some(ControlResponse::UnknownStation) => StatusCode::NOT_FOUND.into_response(),
        _ => engine_unavailable(),
    }
}

async fn audio_req_handler(
    State(state): State<AppState>,
    Path((station, track)): Path<(String, String)>,
) -> Response {
    match round_trip(&state, |reply| ControlRequest::QueueTrack { station, track, reply }).await {
        Some(ControlResponse::Queued(Some(title))) => title.into_response(),
        Some(ControlResponse::Queued(None)) => REQUEST_FAILURE.into_response(),
        Some(ControlResponse::UnknownStation) => StatusCode::NOT_FOUND.into_response(),
        _ => engine_unavailable(),
    }
}

async fn skip_track_handler(
    State(state): State<AppState>,
    Path(station): Path<String>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Response {
    let ip = addr.ip();
    match round_trip(&state, |reply| ControlRequest::SkipVote { station, ip, reply }).await {
        Some(ControlResponse::Skip(accepted)) => accepted.to_string().into_response(),
        Some(ControlResponse::UnknownStation) => StatusCode::NOT_FOUND.into_response(),
        _ => engine_unavailable(),
    }
}

async fn websocket_handler(
    ws: WebSocketUpgrade,
    Path((station, endpoint)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Response {
    // Unknown stations and endpoints are resolved by the orchestrator after
    // the upgrade; its rejection closes the socket.
    ws.on_upgrade(move |socket| websocket::handle_socket(socket, state, station, endpoint))
}

/// Builds the engine from the configuration.
///
/// # Errors
///
/// Fails when a station directory is missing, unreadable or holds no opus
/// files.
pub async fn build_radio(config: &Config) -> Result<Radio, airwave_core::AirwaveError> {
    Radio::start(EngineConfig {
        stations: config
            .stations
            .iter()
            .map(|s| StationSpec { name: s.name.clone(), dir: s.dir.clone() })
            .collect(),
        workers: config.server.threads,
    })
    .await
}

/// Starts the configured listener and blocks until shutdown.
///
/// # Errors
///
/// Returns an error if the engine cannot start, the address cannot be
/// bound, or the TLS material cannot be loaded.
///
/// # Panics
///
/// Panics if the Ctrl+C or SIGTERM handlers cannot be installed (critical
/// OS failure).
pub async fn start_server(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let radio = Arc::new(build_radio(config).await?);
    let config = Arc::new(config.clone());
    let (app, _state) = create_app(radio.clone(), config.clone());

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.listen_port()).parse()?;

    // Set up graceful shutdown signal handler
    #[allow(clippy::expect_used)]
    let shutdown_signal = async {
        let ctrl_c = async {
            tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => {
                info!("Received CTRL-C signal, initiating graceful shutdown");
            },
            () = terminate => {
                info!("Received SIGTERM signal, initiating graceful shutdown");
            },
        }
    };

    let handle = axum_server::Handle::new();
    tokio::spawn({
        let handle = handle.clone();
        async move {
            shutdown_signal.await;
            handle.graceful_shutdown(Some(Duration::from_secs(10)));
        }
    });

    let serve_result = if config.server.tls {
        info!(
            address = %addr,
            fullchain = %config.server.fullchain,
            pkey = %config.server.pkey,
            "Starting HTTPS radio server"
        );

        let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
            &config.server.fullchain,
            &config.server.pkey,
        )
        .await
        .map_err(|e| {
            error!(
                error = %e,
                fullchain = %config.server.fullchain,
                pkey = %config.server.pkey,
                "Failed to load TLS certificates"
            );
            e
        })?;

        axum_server::bind_rustls(addr, tls_config)
            .handle(handle)
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await
    } else {
        info!(address = %addr, "Starting HTTP radio server");

        axum_server::bind(addr)
            .handle(handle)
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await
    };

    if let Err(e) = &serve_result {
        error!(error = %e, "radio server error");
    }

    // The listener is down; walk the engine down too.
    if let Err(e) = radio.shutdown_and_wait().await {
        warn!(error = %e, "engine did not shut down cleanly");
    }

    serve_result.map_err(Into::into)
}
