// SPDX-FileCopyrightText: © 2026 Airwave Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The WebSocket side of a listener connection.
//!
//! After the upgrade the socket task hands its bounded outbound queue to a
//! worker (picked round-robin) and then does exactly two things: drain the
//! queue onto the socket strictly in order, and watch the socket for a
//! close. Listeners never send payloads; inbound frames other than close are
//! ignored.

use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::debug;

use airwave_engine::constants::{CONNECTION_SEND_QUEUE_CAPACITY, REPLY_CAPACITY};
use airwave_engine::{ConnectionRequest, Frame};

use crate::state::AppState;

/// Runs one listener connection until either side closes it.
pub async fn handle_socket(mut socket: WebSocket, state: AppState, station: String, endpoint: String) {
    let (frames_tx, mut frames_rx) = mpsc::channel(CONNECTION_SEND_QUEUE_CAPACITY);
    let (reply_tx, mut reply_rx) = mpsc::channel(REPLY_CAPACITY);

    let link = state.radio.connection_link();
    if link
        .send(ConnectionRequest::Attach {
            station: station.clone(),
            endpoint: endpoint.clone(),
            frames: frames_tx,
            reply: reply_tx,
        })
        .is_err()
    {
        // The engine is shutting down.
        return;
    }
    let Some(conn) = reply_rx.recv().await else {
        return;
    };
    debug!(station = %station, endpoint = %endpoint, conn = conn.0, "listener socket attached");

    loop {
        tokio::select! {
            frame = frames_rx.recv() => match frame {
                Some(Frame::Data(bytes)) => {
                    // Broadcast payloads are JSON, carried in text frames.
                    let Ok(text) = String::from_utf8(Vec::from(bytes)) else {
                        debug!(conn = conn.0, "dropping a non-UTF-8 frame");
                        continue;
                    };
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                },
                Some(Frame::Ping) => {
                    if socket.send(Message::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                },
                // The worker dropped us (rejected station, slow consumer or
                // shutdown).
                None => {
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                },
            },
            inbound = socket.recv() => match inbound {
                Some(Ok(Message::Close(_))) | None => break,
                // Listeners have nothing to say; pong replies are handled by
                // the protocol layer underneath.
                Some(Ok(_)) => {},
                Some(Err(e)) => {
                    debug!(conn = conn.0, error = %e, "listener socket error");
                    break;
                },
            },
        }
    }

    let _ = link.send(ConnectionRequest::Detach { conn });
    debug!(conn = conn.0, "listener socket closed");
}
