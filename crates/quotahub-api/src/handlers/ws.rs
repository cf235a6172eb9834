//! WebSocket upgrade handler.

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::Response;
use axum_extra::TypedHeader;
use axum_extra::headers::UserAgent;
use axum_extra::headers::authorization::{Authorization, Bearer};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use validator::Validate;

use quotahub_core::error::{AppError, ErrorKind};
use quotahub_core::types::ConnectionId;
use quotahub_realtime::connection::authenticator::Handshake;
use quotahub_realtime::connection::handle::{CLOSE_DEVICE_LIMIT, Lifecycle, Outgoing};
use quotahub_realtime::connection::heartbeat::run_heartbeat;
use quotahub_realtime::connection::manager::OpenConnection;
use quotahub_realtime::message::serializer;
use quotahub_realtime::message::types::OutboundMessage;

use crate::dto::request::WsQuery;
use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying the device identifier when it is not in the query.
const DEVICE_ID_HEADER: &str = "x-device-id";

/// Close code for failures on the server side.
const CLOSE_INTERNAL_ERROR: u16 = 1011;

type WsSink = SplitSink<WebSocket, Message>;

/// GET /ws?token={jwt}&deviceId={id}: WebSocket upgrade
///
/// Credentials are checked before the upgrade, so a bad token or a missing
/// device id is answered with a plain HTTP error. Device admission happens
/// after the upgrade so the refusal can be delivered as an `error` frame.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    user_agent: Option<TypedHeader<UserAgent>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    query
        .validate()
        .map_err(|e| AppError::validation(format!("Invalid handshake parameters: {e}")))?;

    let handshake = Handshake {
        token: query
            .token
            .or_else(|| bearer.map(|TypedHeader(auth)| auth.token().to_string())),
        device_id: query.device_id.or_else(|| {
            headers
                .get(DEVICE_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        }),
        user_agent: user_agent.map(|TypedHeader(ua)| ua.as_str().to_string()),
    };

    let lifecycle = Lifecycle::new(ConnectionId::new());
    let ctx = state
        .realtime
        .authenticator
        .authenticate(&handshake, &lifecycle)
        .await?;

    Ok(ws.on_upgrade(move |socket| async move {
        match state.realtime.connections.open(ctx, lifecycle).await {
            Ok(open) => drive_connection(state, open, socket).await,
            Err(e) => reject(socket, e).await,
        }
    }))
}

/// Sends the refusal as an `error` frame, then closes the socket.
async fn reject(mut socket: WebSocket, err: AppError) {
    if err.is_rejection() {
        info!(error = %err, "WebSocket connection refused");
    } else {
        error!(error = %err, "WebSocket connection failed during admission");
    }

    let code = if err.kind == ErrorKind::DeviceLimit {
        CLOSE_DEVICE_LIMIT
    } else {
        CLOSE_INTERNAL_ERROR
    };

    if let Ok(text) = serializer::encode(&OutboundMessage::error(err.message.clone())) {
        let _ = socket.send(Message::Text(text.into())).await;
    }
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: err.message.into(),
        })))
        .await;
}

/// Drives an admitted connection until either side closes it.
async fn drive_connection(state: AppState, open: OpenConnection, socket: WebSocket) {
    let OpenConnection {
        handle,
        outbound,
        guard,
    } = open;
    let conn_id = handle.id;
    let (ws_tx, mut ws_rx) = socket.split();

    info!(
        conn_id = %conn_id,
        subscriber_id = %handle.subscriber_id,
        device_id = %handle.device_id,
        "WebSocket connection established"
    );

    let heartbeat = tokio::spawn(run_heartbeat(
        handle.clone(),
        state.realtime.registry.clone(),
        state.realtime.heartbeat_config(),
    ));
    let mut writer = tokio::spawn(forward_outbound(conn_id, outbound, ws_tx));

    let reader = async {
        while let Some(result) = ws_rx.next().await {
            match result {
                Ok(Message::Text(text)) => {
                    state
                        .realtime
                        .connections
                        .handle_inbound(&handle, text.as_str())
                        .await;
                }
                Ok(Message::Pong(_)) => handle.record_pong().await,
                Ok(Message::Close(_)) => break,
                // Pings are answered by axum.
                Ok(_) => {}
                Err(e) => {
                    warn!(conn_id = %conn_id, error = %e, "WebSocket error");
                    break;
                }
            }
        }
    };

    tokio::select! {
        _ = reader => debug!(conn_id = %conn_id, "Client closed the connection"),
        _ = &mut writer => debug!(conn_id = %conn_id, "Server closed the connection"),
    }

    writer.abort();
    heartbeat.abort();
    guard.release().await;

    info!(conn_id = %conn_id, "WebSocket connection closed");
}

/// Writes queued frames to the socket until a close is requested or the
/// socket fails.
async fn forward_outbound(
    conn_id: ConnectionId,
    mut outbound: mpsc::Receiver<Outgoing>,
    mut ws_tx: WsSink,
) {
    while let Some(item) = outbound.recv().await {
        let frame = match item {
            Outgoing::Message(msg) => match serializer::encode(&msg) {
                Ok(text) => Message::Text(text.into()),
                Err(e) => {
                    error!(conn_id = %conn_id, error = %e, "Dropping unencodable message");
                    continue;
                }
            },
            Outgoing::Ping => Message::Ping(Default::default()),
            Outgoing::Close { code, reason } => {
                let _ = ws_tx
                    .send(Message::Close(Some(CloseFrame {
                        code,
                        reason: reason.into(),
                    })))
                    .await;
                break;
            }
        };

        if ws_tx.send(frame).await.is_err() {
            break;
        }
    }
}
