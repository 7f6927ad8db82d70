//! HTTP and WebSocket handlers.
//!
//! Implements:
//! - GET /ws - WebSocket lock relay endpoint
//! - GET /locks - Current locks, for clients joining mid-session
//! - GET /health - Health check endpoint

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use riskmap_lock_core::{ClientEvent, ConnectionId, Lock, ServerEvent};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::error::Result;
use crate::hub::RelayHandle;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub relay: RelayHandle,
}

/// Build the relay's router: WebSocket endpoint plus the HTTP status routes.
pub fn router(state: AppState) -> Router {
    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/locks", get(locks_handler))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: &'static str,
    pub connections: usize,
    pub active_locks: usize,
}

/// GET /health - Health check endpoint.
pub async fn health_handler(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    let status = state.relay.status().await?;
    Ok(Json(HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        connections: status.connections,
        active_locks: status.locks.len(),
    }))
}

/// GET /locks - All active locks, ordered by item id.
pub async fn locks_handler(State(state): State<AppState>) -> Result<Json<Vec<Lock>>> {
    Ok(Json(state.relay.status().await?.locks))
}

/// GET /ws - Upgrade to the lock relay protocol.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.relay))
}

/// Pump one client's frames into the relay until the socket closes, then
/// report the disconnect so its locks are reaped.
async fn handle_socket(socket: WebSocket, relay: RelayHandle) {
    let (id, outbound) = match relay.connect() {
        Ok(conn) => conn,
        Err(e) => {
            warn!("Rejecting WebSocket connection: {}", e);
            return;
        }
    };

    let (sink, mut stream) = socket.split();
    let writer = tokio::spawn(write_outbound(id, outbound, sink));

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => match ClientEvent::from_json(text.as_str()) {
                Ok(event) => {
                    if let Err(e) = relay.dispatch(id, event) {
                        warn!("[{}] {}", id, e);
                        break;
                    }
                }
                Err(e) => warn!("[{}] Ignoring frame: {}", id, e),
            },
            Ok(Message::Close(_)) => break,
            // Binary frames are not part of the protocol; ping/pong is handled by axum
            Ok(_) => {}
            Err(e) => {
                debug!("[{}] Socket error: {}", id, e);
                break;
            }
        }
    }

    if let Err(e) = relay.disconnect(id) {
        debug!("[{}] Could not report disconnect: {}", id, e);
    }
    writer.abort();
}

async fn write_outbound(
    id: ConnectionId,
    outbound: mpsc::UnboundedReceiver<ServerEvent>,
    mut sink: SplitSink<WebSocket, Message>,
) {
    let mut events = UnboundedReceiverStream::new(outbound);

    while let Some(event) = events.next().await {
        let frame = match event.to_json() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("[{}] {}", id, e);
                continue;
            }
        };

        if sink.send(Message::Text(frame.into())).await.is_err() {
            debug!("[{}] Socket closed while sending {}", id, event.name());
            break;
        }
    }

    debug!("[{}] Writer task ended", id);
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::time::Duration;

    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::Message as WsMessage;
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

    use super::*;
    use crate::hub::{spawn_relay, RelayOptions};

    type Client = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

    const WAIT: Duration = Duration::from_secs(2);

    fn state() -> (AppState, tokio::task::JoinHandle<()>) {
        let (relay, task) = spawn_relay(RelayOptions {
            lock_duration: Duration::from_secs(30),
            replay_locks_on_connect: false,
        });
        (AppState { relay }, task)
    }

    /// Serve the router on an ephemeral port.
    async fn serve(state: AppState) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });
        addr
    }

    async fn connect(addr: SocketAddr) -> Client {
        let (client, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
        client
    }

    async fn wait_for_connections(relay: &RelayHandle, expected: usize) {
        tokio::time::timeout(WAIT, async {
            while relay.status().await.unwrap().connections != expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("connection count never settled");
    }

    /// Next text frame from the server, as JSON.
    async fn next_event(client: &mut Client) -> serde_json::Value {
        tokio::time::timeout(WAIT, async {
            loop {
                match client.next().await {
                    Some(Ok(WsMessage::Text(text))) => {
                        return serde_json::from_str(text.as_str()).unwrap();
                    }
                    Some(Ok(_)) => continue,
                    other => panic!("socket ended: {other:?}"),
                }
            }
        })
        .await
        .expect("timed out waiting for a frame")
    }

    #[tokio::test]
    async fn test_health_and_locks() {
        let (state, _task) = state();
        let (a, _a_rx) = state.relay.connect().unwrap();
        state
            .relay
            .dispatch(
                a,
                ClientEvent::StartEditing {
                    item_id: "5".to_string(),
                    user_id: "alice".to_string(),
                },
            )
            .unwrap();

        let Json(health) = health_handler(State(state.clone())).await.unwrap();
        assert!(health.healthy);
        assert_eq!(health.connections, 1);
        assert_eq!(health.active_locks, 1);

        let Json(locks) = locks_handler(State(state)).await.unwrap();
        assert_eq!(locks.len(), 1);
        assert_eq!(locks[0].record_id, "5");
        assert_eq!(locks[0].holder_id, "alice");
    }

    #[tokio::test]
    async fn test_unavailable_when_relay_stopped() {
        let (state, task) = state();
        state.relay.shutdown().unwrap();
        task.await.unwrap();

        let resp = match locks_handler(State(state)).await {
            Ok(_) => panic!("expected an error"),
            Err(e) => e.into_response(),
        };
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_socket_skips_bad_frames_and_reaps_on_close() {
        let (state, _task) = state();
        let relay = state.relay.clone();
        let addr = serve(state).await;

        let mut alice = connect(addr).await;
        let mut bob = connect(addr).await;
        wait_for_connections(&relay, 2).await;

        // Garbage and binary frames are dropped without closing the socket
        alice.send(WsMessage::text("not json")).await.unwrap();
        alice
            .send(WsMessage::text(r#"{"event":"startEditing","data":{"itemId":"5"}}"#))
            .await
            .unwrap();
        alice.send(WsMessage::binary(vec![1u8, 2, 3])).await.unwrap();
        alice
            .send(WsMessage::text(
                r#"{"event":"startEditing","data":{"itemId":"5","userId":"alice"}}"#,
            ))
            .await
            .unwrap();

        let locked = next_event(&mut bob).await;
        assert_eq!(locked["event"], "itemLocked");
        assert_eq!(locked["data"]["itemId"], "5");
        assert_eq!(locked["data"]["userId"], "alice");

        alice.close(None).await.unwrap();

        let unlocked = next_event(&mut bob).await;
        assert_eq!(
            unlocked,
            serde_json::json!({ "event": "itemUnlocked", "data": { "itemId": "5" } })
        );

        wait_for_connections(&relay, 1).await;
        assert!(relay.status().await.unwrap().locks.is_empty());
    }
}
