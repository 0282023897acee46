//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{GameHandle, PlayerId};
use crate::http::middleware::origin_allowed;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    let origin = headers
        .get(header::ORIGIN)
        .and_then(|h| h.to_str().ok());
    let host = headers.get(header::HOST).and_then(|h| h.to_str().ok());

    if !origin_allowed(origin, host, &state.config.allowed_origins) {
        warn!(origin = ?origin, "WebSocket upgrade from disallowed origin");
        return StatusCode::FORBIDDEN.into_response();
    }

    let game = state.game.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, game))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, game: GameHandle) {
    let player_id = Uuid::new_v4();
    info!(player_id = %player_id, "New WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();

    // Subscribe before joining so the roster broadcast for this join is not missed
    let broadcast_rx = game.subscribe();

    let init = match game.join(player_id).await {
        Ok(init) => init,
        Err(e) => {
            error!(player_id = %player_id, error = %e, "Failed to join game");
            return;
        }
    };

    let sent = send_msg(&mut ws_sink, &init).await;
    match sent {
        Ok(()) => run_session(player_id, &game, ws_sink, ws_stream, broadcast_rx).await,
        Err(e) => debug!(player_id = %player_id, error = %e, "Failed to send init"),
    }

    // Cleanup on disconnect
    if let Err(e) = game.leave(player_id).await {
        error!(player_id = %player_id, error = %e, "Failed to leave game");
    }

    info!(player_id = %player_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    player_id: PlayerId,
    game: &GameHandle,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut ws_stream: SplitStream<WebSocket>,
    mut broadcast_rx: broadcast::Receiver<String>,
) {
    // Spawn writer task: broadcast frames -> WebSocket
    let writer_handle = tokio::spawn(async move {
        loop {
            match broadcast_rx.recv().await {
                Ok(frame) => {
                    if let Err(e) = ws_sink.send(Message::Text(frame)).await {
                        debug!(player_id = %player_id, error = %e, "WebSocket send failed");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(
                        player_id = %player_id,
                        lagged_count = n,
                        "Client lagged, skipping {} frames", n
                    );
                    // Continue - don't disconnect for lag
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(player_id = %player_id, "Broadcast channel closed");
                    break;
                }
            }
        }
    });

    // Reader loop: WebSocket -> game session
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => match ClientMsg::decode(&text) {
                Ok(ClientMsg::Input(patch)) => {
                    if game.input(player_id, patch).await.is_err() {
                        debug!(player_id = %player_id, "Game session closed");
                        break;
                    }
                }
                Err(e) => {
                    warn!(player_id = %player_id, error = %e, "Failed to parse client message");
                }
            },
            Ok(Message::Binary(_)) => {
                warn!(player_id = %player_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                debug!(player_id = %player_id, "Received ping/pong");
            }
            Ok(Message::Close(_)) => {
                info!(player_id = %player_id, "Client initiated close");
                break;
            }
            Err(e) => {
                debug!(player_id = %player_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Abort writer task
    writer_handle.abort();
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = msg.encode().map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::game::{GameSession, Level, PhysicsConfig};
    use crate::http::build_router;
    use serde_json::Value;
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::net::{TcpListener, TcpStream};
    use tokio_tungstenite::tungstenite::{self, client::IntoClientRequest, Message as WsMessage};
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    /// Full router with a live session on an ephemeral port
    async fn serve() -> SocketAddr {
        let config = Config::from_lookup(|_| None).unwrap();
        let (session, game) = GameSession::new(Level::default(), PhysicsConfig::default());
        tokio::spawn(session.run());

        let router = build_router(AppState::new(config, game));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    async fn connect(addr: SocketAddr) -> Client {
        let (client, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
        client
    }

    async fn next_json(client: &mut Client) -> Value {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(5), client.next())
                .await
                .expect("timed out waiting for a frame")
                .expect("socket closed")
                .unwrap();
            if let WsMessage::Text(text) = msg {
                return serde_json::from_str(&text).unwrap();
            }
        }
    }

    async fn next_matching(client: &mut Client, matches: impl Fn(&Value) -> bool) -> Value {
        loop {
            let frame = next_json(client).await;
            if matches(&frame) {
                return frame;
            }
        }
    }

    async fn expect_init(client: &mut Client) -> String {
        let first = next_json(client).await;
        assert_eq!(first["type"], "init");
        assert_eq!(first["data"]["world"]["groundY"], 520.0);
        assert_eq!(first["data"]["platforms"].as_array().unwrap().len(), 5);
        first["data"]["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn socket_lifecycle_join_input_leave() {
        let addr = serve().await;

        let mut alice = connect(addr).await;
        let alice_id = expect_init(&mut alice).await;
        let mut bob = connect(addr).await;
        let bob_id = expect_init(&mut bob).await;
        assert_ne!(alice_id, bob_id);

        let roster = next_matching(&mut alice, |f| {
            f["type"] == "players" && f["data"].get(&bob_id).is_some()
        })
        .await;
        assert!(roster["data"].get(&alice_id).is_some());

        bob.send(WsMessage::Text(
            r#"{"type":"input","data":{"right":true}}"#.to_string(),
        ))
        .await
        .unwrap();

        let state = next_matching(&mut alice, |f| {
            f["type"] == "state"
                && f["data"]
                    .as_array()
                    .is_some_and(|ps| {
                        ps.iter()
                            .any(|p| p["id"] == bob_id.as_str() && p["inputs"]["right"] == true)
                    })
        })
        .await;
        let bob_state = state["data"]
            .as_array()
            .unwrap()
            .iter()
            .find(|p| p["id"] == bob_id.as_str())
            .unwrap();
        assert_eq!(bob_state["inputs"]["left"], false);

        bob.close(None).await.unwrap();

        let roster = next_matching(&mut alice, |f| {
            f["type"] == "players" && f["data"].get(&bob_id).is_none()
        })
        .await;
        let ids: Vec<&String> = roster["data"].as_object().unwrap().keys().collect();
        assert_eq!(ids, vec![&alice_id]);
    }

    #[tokio::test]
    async fn upgrade_respects_origin_allow_list() {
        let addr = serve().await;
        let with_origin = |origin: String| {
            let mut request = format!("ws://{addr}/ws").into_client_request().unwrap();
            request
                .headers_mut()
                .insert("Origin", origin.parse().unwrap());
            request
        };

        match connect_async(with_origin("https://evil.example".to_string())).await {
            Err(tungstenite::Error::Http(response)) => {
                assert_eq!(response.status().as_u16(), 403);
            }
            other => panic!("expected 403, got {:?}", other.map(|_| ())),
        }

        let (mut listed, _) = connect_async(with_origin("http://localhost:3000".to_string()))
            .await
            .unwrap();
        expect_init(&mut listed).await;

        let (mut same_origin, _) = connect_async(with_origin(format!("http://{addr}")))
            .await
            .unwrap();
        expect_init(&mut same_origin).await;
    }
}
