use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use futures_util::{SinkExt, StreamExt};
use maze_escape_server::constants::TICK_MS;
use maze_escape_server::engine::GameEngine;
use maze_escape_server::grid::GridMap;
use maze_escape_server::protocol::{parse_client_message, ParsedClientMessage};
use rand::Rng as _;
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};
use tower_http::services::{ServeDir, ServeFile};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

type SharedState = Arc<Mutex<ServerState>>;

/// One connected client and its private game session.
struct SessionContext {
    tx: mpsc::Sender<String>,
    engine: GameEngine,
}

struct ServerState {
    level: GridMap,
    sessions: HashMap<String, SessionContext>,
}

#[tokio::main]
async fn main() {
    let port = parse_port(std::env::var("PORT").ok());
    let level = resolve_level();
    let state = Arc::new(Mutex::new(ServerState {
        level,
        sessions: HashMap::new(),
    }));
    start_tick_loop(state.clone());

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/ws", get(ws_handler))
        .with_state(state);

    let app = if let Some(static_dir) = resolve_static_dir() {
        let index_file = static_dir.join("index.html");
        println!(
            "[server] static file root: {}",
            static_dir.to_string_lossy()
        );
        app.fallback_service(
            ServeDir::new(static_dir).not_found_service(ServeFile::new(index_file)),
        )
    } else {
        eprintln!("[server] static file root not found; serving websocket API only.");
        app
    };

    let bind_addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("failed to bind server socket");

    println!(
        "[server] listening on :{port} (started {})",
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    axum::serve(listener, app)
        .await
        .expect("server runtime failed");
}

fn parse_port(raw: Option<String>) -> u16 {
    raw.and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080)
}

/// Level precedence: LEVEL_PATH file if it parses, otherwise the bundled
/// maze. A broken file is reported and skipped, not fatal.
fn resolve_level() -> GridMap {
    if let Ok(path) = std::env::var("LEVEL_PATH") {
        match std::fs::read_to_string(&path) {
            Ok(raw) => {
                let rows: Vec<&str> = raw
                    .lines()
                    .map(str::trim_end)
                    .filter(|line| !line.is_empty())
                    .collect();
                match GridMap::parse_tiles(&rows) {
                    Ok(grid) => {
                        println!(
                            "[server] loaded level from {path} ({size}x{size})",
                            size = grid.size()
                        );
                        return grid;
                    }
                    Err(error) => {
                        eprintln!("[server] invalid level file {path}: {error}; using bundled level")
                    }
                }
            }
            Err(error) => {
                eprintln!("[server] failed to read {path}: {error}; using bundled level")
            }
        }
    }
    GridMap::default_level()
}

fn resolve_static_dir() -> Option<PathBuf> {
    if let Ok(raw) = std::env::var("STATIC_DIR") {
        let path = PathBuf::from(raw);
        if path.join("index.html").is_file() {
            return Some(path);
        }
    }

    let candidates = [PathBuf::from("public"), PathBuf::from("../client/dist")];
    candidates
        .into_iter()
        .find(|path| path.join("index.html").is_file())
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: SharedState, socket: WebSocket) {
    let session_id = make_id("session");
    let (tx, mut rx) = mpsc::channel::<String>(256);

    {
        let mut guard = state.lock().await;
        let seed = rand::rng().random::<u32>();
        let engine = GameEngine::new(guard.level.clone(), seed);
        let init = game_init_payload(&session_id, &engine);
        let context = SessionContext { tx: tx.clone(), engine };
        let _ = context.tx.try_send(init.to_string());
        guard.sessions.insert(session_id.clone(), context);
        println!("[server] session {session_id} opened (seed {seed})");
    }

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let writer = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if ws_sender.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(received) = ws_receiver.next().await {
        let Ok(message) = received else {
            break;
        };

        match message {
            Message::Text(raw) => {
                handle_client_message(state.clone(), &session_id, raw.to_string()).await;
            }
            Message::Binary(raw) => {
                if let Ok(text) = String::from_utf8(raw.to_vec()) {
                    handle_client_message(state.clone(), &session_id, text).await;
                } else {
                    send_error(&state, &session_id, "invalid utf8 message").await;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    {
        let mut guard = state.lock().await;
        guard.sessions.remove(&session_id);
        println!("[server] session {session_id} closed");
    }
    drop(tx);
    let _ = writer.await;
}

async fn handle_client_message(state: SharedState, session_id: &str, raw: String) {
    let Some(message) = parse_client_message(&raw) else {
        send_error(&state, session_id, "invalid message").await;
        return;
    };

    let mut guard = state.lock().await;
    let level = guard.level.clone();
    let Some(session) = guard.sessions.get_mut(session_id) else {
        return;
    };

    match message {
        ParsedClientMessage::Input(input) => {
            session.engine.set_input(input);
        }
        ParsedClientMessage::NewGame { seed } => {
            let seed = seed.unwrap_or_else(|| rand::rng().random::<u32>());
            session.engine = GameEngine::new(level, seed);
            let init = game_init_payload(session_id, &session.engine);
            let _ = session.tx.try_send(init.to_string());
            println!("[server] session {session_id} restarted (seed {seed})");
        }
        ParsedClientMessage::Ping { t } => {
            let _ = session.tx.try_send(json!({ "type": "pong", "t": t }).to_string());
        }
    }
}

async fn send_error(state: &SharedState, session_id: &str, message: &str) {
    let guard = state.lock().await;
    if let Some(session) = guard.sessions.get(session_id) {
        let _ = session
            .tx
            .try_send(json!({ "type": "error", "message": message }).to_string());
    }
}

/// Steps every live session once per logical tick and pushes the snapshot.
/// A full outbound queue drops the frame; the next tick supersedes it anyway.
fn start_tick_loop(state: SharedState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(TICK_MS));
        loop {
            interval.tick().await;
            let mut guard = state.lock().await;
            for session in guard.sessions.values_mut() {
                session.engine.step(TICK_MS);
                let snapshot = session.engine.build_snapshot(true);
                let frame = json!({ "type": "state", "snapshot": snapshot });
                let _ = session.tx.try_send(frame.to_string());
            }
        }
    });
}

fn game_init_payload(session_id: &str, engine: &GameEngine) -> Value {
    json!({
        "type": "game_init",
        "sessionId": session_id,
        "world": engine.build_world_init(),
        "config": engine.config,
        "startedAtMs": engine.started_at_ms,
        "seed": engine.seed(),
    })
}

fn make_id(prefix: &str) -> String {
    let seq = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}_{seq}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_port_falls_back_to_default() {
        assert_eq!(parse_port(None), 8080);
        assert_eq!(parse_port(Some("abc".to_string())), 8080);
        assert_eq!(parse_port(Some("-1".to_string())), 8080);
        assert_eq!(parse_port(Some("9000".to_string())), 9000);
    }

    #[test]
    fn make_id_is_monotonic_per_prefix() {
        let a = make_id("session");
        let b = make_id("session");
        assert_ne!(a, b);
        assert!(a.starts_with("session_"));
    }

    #[test]
    fn game_init_payload_carries_world_and_seed() {
        let engine = GameEngine::new(GridMap::default_level(), 7);
        let payload = game_init_payload("session_1", &engine);
        assert_eq!(payload["type"], "game_init");
        assert_eq!(payload["sessionId"], "session_1");
        assert_eq!(payload["seed"], 7);
        assert_eq!(payload["world"]["size"], 21);
        assert_eq!(payload["world"]["tiles"].as_array().map(Vec::len), Some(21));
        assert_eq!(payload["config"]["tickRate"], 60);
    }
}
