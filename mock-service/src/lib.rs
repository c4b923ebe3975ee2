//! Stand-in for the chat backend under test: the registration endpoint plus the realtime
//! WebSocket endpoint, with knobs for rejecting users and delaying or withholding acks.
use axum::{
    debug_handler,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chatload_core::OutboundMessage;
use metrics::{counter, gauge};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

#[derive(Clone, Copy, Debug, Default)]
pub enum Registration {
    #[default]
    AcceptAll,
    RejectAll,
    /// Accept the first `n` registrations, reject the rest.
    AcceptFirst(usize),
}

#[derive(Clone, Copy, Debug, Default)]
pub enum AckMode {
    #[default]
    Immediate,
    Delayed(Duration),
    Never,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct MockConfig {
    pub registration: Registration,
    pub acks: AckMode,
}

/// Counters observed by the service since it started.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MockStats {
    pub registrations: usize,
    pub rejected: usize,
    pub connections: usize,
    pub unauthorized: usize,
    pub active: usize,
    pub peak: usize,
    pub chats: usize,
    pub acks: usize,
    pub typing: usize,
    pub heartbeats: usize,
}

#[derive(Debug, Default)]
struct Counters {
    registrations: AtomicUsize,
    rejected: AtomicUsize,
    connections: AtomicUsize,
    unauthorized: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
    chats: AtomicUsize,
    acks: AtomicUsize,
    typing: AtomicUsize,
    heartbeats: AtomicUsize,
}

#[derive(Debug, Default)]
pub struct MockState {
    config: MockConfig,
    /// token -> username
    tokens: Mutex<HashMap<String, String>>,
    counters: Counters,
}

impl MockState {
    pub fn new(config: MockConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            ..Default::default()
        })
    }

    pub fn stats(&self) -> MockStats {
        let c = &self.counters;
        let load = |counter: &AtomicUsize| counter.load(Ordering::SeqCst);
        MockStats {
            registrations: load(&c.registrations),
            rejected: load(&c.rejected),
            connections: load(&c.connections),
            unauthorized: load(&c.unauthorized),
            active: load(&c.active),
            peak: load(&c.peak),
            chats: load(&c.chats),
            acks: load(&c.acks),
            typing: load(&c.typing),
            heartbeats: load(&c.heartbeats),
        }
    }

    fn username_for(&self, token: &str) -> Option<String> {
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(token)
            .cloned()
    }
}

pub fn router(state: Arc<MockState>) -> Router {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/ws", get(realtime))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(addr: SocketAddr, config: MockConfig) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&addr).await?;
    info!("Mock chat service listening on {}", listener.local_addr()?);
    axum::serve(listener, router(MockState::new(config))).await?;
    Ok(())
}

/// A mock service running in the background on an ephemeral local port.
pub struct MockServer {
    pub addr: SocketAddr,
    state: Arc<MockState>,
    task: JoinHandle<()>,
}

impl MockServer {
    pub async fn spawn(config: MockConfig) -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let state = MockState::new(config);

        let app = router(state.clone());
        let task = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app).await {
                error!("Mock service stopped: {err}");
            }
        });

        Ok(Self { addr, state, task })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/api/ws", self.addr)
    }

    pub fn stats(&self) -> MockStats {
        self.state.stats()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub token: String,
    pub user: RegisteredUser,
}

#[derive(Debug, Serialize)]
pub struct RegisteredUser {
    pub id: usize,
    pub username: String,
    pub email: String,
}

#[debug_handler]
async fn register(
    State(state): State<Arc<MockState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, StatusCode> {
    let id = state.counters.registrations.fetch_add(1, Ordering::SeqCst);
    let accepted = match state.config.registration {
        Registration::AcceptAll => true,
        Registration::RejectAll => false,
        Registration::AcceptFirst(n) => id < n,
    };

    if !accepted {
        state.counters.rejected.fetch_add(1, Ordering::SeqCst);
        counter!("mock-service.registration.rejected").increment(1);
        return Err(StatusCode::BAD_REQUEST);
    }

    let token = format!("mock-token-{id}");
    state
        .tokens
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(token.clone(), req.username.clone());
    counter!("mock-service.registration.accepted").increment(1);
    debug!("Registered {}", req.username);

    Ok(Json(RegisterResponse {
        token,
        user: RegisteredUser {
            id,
            username: req.username,
            email: req.email,
        },
    }))
}

#[derive(Debug, Deserialize)]
struct RealtimeQuery {
    token: Option<String>,
}

async fn realtime(
    ws: WebSocketUpgrade,
    State(state): State<Arc<MockState>>,
    Query(query): Query<RealtimeQuery>,
) -> Response {
    let username = query
        .token
        .as_deref()
        .and_then(|token| state.username_for(token));

    match username {
        Some(username) => ws.on_upgrade(move |socket| converse(socket, state, username)),
        None => {
            state.counters.unauthorized.fetch_add(1, Ordering::SeqCst);
            StatusCode::UNAUTHORIZED.into_response()
        }
    }
}

async fn converse(mut socket: WebSocket, state: Arc<MockState>, username: String) {
    let counters = &state.counters;
    counters.connections.fetch_add(1, Ordering::SeqCst);
    let now = counters.active.fetch_add(1, Ordering::SeqCst) + 1;
    counters.peak.fetch_max(now, Ordering::SeqCst);
    gauge!("mock-service.active").increment(1.);
    debug!("{username} connected");

    while let Some(Ok(msg)) = socket.recv().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        let frame: OutboundMessage = match serde_json::from_str(&text) {
            Ok(frame) => frame,
            Err(err) => {
                warn!("Unparseable frame from {username}: {err}");
                continue;
            }
        };

        match frame {
            OutboundMessage::Chat { .. } => {
                counters.chats.fetch_add(1, Ordering::SeqCst);
                if !acknowledge(&mut socket, state.config.acks, &counters.acks).await {
                    break;
                }
            }
            OutboundMessage::Typing { .. } => {
                counters.typing.fetch_add(1, Ordering::SeqCst);
            }
            OutboundMessage::Heartbeat { .. } => {
                counters.heartbeats.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    counters.active.fetch_sub(1, Ordering::SeqCst);
    gauge!("mock-service.active").decrement(1.);
    debug!("{username} disconnected");
}

/// Returns false once the socket can no longer be written to.
async fn acknowledge(socket: &mut WebSocket, mode: AckMode, acks: &AtomicUsize) -> bool {
    match mode {
        AckMode::Never => return true,
        AckMode::Delayed(delay) => tokio::time::sleep(delay).await,
        AckMode::Immediate => {}
    }

    let ack = serde_json::json!({ "type": "ACK", "status": "delivered" }).to_string();
    if socket.send(Message::Text(ack)).await.is_err() {
        return false;
    }
    acks.fetch_add(1, Ordering::SeqCst);
    true
}
