use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use rstest::fixture;
use serde_json::json;
use tempfile::TempDir;
use tokio::{sync::Mutex, task::JoinHandle};

use crate::{
    notifier::{NotifyError, Notifier},
    store::GameStore,
};

#[ctor::ctor]
fn init() {
    init_tracing();
}

pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let log_level = std::env::var("LOG").unwrap_or("error".to_owned());
    _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!(
            "game_change_notifier={log_level}"
        )))
        .with_test_writer()
        .try_init();
}

#[derive(Default)]
struct AppState {
    streams: HashMap<String, (StatusCode, serde_json::Value)>,
    stream_requests: Vec<StreamHeaders>,
    pushes: Vec<RecordedPush>,
    reject_pushes: bool,
}

#[derive(Debug, Clone)]
pub struct StreamHeaders {
    pub streamer: String,
    pub accept: Option<String>,
    pub client_id: Option<String>,
    pub authorization: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RecordedPush {
    pub access_token: Option<String>,
    pub body: serde_json::Value,
}

/// Twitch streams endpoint and Pushbullet pushes endpoint on an ephemeral port.
pub struct MockServer {
    port: u16,
    state: Arc<Mutex<AppState>>,
    task: JoinHandle<()>,
}

impl MockServer {
    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub async fn set_stream(&self, streamer: &str, status: StatusCode, body: serde_json::Value) {
        self.state
            .lock()
            .await
            .streams
            .insert(streamer.to_owned(), (status, body));
    }

    pub async fn reject_pushes(&self) {
        self.state.lock().await.reject_pushes = true;
    }

    pub async fn pushes(&self) -> Vec<RecordedPush> {
        self.state.lock().await.pushes.clone()
    }

    pub async fn stream_requests(&self) -> Vec<StreamHeaders> {
        self.state.lock().await.stream_requests.clone()
    }

    pub async fn last_stream_headers(&self) -> Option<StreamHeaders> {
        self.state.lock().await.stream_requests.last().cloned()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[fixture]
pub async fn mock_server() -> MockServer {
    let state = Arc::new(Mutex::new(AppState::default()));
    let router = Router::new()
        .route("/kraken/streams/:streamer", get(stream_handler))
        .route("/v2/pushes", post(push_handler))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let task = tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    MockServer { port, state, task }
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|x| x.to_str().ok())
        .map(ToOwned::to_owned)
}

async fn stream_handler(
    State(state): State<Arc<Mutex<AppState>>>,
    Path(streamer): Path<String>,
    headers: HeaderMap,
) -> (StatusCode, Json<serde_json::Value>) {
    let mut state = state.lock().await;
    state.stream_requests.push(StreamHeaders {
        streamer: streamer.clone(),
        accept: header(&headers, "accept"),
        client_id: header(&headers, "client-id"),
        authorization: header(&headers, "authorization"),
    });
    match state.streams.get(&streamer) {
        Some((status, body)) => (*status, Json(body.clone())),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "Not Found",
                "status": 404,
                "message": format!("Channel '{streamer}' does not exist"),
            })),
        ),
    }
}

async fn push_handler(
    State(state): State<Arc<Mutex<AppState>>>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> (StatusCode, Json<serde_json::Value>) {
    let mut state = state.lock().await;
    if state.reject_pushes {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": {"code": "invalid_access_token"}})),
        );
    }
    state.pushes.push(RecordedPush {
        access_token: header(&headers, "access-token"),
        body: body.clone(),
    });
    (StatusCode::OK, Json(body))
}

pub struct TempStore {
    pub store: GameStore,
    pub dir: TempDir,
}

#[fixture]
pub fn temp_store() -> TempStore {
    let dir = tempfile::tempdir().unwrap();
    let store = GameStore::new(dir.path().join("games.db").to_string_lossy().into_owned());
    store.ensure_initialized().unwrap();
    TempStore { store, dir }
}

/// Keeps every push in memory, optionally failing each one after recording it.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: std::sync::Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> RecordingNotifier {
        RecordingNotifier {
            fail: true,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    async fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((title.to_owned(), body.to_owned()));
        if self.fail {
            return Err(NotifyError::BadResponse {
                status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
                body: String::new(),
            });
        }
        Ok(())
    }
}
