#![allow(dead_code)]

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::put;
use axum::{Json, Router};
use chrono::Utc;
use clipcast_lib::capture::simulated::encode_sim_media;
use clipcast_lib::capture::Clip;
use clipcast_lib::config::ClipcastConfig;
use clipcast_lib::config_builder::ClipcastConfigBuilder;
use clipcast_lib::error::ClipcastResult;
use clipcast_lib::events::AppEvent;
use clipcast_lib::upload::{AuthorizationToken, KeyManager, SigningIdentity, UploadClaims};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

/// How the fake media server answers the next upload
#[derive(Debug, Clone)]
pub enum Reply {
    /// Store the body and report its real hash
    Store,
    /// Store the body but report a different hash
    WrongHash,
    Status(u16),
    /// Accept the body and never answer
    Stall,
}

#[derive(Debug, Clone)]
pub struct ReceivedUpload {
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub sha256: String,
    pub size: usize,
}

#[derive(Default)]
struct ServerState {
    base: String,
    replies: Mutex<VecDeque<Reply>>,
    received: Mutex<Vec<ReceivedUpload>>,
}

/// In-process media server speaking the upload wire contract
pub struct MediaServer {
    pub endpoint: String,
    state: Arc<ServerState>,
}

impl MediaServer {
    pub async fn start(replies: Vec<Reply>) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        let state = Arc::new(ServerState {
            base: endpoint.clone(),
            replies: Mutex::new(replies.into()),
            received: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/upload", put(handle_upload))
            .with_state(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { endpoint, state }
    }

    pub fn received(&self) -> Vec<ReceivedUpload> {
        self.state.received.lock().unwrap().clone()
    }
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

async fn handle_upload(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let sha256 = hex::encode(Sha256::digest(&body));
    let content_type = header(&headers, "content-type");
    state.received.lock().unwrap().push(ReceivedUpload {
        authorization: header(&headers, "authorization"),
        content_type: content_type.clone(),
        content_length: header(&headers, "content-length").and_then(|v| v.parse().ok()),
        sha256: sha256.clone(),
        size: body.len(),
    });

    let reply = state
        .replies
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or(Reply::Store);
    let reported = match reply {
        Reply::Status(code) => {
            return (StatusCode::from_u16(code).unwrap(), "rejected").into_response();
        }
        Reply::Stall => std::future::pending().await,
        Reply::Store => sha256.clone(),
        Reply::WrongHash => hex::encode(Sha256::digest(b"something else")),
    };

    (
        StatusCode::CREATED,
        Json(json!({
            "sha256": reported,
            "url": format!("{}/{}.mp4", state.base, sha256),
            "size": body.len(),
            "type": content_type.unwrap_or_default(),
            "uploaded": Utc::now().timestamp(),
        })),
    )
        .into_response()
}

/// Signing identity that counts how many tokens it minted
pub struct CountingIdentity {
    keys: KeyManager,
    signed: AtomicUsize,
}

impl CountingIdentity {
    pub fn new() -> Self {
        Self {
            keys: KeyManager::generate(),
            signed: AtomicUsize::new(0),
        }
    }

    pub fn signed(&self) -> usize {
        self.signed.load(Ordering::SeqCst)
    }
}

impl SigningIdentity for CountingIdentity {
    fn sign_claims(&self, claims: &UploadClaims) -> ClipcastResult<AuthorizationToken> {
        self.signed.fetch_add(1, Ordering::SeqCst);
        self.keys.sign_claims(claims)
    }
}

/// Configuration pointing at `endpoint` with fast retries
pub fn test_config(endpoint: &str, work_dir: &Path) -> ClipcastConfig {
    ClipcastConfigBuilder::new()
        .endpoint(endpoint)
        .work_dir(work_dir)
        .output_dir(work_dir.join("clips"))
        .timeouts(Duration::from_secs(5), Duration::from_secs(30))
        .retry(3, Duration::from_millis(10))
        .chunk_size(16 * 1024)
        .build()
        .unwrap()
}

/// A simulated clip file, optionally padded to make hashing take a while
pub fn write_clip(dir: &Path, name: &str, duration: Duration, padding: usize) -> Clip {
    let path = dir.join(name);
    let mut bytes = encode_sim_media(duration);
    bytes.extend((0..padding).map(|i| (i % 251) as u8));
    std::fs::write(&path, bytes).unwrap();
    Clip {
        id: Uuid::new_v4(),
        path,
        duration,
        order: 0,
        created_at: Utc::now(),
    }
}

pub fn files_in(dir: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect(),
        Err(_) => Vec::new(),
    }
}

pub fn drain(events: &mut UnboundedReceiver<AppEvent>) -> Vec<AppEvent> {
    let mut all = Vec::new();
    while let Ok(event) = events.try_recv() {
        all.push(event);
    }
    all
}

pub fn progress_fractions(events: &[AppEvent]) -> Vec<f64> {
    events
        .iter()
        .filter_map(|e| match e {
            AppEvent::PipelineProgress(p) => Some(p.fraction),
            _ => None,
        })
        .collect()
}
