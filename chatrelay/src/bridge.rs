//! HTTP adapter to a platform bridge sidecar.
//!
//! Outbound calls go to the bridge's JSON API; the bridge pushes inbound
//! events to `POST /events`, which feeds them to the inbound handler over a
//! channel.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Json, State};
use axum::http::{HeaderMap, StatusCode};
use axum::{routing::post, Router};
use base64::Engine as _;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::error::{RelayError, RelayResult};
use crate::platform::{MessagingClient, PlatformEvent};
use crate::target::{Group, IndividualQuery, MessageHandle, OutgoingContent, Target};

pub const SECRET_HEADER: &str = "x-relay-secret";

#[derive(Clone)]
pub struct HttpBridgeClient {
    client: Client,
    base_url: String,
    shared_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RecallResponse {
    ok: bool,
}

#[derive(Debug, Deserialize)]
struct TopicResponse {
    topic: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireContent {
    Text { text: String },
    File { file_name: String, data_base64: String },
}

impl HttpBridgeClient {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            shared_secret: config.shared_secret.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: serde_json::Value) -> RelayResult<T> {
        let mut request = self.client.post(self.url(path)).json(&body);
        if let Some(secret) = &self.shared_secret {
            request = request.header(SECRET_HEADER, secret);
        }
        let response = request
            .send()
            .await
            .map_err(|e| RelayError::Transport(format!("POST {} failed: {}", path, e)))?;
        Self::decode(path, response).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> RelayResult<T> {
        let mut request = self.client.get(self.url(path));
        if let Some(secret) = &self.shared_secret {
            request = request.header(SECRET_HEADER, secret);
        }
        let response = request
            .send()
            .await
            .map_err(|e| RelayError::Transport(format!("GET {} failed: {}", path, e)))?;
        Self::decode(path, response).await
    }

    async fn decode<T: DeserializeOwned>(path: &str, response: reqwest::Response) -> RelayResult<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::Transport(format!(
                "{} returned {}: {}",
                path, status, body
            )));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| RelayError::Transport(format!("invalid response from {}: {}", path, e)))
    }

    async fn wire_content(content: OutgoingContent) -> RelayResult<WireContent> {
        match content {
            OutgoingContent::Text(text) => Ok(WireContent::Text { text }),
            OutgoingContent::File(path) => {
                let data = tokio::fs::read(&path).await?;
                Ok(WireContent::File {
                    file_name: file_name_of(&path),
                    data_base64: base64::engine::general_purpose::STANDARD.encode(data),
                })
            }
        }
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_string())
}

#[async_trait]
impl MessagingClient for HttpBridgeClient {
    async fn find_individuals(&self, query: IndividualQuery) -> RelayResult<Vec<Target>> {
        self.post("/contacts/find", serde_json::to_value(&query)?).await
    }

    async fn find_groups(&self, topic: &str) -> RelayResult<Vec<Target>> {
        self.post("/rooms/find", json!({ "topic": topic })).await
    }

    async fn list_individuals(&self) -> RelayResult<Vec<Target>> {
        self.get("/contacts").await
    }

    async fn say(&self, target: &Target, content: OutgoingContent) -> RelayResult<MessageHandle> {
        let content = Self::wire_content(content).await?;
        self.post(
            "/messages",
            json!({ "target": target, "content": content }),
        )
        .await
    }

    async fn recall(&self, handle: &MessageHandle) -> RelayResult<bool> {
        let response: RecallResponse = self
            .post("/messages/recall", json!({ "id": handle.id }))
            .await?;
        Ok(response.ok)
    }

    async fn sync(&self, target: &Target) -> RelayResult<()> {
        let _: serde_json::Value = self.post("/sync", json!({ "target": target })).await?;
        Ok(())
    }

    async fn current_topic(&self, group: &Group) -> RelayResult<String> {
        let response: TopicResponse = self.get(&format!("/rooms/{}/topic", group.id)).await?;
        Ok(response.topic)
    }

    async fn self_target(&self) -> RelayResult<Target> {
        self.get("/self").await
    }
}

struct WebhookState {
    shared_secret: Option<String>,
    events: mpsc::Sender<PlatformEvent>,
}

/// Accept event pushes from the bridge until the listener fails.
pub async fn serve_events(
    bind_addr: &str,
    shared_secret: Option<String>,
    events: mpsc::Sender<PlatformEvent>,
) -> RelayResult<()> {
    let router = events_router(shared_secret, events);
    let listener = TcpListener::bind(bind_addr).await?;
    info!("[Bridge] Listening for events on {}", bind_addr);
    axum::serve(listener, router)
        .await
        .map_err(|e| RelayError::Transport(format!("event webhook stopped: {}", e)))
}

pub fn events_router(shared_secret: Option<String>, events: mpsc::Sender<PlatformEvent>) -> Router {
    let state = Arc::new(WebhookState {
        shared_secret,
        events,
    });
    Router::new()
        .route("/events", post(events_handler))
        .with_state(state)
}

async fn events_handler(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    Json(event): Json<PlatformEvent>,
) -> StatusCode {
    if let Some(expected) = &state.shared_secret {
        let provided = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
        if provided != Some(expected.as_str()) {
            warn!("[Bridge] Rejected event with missing or wrong secret");
            return StatusCode::UNAUTHORIZED;
        }
    }
    match state.events.send(event).await {
        Ok(()) => StatusCode::ACCEPTED,
        Err(_) => {
            debug!("[Bridge] Inbound handler gone, dropping event");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
