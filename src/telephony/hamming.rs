use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::{AudioRecording, CallHandle, VoiceClient};
use crate::config::{HammingConfig, RequestConfig};
use crate::error::{CallError, CallResult};

#[derive(Debug, Serialize)]
struct StartCallRequest {
    phone_number: String,
    prompt: String,
    webhook_url: String,
}

#[derive(Debug, Deserialize)]
struct StartCallResponse {
    id: String,
}

/// Call event delivered to the webhook endpoint.
#[derive(Debug, Clone, Deserialize)]
struct RecordingEvent {
    id: String,
    #[serde(default)]
    recording_available: bool,
}

enum Slot {
    Waiting(oneshot::Sender<RecordingEvent>),
    Ready(RecordingEvent),
}

#[derive(Default)]
struct WebhookState {
    slots: Mutex<HashMap<String, Slot>>,
}

/// Embedded listener for asynchronous "recording ready" callbacks.
///
/// The voice API signals recording availability by POSTing to a webhook URL;
/// each waiting call is parked on a oneshot channel keyed by call id. Events
/// that arrive before anyone waits are buffered so the notification is never
/// lost to the registration race.
pub struct WebhookListener {
    state: Arc<WebhookState>,
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl WebhookListener {
    /// Bind the listener on `127.0.0.1:port` (use port 0 for an ephemeral
    /// port) and start serving in the background.
    pub async fn bind(port: u16) -> CallResult<Self> {
        let state = Arc::new(WebhookState::default());

        let app = Router::new()
            .route("/webhook", post(webhook_handler))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .map_err(|e| CallError::Transport {
                message: format!("failed to bind webhook listener: {}", e),
            })?;
        let addr = listener.local_addr().map_err(|e| CallError::Transport {
            message: format!("failed to read webhook listener address: {}", e),
        })?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        tokio::spawn(async move {
            info!(%addr, "Webhook listener started");
            let serve = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = serve.await {
                warn!(error = %e, "Webhook listener stopped with error");
            }
        });

        Ok(Self {
            state,
            addr,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    /// The local address the listener is bound to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    fn wait_for(&self, call_id: &str) -> WaitOutcome {
        let mut slots = self.state.slots.lock().expect("webhook lock poisoned");
        match slots.remove(call_id) {
            Some(Slot::Ready(event)) => WaitOutcome::Ready(event),
            _ => {
                let (tx, rx) = oneshot::channel();
                slots.insert(call_id.to_string(), Slot::Waiting(tx));
                WaitOutcome::Parked(rx)
            }
        }
    }

    fn forget(&self, call_id: &str) {
        self.state
            .slots
            .lock()
            .expect("webhook lock poisoned")
            .remove(call_id);
    }
}

impl Drop for WebhookListener {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

enum WaitOutcome {
    Ready(RecordingEvent),
    Parked(oneshot::Receiver<RecordingEvent>),
}

async fn webhook_handler(
    State(state): State<Arc<WebhookState>>,
    Json(event): Json<RecordingEvent>,
) -> Json<serde_json::Value> {
    if !event.recording_available {
        return Json(json!({"status": "waiting"}));
    }

    let mut slots = state.slots.lock().expect("webhook lock poisoned");
    match slots.remove(&event.id) {
        Some(Slot::Waiting(tx)) => {
            let _ = tx.send(event);
        }
        _ => {
            // Nobody is waiting yet; buffer so fetch_recording finds it.
            slots.insert(event.id.clone(), Slot::Ready(event));
        }
    }
    Json(json!({"status": "ok"}))
}

/// Client for the Hamming voice API: starts calls and downloads recordings
/// once the webhook confirms they are ready.
pub struct HammingVoiceClient {
    client: Client,
    base_url: String,
    api_key: String,
    webhook_url: String,
    listener: WebhookListener,
}

impl HammingVoiceClient {
    /// Create a client and start its webhook listener.
    pub async fn new(config: &HammingConfig, request_config: &RequestConfig) -> CallResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(CallError::Http)?;

        let listener = WebhookListener::bind(config.webhook_port).await?;
        let webhook_url = format!("{}/webhook", config.webhook_url.trim_end_matches('/'));

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            webhook_url,
            listener,
        })
    }

    /// The webhook URL passed to the voice API (for testing).
    pub fn webhook_url(&self) -> &str {
        &self.webhook_url
    }

    /// The local webhook listener (for testing).
    pub fn listener(&self) -> &WebhookListener {
        &self.listener
    }
}

#[async_trait]
impl VoiceClient for HammingVoiceClient {
    async fn place_call(&self, target: &str, utterance: &str) -> CallResult<CallHandle> {
        let request = StartCallRequest {
            phone_number: target.to_string(),
            prompt: utterance.to_string(),
            webhook_url: self.webhook_url.clone(),
        };

        let response = self
            .client
            .post(format!("{}/rest/exercise/start-call", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(CallError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(CallError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        let call: StartCallResponse = response.json().await.map_err(|e| CallError::Transport {
            message: format!("failed to parse start-call response: {}", e),
        })?;

        debug!(call_id = %call.id, target, "Call started");
        Ok(CallHandle { id: call.id })
    }

    async fn fetch_recording(
        &self,
        handle: &CallHandle,
        timeout: Duration,
    ) -> CallResult<AudioRecording> {
        let event = match self.listener.wait_for(&handle.id) {
            WaitOutcome::Ready(event) => event,
            WaitOutcome::Parked(rx) => match tokio::time::timeout(timeout, rx).await {
                Ok(Ok(event)) => event,
                Ok(Err(_)) => {
                    self.listener.forget(&handle.id);
                    return Err(CallError::Transport {
                        message: "webhook listener dropped the callback channel".to_string(),
                    });
                }
                Err(_) => {
                    self.listener.forget(&handle.id);
                    return Err(CallError::RecordingTimeout {
                        call_id: handle.id.clone(),
                        timeout_s: timeout.as_secs(),
                    });
                }
            },
        };

        debug!(call_id = %event.id, "Recording ready, downloading");

        let response = self
            .client
            .get(format!("{}/media/exercise", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .query(&[("id", handle.id.as_str())])
            .send()
            .await
            .map_err(CallError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(CallError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        let bytes = response.bytes().await.map_err(CallError::Http)?;
        Ok(AudioRecording {
            bytes: bytes.to_vec(),
            mime_type: "audio/wav".to_string(),
        })
    }
}
