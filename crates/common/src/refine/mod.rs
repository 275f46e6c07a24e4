//! Refinement service wire types and client
//!
//! The refinement service takes a manuscript and returns it with citations
//! inserted plus the bibliography in plain and BibTeX form. Progress is pushed
//! over a companion WebSocket; listening to it is optional and bounded by a
//! soft connect timeout.

use crate::config::RefinementConfig;
use crate::errors::{AppError, Result};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

/// `POST /refine` body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefineRequest {
    pub manuscript_text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_results: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_cache: Option<bool>,
}

impl RefineRequest {
    pub fn new(manuscript_text: impl Into<String>) -> Self {
        Self {
            manuscript_text: manuscript_text.into(),
            ..Default::default()
        }
    }

    /// Caching is off unless the caller explicitly asked for it
    pub fn no_cache(&self) -> bool {
        self.no_cache.unwrap_or(true)
    }

    /// Positive `max_results`, if any
    pub fn max_results(&self) -> Option<usize> {
        self.max_results.filter(|&n| n > 0)
    }
}

/// `POST /refine` response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefineResponse {
    pub processed_text: String,
    pub bibliography_text: String,
    pub bibtex: String,
}

impl RefineResponse {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Event on the progress channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProgressEvent {
    Progress { progress: f64, message: String },
    Error { message: String },
    Ping,
}

impl ProgressEvent {
    pub fn progress(progress: f64, message: impl Into<String>) -> Self {
        ProgressEvent::Progress {
            progress: progress.clamp(0.0, 1.0),
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ProgressEvent::Error {
            message: message.into(),
        }
    }
}

/// Client for a remote refinement service
pub struct RefinementClient {
    client: reqwest::Client,
    base_url: String,
    progress_timeout: Duration,
}

impl RefinementClient {
    pub fn new(config: &RefinementConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            progress_timeout: config.progress_connect_timeout(),
        })
    }

    /// Submit a manuscript. There is no internal timeout; failures surface from
    /// the HTTP call itself.
    pub async fn refine(&self, request: &RefineRequest) -> Result<RefineResponse> {
        let mut body = request.clone();
        body.no_cache = Some(request.no_cache());

        let url = format!("{}/refine", self.base_url);
        let response = self.client.post(&url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Refinement {
                status: status.as_u16(),
                message: error_message(status, &text),
            });
        }

        Ok(response.json::<RefineResponse>().await?)
    }

    /// Connect to the progress channel. Returns `None` when the connection is
    /// not established within the soft timeout.
    pub async fn subscribe_progress(&self) -> Option<mpsc::Receiver<ProgressEvent>> {
        let url = progress_url(&self.base_url);

        let (stream, _) = match tokio::time::timeout(self.progress_timeout, connect_async(url.as_str())).await {
            Ok(Ok(connected)) => connected,
            Ok(Err(e)) => {
                warn!(error = %e, url = %url, "Progress channel unavailable, continuing without it");
                return None;
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.progress_timeout.as_millis() as u64,
                    "Progress channel connect timed out, continuing without it"
                );
                return None;
            }
        };

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            let (_, mut read) = stream.split();
            while let Some(message) = read.next().await {
                let text = match message {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => continue,
                };
                match serde_json::from_str::<ProgressEvent>(&text) {
                    Ok(ProgressEvent::Ping) => {}
                    Ok(event) => {
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => debug!(error = %e, "Ignoring malformed progress message"),
                }
            }
        });

        Some(rx)
    }

    /// Refine while forwarding progress events to `on_progress` as they arrive
    pub async fn refine_with_progress<F>(
        &self,
        request: &RefineRequest,
        mut on_progress: F,
    ) -> Result<RefineResponse>
    where
        F: FnMut(ProgressEvent) + Send,
    {
        let Some(mut events) = self.subscribe_progress().await else {
            return self.refine(request).await;
        };

        let refine = self.refine(request);
        tokio::pin!(refine);

        loop {
            tokio::select! {
                result = &mut refine => {
                    info!(success = result.is_ok(), "Refinement finished");
                    return result;
                }
                Some(event) = events.recv() => on_progress(event),
            }
        }
    }
}

fn progress_url(base_url: &str) -> String {
    let ws_base = if let Some(rest) = base_url.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base_url.to_string()
    };
    format!("{}/ws", ws_base)
}

/// Human-readable message from an error body: `detail` when present
fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(String::from))
        .or_else(|| (!body.trim().is_empty()).then(|| body.trim().to_string()))
        .unwrap_or_else(|| format!("Refinement failed with status {}", status))
}
