use axum::body::Bytes;
use axum::http::StatusCode;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::error::RelayError;
use crate::metrics::{UPSTREAM_ERRORS, UPSTREAM_LATENCY};
use crate::models::{ChatMessage, CompletionRequest, reply_text};
use crate::prompt::SYSTEM_PROMPT;

// Chat-completion API the relay forwards to
pub struct Upstream {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
}

impl Upstream {
    pub fn new(
        url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            model: model.into(),
            // an empty variable counts as unset
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    /// One non-streaming completion for `conversation`, with the system prompt
    /// put in front. Returns the upstream body untouched on success.
    pub async fn complete(&self, conversation: Vec<Value>) -> Result<Bytes, RelayError> {
        let api_key = self.api_key.as_deref().ok_or(RelayError::MissingCredential)?;

        let mut messages = Vec::with_capacity(conversation.len() + 1);
        let system = serde_json::to_value(ChatMessage::system(SYSTEM_PROMPT))
            .map_err(|e| RelayError::Internal(e.to_string()))?;
        messages.push(system);
        messages.extend(conversation);

        let request = CompletionRequest {
            model: &self.model,
            messages,
            stream: false,
        };

        info!(
            model = %self.model,
            messages = request.messages.len(),
            "sending request to upstream"
        );

        let start_time = Instant::now();
        let result = self
            .client
            .post(&self.url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await;
        UPSTREAM_LATENCY.observe(start_time.elapsed().as_secs_f64());

        let res = result.inspect_err(|_| UPSTREAM_ERRORS.inc())?;
        let status = res.status();

        if !status.is_success() {
            UPSTREAM_ERRORS.inc();
            let details = res.text().await?;
            let status =
                StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
            return Err(RelayError::Upstream { status, details });
        }

        let body = res.bytes().await?;
        let parsed: Value = serde_json::from_slice(&body)
            .map_err(|e| RelayError::Internal(format!("upstream returned invalid JSON: {e}")))?;

        let reply = reply_text(&parsed).unwrap_or("No response");
        info!(chars = reply.chars().count(), "received upstream response");
        debug!(%reply, "upstream reply");

        Ok(body)
    }
}
