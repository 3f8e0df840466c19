use axum::body::Bytes;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::RelayError;
use crate::identity::ClientId;
use crate::metrics::{RATE_LIMITED, REQUEST_TOTAL, TRACKED_CLIENTS};
use crate::models::{conversation, preview};
use crate::state::AppState;

const PREVIEW_CHARS: usize = 200;

/// `POST /api/chat`: forwards the conversation upstream and relays the reply.
///
/// With enforcement on, the quota is checked before anything is sent and
/// charged only once the upstream call has succeeded.
pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    ClientId(client): ClientId,
    body: Bytes,
) -> Result<Response, RelayError> {
    REQUEST_TOTAL.inc();
    info!(%client, "received chat request");

    let Some(messages) = conversation(&body) else {
        return Err(RelayError::InvalidRequest);
    };

    info!(count = messages.len(), "messages in conversation");
    for (i, message) in messages.iter().enumerate() {
        let (role, text) = preview(message, PREVIEW_CHARS);
        debug!("  [{}] {}: {}", i + 1, role, text);
    }

    if !state.upstream.has_credential() {
        return Err(RelayError::MissingCredential);
    }

    let limiter = &state.rate_limiter;
    if state.enforce_rate_limit {
        let status = limiter.check_limit(&client);
        if !status.allowed {
            RATE_LIMITED.inc();
            warn!(%client, count = status.count, "daily limit reached");
            return Err(RelayError::RateLimited {
                limit: limiter.daily_limit(),
            });
        }
    }

    let reply = state.upstream.complete(messages).await?;

    if state.enforce_rate_limit {
        let usage = limiter.increment_limit(&client);
        TRACKED_CLIENTS.set(limiter.len() as f64);
        debug!(%client, count = usage.count, remaining = usage.remaining, "quota charged");
    }

    Ok(([(header::CONTENT_TYPE, "application/json")], reply).into_response())
}
