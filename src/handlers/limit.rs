use axum::{Json, extract::State};
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;

use crate::identity::ClientId;
use crate::rate_limit::LimitStatus;
use crate::state::AppState;

#[derive(Serialize, Debug)]
pub struct QuotaReport {
    #[serde(flatten)]
    pub status: LimitStatus,
    pub limit: u32,
    pub date: NaiveDate,
    pub enforced: bool,
}

// Quota of the calling client, without consuming any
pub async fn limit_handler(
    State(state): State<Arc<AppState>>,
    ClientId(client): ClientId,
) -> Json<QuotaReport> {
    let limiter = &state.rate_limiter;
    Json(QuotaReport {
        status: limiter.check_limit(&client),
        limit: limiter.daily_limit(),
        date: limiter.today(),
        enforced: state.enforce_rate_limit,
    })
}
