use axum::extract::State;
use serde::Serialize;

use crate::app::Services;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::BoardStats;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub board: BoardStats,
    pub rate_limit_counters: usize,
    pub throttle_signatures: usize,
    pub cached_responses: usize,
    pub route_policies: usize,
}

/// GET /api/admin/stats - runtime counters
pub async fn stats(State(services): State<Services>) -> ApiResult<Stats> {
    Ok(ApiResponse::success(Stats {
        board: services.board.stats(),
        rate_limit_counters: services.rate_limits.len(),
        throttle_signatures: services.throttles.len(),
        cached_responses: services.cache_store.len(),
        route_policies: services.policies.len(),
    }))
}
