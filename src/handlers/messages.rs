use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::app::Services;
use crate::auth::CallerIdentity;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::ChatMessage;

const DEFAULT_PAGE_SIZE: usize = 50;
const MAX_PAGE_SIZE: usize = 500;
const MAX_BODY_CHARS: usize = 4000;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PostMessage {
    pub body: String,
}

/// GET /api/groups/:groupId/messages - list a group's messages
pub async fn list(
    State(services): State<Services>,
    Path(group_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<ChatMessage>> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
    Ok(ApiResponse::success(services.board.list(&group_id, limit)))
}

/// POST /api/groups/:groupId/messages - post as the calling user
pub async fn post(
    State(services): State<Services>,
    Path(group_id): Path<String>,
    Extension(caller): Extension<CallerIdentity>,
    Json(payload): Json<PostMessage>,
) -> ApiResult<ChatMessage> {
    let body = payload.body.trim();
    if body.is_empty() {
        return Err(ApiError::bad_request("Message body must not be empty"));
    }
    if body.chars().count() > MAX_BODY_CHARS {
        return Err(ApiError::bad_request(format!(
            "Message body exceeds {} characters",
            MAX_BODY_CHARS
        )));
    }

    let message = services.board.post(&group_id, &caller.id, body);
    tracing::info!("Message {} posted to group {} by {}", message.id, group_id, caller.id);
    Ok(ApiResponse::created(message))
}

/// DELETE /api/messages/:messageId - sender deletes their own message
pub async fn delete_own(
    State(services): State<Services>,
    Path(message_id): Path<String>,
) -> ApiResult<ChatMessage> {
    services
        .board
        .remove(&message_id)
        .map(ApiResponse::success)
        .ok_or_else(|| ApiError::not_found("Message not found"))
}

/// DELETE /api/groups/:groupId/messages/:messageId - group admin removes a message
pub async fn moderate(
    State(services): State<Services>,
    Path((group_id, message_id)): Path<(String, String)>,
) -> ApiResult<ChatMessage> {
    match services.board.get(&message_id) {
        Some(message) if message.group_id == group_id => services
            .board
            .remove(&message_id)
            .map(ApiResponse::success)
            .ok_or_else(|| ApiError::not_found("Message not found")),
        _ => Err(ApiError::not_found("Message not found")),
    }
}
