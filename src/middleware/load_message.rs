use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    middleware::Next,
    response::Response,
    RequestPartsExt,
};
use serde_json::json;

use crate::guard::ownership::DEFAULT_RESOURCE_PARAMS;
use crate::request::LoadedResource;
use crate::services::MessageBoard;

/// Resolve the message named by the route and attach it as the loaded resource.
///
/// A missing message is not an error here: the ownership guard reports
/// "Resource not found" when nothing was attached.
pub async fn load_message_middleware(
    State(board): State<Arc<MessageBoard>>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();

    let params = parts
        .extract::<Path<HashMap<String, String>>>()
        .await
        .map(|Path(params)| params)
        .unwrap_or_default();

    let message = DEFAULT_RESOURCE_PARAMS
        .iter()
        .filter_map(|name| params.get(*name))
        .find(|value| !value.is_empty())
        .and_then(|id| board.get(id));

    if let Some(message) = message {
        parts
            .extensions
            .insert(LoadedResource::new(message.id, json!(message.sender_id)));
    }

    next.run(Request::from_parts(parts, body)).await
}
