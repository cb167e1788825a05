use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::json;

use super::parse_id;
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::routes::AppState;

#[derive(Deserialize)]
pub struct CommentRequest {
    text: String,
}

pub async fn list_comments(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let comments = state.engine.list_comments(parse_id(&id)?, &principal).await?;
    Ok(Json(json!({ "comments": comments })).into_response())
}

pub async fn add_comment(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Path(id): Path<String>,
    payload: Result<Json<CommentRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let report_id = parse_id(&id)?;
    let Json(body) = payload?;
    let comment = state
        .engine
        .add_comment(report_id, &principal, &body.text)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)).into_response())
}

pub async fn delete_comment(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .engine
        .delete_comment(parse_id(&id)?, &principal)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
