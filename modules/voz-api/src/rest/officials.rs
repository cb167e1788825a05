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
use crate::error::{ApiError, ApiResult};
use crate::routes::AppState;

#[derive(Deserialize)]
pub struct StatusRequest {
    status: Option<String>,
}

#[derive(Deserialize)]
pub struct ResponseRequest {
    text: String,
}

pub async fn set_status(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Path(id): Path<String>,
    payload: Result<Json<StatusRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let report_id = parse_id(&id)?;
    let Json(body) = payload?;
    let status = body
        .status
        .ok_or_else(|| ApiError::BadRequest("status is required".into()))?;

    let update = state
        .engine
        .official_set_status(report_id, &principal, &status)
        .await?;
    Ok(Json(json!({
        "report": update.report,
        "changed": update.transition.is_changed(),
    }))
    .into_response())
}

pub async fn submit_response(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Path(id): Path<String>,
    payload: Result<Json<ResponseRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let report_id = parse_id(&id)?;
    let Json(body) = payload?;
    let response = state
        .engine
        .submit_official_response(report_id, &principal, &body.text)
        .await?;
    Ok((StatusCode::CREATED, Json(response)).into_response())
}

pub async fn my_authority(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
) -> ApiResult<Response> {
    let entity = state.engine.authority_of(&principal).await?;
    Ok(Json(json!({ "entity": entity })).into_response())
}

pub async fn my_jurisdiction_reports(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
) -> ApiResult<Response> {
    let reports = state.engine.my_jurisdiction_reports(&principal).await?;
    Ok(Json(json!({ "reports": reports })).into_response())
}

pub async fn my_responses(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
) -> ApiResult<Response> {
    let responses = state.engine.my_official_responses(&principal).await?;
    Ok(Json(json!({ "responses": responses })).into_response())
}
