use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use voz_engine::ReportDraft;

use super::parse_id;
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::routes::AppState;

/// 201 when the submission became a new report, 200 when it was merged
/// into an existing one.
pub async fn submit_report(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    payload: Result<Json<ReportDraft>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(draft) = payload?;
    let outcome = state.engine.submit_report(&draft, &principal).await?;
    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome)).into_response())
}

pub async fn report_detail(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let detail = state.engine.get_report(parse_id(&id)?, &principal).await?;
    Ok(Json(detail).into_response())
}

pub async fn my_reports(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
) -> ApiResult<Response> {
    let reports = state.engine.my_reports(&principal).await?;
    Ok(Json(json!({ "reports": reports })).into_response())
}

pub async fn resolve_report(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let update = state
        .engine
        .resolve_own_report(parse_id(&id)?, &principal)
        .await?;
    Ok(Json(json!({
        "report": update.report,
        "changed": update.transition.is_changed(),
    }))
    .into_response())
}
