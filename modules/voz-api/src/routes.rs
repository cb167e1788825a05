use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use voz_engine::CivicEngine;

use crate::jwt::JwtService;
use crate::rest;

pub struct AppState {
    pub engine: CivicEngine,
    pub jwt: JwtService,
}

pub fn build_router(state: Arc<AppState>, allowed_origins: &[String]) -> Router {
    let cors = if allowed_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .route("/health", get(health))
        // Reports
        .route("/api/reports", post(rest::reports::submit_report))
        .route("/api/reports/{id}", get(rest::reports::report_detail))
        .route("/api/reports/{id}/resolve", post(rest::reports::resolve_report))
        .route("/api/reports/{id}/status", post(rest::officials::set_status))
        .route("/api/reports/{id}/response", post(rest::officials::submit_response))
        // Comments
        .route(
            "/api/reports/{id}/comments",
            get(rest::comments::list_comments).post(rest::comments::add_comment),
        )
        .route("/api/comments/{id}", delete(rest::comments::delete_comment))
        .route("/api/me/reports", get(rest::reports::my_reports))
        // Officials
        .route("/api/me/authority", get(rest::officials::my_authority))
        .route(
            "/api/me/jurisdiction/reports",
            get(rest::officials::my_jurisdiction_reports),
        )
        .route("/api/me/responses", get(rest::officials::my_responses))
        .with_state(state)
        .layer(cors)
        // Method + path + status + latency only
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }),
        )
}

async fn health() -> &'static str {
    "ok"
}
