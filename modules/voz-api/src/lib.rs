//! REST surface for the report engine.
//!
//! Callers authenticate with a bearer JWT issued by the login service.

pub mod auth;
pub mod error;
pub mod jwt;
pub mod rest;
pub mod routes;

pub use error::{ApiError, ApiResult};
pub use jwt::JwtService;
pub use routes::{build_router, AppState};
