pub mod comments;
pub mod officials;
pub mod reports;

use uuid::Uuid;

use crate::error::ApiError;

fn parse_id(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id).map_err(|_| ApiError::BadRequest(format!("invalid id: {id}")))
}
