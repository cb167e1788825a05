//! Incoming report drafts and their validation.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use voz_common::{GeoPoint, Jurisdiction, NewReport, ReportLocation};
use voz_store::ReportStore;

use crate::error::{EngineError, EngineResult};

/// Column width of `reports.title`.
pub const MAX_TITLE_CHARS: usize = 200;

/// A report as submitted by a citizen. City, state and jurisdiction were
/// already resolved by the client's geocoding step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDraft {
    pub title: String,
    pub description: String,
    pub category_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub city_id: Uuid,
    pub state_id: Uuid,
    pub jurisdiction: String,
    pub photo_ref: String,
}

impl ReportDraft {
    /// Field-level checks that need no store access.
    pub fn normalize(&self) -> EngineResult<NewReport> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(EngineError::validation("title is required"));
        }
        if title.chars().count() > MAX_TITLE_CHARS {
            return Err(EngineError::validation(format!(
                "title must be at most {MAX_TITLE_CHARS} characters"
            )));
        }

        let description = self.description.trim();
        if description.is_empty() {
            return Err(EngineError::validation("description is required"));
        }

        let photo_ref = self.photo_ref.trim();
        if photo_ref.is_empty() {
            return Err(EngineError::validation("photo is required"));
        }

        let point = GeoPoint::new(self.latitude, self.longitude)?;

        let jurisdiction: Jurisdiction = self.jurisdiction.parse().map_err(|_| {
            EngineError::validation(format!(
                "invalid jurisdiction '{}': expected MUNICIPAL, STATE, FEDERAL or PRIVATE",
                self.jurisdiction
            ))
        })?;

        Ok(NewReport {
            title: title.to_string(),
            description: description.to_string(),
            category_id: self.category_id,
            location: ReportLocation {
                point,
                city_id: self.city_id,
                state_id: self.state_id,
            },
            jurisdiction,
            photo_ref: photo_ref.to_string(),
        })
    }

    /// Full validation: field checks, then the category and locality references.
    pub async fn validate(&self, store: &dyn ReportStore) -> EngineResult<NewReport> {
        let report = self.normalize()?;

        if store.find_category(report.category_id).await?.is_none() {
            return Err(EngineError::validation("unknown category"));
        }

        let city = store
            .find_city(report.location.city_id)
            .await?
            .ok_or_else(|| EngineError::validation("unknown city"))?;
        if city.state_id != report.location.state_id {
            return Err(EngineError::validation("city does not belong to the given state"));
        }

        Ok(report)
    }
}
