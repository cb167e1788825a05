//! Radius-based deduplication of incoming reports.
//!
//! A submission merges into the most recently created report of the same
//! category whose location lies within the merge radius. Candidates are
//! scanned newest first and the first hit wins, even if an older report is
//! closer. With no hit, the submission becomes a new report.

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use voz_common::file_config::DEFAULT_DEDUP_RADIUS_METERS;
use voz_common::{GeoPoint, NewReport, Report};
use voz_store::ReportStore;

use crate::error::{EngineError, EngineResult};

/// Result of a submission.
///
/// `created` and `support_added` are never both true. Both false means
/// the user already authored or supported the matched report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitOutcome {
    pub report: Report,
    pub created: bool,
    pub support_added: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DedupPolicy {
    radius_meters: f64,
}

impl Default for DedupPolicy {
    fn default() -> Self {
        Self {
            radius_meters: DEFAULT_DEDUP_RADIUS_METERS,
        }
    }
}

impl DedupPolicy {
    pub fn new(radius_meters: f64) -> EngineResult<Self> {
        if !radius_meters.is_finite() || radius_meters <= 0.0 {
            return Err(EngineError::validation(format!(
                "dedup radius must be positive, got {radius_meters}"
            )));
        }
        Ok(Self { radius_meters })
    }

    pub fn radius_meters(&self) -> f64 {
        self.radius_meters
    }

    /// First candidate within the radius (inclusive), in the given order.
    /// Callers pass candidates newest first.
    pub fn first_match<'a>(&self, point: &GeoPoint, candidates: &'a [Report]) -> Option<&'a Report> {
        candidates
            .iter()
            .find(|r| r.location.point.distance_to(point) <= self.radius_meters)
    }
}

/// Merge `report` into a nearby existing report or persist it as new.
///
/// Runs as one store transaction holding the category lock, so two
/// concurrent submissions at one spot cannot both miss each other.
pub async fn submit(
    store: &dyn ReportStore,
    policy: &DedupPolicy,
    report: NewReport,
    user_id: Uuid,
) -> EngineResult<SubmitOutcome> {
    let mut tx = store.begin().await?;
    tx.lock_category(report.category_id).await?;

    let candidates = tx.find_reports_by_category(report.category_id).await?;
    debug!(
        category_id = %report.category_id,
        candidates = candidates.len(),
        "Scanning dedup candidates"
    );

    if let Some(existing) = policy.first_match(&report.location.point, &candidates) {
        let existing = existing.clone();

        // Authors never support their own report.
        if existing.author_id == user_id || tx.has_support(existing.id, user_id).await? {
            tx.commit().await?;
            debug!(report_id = %existing.id, %user_id, "User already authored or supports report");
            return Ok(SubmitOutcome {
                report: existing,
                created: false,
                support_added: false,
            });
        }

        let support_added = match tx.insert_support(existing.id, user_id).await {
            Ok(_) => true,
            // Another request from the same user won the race.
            Err(e) if e.is_unique_violation() => false,
            Err(e) => return Err(e.into()),
        };
        tx.commit().await?;

        info!(
            report_id = %existing.id,
            %user_id,
            support_added,
            "Submission merged into existing report"
        );
        return Ok(SubmitOutcome {
            report: existing,
            created: false,
            support_added,
        });
    }

    let created = tx.insert_report(user_id, &report).await?;
    tx.commit().await?;

    info!(
        report_id = %created.id,
        category_id = %created.category_id,
        jurisdiction = %created.jurisdiction,
        "Report created"
    );
    Ok(SubmitOutcome {
        report: created,
        created: true,
        support_added: false,
    })
}
