//! Report status transitions.
//!
//! Two paths mutate a report's status: the author resolving their own
//! report, and an official whose entity has jurisdiction setting any
//! status. Both read the report under a row lock and write in the same
//! transaction.

use tracing::info;
use uuid::Uuid;

use voz_common::{Principal, Report, ReportStatus};
use voz_store::{ReportStore, StoreTx};

use crate::error::{EngineError, EngineResult};
use crate::jurisdiction::{authority_in_tx, authorize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Changed { from: ReportStatus, to: ReportStatus },
    Unchanged,
}

impl Transition {
    pub fn is_changed(&self) -> bool {
        matches!(self, Self::Changed { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub report: Report,
    pub transition: Transition,
}

/// Mark a report RESOLVED. Only its author may do this; resolving an
/// already-resolved report succeeds without a write.
pub async fn resolve(
    store: &dyn ReportStore,
    report_id: Uuid,
    actor: &Principal,
) -> EngineResult<StatusUpdate> {
    let mut tx = store.begin().await?;
    let report = tx
        .find_report_for_update(report_id)
        .await?
        .ok_or(EngineError::NotFound("report"))?;

    if report.author_id != actor.user_id {
        return Err(EngineError::forbidden("only the author can resolve this report"));
    }

    let update = apply(tx.as_mut(), report, ReportStatus::Resolved).await?;
    tx.commit().await?;
    log_update(&update, actor, "author");
    Ok(update)
}

/// Set any status, including reopening a resolved report. The actor must
/// be staff of an entity with jurisdiction over the report.
pub async fn set_status(
    store: &dyn ReportStore,
    report_id: Uuid,
    actor: &Principal,
    target: &str,
) -> EngineResult<StatusUpdate> {
    let target: ReportStatus = target.parse().map_err(|_| {
        EngineError::validation(format!(
            "invalid status '{target}': expected one of {}",
            ReportStatus::ALL
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    })?;

    let mut tx = store.begin().await?;
    let report = tx
        .find_report_for_update(report_id)
        .await?
        .ok_or(EngineError::NotFound("report"))?;

    let authority = authority_in_tx(tx.as_mut(), actor).await?;
    if !authorize(authority.as_ref(), &report) {
        return Err(EngineError::forbidden("not allowed to change the status of this report"));
    }

    let update = apply(tx.as_mut(), report, target).await?;
    tx.commit().await?;
    log_update(&update, actor, "official");
    Ok(update)
}

async fn apply(
    tx: &mut dyn StoreTx,
    mut report: Report,
    to: ReportStatus,
) -> EngineResult<StatusUpdate> {
    let from = report.status;
    if from == to {
        return Ok(StatusUpdate {
            report,
            transition: Transition::Unchanged,
        });
    }

    tx.update_report_status(report.id, to).await?;
    report.status = to;
    Ok(StatusUpdate {
        report,
        transition: Transition::Changed { from, to },
    })
}

fn log_update(update: &StatusUpdate, actor: &Principal, via: &str) {
    match update.transition {
        Transition::Changed { from, to } => info!(
            report_id = %update.report.id,
            actor = %actor.user_id,
            via,
            %from,
            %to,
            "Report status changed"
        ),
        Transition::Unchanged => info!(
            report_id = %update.report.id,
            actor = %actor.user_id,
            via,
            status = %update.report.status,
            "Report status already set"
        ),
    }
}
