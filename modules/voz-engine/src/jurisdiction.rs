//! Which government entity a user acts for, and which reports it may act on.
//!
//! A city-scoped entity covers MUNICIPAL reports filed in its city; a
//! state-scoped entity covers STATE reports filed in its state. FEDERAL and
//! PRIVATE reports are outside every entity's authority.

use voz_common::{EntityScope, GovernmentEntity, Jurisdiction, Principal, Report};
use voz_store::{ReportFilter, ReportStore, StoreTx};

use crate::error::EngineResult;

/// The entity `principal` acts for, if any.
///
/// Only government officials have authority. Staff of several entities act
/// for the one with the lowest id.
pub async fn authority_of(
    store: &dyn ReportStore,
    principal: &Principal,
) -> EngineResult<Option<GovernmentEntity>> {
    if !principal.is_official() {
        return Ok(None);
    }
    let entities = store.entities_for_staff(principal.user_id).await?;
    Ok(entities.into_iter().next())
}

/// Same as [`authority_of`], read inside an open transaction.
pub async fn authority_in_tx(
    tx: &mut dyn StoreTx,
    principal: &Principal,
) -> EngineResult<Option<GovernmentEntity>> {
    if !principal.is_official() {
        return Ok(None);
    }
    let entities = tx.entities_for_staff(principal.user_id).await?;
    Ok(entities.into_iter().next())
}

pub fn matches(entity: &GovernmentEntity, report: &Report) -> bool {
    match entity.scope {
        EntityScope::City(city_id) => {
            report.location.city_id == city_id && report.jurisdiction == Jurisdiction::Municipal
        }
        EntityScope::State(state_id) => {
            report.location.state_id == state_id && report.jurisdiction == Jurisdiction::State
        }
    }
}

pub fn authorize(authority: Option<&GovernmentEntity>, report: &Report) -> bool {
    authority.is_some_and(|entity| matches(entity, report))
}

/// FEDERAL and PRIVATE reports are visible to their author only.
pub fn visible_to(report: &Report, principal: &Principal) -> bool {
    match report.jurisdiction {
        Jurisdiction::Municipal | Jurisdiction::State => true,
        Jurisdiction::Federal | Jurisdiction::Private => report.author_id == principal.user_id,
    }
}

/// Listing filter selecting exactly the reports `matches` accepts for `entity`.
pub fn report_filter(entity: &GovernmentEntity) -> ReportFilter {
    match entity.scope {
        EntityScope::City(city_id) => ReportFilter {
            city_id: Some(city_id),
            jurisdiction: Some(Jurisdiction::Municipal),
            ..Default::default()
        },
        EntityScope::State(state_id) => ReportFilter {
            state_id: Some(state_id),
            jurisdiction: Some(Jurisdiction::State),
            ..Default::default()
        },
    }
}
