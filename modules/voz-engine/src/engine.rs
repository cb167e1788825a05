use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use voz_common::{Comment, GovernmentEntity, OfficialResponse, Principal, Report};
use voz_store::{ReportFilter, ReportStore};

use crate::dedup::{self, DedupPolicy, SubmitOutcome};
use crate::draft::ReportDraft;
use crate::error::{EngineError, EngineResult};
use crate::jurisdiction::{self, authority_in_tx};
use crate::lifecycle::{self, StatusUpdate};

/// A report with its aggregate counters, as shown on a detail page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportDetail {
    #[serde(flatten)]
    pub report: Report,
    pub support_count: i64,
    pub official_response: Option<OfficialResponse>,
}

/// Entry point for request handlers. Cheap to clone.
#[derive(Clone)]
pub struct CivicEngine {
    store: Arc<dyn ReportStore>,
    dedup: DedupPolicy,
}

impl CivicEngine {
    pub fn new(store: Arc<dyn ReportStore>, dedup: DedupPolicy) -> Self {
        Self { store, dedup }
    }

    pub fn store(&self) -> &dyn ReportStore {
        self.store.as_ref()
    }

    // -----------------------------------------------------------------------
    // Reports
    // -----------------------------------------------------------------------

    pub async fn submit_report(
        &self,
        draft: &ReportDraft,
        principal: &Principal,
    ) -> EngineResult<SubmitOutcome> {
        let report = draft.validate(self.store()).await?;
        dedup::submit(self.store(), &self.dedup, report, principal.user_id).await
    }

    pub async fn resolve_own_report(
        &self,
        report_id: Uuid,
        principal: &Principal,
    ) -> EngineResult<StatusUpdate> {
        lifecycle::resolve(self.store(), report_id, principal).await
    }

    pub async fn official_set_status(
        &self,
        report_id: Uuid,
        principal: &Principal,
        status: &str,
    ) -> EngineResult<StatusUpdate> {
        lifecycle::set_status(self.store(), report_id, principal, status).await
    }

    /// Detail view. FEDERAL and PRIVATE reports read as not found for
    /// anyone but their author.
    pub async fn get_report(&self, report_id: Uuid, viewer: &Principal) -> EngineResult<ReportDetail> {
        let report = self.visible_report(report_id, viewer).await?;
        let support_count = self.store.support_count(report_id).await?;
        let official_response = self.store.response_for_report(report_id).await?;
        Ok(ReportDetail {
            report,
            support_count,
            official_response,
        })
    }

    /// Reports authored by the principal, newest first.
    pub async fn my_reports(&self, principal: &Principal) -> EngineResult<Vec<Report>> {
        let filter = ReportFilter {
            author_id: Some(principal.user_id),
            ..Default::default()
        };
        Ok(self.store.find_reports(&filter).await?)
    }

    // -----------------------------------------------------------------------
    // Jurisdiction
    // -----------------------------------------------------------------------

    pub async fn authority_of(&self, principal: &Principal) -> EngineResult<Option<GovernmentEntity>> {
        jurisdiction::authority_of(self.store(), principal).await
    }

    /// Reports the principal's entity has jurisdiction over, newest first.
    /// Empty for anyone without authority.
    pub async fn my_jurisdiction_reports(&self, principal: &Principal) -> EngineResult<Vec<Report>> {
        let Some(entity) = self.authority_of(principal).await? else {
            return Ok(Vec::new());
        };
        let filter = jurisdiction::report_filter(&entity);
        Ok(self.store.find_reports(&filter).await?)
    }

    /// Attach the entity's one and only response to a report.
    pub async fn submit_official_response(
        &self,
        report_id: Uuid,
        principal: &Principal,
        text: &str,
    ) -> EngineResult<OfficialResponse> {
        let text = text.trim();
        if text.is_empty() {
            return Err(EngineError::validation("response text is required"));
        }

        let mut tx = self.store.begin().await?;
        let report = tx
            .find_report_for_update(report_id)
            .await?
            .ok_or(EngineError::NotFound("report"))?;

        let authority = authority_in_tx(tx.as_mut(), principal).await?;
        let entity = match authority {
            Some(entity) if jurisdiction::matches(&entity, &report) => entity,
            _ => {
                warn!(%report_id, actor = %principal.user_id, "Official response refused");
                return Err(EngineError::forbidden("not allowed to respond to this report"));
            }
        };

        let response = match tx.insert_official_response(report.id, entity.id, text).await {
            Ok(response) => response,
            Err(e) if e.is_unique_violation() => {
                return Err(EngineError::Conflict(
                    "report already has an official response".into(),
                ))
            }
            Err(e) => return Err(e.into()),
        };
        tx.commit().await?;

        info!(
            %report_id,
            entity_id = %entity.id,
            response_id = %response.id,
            "Official response recorded"
        );
        Ok(response)
    }

    /// Responses written by the principal's entity, newest first.
    pub async fn my_official_responses(
        &self,
        principal: &Principal,
    ) -> EngineResult<Vec<OfficialResponse>> {
        let Some(entity) = self.authority_of(principal).await? else {
            return Ok(Vec::new());
        };
        Ok(self.store.responses_by_entity(entity.id).await?)
    }

    // -----------------------------------------------------------------------
    // Comments
    // -----------------------------------------------------------------------

    pub async fn add_comment(
        &self,
        report_id: Uuid,
        principal: &Principal,
        text: &str,
    ) -> EngineResult<Comment> {
        let text = text.trim();
        if text.is_empty() {
            return Err(EngineError::validation("comment text is required"));
        }
        self.visible_report(report_id, principal).await?;

        let comment = self
            .store
            .insert_comment(report_id, principal.user_id, text)
            .await?;
        info!(%report_id, comment_id = %comment.id, "Comment added");
        Ok(comment)
    }

    /// Oldest first.
    pub async fn list_comments(
        &self,
        report_id: Uuid,
        viewer: &Principal,
    ) -> EngineResult<Vec<Comment>> {
        self.visible_report(report_id, viewer).await?;
        Ok(self.store.comments_for_report(report_id).await?)
    }

    pub async fn delete_comment(&self, comment_id: Uuid, principal: &Principal) -> EngineResult<()> {
        let comment = self
            .store
            .find_comment(comment_id)
            .await?
            .ok_or(EngineError::NotFound("comment"))?;
        if comment.author_id != principal.user_id {
            return Err(EngineError::forbidden("only the author can delete this comment"));
        }

        if !self.store.delete_comment(comment_id).await? {
            return Err(EngineError::NotFound("comment"));
        }
        info!(%comment_id, report_id = %comment.report_id, "Comment deleted");
        Ok(())
    }

    async fn visible_report(&self, report_id: Uuid, viewer: &Principal) -> EngineResult<Report> {
        match self.store.find_report(report_id).await? {
            Some(report) if jurisdiction::visible_to(&report, viewer) => Ok(report),
            _ => Err(EngineError::NotFound("report")),
        }
    }
}
