// Storage boundary for the report engine.
//
// ReportStore: single-statement reads plus reference-data seeding.
// StoreTx: everything whose validity depends on a preceding read
//   (dedup scan + insert, authority check + status write, response insert).
//
// PgReportStore backs production; testing::MemoryReportStore backs the
// engine and API tests with no database.

use async_trait::async_trait;
use uuid::Uuid;

use voz_common::{
    Category, City, Comment, EntityScope, GovernmentEntity, Jurisdiction, NewReport,
    OfficialResponse, Report, ReportStatus, State, Support,
};

use crate::error::StoreResult;

/// Filter for report listings. `None` fields match anything.
/// Results are always most recently created first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportFilter {
    pub category_id: Option<Uuid>,
    pub city_id: Option<Uuid>,
    pub state_id: Option<Uuid>,
    pub jurisdiction: Option<Jurisdiction>,
    pub author_id: Option<Uuid>,
}

impl ReportFilter {
    pub fn matches(&self, report: &Report) -> bool {
        self.category_id.map_or(true, |id| report.category_id == id)
            && self.city_id.map_or(true, |id| report.location.city_id == id)
            && self.state_id.map_or(true, |id| report.location.state_id == id)
            && self.jurisdiction.map_or(true, |j| report.jurisdiction == j)
            && self.author_id.map_or(true, |id| report.author_id == id)
    }
}

#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Open a transaction. Dropping it without `commit` rolls back.
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>>;

    // --- Reports ---

    async fn find_report(&self, id: Uuid) -> StoreResult<Option<Report>>;

    async fn find_reports(&self, filter: &ReportFilter) -> StoreResult<Vec<Report>>;

    async fn support_count(&self, report_id: Uuid) -> StoreResult<i64>;

    // --- Reference data ---

    async fn find_category(&self, id: Uuid) -> StoreResult<Option<Category>>;

    async fn find_city(&self, id: Uuid) -> StoreResult<Option<City>>;

    async fn insert_state(&self, name: &str, code: &str) -> StoreResult<State>;

    async fn insert_city(&self, name: &str, state_id: Uuid) -> StoreResult<City>;

    async fn insert_category(&self, name: &str) -> StoreResult<Category>;

    // --- Government ---

    /// Entities listing `user_id` as staff, ordered by entity id.
    async fn entities_for_staff(&self, user_id: Uuid) -> StoreResult<Vec<GovernmentEntity>>;

    /// Fails with `UniqueViolation` if (name, scope) already exists.
    async fn insert_entity(&self, name: &str, scope: EntityScope) -> StoreResult<GovernmentEntity>;

    /// Idempotent.
    async fn add_staff(&self, entity_id: Uuid, user_id: Uuid) -> StoreResult<()>;

    /// Newest first.
    async fn responses_by_entity(&self, entity_id: Uuid) -> StoreResult<Vec<OfficialResponse>>;

    async fn response_for_report(&self, report_id: Uuid) -> StoreResult<Option<OfficialResponse>>;

    // --- Comments ---

    /// Oldest first.
    async fn comments_for_report(&self, report_id: Uuid) -> StoreResult<Vec<Comment>>;

    async fn find_comment(&self, id: Uuid) -> StoreResult<Option<Comment>>;

    async fn insert_comment(&self, report_id: Uuid, author_id: Uuid, text: &str)
        -> StoreResult<Comment>;

    /// Returns whether a row was removed.
    async fn delete_comment(&self, id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait StoreTx: Send {
    /// Serialize submissions for one category until this transaction ends.
    async fn lock_category(&mut self, category_id: Uuid) -> StoreResult<()>;

    /// Reports of a category, most recently created first.
    async fn find_reports_by_category(&mut self, category_id: Uuid) -> StoreResult<Vec<Report>>;

    async fn has_support(&mut self, report_id: Uuid, supporter_id: Uuid) -> StoreResult<bool>;

    /// Fails with `UniqueViolation` if the pair already exists, even when a
    /// concurrent transaction inserted it after our `has_support` read.
    async fn insert_support(&mut self, report_id: Uuid, supporter_id: Uuid)
        -> StoreResult<Support>;

    async fn insert_report(&mut self, author_id: Uuid, report: &NewReport) -> StoreResult<Report>;

    /// Read a report and hold it against concurrent status writes.
    async fn find_report_for_update(&mut self, id: Uuid) -> StoreResult<Option<Report>>;

    async fn entities_for_staff(&mut self, user_id: Uuid) -> StoreResult<Vec<GovernmentEntity>>;

    async fn update_report_status(&mut self, id: Uuid, status: ReportStatus) -> StoreResult<()>;

    /// Fails with `UniqueViolation` if the report already has a response.
    async fn insert_official_response(
        &mut self,
        report_id: Uuid,
        entity_id: Uuid,
        text: &str,
    ) -> StoreResult<OfficialResponse>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;
}
