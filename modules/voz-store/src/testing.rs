// In-memory ReportStore for tests.
//
// MemoryReportStore keeps the whole dataset behind one tokio Mutex. A
// transaction holds the lock for its lifetime and works on a copy that
// replaces the shared state on commit, so transactions are fully
// serialized and dropping one discards its writes.
//
// Plus fixture helpers for seeding reference data and backdated reports.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use voz_common::{
    Category, City, Comment, EntityScope, GovernmentEntity, NewReport, OfficialResponse, Report,
    ReportStatus, State, Support,
};

use crate::error::{StoreError, StoreResult, RESPONSE_UNIQUE, SUPPORT_UNIQUE};
use crate::traits::{ReportFilter, ReportStore, StoreTx};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct MemoryState {
    next_seq: u64,
    states: HashMap<Uuid, State>,
    cities: HashMap<Uuid, City>,
    categories: HashMap<Uuid, Category>,
    /// (insertion seq, report)
    reports: Vec<(u64, Report)>,
    supports: Vec<Support>,
    comments: Vec<Comment>,
    /// Ordered by id, matching the Postgres `ORDER BY e.id`.
    entities: BTreeMap<Uuid, GovernmentEntity>,
    /// (entity_id, user_id)
    staff: BTreeSet<(Uuid, Uuid)>,
    responses: Vec<OfficialResponse>,
    /// When set, `has_support` always answers false, as if a concurrent
    /// transaction had not committed yet when we looked.
    stale_support_reads: bool,
}

impl MemoryState {
    fn reports_newest_first(&self, filter: &ReportFilter) -> Vec<Report> {
        let mut matching: Vec<&(u64, Report)> =
            self.reports.iter().filter(|(_, r)| filter.matches(r)).collect();
        matching.sort_by(|(seq_a, a), (seq_b, b)| {
            b.created_at.cmp(&a.created_at).then(seq_b.cmp(seq_a))
        });
        matching.into_iter().map(|(_, r)| r.clone()).collect()
    }

    fn entities_for_staff(&self, user_id: Uuid) -> Vec<GovernmentEntity> {
        self.entities
            .values()
            .filter(|e| self.staff.contains(&(e.id, user_id)))
            .cloned()
            .collect()
    }

    fn push_report(&mut self, author_id: Uuid, new: &NewReport, created_at: DateTime<Utc>) -> Report {
        let report = Report {
            id: Uuid::new_v4(),
            title: new.title.clone(),
            description: new.description.clone(),
            author_id,
            category_id: new.category_id,
            location: new.location,
            jurisdiction: new.jurisdiction,
            status: ReportStatus::Open,
            photo_ref: new.photo_ref.clone(),
            created_at,
        };
        self.next_seq += 1;
        self.reports.push((self.next_seq, report.clone()));
        report
    }

    fn report_mut(&mut self, id: Uuid) -> Option<&mut Report> {
        self.reports.iter_mut().map(|(_, r)| r).find(|r| r.id == id)
    }
}

// ---------------------------------------------------------------------------
// MemoryReportStore
// ---------------------------------------------------------------------------

/// Stateful in-memory store. Cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct MemoryReportStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `has_support` always answer false so the storage-level
    /// uniqueness guard is the only thing standing between a user and a
    /// second support row.
    pub async fn with_stale_support_reads(self) -> Self {
        self.state.lock().await.stale_support_reads = true;
        self
    }

    /// Insert a report with an explicit creation time, bypassing dedup.
    pub async fn seed_report(
        &self,
        author_id: Uuid,
        new: &NewReport,
        created_at: DateTime<Utc>,
    ) -> Report {
        self.state.lock().await.push_report(author_id, new, created_at)
    }

    pub async fn all_reports(&self) -> Vec<Report> {
        self.state.lock().await.reports_newest_first(&ReportFilter::default())
    }

    pub async fn supports_for(&self, report_id: Uuid) -> Vec<Support> {
        self.state
            .lock()
            .await
            .supports
            .iter()
            .filter(|s| s.report_id == report_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx { guard, working }))
    }

    async fn find_report(&self, id: Uuid) -> StoreResult<Option<Report>> {
        let state = self.state.lock().await;
        Ok(state.reports.iter().map(|(_, r)| r).find(|r| r.id == id).cloned())
    }

    async fn find_reports(&self, filter: &ReportFilter) -> StoreResult<Vec<Report>> {
        Ok(self.state.lock().await.reports_newest_first(filter))
    }

    async fn support_count(&self, report_id: Uuid) -> StoreResult<i64> {
        let state = self.state.lock().await;
        Ok(state.supports.iter().filter(|s| s.report_id == report_id).count() as i64)
    }

    async fn find_category(&self, id: Uuid) -> StoreResult<Option<Category>> {
        Ok(self.state.lock().await.categories.get(&id).cloned())
    }

    async fn find_city(&self, id: Uuid) -> StoreResult<Option<City>> {
        Ok(self.state.lock().await.cities.get(&id).cloned())
    }

    async fn insert_state(&self, name: &str, code: &str) -> StoreResult<State> {
        let mut state = self.state.lock().await;
        if state.states.values().any(|s| s.name == name || s.code == code) {
            return Err(StoreError::unique("states_name_key"));
        }
        let row = State {
            id: Uuid::new_v4(),
            name: name.to_string(),
            code: code.to_string(),
        };
        state.states.insert(row.id, row.clone());
        Ok(row)
    }

    async fn insert_city(&self, name: &str, state_id: Uuid) -> StoreResult<City> {
        let mut state = self.state.lock().await;
        if state.cities.values().any(|c| c.name == name && c.state_id == state_id) {
            return Err(StoreError::unique("cities_name_state_id_key"));
        }
        let row = City {
            id: Uuid::new_v4(),
            name: name.to_string(),
            state_id,
        };
        state.cities.insert(row.id, row.clone());
        Ok(row)
    }

    async fn insert_category(&self, name: &str) -> StoreResult<Category> {
        let mut state = self.state.lock().await;
        if state.categories.values().any(|c| c.name == name) {
            return Err(StoreError::unique("categories_name_key"));
        }
        let row = Category {
            id: Uuid::new_v4(),
            name: name.to_string(),
        };
        state.categories.insert(row.id, row.clone());
        Ok(row)
    }

    async fn entities_for_staff(&self, user_id: Uuid) -> StoreResult<Vec<GovernmentEntity>> {
        Ok(self.state.lock().await.entities_for_staff(user_id))
    }

    async fn insert_entity(&self, name: &str, scope: EntityScope) -> StoreResult<GovernmentEntity> {
        let mut state = self.state.lock().await;
        if state.entities.values().any(|e| e.name == name && e.scope == scope) {
            return Err(StoreError::unique("government_entities_name_scope_key"));
        }
        let entity = GovernmentEntity {
            id: Uuid::new_v4(),
            name: name.to_string(),
            scope,
        };
        state.entities.insert(entity.id, entity.clone());
        Ok(entity)
    }

    async fn add_staff(&self, entity_id: Uuid, user_id: Uuid) -> StoreResult<()> {
        self.state.lock().await.staff.insert((entity_id, user_id));
        Ok(())
    }

    async fn responses_by_entity(&self, entity_id: Uuid) -> StoreResult<Vec<OfficialResponse>> {
        let state = self.state.lock().await;
        let mut rows: Vec<OfficialResponse> = state
            .responses
            .iter()
            .filter(|r| r.entity_id == entity_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn response_for_report(&self, report_id: Uuid) -> StoreResult<Option<OfficialResponse>> {
        let state = self.state.lock().await;
        Ok(state.responses.iter().find(|r| r.report_id == report_id).cloned())
    }

    async fn comments_for_report(&self, report_id: Uuid) -> StoreResult<Vec<Comment>> {
        let state = self.state.lock().await;
        // Stored in insertion order, which is creation order.
        Ok(state
            .comments
            .iter()
            .filter(|c| c.report_id == report_id)
            .cloned()
            .collect())
    }

    async fn find_comment(&self, id: Uuid) -> StoreResult<Option<Comment>> {
        let state = self.state.lock().await;
        Ok(state.comments.iter().find(|c| c.id == id).cloned())
    }

    async fn insert_comment(
        &self,
        report_id: Uuid,
        author_id: Uuid,
        text: &str,
    ) -> StoreResult<Comment> {
        let comment = Comment {
            id: Uuid::new_v4(),
            report_id,
            author_id,
            text: text.to_string(),
            created_at: Utc::now(),
        };
        self.state.lock().await.comments.push(comment.clone());
        Ok(comment)
    }

    async fn delete_comment(&self, id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        let before = state.comments.len();
        state.comments.retain(|c| c.id != id);
        Ok(state.comments.len() < before)
    }
}

// ---------------------------------------------------------------------------
// MemoryTx
// ---------------------------------------------------------------------------

struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn lock_category(&mut self, _category_id: Uuid) -> StoreResult<()> {
        // The whole store is already locked for this transaction.
        Ok(())
    }

    async fn find_reports_by_category(&mut self, category_id: Uuid) -> StoreResult<Vec<Report>> {
        let filter = ReportFilter {
            category_id: Some(category_id),
            ..Default::default()
        };
        Ok(self.working.reports_newest_first(&filter))
    }

    async fn has_support(&mut self, report_id: Uuid, supporter_id: Uuid) -> StoreResult<bool> {
        if self.working.stale_support_reads {
            return Ok(false);
        }
        Ok(self
            .working
            .supports
            .iter()
            .any(|s| s.report_id == report_id && s.supporter_id == supporter_id))
    }

    async fn insert_support(
        &mut self,
        report_id: Uuid,
        supporter_id: Uuid,
    ) -> StoreResult<Support> {
        let exists = self
            .working
            .supports
            .iter()
            .any(|s| s.report_id == report_id && s.supporter_id == supporter_id);
        if exists {
            return Err(StoreError::unique(SUPPORT_UNIQUE));
        }
        let support = Support {
            id: Uuid::new_v4(),
            report_id,
            supporter_id,
            created_at: Utc::now(),
        };
        self.working.supports.push(support.clone());
        Ok(support)
    }

    async fn insert_report(&mut self, author_id: Uuid, report: &NewReport) -> StoreResult<Report> {
        Ok(self.working.push_report(author_id, report, Utc::now()))
    }

    async fn find_report_for_update(&mut self, id: Uuid) -> StoreResult<Option<Report>> {
        Ok(self.working.report_mut(id).map(|r| r.clone()))
    }

    async fn entities_for_staff(&mut self, user_id: Uuid) -> StoreResult<Vec<GovernmentEntity>> {
        Ok(self.working.entities_for_staff(user_id))
    }

    async fn update_report_status(&mut self, id: Uuid, status: ReportStatus) -> StoreResult<()> {
        if let Some(report) = self.working.report_mut(id) {
            report.status = status;
        }
        Ok(())
    }

    async fn insert_official_response(
        &mut self,
        report_id: Uuid,
        entity_id: Uuid,
        text: &str,
    ) -> StoreResult<OfficialResponse> {
        if self.working.responses.iter().any(|r| r.report_id == report_id) {
            return Err(StoreError::unique(RESPONSE_UNIQUE));
        }
        let response = OfficialResponse {
            id: Uuid::new_v4(),
            report_id,
            entity_id,
            text: text.to_string(),
            created_at: Utc::now(),
        };
        self.working.responses.push(response.clone());
        Ok(response)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Praça da Sé, São Paulo.
pub const SAO_PAULO_CENTER: (f64, f64) = (-23.5505, -46.6333);
/// About 64m from `SAO_PAULO_CENTER`.
pub const SAO_PAULO_NEARBY: (f64, f64) = (-23.5510, -46.6330);
/// Copacabana, Rio de Janeiro.
pub const RIO_COPACABANA: (f64, f64) = (-22.9711, -43.1822);

/// Reference data for a two-state world: São Paulo (city + state) and Rio
/// de Janeiro (city + state), plus one category per common issue.
pub struct Fixtures {
    pub sp_state: State,
    pub sp_city: City,
    pub rj_state: State,
    pub rj_city: City,
    pub lighting: Category,
    pub potholes: Category,
}

impl Fixtures {
    pub async fn seed(store: &dyn ReportStore) -> StoreResult<Self> {
        let sp_state = store.insert_state("São Paulo", "SP").await?;
        let sp_city = store.insert_city("São Paulo", sp_state.id).await?;
        let rj_state = store.insert_state("Rio de Janeiro", "RJ").await?;
        let rj_city = store.insert_city("Rio de Janeiro", rj_state.id).await?;
        let lighting = store.insert_category("Iluminação").await?;
        let potholes = store.insert_category("Buracos").await?;
        Ok(Self {
            sp_state,
            sp_city,
            rj_state,
            rj_city,
            lighting,
            potholes,
        })
    }
}
