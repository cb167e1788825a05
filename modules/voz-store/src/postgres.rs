//! PgReportStore: the production store, backed by Postgres via sqlx.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

use voz_common::{
    Category, City, Comment, EntityScope, GeoPoint, GovernmentEntity, Jurisdiction, NewReport,
    OfficialResponse, Report, ReportLocation, ReportStatus, State, Support,
};

use crate::error::{StoreError, StoreResult, RESPONSE_UNIQUE, SUPPORT_UNIQUE};
use crate::traits::{ReportFilter, ReportStore, StoreTx};

/// Coordinates are NUMERIC in storage; the engine works in f64.
const REPORT_COLUMNS: &str = "id, title, description, author_id, category_id, city_id, state_id, \
     photo_ref, latitude::float8 AS latitude, longitude::float8 AS longitude, \
     jurisdiction, status, created_at";

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct ReportRow {
    id: Uuid,
    title: String,
    description: String,
    author_id: Uuid,
    category_id: Uuid,
    city_id: Uuid,
    state_id: Uuid,
    photo_ref: String,
    latitude: f64,
    longitude: f64,
    jurisdiction: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ReportRow> for Report {
    type Error = StoreError;

    fn try_from(row: ReportRow) -> Result<Self, Self::Error> {
        let corrupt = |what: String| StoreError::Corrupt(format!("report {}: {what}", row.id));
        let point = GeoPoint::new(row.latitude, row.longitude).map_err(|e| corrupt(e.to_string()))?;
        let jurisdiction = row
            .jurisdiction
            .parse::<Jurisdiction>()
            .map_err(|e| corrupt(e.to_string()))?;
        let status = row
            .status
            .parse::<ReportStatus>()
            .map_err(|e| corrupt(e.to_string()))?;

        Ok(Report {
            id: row.id,
            title: row.title,
            description: row.description,
            author_id: row.author_id,
            category_id: row.category_id,
            location: ReportLocation {
                point,
                city_id: row.city_id,
                state_id: row.state_id,
            },
            jurisdiction,
            status,
            photo_ref: row.photo_ref,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct EntityRow {
    id: Uuid,
    name: String,
    city_id: Option<Uuid>,
    state_id: Option<Uuid>,
}

impl TryFrom<EntityRow> for GovernmentEntity {
    type Error = StoreError;

    fn try_from(row: EntityRow) -> Result<Self, Self::Error> {
        let scope = EntityScope::from_parts(row.city_id, row.state_id).ok_or_else(|| {
            StoreError::Corrupt(format!("entity {} must have exactly one of city or state", row.id))
        })?;
        Ok(GovernmentEntity {
            id: row.id,
            name: row.name,
            scope,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SupportRow {
    id: Uuid,
    report_id: Uuid,
    supporter_id: Uuid,
    created_at: DateTime<Utc>,
}

impl From<SupportRow> for Support {
    fn from(row: SupportRow) -> Self {
        Support {
            id: row.id,
            report_id: row.report_id,
            supporter_id: row.supporter_id,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ResponseRow {
    id: Uuid,
    report_id: Uuid,
    entity_id: Uuid,
    text: String,
    created_at: DateTime<Utc>,
}

impl From<ResponseRow> for OfficialResponse {
    fn from(row: ResponseRow) -> Self {
        OfficialResponse {
            id: row.id,
            report_id: row.report_id,
            entity_id: row.entity_id,
            text: row.text,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: Uuid,
    report_id: Uuid,
    author_id: Uuid,
    text: String,
    created_at: DateTime<Utc>,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Comment {
            id: row.id,
            report_id: row.report_id,
            author_id: row.author_id,
            text: row.text,
            created_at: row.created_at,
        }
    }
}

fn into_reports(rows: Vec<ReportRow>) -> StoreResult<Vec<Report>> {
    rows.into_iter().map(Report::try_from).collect()
}

fn into_entities(rows: Vec<EntityRow>) -> StoreResult<Vec<GovernmentEntity>> {
    rows.into_iter().map(GovernmentEntity::try_from).collect()
}

const ENTITIES_FOR_STAFF_SQL: &str = r#"
    SELECT e.id, e.name, e.city_id, e.state_id
    FROM government_entities e
    JOIN government_entity_staff s ON s.entity_id = e.id
    WHERE s.user_id = $1
    ORDER BY e.id
"#;

// ---------------------------------------------------------------------------
// PgReportStore
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgReportStore {
    pool: PgPool,
}

impl PgReportStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReportStore for PgReportStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgStoreTx { tx }))
    }

    async fn find_report(&self, id: Uuid) -> StoreResult<Option<Report>> {
        let sql = format!("SELECT {REPORT_COLUMNS} FROM reports WHERE id = $1");
        let row = sqlx::query_as::<_, ReportRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Report::try_from).transpose()
    }

    async fn find_reports(&self, filter: &ReportFilter) -> StoreResult<Vec<Report>> {
        let sql = format!(
            r#"
            SELECT {REPORT_COLUMNS} FROM reports
            WHERE ($1::uuid IS NULL OR category_id = $1)
              AND ($2::uuid IS NULL OR city_id = $2)
              AND ($3::uuid IS NULL OR state_id = $3)
              AND ($4::text IS NULL OR jurisdiction = $4)
              AND ($5::uuid IS NULL OR author_id = $5)
            ORDER BY created_at DESC, seq DESC
            "#
        );
        let rows = sqlx::query_as::<_, ReportRow>(&sql)
            .bind(filter.category_id)
            .bind(filter.city_id)
            .bind(filter.state_id)
            .bind(filter.jurisdiction.map(|j| j.as_str()))
            .bind(filter.author_id)
            .fetch_all(&self.pool)
            .await?;
        into_reports(rows)
    }

    async fn support_count(&self, report_id: Uuid) -> StoreResult<i64> {
        let row = sqlx::query_as::<_, (i64,)>(
            "SELECT COUNT(*) FROM report_supports WHERE report_id = $1",
        )
        .bind(report_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }

    async fn find_category(&self, id: Uuid) -> StoreResult<Option<Category>> {
        let row = sqlx::query_as::<_, (Uuid, String)>("SELECT id, name FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(id, name)| Category { id, name }))
    }

    async fn find_city(&self, id: Uuid) -> StoreResult<Option<City>> {
        let row = sqlx::query_as::<_, (Uuid, String, Uuid)>(
            "SELECT id, name, state_id FROM cities WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id, name, state_id)| City { id, name, state_id }))
    }

    async fn insert_state(&self, name: &str, code: &str) -> StoreResult<State> {
        let (id,) = sqlx::query_as::<_, (Uuid,)>(
            "INSERT INTO states (name, code) VALUES ($1, $2) RETURNING id",
        )
        .bind(name)
        .bind(code)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(State {
            id,
            name: name.to_string(),
            code: code.to_string(),
        })
    }

    async fn insert_city(&self, name: &str, state_id: Uuid) -> StoreResult<City> {
        let (id,) = sqlx::query_as::<_, (Uuid,)>(
            "INSERT INTO cities (name, state_id) VALUES ($1, $2) RETURNING id",
        )
        .bind(name)
        .bind(state_id)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(City {
            id,
            name: name.to_string(),
            state_id,
        })
    }

    async fn insert_category(&self, name: &str) -> StoreResult<Category> {
        let (id,) = sqlx::query_as::<_, (Uuid,)>(
            "INSERT INTO categories (name) VALUES ($1) RETURNING id",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(Category {
            id,
            name: name.to_string(),
        })
    }

    async fn entities_for_staff(&self, user_id: Uuid) -> StoreResult<Vec<GovernmentEntity>> {
        let rows = sqlx::query_as::<_, EntityRow>(ENTITIES_FOR_STAFF_SQL)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        into_entities(rows)
    }

    async fn insert_entity(&self, name: &str, scope: EntityScope) -> StoreResult<GovernmentEntity> {
        let row = sqlx::query_as::<_, EntityRow>(
            r#"
            INSERT INTO government_entities (name, city_id, state_id)
            VALUES ($1, $2, $3)
            RETURNING id, name, city_id, state_id
            "#,
        )
        .bind(name)
        .bind(scope.city_id())
        .bind(scope.state_id())
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        GovernmentEntity::try_from(row)
    }

    async fn add_staff(&self, entity_id: Uuid, user_id: Uuid) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO government_entity_staff (entity_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(entity_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn responses_by_entity(&self, entity_id: Uuid) -> StoreResult<Vec<OfficialResponse>> {
        let rows = sqlx::query_as::<_, ResponseRow>(
            r#"
            SELECT id, report_id, entity_id, text, created_at
            FROM official_responses
            WHERE entity_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn response_for_report(&self, report_id: Uuid) -> StoreResult<Option<OfficialResponse>> {
        let row = sqlx::query_as::<_, ResponseRow>(
            r#"
            SELECT id, report_id, entity_id, text, created_at
            FROM official_responses
            WHERE report_id = $1
            "#,
        )
        .bind(report_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn comments_for_report(&self, report_id: Uuid) -> StoreResult<Vec<Comment>> {
        let rows = sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT id, report_id, author_id, text, created_at
            FROM report_comments
            WHERE report_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(report_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_comment(&self, id: Uuid) -> StoreResult<Option<Comment>> {
        let row = sqlx::query_as::<_, CommentRow>(
            "SELECT id, report_id, author_id, text, created_at FROM report_comments WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn insert_comment(
        &self,
        report_id: Uuid,
        author_id: Uuid,
        text: &str,
    ) -> StoreResult<Comment> {
        let row = sqlx::query_as::<_, CommentRow>(
            r#"
            INSERT INTO report_comments (report_id, author_id, text)
            VALUES ($1, $2, $3)
            RETURNING id, report_id, author_id, text, created_at
            "#,
        )
        .bind(report_id)
        .bind(author_id)
        .bind(text)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn delete_comment(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM report_comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ---------------------------------------------------------------------------
// PgStoreTx
// ---------------------------------------------------------------------------

pub struct PgStoreTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgStoreTx {
    async fn lock_category(&mut self, category_id: Uuid) -> StoreResult<()> {
        // Released automatically at commit or rollback.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::uuid::text, 0))")
            .bind(category_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn find_reports_by_category(&mut self, category_id: Uuid) -> StoreResult<Vec<Report>> {
        let sql = format!(
            "SELECT {REPORT_COLUMNS} FROM reports WHERE category_id = $1 \
             ORDER BY created_at DESC, seq DESC"
        );
        let rows = sqlx::query_as::<_, ReportRow>(&sql)
            .bind(category_id)
            .fetch_all(&mut *self.tx)
            .await?;
        into_reports(rows)
    }

    async fn has_support(&mut self, report_id: Uuid, supporter_id: Uuid) -> StoreResult<bool> {
        let row = sqlx::query_as::<_, (bool,)>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM report_supports WHERE report_id = $1 AND supporter_id = $2
            )
            "#,
        )
        .bind(report_id)
        .bind(supporter_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row.0)
    }

    async fn insert_support(
        &mut self,
        report_id: Uuid,
        supporter_id: Uuid,
    ) -> StoreResult<Support> {
        // ON CONFLICT keeps the transaction usable; a raw unique violation
        // would abort it.
        let row = sqlx::query_as::<_, SupportRow>(
            r#"
            INSERT INTO report_supports (report_id, supporter_id)
            VALUES ($1, $2)
            ON CONFLICT ON CONSTRAINT report_supports_report_supporter_key DO NOTHING
            RETURNING id, report_id, supporter_id, created_at
            "#,
        )
        .bind(report_id)
        .bind(supporter_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        match row {
            Some(row) => Ok(row.into()),
            None => {
                debug!(%report_id, %supporter_id, "Support insert hit unique constraint");
                Err(StoreError::unique(SUPPORT_UNIQUE))
            }
        }
    }

    async fn insert_report(&mut self, author_id: Uuid, report: &NewReport) -> StoreResult<Report> {
        let sql = format!(
            r#"
            INSERT INTO reports
                (title, description, author_id, category_id, city_id, state_id,
                 photo_ref, latitude, longitude, jurisdiction)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8::numeric(10, 8), $9::numeric(11, 8), $10)
            RETURNING {REPORT_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, ReportRow>(&sql)
            .bind(&report.title)
            .bind(&report.description)
            .bind(author_id)
            .bind(report.category_id)
            .bind(report.location.city_id)
            .bind(report.location.state_id)
            .bind(&report.photo_ref)
            .bind(report.location.point.lat)
            .bind(report.location.point.lng)
            .bind(report.jurisdiction.as_str())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(StoreError::from_sqlx)?;
        Report::try_from(row)
    }

    async fn find_report_for_update(&mut self, id: Uuid) -> StoreResult<Option<Report>> {
        let sql = format!("SELECT {REPORT_COLUMNS} FROM reports WHERE id = $1 FOR UPDATE");
        let row = sqlx::query_as::<_, ReportRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(Report::try_from).transpose()
    }

    async fn entities_for_staff(&mut self, user_id: Uuid) -> StoreResult<Vec<GovernmentEntity>> {
        let rows = sqlx::query_as::<_, EntityRow>(ENTITIES_FOR_STAFF_SQL)
            .bind(user_id)
            .fetch_all(&mut *self.tx)
            .await?;
        into_entities(rows)
    }

    async fn update_report_status(&mut self, id: Uuid, status: ReportStatus) -> StoreResult<()> {
        sqlx::query("UPDATE reports SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_official_response(
        &mut self,
        report_id: Uuid,
        entity_id: Uuid,
        text: &str,
    ) -> StoreResult<OfficialResponse> {
        let row = sqlx::query_as::<_, ResponseRow>(
            r#"
            INSERT INTO official_responses (report_id, entity_id, text)
            VALUES ($1, $2, $3)
            ON CONFLICT ON CONSTRAINT official_responses_report_key DO NOTHING
            RETURNING id, report_id, entity_id, text, created_at
            "#,
        )
        .bind(report_id)
        .bind(entity_id)
        .bind(text)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(Into::into)
            .ok_or_else(|| StoreError::unique(RESPONSE_UNIQUE))
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let this = *self;
        this.tx.commit().await?;
        Ok(())
    }
}
