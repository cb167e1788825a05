use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;

// --- Enums ---

/// Governmental level a report is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Jurisdiction {
    Municipal,
    State,
    Federal,
    Private,
}

impl Jurisdiction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Municipal => "MUNICIPAL",
            Self::State => "STATE",
            Self::Federal => "FEDERAL",
            Self::Private => "PRIVATE",
        }
    }
}

impl std::fmt::Display for Jurisdiction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Jurisdiction {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MUNICIPAL" => Ok(Self::Municipal),
            "STATE" => Ok(Self::State),
            "FEDERAL" => Ok(Self::Federal),
            "PRIVATE" => Ok(Self::Private),
            _ => Err(anyhow::anyhow!("Unknown jurisdiction: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    #[default]
    Open,
    UnderReview,
    Resolved,
}

impl ReportStatus {
    pub const ALL: [ReportStatus; 3] = [Self::Open, Self::UnderReview, Self::Resolved];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::UnderReview => "UNDER_REVIEW",
            Self::Resolved => "RESOLVED",
        }
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReportStatus {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(Self::Open),
            "UNDER_REVIEW" => Ok(Self::UnderReview),
            "RESOLVED" => Ok(Self::Resolved),
            _ => Err(anyhow::anyhow!("Unknown report status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Citizen,
    GovernmentOfficial,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Citizen => "CITIZEN",
            Self::GovernmentOfficial => "GOVERNMENT_OFFICIAL",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CITIZEN" => Ok(Self::Citizen),
            "GOVERNMENT_OFFICIAL" => Ok(Self::GovernmentOfficial),
            _ => Err(anyhow::anyhow!("Unknown role: {}", s)),
        }
    }
}

// --- Principal ---

/// Authenticated caller, as supplied by the authentication layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: Role,
}

impl Principal {
    pub fn citizen(user_id: Uuid) -> Self {
        Self { user_id, role: Role::Citizen }
    }

    pub fn official(user_id: Uuid) -> Self {
        Self { user_id, role: Role::GovernmentOfficial }
    }

    pub fn is_official(&self) -> bool {
        self.role == Role::GovernmentOfficial
    }
}

// --- Reference data ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub id: Uuid,
    pub name: String,
    /// Two-letter federation code, e.g. "SP".
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct City {
    pub id: Uuid,
    pub name: String,
    pub state_id: Uuid,
}

// --- Reports ---

/// Where a report was filed. City and state are resolved upstream by geocoding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReportLocation {
    pub point: GeoPoint,
    pub city_id: Uuid,
    pub state_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub author_id: Uuid,
    pub category_id: Uuid,
    pub location: ReportLocation,
    pub jurisdiction: Jurisdiction,
    pub status: ReportStatus,
    /// Opaque reference into the photo store.
    pub photo_ref: String,
    pub created_at: DateTime<Utc>,
}

/// A validated report ready to be persisted. The store assigns id, status and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReport {
    pub title: String,
    pub description: String,
    pub category_id: Uuid,
    pub location: ReportLocation,
    pub jurisdiction: Jurisdiction,
    pub photo_ref: String,
}

/// A user corroborating an existing report instead of filing a duplicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Support {
    pub id: Uuid,
    pub report_id: Uuid,
    pub supporter_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub report_id: Uuid,
    pub author_id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

// --- Government ---

/// An entity acts either for one city or for one state, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EntityScope {
    City(Uuid),
    State(Uuid),
}

impl EntityScope {
    /// Build a scope from the nullable city/state pair used in storage.
    pub fn from_parts(city_id: Option<Uuid>, state_id: Option<Uuid>) -> Option<Self> {
        match (city_id, state_id) {
            (Some(city), None) => Some(Self::City(city)),
            (None, Some(state)) => Some(Self::State(state)),
            _ => None,
        }
    }

    pub fn city_id(&self) -> Option<Uuid> {
        match self {
            Self::City(id) => Some(*id),
            Self::State(_) => None,
        }
    }

    pub fn state_id(&self) -> Option<Uuid> {
        match self {
            Self::State(id) => Some(*id),
            Self::City(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernmentEntity {
    pub id: Uuid,
    pub name: String,
    pub scope: EntityScope,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfficialResponse {
    pub id: Uuid,
    pub report_id: Uuid,
    pub entity_id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
}
