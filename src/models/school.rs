use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::profile::ApprovalStatus;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct School {
    pub id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub status: String, // pending | approved | rejected
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSchoolRequest {
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SchoolQuery {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdminSchoolQuery {
    pub status: Option<ApprovalStatus>,
}

/// Schools share the moderation states of profiles.
#[derive(Debug, Deserialize)]
pub struct UpdateSchoolStatusRequest {
    pub status: ApprovalStatus,
}
