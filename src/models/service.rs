use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    Tutoring,
    Babysitting,
}

impl std::fmt::Display for ServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ServiceType::Tutoring => "tutoring",
            ServiceType::Babysitting => "babysitting",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ServiceType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tutoring" => Ok(ServiceType::Tutoring),
            "babysitting" => Ok(ServiceType::Babysitting),
            other => Err(anyhow::anyhow!("Unknown service type: {other}")),
        }
    }
}

/// A `tutor_services` row as owned by its tutor.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TutorService {
    pub id: Uuid,
    pub tutor_id: Uuid,
    pub title: String,
    pub description: String,
    pub service_type: String,
    pub hourly_rate: f64,
    pub subjects: Vec<String>,
    pub availability: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateServiceRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub service_type: ServiceType,
    pub price: f64,
    #[serde(default)]
    pub subjects: Vec<String>,
    /// Array of day names or an object keyed by day.
    #[serde(default)]
    pub availability: Value,
}

#[derive(Debug, Deserialize)]
pub struct UpdateServiceRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub service_type: Option<ServiceType>,
    pub price: Option<f64>,
    pub subjects: Option<Vec<String>>,
    pub availability: Option<Value>,
    pub is_active: Option<bool>,
}

/// Service joined with its tutor profile and review aggregate. Never serialised
/// directly: it carries contact details that only some callers may see.
#[derive(Debug, Clone, FromRow)]
pub struct ServiceRecord {
    pub id: Uuid,
    pub tutor_id: Uuid,
    pub title: String,
    pub description: String,
    pub service_type: String,
    pub hourly_rate: f64,
    pub subjects: Vec<String>,
    pub availability: Vec<String>,
    pub first_name: String,
    pub last_name: String,
    pub bio: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub address: Option<String>,
    pub avatar_url: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub rating: f64,
}

impl ServiceRecord {
    pub fn service_type(&self) -> ServiceType {
        self.service_type.parse().unwrap_or(ServiceType::Tutoring)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ServiceListing {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub service_type: ServiceType,
    pub price: f64,
    pub rating: f64,
    pub location: String,
    pub image: String,
    pub availability: Vec<String>,
    pub subjects: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_phone: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    pub types: Option<Vec<String>>,
    pub location: Option<String>,
    pub price_range: Option<(f64, f64)>,
    pub subjects: Option<Vec<String>>,
    pub availability: Option<Vec<String>>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct SearchRequest {
    pub query: Option<String>,
    pub filters: Option<SearchFilters>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub services: Vec<ServiceListing>,
}
