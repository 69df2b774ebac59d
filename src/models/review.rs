use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Review {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub reviewer_id: Uuid,
    pub reviewee_id: Uuid,
    pub rating: i16,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateReviewRequest {
    pub booking_id: Uuid,
    pub rating: i16,
    pub comment: Option<String>,
}

/// Review as shown on a provider page, with the reviewer's first name only.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PublicReview {
    pub id: Uuid,
    pub rating: i16,
    pub comment: Option<String>,
    pub reviewer_first_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ReviewSummary {
    pub average: f64,
    pub count: usize,
    pub reviews: Vec<PublicReview>,
}
