use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    models::{
        catalog::days_from_json,
        service::{CreateServiceRequest, TutorService, UpdateServiceRequest},
    },
    services::catalog::normalize_names,
};

const MAX_TITLE_LEN: usize = 200;
const MAX_SUBJECT_LEN: usize = 64;

fn validate_title(title: &str) -> ApiResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ApiError::validation("Title is required"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ApiError::validation(format!(
            "Title must be at most {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(title.to_string())
}

fn validate_price(price: f64) -> ApiResult<f64> {
    if !price.is_finite() || price < 0.0 {
        return Err(ApiError::validation("Price must be a non-negative number"));
    }
    Ok(price)
}

/// Canonical day-name array for the `availability` column.
pub fn canonical_availability(value: &Value) -> ApiResult<Vec<String>> {
    let days = days_from_json(value).map_err(|e| ApiError::validation(e.to_string()))?;
    Ok(days.iter().map(|d| d.as_str().to_string()).collect())
}

/// CRUD over a tutor's own `tutor_services` rows.
pub struct ListingService;

impl ListingService {
    pub async fn list_for_tutor(pool: &PgPool, tutor_id: Uuid) -> ApiResult<Vec<TutorService>> {
        let rows = sqlx::query_as::<_, TutorService>(
            "SELECT * FROM tutor_services WHERE tutor_id = $1 ORDER BY created_at DESC",
        )
        .bind(tutor_id)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    pub async fn create(
        pool: &PgPool,
        tutor_id: Uuid,
        req: &CreateServiceRequest,
    ) -> ApiResult<TutorService> {
        let title = validate_title(&req.title)?;
        let price = validate_price(req.price)?;
        let subjects = normalize_names(&req.subjects, MAX_SUBJECT_LEN)?;
        let availability = canonical_availability(&req.availability)?;

        let row = sqlx::query_as::<_, TutorService>(
            "INSERT INTO tutor_services
                (tutor_id, title, description, service_type, hourly_rate, subjects, availability)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING *",
        )
        .bind(tutor_id)
        .bind(&title)
        .bind(req.description.trim())
        .bind(req.service_type.to_string())
        .bind(price)
        .bind(&subjects)
        .bind(&availability)
        .fetch_one(pool)
        .await?;

        tracing::info!("Tutor {} created service {}", tutor_id, row.id);
        Ok(row)
    }

    async fn get_owned(pool: &PgPool, id: Uuid, tutor_id: Uuid) -> ApiResult<TutorService> {
        let row = sqlx::query_as::<_, TutorService>("SELECT * FROM tutor_services WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| ApiError::not_found("Service"))?;
        if row.tutor_id != tutor_id {
            return Err(ApiError::forbidden("You can only modify your own services"));
        }
        Ok(row)
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        tutor_id: Uuid,
        req: &UpdateServiceRequest,
    ) -> ApiResult<TutorService> {
        Self::get_owned(pool, id, tutor_id).await?;

        let title = req.title.as_deref().map(validate_title).transpose()?;
        let price = req.price.map(validate_price).transpose()?;
        let subjects = req
            .subjects
            .as_ref()
            .map(|s| normalize_names(s, MAX_SUBJECT_LEN))
            .transpose()?;
        let availability = req
            .availability
            .as_ref()
            .map(canonical_availability)
            .transpose()?;

        let row = sqlx::query_as::<_, TutorService>(
            "UPDATE tutor_services
             SET title        = COALESCE($1, title),
                 description  = COALESCE($2, description),
                 service_type = COALESCE($3, service_type),
                 hourly_rate  = COALESCE($4, hourly_rate),
                 subjects     = COALESCE($5, subjects),
                 availability = COALESCE($6, availability),
                 is_active    = COALESCE($7, is_active),
                 updated_at   = NOW()
             WHERE id = $8
             RETURNING *",
        )
        .bind(title)
        .bind(req.description.as_deref().map(str::trim))
        .bind(req.service_type.map(|t| t.to_string()))
        .bind(price)
        .bind(subjects)
        .bind(availability)
        .bind(req.is_active)
        .bind(id)
        .fetch_one(pool)
        .await?;
        Ok(row)
    }

    /// Soft delete: bookings keep pointing at the row.
    pub async fn deactivate(pool: &PgPool, id: Uuid, tutor_id: Uuid) -> ApiResult<()> {
        Self::get_owned(pool, id, tutor_id).await?;
        sqlx::query("UPDATE tutor_services SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_title_and_price_validation() {
        assert_eq!(validate_title("  Piano lessons ").unwrap(), "Piano lessons");
        assert!(validate_title("   ").is_err());
        assert!(validate_title(&"t".repeat(201)).is_err());
        assert_eq!(validate_price(0.0).unwrap(), 0.0);
        assert!(validate_price(-5.0).is_err());
        assert!(validate_price(f64::NAN).is_err());
    }

    #[test]
    fn test_canonical_availability_accepts_both_shapes() {
        assert_eq!(
            canonical_availability(&json!(["Sat", "monday"])).unwrap(),
            vec!["monday", "saturday"]
        );
        assert_eq!(
            canonical_availability(&json!({ "tuesday": true, "friday": false })).unwrap(),
            vec!["tuesday"]
        );
        assert!(canonical_availability(&json!(null)).unwrap().is_empty());
        assert!(matches!(
            canonical_availability(&json!(["noday"])),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn test_create_request_defaults() {
        let req: CreateServiceRequest = serde_json::from_value(json!({
            "title": "Evening babysitting",
            "type": "babysitting",
            "price": 14.5
        }))
        .unwrap();
        assert!(req.subjects.is_empty());
        assert!(req.availability.is_null());
        assert_eq!(req.description, "");
    }
}
