use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    models::{
        profile::ApprovalStatus,
        school::{CreateSchoolRequest, School},
    },
    services::search::like_pattern,
};

fn clean(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

/// ILIKE pattern for a name fragment; blank input means no filter.
fn name_pattern(q: Option<&str>) -> Option<String> {
    clean(q).map(|q| like_pattern(&q))
}

pub struct SchoolService;

impl SchoolService {
    /// Approved schools, optionally narrowed by a case-insensitive name fragment.
    pub async fn list_approved(pool: &PgPool, q: Option<&str>) -> ApiResult<Vec<School>> {
        let pattern = name_pattern(q);
        let schools = sqlx::query_as::<_, School>(
            "SELECT * FROM schools
             WHERE status = 'approved' AND ($1::TEXT IS NULL OR name ILIKE $1)
             ORDER BY name",
        )
        .bind(pattern)
        .fetch_all(pool)
        .await?;
        Ok(schools)
    }

    pub async fn list_by_status(
        pool: &PgPool,
        status: Option<ApprovalStatus>,
    ) -> ApiResult<Vec<School>> {
        let schools = sqlx::query_as::<_, School>(
            "SELECT * FROM schools
             WHERE ($1::TEXT IS NULL OR status = $1)
             ORDER BY created_at DESC",
        )
        .bind(status.map(|s| s.to_string()))
        .fetch_all(pool)
        .await?;
        Ok(schools)
    }

    /// Suggest a school. Admin suggestions are approved straight away.
    pub async fn create(
        pool: &PgPool,
        req: &CreateSchoolRequest,
        status: ApprovalStatus,
    ) -> ApiResult<School> {
        let name = clean(Some(req.name.as_str()))
            .ok_or_else(|| ApiError::validation("School name is required"))?;
        if name.chars().count() > 255 {
            return Err(ApiError::validation("School name is too long"));
        }

        sqlx::query_as::<_, School>(
            "INSERT INTO schools (name, address, city, status)
             VALUES ($1, $2, $3, $4)
             RETURNING *",
        )
        .bind(&name)
        .bind(clean(req.address.as_deref()))
        .bind(clean(req.city.as_deref()))
        .bind(status.to_string())
        .fetch_one(pool)
        .await
        .map_err(|e| match ApiError::from(e) {
            ApiError::Conflict(_) => ApiError::conflict("This school already exists"),
            other => other,
        })
    }

    pub async fn set_status(pool: &PgPool, id: Uuid, status: ApprovalStatus) -> ApiResult<School> {
        let school = sqlx::query_as::<_, School>(
            "UPDATE schools SET status = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
        )
        .bind(status.to_string())
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("School"))?;

        tracing::info!("School {} is now {}", school.id, status);
        Ok(school)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_pattern() {
        assert_eq!(name_pattern(None), None);
        assert_eq!(name_pattern(Some("   ")), None);
        assert_eq!(name_pattern(Some(" Lycée ")).as_deref(), Some("%Lycée%"));
        assert_eq!(
            name_pattern(Some(r"50%_a\b")).as_deref(),
            Some(r"%50\%\_a\\b%")
        );
    }
}
