use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    models::profile::{ApprovalStatus, Profile, Role},
    services::metrics,
};

const MAX_NOTE_LEN: usize = 1000;

pub struct AdminService;

impl AdminService {
    /// Profiles in the approval queue; defaults to the pending ones.
    pub async fn list_profiles(
        pool: &PgPool,
        status: Option<ApprovalStatus>,
        role: Option<Role>,
    ) -> ApiResult<Vec<Profile>> {
        let status = status.unwrap_or(ApprovalStatus::Pending);
        let rows = sqlx::query_as::<_, Profile>(
            "SELECT * FROM profiles
             WHERE approval_status = $1 AND ($2::TEXT IS NULL OR role = $2)
             ORDER BY created_at ASC",
        )
        .bind(status.to_string())
        .bind(role.map(|r| r.to_string()))
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    pub async fn set_approval(
        pool: &PgPool,
        admin_id: Uuid,
        profile_id: Uuid,
        status: ApprovalStatus,
        note: Option<&str>,
    ) -> ApiResult<Profile> {
        if admin_id == profile_id {
            return Err(ApiError::forbidden("Admins cannot change their own approval"));
        }
        let note = note.map(str::trim).filter(|n| !n.is_empty());
        if note.is_some_and(|n| n.chars().count() > MAX_NOTE_LEN) {
            return Err(ApiError::validation(format!(
                "Note must be at most {MAX_NOTE_LEN} characters"
            )));
        }

        let profile = sqlx::query_as::<_, Profile>(
            "UPDATE profiles
             SET approval_status = $1, approval_note = $2, updated_at = NOW()
             WHERE id = $3
             RETURNING *",
        )
        .bind(status.to_string())
        .bind(note)
        .bind(profile_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Profile"))?;

        metrics::APPROVALS_COUNTER
            .with_label_values(&[status.to_string().as_str()])
            .inc();
        tracing::info!("Admin {} set profile {} to {}", admin_id, profile_id, status);
        Ok(profile)
    }
}
