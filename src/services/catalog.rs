use chrono::NaiveTime;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    models::catalog::{AvailabilitySlot, DayOfWeek, SlotInput, Specialty},
};

const MAX_SPECIALTY_LEN: usize = 64;

/// Trim, drop blanks and deduplicate case-insensitively, keeping first spelling.
pub fn normalize_names(names: &[String], max_len: usize) -> ApiResult<Vec<String>> {
    let mut out: Vec<String> = Vec::new();
    for name in names {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        if name.chars().count() > max_len {
            return Err(ApiError::validation(format!(
                "\"{name}\" is longer than {max_len} characters"
            )));
        }
        if !out.iter().any(|n| n.to_lowercase() == name.to_lowercase()) {
            out.push(name.to_string());
        }
    }
    Ok(out)
}

fn parse_time(s: &str) -> ApiResult<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| ApiError::validation(format!("Invalid time \"{s}\", expected HH:MM")))
}

/// Parse slots and check each is a forward range not overlapping another on the same day.
pub fn validate_slots(slots: &[SlotInput]) -> ApiResult<Vec<(DayOfWeek, NaiveTime, NaiveTime)>> {
    let mut parsed = slots
        .iter()
        .map(|slot| {
            let day: DayOfWeek = slot
                .day_of_week
                .parse()
                .map_err(|e: anyhow::Error| ApiError::validation(e.to_string()))?;
            let start = parse_time(&slot.start_time)?;
            let end = parse_time(&slot.end_time)?;
            if start >= end {
                return Err(ApiError::validation(format!(
                    "Slot on {day} must end after it starts"
                )));
            }
            Ok((day, start, end))
        })
        .collect::<ApiResult<Vec<_>>>()?;

    parsed.sort();
    for pair in parsed.windows(2) {
        let (day_a, _, end_a) = pair[0];
        let (day_b, start_b, _) = pair[1];
        if day_a == day_b && start_b < end_a {
            return Err(ApiError::validation(format!("Overlapping slots on {day_a}")));
        }
    }
    Ok(parsed)
}

pub struct CatalogService;

impl CatalogService {
    pub async fn list_specialties(pool: &PgPool, profile_id: Uuid) -> ApiResult<Vec<Specialty>> {
        let rows = sqlx::query_as::<_, Specialty>(
            "SELECT id, profile_id, name FROM specialties WHERE profile_id = $1 ORDER BY name",
        )
        .bind(profile_id)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    /// Replace the whole specialty set of a profile.
    pub async fn set_specialties(
        pool: &PgPool,
        profile_id: Uuid,
        names: &[String],
    ) -> ApiResult<Vec<Specialty>> {
        let names = normalize_names(names, MAX_SPECIALTY_LEN)?;

        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM specialties WHERE profile_id = $1")
            .bind(profile_id)
            .execute(&mut *tx)
            .await?;
        for name in &names {
            sqlx::query("INSERT INTO specialties (profile_id, name) VALUES ($1, $2)")
                .bind(profile_id)
                .bind(name)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Self::list_specialties(pool, profile_id).await
    }

    pub async fn list_availability(
        pool: &PgPool,
        profile_id: Uuid,
    ) -> ApiResult<Vec<AvailabilitySlot>> {
        let rows = sqlx::query_as::<_, AvailabilitySlot>(
            "SELECT * FROM availability WHERE profile_id = $1
             ORDER BY array_position(
                 ARRAY['monday','tuesday','wednesday','thursday','friday','saturday','sunday']::TEXT[],
                 day_of_week::TEXT), start_time",
        )
        .bind(profile_id)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    /// Replace all availability slots of a profile.
    pub async fn set_availability(
        pool: &PgPool,
        profile_id: Uuid,
        slots: &[SlotInput],
    ) -> ApiResult<Vec<AvailabilitySlot>> {
        let slots = validate_slots(slots)?;

        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM availability WHERE profile_id = $1")
            .bind(profile_id)
            .execute(&mut *tx)
            .await?;
        for (day, start, end) in &slots {
            sqlx::query(
                "INSERT INTO availability (profile_id, day_of_week, start_time, end_time)
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(profile_id)
            .bind(day.as_str())
            .bind(start)
            .bind(end)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        tracing::debug!("Profile {} now has {} availability slot(s)", profile_id, slots.len());
        Self::list_availability(pool, profile_id).await
    }
}
