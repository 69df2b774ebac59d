use chrono::{DateTime, Duration, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    models::{
        booking::{Booking, BookingSide, BookingStatus, CreateBookingRequest},
        profile::{ApprovalStatus, Role},
    },
    services::{metrics, profiles::ProfileService},
};

const MAX_BOOKING_HOURS: i64 = 12;

/// Whether `side` may move a booking from `from` to `to`.
pub fn can_transition(from: BookingStatus, to: BookingStatus, side: BookingSide) -> bool {
    use crate::models::booking::{BookingSide::*, BookingStatus::*};
    matches!(
        (from, to, side),
        (Pending, Confirmed, Tutor)
            | (Pending, Cancelled, _)
            | (Confirmed, Cancelled, _)
            | (Confirmed, Completed, Tutor)
    )
}

/// Hourly rate times duration, rounded to cents.
pub fn total_price(hourly_rate: f64, starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> f64 {
    let hours = (ends_at - starts_at).num_minutes() as f64 / 60.0;
    (hourly_rate * hours * 100.0).round() / 100.0
}

pub fn validate_window(
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> ApiResult<()> {
    if ends_at <= starts_at {
        return Err(ApiError::validation("Booking must end after it starts"));
    }
    if starts_at <= now {
        return Err(ApiError::validation("Booking must start in the future"));
    }
    if ends_at - starts_at > Duration::hours(MAX_BOOKING_HOURS) {
        return Err(ApiError::validation(format!(
            "Booking cannot last more than {MAX_BOOKING_HOURS} hours"
        )));
    }
    Ok(())
}

/// A service row with its tutor's standing.
#[derive(Debug, Clone, FromRow)]
pub struct BookableService {
    pub id: Uuid,
    pub tutor_id: Uuid,
    pub hourly_rate: f64,
    pub is_active: bool,
    pub tutor_role: String,
    pub tutor_approval: String,
}

impl BookableService {
    /// Active, and offered by an approved student.
    pub fn is_bookable(&self) -> bool {
        self.is_active
            && self.tutor_role.parse::<Role>().ok() == Some(Role::Student)
            && self.tutor_approval.parse::<ApprovalStatus>().ok() == Some(ApprovalStatus::Approved)
    }
}

pub struct BookingService;

impl BookingService {
    pub async fn create(
        pool: &PgPool,
        parent_id: Uuid,
        req: &CreateBookingRequest,
    ) -> ApiResult<Booking> {
        let parent = ProfileService::get(pool, parent_id).await?;
        if parent.role() != Role::Parent {
            return Err(ApiError::forbidden("Only parents can book services"));
        }
        if parent.approval() != ApprovalStatus::Approved {
            return Err(ApiError::forbidden("Your profile must be approved before booking"));
        }

        validate_window(req.starts_at, req.ends_at, Utc::now())?;

        // Same scope as search: hidden listings are not bookable.
        let service = sqlx::query_as::<_, BookableService>(
            "SELECT s.id, s.tutor_id, s.hourly_rate, s.is_active,
                    p.role AS tutor_role, p.approval_status AS tutor_approval
             FROM tutor_services s
             JOIN profiles p ON p.id = s.tutor_id
             WHERE s.id = $1",
        )
        .bind(req.service_id)
        .fetch_optional(pool)
        .await?
        .filter(BookableService::is_bookable)
        .ok_or_else(|| ApiError::not_found("Service"))?;

        if service.tutor_id == parent_id {
            return Err(ApiError::validation("You cannot book your own service"));
        }

        let notes = req
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());

        let booking = sqlx::query_as::<_, Booking>(
            "INSERT INTO bookings (service_id, parent_id, tutor_id, starts_at, ends_at, notes, total_price)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING *",
        )
        .bind(service.id)
        .bind(parent_id)
        .bind(service.tutor_id)
        .bind(req.starts_at)
        .bind(req.ends_at)
        .bind(notes)
        .bind(total_price(service.hourly_rate, req.starts_at, req.ends_at))
        .fetch_one(pool)
        .await?;

        metrics::BOOKINGS_COUNTER.with_label_values(&["pending"]).inc();
        tracing::info!("Booking {} created for service {}", booking.id, service.id);
        Ok(booking)
    }

    pub async fn list_for(pool: &PgPool, user_id: Uuid, side: BookingSide) -> ApiResult<Vec<Booking>> {
        let column = match side {
            BookingSide::Parent => "parent_id",
            BookingSide::Tutor => "tutor_id",
        };
        let rows = sqlx::query_as::<_, Booking>(&format!(
            "SELECT * FROM bookings WHERE {column} = $1 ORDER BY starts_at DESC"
        ))
        .bind(user_id)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    pub async fn get_for_participant(pool: &PgPool, id: Uuid, user_id: Uuid) -> ApiResult<Booking> {
        let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .filter(|b| b.side_of(user_id).is_some())
            .ok_or_else(|| ApiError::not_found("Booking"))?;
        Ok(booking)
    }

    pub async fn update_status(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
        to: BookingStatus,
    ) -> ApiResult<Booking> {
        let booking = Self::get_for_participant(pool, id, user_id).await?;
        let side = booking
            .side_of(user_id)
            .ok_or_else(|| ApiError::not_found("Booking"))?;
        let from = booking.status();

        if !can_transition(from, to, side) {
            return Err(ApiError::conflict(format!(
                "Cannot move booking from {from} to {to}"
            )));
        }

        // Guard on the previous status so concurrent updates cannot both apply.
        let updated = sqlx::query_as::<_, Booking>(
            "UPDATE bookings SET status = $1, updated_at = NOW()
             WHERE id = $2 AND status = $3
             RETURNING *",
        )
        .bind(to.as_str())
        .bind(id)
        .bind(from.as_str())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::conflict("Booking was modified concurrently, reload and retry"))?;

        metrics::BOOKINGS_COUNTER.with_label_values(&[to.as_str()]).inc();
        tracing::info!("Booking {} moved from {} to {}", id, from, to);
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::booking::{BookingSide::*, BookingStatus::*};

    #[test]
    fn test_allowed_transitions() {
        assert!(can_transition(Pending, Confirmed, Tutor));
        assert!(can_transition(Pending, Cancelled, Parent));
        assert!(can_transition(Pending, Cancelled, Tutor));
        assert!(can_transition(Confirmed, Cancelled, Parent));
        assert!(can_transition(Confirmed, Completed, Tutor));
    }

    #[test]
    fn test_forbidden_transitions() {
        assert!(!can_transition(Pending, Confirmed, Parent));
        assert!(!can_transition(Confirmed, Completed, Parent));
        assert!(!can_transition(Pending, Completed, Tutor));
        assert!(!can_transition(Cancelled, Confirmed, Tutor));
        assert!(!can_transition(Completed, Cancelled, Parent));
        assert!(!can_transition(Pending, Pending, Tutor));
    }

    #[test]
    fn test_total_price_rounds_to_cents() {
        let start = Utc::now();
        assert_eq!(total_price(20.0, start, start + Duration::minutes(90)), 30.0);
        assert_eq!(total_price(13.33, start, start + Duration::minutes(20)), 4.44);
    }

    #[test]
    fn test_booking_window() {
        let now = Utc::now();
        let start = now + Duration::hours(2);
        assert!(validate_window(start, start + Duration::hours(3), now).is_ok());
        assert!(validate_window(start, start, now).is_err());
        assert!(validate_window(now - Duration::hours(1), now + Duration::hours(1), now).is_err());
        assert!(validate_window(start, start + Duration::hours(13), now).is_err());
    }

    fn bookable(is_active: bool, role: &str, approval: &str) -> BookableService {
        BookableService {
            id: Uuid::new_v4(),
            tutor_id: Uuid::new_v4(),
            hourly_rate: 15.0,
            is_active,
            tutor_role: role.into(),
            tutor_approval: approval.into(),
        }
    }

    #[test]
    fn test_only_listed_services_are_bookable() {
        assert!(bookable(true, "student", "approved").is_bookable());
        assert!(!bookable(false, "student", "approved").is_bookable());
        assert!(!bookable(true, "student", "pending").is_bookable());
        assert!(!bookable(true, "student", "rejected").is_bookable());
        assert!(!bookable(true, "parent", "approved").is_bookable());
        assert!(!bookable(true, "admin", "approved").is_bookable());
    }
}
