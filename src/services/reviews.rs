use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    models::{
        booking::{Booking, BookingStatus},
        review::{CreateReviewRequest, PublicReview, Review, ReviewSummary},
    },
};

const MAX_COMMENT_LEN: usize = 2000;

/// Check rating bounds and normalise the comment (blank becomes `None`).
pub fn validate_review(rating: i16, comment: Option<&str>) -> ApiResult<Option<String>> {
    if !(1..=5).contains(&rating) {
        return Err(ApiError::validation("Rating must be between 1 and 5"));
    }
    let comment = comment.map(str::trim).filter(|c| !c.is_empty());
    if let Some(c) = comment {
        if c.chars().count() > MAX_COMMENT_LEN {
            return Err(ApiError::validation(format!(
                "Comment must be at most {MAX_COMMENT_LEN} characters"
            )));
        }
    }
    Ok(comment.map(str::to_string))
}

pub fn average_rating(reviews: &[PublicReview]) -> f64 {
    if reviews.is_empty() {
        return 0.0;
    }
    let sum: f64 = reviews.iter().map(|r| r.rating as f64).sum();
    (sum / reviews.len() as f64 * 10.0).round() / 10.0
}

pub struct ReviewService;

impl ReviewService {
    pub async fn create(
        pool: &PgPool,
        reviewer_id: Uuid,
        req: &CreateReviewRequest,
    ) -> ApiResult<Review> {
        let comment = validate_review(req.rating, req.comment.as_deref())?;

        let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
            .bind(req.booking_id)
            .fetch_optional(pool)
            .await?
            .filter(|b| b.parent_id == reviewer_id)
            .ok_or_else(|| ApiError::not_found("Booking"))?;

        if booking.status() != BookingStatus::Completed {
            return Err(ApiError::validation("Only completed bookings can be reviewed"));
        }

        let review = sqlx::query_as::<_, Review>(
            "INSERT INTO reviews (booking_id, reviewer_id, reviewee_id, rating, comment)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING *",
        )
        .bind(booking.id)
        .bind(reviewer_id)
        .bind(booking.tutor_id)
        .bind(req.rating)
        .bind(comment)
        .fetch_one(pool)
        .await
        .map_err(|e| match ApiError::from(e) {
            ApiError::Conflict(_) => ApiError::conflict("This booking has already been reviewed"),
            other => other,
        })?;

        tracing::info!("Review {} left for booking {}", review.id, booking.id);
        Ok(review)
    }

    pub async fn summary_for(pool: &PgPool, profile_id: Uuid) -> ApiResult<ReviewSummary> {
        let reviews = sqlx::query_as::<_, PublicReview>(
            "SELECT r.id, r.rating, r.comment, p.first_name AS reviewer_first_name, r.created_at
             FROM reviews r
             JOIN profiles p ON p.id = r.reviewer_id
             WHERE r.reviewee_id = $1
             ORDER BY r.created_at DESC",
        )
        .bind(profile_id)
        .fetch_all(pool)
        .await?;

        Ok(ReviewSummary {
            average: average_rating(&reviews),
            count: reviews.len(),
            reviews,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn review(rating: i16) -> PublicReview {
        PublicReview {
            id: Uuid::new_v4(),
            rating,
            comment: None,
            reviewer_first_name: "Ana".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_rating_bounds() {
        assert!(validate_review(0, None).is_err());
        assert!(validate_review(6, None).is_err());
        assert!(validate_review(1, None).is_ok());
        assert!(validate_review(5, None).is_ok());
    }

    #[test]
    fn test_comment_normalisation() {
        assert_eq!(validate_review(4, Some("   ")).unwrap(), None);
        assert_eq!(
            validate_review(4, Some(" Great with kids ")).unwrap().as_deref(),
            Some("Great with kids")
        );
        assert!(validate_review(4, Some(&"a".repeat(2001))).is_err());
    }

    #[test]
    fn test_average_rating() {
        assert_eq!(average_rating(&[]), 0.0);
        assert_eq!(average_rating(&[review(5), review(4), review(4)]), 4.3);
    }
}
