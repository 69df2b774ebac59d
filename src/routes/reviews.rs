use axum::{extract::State, http::StatusCode, Json};

use crate::{
    error::ApiResult,
    middleware::extract::ApiJson,
    models::{
        auth::AuthenticatedUser,
        review::{CreateReviewRequest, Review},
    },
    services::reviews::ReviewService,
    AppState,
};

pub async fn create_review(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(body): ApiJson<CreateReviewRequest>,
) -> ApiResult<(StatusCode, Json<Review>)> {
    let review = ReviewService::create(&state.db, user.user_id, &body).await?;
    Ok((StatusCode::CREATED, Json(review)))
}
