use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::ApiResult,
    middleware::extract::{ApiJson, ApiPath, ApiQuery},
    models::{
        auth::AuthenticatedUser,
        booking::{Booking, BookingQuery, BookingSide, CreateBookingRequest, UpdateBookingStatusRequest},
        profile::Role,
    },
    services::bookings::BookingService,
    AppState,
};

pub async fn create_booking(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(body): ApiJson<CreateBookingRequest>,
) -> ApiResult<(StatusCode, Json<Booking>)> {
    let booking = BookingService::create(&state.db, user.user_id, &body).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

pub async fn list_bookings(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiQuery(query): ApiQuery<BookingQuery>,
) -> ApiResult<Json<Vec<Booking>>> {
    let side = query.side.unwrap_or(match user.role {
        Role::Student => BookingSide::Tutor,
        _ => BookingSide::Parent,
    });
    let rows = BookingService::list_for(&state.db, user.user_id, side).await?;
    Ok(Json(rows))
}

pub async fn update_booking_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<UpdateBookingStatusRequest>,
) -> ApiResult<Json<Booking>> {
    let booking = BookingService::update_status(&state.db, id, user.user_id, body.status).await?;
    Ok(Json(booking))
}
