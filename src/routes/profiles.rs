use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    middleware::extract::{ApiJson, ApiPath},
    models::{
        auth::AuthenticatedUser,
        catalog::{AvailabilitySlot, SetAvailabilityRequest, SetSpecialtiesRequest, Specialty},
        profile::Profile,
        review::ReviewSummary,
    },
    services::{
        avatars::AvatarService,
        catalog::CatalogService,
        profiles::{sanitize_profile_update, ProfileService},
        reviews::ReviewService,
    },
    AppState,
};

pub async fn get_my_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<Profile>> {
    let profile = ProfileService::get_or_create(&state.db, user.user_id).await?;
    Ok(Json(profile))
}

pub async fn update_my_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(body): ApiJson<Map<String, Value>>,
) -> ApiResult<Json<Profile>> {
    let changes = sanitize_profile_update(&body)?;
    ProfileService::get_or_create(&state.db, user.user_id).await?;
    let profile = ProfileService::update(&state.db, user.user_id, &changes).await?;
    Ok(Json(profile))
}

pub async fn upload_avatar(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<Profile>> {
    let mut multipart = multipart?;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field.content_type().unwrap_or("").to_string();
        let filename = field.file_name().unwrap_or("").to_string();
        let data = field.bytes().await?;

        let url = AvatarService::store(
            &state.config,
            user.user_id,
            &content_type,
            &filename,
            data.to_vec(),
        )
        .await?;
        ProfileService::get_or_create(&state.db, user.user_id).await?;
        let profile = ProfileService::set_avatar_url(&state.db, user.user_id, &url).await?;
        return Ok(Json(profile));
    }

    Err(ApiError::validation("No file provided"))
}

pub async fn get_my_specialties(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<Vec<Specialty>>> {
    let rows = CatalogService::list_specialties(&state.db, user.user_id).await?;
    Ok(Json(rows))
}

pub async fn set_my_specialties(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(body): ApiJson<SetSpecialtiesRequest>,
) -> ApiResult<Json<Vec<Specialty>>> {
    ProfileService::get_or_create(&state.db, user.user_id).await?;
    let rows = CatalogService::set_specialties(&state.db, user.user_id, &body.names).await?;
    Ok(Json(rows))
}

pub async fn get_my_availability(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<Vec<AvailabilitySlot>>> {
    let rows = CatalogService::list_availability(&state.db, user.user_id).await?;
    Ok(Json(rows))
}

pub async fn set_my_availability(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(body): ApiJson<SetAvailabilityRequest>,
) -> ApiResult<Json<Vec<AvailabilitySlot>>> {
    ProfileService::get_or_create(&state.db, user.user_id).await?;
    let rows = CatalogService::set_availability(&state.db, user.user_id, &body.slots).await?;
    Ok(Json(rows))
}

pub async fn list_profile_reviews(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<ReviewSummary>> {
    let summary = ReviewService::summary_for(&state.db, id).await?;
    Ok(Json(summary))
}
