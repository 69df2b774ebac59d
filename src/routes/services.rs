use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    middleware::extract::{ApiJson, ApiPath},
    models::{
        auth::{AuthenticatedUser, OptionalUser},
        profile::Role,
        service::{
            CreateServiceRequest, SearchRequest, SearchResponse, ServiceListing, TutorService,
            UpdateServiceRequest,
        },
    },
    services::{
        listings::ListingService,
        search::{SearchService, ServiceFilter},
    },
    AppState,
};

/// Serves both `/get-services` and `/search-tutor-services`.
pub async fn search_services(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    ApiJson(body): ApiJson<SearchRequest>,
) -> ApiResult<Json<SearchResponse>> {
    let filter = ServiceFilter::from_request(&body)?;
    let visibility = SearchService::visibility_for(&state.db, user.as_ref()).await?;
    let services = SearchService::search(
        &state.db,
        &state.config,
        &filter,
        body.limit,
        body.offset,
        visibility,
    )
    .await?;
    Ok(Json(SearchResponse { services }))
}

pub async fn get_service(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<ServiceListing>> {
    let visibility = SearchService::visibility_for(&state.db, user.as_ref()).await?;
    let listing = SearchService::get_listing(&state.db, &state.config, id, visibility).await?;
    Ok(Json(listing))
}

pub async fn list_my_services(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<Vec<TutorService>>> {
    let rows = ListingService::list_for_tutor(&state.db, user.user_id).await?;
    Ok(Json(rows))
}

pub async fn create_service(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(body): ApiJson<CreateServiceRequest>,
) -> ApiResult<(StatusCode, Json<TutorService>)> {
    if user.role != Role::Student {
        return Err(ApiError::forbidden("Only students can offer services"));
    }
    let row = ListingService::create(&state.db, user.user_id, &body).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn update_service(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<UpdateServiceRequest>,
) -> ApiResult<Json<TutorService>> {
    let row = ListingService::update(&state.db, id, user.user_id, &body).await?;
    Ok(Json(row))
}

pub async fn delete_service(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Value>> {
    ListingService::deactivate(&state.db, id, user.user_id).await?;
    Ok(Json(json!({ "message": "Service deactivated" })))
}
