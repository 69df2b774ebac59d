use axum::{
    extract::State,
    Json,
};
use uuid::Uuid;

use crate::{
    error::ApiResult,
    middleware::extract::{ApiJson, ApiPath, ApiQuery},
    models::{
        auth::AdminUser,
        profile::{AdminProfileQuery, ApprovalRequest, Profile},
        school::{AdminSchoolQuery, School, UpdateSchoolStatusRequest},
    },
    services::{admin::AdminService, schools::SchoolService},
    AppState,
};

pub async fn list_profiles(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiQuery(query): ApiQuery<AdminProfileQuery>,
) -> ApiResult<Json<Vec<Profile>>> {
    let rows = AdminService::list_profiles(&state.db, query.status, query.role).await?;
    Ok(Json(rows))
}

pub async fn set_profile_approval(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<ApprovalRequest>,
) -> ApiResult<Json<Profile>> {
    let profile = AdminService::set_approval(
        &state.db,
        admin.user_id,
        id,
        body.status,
        body.note.as_deref(),
    )
    .await?;
    Ok(Json(profile))
}

pub async fn list_schools(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiQuery(query): ApiQuery<AdminSchoolQuery>,
) -> ApiResult<Json<Vec<School>>> {
    let rows = SchoolService::list_by_status(&state.db, query.status).await?;
    Ok(Json(rows))
}

pub async fn set_school_status(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<UpdateSchoolStatusRequest>,
) -> ApiResult<Json<School>> {
    let school = SchoolService::set_status(&state.db, id, body.status).await?;
    Ok(Json(school))
}
