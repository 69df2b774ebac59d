use axum::{
    extract::State,
    http::StatusCode,
    Json,
};

use crate::{
    error::ApiResult,
    middleware::extract::{ApiJson, ApiQuery},
    models::{
        auth::AuthenticatedUser,
        profile::{ApprovalStatus, Role},
        school::{CreateSchoolRequest, School, SchoolQuery},
    },
    services::schools::SchoolService,
    AppState,
};

pub async fn list_schools(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SchoolQuery>,
) -> ApiResult<Json<Vec<School>>> {
    let schools = SchoolService::list_approved(&state.db, query.q.as_deref()).await?;
    Ok(Json(schools))
}

pub async fn suggest_school(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(body): ApiJson<CreateSchoolRequest>,
) -> ApiResult<(StatusCode, Json<School>)> {
    let status = if user.role == Role::Admin {
        ApprovalStatus::Approved
    } else {
        ApprovalStatus::Pending
    };
    let school = SchoolService::create(&state.db, &body, status).await?;
    tracing::info!("User {} suggested school {} ({})", user.user_id, school.id, status);
    Ok((StatusCode::CREATED, Json(school)))
}
