use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::{
    error::ApiResult,
    middleware::{
        extract::ApiJson,
        rate_limit::{check_rate_limit, login_key},
    },
    models::{
        auth::AuthenticatedUser,
        profile::{AuthResponse, LoginRequest, Profile, RefreshTokenRequest, RegisterRequest},
    },
    services::{auth::AuthService, profiles::ProfileService},
    AppState,
};

pub async fn register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let res = AuthService::register(&state.db, &state.config, &body).await?;
    Ok((StatusCode::CREATED, Json(res)))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    // 5 attempts per 15 min per email
    let mut redis = state.redis.clone();
    check_rate_limit(&mut redis, &login_key(&body.email), 5, 900).await?;

    let res = AuthService::login(&state.db, &state.config, &body.email, &body.password).await?;
    Ok(Json(res))
}

pub async fn refresh_token(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RefreshTokenRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let res = AuthService::refresh(&state.db, &state.config, &body.refresh_token).await?;
    Ok(Json(res))
}

pub async fn logout(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RefreshTokenRequest>,
) -> ApiResult<Json<Value>> {
    AuthService::logout(&state.db, &state.config, &body.refresh_token).await?;
    Ok(Json(json!({ "message": "Logged out" })))
}

pub async fn me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<Profile>> {
    let profile = ProfileService::get_or_create(&state.db, user.user_id).await?;
    Ok(Json(profile))
}
