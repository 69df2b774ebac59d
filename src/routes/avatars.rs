use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
};

use crate::{
    error::ApiResult, middleware::extract::ApiPath, services::avatars::AvatarService, AppState,
};

pub async fn serve_avatar(
    State(state): State<AppState>,
    ApiPath(file): ApiPath<String>,
) -> ApiResult<impl IntoResponse> {
    let data = AvatarService::read(&state.config, &file).await?;
    let content_type = mime_guess::from_path(&file).first_or_octet_stream();

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CACHE_CONTROL, "public, max-age=3600".to_string()),
        ],
        data,
    ))
}
