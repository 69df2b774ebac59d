use tower_http::services::ServeDir;

/// Files under `static_dir`, mounted at `/static` (listing placeholder image).
pub fn static_files(static_dir: &str) -> ServeDir {
    ServeDir::new(static_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        Router,
    };
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new().nest_service(
            "/static",
            static_files(concat!(env!("CARGO_MANIFEST_DIR"), "/static")),
        )
    }

    #[tokio::test]
    async fn test_placeholder_image_is_served() {
        let res = app()
            .oneshot(Request::builder().uri("/static/placeholder.svg").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers().get(header::CONTENT_TYPE).unwrap(), "image/svg+xml");
    }

    #[tokio::test]
    async fn test_missing_asset_is_not_found() {
        let res = app()
            .oneshot(Request::builder().uri("/static/nope.png").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
