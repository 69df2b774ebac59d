//! Body, path and query extractors whose rejections render as `ApiError`.

use axum::{
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// `Json<T>` that rejects with a `{ "error": .. }` 400.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ApiJson(value))
    }
}

#[derive(Debug)]
pub struct ApiPath<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(ApiPath(value))
    }
}

#[derive(Debug)]
pub struct ApiQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(ApiQuery(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ApiResult,
        models::{booking::BookingQuery, service::SearchRequest},
    };
    use axum::{
        body::Body,
        http::{header, Request as HttpRequest, StatusCode},
        response::Response,
        routing::{get, post},
        Router,
    };
    use serde_json::Value;
    use tower::ServiceExt;
    use uuid::Uuid;

    async fn search(ApiJson(body): ApiJson<SearchRequest>) -> ApiResult<Json<Option<i64>>> {
        Ok(Json(body.limit))
    }

    async fn by_id(ApiPath(id): ApiPath<Uuid>) -> ApiResult<String> {
        Ok(id.to_string())
    }

    async fn bookings(ApiQuery(query): ApiQuery<BookingQuery>) -> ApiResult<String> {
        Ok(format!("{:?}", query.side))
    }

    fn app() -> Router {
        Router::new()
            .route("/get-services", post(search))
            .route("/services/{id}", get(by_id))
            .route("/bookings", get(bookings))
    }

    async fn error_body(res: Response) -> Value {
        assert_eq!(
            res.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(body: &'static str) -> HttpRequest<Body> {
        HttpRequest::builder()
            .method("POST")
            .uri("/get-services")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_bad_price_range_is_a_json_validation_error() {
        let res = app()
            .oneshot(post_json(r#"{"filters":{"priceRange":[30]}}"#))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body = error_body(res).await;
        assert!(body["error"].as_str().unwrap().contains("priceRange"));
    }

    #[tokio::test]
    async fn test_malformed_json_and_missing_content_type() {
        let res = app().oneshot(post_json("{not json")).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(error_body(res).await["error"].is_string());

        let res = app()
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/get-services")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(error_body(res).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_valid_body_passes_through() {
        let res = app().oneshot(post_json(r#"{"limit":5}"#)).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_bad_path_and_query_are_json_errors() {
        let res = app()
            .oneshot(HttpRequest::builder().uri("/services/not-a-uuid").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(error_body(res).await["error"].is_string());

        let res = app()
            .oneshot(HttpRequest::builder().uri("/bookings?as=nanny").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(error_body(res).await["error"].is_string());
    }
}
