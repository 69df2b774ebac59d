use axum::http::StatusCode;
use prometheus::{Encoder, TextEncoder};

/// GET /metrics, Prometheus scrape endpoint (keep it off the public ingress).
pub async fn metrics_handler() -> Result<String, StatusCode> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    String::from_utf8(buffer).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::metrics::SEARCHES_COUNTER;
    use axum::{body::Body, http::Request, routing::get, Router};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_metrics_exposes_registered_counters() {
        SEARCHES_COUNTER.with_label_values(&["anonymous"]).inc();

        let app = Router::new().route("/metrics", get(metrics_handler));
        let res = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("api_service_searches_total"));
        assert!(text.contains("visibility=\"anonymous\""));
    }
}
