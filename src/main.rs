use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post, put},
    Router,
};
use redis::Client as RedisClient;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sitterlink_api::{
    config::Config, db, middleware::auth::JwtSecret, routes, services, AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let config = Arc::new(config);

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    info!("Database connected and migrations applied");

    let redis_client = RedisClient::open(config.redis_url.as_str())?;
    let redis_conn = redis_client.get_multiplexed_async_connection().await?;
    info!("Redis connected");

    services::metrics::start(pool.clone());

    let state = AppState {
        db: pool,
        redis: redis_conn,
        config: config.clone(),
    };

    // Allow the web app origin; localhost is always allowed for development.
    let base_url = config.app_base_url.trim_end_matches('/').to_string();
    let cors_origin = AllowOrigin::predicate(move |origin: &HeaderValue, _| {
        let Ok(o) = origin.to_str() else {
            return false;
        };
        o.starts_with("http://localhost") || o.starts_with("http://127.0.0.1") || o == base_url
    });

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(AllowHeaders::list([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
        ]))
        .allow_origin(cors_origin);

    let jwt_secret = JwtSecret(config.jwt_secret.clone());

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::metrics::metrics_handler))
        // Auth
        .route("/auth/register", post(routes::auth::register))
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/refresh", post(routes::auth::refresh_token))
        .route("/auth/logout", post(routes::auth::logout))
        .route("/auth/me", get(routes::auth::me))
        // Service search and listings
        .route("/get-services", post(routes::services::search_services))
        .route("/search-tutor-services", post(routes::services::search_services))
        .route("/services", post(routes::services::create_service))
        .route("/services/mine", get(routes::services::list_my_services))
        .route(
            "/services/{id}",
            get(routes::services::get_service)
                .put(routes::services::update_service)
                .delete(routes::services::delete_service),
        )
        // Profiles
        .route("/profiles/me", get(routes::profiles::get_my_profile).put(routes::profiles::update_my_profile))
        .route("/profiles/me/avatar", post(routes::profiles::upload_avatar))
        .route("/profiles/me/specialties", get(routes::profiles::get_my_specialties).put(routes::profiles::set_my_specialties))
        .route("/profiles/me/availability", get(routes::profiles::get_my_availability).put(routes::profiles::set_my_availability))
        .route("/profiles/{id}/reviews", get(routes::profiles::list_profile_reviews))
        .route("/avatars/{file}", get(routes::avatars::serve_avatar))
        .nest_service("/static", routes::assets::static_files(&config.static_dir))
        // Schools
        .route("/schools", get(routes::schools::list_schools).post(routes::schools::suggest_school))
        // Bookings & reviews
        .route("/bookings", get(routes::bookings::list_bookings).post(routes::bookings::create_booking))
        .route("/bookings/{id}/status", put(routes::bookings::update_booking_status))
        .route("/reviews", post(routes::reviews::create_review))
        // Admin
        .route("/admin/profiles", get(routes::admin::list_profiles))
        .route("/admin/profiles/{id}/approval", put(routes::admin::set_profile_approval))
        .route("/admin/schools", get(routes::admin::list_schools))
        .route("/admin/schools/{id}/status", put(routes::admin::set_school_status))
        .layer(axum::Extension(jwt_secret))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Global body size limit of 10 MB (covers avatar uploads)
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("sitterlink API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
