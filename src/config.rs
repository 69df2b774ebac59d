use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub jwt_secret: String,
    pub jwt_refresh_secret: String,
    pub jwt_expiry_seconds: u64,
    pub jwt_refresh_expiry_days: u64,
    pub media_dir: String,
    /// Directory served at `/static`.
    pub static_dir: String,
    pub host: String,
    pub port: u16,
    pub app_base_url: String,
    /// Image shown on listings when the caller may not see the provider avatar.
    pub placeholder_image_url: String,
    /// Location label used when a provider has no region to blur to.
    pub hidden_location_label: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let app_base_url =
            env::var("APP_BASE_URL").unwrap_or_else(|_| "http://localhost:8080".into());
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            redis_url: env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into()),
            jwt_secret: required("JWT_SECRET")?,
            jwt_refresh_secret: required("JWT_REFRESH_SECRET")?,
            jwt_expiry_seconds: env::var("JWT_EXPIRY_SECONDS")
                .unwrap_or_else(|_| "900".into())
                .parse()?,
            jwt_refresh_expiry_days: env::var("JWT_REFRESH_EXPIRY_DAYS")
                .unwrap_or_else(|_| "30".into())
                .parse()?,
            media_dir: env::var("MEDIA_DIR").unwrap_or_else(|_| "/data/media".into()),
            static_dir: env::var("STATIC_DIR").unwrap_or_else(|_| "static".into()),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()?,
            placeholder_image_url: env::var("PLACEHOLDER_IMAGE_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| {
                    format!("{}/static/placeholder.svg", app_base_url.trim_end_matches('/'))
                }),
            hidden_location_label: env::var("HIDDEN_LOCATION_LABEL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "Location shared after approval".into()),
            app_base_url,
        })
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).map_err(|_| anyhow::anyhow!("Missing required env var: {}", key))
}
