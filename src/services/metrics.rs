use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_gauge_vec, CounterVec, GaugeVec};
use sqlx::PgPool;
use tracing::{info, warn};

lazy_static! {
    // ── Event counters (increment on each event) ────────────────────────────
    pub static ref LOGINS_COUNTER: CounterVec = register_counter_vec!(
        "api_logins_total",
        "Login attempts by outcome",
        &["status"]
    ).unwrap();

    pub static ref SEARCHES_COUNTER: CounterVec = register_counter_vec!(
        "api_service_searches_total",
        "Service searches by caller visibility tier",
        &["visibility"]
    ).unwrap();

    pub static ref BOOKINGS_COUNTER: CounterVec = register_counter_vec!(
        "api_booking_transitions_total",
        "Bookings created or moved to a status",
        &["status"]
    ).unwrap();

    pub static ref APPROVALS_COUNTER: CounterVec = register_counter_vec!(
        "api_profile_approvals_total",
        "Admin approval decisions",
        &["status"]
    ).unwrap();

    // ── Business metrics ────────────────────────────────────────────────────
    pub static ref PROFILES_GAUGE: GaugeVec = register_gauge_vec!(
        "marketplace_profiles_total",
        "Profiles by role and approval status",
        &["role", "approval_status"]
    ).unwrap();

    pub static ref SERVICES_GAUGE: GaugeVec = register_gauge_vec!(
        "marketplace_services_active_total",
        "Active service listings by type",
        &["type"]
    ).unwrap();

    pub static ref BOOKINGS_GAUGE: GaugeVec = register_gauge_vec!(
        "marketplace_bookings_total",
        "Bookings by status",
        &["status"]
    ).unwrap();
}

/// Spawn the background metrics collector (refreshes every 5 minutes).
pub fn start(pool: PgPool) {
    tokio::spawn(async move {
        // Initial collection on startup
        if let Err(e) = collect(&pool).await {
            warn!("Metrics: initial collection failed: {}", e);
        }
        loop {
            tokio::time::sleep(tokio::time::Duration::from_secs(300)).await;
            if let Err(e) = collect(&pool).await {
                warn!("Metrics: collection failed: {}", e);
            }
        }
    });
}

async fn collect(pool: &PgPool) -> anyhow::Result<()> {
    let profiles: Vec<(String, String, i64)> = sqlx::query_as(
        "SELECT role, approval_status, COUNT(*)::BIGINT FROM profiles GROUP BY role, approval_status",
    )
    .fetch_all(pool)
    .await?;
    PROFILES_GAUGE.reset();
    for (role, status, count) in &profiles {
        PROFILES_GAUGE.with_label_values(&[role.as_str(), status.as_str()]).set(*count as f64);
    }

    let services: Vec<(String, i64)> = sqlx::query_as(
        "SELECT service_type, COUNT(*)::BIGINT FROM tutor_services WHERE is_active = TRUE GROUP BY service_type",
    )
    .fetch_all(pool)
    .await?;
    SERVICES_GAUGE.reset();
    for (service_type, count) in &services {
        SERVICES_GAUGE.with_label_values(&[service_type.as_str()]).set(*count as f64);
    }

    let bookings: Vec<(String, i64)> =
        sqlx::query_as("SELECT status, COUNT(*)::BIGINT FROM bookings GROUP BY status")
            .fetch_all(pool)
            .await?;
    BOOKINGS_GAUGE.reset();
    for (status, count) in &bookings {
        BOOKINGS_GAUGE.with_label_values(&[status.as_str()]).set(*count as f64);
    }

    info!(
        "Metrics: collected {} profile group(s), {} service type(s), {} booking status(es)",
        profiles.len(),
        services.len(),
        bookings.len()
    );
    Ok(())
}
