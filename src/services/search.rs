//! Service listing search.
//!
//! Scalar predicates (text, type, location, price) are pushed into SQL. The
//! array predicates (subjects, availability days) run over the fetched rows.
//! Every predicate also exists in memory on [`ServiceFilter`].

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    config::Config,
    error::{ApiError, ApiResult},
    models::{
        auth::AuthenticatedUser,
        catalog::DayOfWeek,
        profile::{ApprovalStatus, Role},
        service::{SearchRequest, ServiceListing, ServiceRecord, ServiceType},
    },
    services::metrics,
};

pub const DEFAULT_LIMIT: i64 = 50;
pub const MAX_LIMIT: i64 = 100;
/// Rows fetched per round trip when array post-filters are active.
const SCAN_BATCH: i64 = 500;

/// How much of a provider a caller may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Anonymous,
    Authenticated,
    Approved,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Anonymous => "anonymous",
            Visibility::Authenticated => "authenticated",
            Visibility::Approved => "approved",
        }
    }
}

/// Normalised search filter. Empty collections and `None` mean "no constraint".
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ServiceFilter {
    pub query: Option<String>,
    pub types: Vec<ServiceType>,
    pub location: Option<String>,
    pub price_range: Option<(f64, f64)>,
    pub subjects: Vec<String>,
    pub days: Vec<DayOfWeek>,
}

fn non_blank_lower(s: Option<&str>) -> Option<String> {
    s.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
}

fn contains_ci(haystack: Option<&str>, needle_lower: &str) -> bool {
    haystack.is_some_and(|h| h.to_lowercase().contains(needle_lower))
}

impl ServiceFilter {
    pub fn from_request(req: &SearchRequest) -> ApiResult<Self> {
        let filters = req.filters.clone().unwrap_or_default();

        let mut types = filters
            .types
            .unwrap_or_default()
            .iter()
            .map(|t| t.parse::<ServiceType>())
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(|e| ApiError::validation(e.to_string()))?;
        types.sort_by_key(|t| t.to_string());
        types.dedup();

        if let Some((min, max)) = filters.price_range {
            if !min.is_finite() || !max.is_finite() || min < 0.0 || max < 0.0 {
                return Err(ApiError::validation("priceRange bounds must be non-negative numbers"));
            }
            if min > max {
                return Err(ApiError::validation("priceRange minimum exceeds maximum"));
            }
        }

        let mut subjects: Vec<String> = filters
            .subjects
            .unwrap_or_default()
            .iter()
            .filter_map(|s| non_blank_lower(Some(s.as_str())))
            .collect();
        subjects.sort();
        subjects.dedup();

        let mut days = filters
            .availability
            .unwrap_or_default()
            .iter()
            .filter(|d| !d.trim().is_empty())
            .map(|d| d.parse::<DayOfWeek>())
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(|e| ApiError::validation(e.to_string()))?;
        days.sort();
        days.dedup();

        Ok(Self {
            query: non_blank_lower(req.query.as_deref()),
            types,
            location: non_blank_lower(filters.location.as_deref()),
            price_range: filters.price_range,
            subjects,
            days,
        })
    }

    /// True when the array predicates have to run in memory.
    pub fn has_post_filters(&self) -> bool {
        !self.subjects.is_empty() || !self.days.is_empty()
    }

    pub fn matches_query(&self, r: &ServiceRecord) -> bool {
        let Some(q) = &self.query else { return true };
        let full_name = format!("{} {}", r.first_name, r.last_name);
        contains_ci(Some(full_name.as_str()), q)
            || contains_ci(r.bio.as_deref(), q)
            || contains_ci(Some(r.title.as_str()), q)
            || self.location_text_matches(r, q)
    }

    pub fn matches_type(&self, r: &ServiceRecord) -> bool {
        self.types.is_empty() || self.types.contains(&r.service_type())
    }

    pub fn matches_location(&self, r: &ServiceRecord) -> bool {
        match &self.location {
            None => true,
            Some(loc) => self.location_text_matches(r, loc),
        }
    }

    fn location_text_matches(&self, r: &ServiceRecord, needle: &str) -> bool {
        contains_ci(r.city.as_deref(), needle)
            || contains_ci(r.region.as_deref(), needle)
            || contains_ci(r.address.as_deref(), needle)
    }

    /// Inclusive at both bounds.
    pub fn matches_price(&self, r: &ServiceRecord) -> bool {
        match self.price_range {
            None => true,
            Some((min, max)) => r.hourly_rate >= min && r.hourly_rate <= max,
        }
    }

    /// Any requested subject, case-insensitive.
    pub fn matches_subjects(&self, r: &ServiceRecord) -> bool {
        self.subjects.is_empty()
            || r
                .subjects
                .iter()
                .any(|s| self.subjects.contains(&s.trim().to_lowercase()))
    }

    /// Any requested day. Stored values that are not day names never match.
    pub fn matches_availability(&self, r: &ServiceRecord) -> bool {
        self.days.is_empty()
            || r
                .availability
                .iter()
                .filter_map(|d| d.parse::<DayOfWeek>().ok())
                .any(|d| self.days.contains(&d))
    }

    pub fn matches_post(&self, r: &ServiceRecord) -> bool {
        self.matches_subjects(r) && self.matches_availability(r)
    }

    pub fn matches(&self, r: &ServiceRecord) -> bool {
        self.matches_query(r)
            && self.matches_type(r)
            && self.matches_location(r)
            && self.matches_price(r)
            && self.matches_post(r)
    }
}

/// Apply every predicate of `filter` in memory, keeping input order.
pub fn filter_services(records: Vec<ServiceRecord>, filter: &ServiceFilter) -> Vec<ServiceRecord> {
    records.into_iter().filter(|r| filter.matches(r)).collect()
}

/// Apply the array predicates, then the page window, keeping input order.
pub fn page_post_filtered(
    records: Vec<ServiceRecord>,
    filter: &ServiceFilter,
    limit: i64,
    offset: i64,
) -> Vec<ServiceRecord> {
    records
        .into_iter()
        .filter(|r| filter.matches_post(r))
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

/// "Jane D." style display name.
pub fn abbreviate_name(first: &str, last: &str) -> String {
    match last.trim().chars().next() {
        Some(initial) => format!("{} {}.", first.trim(), initial.to_uppercase()),
        None => first.trim().to_string(),
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// Location shown to callers who may not see where the provider lives.
pub fn generic_location(r: &ServiceRecord, hidden_label: &str) -> String {
    non_empty(r.region.as_deref())
        .map(str::to_string)
        .unwrap_or_else(|| hidden_label.to_string())
}

/// City/region-level location. The street address is never exposed.
pub fn precise_location(r: &ServiceRecord, hidden_label: &str) -> String {
    let parts: Vec<&str> = [non_empty(r.city.as_deref()), non_empty(r.region.as_deref())]
        .into_iter()
        .flatten()
        .collect();
    if parts.is_empty() {
        hidden_label.to_string()
    } else {
        parts.join(", ")
    }
}

/// Project a record into the listing the caller is allowed to see.
pub fn to_listing(r: &ServiceRecord, visibility: Visibility, config: &Config) -> ServiceListing {
    let first_name = non_empty(Some(r.first_name.as_str())).map(str::to_string);
    let avatar = non_empty(r.avatar_url.as_deref()).map(str::to_string);

    let mut listing = ServiceListing {
        id: r.id,
        title: r.title.clone(),
        description: r.description.clone(),
        service_type: r.service_type(),
        price: r.hourly_rate,
        rating: r.rating,
        location: generic_location(r, &config.hidden_location_label),
        image: config.placeholder_image_url.clone(),
        availability: r.availability.clone(),
        subjects: r.subjects.clone(),
        provider_name: first_name,
        provider_avatar: None,
        provider_id: None,
        contact_email: None,
        contact_phone: None,
    };

    if visibility == Visibility::Anonymous {
        return listing;
    }

    if let Some(avatar) = &avatar {
        listing.image = avatar.clone();
    }
    listing.provider_avatar = avatar;

    if visibility == Visibility::Approved {
        listing.provider_name = Some(abbreviate_name(&r.first_name, &r.last_name));
        listing.location = precise_location(r, &config.hidden_location_label);
        listing.provider_id = Some(r.tutor_id);
        listing.contact_email = Some(r.email.clone());
        listing.contact_phone = r.phone.clone();
    }

    listing
}

/// Escape LIKE metacharacters and wrap in `%…%`.
pub(crate) fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

const RECORD_SELECT: &str = "
    SELECT s.id, s.tutor_id, s.title, s.description, s.service_type, s.hourly_rate,
           s.subjects, s.availability,
           p.first_name, p.last_name, p.bio, p.city, p.region, p.address, p.avatar_url,
           p.email, p.phone,
           COALESCE(r.avg_rating, 0)::DOUBLE PRECISION AS rating
    FROM tutor_services s
    JOIN profiles p ON p.id = s.tutor_id
    LEFT JOIN (
        SELECT reviewee_id, ROUND(AVG(rating)::NUMERIC, 1) AS avg_rating
        FROM reviews GROUP BY reviewee_id
    ) r ON r.reviewee_id = s.tutor_id
    WHERE s.is_active = TRUE
      AND p.role = 'student'
      AND p.approval_status = 'approved'";

pub struct SearchService;

impl SearchService {
    /// Resolve the visibility tier of a caller. Admins see everything.
    pub async fn visibility_for(
        pool: &PgPool,
        caller: Option<&AuthenticatedUser>,
    ) -> ApiResult<Visibility> {
        let Some(user) = caller else {
            return Ok(Visibility::Anonymous);
        };
        if user.role == Role::Admin {
            return Ok(Visibility::Approved);
        }

        let status: Option<String> =
            sqlx::query_scalar("SELECT approval_status FROM profiles WHERE id = $1")
                .bind(user.user_id)
                .fetch_optional(pool)
                .await?;

        let approved = status
            .and_then(|s| s.parse::<ApprovalStatus>().ok())
            .is_some_and(|s| s == ApprovalStatus::Approved);

        Ok(if approved {
            Visibility::Approved
        } else {
            Visibility::Authenticated
        })
    }

    async fn fetch_records(
        pool: &PgPool,
        filter: &ServiceFilter,
        limit: i64,
        offset: i64,
    ) -> ApiResult<Vec<ServiceRecord>> {
        let types: Option<Vec<String>> = if filter.types.is_empty() {
            None
        } else {
            Some(filter.types.iter().map(|t| t.to_string()).collect())
        };

        let records = sqlx::query_as::<_, ServiceRecord>(&format!(
            "{RECORD_SELECT}
               AND ($1::TEXT IS NULL
                    OR (p.first_name || ' ' || p.last_name) ILIKE $1
                    OR p.bio ILIKE $1 OR s.title ILIKE $1
                    OR p.city ILIKE $1 OR p.region ILIKE $1 OR p.address ILIKE $1)
               AND ($2::TEXT[] IS NULL OR s.service_type = ANY($2))
               AND ($3::TEXT IS NULL OR p.city ILIKE $3 OR p.region ILIKE $3 OR p.address ILIKE $3)
               AND ($4::DOUBLE PRECISION IS NULL OR s.hourly_rate >= $4)
               AND ($5::DOUBLE PRECISION IS NULL OR s.hourly_rate <= $5)
             ORDER BY rating DESC, s.hourly_rate ASC, s.id
             LIMIT $6 OFFSET $7"
        ))
        .bind(filter.query.as_deref().map(like_pattern))
        .bind(types)
        .bind(filter.location.as_deref().map(like_pattern))
        .bind(filter.price_range.map(|(min, _)| min))
        .bind(filter.price_range.map(|(_, max)| max))
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;
        Ok(records)
    }

    pub async fn search(
        pool: &PgPool,
        config: &Config,
        filter: &ServiceFilter,
        limit: Option<i64>,
        offset: Option<i64>,
        visibility: Visibility,
    ) -> ApiResult<Vec<ServiceListing>> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = offset.unwrap_or(0).max(0);

        let (records, scanned) = if filter.has_post_filters() {
            // Scan in SQL order until the requested page is covered or rows run out.
            let wanted = (offset + limit) as usize;
            let mut matched = Vec::new();
            let mut scanned = 0usize;
            loop {
                let batch = Self::fetch_records(pool, filter, SCAN_BATCH, scanned as i64).await?;
                let fetched = batch.len();
                scanned += fetched;
                matched.extend(batch.into_iter().filter(|r| filter.matches_post(r)));
                if matched.len() >= wanted || (fetched as i64) < SCAN_BATCH {
                    break;
                }
            }
            (page_post_filtered(matched, filter, limit, offset), scanned)
        } else {
            let records = Self::fetch_records(pool, filter, limit, offset).await?;
            let fetched = records.len();
            (records, fetched)
        };

        metrics::SEARCHES_COUNTER
            .with_label_values(&[visibility.as_str()])
            .inc();
        tracing::debug!(
            "Search scanned {} row(s), returning {} as {}",
            scanned,
            records.len(),
            visibility.as_str()
        );

        Ok(records
            .iter()
            .map(|r| to_listing(r, visibility, config))
            .collect())
    }

    pub async fn get_listing(
        pool: &PgPool,
        config: &Config,
        id: Uuid,
        visibility: Visibility,
    ) -> ApiResult<ServiceListing> {
        let record = sqlx::query_as::<_, ServiceRecord>(&format!("{RECORD_SELECT} AND s.id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| ApiError::not_found("Service"))?;

        Ok(to_listing(&record, visibility, config))
    }
}
