use serde_json::{Map, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    models::profile::{Account, Profile, ProfileChanges},
};

/// Keys a caller may never write through `PUT /profiles/me`. They are dropped, not rejected.
const PROTECTED_FIELDS: &[&str] = &[
    "id",
    "email",
    "role",
    "approval_status",
    "approval_note",
    "avatar_url",
    "created_at",
    "updated_at",
];

/// Split a free-form full name: first token is the first name, the rest the last name.
pub fn split_full_name(full: &str) -> (String, String) {
    let mut tokens = full.split_whitespace();
    let first = tokens.next().unwrap_or("").to_string();
    let last = tokens.collect::<Vec<_>>().join(" ");
    (first, last)
}

fn text_field(key: &str, value: &Value, max_len: usize) -> ApiResult<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => {
            let s = s.trim();
            if s.chars().count() > max_len {
                return Err(ApiError::validation(format!(
                    "{key} must be at most {max_len} characters"
                )));
            }
            Ok(if s.is_empty() { None } else { Some(s.to_string()) })
        }
        _ => Err(ApiError::validation(format!("{key} must be a string"))),
    }
}

/// Turn a raw JSON body into the column changes it is allowed to make.
pub fn sanitize_profile_update(body: &Map<String, Value>) -> ApiResult<ProfileChanges> {
    let mut changes = ProfileChanges::default();

    // full_name first so explicit first/last names win
    if let Some(full) = body.get("full_name") {
        if let Some(full) = text_field("full_name", full, 256)? {
            let (first, last) = split_full_name(&full);
            changes.first_name = Some(first);
            changes.last_name = Some(last);
        }
    }

    for (key, value) in body {
        match key.as_str() {
            "full_name" => {}
            "first_name" => {
                let first = text_field(key, value, 128)?
                    .ok_or_else(|| ApiError::validation("first_name cannot be blank"))?;
                changes.first_name = Some(first);
            }
            "last_name" => {
                changes.last_name = Some(text_field(key, value, 128)?.unwrap_or_default());
            }
            "phone" => changes.phone = Some(text_field(key, value, 32)?),
            "bio" => changes.bio = Some(text_field(key, value, 4000)?),
            "city" => changes.city = Some(text_field(key, value, 128)?),
            "region" => changes.region = Some(text_field(key, value, 128)?),
            "address" => changes.address = Some(text_field(key, value, 512)?),
            "school_id" => {
                let id = match text_field(key, value, 64)? {
                    None => None,
                    Some(s) => Some(
                        s.parse::<Uuid>()
                            .map_err(|_| ApiError::validation("school_id must be a UUID"))?,
                    ),
                };
                changes.school_id = Some(id);
            }
            k if PROTECTED_FIELDS.contains(&k) => {
                tracing::warn!("Dropping protected profile field from update: {}", k);
            }
            other => {
                return Err(ApiError::validation(format!("Unknown profile field: {other}")));
            }
        }
    }

    if changes.first_name.as_deref() == Some("") {
        return Err(ApiError::validation("first_name cannot be blank"));
    }

    Ok(changes)
}

pub struct ProfileService;

impl ProfileService {
    pub async fn get(pool: &PgPool, id: Uuid) -> ApiResult<Profile> {
        sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| ApiError::not_found("Profile"))
    }

    /// Load the profile of an account, creating it from the account data when missing.
    pub async fn get_or_create(pool: &PgPool, account_id: Uuid) -> ApiResult<Profile> {
        if let Some(profile) = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = $1")
            .bind(account_id)
            .fetch_optional(pool)
            .await?
        {
            return Ok(profile);
        }

        let account = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = $1")
            .bind(account_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| ApiError::Auth("Account no longer exists".into()))?;

        let (mut first, last) = split_full_name(account.full_name.as_deref().unwrap_or(""));
        if first.is_empty() {
            first = account
                .email
                .split('@')
                .next()
                .unwrap_or("")
                .to_string();
        }

        tracing::info!("Creating missing profile for account {}", account.id);

        // Concurrent first requests race here; the loser re-reads the winner's row.
        sqlx::query(
            "INSERT INTO profiles (id, email, first_name, last_name, role, approval_status)
             VALUES ($1, $2, $3, $4, $5, 'pending')
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(account.id)
        .bind(&account.email)
        .bind(&first)
        .bind(&last)
        .bind(&account.requested_role)
        .execute(pool)
        .await?;

        Self::get(pool, account.id).await
    }

    pub async fn update(pool: &PgPool, id: Uuid, changes: &ProfileChanges) -> ApiResult<Profile> {
        if changes.is_empty() {
            return Self::get(pool, id).await;
        }

        let profile = sqlx::query_as::<_, Profile>(
            "UPDATE profiles
             SET first_name = COALESCE($1, first_name),
                 last_name  = COALESCE($2, last_name),
                 phone      = CASE WHEN $3 THEN $4 ELSE phone END,
                 bio        = CASE WHEN $5 THEN $6 ELSE bio END,
                 city       = CASE WHEN $7 THEN $8 ELSE city END,
                 region     = CASE WHEN $9 THEN $10 ELSE region END,
                 address    = CASE WHEN $11 THEN $12 ELSE address END,
                 school_id  = CASE WHEN $13 THEN $14 ELSE school_id END,
                 updated_at = NOW()
             WHERE id = $15
             RETURNING *",
        )
        .bind(&changes.first_name)
        .bind(&changes.last_name)
        .bind(changes.phone.is_some())
        .bind(changes.phone.clone().flatten())
        .bind(changes.bio.is_some())
        .bind(changes.bio.clone().flatten())
        .bind(changes.city.is_some())
        .bind(changes.city.clone().flatten())
        .bind(changes.region.is_some())
        .bind(changes.region.clone().flatten())
        .bind(changes.address.is_some())
        .bind(changes.address.clone().flatten())
        .bind(changes.school_id.is_some())
        .bind(changes.school_id.flatten())
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Profile"))?;

        Ok(profile)
    }

    pub async fn set_avatar_url(pool: &PgPool, id: Uuid, avatar_url: &str) -> ApiResult<Profile> {
        sqlx::query_as::<_, Profile>(
            "UPDATE profiles SET avatar_url = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
        )
        .bind(avatar_url)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Profile"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_split_full_name() {
        assert_eq!(split_full_name("Ana"), ("Ana".into(), "".into()));
        assert_eq!(
            split_full_name("  Jean   Paul  Dupont "),
            ("Jean".into(), "Paul Dupont".into())
        );
        assert_eq!(split_full_name("   "), ("".into(), "".into()));
    }

    #[test]
    fn test_full_name_is_split_and_explicit_parts_win() {
        let changes = sanitize_profile_update(&body(json!({
            "full_name": "Ana Maria Silva",
            "last_name": "Costa"
        })))
        .unwrap();
        assert_eq!(changes.first_name.as_deref(), Some("Ana"));
        assert_eq!(changes.last_name.as_deref(), Some("Costa"));
    }

    #[test]
    fn test_protected_fields_are_dropped() {
        let changes = sanitize_profile_update(&body(json!({
            "role": "admin",
            "approval_status": "approved",
            "email": "new@mail.com",
            "city": "Lyon"
        })))
        .unwrap();
        assert_eq!(
            changes,
            ProfileChanges {
                city: Some(Some("Lyon".into())),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let err = sanitize_profile_update(&body(json!({ "favourite_colour": "blue" }))).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn test_empty_strings_clear_optional_fields() {
        let changes = sanitize_profile_update(&body(json!({
            "phone": "  ",
            "bio": null,
            "school_id": ""
        })))
        .unwrap();
        assert_eq!(changes.phone, Some(None));
        assert_eq!(changes.bio, Some(None));
        assert_eq!(changes.school_id, Some(None));
        assert_eq!(changes.city, None);
    }

    #[test]
    fn test_invalid_values() {
        assert!(sanitize_profile_update(&body(json!({ "first_name": " " }))).is_err());
        assert!(sanitize_profile_update(&body(json!({ "full_name": "   " }))).is_ok());
        assert!(sanitize_profile_update(&body(json!({ "phone": 123 }))).is_err());
        assert!(sanitize_profile_update(&body(json!({ "school_id": "nope" }))).is_err());
        let long = "x".repeat(33);
        assert!(sanitize_profile_update(&body(json!({ "phone": long }))).is_err());
    }

    #[test]
    fn test_no_changes_is_empty() {
        let changes = sanitize_profile_update(&body(json!({ "id": "abc" }))).unwrap();
        assert!(changes.is_empty());
    }
}
