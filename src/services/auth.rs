use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    config::Config,
    error::{ApiError, ApiResult},
    models::{
        auth::{Claims, RefreshClaims},
        profile::{Account, AuthResponse, Profile, RefreshToken, RegisterRequest, Role},
    },
    services::{metrics, profiles::{split_full_name, ProfileService}},
};

const MIN_PASSWORD_LEN: usize = 8;
const REFRESH_HASH_COST: u32 = 8;

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_email(email: &str) -> ApiResult<()> {
    let valid = email.len() <= 255
        && email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid {
        return Err(ApiError::validation("Invalid email address"));
    }
    Ok(())
}

/// Resolve the display name stored on the account from either a full name or explicit parts.
fn resolve_names(req: &RegisterRequest) -> ApiResult<(String, String)> {
    let (first, last) = match (&req.first_name, &req.full_name) {
        (Some(first), _) => (
            first.trim().to_string(),
            req.last_name.as_deref().unwrap_or("").trim().to_string(),
        ),
        (None, Some(full)) => split_full_name(full),
        (None, None) => (String::new(), String::new()),
    };
    if first.is_empty() {
        return Err(ApiError::validation("A first name is required"));
    }
    Ok((first, last))
}

const CLAIM_REFRESH_TOKEN_SQL: &str =
    "UPDATE refresh_tokens SET revoked = TRUE WHERE id = $1 AND revoked = FALSE RETURNING id";

pub struct AuthService;

impl AuthService {
    pub async fn register(
        pool: &PgPool,
        config: &Config,
        req: &RegisterRequest,
    ) -> ApiResult<AuthResponse> {
        let email = normalize_email(&req.email);
        validate_email(&email)?;
        if req.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ApiError::validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        if req.role == Role::Admin {
            return Err(ApiError::forbidden("Admin accounts cannot be self-registered"));
        }
        let (first, last) = resolve_names(req)?;
        let full_name = format!("{first} {last}").trim().to_string();

        let password_hash =
            bcrypt::hash(&req.password, bcrypt::DEFAULT_COST).map_err(anyhow::Error::from)?;

        let account_id: Uuid = sqlx::query_scalar(
            "INSERT INTO accounts (email, password_hash, full_name, requested_role)
             VALUES ($1, $2, $3, $4)
             RETURNING id",
        )
        .bind(&email)
        .bind(&password_hash)
        .bind(&full_name)
        .bind(req.role.to_string())
        .fetch_one(pool)
        .await
        .map_err(|e| match ApiError::from(e) {
            ApiError::Conflict(_) => ApiError::conflict("An account with this email already exists"),
            other => other,
        })?;

        tracing::info!("Registered account {} as {}", account_id, req.role);

        let profile = ProfileService::get_or_create(pool, account_id).await?;
        Self::issue_tokens(pool, config, profile).await
    }

    pub async fn login(
        pool: &PgPool,
        config: &Config,
        email: &str,
        password: &str,
    ) -> ApiResult<AuthResponse> {
        let email = normalize_email(email);

        let account = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE email = $1")
            .bind(&email)
            .fetch_optional(pool)
            .await?;

        let Some(account) = account else {
            metrics::LOGINS_COUNTER.with_label_values(&["unknown_email"]).inc();
            return Err(ApiError::Auth("Invalid credentials".into()));
        };

        let valid = bcrypt::verify(password, &account.password_hash).unwrap_or(false);
        if !valid {
            metrics::LOGINS_COUNTER.with_label_values(&["bad_password"]).inc();
            return Err(ApiError::Auth("Invalid credentials".into()));
        }

        let profile = ProfileService::get_or_create(pool, account.id).await?;
        metrics::LOGINS_COUNTER.with_label_values(&["success"]).inc();
        Self::issue_tokens(pool, config, profile).await
    }

    /// Rotate a refresh token: the presented one is revoked and a new pair is issued.
    pub async fn refresh(
        pool: &PgPool,
        config: &Config,
        refresh_token_str: &str,
    ) -> ApiResult<AuthResponse> {
        let invalid = || ApiError::Auth("Invalid or expired refresh token".into());

        let key = DecodingKey::from_secret(config.jwt_refresh_secret.as_bytes());
        let data = decode::<RefreshClaims>(
            refresh_token_str,
            &key,
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|_| invalid())?;
        let rc = data.claims;
        let jti: Uuid = rc.jti.parse().map_err(|_| invalid())?;
        let account_id: Uuid = rc.sub.parse().map_err(|_| invalid())?;

        let stored: RefreshToken = sqlx::query_as(
            "SELECT * FROM refresh_tokens WHERE id = $1 AND account_id = $2 AND revoked = FALSE",
        )
        .bind(jti)
        .bind(account_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(invalid)?;

        if stored.expires_at < Utc::now() {
            return Err(invalid());
        }
        if !bcrypt::verify(refresh_token_str, &stored.token_hash).unwrap_or(false) {
            return Err(invalid());
        }

        // Only one concurrent rotation may claim the token.
        let claimed: Option<Uuid> = sqlx::query_scalar(CLAIM_REFRESH_TOKEN_SQL)
            .bind(jti)
            .fetch_optional(pool)
            .await?;
        if claimed.is_none() {
            tracing::warn!("Refresh token {} was already rotated", jti);
            return Err(invalid());
        }

        let profile = ProfileService::get_or_create(pool, account_id).await?;
        Self::issue_tokens(pool, config, profile).await
    }

    /// Revoke a refresh token. Unknown or malformed tokens are ignored.
    pub async fn logout(pool: &PgPool, config: &Config, refresh_token_str: &str) -> ApiResult<()> {
        let key = DecodingKey::from_secret(config.jwt_refresh_secret.as_bytes());
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;

        if let Ok(data) = decode::<RefreshClaims>(refresh_token_str, &key, &validation) {
            if let Ok(jti) = data.claims.jti.parse::<Uuid>() {
                sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE id = $1")
                    .bind(jti)
                    .execute(pool)
                    .await?;
            }
        }
        Ok(())
    }

    async fn issue_tokens(
        pool: &PgPool,
        config: &Config,
        profile: Profile,
    ) -> ApiResult<AuthResponse> {
        let access_token = Self::generate_access_token(
            profile.id,
            profile.role(),
            &config.jwt_secret,
            config.jwt_expiry_seconds,
        )?;
        let (refresh_token, refresh_id) = Self::generate_refresh_token(
            profile.id,
            &config.jwt_refresh_secret,
            config.jwt_refresh_expiry_days,
        )?;

        let hash = bcrypt::hash(&refresh_token, REFRESH_HASH_COST).map_err(anyhow::Error::from)?;
        let expires_at = Utc::now() + chrono::Duration::days(config.jwt_refresh_expiry_days as i64);
        sqlx::query(
            "INSERT INTO refresh_tokens (id, account_id, token_hash, expires_at)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(refresh_id)
        .bind(profile.id)
        .bind(hash)
        .bind(expires_at)
        .execute(pool)
        .await?;

        Ok(AuthResponse {
            access_token,
            refresh_token,
            profile,
        })
    }

    pub fn generate_access_token(
        user_id: Uuid,
        role: Role,
        secret: &str,
        ttl_seconds: u64,
    ) -> anyhow::Result<String> {
        let now = Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: user_id.to_string(),
            role,
            iat: now,
            exp: now + ttl_seconds as usize,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )?;
        Ok(token)
    }

    fn generate_refresh_token(
        user_id: Uuid,
        secret: &str,
        ttl_days: u64,
    ) -> anyhow::Result<(String, Uuid)> {
        let now = Utc::now().timestamp() as usize;
        let jti = Uuid::new_v4();
        let claims = RefreshClaims {
            sub: user_id.to_string(),
            jti: jti.to_string(),
            iat: now,
            exp: now + (ttl_days * 86400) as usize,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )?;
        Ok((token, jti))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::auth::decode_access_token;

    fn register_req(first: Option<&str>, last: Option<&str>, full: Option<&str>) -> RegisterRequest {
        RegisterRequest {
            email: "x@y.z".into(),
            password: "password".into(),
            full_name: full.map(Into::into),
            first_name: first.map(Into::into),
            last_name: last.map(Into::into),
            role: Role::Parent,
        }
    }

    #[test]
    fn test_access_token_round_trip() {
        let id = Uuid::new_v4();
        let token = AuthService::generate_access_token(id, Role::Admin, "secret", 900).unwrap();
        let user = decode_access_token(&token, "secret").unwrap();
        assert_eq!(user.user_id, id);
        assert_eq!(user.role, Role::Admin);
        assert!(decode_access_token(&token, "wrong").is_err());
    }

    #[test]
    fn test_refresh_token_carries_jti() {
        let id = Uuid::new_v4();
        let (token, jti) = AuthService::generate_refresh_token(id, "r", 30).unwrap();
        let data = decode::<RefreshClaims>(
            &token,
            &DecodingKey::from_secret(b"r"),
            &Validation::new(Algorithm::HS256),
        )
        .unwrap();
        assert_eq!(data.claims.jti, jti.to_string());
        assert_eq!(data.claims.sub, id.to_string());
    }

    #[test]
    fn test_email_validation() {
        assert_eq!(normalize_email("  Ana@Mail.COM "), "ana@mail.com");
        assert!(validate_email("ana@mail.com").is_ok());
        assert!(validate_email("ana.mail.com").is_err());
        assert!(validate_email("@mail.com").is_err());
        assert!(validate_email("ana@localhost").is_err());
    }

    #[test]
    fn test_resolve_names_prefers_explicit_parts() {
        let req = register_req(Some(" Ana "), Some("Silva"), Some("Ignored Name"));
        assert_eq!(resolve_names(&req).unwrap(), ("Ana".into(), "Silva".into()));

        let req = register_req(None, None, Some("Ana Maria  Silva"));
        assert_eq!(resolve_names(&req).unwrap(), ("Ana".into(), "Maria Silva".into()));

        let req = register_req(None, None, None);
        assert!(matches!(resolve_names(&req), Err(ApiError::Validation(_))));
    }

    #[test]
    fn test_refresh_claim_only_matches_unrevoked_rows() {
        let sql = CLAIM_REFRESH_TOKEN_SQL;
        assert!(sql.contains("WHERE id = $1 AND revoked = FALSE"));
        assert!(sql.ends_with("RETURNING id"));
    }
}
