use axum::{extract::FromRequestParts, http::request::Parts};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use crate::error::ApiError;
use crate::models::auth::{AuthenticatedUser, Claims, OptionalUser};

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?
            .ok_or_else(|| ApiError::Auth("Missing Authorization header".into()))?;

        let secret = jwt_secret(parts)?;

        decode_access_token(token, &secret.0)
            .map_err(|_| ApiError::Auth("Invalid or expired token".into()))
    }
}

/// Never rejects a request for its credentials: a missing, malformed or expired
/// token yields an anonymous caller so public pages keep working.
impl<S> FromRequestParts<S> for OptionalUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = match bearer_token(parts) {
            Ok(Some(token)) => token,
            _ => return Ok(OptionalUser(None)),
        };

        let secret = jwt_secret(parts)?;

        match decode_access_token(token, &secret.0) {
            Ok(user) => Ok(OptionalUser(Some(user))),
            Err(e) => {
                tracing::debug!("Ignoring unusable bearer token: {}", e);
                Ok(OptionalUser(None))
            }
        }
    }
}

/// Extension type to carry the JWT secret through request extensions.
#[derive(Clone)]
pub struct JwtSecret(pub String);

fn bearer_token(parts: &Parts) -> Result<Option<&str>, ApiError> {
    let Some(header) = parts.headers.get("Authorization") else {
        return Ok(None);
    };
    let value = header
        .to_str()
        .map_err(|_| ApiError::Auth("Invalid Authorization header format".into()))?;
    value
        .strip_prefix("Bearer ")
        .map(Some)
        .ok_or_else(|| ApiError::Auth("Invalid Authorization header format".into()))
}

fn jwt_secret(parts: &Parts) -> Result<JwtSecret, ApiError> {
    parts
        .extensions
        .get::<JwtSecret>()
        .cloned()
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("JWT secret not configured")))
}

pub fn decode_access_token(token: &str, secret: &str) -> Result<AuthenticatedUser, anyhow::Error> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    let data = decode::<Claims>(token, &key, &validation)?;
    let claims = data.claims;

    Ok(AuthenticatedUser {
        user_id: claims.sub.parse()?,
        role: claims.role,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::profile::Role;
    use crate::services::auth::AuthService;
    use axum::http::Request;
    use uuid::Uuid;

    const SECRET: &str = "test-secret";

    fn parts_with(auth: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/get-services");
        if let Some(value) = auth {
            builder = builder.header("Authorization", value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        parts.extensions.insert(JwtSecret(SECRET.into()));
        parts
    }

    #[tokio::test]
    async fn test_authenticated_user_from_valid_token() {
        let id = Uuid::new_v4();
        let token = AuthService::generate_access_token(id, Role::Student, SECRET, 60).unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {token}")));

        let user = AuthenticatedUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(user.user_id, id);
        assert_eq!(user.role, Role::Student);
    }

    #[tokio::test]
    async fn test_authenticated_user_rejects_missing_and_bad_tokens() {
        let mut parts = parts_with(None);
        let err = AuthenticatedUser::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert!(matches!(err, ApiError::Auth(_)));

        let mut parts = parts_with(Some("Token abc"));
        let err = AuthenticatedUser::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert!(matches!(err, ApiError::Auth(_)));

        let token = AuthService::generate_access_token(Uuid::new_v4(), Role::Parent, "other", 60)
            .unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {token}")));
        let err = AuthenticatedUser::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert!(matches!(err, ApiError::Auth(_)));
    }

    #[tokio::test]
    async fn test_optional_user_degrades_to_anonymous() {
        let mut parts = parts_with(None);
        let OptionalUser(user) = OptionalUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(user.is_none());

        let mut parts = parts_with(Some("Bearer not-a-jwt"));
        let OptionalUser(user) = OptionalUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(user.is_none());

        let id = Uuid::new_v4();
        let token = AuthService::generate_access_token(id, Role::Parent, SECRET, 60).unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {token}")));
        let OptionalUser(user) = OptionalUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(user.map(|u| u.user_id), Some(id));
    }
}
