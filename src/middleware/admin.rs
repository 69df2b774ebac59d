use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::ApiError;
use crate::models::{
    auth::{AdminUser, AuthenticatedUser},
    profile::Role,
};

/// Extractor for the approval workflow: a valid bearer token carrying the `admin` role.
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;

        if user.role != Role::Admin {
            return Err(ApiError::forbidden("Admin access required"));
        }

        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::auth::JwtSecret;
    use crate::services::auth::AuthService;
    use axum::http::Request;
    use uuid::Uuid;

    async fn extract(role: Role) -> Result<AdminUser, ApiError> {
        let token = AuthService::generate_access_token(Uuid::new_v4(), role, "s", 60).unwrap();
        let (mut parts, _) = Request::builder()
            .header("Authorization", format!("Bearer {token}"))
            .body(())
            .unwrap()
            .into_parts();
        parts.extensions.insert(JwtSecret("s".into()));
        AdminUser::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_only_admin_role_passes() {
        assert!(extract(Role::Admin).await.is_ok());
        assert!(matches!(extract(Role::Parent).await, Err(ApiError::Forbidden(_))));
        assert!(matches!(extract(Role::Student).await, Err(ApiError::Forbidden(_))));
    }
}
