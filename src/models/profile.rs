use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Parent,
    Student,
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::Parent => "parent",
            Role::Student => "student",
            Role::Admin => "admin",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "parent" => Ok(Role::Parent),
            "student" => Ok(Role::Student),
            "admin" => Ok(Role::Admin),
            _ => Err(anyhow::anyhow!("Unknown role: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ApprovalStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ApprovalStatus::Pending),
            "approved" => Ok(ApprovalStatus::Approved),
            "rejected" => Ok(ApprovalStatus::Rejected),
            _ => Err(anyhow::anyhow!("Unknown approval status: {s}")),
        }
    }
}

/// Login identity. A profile row shares its id.
#[derive(Debug, Clone, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub requested_role: String,
    pub created_at: DateTime<Utc>,
}

/// DB row struct. `role` and `approval_status` are plain TEXT columns.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub approval_status: String,
    pub approval_note: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub address: Option<String>,
    pub avatar_url: Option<String>,
    pub school_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn role(&self) -> Role {
        self.role.parse().unwrap_or(Role::Parent)
    }

    pub fn approval(&self) -> ApprovalStatus {
        self.approval_status.parse().unwrap_or(ApprovalStatus::Pending)
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct RefreshToken {
    pub id: Uuid,
    pub account_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

// Request/Response DTOs
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub profile: Profile,
}

#[derive(Debug, Deserialize)]
pub struct ApprovalRequest {
    pub status: ApprovalStatus,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdminProfileQuery {
    pub status: Option<ApprovalStatus>,
    pub role: Option<Role>,
}

/// Column changes accepted by `PUT /profiles/me` once the body has been sanitised.
///
/// For nullable text columns the outer `Option` means "touch this column" and the
/// inner one carries the new value, `None` clearing it.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ProfileChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<Option<String>>,
    pub bio: Option<Option<String>>,
    pub city: Option<Option<String>>,
    pub region: Option<Option<String>>,
    pub address: Option<Option<String>>,
    pub school_id: Option<Option<Uuid>>,
}

impl ProfileChanges {
    pub fn is_empty(&self) -> bool {
        *self == ProfileChanges::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip_through_text() {
        for role in [Role::Parent, Role::Student, Role::Admin] {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
        assert!("tutor".parse::<Role>().is_err());
    }

    #[test]
    fn test_approval_defaults_to_pending_on_unknown_text() {
        let now = Utc::now();
        let profile = Profile {
            id: Uuid::new_v4(),
            email: "a@b.c".into(),
            first_name: "Ana".into(),
            last_name: "".into(),
            role: "student".into(),
            approval_status: "weird".into(),
            approval_note: None,
            phone: None,
            bio: None,
            city: None,
            region: None,
            address: None,
            avatar_url: None,
            school_id: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(profile.approval(), ApprovalStatus::Pending);
        assert_eq!(profile.role(), Role::Student);
    }
}
