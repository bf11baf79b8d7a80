use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::domain::{User, UserRole};

#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub roles: Vec<UserRole>,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        UserResponse {
            id: user.subject_id(),
            username: user.username.clone(),
            email: user.email.clone(),
            full_name: user.full_name(),
            roles: user.roles.clone(),
            active: user.active,
            created_at: user.created_at,
        }
    }
}

/// Login/registration/refresh payload. The session token also travels in
/// an HttpOnly cookie; it is echoed here so non-browser clients can use it.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub refresh_token: String,
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}
