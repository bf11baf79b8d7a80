use std::sync::Arc;

use crate::{
    errors::{AppError, AppResult},
    models::dto::response::UserResponse,
    repositories::UserRepository,
};

pub struct UserService {
    repository: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(repository: Arc<dyn UserRepository>) -> Self {
        Self { repository }
    }

    pub async fn get_profile(&self, email: &str) -> AppResult<UserResponse> {
        let user = self
            .repository
            .find_by_email(email)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with email '{}' not found", email)))?;

        Ok(UserResponse::from(&user))
    }
}
