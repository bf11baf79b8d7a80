use std::sync::Arc;

use log::{info, warn};
use validator::Validate;

use crate::{
    auth::JwtService,
    errors::{AppError, AppResult},
    models::{
        domain::{
            session_token::{generate_token, hash_token},
            SessionToken, User,
        },
        dto::{
            request::{LoginRequest, RegisterRequest},
            response::{AuthResponse, UserResponse},
        },
    },
    repositories::{SessionTokenRepository, UserRepository},
};

/// Orchestrates the credential lifecycle: login and registration issue an
/// access token plus a session token, refresh rotates the session token,
/// logout revokes it. The session store enforces the rotation invariant;
/// this service only ever calls its atomic operations.
pub struct AuthService {
    user_repository: Arc<dyn UserRepository>,
    session_repository: Arc<dyn SessionTokenRepository>,
    jwt_service: JwtService,
    session_ttl_hours: i64,
}

impl AuthService {
    pub fn new(
        user_repository: Arc<dyn UserRepository>,
        session_repository: Arc<dyn SessionTokenRepository>,
        jwt_service: JwtService,
        session_ttl_hours: i64,
    ) -> Self {
        Self {
            user_repository,
            session_repository,
            jwt_service,
            session_ttl_hours,
        }
    }

    pub async fn login(&self, request: LoginRequest) -> AppResult<AuthResponse> {
        request.validate()?;

        let user = self
            .user_repository
            .find_by_email(&request.email)
            .await?
            .ok_or_else(invalid_credentials)?;

        let password_ok = bcrypt::verify(&request.password, &user.password_hash)
            .map_err(|e| AppError::InternalError(format!("Password verification failed: {}", e)))?;

        if !password_ok || !user.active {
            warn!("Failed login attempt for user: {}", request.email);
            return Err(invalid_credentials());
        }

        let response = self.issue_session(&user).await?;
        info!("User logged in successfully: {}", user.email);

        Ok(response)
    }

    pub async fn register(&self, request: RegisterRequest) -> AppResult<AuthResponse> {
        request.validate()?;

        if request.password != request.confirm_password {
            return Err(AppError::BadRequest(
                "Password confirmation does not match".to_string(),
            ));
        }

        if self
            .user_repository
            .find_by_email(&request.email)
            .await?
            .is_some()
        {
            return Err(AppError::AlreadyExists(format!(
                "Email already registered: {}",
                request.email
            )));
        }

        let password_hash = bcrypt::hash(&request.password, bcrypt::DEFAULT_COST)
            .map_err(|e| AppError::InternalError(format!("Password hashing failed: {}", e)))?;

        let user = User::new(
            request.first_name.trim(),
            request.last_name.trim(),
            &request.username,
            &request.email,
            &password_hash,
        );
        let user = self.user_repository.create(user).await?;

        let response = self.issue_session(&user).await?;
        info!("User registered successfully: {}", user.email);

        Ok(response)
    }

    /// Full rotation: the presented token is consumed atomically before
    /// anything is issued, so of two concurrent refreshes with the same
    /// token exactly one can succeed.
    pub async fn refresh(&self, raw_token: &str) -> AppResult<AuthResponse> {
        if raw_token.is_empty() {
            return Err(invalid_session());
        }

        let token_hash = hash_token(raw_token);
        let record = self
            .session_repository
            .consume_by_token_hash(&token_hash)
            .await?
            .ok_or_else(invalid_session)?;

        if record.is_expired() {
            warn!("Rejected expired session token for user: {}", record.email);
            return Err(invalid_session());
        }

        // Re-read the account so rotated credentials carry current roles.
        let user = self
            .user_repository
            .find_by_email(&record.email)
            .await?
            .ok_or_else(invalid_session)?;

        let response = self.issue_session(&user).await?;
        info!("Session refreshed for user: {}", user.email);

        Ok(response)
    }

    pub async fn logout(&self, email: &str) -> AppResult<()> {
        if let Some(record) = self.session_repository.find_by_email(email).await? {
            self.session_repository
                .delete_by_token_hash(&record.token_hash)
                .await?;
            info!("Session deleted for user: {}", email);
        }

        Ok(())
    }

    async fn issue_session(&self, user: &User) -> AppResult<AuthResponse> {
        let access_token = self.jwt_service.create_token(user)?;

        let raw_session_token = generate_token();
        let record = SessionToken::new(
            hash_token(&raw_session_token),
            user.subject_id(),
            user.email.clone(),
            user.username.clone(),
            user.roles.clone(),
            self.session_ttl_hours,
        );
        self.session_repository.save(record).await?;

        Ok(AuthResponse {
            token: access_token,
            refresh_token: raw_session_token,
            user: UserResponse::from(user),
        })
    }
}

fn invalid_credentials() -> AppError {
    AppError::Unauthorized("Invalid email or password".to_string())
}

fn invalid_session() -> AppError {
    AppError::Unauthorized("Session is invalid or expired".to_string())
}
