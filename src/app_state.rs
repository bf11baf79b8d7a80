use std::sync::Arc;

use crate::{
    auth::JwtService,
    config::Config,
    db::Database,
    errors::AppResult,
    repositories::{
        MongoRateLimitRepository, MongoSessionTokenRepository, MongoUserRepository,
        RateLimitRepository, SessionTokenRepository, UserRepository,
    },
    services::{AuthService, UserService},
};

#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthService>,
    pub user_service: Arc<UserService>,
    pub jwt_service: JwtService,
    pub rate_limit_store: Arc<dyn RateLimitRepository>,
    pub config: Arc<Config>,
}

impl AppState {
    pub async fn new(config: Config, db: &Database) -> AppResult<Self> {
        let user_repository = Arc::new(MongoUserRepository::new(db));
        user_repository.ensure_indexes().await?;

        let session_repository = Arc::new(MongoSessionTokenRepository::new(db));
        session_repository.ensure_indexes().await?;

        let rate_limit_repository = Arc::new(MongoRateLimitRepository::new(db));
        rate_limit_repository.ensure_indexes().await?;

        let jwt_service = JwtService::new(&config.jwt_secret, config.jwt_expiration_hours);

        let auth_service = Arc::new(AuthService::new(
            user_repository.clone() as Arc<dyn UserRepository>,
            session_repository as Arc<dyn SessionTokenRepository>,
            jwt_service.clone(),
            config.session_ttl_hours,
        ));
        let user_service = Arc::new(UserService::new(user_repository));

        Ok(Self {
            auth_service,
            user_service,
            jwt_service,
            rate_limit_store: rate_limit_repository,
            config: Arc::new(config),
        })
    }
}
