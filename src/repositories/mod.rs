pub mod rate_limit_repository;
pub mod session_token_repository;
pub mod user_repository;

pub use rate_limit_repository::{MongoRateLimitRepository, RateLimitRepository};
pub use session_token_repository::{MongoSessionTokenRepository, SessionTokenRepository};
pub use user_repository::{MongoUserRepository, UserRepository};
