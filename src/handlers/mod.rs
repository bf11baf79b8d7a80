pub mod auth_handler;
pub mod health_handler;
pub mod user_handler;

pub use auth_handler::{login, logout, refresh, register};
pub use health_handler::health_check;
pub use user_handler::me;
