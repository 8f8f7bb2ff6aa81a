mod auth;
mod health;

pub use auth::{change_password, create_guest, login, me};
pub use health::{health_check, readiness_check};
