// Module exports for the learning hub backend.

pub mod admin_handlers;
pub mod auth_handlers;
pub mod config;
pub mod errors;
pub mod logger;
pub mod mailer;
pub mod middleware;
pub mod models;
pub mod schema;
pub mod services;
pub mod uploads;

// Re-export common types
pub use crate::config::AppConfig;
pub use crate::config::DbPool;
pub use crate::errors::ApiError;
pub use crate::mailer::EmailService;
pub use crate::models::User;
