use diesel::pg::PgConnection;
use diesel::r2d2::{self, ConnectionManager};
use log::warn;
use std::env;

// Type aliases
pub type DbPool = r2d2::Pool<ConnectionManager<PgConnection>>;

// Database initialization SQL, executed once at startup. Idempotent so
// restarts against an existing database are safe.
pub const DB_INIT_SQL: &str = r#"
-- Create tables if they don't exist
CREATE TABLE IF NOT EXISTS users (
    id SERIAL PRIMARY KEY,
    username VARCHAR(100) UNIQUE NOT NULL,
    password VARCHAR(255) NOT NULL,
    role VARCHAR(50) NOT NULL DEFAULT 'student',
    course_id VARCHAR(50),
    email VARCHAR(255) UNIQUE,
    full_name VARCHAR(255),
    phone VARCHAR(50),
    profile_picture VARCHAR(255),
    reset_token VARCHAR(255),
    reset_token_expiry TIMESTAMP,
    created_at TIMESTAMP NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMP NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS courses (
    id VARCHAR(50) PRIMARY KEY,
    title VARCHAR(255) NOT NULL,
    description TEXT NOT NULL,
    theme_color VARCHAR(20) NOT NULL,
    image VARCHAR(255),
    status VARCHAR(50) NOT NULL
);

CREATE TABLE IF NOT EXISTS subjects (
    code VARCHAR(50) PRIMARY KEY,
    title VARCHAR(255) NOT NULL,
    course_id VARCHAR(50) NOT NULL,
    year_level INTEGER NOT NULL,
    semester INTEGER NOT NULL,
    status VARCHAR(50) NOT NULL
);

CREATE TABLE IF NOT EXISTS notifications (
    id SERIAL PRIMARY KEY,
    user_id INTEGER NOT NULL,
    title VARCHAR(255) NOT NULL,
    message TEXT NOT NULL,
    type VARCHAR(50) NOT NULL,
    related_id VARCHAR(50),
    is_read BOOLEAN NOT NULL DEFAULT FALSE,
    created_at TIMESTAMP NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS activity_logs (
    id SERIAL PRIMARY KEY,
    target VARCHAR(255) NOT NULL,
    action VARCHAR(255) NOT NULL,
    role VARCHAR(50) NOT NULL,
    timestamp TIMESTAMP NOT NULL DEFAULT NOW()
);

-- Seed the built-in admin account the profile endpoints resolve to
INSERT INTO users (username, password, role)
VALUES ('admin', 'admin123', 'admin')
ON CONFLICT (username) DO NOTHING;
"#;

// Config
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub upload_dir: String,
    pub reset_link_base: String,
    pub reset_token_expiry_hours: i64,
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let upload_dir = env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads/".to_string());

        let reset_link_base = match env::var("RESET_LINK_BASE") {
            Ok(val) => val,
            Err(_) => {
                warn!("RESET_LINK_BASE not set; reset links will point at localhost");
                "http://localhost:8080".to_string()
            }
        };

        let reset_token_expiry_hours = env::var("RESET_TOKEN_EXPIRY_HOURS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(1);

        let smtp_host = env::var("SMTP_HOST").ok();
        let smtp_port = env::var("SMTP_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(587);
        let smtp_username = env::var("SMTP_USERNAME").ok();
        let smtp_password = env::var("SMTP_PASSWORD").ok();
        let smtp_from = env::var("SMTP_FROM")
            .unwrap_or_else(|_| "UEP Learning Hub <no-reply@uep.edu.ph>".to_string());

        Self {
            upload_dir,
            reset_link_base,
            reset_token_expiry_hours,
            smtp_host,
            smtp_port,
            smtp_username,
            smtp_password,
            smtp_from,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.upload_dir.trim().is_empty() {
            return Err("UPLOAD_DIR must not be empty".to_string());
        }

        if self.reset_token_expiry_hours <= 0 {
            return Err("RESET_TOKEN_EXPIRY_HOURS must be positive".to_string());
        }

        if self.smtp_host.is_none() {
            warn!("SMTP_HOST not set; password reset emails will be logged, not sent");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig {
            upload_dir: "uploads/".to_string(),
            reset_link_base: "http://localhost:8080".to_string(),
            reset_token_expiry_hours: 1,
            smtp_host: None,
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            smtp_from: "UEP Learning Hub <no-reply@uep.edu.ph>".to_string(),
        }
    }

    #[test]
    fn default_shape_validates() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn empty_upload_dir_is_rejected() {
        let cfg = AppConfig {
            upload_dir: "  ".to_string(),
            ..base_config()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn non_positive_expiry_is_rejected() {
        let cfg = AppConfig {
            reset_token_expiry_hours: 0,
            ..base_config()
        };
        assert!(cfg.validate().is_err());
    }
}
