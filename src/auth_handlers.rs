use actix_web::{web, HttpResponse};
use chrono::{Duration, Utc};
use log::{debug, info};
use serde_json::json;
use uuid::Uuid;

use crate::config::{AppConfig, DbPool};
use crate::errors::{method_not_allowed, ApiError};
use crate::mailer::EmailService;
use crate::models::{ForgotPasswordRequest, LoginRequest, ResetPasswordRequest};
use crate::services::{ActivityLogService, UserService};

pub(crate) fn role_matches(stored: &str, required: &str) -> bool {
    stored.eq_ignore_ascii_case(required)
}

/// Shared login path for all portals. `required_role` pins the portal a
/// caller is allowed into; `None` leaves the role check to the frontend.
async fn process_login(
    pool: &DbPool,
    login: &LoginRequest,
    required_role: Option<&str>,
) -> Result<HttpResponse, ApiError> {
    let (username, password) = match (login.resolved_username(), login.password.as_deref()) {
        (Some(u), Some(p)) => (u, p),
        _ => {
            return Ok(HttpResponse::BadRequest().json(json!({
                "success": false,
                "message": "Credentials required"
            })));
        }
    };

    let user = match UserService::find_by_username(username, pool).await? {
        Some(user) => user,
        None => {
            debug!("Login failed: no user named {}", username);
            return Err(ApiError::Auth("Invalid credentials".to_string()));
        }
    };

    // Stored passwords are plaintext; comparison is byte-for-byte.
    if user.password != password {
        debug!("Login failed: wrong password for {}", username);
        return Err(ApiError::Auth("Invalid credentials".to_string()));
    }

    if let Some(required) = required_role {
        if !role_matches(&user.role, required) {
            return Err(ApiError::Forbidden(format!(
                "Access Denied: You do not have {} permissions for this portal.",
                required
            )));
        }
    }

    ActivityLogService::record(
        &user.username,
        &format!("Logged in to {} portal", user.role),
        &user.role,
        pool,
    )
    .await?;

    info!("User {} logged in to {} portal", user.username, user.role);

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "role": user.role,
        "username": user.username,
        "courseId": user.course_id,
    })))
}

pub async fn login(
    pool: web::Data<DbPool>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    process_login(&pool, &body, None).await
}

pub async fn student_login(
    pool: web::Data<DbPool>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    process_login(&pool, &body, Some("student")).await
}

pub async fn professor_login(
    pool: web::Data<DbPool>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    process_login(&pool, &body, Some("professor")).await
}

pub async fn admin_login(
    pool: web::Data<DbPool>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    process_login(&pool, &body, Some("admin")).await
}

pub async fn forgot_password(
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    mailer: web::Data<EmailService>,
    body: web::Json<ForgotPasswordRequest>,
) -> Result<HttpResponse, ApiError> {
    let user = UserService::find_by_email(&body.email, &pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("No account found for that email".to_string()))?;

    let token = Uuid::new_v4().to_string();
    let expiry = (Utc::now() + Duration::hours(config.reset_token_expiry_hours)).naive_utc();
    UserService::set_reset_token(user.id, &token, expiry, &pool).await?;

    ActivityLogService::record(&user.username, "Password reset requested", &user.role, &pool)
        .await?;

    // SMTP is blocking and best-effort; a failed send never fails the request.
    let mailer = mailer.get_ref().clone();
    let to_email = body.email.clone();
    let username = user.username.clone();
    let role = user.role.clone();
    web::block(move || mailer.send_password_reset_email(&to_email, &token, &username, &role))
        .await
        .ok();

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Password reset email sent"
    })))
}

pub async fn reset_password(
    pool: web::Data<DbPool>,
    body: web::Json<ResetPasswordRequest>,
) -> Result<HttpResponse, ApiError> {
    if body.new_password.trim().is_empty() {
        return Err(ApiError::Validation("Password is required".to_string()));
    }

    let user = UserService::find_by_reset_token(&body.token, &pool)
        .await?
        .ok_or_else(|| ApiError::Validation("Invalid or expired reset token".to_string()))?;

    let expired = match user.reset_token_expiry {
        Some(expiry) => expiry < Utc::now().naive_utc(),
        None => true,
    };
    if expired {
        return Err(ApiError::Validation("Invalid or expired reset token".to_string()));
    }

    UserService::complete_password_reset(user.id, &body.new_password, &pool).await?;

    ActivityLogService::record(&user.username, "Password reset completed", &user.role, &pool)
        .await?;

    info!("Password reset completed for {}", user.username);

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Password updated successfully"
    })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/login")
            .route(web::post().to(login))
            .default_service(method_not_allowed("POST")),
    )
    .service(
        web::resource("/student/login")
            .route(web::post().to(student_login))
            .default_service(method_not_allowed("POST")),
    )
    .service(
        web::resource("/prof/login")
            .route(web::post().to(professor_login))
            .default_service(method_not_allowed("POST")),
    )
    .service(
        web::resource("/admin/login")
            .route(web::post().to(admin_login))
            .default_service(method_not_allowed("POST")),
    )
    .service(
        web::resource("/forgot-password")
            .route(web::post().to(forgot_password))
            .default_service(method_not_allowed("POST")),
    )
    .service(
        web::resource("/reset-password")
            .route(web::post().to(reset_password))
            .default_service(method_not_allowed("POST")),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_check_is_case_insensitive() {
        assert!(role_matches("Student", "student"));
        assert!(role_matches("PROFESSOR", "professor"));
        assert!(!role_matches("student", "admin"));
    }
}
