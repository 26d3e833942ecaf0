use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use log::{debug, info};
use serde_json::json;

use crate::config::{AppConfig, DbPool};
use crate::errors::{method_not_allowed, ApiError};
use crate::models::*;
use crate::services::{
    ActivityLogService, CourseService, NotificationService, SubjectService, UserService,
};
use crate::uploads::{collect_form, store_upload};

// There is no session layer; every profile/credential route operates on the
// built-in admin account seeded at startup.
const ADMIN_USERNAME: &str = "admin";

async fn current_admin(pool: &DbPool) -> Result<User, ApiError> {
    UserService::find_by_username(ADMIN_USERNAME, pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("Admin account not found".to_string()))
}

fn system_notification(uid: i32, title: &str, message: &str) -> NewNotification {
    NewNotification {
        user_id: uid,
        title: title.to_string(),
        message: message.to_string(),
        kind: "system".to_string(),
        related_id: None,
    }
}

// ==========================================
// Profile & credentials
// ==========================================

pub async fn get_profile(pool: web::Data<DbPool>) -> Result<HttpResponse, ApiError> {
    let admin = current_admin(&pool).await?;
    Ok(HttpResponse::Ok().json(admin))
}

pub async fn update_profile(
    pool: web::Data<DbPool>,
    body: web::Json<UpdateProfileRequest>,
) -> Result<HttpResponse, ApiError> {
    let mut user = current_admin(&pool).await?;

    if let Some(value) = &body.email {
        user.email = Some(value.clone());
    }
    if let Some(value) = &body.full_name {
        user.full_name = Some(value.clone());
    }
    if let Some(value) = &body.phone {
        user.phone = Some(value.clone());
    }

    let user = UserService::save_details(user, &pool).await?;
    ActivityLogService::record(&user.username, "Profile updated", &user.role, &pool).await?;

    Ok(HttpResponse::Ok().json(user))
}

pub async fn change_password(
    pool: web::Data<DbPool>,
    body: web::Json<PasswordChangeRequest>,
) -> Result<HttpResponse, ApiError> {
    let user = current_admin(&pool).await?;

    if user.password != body.current_password {
        return Err(ApiError::Validation(
            "Current password is incorrect".to_string(),
        ));
    }

    UserService::set_password(user.id, &body.new_password, &pool).await?;
    ActivityLogService::record(&user.username, "Password changed", &user.role, &pool).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Password updated successfully"
    })))
}

pub async fn upload_profile_picture(
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let user = current_admin(&pool).await?;

    let form = collect_form(payload).await?;
    let file = form
        .file
        .ok_or_else(|| ApiError::Validation("file is required".to_string()))?;
    let file_name = store_upload(&config.upload_dir, file).await?;

    UserService::set_profile_picture(user.id, &file_name, &pool).await?;
    ActivityLogService::record(&user.username, "Profile picture updated", &user.role, &pool)
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": format!("Profile picture uploaded: {}", file_name)
    })))
}

// ==========================================
// User management
// ==========================================

pub async fn list_users(
    pool: web::Data<DbPool>,
    query: web::Query<UserListQuery>,
) -> Result<HttpResponse, ApiError> {
    let users = match (&query.role, &query.course_id) {
        (Some(role), Some(cid)) => UserService::list_by_course_and_role(cid, role, &pool).await?,
        (Some(role), None) => UserService::list_by_role(role, &pool).await?,
        (None, Some(cid)) => UserService::list_by_course(cid, &pool).await?,
        (None, None) => UserService::list_all(&pool).await?,
    };

    debug!("Listed {} users", users.len());
    // Rows go out verbatim, passwords included; the admin console round-trips
    // them in place.
    Ok(HttpResponse::Ok().json(users))
}

pub async fn create_user(
    pool: web::Data<DbPool>,
    body: web::Json<CreateUserRequest>,
) -> Result<HttpResponse, ApiError> {
    if UserService::find_by_username(&body.username, &pool)
        .await?
        .is_some()
    {
        return Err(ApiError::Validation("Username already exists".to_string()));
    }

    let is_professor = body
        .role
        .as_deref()
        .map_or(false, |r| r.eq_ignore_ascii_case("professor"));

    // Professors are the only role with a course affiliation at creation
    // time; everyone else gets the association cleared.
    let course_id = if is_professor {
        match body.course_id.clone() {
            Some(cid) if !cid.trim().is_empty() => Some(cid),
            _ => {
                return Err(ApiError::Validation(
                    "Professors must be assigned to a Course/Department.".to_string(),
                ));
            }
        }
    } else {
        None
    };

    let role = body.role.clone().unwrap_or_else(|| "student".to_string());

    let new_user = NewUser {
        username: body.username.clone(),
        password: body.password.clone(),
        role,
        course_id,
        email: body.email.clone(),
        full_name: body.full_name.clone(),
        phone: body.phone.clone(),
    };

    let uid = UserService::create(new_user, &pool).await?;
    let saved = UserService::get_by_id(uid, &pool).await?;

    ActivityLogService::record(&saved.username, "User created", &saved.role, &pool).await?;
    NotificationService::create(
        system_notification(
            saved.id,
            "Welcome to CS Learning Hub",
            "Your account has been created successfully. Welcome to the CS Learning Hub platform!",
        ),
        &pool,
    )
    .await?;

    Ok(HttpResponse::Ok().json(saved))
}

pub async fn update_user(
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
    body: web::Json<UpdateUserRequest>,
) -> Result<HttpResponse, ApiError> {
    let uid = path.into_inner();
    let mut user = UserService::get_by_id(uid, &pool).await?;

    if let Some(value) = &body.email {
        user.email = Some(value.clone());
    }
    if let Some(value) = &body.full_name {
        user.full_name = Some(value.clone());
    }
    if let Some(value) = &body.phone {
        user.phone = Some(value.clone());
    }
    if let Some(value) = &body.course_id {
        user.course_id = Some(value.clone());
    }
    if let Some(value) = &body.role {
        user.role = value.clone();
    }

    let user = UserService::save_details(user, &pool).await?;

    ActivityLogService::record(&user.username, "User profile updated by admin", "admin", &pool)
        .await?;
    NotificationService::create(
        system_notification(
            user.id,
            "Profile Updated",
            "Your profile has been updated by administrator.",
        ),
        &pool,
    )
    .await?;

    Ok(HttpResponse::Ok().json(user))
}

pub async fn admin_reset_password(
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
    body: web::Json<AdminPasswordResetRequest>,
) -> Result<HttpResponse, ApiError> {
    let uid = path.into_inner();
    let user = UserService::get_by_id(uid, &pool).await?;

    let new_password = body
        .password
        .clone()
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("Password is required".to_string()))?;

    UserService::set_password(user.id, &new_password, &pool).await?;

    ActivityLogService::record(&user.username, "Password reset by admin", "admin", &pool).await?;
    NotificationService::create(
        system_notification(
            user.id,
            "Password Reset",
            "Your password has been reset by administrator. Please login with your new password.",
        ),
        &pool,
    )
    .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Password updated successfully"
    })))
}

pub async fn delete_user(
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let uid = path.into_inner();
    let user = UserService::get_by_id(uid, &pool).await?;

    // No cascade: the user's notifications and log entries stay behind.
    UserService::delete_by_id(uid, &pool).await?;
    ActivityLogService::record(&user.username, "User deleted", &user.role, &pool).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "User deleted successfully"
    })))
}

// ==========================================
// Courses
// ==========================================

pub async fn list_courses(pool: web::Data<DbPool>) -> Result<HttpResponse, ApiError> {
    let courses = CourseService::list_all(&pool).await?;
    Ok(HttpResponse::Ok().json(courses))
}

pub async fn create_course(
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let form = collect_form(payload).await?;
    let cid = form.require("id")?;
    let title = form.require("title")?;
    let description = form.require("description")?;
    let theme_color = form.require("themeColor")?;

    if CourseService::exists(&cid, &pool).await? {
        return Err(ApiError::Validation(
            "Course Code (ID) already exists.".to_string(),
        ));
    }

    let image = match form.file {
        Some(file) => Some(store_upload(&config.upload_dir, file).await?),
        None => None,
    };

    let course = Course {
        id: cid,
        title,
        description,
        theme_color,
        image,
        status: "active".to_string(),
    };

    let course = CourseService::create(course, &pool).await?;

    ActivityLogService::record(&course.id, "Course created", "System", &pool).await?;
    notify_course_created(&course, &pool).await?;

    Ok(HttpResponse::Ok().json(course))
}

pub(crate) fn course_recipients(users: &[User]) -> Vec<i32> {
    users
        .iter()
        .filter(|u| {
            u.role.eq_ignore_ascii_case("student") || u.role.eq_ignore_ascii_case("professor")
        })
        .map(|u| u.id)
        .collect()
}

async fn notify_course_created(course: &Course, pool: &DbPool) -> Result<(), ApiError> {
    let all_users = UserService::list_all(pool).await?;
    let recipients = course_recipients(&all_users);
    info!(
        "Fanning out course notification for {} to {} users",
        course.id,
        recipients.len()
    );

    // One row per recipient; re-announcements duplicate rather than dedupe.
    for uid in recipients {
        NotificationService::create(
            NewNotification {
                user_id: uid,
                title: "New Course Available".to_string(),
                message: format!(
                    "A new course '{}' ({}) has been added.",
                    course.title, course.id
                ),
                kind: "course".to_string(),
                related_id: Some(course.id.clone()),
            },
            pool,
        )
        .await?;
    }

    Ok(())
}

pub async fn update_course(
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    path: web::Path<String>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let cid = path.into_inner();
    let form = collect_form(payload).await?;

    let mut course = CourseService::get(&cid, &pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("Course not found".to_string()))?;

    course.title = form.require("title")?;
    course.description = form.require("description")?;
    course.theme_color = form.require("themeColor")?;
    if let Some(file) = form.file {
        course.image = Some(store_upload(&config.upload_dir, file).await?);
    }

    let course = CourseService::update(course, &pool).await?;
    ActivityLogService::record(&course.id, "Course updated", "System", &pool).await?;

    Ok(HttpResponse::Ok().json(course))
}

pub async fn delete_course(
    pool: web::Data<DbPool>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let cid = path.into_inner();

    if !CourseService::exists(&cid, &pool).await? {
        return Err(ApiError::NotFound("Course not found".to_string()));
    }

    // Subjects referencing the course are left untouched.
    CourseService::delete(&cid, &pool).await?;
    ActivityLogService::record(&cid, "Course deleted", "System", &pool).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Course deleted successfully"
    })))
}

// ==========================================
// Subjects
// ==========================================

pub async fn list_subjects(
    pool: web::Data<DbPool>,
    query: web::Query<SubjectListQuery>,
) -> Result<HttpResponse, ApiError> {
    let subjects = match query.course_id.as_deref() {
        Some(cid) if !cid.is_empty() => SubjectService::list_by_course(cid, &pool).await?,
        _ => SubjectService::list_all(&pool).await?,
    };
    Ok(HttpResponse::Ok().json(subjects))
}

pub async fn get_subject(
    pool: web::Data<DbPool>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let code = path.into_inner();
    let subject = SubjectService::get(&code, &pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("Subject not found".to_string()))?;
    Ok(HttpResponse::Ok().json(subject))
}

/// Year level and semester submitted as 0 mean "unset" and fall back to 1;
/// a missing status becomes "active". Creation only — updates store what
/// they are given.
pub(crate) fn subject_from_payload(payload: SubjectPayload) -> Subject {
    Subject {
        code: payload.code,
        title: payload.title,
        course_id: payload.course_id,
        year_level: if payload.year_level == 0 {
            1
        } else {
            payload.year_level
        },
        semester: if payload.semester == 0 {
            1
        } else {
            payload.semester
        },
        status: payload.status.unwrap_or_else(|| "active".to_string()),
    }
}

pub async fn create_subject(
    pool: web::Data<DbPool>,
    body: web::Json<SubjectPayload>,
) -> Result<HttpResponse, ApiError> {
    if SubjectService::exists(&body.code, &pool).await? {
        return Err(ApiError::Validation(
            "Subject Code already exists.".to_string(),
        ));
    }

    let subject = subject_from_payload(body.into_inner());
    let subject = SubjectService::create(subject, &pool).await?;

    ActivityLogService::record(&subject.code, "Subject created", "System", &pool).await?;
    notify_subject_created(&subject, &pool).await?;

    Ok(HttpResponse::Ok().json(subject))
}

pub(crate) fn subject_notification_message(subject: &Subject, course_name: &str) -> String {
    format!(
        "A new subject '{}' ({}) has been added to {}.",
        subject.title, subject.code, course_name
    )
}

async fn notify_subject_created(subject: &Subject, pool: &DbPool) -> Result<(), ApiError> {
    // The course title goes into the message body; a dangling course id is
    // used verbatim.
    let course_name = match CourseService::get(&subject.course_id, pool).await? {
        Some(course) => course.title,
        None => subject.course_id.clone(),
    };

    for user in UserService::list_by_course(&subject.course_id, pool).await? {
        NotificationService::create(
            NewNotification {
                user_id: user.id,
                title: "New Subject Added".to_string(),
                message: subject_notification_message(subject, &course_name),
                kind: "subject".to_string(),
                related_id: Some(subject.code.clone()),
            },
            pool,
        )
        .await?;
    }

    Ok(())
}

pub async fn update_subject(
    pool: web::Data<DbPool>,
    path: web::Path<String>,
    body: web::Json<UpdateSubjectRequest>,
) -> Result<HttpResponse, ApiError> {
    let code = path.into_inner();
    let mut subject = SubjectService::get(&code, &pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("Subject not found".to_string()))?;

    if let Some(title) = body.title.clone() {
        subject.title = title;
    }
    subject.year_level = body.year_level;
    subject.semester = body.semester;
    if let Some(status) = body.status.clone() {
        subject.status = status;
    }

    let subject = SubjectService::update(subject, &pool).await?;
    ActivityLogService::record(&code, "Subject updated", "System", &pool).await?;

    Ok(HttpResponse::Ok().json(subject))
}

pub async fn delete_subject(
    pool: web::Data<DbPool>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let code = path.into_inner();

    if !SubjectService::exists(&code, &pool).await? {
        return Err(ApiError::NotFound("Subject not found".to_string()));
    }

    SubjectService::delete(&code, &pool).await?;
    ActivityLogService::record(&code, "Subject deleted", "System", &pool).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Subject deleted successfully"
    })))
}

// ==========================================
// Notifications & activity log
// ==========================================

pub async fn list_notifications(
    pool: web::Data<DbPool>,
    query: web::Query<OptionalUserIdQuery>,
) -> Result<HttpResponse, ApiError> {
    let items = match query.user_id {
        Some(uid) => NotificationService::list_for_user(uid, &pool).await?,
        // Admin view: everything, system-wide.
        None => NotificationService::list_all(&pool).await?,
    };
    Ok(HttpResponse::Ok().json(items))
}

pub async fn unread_count(
    pool: web::Data<DbPool>,
    query: web::Query<UserIdQuery>,
) -> Result<HttpResponse, ApiError> {
    let count = NotificationService::unread_count(query.user_id, &pool).await?;
    Ok(HttpResponse::Ok().json(json!({ "count": count })))
}

pub async fn mark_notification_read(
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
    query: web::Query<UserIdQuery>,
) -> Result<HttpResponse, ApiError> {
    NotificationService::mark_read(path.into_inner(), query.user_id, &pool).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Notification marked as read"
    })))
}

pub async fn mark_all_notifications_read(
    pool: web::Data<DbPool>,
    query: web::Query<UserIdQuery>,
) -> Result<HttpResponse, ApiError> {
    NotificationService::mark_all_read(query.user_id, &pool).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "All notifications marked as read"
    })))
}

pub async fn list_logs(pool: web::Data<DbPool>) -> Result<HttpResponse, ApiError> {
    let logs = ActivityLogService::list_recent(&pool).await?;
    Ok(HttpResponse::Ok().json(logs))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/profile")
            .route(web::get().to(get_profile))
            .route(web::put().to(update_profile))
            .default_service(method_not_allowed("GET, PUT")),
    )
    .service(
        web::resource("/change-password")
            .route(web::put().to(change_password))
            .default_service(method_not_allowed("PUT")),
    )
    .service(
        web::resource("/upload-profile-picture")
            .route(web::post().to(upload_profile_picture))
            .default_service(method_not_allowed("POST")),
    )
    .service(
        web::resource("/users")
            .route(web::get().to(list_users))
            .route(web::post().to(create_user))
            .default_service(method_not_allowed("GET, POST")),
    )
    .service(
        web::resource("/users/{id}")
            .route(web::put().to(update_user))
            .route(web::delete().to(delete_user))
            .default_service(method_not_allowed("PUT, DELETE")),
    )
    .service(
        web::resource("/users/{id}/password")
            .route(web::put().to(admin_reset_password))
            .default_service(method_not_allowed("PUT")),
    )
    .service(
        web::resource("/courses")
            .route(web::get().to(list_courses))
            .route(web::post().to(create_course))
            .default_service(method_not_allowed("GET, POST")),
    )
    .service(
        web::resource("/courses/{id}")
            .route(web::put().to(update_course))
            .route(web::delete().to(delete_course))
            .default_service(method_not_allowed("PUT, DELETE")),
    )
    .service(
        web::resource("/subjects")
            .route(web::get().to(list_subjects))
            .route(web::post().to(create_subject))
            .default_service(method_not_allowed("GET, POST")),
    )
    .service(
        web::resource("/subjects/{code}")
            .route(web::get().to(get_subject))
            .route(web::put().to(update_subject))
            .route(web::delete().to(delete_subject))
            .default_service(method_not_allowed("GET, PUT, DELETE")),
    )
    .service(
        web::resource("/notifications")
            .route(web::get().to(list_notifications))
            .default_service(method_not_allowed("GET")),
    )
    .service(
        web::resource("/notifications/unread-count")
            .route(web::get().to(unread_count))
            .default_service(method_not_allowed("GET")),
    )
    .service(
        web::resource("/notifications/mark-read/{id}")
            .route(web::post().to(mark_notification_read))
            .default_service(method_not_allowed("POST")),
    )
    .service(
        web::resource("/notifications/mark-all-read")
            .route(web::post().to(mark_all_notifications_read))
            .default_service(method_not_allowed("POST")),
    )
    .service(
        web::resource("/logs")
            .route(web::get().to(list_logs))
            .default_service(method_not_allowed("GET")),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn user(id: i32, role: &str, course_id: Option<&str>) -> User {
        let ts = NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        User {
            id,
            username: format!("user{}", id),
            password: "pw".to_string(),
            role: role.to_string(),
            course_id: course_id.map(str::to_string),
            email: None,
            full_name: None,
            phone: None,
            profile_picture: None,
            reset_token: None,
            reset_token_expiry: None,
            created_at: ts,
            updated_at: ts,
        }
    }

    #[test]
    fn course_fanout_targets_students_and_professors_only() {
        let users = vec![
            user(1, "admin", None),
            user(2, "student", Some("CS101")),
            user(3, "Professor", Some("CS101")),
            user(4, "STUDENT", None),
            user(5, "registrar", None),
        ];
        assert_eq!(course_recipients(&users), vec![2, 3, 4]);
    }

    #[test]
    fn course_fanout_with_no_matching_roles_is_empty() {
        let users = vec![user(1, "admin", None)];
        assert!(course_recipients(&users).is_empty());
    }

    #[test]
    fn subject_zero_fields_default_to_one_and_active() {
        let subject = subject_from_payload(SubjectPayload {
            code: "CS101-1".to_string(),
            title: "Intro".to_string(),
            course_id: "CS101".to_string(),
            year_level: 0,
            semester: 0,
            status: None,
        });
        assert_eq!(subject.year_level, 1);
        assert_eq!(subject.semester, 1);
        assert_eq!(subject.status, "active");
    }

    #[test]
    fn subject_explicit_fields_are_kept() {
        let subject = subject_from_payload(SubjectPayload {
            code: "CS301-2".to_string(),
            title: "Databases".to_string(),
            course_id: "CS101".to_string(),
            year_level: 3,
            semester: 2,
            status: Some("inactive".to_string()),
        });
        assert_eq!(subject.year_level, 3);
        assert_eq!(subject.semester, 2);
        assert_eq!(subject.status, "inactive");
    }

    #[test]
    fn subject_notification_names_the_course() {
        let subject = Subject {
            code: "CS101-1".to_string(),
            title: "Intro".to_string(),
            course_id: "CS101".to_string(),
            year_level: 1,
            semester: 1,
            status: "active".to_string(),
        };
        assert_eq!(
            subject_notification_message(&subject, "Computer Science"),
            "A new subject 'Intro' (CS101-1) has been added to Computer Science."
        );
    }
}
