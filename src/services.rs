use crate::config::DbPool;
use crate::errors::ApiError;
use crate::models::*;
use actix_web::web;
use chrono::{NaiveDateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, PooledConnection};
use log::{debug, error, info};

type PooledPg = PooledConnection<ConnectionManager<PgConnection>>;

fn checkout(pool: &DbPool) -> Result<PooledPg, ApiError> {
    pool.get().map_err(|e| {
        error!("Failed to get database connection: {}", e);
        ApiError::Database(e.to_string())
    })
}

fn blocking_error(e: actix_web::error::BlockingError) -> ApiError {
    error!("Database operation error: {}", e);
    ApiError::Database(e.to_string())
}

pub struct UserService;

impl UserService {
    pub async fn find_by_username(name: &str, pool: &DbPool) -> Result<Option<User>, ApiError> {
        let name_copy = name.to_string();
        let conn = checkout(pool)?;

        web::block(move || {
            use crate::schema::users::dsl::*;
            let mut conn = conn;
            users
                .filter(username.eq(name_copy))
                .first::<User>(&mut conn)
                .optional()
        })
        .await
        .map_err(blocking_error)?
        .map_err(|e| {
            error!("Error finding user by username: {}", e);
            ApiError::Database(e.to_string())
        })
    }

    pub async fn find_by_email(addr: &str, pool: &DbPool) -> Result<Option<User>, ApiError> {
        let addr_copy = addr.to_string();
        let conn = checkout(pool)?;

        web::block(move || {
            use crate::schema::users::dsl::*;
            let mut conn = conn;
            users
                .filter(email.eq(addr_copy))
                .first::<User>(&mut conn)
                .optional()
        })
        .await
        .map_err(blocking_error)?
        .map_err(|e| {
            error!("Error finding user by email: {}", e);
            ApiError::Database(e.to_string())
        })
    }

    pub async fn find_by_reset_token(token: &str, pool: &DbPool) -> Result<Option<User>, ApiError> {
        let token_copy = token.to_string();
        let conn = checkout(pool)?;

        web::block(move || {
            use crate::schema::users::dsl::*;
            let mut conn = conn;
            users
                .filter(reset_token.eq(token_copy))
                .first::<User>(&mut conn)
                .optional()
        })
        .await
        .map_err(blocking_error)?
        .map_err(|e| {
            error!("Error finding user by reset token: {}", e);
            ApiError::Database(e.to_string())
        })
    }

    pub async fn get_by_id(uid: i32, pool: &DbPool) -> Result<User, ApiError> {
        let conn = checkout(pool)?;

        web::block(move || {
            use crate::schema::users::dsl::*;
            let mut conn = conn;
            users.find(uid).first::<User>(&mut conn)
        })
        .await
        .map_err(blocking_error)?
        .map_err(|e| {
            debug!("User not found with ID {}: {}", uid, e);
            ApiError::NotFound("User not found".to_string())
        })
    }

    pub async fn list_all(pool: &DbPool) -> Result<Vec<User>, ApiError> {
        let conn = checkout(pool)?;

        web::block(move || {
            use crate::schema::users::dsl::*;
            let mut conn = conn;
            users.load::<User>(&mut conn)
        })
        .await
        .map_err(blocking_error)?
        .map_err(|e| {
            error!("Failed to list users: {}", e);
            ApiError::Database(e.to_string())
        })
    }

    pub async fn list_by_course(cid: &str, pool: &DbPool) -> Result<Vec<User>, ApiError> {
        let cid_copy = cid.to_string();
        let conn = checkout(pool)?;

        web::block(move || {
            use crate::schema::users::dsl::*;
            let mut conn = conn;
            users.filter(course_id.eq(cid_copy)).load::<User>(&mut conn)
        })
        .await
        .map_err(blocking_error)?
        .map_err(|e| {
            error!("Failed to list users by course: {}", e);
            ApiError::Database(e.to_string())
        })
    }

    pub async fn list_by_role(role_param: &str, pool: &DbPool) -> Result<Vec<User>, ApiError> {
        let role_copy = role_param.to_string();
        let conn = checkout(pool)?;

        web::block(move || {
            use crate::schema::users::dsl::*;
            let mut conn = conn;
            users.filter(role.eq(role_copy)).load::<User>(&mut conn)
        })
        .await
        .map_err(blocking_error)?
        .map_err(|e| {
            error!("Failed to list users by role: {}", e);
            ApiError::Database(e.to_string())
        })
    }

    pub async fn list_by_course_and_role(
        cid: &str,
        role_param: &str,
        pool: &DbPool,
    ) -> Result<Vec<User>, ApiError> {
        let cid_copy = cid.to_string();
        let role_copy = role_param.to_string();
        let conn = checkout(pool)?;

        web::block(move || {
            use crate::schema::users::dsl::*;
            let mut conn = conn;
            users
                .filter(course_id.eq(cid_copy))
                .filter(role.eq(role_copy))
                .load::<User>(&mut conn)
        })
        .await
        .map_err(blocking_error)?
        .map_err(|e| {
            error!("Failed to list users by course and role: {}", e);
            ApiError::Database(e.to_string())
        })
    }

    pub async fn create(new_user: NewUser, pool: &DbPool) -> Result<i32, ApiError> {
        let username_copy = new_user.username.clone();
        let conn = checkout(pool)?;

        let uid = web::block(move || {
            use crate::schema::users::dsl::*;
            let mut conn = conn;
            diesel::insert_into(users)
                .values(&new_user)
                .returning(id)
                .get_result::<i32>(&mut conn)
        })
        .await
        .map_err(blocking_error)?
        .map_err(|e| {
            if e.to_string().contains("unique constraint") {
                debug!("Attempted to create duplicate user: {}", username_copy);
                ApiError::Validation("Username already exists".to_string())
            } else {
                error!("Failed to create user: {}", e);
                ApiError::Database(e.to_string())
            }
        })?;

        info!("Created new user with ID: {}", uid);
        Ok(uid)
    }

    /// Writes back the mutable profile columns of an already-loaded user and
    /// returns the stored row.
    pub async fn save_details(user: User, pool: &DbPool) -> Result<User, ApiError> {
        let conn = checkout(pool)?;

        web::block(move || {
            use crate::schema::users::dsl::*;
            let mut conn = conn;
            diesel::update(users.find(user.id))
                .set((
                    email.eq(user.email.clone()),
                    full_name.eq(user.full_name.clone()),
                    phone.eq(user.phone.clone()),
                    course_id.eq(user.course_id.clone()),
                    role.eq(user.role.clone()),
                    updated_at.eq(Utc::now().naive_utc()),
                ))
                .get_result::<User>(&mut conn)
        })
        .await
        .map_err(blocking_error)?
        .map_err(|e| {
            error!("Failed to update user details: {}", e);
            ApiError::Database(e.to_string())
        })
    }

    pub async fn set_password(uid: i32, new_password: &str, pool: &DbPool) -> Result<(), ApiError> {
        let password_copy = new_password.to_string();
        let conn = checkout(pool)?;

        web::block(move || {
            use crate::schema::users::dsl::*;
            let mut conn = conn;
            diesel::update(users.find(uid))
                .set((
                    password.eq(password_copy),
                    updated_at.eq(Utc::now().naive_utc()),
                ))
                .execute(&mut conn)
        })
        .await
        .map_err(blocking_error)?
        .map_err(|e| {
            error!("Failed to update password: {}", e);
            ApiError::Database(e.to_string())
        })?;

        Ok(())
    }

    pub async fn set_profile_picture(
        uid: i32,
        file_name: &str,
        pool: &DbPool,
    ) -> Result<(), ApiError> {
        let file_copy = file_name.to_string();
        let conn = checkout(pool)?;

        web::block(move || {
            use crate::schema::users::dsl::*;
            let mut conn = conn;
            diesel::update(users.find(uid))
                .set((
                    profile_picture.eq(Some(file_copy)),
                    updated_at.eq(Utc::now().naive_utc()),
                ))
                .execute(&mut conn)
        })
        .await
        .map_err(blocking_error)?
        .map_err(|e| {
            error!("Failed to update profile picture: {}", e);
            ApiError::Database(e.to_string())
        })?;

        Ok(())
    }

    pub async fn set_reset_token(
        uid: i32,
        token: &str,
        expiry: NaiveDateTime,
        pool: &DbPool,
    ) -> Result<(), ApiError> {
        let token_copy = token.to_string();
        let conn = checkout(pool)?;

        web::block(move || {
            use crate::schema::users::dsl::*;
            let mut conn = conn;
            diesel::update(users.find(uid))
                .set((
                    reset_token.eq(Some(token_copy)),
                    reset_token_expiry.eq(Some(expiry)),
                ))
                .execute(&mut conn)
        })
        .await
        .map_err(blocking_error)?
        .map_err(|e| {
            error!("Failed to store reset token: {}", e);
            ApiError::Database(e.to_string())
        })?;

        Ok(())
    }

    /// Overwrites the password and consumes the reset token in one update.
    pub async fn complete_password_reset(
        uid: i32,
        new_password: &str,
        pool: &DbPool,
    ) -> Result<(), ApiError> {
        let password_copy = new_password.to_string();
        let conn = checkout(pool)?;

        web::block(move || {
            use crate::schema::users::dsl::*;
            let mut conn = conn;
            diesel::update(users.find(uid))
                .set((
                    password.eq(password_copy),
                    reset_token.eq(None::<String>),
                    reset_token_expiry.eq(None::<NaiveDateTime>),
                    updated_at.eq(Utc::now().naive_utc()),
                ))
                .execute(&mut conn)
        })
        .await
        .map_err(blocking_error)?
        .map_err(|e| {
            error!("Failed to complete password reset: {}", e);
            ApiError::Database(e.to_string())
        })?;

        Ok(())
    }

    pub async fn delete_by_id(uid: i32, pool: &DbPool) -> Result<(), ApiError> {
        let conn = checkout(pool)?;

        web::block(move || {
            use crate::schema::users::dsl::*;
            let mut conn = conn;
            diesel::delete(users.find(uid)).execute(&mut conn)
        })
        .await
        .map_err(blocking_error)?
        .map_err(|e| {
            error!("Failed to delete user: {}", e);
            ApiError::Database(e.to_string())
        })?;

        Ok(())
    }
}

pub struct CourseService;

impl CourseService {
    pub async fn exists(cid: &str, pool: &DbPool) -> Result<bool, ApiError> {
        let cid_copy = cid.to_string();
        let conn = checkout(pool)?;

        let found = web::block(move || {
            use crate::schema::courses::dsl::*;
            let mut conn = conn;
            courses
                .find(cid_copy)
                .select(id)
                .first::<String>(&mut conn)
                .optional()
        })
        .await
        .map_err(blocking_error)?
        .map_err(|e| {
            error!("Error checking course existence: {}", e);
            ApiError::Database(e.to_string())
        })?;

        Ok(found.is_some())
    }

    pub async fn get(cid: &str, pool: &DbPool) -> Result<Option<Course>, ApiError> {
        let cid_copy = cid.to_string();
        let conn = checkout(pool)?;

        web::block(move || {
            use crate::schema::courses::dsl::*;
            let mut conn = conn;
            courses.find(cid_copy).first::<Course>(&mut conn).optional()
        })
        .await
        .map_err(blocking_error)?
        .map_err(|e| {
            error!("Error loading course: {}", e);
            ApiError::Database(e.to_string())
        })
    }

    pub async fn list_all(pool: &DbPool) -> Result<Vec<Course>, ApiError> {
        let conn = checkout(pool)?;

        web::block(move || {
            use crate::schema::courses::dsl::*;
            let mut conn = conn;
            courses.load::<Course>(&mut conn)
        })
        .await
        .map_err(blocking_error)?
        .map_err(|e| {
            error!("Failed to list courses: {}", e);
            ApiError::Database(e.to_string())
        })
    }

    pub async fn create(course: Course, pool: &DbPool) -> Result<Course, ApiError> {
        let course_copy = course.clone();
        let conn = checkout(pool)?;

        web::block(move || {
            use crate::schema::courses::dsl::*;
            let mut conn = conn;
            diesel::insert_into(courses)
                .values(&course)
                .execute(&mut conn)
        })
        .await
        .map_err(blocking_error)?
        .map_err(|e| {
            error!("Failed to create course: {}", e);
            ApiError::Database(e.to_string())
        })?;

        info!("Created course {}", course_copy.id);
        Ok(course_copy)
    }

    pub async fn update(course: Course, pool: &DbPool) -> Result<Course, ApiError> {
        let course_copy = course.clone();
        let conn = checkout(pool)?;

        web::block(move || {
            use crate::schema::courses::dsl::*;
            let mut conn = conn;
            diesel::update(courses.find(course.id.clone()))
                .set((
                    title.eq(course.title.clone()),
                    description.eq(course.description.clone()),
                    theme_color.eq(course.theme_color.clone()),
                    image.eq(course.image.clone()),
                    status.eq(course.status.clone()),
                ))
                .execute(&mut conn)
        })
        .await
        .map_err(blocking_error)?
        .map_err(|e| {
            error!("Failed to update course: {}", e);
            ApiError::Database(e.to_string())
        })?;

        Ok(course_copy)
    }

    pub async fn delete(cid: &str, pool: &DbPool) -> Result<(), ApiError> {
        let cid_copy = cid.to_string();
        let conn = checkout(pool)?;

        web::block(move || {
            use crate::schema::courses::dsl::*;
            let mut conn = conn;
            diesel::delete(courses.find(cid_copy)).execute(&mut conn)
        })
        .await
        .map_err(blocking_error)?
        .map_err(|e| {
            error!("Failed to delete course: {}", e);
            ApiError::Database(e.to_string())
        })?;

        Ok(())
    }
}

pub struct SubjectService;

impl SubjectService {
    pub async fn exists(subject_code: &str, pool: &DbPool) -> Result<bool, ApiError> {
        let code_copy = subject_code.to_string();
        let conn = checkout(pool)?;

        let found = web::block(move || {
            use crate::schema::subjects::dsl::*;
            let mut conn = conn;
            subjects
                .find(code_copy)
                .select(code)
                .first::<String>(&mut conn)
                .optional()
        })
        .await
        .map_err(blocking_error)?
        .map_err(|e| {
            error!("Error checking subject existence: {}", e);
            ApiError::Database(e.to_string())
        })?;

        Ok(found.is_some())
    }

    pub async fn get(subject_code: &str, pool: &DbPool) -> Result<Option<Subject>, ApiError> {
        let code_copy = subject_code.to_string();
        let conn = checkout(pool)?;

        web::block(move || {
            use crate::schema::subjects::dsl::*;
            let mut conn = conn;
            subjects
                .find(code_copy)
                .first::<Subject>(&mut conn)
                .optional()
        })
        .await
        .map_err(blocking_error)?
        .map_err(|e| {
            error!("Error loading subject: {}", e);
            ApiError::Database(e.to_string())
        })
    }

    pub async fn list_all(pool: &DbPool) -> Result<Vec<Subject>, ApiError> {
        let conn = checkout(pool)?;

        web::block(move || {
            use crate::schema::subjects::dsl::*;
            let mut conn = conn;
            subjects.load::<Subject>(&mut conn)
        })
        .await
        .map_err(blocking_error)?
        .map_err(|e| {
            error!("Failed to list subjects: {}", e);
            ApiError::Database(e.to_string())
        })
    }

    pub async fn list_by_course(cid: &str, pool: &DbPool) -> Result<Vec<Subject>, ApiError> {
        let cid_copy = cid.to_string();
        let conn = checkout(pool)?;

        web::block(move || {
            use crate::schema::subjects::dsl::*;
            let mut conn = conn;
            subjects
                .filter(course_id.eq(cid_copy))
                .load::<Subject>(&mut conn)
        })
        .await
        .map_err(blocking_error)?
        .map_err(|e| {
            error!("Failed to list subjects by course: {}", e);
            ApiError::Database(e.to_string())
        })
    }

    pub async fn create(subject: Subject, pool: &DbPool) -> Result<Subject, ApiError> {
        let subject_copy = subject.clone();
        let conn = checkout(pool)?;

        web::block(move || {
            use crate::schema::subjects::dsl::*;
            let mut conn = conn;
            diesel::insert_into(subjects)
                .values(&subject)
                .execute(&mut conn)
        })
        .await
        .map_err(blocking_error)?
        .map_err(|e| {
            error!("Failed to create subject: {}", e);
            ApiError::Database(e.to_string())
        })?;

        info!("Created subject {}", subject_copy.code);
        Ok(subject_copy)
    }

    pub async fn update(subject: Subject, pool: &DbPool) -> Result<Subject, ApiError> {
        let subject_copy = subject.clone();
        let conn = checkout(pool)?;

        web::block(move || {
            use crate::schema::subjects::dsl::*;
            let mut conn = conn;
            diesel::update(subjects.find(subject.code.clone()))
                .set((
                    title.eq(subject.title.clone()),
                    year_level.eq(subject.year_level),
                    semester.eq(subject.semester),
                    status.eq(subject.status.clone()),
                ))
                .execute(&mut conn)
        })
        .await
        .map_err(blocking_error)?
        .map_err(|e| {
            error!("Failed to update subject: {}", e);
            ApiError::Database(e.to_string())
        })?;

        Ok(subject_copy)
    }

    pub async fn delete(subject_code: &str, pool: &DbPool) -> Result<(), ApiError> {
        let code_copy = subject_code.to_string();
        let conn = checkout(pool)?;

        web::block(move || {
            use crate::schema::subjects::dsl::*;
            let mut conn = conn;
            diesel::delete(subjects.find(code_copy)).execute(&mut conn)
        })
        .await
        .map_err(blocking_error)?
        .map_err(|e| {
            error!("Failed to delete subject: {}", e);
            ApiError::Database(e.to_string())
        })?;

        Ok(())
    }
}

pub struct NotificationService;

impl NotificationService {
    pub async fn create(notification: NewNotification, pool: &DbPool) -> Result<(), ApiError> {
        let conn = checkout(pool)?;

        web::block(move || {
            use crate::schema::notifications::dsl::*;
            let mut conn = conn;
            diesel::insert_into(notifications)
                .values(&notification)
                .execute(&mut conn)
        })
        .await
        .map_err(blocking_error)?
        .map_err(|e| {
            error!("Failed to create notification: {}", e);
            ApiError::Database(e.to_string())
        })?;

        Ok(())
    }

    pub async fn list_all(pool: &DbPool) -> Result<Vec<Notification>, ApiError> {
        let conn = checkout(pool)?;

        web::block(move || {
            use crate::schema::notifications::dsl::*;
            let mut conn = conn;
            notifications.load::<Notification>(&mut conn)
        })
        .await
        .map_err(blocking_error)?
        .map_err(|e| {
            error!("Failed to list notifications: {}", e);
            ApiError::Database(e.to_string())
        })
    }

    pub async fn list_for_user(uid: i32, pool: &DbPool) -> Result<Vec<Notification>, ApiError> {
        let conn = checkout(pool)?;

        web::block(move || {
            use crate::schema::notifications::dsl::*;
            let mut conn = conn;
            notifications
                .filter(user_id.eq(uid))
                .order(created_at.desc())
                .load::<Notification>(&mut conn)
        })
        .await
        .map_err(blocking_error)?
        .map_err(|e| {
            error!("Failed to list notifications for user: {}", e);
            ApiError::Database(e.to_string())
        })
    }

    pub async fn unread_count(uid: i32, pool: &DbPool) -> Result<i64, ApiError> {
        let conn = checkout(pool)?;

        web::block(move || {
            use crate::schema::notifications::dsl::*;
            let mut conn = conn;
            notifications
                .filter(user_id.eq(uid))
                .filter(is_read.eq(false))
                .count()
                .get_result::<i64>(&mut conn)
        })
        .await
        .map_err(blocking_error)?
        .map_err(|e| {
            error!("Failed to count unread notifications: {}", e);
            ApiError::Database(e.to_string())
        })
    }

    /// Single-statement update scoped to (id, user). A mismatched owner is a
    /// silent no-op, not an error.
    pub async fn mark_read(nid: i32, uid: i32, pool: &DbPool) -> Result<(), ApiError> {
        let conn = checkout(pool)?;

        web::block(move || {
            use crate::schema::notifications::dsl::*;
            let mut conn = conn;
            diesel::update(notifications.filter(id.eq(nid)).filter(user_id.eq(uid)))
                .set(is_read.eq(true))
                .execute(&mut conn)
        })
        .await
        .map_err(blocking_error)?
        .map_err(|e| {
            error!("Failed to mark notification read: {}", e);
            ApiError::Database(e.to_string())
        })?;

        Ok(())
    }

    pub async fn mark_all_read(uid: i32, pool: &DbPool) -> Result<(), ApiError> {
        let conn = checkout(pool)?;

        web::block(move || {
            use crate::schema::notifications::dsl::*;
            let mut conn = conn;
            diesel::update(notifications.filter(user_id.eq(uid)))
                .set(is_read.eq(true))
                .execute(&mut conn)
        })
        .await
        .map_err(blocking_error)?
        .map_err(|e| {
            error!("Failed to mark all notifications read: {}", e);
            ApiError::Database(e.to_string())
        })?;

        Ok(())
    }
}

pub struct ActivityLogService;

impl ActivityLogService {
    /// Append-only audit entry; invoked by every mutating operation.
    pub async fn record(
        target: &str,
        action: &str,
        role: &str,
        pool: &DbPool,
    ) -> Result<(), ApiError> {
        let entry = NewActivityLog {
            target: target.to_string(),
            action: action.to_string(),
            role: role.to_string(),
        };
        let conn = checkout(pool)?;

        web::block(move || {
            use crate::schema::activity_logs::dsl::*;
            let mut conn = conn;
            diesel::insert_into(activity_logs)
                .values(&entry)
                .execute(&mut conn)
        })
        .await
        .map_err(blocking_error)?
        .map_err(|e| {
            error!("Failed to record activity: {}", e);
            ApiError::Database(e.to_string())
        })?;

        Ok(())
    }

    pub async fn list_recent(pool: &DbPool) -> Result<Vec<ActivityLog>, ApiError> {
        let conn = checkout(pool)?;

        web::block(move || {
            use crate::schema::activity_logs::dsl::*;
            let mut conn = conn;
            activity_logs
                .order(timestamp.desc())
                .load::<ActivityLog>(&mut conn)
        })
        .await
        .map_err(blocking_error)?
        .map_err(|e| {
            error!("Failed to list activity logs: {}", e);
            ApiError::Database(e.to_string())
        })
    }
}
