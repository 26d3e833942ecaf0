use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize, Serializer};
use diesel::prelude::*;

/// Timestamps on notifications are shown to the minute in the client feed.
fn minute_precision<S>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&ts.format("%Y-%m-%d %H:%M").to_string())
}

#[derive(Queryable, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i32,
    pub username: String,
    // Plaintext end to end; the admin UI round-trips it as-is.
    pub password: String,
    pub role: String,
    pub course_id: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub profile_picture: Option<String>,
    pub reset_token: Option<String>,
    pub reset_token_expiry: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub role: String,
    pub course_id: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Queryable, Insertable, Serialize, Debug, Clone)]
#[diesel(table_name = crate::schema::courses)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub title: String,
    pub description: String,
    pub theme_color: String,
    pub image: Option<String>,
    pub status: String,
}

#[derive(Queryable, Insertable, Serialize, Debug, Clone)]
#[diesel(table_name = crate::schema::subjects)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub code: String,
    pub title: String,
    pub course_id: String,
    pub year_level: i32,
    pub semester: i32,
    pub status: String,
}

#[derive(Queryable, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i32,
    pub user_id: i32,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub related_id: Option<String>,
    pub is_read: bool,
    #[serde(serialize_with = "minute_precision")]
    pub created_at: NaiveDateTime,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::notifications)]
pub struct NewNotification {
    pub user_id: i32,
    pub title: String,
    pub message: String,
    pub kind: String,
    pub related_id: Option<String>,
}

#[derive(Queryable, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLog {
    pub id: i32,
    pub target: String,
    pub action: String,
    pub role: String,
    pub timestamp: NaiveDateTime,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::activity_logs)]
pub struct NewActivityLog {
    pub target: String,
    pub action: String,
    pub role: String,
}

// DTOs

/// Older portal scripts post the username as `identifier`; both names are
/// accepted and `username` wins when both are present.
#[derive(Deserialize, Debug)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub identifier: Option<String>,
    pub password: Option<String>,
}

impl LoginRequest {
    pub fn resolved_username(&self) -> Option<&str> {
        self.username.as_deref().or(self.identifier.as_deref())
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub role: Option<String>,
    pub course_id: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub course_id: Option<String>,
    pub role: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChangeRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Deserialize, Debug)]
pub struct AdminPasswordResetRequest {
    pub password: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SubjectPayload {
    pub code: String,
    pub title: String,
    pub course_id: String,
    #[serde(default)]
    pub year_level: i32,
    #[serde(default)]
    pub semester: i32,
    pub status: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSubjectRequest {
    pub title: Option<String>,
    #[serde(default)]
    pub year_level: i32,
    #[serde(default)]
    pub semester: i32,
    pub status: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UserListQuery {
    pub role: Option<String>,
    pub course_id: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SubjectListQuery {
    pub course_id: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UserIdQuery {
    pub user_id: i32,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OptionalUserIdQuery {
    pub user_id: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn login_request_prefers_username_over_identifier() {
        let req: LoginRequest = serde_json::from_str(
            r#"{"username":"stud1","identifier":"other","password":"pw"}"#,
        )
        .unwrap();
        assert_eq!(req.resolved_username(), Some("stud1"));
    }

    #[test]
    fn login_request_falls_back_to_identifier() {
        let req: LoginRequest =
            serde_json::from_str(r#"{"identifier":"prof2","password":"pw"}"#).unwrap();
        assert_eq!(req.resolved_username(), Some("prof2"));
    }

    #[test]
    fn login_request_with_neither_name_resolves_to_none() {
        let req: LoginRequest = serde_json::from_str(r#"{"password":"pw"}"#).unwrap();
        assert_eq!(req.resolved_username(), None);
    }

    #[test]
    fn subject_payload_missing_numbers_deserialize_as_zero() {
        let payload: SubjectPayload =
            serde_json::from_str(r#"{"code":"CS101-1","title":"Intro","courseId":"CS101"}"#)
                .unwrap();
        assert_eq!(payload.year_level, 0);
        assert_eq!(payload.semester, 0);
        assert!(payload.status.is_none());
    }

    #[test]
    fn notification_created_at_is_minute_precision() {
        let n = Notification {
            id: 1,
            user_id: 7,
            title: "New Course Available".to_string(),
            message: "A new course 'Intro' (CS101) has been added.".to_string(),
            kind: "course".to_string(),
            related_id: Some("CS101".to_string()),
            is_read: false,
            created_at: NaiveDate::from_ymd_opt(2025, 3, 14)
                .unwrap()
                .and_hms_opt(9, 26, 53)
                .unwrap(),
        };
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["createdAt"], "2025-03-14 09:26");
        assert_eq!(json["type"], "course");
        assert_eq!(json["relatedId"], "CS101");
    }

    #[test]
    fn user_serializes_camel_case_fields() {
        let user = User {
            id: 3,
            username: "stud1".to_string(),
            password: "pw".to_string(),
            role: "student".to_string(),
            course_id: Some("CS101".to_string()),
            email: None,
            full_name: None,
            phone: None,
            profile_picture: None,
            reset_token: None,
            reset_token_expiry: None,
            created_at: NaiveDate::from_ymd_opt(2025, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            updated_at: NaiveDate::from_ymd_opt(2025, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["courseId"], "CS101");
        // The stored password comes back verbatim in admin listings.
        assert_eq!(json["password"], "pw");
    }
}
