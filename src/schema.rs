// Database schema definitions
diesel::table! {
    users (id) {
        id -> Int4,
        username -> Varchar,
        password -> Varchar,
        role -> Varchar,
        course_id -> Nullable<Varchar>,
        email -> Nullable<Varchar>,
        full_name -> Nullable<Varchar>,
        phone -> Nullable<Varchar>,
        profile_picture -> Nullable<Varchar>,
        reset_token -> Nullable<Varchar>,
        reset_token_expiry -> Nullable<Timestamp>,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    courses (id) {
        id -> Varchar,
        title -> Varchar,
        description -> Text,
        theme_color -> Varchar,
        image -> Nullable<Varchar>,
        status -> Varchar,
    }
}

diesel::table! {
    subjects (code) {
        code -> Varchar,
        title -> Varchar,
        course_id -> Varchar,
        year_level -> Int4,
        semester -> Int4,
        status -> Varchar,
    }
}

diesel::table! {
    notifications (id) {
        id -> Int4,
        user_id -> Int4,
        title -> Varchar,
        message -> Text,
        // "type" is reserved in Rust; the column keeps its SQL name
        #[sql_name = "type"]
        kind -> Varchar,
        related_id -> Nullable<Varchar>,
        is_read -> Bool,
        created_at -> Timestamp,
    }
}

diesel::table! {
    activity_logs (id) {
        id -> Int4,
        target -> Varchar,
        action -> Varchar,
        role -> Varchar,
        timestamp -> Timestamp,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    users, courses, subjects, notifications, activity_logs,
);
