use actix_web::error::ResponseError;
use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use diesel::pg::PgConnection;
use diesel::r2d2::{self, ConnectionManager};
use serde_json::{json, Value};

use learnhub::errors::{not_found, ApiError};
use learnhub::{admin_handlers, auth_handlers, DbPool};

async fn body_json(response: actix_web::HttpResponse) -> Value {
    let bytes = actix_web::body::to_bytes(response.into_body()).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// A pool that never connects; handlers that fail before their first query
/// (extractor-level and validation-level paths) can run against it.
fn unconnected_pool() -> DbPool {
    let manager = ConnectionManager::<PgConnection>::new("postgres://localhost:1/unreachable");
    r2d2::Pool::builder()
        .max_size(1)
        .build_unchecked(manager)
}

#[actix_web::test]
async fn validation_errors_render_400_with_error_body() {
    let err = ApiError::Validation("Username already exists".to_string());
    assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

    let json = body_json(err.error_response()).await;
    assert_eq!(json["error"], "Username already exists");
}

#[actix_web::test]
async fn auth_errors_render_401_with_portal_body() {
    let err = ApiError::Auth("Invalid credentials".to_string());
    assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);

    let json = body_json(err.error_response()).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["message"], "Invalid credentials");
}

#[actix_web::test]
async fn forbidden_errors_render_403_naming_the_required_role() {
    let err = ApiError::Forbidden(
        "Access Denied: You do not have admin permissions for this portal.".to_string(),
    );
    assert_eq!(err.status_code(), StatusCode::FORBIDDEN);

    let json = body_json(err.error_response()).await;
    assert_eq!(json["success"], false);
    assert!(json["message"].as_str().unwrap().contains("admin"));
}

#[actix_web::test]
async fn not_found_errors_render_404() {
    let err = ApiError::NotFound("User not found".to_string());
    assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

    let json = body_json(err.error_response()).await;
    assert_eq!(json["error"], "User not found");
}

#[actix_web::test]
async fn database_errors_render_500() {
    let err = ApiError::Database("connection refused".to_string());
    assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[actix_web::test]
async fn unsupported_method_yields_405_with_supported_methods() {
    let app = test::init_service(
        App::new().service(web::scope("/api/admin").configure(admin_handlers::configure)),
    )
    .await;

    let req = test::TestRequest::delete().uri("/api/admin/logs").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);

    let json: Value = test::read_body_json(res).await;
    assert_eq!(json["success"], false);
    let message = json["message"].as_str().unwrap();
    assert!(message.contains("DELETE"));
    assert!(message.contains("GET"));
}

#[actix_web::test]
async fn get_on_a_login_route_yields_405() {
    let app = test::init_service(
        App::new().service(web::scope("/api/auth").configure(auth_handlers::configure)),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/auth/login").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[actix_web::test]
async fn unknown_route_yields_404() {
    let app = test::init_service(
        App::new()
            .service(web::scope("/api/admin").configure(admin_handlers::configure))
            .default_service(web::route().to(not_found)),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/nowhere").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn login_without_credentials_yields_400_before_touching_the_database() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(unconnected_pool()))
            .service(web::scope("/api/auth").configure(auth_handlers::configure)),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({}))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let json: Value = test::read_body_json(res).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["message"], "Credentials required");
}
