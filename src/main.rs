use actix_cors::Cors;
use actix_web::{get, web, App, HttpResponse, HttpServer, Responder};
use diesel::connection::SimpleConnection;
use diesel::pg::PgConnection;
use diesel::r2d2::{self, ConnectionManager};
use diesel::Connection;
use log::{error, info};
use serde_json::json;
use std::env;

use learnhub::admin_handlers;
use learnhub::auth_handlers;
use learnhub::config::{AppConfig, DB_INIT_SQL};
use learnhub::errors::not_found;
use learnhub::logger::setup_logger;
use learnhub::mailer::EmailService;
use learnhub::middleware::RequestLogger;

#[get("/test")]
async fn test_endpoint() -> impl Responder {
    HttpResponse::Ok().body("Backend is working!")
}

#[get("/health")]
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables and initialize logger
    dotenvy::dotenv().ok();
    setup_logger();

    // Get host and port from environment or use defaults
    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse::<u16>()
        .expect("PORT must be a number");

    // Connecting to database
    let db_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    info!("Connecting to database: {}", db_url);

    // Initialize database schema and seed data
    let mut conn = PgConnection::establish(&db_url)
        .expect("Failed to establish connection for schema bootstrap");
    conn.batch_execute(DB_INIT_SQL)
        .expect("Failed to execute database initialization script");
    info!("Database initialization complete.");

    // Set up database connection pool
    let manager = ConnectionManager::<PgConnection>::new(db_url);
    let pool = r2d2::Pool::builder()
        .build(manager)
        .expect("Failed to create database connection pool");

    // Load and validate configuration
    let config = AppConfig::from_env();
    if let Err(e) = config.validate() {
        error!("Configuration validation error: {}", e);
        panic!("Invalid configuration: {}", e);
    }

    // Outbound mail; falls back to log output when no SMTP host is set
    let mailer = EmailService::from_config(&config);

    info!("Starting HTTP server at http://{}:{}", host, port);

    // Start HTTP server
    HttpServer::new(move || {
        App::new()
            // Portal frontends are served from other origins
            .wrap(Cors::permissive())
            // Enable request logger middleware
            .wrap(RequestLogger)
            // Register app data
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(mailer.clone()))
            // API routes
            .service(
                web::scope("/api")
                    .service(test_endpoint)
                    .service(health_check)
                    .service(web::scope("/auth").configure(auth_handlers::configure))
                    .service(web::scope("/admin").configure(admin_handlers::configure)),
            )
            .default_service(web::route().to(not_found))
    })
    .workers(2) // Specify number of workers
    .keep_alive(std::time::Duration::from_secs(75)) // Configure keep-alive
    .shutdown_timeout(30) // Graceful shutdown timeout in seconds
    .bind((host, port))?
    .run()
    .await
}
