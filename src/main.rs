use actix_web::{web, App, HttpServer};
use std::io;
use std::sync::Arc;
use tokio::signal;

mod api_error;
mod auth;
mod config;
mod db;
mod http;
mod middleware;
mod models;
mod service;
mod telemetry;

use crate::auth::{AuthMiddleware, JwtConfig, JwtService};
use crate::config::Config;
use crate::db::create_pool;
use crate::middleware::cors_middleware;
use crate::service::{
    CardRenderer, DocumentCardRenderer, InsightGenerator, OpenAiInsightGenerator, PhotoService,
    RateLimitService, ShareService, TournamentService,
};
use crate::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> io::Result<()> {
    // Load configuration
    let config = Config::from_env().expect("Failed to load configuration");

    // Initialize telemetry
    init_telemetry();

    // Create database pool and bring the schema up to date
    let db_pool = create_pool(&config)
        .await
        .expect("Failed to create database pool");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("Failed to run database migrations");

    // Collaborators are constructed here and injected; nothing holds them as
    // module-level state.
    let jwt_service = JwtService::new(JwtConfig {
        secret_key: config.auth.jwt_secret.clone(),
        token_expiry: chrono::Duration::minutes(config.auth.token_expiry_minutes),
    });
    let insight_generator: Arc<dyn InsightGenerator> =
        Arc::new(OpenAiInsightGenerator::new(&config.ai));
    let card_renderer: Arc<dyn CardRenderer> = Arc::new(DocumentCardRenderer::new());

    let rate_limit_service = RateLimitService::new(db_pool.clone(), config.rate_limit.clone());
    let tournament_service = TournamentService::new(db_pool.clone(), rate_limit_service.clone());
    let photo_service = PhotoService::new(db_pool.clone(), config.storage.clone());
    let share_service = ShareService::new(
        db_pool.clone(),
        insight_generator,
        card_renderer,
        config.storage.public_base_url.clone(),
    );

    tracing::info!(
        "Starting photocup backend server on {}:{}",
        config.server.host,
        config.server.port
    );

    let host = config.server.host.clone();
    let port = config.server.port;

    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(db_pool.clone()))
            .app_data(web::Data::new(jwt_service.clone()))
            .app_data(web::Data::new(rate_limit_service.clone()))
            .app_data(web::Data::new(tournament_service.clone()))
            .app_data(web::Data::new(photo_service.clone()))
            .app_data(web::Data::new(share_service.clone()))
            .wrap(cors_middleware())
            .wrap(actix_web::middleware::Logger::default())
            .service(
                web::scope("/api/health")
                    .route("", web::get().to(http::health::health_check)),
            )
            .service(
                web::scope("/api/v1/auth")
                    .route("/signup", web::post().to(http::auth_handler::signup))
                    .route("/login", web::post().to(http::auth_handler::login))
                    .service(
                        web::scope("/me")
                            .wrap(AuthMiddleware::new(jwt_service.clone()))
                            .route("", web::get().to(http::auth_handler::me)),
                    ),
            )
            .service(
                web::scope("/api/v1/photos")
                    .wrap(AuthMiddleware::new(jwt_service.clone()))
                    .route("/upload", web::post().to(http::photo_handler::upload))
                    .route("", web::get().to(http::photo_handler::list))
                    .route("/{photo_id}", web::delete().to(http::photo_handler::delete)),
            )
            .service(
                web::scope("/api/v1/tournaments")
                    .wrap(AuthMiddleware::new(jwt_service.clone()))
                    .route("", web::post().to(http::tournament_handler::create))
                    .route(
                        "/{tournament_id}/matches/{match_id}/select",
                        web::post().to(http::tournament_handler::select_winner),
                    )
                    .route(
                        "/{tournament_id}/result",
                        web::get().to(http::tournament_handler::result),
                    ),
            )
            .service(
                web::scope("/api/v1/share")
                    .service(
                        web::scope("/tournament")
                            .wrap(AuthMiddleware::new(jwt_service.clone()))
                            .route(
                                "/{tournament_id}",
                                web::post().to(http::share_handler::create_share),
                            ),
                    )
                    .route("/{share_id}", web::get().to(http::share_handler::get_shared))
                    .route("/{share_id}/vote", web::post().to(http::share_handler::vote)),
            )
    })
    .bind((host, port))?
    .run();

    // Graceful shutdown
    let server_handle = server.handle();
    tokio::spawn(async move {
        signal::ctrl_c()
            .await
            .expect("Failed to listen for shutdown signal");
        tracing::info!("Shutdown signal received, stopping server...");
        server_handle.stop(true).await;
    });

    server.await
}
