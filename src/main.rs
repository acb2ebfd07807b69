use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cinema_system::{config::Config, controllers, services::cleanup::CleanupService, AppState};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.app.rust_log))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Cinema API");

    let app_state = AppState::new(config.clone())
        .await
        .expect("Failed to initialize application state");
    info!("Database and Redis connected");

    // --- Start background tasks ---

    // Задача очистки просроченных платежей и пустых броней каждые 5 минут
    let cleanup = CleanupService::new(app_state.clone());
    tokio::task::spawn(async move {
        loop {
            cleanup.run_full_cleanup().await;
            tokio::time::sleep(Duration::from_secs(300)).await;
        }
    });

    // --- Start the web server ---

    let app = Router::new()
        .route("/", get(|| async { "Cinema API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        // Mount the routes from the controllers module
        .nest("/api", controllers::routes())
        .with_state(app_state.clone())
        .layer(TraceLayer::new_for_http())
        // SPA ходит с другого origin
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.app.port));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind server address");
    axum::serve(listener, app.into_make_service())
        .await
        .expect("Server error");
}
