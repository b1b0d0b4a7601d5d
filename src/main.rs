use axum::http::header::{ACCESS_CONTROL_ALLOW_CREDENTIALS, CONTENT_TYPE, COOKIE};
use axum::http::{HeaderValue, Method};
use investwatch_backend::config::{log_level_from_args, Config};
use investwatch_backend::{app, market, AppState, DatabasePool};
use std::sync::Arc;
use time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::{self, TraceLayer};
use tower_sessions::{ExpiredDeletion, Expiry, SessionManagerLayer};
use tower_sessions_rusqlite_store::{tokio_rusqlite, RusqliteStore};
use tracing::Level;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set the log level based on the first argument
    let args: Vec<String> = std::env::args().collect();
    let log_level = log_level_from_args(&args);

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_target(false)
        .compact()
        .with_max_level(log_level)
        .init();

    tracing::info!("Log level set to: {}", log_level);

    // Initalize dotenv so we can read .env file
    dotenv::dotenv().ok();
    let config = Config::from_env();

    // Initialize our session store as a SQLite database
    let conn = tokio_rusqlite::Connection::open(&config.sessions_db_path).await?;
    let session_store = RusqliteStore::new(conn);
    session_store.migrate().await?;

    // Start a task to delete expired sessions every 60 seconds
    let deletion_task = tokio::task::spawn(
        session_store
            .clone()
            .continuously_delete_expired(tokio::time::Duration::from_secs(60)),
    );

    // Create session layer with some configuration
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(false)
        .with_expiry(Expiry::OnInactivity(Duration::days(1)))
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/");

    // Initialize CORS layer
    let cors = CorsLayer::new()
        .allow_credentials(true)
        .allow_origin(config.frontend_url.parse::<HeaderValue>()?)
        .allow_methods(vec![Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers(vec![ACCESS_CONTROL_ALLOW_CREDENTIALS, CONTENT_TYPE, COOKIE]);

    // Open the database and make sure the mocked market exists
    let pool = DatabasePool::open(&config.database_path)?;
    let seeded = market::seed(&pool)?;
    tracing::info!(
        "Database ready at {} ({} instruments seeded)",
        config.database_path,
        seeded
    );

    let state = AppState::new(Arc::new(pool), config.demo_user.clone());

    // Build application with routes
    let router = app(state)
        // Session, CORS, and tracing layers
        .layer(session_layer)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        );

    // Run server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("Listening on: {}", listener.local_addr()?);
    axum::serve(listener, router).await?;

    deletion_task.await??;

    Ok(())
}
