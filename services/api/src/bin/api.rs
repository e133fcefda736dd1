//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{OpenAiGenerationAdapter, PgCounterFeed, PgStore},
    config::Config,
    error::ApiError,
    web::{
        counter_ws_handler, generate_handler, health_handler, read_counter_handler,
        rest::ApiDoc, state::AppState, track_visitor_handler, update_counter_handler,
        visitor_count_handler,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::{
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderName, HeaderValue, Method,
    },
    routing::{get, post},
    Router,
};
use chrono::Duration as ChronoDuration;
use futures::StreamExt;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trashtalk_core::{
    counter::GlobalCounterService, gateway::ContentGateway, ports::CounterFeed,
    rate_limit::RateLimiter,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let store = Arc::new(PgStore::new(db_pool.clone()));
    info!("Running database migrations...");
    store
        .run_migrations()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let openai_config = OpenAIConfig::new().with_api_key(
        config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| ApiError::Internal("OPENAI_API_KEY is required".to_string()))?,
    );
    let openai_client = Client::with_config(openai_config);
    let generation_adapter = Arc::new(OpenAiGenerationAdapter::new(
        openai_client,
        config.generation_model.clone(),
    ));

    let counter = Arc::new(GlobalCounterService::new(store.clone()));
    let gateway = Arc::new(ContentGateway::new(
        generation_adapter,
        config.generation_timeout,
    ));
    let limiter = Arc::new(RateLimiter::new(
        store.clone(),
        config.rate_limit_max_requests,
        ChronoDuration::hours(config.rate_limit_window_hours),
    ));

    // --- 4. Pump the Store's Change Feed into a Broadcast Channel ---
    let (counter_updates, _) = broadcast::channel(64);
    tokio::spawn(pump_change_feed(
        PgCounterFeed::new(db_pool.clone()),
        counter_updates.clone(),
    ));

    // --- 5. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        config: config.clone(),
        counter,
        gateway,
        visitors: store.clone(),
        limiter,
        counter_updates,
    });

    let cors = CorsLayer::new()
        .allow_origin(
            config
                .cors_allowed_origin
                .parse::<HeaderValue>()
                .map_err(|e| ApiError::Internal(format!("Invalid CORS origin: {}", e)))?,
        )
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([ACCEPT, CONTENT_TYPE, HeaderName::from_static("x-user-id")]);

    // --- 6. Create the Web Router ---
    let api_router = Router::new()
        .route("/generate", post(generate_handler))
        .route(
            "/counter",
            get(read_counter_handler).post(update_counter_handler),
        )
        .route(
            "/visitors",
            get(visitor_count_handler).post(track_visitor_handler),
        )
        .route("/health", get(health_handler))
        .route("/ws/counter", get(counter_ws_handler))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete
    // application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Forwards store change-feed observations into the broadcast channel the
/// WebSocket handlers subscribe to. Re-subscribes after any feed failure;
/// clients' polling covers whatever is missed in between.
async fn pump_change_feed(
    feed: PgCounterFeed,
    updates: broadcast::Sender<trashtalk_core::domain::CounterObservation>,
) {
    loop {
        match feed.subscribe().await {
            Ok(mut stream) => {
                info!("Subscribed to counter change feed");
                while let Some(observation) = stream.next().await {
                    // Send fails only when nobody is connected; that is fine.
                    let _ = updates.send(observation);
                }
                warn!("Counter change feed ended, re-subscribing");
            }
            Err(e) => {
                warn!("Counter change feed subscription failed: {}", e);
            }
        }
        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
    }
}
