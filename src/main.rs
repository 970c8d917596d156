use actix_cors::Cors;
use actix_web::{error, http::StatusCode, middleware, web, App, HttpResponse, HttpServer};
use amora::config::Settings;
use amora::core::{CandidateSelector, IntakeMachine, MatchEngine, PhotoAggregator};
use amora::routes::events::AppState;
use amora::services::{
    BotChannel, Delivery, DirectoryClient, MediaClient, NominatimClient, ObjectStore,
    ProfileDirectory, RatingClient, RedisStore, SessionStore,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// JSON error response for JSON payload errors
#[derive(Debug, serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for JsonError {}

impl error::ResponseError for JsonError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_REQUEST))
            .content_type("application/json")
            .body(serde_json::to_string(self).unwrap())
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    JsonError {
        error: "invalid_json".to_string(),
        message: format!("Invalid JSON: {}", err),
        status_code: 400,
    }
    .into()
}

/// Handle query payload errors
pub fn handle_query_payload_error(err: error::QueryPayloadError, _req: &actix_web::HttpRequest) -> actix_web::Error {
    JsonError {
        error: "invalid_query".to_string(),
        message: format!("Invalid query: {}", err),
        status_code: 400,
    }
    .into()
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    // Initialize logging
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true);

    if log_format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.init();
    }

    info!("Starting Amora core service...");

    // Load configuration
    let settings = Settings::load().unwrap_or_else(|e| {
        error!("Failed to load configuration: {}", e);
        panic!("Configuration error: {}", e);
    });

    info!("Configuration loaded successfully");

    // Initialize the session store (required - all state lives here)
    let store: Arc<dyn SessionStore> = Arc::new(
        RedisStore::new(&settings.store.redis_url)
            .await
            .unwrap_or_else(|e| {
                error!("Failed to connect to Redis: {}", e);
                panic!("Redis connection error: {}", e);
            }),
    );

    info!("Session store initialized");

    // Initialize external collaborator clients (one pooled client each)
    let directory: Arc<dyn ProfileDirectory> = Arc::new(DirectoryClient::new(
        settings.directory.base_url.clone(),
        settings.intake.profile_cache_size,
        settings.intake.profile_cache_ttl_secs,
    ));
    let media: Arc<dyn ObjectStore> = Arc::new(MediaClient::new(settings.media.base_url.clone()));
    let geocoder = Arc::new(NominatimClient::new(settings.geocoder.base_url.clone()));
    let scoring = Arc::new(RatingClient::new(settings.scoring.base_url.clone()));
    let delivery: Arc<dyn Delivery> = Arc::new(BotChannel::new(settings.delivery.base_url.clone()));

    info!("Collaborator clients initialized");

    // Photo aggregator with its batch event channel
    let quiet_period = Duration::from_millis(settings.intake.quiet_period_ms);
    let (aggregator, mut batch_events) = PhotoAggregator::new(
        delivery.clone(),
        media.clone(),
        settings.media.bucket.clone(),
        quiet_period,
    );

    let intake = Arc::new(IntakeMachine::new(
        store.clone(),
        directory.clone(),
        geocoder,
        scoring,
        media.clone(),
        delivery.clone(),
        aggregator,
        settings.media.bucket.clone(),
    ));

    // Pump finalized photo batches back into the intake flow
    {
        let intake = intake.clone();
        tokio::spawn(async move {
            while let Some(event) = batch_events.recv().await {
                let owner = event.owner_id.clone();
                if let Err(e) = intake.complete_batch(event).await {
                    tracing::warn!("Batch completion for user {} failed: {}", owner, e);
                }
            }
        });
    }

    let selector = Arc::new(CandidateSelector::new(directory.clone(), store.clone()));
    let engine = Arc::new(MatchEngine::new(
        store.clone(),
        directory.clone(),
        delivery.clone(),
    ));

    info!(
        "Core engines initialized (photo quiet period: {}ms)",
        settings.intake.quiet_period_ms
    );

    // Build application state
    let app_state = AppState {
        intake,
        selector,
        engine,
        store,
        directory,
        media,
        delivery,
        photo_bucket: settings.media.bucket.clone(),
    };

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .app_data(web::QueryConfig::default().error_handler(handle_query_payload_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(amora::routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
