use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use shelter_match::config::{Settings, StorageBackend};
use shelter_match::core::RankingPipeline;
use shelter_match::routes::{self, handle_json_payload_error, handle_path_error, handle_query_payload_error, AppState};
use shelter_match::services::{DirectoryCache, InMemoryOccupancyStore, OccupancyStore, PgOccupancyStore};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn startup_error(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    error!("{}: {}", context, err);
    std::io::Error::new(std::io::ErrorKind::Other, format!("{}: {}", context, err))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    // Initialize logging
    let log_level = std::env::var("LOG_LEVEL")
        .or_else(|_| std::env::var("SHELTER__LOGGING__LEVEL"))
        .unwrap_or_else(|_| "info".to_string());
    let log_format = std::env::var("LOG_FORMAT")
        .or_else(|_| std::env::var("SHELTER__LOGGING__FORMAT"))
        .unwrap_or_else(|_| "json".to_string());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_level(true);

    match log_format.as_str() {
        "pretty" => subscriber.pretty().init(),
        "json" => subscriber.json().init(),
        _ => subscriber.init(),
    }

    info!("Starting shelter matching service...");

    let settings = Settings::load().map_err(|e| startup_error("Failed to load configuration", e))?;

    info!("Configuration loaded successfully");

    let store: Arc<dyn OccupancyStore> = match settings.storage.backend {
        StorageBackend::Postgres => {
            let db = &settings.database;
            let store = PgOccupancyStore::from_settings(
                &db.url,
                db.max_connections,
                db.min_connections,
                db.acquire_timeout_secs,
                db.idle_timeout_secs,
            )
            .await
            .map_err(|e| startup_error("Failed to connect to PostgreSQL", e))?;

            info!(
                "PostgreSQL store initialized (max: {} connections)",
                db.max_connections.unwrap_or(10)
            );
            Arc::new(store)
        }
        StorageBackend::Memory => {
            warn!("Using in-memory store; occupancy data is lost on restart");
            Arc::new(InMemoryOccupancyStore::new())
        }
    };

    // Cache is optional; a Redis failure degrades to a process-local cache
    let cache = if settings.cache.enabled {
        let ttl = settings.cache.ttl_secs.unwrap_or(30);
        let l1_size = settings.cache.l1_cache_size.unwrap_or(1000);

        let cache = match DirectoryCache::new(settings.cache.redis_url.as_deref(), l1_size, ttl).await {
            Ok(cache) => cache,
            Err(e) => {
                warn!("Failed to connect to Redis ({}), using local cache only", e);
                DirectoryCache::local(l1_size, ttl)
            }
        };

        info!(
            "Directory cache initialized (L1: {} entries, TTL: {}s, shared: {})",
            l1_size,
            ttl,
            cache.has_shared_tier()
        );
        Some(Arc::new(cache))
    } else {
        info!("Directory cache disabled");
        None
    };

    let pipeline = RankingPipeline::new(settings.search.distance_unit);
    info!("Distances reported in {}", pipeline.unit().label());

    if settings.admin.operator_key.is_none() {
        warn!("No operator key configured; operator routes are open");
    }

    let app_state = AppState::new(store, cache, pipeline, settings.admin.operator_key.clone());

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
            .app_data(web::PathConfig::default().error_handler(handle_path_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
