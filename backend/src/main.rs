pub mod config;
pub mod event_logger;
pub mod form;
pub mod inference;
pub mod models;
pub mod routes;
pub mod tracking;

use actix_cors::Cors;
use actix_files::Files;
use actix_web::middleware::{DefaultHeaders, Logger};
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use log::{error, info};

use config::AppConfig;
use event_logger::EventLogger;
use inference::InferenceAdapter;
use routes::AppState;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .format_module_path(false)
        .init();

    info!("Starting motorbike price predictor");
    let config = AppConfig::from_env();

    let adapter = match InferenceAdapter::load(&config.model_path) {
        Ok(adapter) => {
            let info = adapter.model_info();
            info!("Model {} loaded ({})", info.name, info.format);
            adapter
        }
        Err(e) => {
            error!("Could not load model: {}", e);
            return Err(e).with_context(|| {
                format!("loading model from {}", config.model_path.display())
            });
        }
    };

    let events = match EventLogger::new(config.tracking.clone(), &config.model_path) {
        Ok(events) => {
            info!(
                "Tracking to {} (experiment {:?}, id {})",
                config.tracking.tracking_uri,
                events.experiment().name,
                events.experiment().experiment_id
            );
            events
        }
        Err(e) => {
            error!("Could not open tracking store: {}", e);
            return Err(e).with_context(|| {
                format!("opening tracking store at {}", config.tracking.tracking_uri)
            });
        }
    };

    let state = web::Data::new(AppState::new(adapter, events, &config.static_dir));
    let bind_address = config.bind_address();
    let static_dir = config.static_dir.clone();
    let cors_origins = config.cors_origins.clone();

    info!("Listening on http://{}", bind_address);
    info!("Workers: {}", config.workers);
    info!("   GET  /api/health      - liveness");
    info!("   GET  /api/model-info  - loaded model");
    info!("   GET  /api/form        - form controls and defaults");
    info!("   POST /api/predict     - single prediction");

    HttpServer::new(move || {
        let cors = cors_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allowed_methods(vec!["GET", "POST"])
            .allowed_headers(vec![actix_web::http::header::CONTENT_TYPE])
            .max_age(3600);

        App::new()
            .wrap(Logger::default())
            .wrap(DefaultHeaders::new().add(("X-Content-Type-Options", "nosniff")))
            .wrap(cors)
            .app_data(state.clone())
            .configure(routes::configure)
            .route("/", web::get().to(routes::index))
            .service(Files::new("/static", &static_dir).prefer_utf8(true))
            .default_service(web::route().to(routes::not_found))
    })
    .workers(config.workers)
    .bind(&bind_address)
    .with_context(|| format!("binding {bind_address}"))?
    .run()
    .await
    .context("server terminated")
}
