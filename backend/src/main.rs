mod config;
mod error;
mod inference;
mod routes;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use config::AppConfig;
use routes::{AppState, configure_routes};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::load().map_err(|e| {
        log::error!("Invalid configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    // A failed load still serves `/health`; `/predict` answers 503.
    let classifier = match inference::load_classifier(&config.model) {
        Ok(classifier) => {
            log::info!("Model loaded successfully ({})", classifier.variant());
            Some(classifier)
        }
        Err(e) => {
            log::error!("Failed to load model: {}", e);
            None
        }
    };

    let state = AppState {
        classifier,
        max_upload_bytes: config.server.max_upload_bytes,
    };
    let cors_origins = config.server.cors_origins.clone();
    let bind_address = config.bind_address();

    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        let cors = cors_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allow_any_method()
            .allow_any_header()
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(web::Data::new(state.clone()))
            .configure(configure_routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}
