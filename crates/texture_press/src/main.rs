use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use texture_press::config::{Config, LoggingConfig};
use texture_press::{routes, AppState};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    if logging.format == "pretty" {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    }
}

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::var("TEXTURE_PRESS_CONFIG").ok();
    let config = Config::load(config_path.as_deref())?;

    init_tracing(&config.logging);
    info!("Starting texture-press");

    let server_addr = format!("{}:{}", config.server.host, config.server.port);
    let storage = config.storage.clone();
    let metrics = config.metrics.clone();

    let state = AppState::initialize(config).await.map_err(|e| {
        error!("Failed to prepare scratch directories: {}", e);
        e
    })?;
    state.spawn_housekeeping();
    let state = web::Data::new(state);

    info!("Starting HTTP server on {}", server_addr);
    HttpServer::new(move || {
        let storage = storage.clone();
        let metrics = metrics.clone();
        App::new()
            .wrap(Cors::permissive())
            .app_data(state.clone())
            .configure(move |cfg| routes::configure(cfg, &storage, &metrics))
    })
    .bind(&server_addr)?
    .run()
    .await?;

    info!("texture-press stopped");
    Ok(())
}
