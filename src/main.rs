use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use blog_api::{api, AppState, Settings};
use dotenv::dotenv;
use std::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn cors(settings: &Settings) -> Cors {
    if !settings.cors.enabled {
        return Cors::default();
    }

    let cors = if settings.cors.allow_any_origin {
        Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .expose_any_header()
    } else {
        Cors::default()
            .allowed_origin("http://localhost:3000")
            .allowed_origin("http://127.0.0.1:3000")
            .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE"])
            .allowed_headers(vec!["Authorization", "Content-Type"])
            .expose_headers(vec!["Authorization"])
    };

    cors.max_age(settings.cors.max_age as usize)
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    let config = Settings::new().context("Failed to load configuration")?;
    info!("Configuration loaded ({} environment)", config.environment);

    let state = AppState::new(config.clone())
        .await
        .context("Failed to initialize application state")?;
    info!("Session store backend: {}", state.sessions.backend());

    let sweeper = state.start_sweeper();
    let data = web::Data::new(state.clone());

    let address = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&address)
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("Starting server at http://{}", address);

    let server_config = config.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(cors(&server_config))
            .app_data(data.clone())
            .configure(api::configure)
    })
    .listen(listener)?
    .workers(config.server.workers as usize)
    .run()
    .await
    .context("Server terminated with an error")?;

    info!("Shutting down");
    sweeper.abort();
    state.shutdown().await?;

    Ok(())
}
