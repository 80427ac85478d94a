use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use clap::Parser;
use solace::api::middleware::RequireIdentity;
use solace::api::AppState;
use solace::auth::{AuthService, LocalStore};
use solace::cli::{commands::{Cli, Commands}, run_cli};
use solace::config::AppConfig;
use solace::emotion::{EmotionDetector, HttpEmotionDetector};
use solace::llm::ProviderFactory;
use solace::responder::LlmResponder;
use solace::store::build_store;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({"status": "healthy"}))
}

async fn index() -> impl Responder {
    let html = include_str!("../static/index.html");
    HttpResponse::Ok().content_type("text/html").body(html)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if !matches!(cli.command, Commands::Serve) {
        if let Err(e) = run_cli(cli.command, cli.config).await {
            error!("{:#}", e);
            std::process::exit(1);
        }
        return Ok(());
    }

    info!("Starting Solace session server...");

    let config = match AppConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let store = match build_store(&config) {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to initialize session store: {}", e);
            std::process::exit(1);
        }
    };

    let llm_provider = match ProviderFactory::create_default(&config.llm) {
        Some(p) => p,
        None => {
            error!("Unknown LLM provider '{}' in configuration", config.llm.provider);
            std::process::exit(1);
        }
    };

    let identity = match LocalStore::open(&config.auth.identity_path) {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to open identity store: {}", e);
            std::process::exit(1);
        }
    };

    let detector = config.detector.url.clone().map(|url| {
        info!("Emotion detection via {}", url);
        Arc::new(HttpEmotionDetector::new(url)) as Arc<dyn EmotionDetector>
    });

    let auth = Arc::new(AuthService::new(
        Arc::new(identity),
        Duration::from_millis(config.auth.delay_ms),
    ));
    actix_web::rt::spawn({
        let auth = auth.clone();
        async move {
            auth.restore().await;
        }
    });

    let state = web::Data::new(AppState::new(
        auth,
        store,
        Arc::new(LlmResponder::new(llm_provider, &config.session)),
        detector,
        config.session.clone(),
    ));

    let host = config.server.host.clone();
    let port = config.server.port;

    info!("Server listening on {}:{}", host, port);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .route("/", web::get().to(index))
            .route("/health", web::get().to(health))
            .wrap(RequireIdentity)
            .configure(solace::api::routes::configure)
            .configure(solace::api::websocket::configure)
    })
    .bind((host, port))?
    .run()
    .await
}
