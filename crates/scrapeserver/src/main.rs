use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use scrapecore::TaskCatalog;
use scrapenodes::WebDriverLauncher;
use scraperuntime::{ExecutorRegistry, RuntimeConfig, ScrapeRuntime};
use scrapeserver::{AppState, ServerConfig};
use scrapestore::SqliteStore;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env();
    info!("Starting scrape server");

    let store = SqliteStore::connect(&config.database_url).await?;
    info!("Run store ready at {}", config.database_url);

    let launcher = Arc::new(WebDriverLauncher::from_config(&config.nodes));
    let mut registry = ExecutorRegistry::new();
    scrapenodes::register_all(&mut registry, launcher, &config.nodes);

    let runtime = Arc::new(ScrapeRuntime::new(
        Arc::new(TaskCatalog::standard()),
        Arc::new(registry),
        Arc::new(store),
        RuntimeConfig::default(),
    ));

    let recovered = runtime.recover_orphans().await?;
    if recovered > 0 {
        info!("Marked {} orphaned executions as failed", recovered);
    }

    let app_state = web::Data::new(AppState {
        runtime: runtime.clone(),
    });

    info!("Server starting on http://{}", config.bind_address);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(app_state.clone())
            .wrap(cors)
            .wrap(actix_web::middleware::Logger::default())
            .configure(scrapeserver::configure)
    })
    .bind(&config.bind_address)?
    .run()
    .await?;

    runtime.shutdown().await;
    Ok(())
}
