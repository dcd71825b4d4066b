use actix_web::{middleware::Compress, App, HttpServer};
use actix_cors::Cors;
use utoipa_swagger_ui::SwaggerUi;

use dialectica::backend::HttpEngagementBackend;
use dialectica::config::{validate_env, AppConfig};
use dialectica::openapi::ApiDoc;
use dialectica::rate_limit::{InMemoryRateLimiter, RateLimiterFacade};
use dialectica::sessions::FeedSessions;
use dialectica::registry::HttpRegistry;
use dialectica::storage::ArweaveGateway;
use dialectica::{config, AppState, FeedDeps};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::EnvFilter;
use tracing_actix_web::TracingLogger;
use utoipa::OpenApi; // bring trait into scope for ApiDoc::openapi()

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env automatically only in debug builds.
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    let problems = validate_env();
    if !problems.is_empty() {
        for p in &problems {
            eprintln!("{p}");
        }
        eprintln!("Please copy .env.example to .env and configure it");
        std::process::exit(1);
    }

    // Structured logging initialisation
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    info!("Bootstrapping Dialectica feed server");
    let cfg = AppConfig::from_env();
    info!(gateway = %cfg.gateway_url, registry = %cfg.registry_url, engagement = %cfg.engagement_url, "upstreams");
    info!(app_name = %cfg.feed.app_name, page_size = cfg.feed.page_size, "feed configuration");

    let gateway = Arc::new(ArweaveGateway::new(&cfg.gateway_url, cfg.http_timeout)?);
    let deps = FeedDeps {
        registry: Arc::new(HttpRegistry::new(&cfg.registry_url, cfg.http_timeout)?),
        index: gateway.clone(),
        store: gateway,
        backend: Arc::new(HttpEngagementBackend::new(&cfg.engagement_url, cfg.http_timeout)?),
    };

    let mut state = AppState::new(deps, cfg.feed.clone());
    state.feeds = FeedSessions::new(cfg.session_ttl);
    state.rate_limiter = Some(RateLimiterFacade::new(
        InMemoryRateLimiter::new(cfg.rate_limit_enabled),
        cfg.rate_limits.clone(),
    ));
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => state.metrics = Some(handle),
        Err(e) => warn!("metrics recorder not installed: {e}"),
    }

    // sweep abandoned sessions; lookups already ignore expired ones
    let sessions = state.feeds.clone();
    actix_web::rt::spawn(async move {
        let mut tick = tokio::time::interval(sessions.ttl());
        loop {
            tick.tick().await;
            let purged = sessions.purge_expired();
            if purged > 0 {
                debug!(purged, remaining = sessions.len(), "expired feed sessions dropped");
            }
        }
    });

    let openapi = ApiDoc::openapi();
    let frontend_url = cfg.frontend_url.clone();
    let data = actix_web::web::Data::new(state);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            // local Vite dev server
            .allowed_origin("http://localhost:5173")
            .allowed_origin("http://127.0.0.1:5173")
            .allowed_origin(&frontend_url)
            .allow_any_header()
            .allowed_methods(["GET", "POST", "DELETE", "OPTIONS"])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(TracingLogger::default())
            .wrap(Compress::default())
            .wrap(cors)
            .app_data(data.clone())
            .configure(config)
            .service(SwaggerUi::new("/docs/{_:.*}").url("/docs/openapi.json", openapi.clone()))
    })
    .bind(&cfg.bind_addr)?;

    info!("Listening on http://{}", cfg.bind_addr);
    server.run().await?;
    Ok(())
}
