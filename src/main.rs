use std::{process, sync::Arc, time::Duration};

use pockets::{
    application::error::AppError,
    cache::{
        CacheBackend, CacheConfig, Clock, LinkCacheStore, MemoryStore, RedisStore, Revalidator,
        SystemClock,
    },
    config,
    infra::{
        app::{AppParts, build_application_context},
        error::InfraError,
        http::{self, RouterState},
        telemetry,
    },
    upstream::{LinkSource, ListQuery, SiloClient, UpstreamConfig},
};
use tokio::task::JoinHandle;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let cache_config = CacheConfig::from(&settings.cache);
    let store = init_store(&cache_config, clock.clone()).await;

    let source: Arc<dyn LinkSource> = Arc::new(
        SiloClient::new(UpstreamConfig::from(&settings.upstream)).map_err(InfraError::from)?,
    );

    let app = build_application_context(AppParts {
        source,
        store,
        clock,
        cache: cache_config.clone(),
        site: settings.site.clone(),
        admin_pin: settings.admin.pin.clone(),
        metadata_timeout: settings.upstream.timeout,
    })?;

    // Fill the link cache before the first request arrives
    let warm_query = app.listing.cache_query();
    let _ = app.revalidator.trigger_refresh(warm_query.clone());

    let refresh_handle = cache_config
        .refresh_interval
        .map(|period| spawn_refresh_loop(app.revalidator.clone(), warm_query, period));

    let result = serve_http(&settings, app.state).await;

    if let Some(handle) = refresh_handle {
        handle.abort();
        let _ = handle.await;
    }

    result
}

/// Redis when configured and reachable, otherwise process memory.
async fn init_store(config: &CacheConfig, clock: Arc<dyn Clock>) -> Arc<dyn LinkCacheStore> {
    let memory = |clock: Arc<dyn Clock>| -> Arc<dyn LinkCacheStore> {
        Arc::new(MemoryStore::new(config.policy(), clock))
    };

    match (config.backend, config.redis_url.as_deref()) {
        (CacheBackend::Redis, Some(url)) => {
            match RedisStore::connect(url, config.redis_key.clone(), config.policy(), clock.clone())
                .await
            {
                Ok(store) => {
                    info!(target = "pockets::cache", key = %config.redis_key, "Using Redis link cache");
                    let store: Arc<dyn LinkCacheStore> = Arc::new(store);
                    store
                }
                Err(err) => {
                    warn!(
                        target = "pockets::cache",
                        error = %err,
                        "Redis unavailable, falling back to in-memory link cache"
                    );
                    memory(clock)
                }
            }
        }
        (CacheBackend::Redis, None) => {
            warn!(
                target = "pockets::cache",
                "Redis backend selected without a redis_url, using in-memory link cache"
            );
            memory(clock)
        }
        (CacheBackend::Memory, _) => memory(clock),
    }
}

fn spawn_refresh_loop(
    revalidator: Revalidator,
    query: ListQuery,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.tick().await; // Skip the first immediate tick
        loop {
            interval.tick().await;
            let _ = revalidator.trigger_refresh(query.clone());
        }
    })
}

async fn serve_http(settings: &config::Settings, state: RouterState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "pockets::http",
        addr = %settings.server.addr,
        "Listening"
    );

    let grace = settings.server.graceful_shutdown;
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal(grace))
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal(grace: Duration) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!(
        target = "pockets::http",
        grace_seconds = grace.as_secs(),
        "Shutdown requested, draining connections"
    );
    // Force exit if in-flight requests outlive the grace period
    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        warn!(target = "pockets::http", "Graceful shutdown timed out");
        process::exit(1);
    });
}
