use std::{process, sync::Arc};

use apalis::prelude::{Monitor, WorkerBuilder, WorkerFactoryFn};
use apalis_cron::CronStream;
use igdb_cache::{
    application::{
        error::AppError,
        igdb_cache::IgdbCacheService,
        jobs::{PurgeExpiredContext, parse_purge_schedule, process_purge_expired_job},
        repos::CacheEntriesRepo,
        upstream::IgdbUpstream,
    },
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState},
        igdb::IgdbClient,
        telemetry,
    },
};
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
        config::Command::PurgeExpired(_) => run_purge_expired(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let cache = Arc::new(build_cache_service(repositories, &settings)?);

    let monitor_handle = settings
        .housekeeping
        .enabled
        .then(|| spawn_housekeeping(cache.clone(), &settings.housekeeping))
        .transpose()?;

    let state = HttpState {
        cache,
        ttl: settings.cache.ttl,
    };
    let result = serve_http(&settings, state).await;

    if let Some(handle) = monitor_handle {
        handle.abort();
        let _ = handle.await;
    }

    result
}

async fn run_purge_expired(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let cache = build_cache_service(repositories, &settings)?;

    let removed = cache
        .purge_expired()
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    info!(
        target: "igdb_cache::purge",
        removed,
        "Purged expired cache entries"
    );
    Ok(())
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_cache_service(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> Result<IgdbCacheService, AppError> {
    let client = IgdbClient::new(&settings.igdb).map_err(AppError::from)?;
    if !client.has_credentials() {
        warn!(
            target: "igdb_cache::igdb",
            "IGDB credentials are not configured; cache misses will fail until they are"
        );
    }

    let entries: Arc<dyn CacheEntriesRepo> = repositories;
    let upstream: Arc<dyn IgdbUpstream> = Arc::new(client);

    Ok(IgdbCacheService::new(entries, upstream)
        .with_miss_coalescing(settings.cache.coalesce_misses))
}

fn spawn_housekeeping(
    cache: Arc<IgdbCacheService>,
    housekeeping: &config::HousekeepingSettings,
) -> Result<tokio::task::JoinHandle<()>, AppError> {
    let schedule = parse_purge_schedule(&housekeeping.schedule).map_err(|reason| {
        AppError::from(InfraError::configuration(format!(
            "invalid housekeeping schedule: {reason}"
        )))
    })?;

    let purge_worker = WorkerBuilder::new("purge-expired-worker")
        .data(PurgeExpiredContext { cache })
        .backend(CronStream::new(schedule))
        .build_fn(process_purge_expired_job);

    let monitor = Monitor::new().register(purge_worker);

    Ok(tokio::spawn(async move {
        if let Err(err) = monitor.run().await {
            error!(error = %err, "housekeeping monitor stopped");
        }
    }))
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.public_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target: "igdb_cache::http",
        addr = %settings.server.public_addr,
        "Listening"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!(target: "igdb_cache::http", "Shutdown signal received");
}
