use airmon_service::config::Config;
use airmon_service::db::PgReadingStore;
use airmon_service::ingest::iqair::IqAirClient;
use airmon_service::ingest::job::IngestionTask;
use airmon_service::location::PARIS;
use airmon_service::logging::{self, DataSource};
use airmon_service::scheduler::Scheduler;
use airmon_service::service::QueryService;
use airmon_service::web::{self, AppState};
use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init_logger(config.log_level, config.log_file.as_deref(), true) {
        eprintln!("Failed to open log file: {}", e);
        return ExitCode::FAILURE;
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            logging::error(DataSource::System, None, &error_chain(e.as_ref()));
            ExitCode::FAILURE
        }
    }
}

/// "outer: inner: innermost"
fn error_chain(err: &dyn Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(&format!(": {}", cause));
        source = cause.source();
    }
    message
}

async fn run(config: Config) -> Result<(), Box<dyn Error>> {
    if !PARIS.coordinate().is_on_earth() {
        return Err(format!("monitored location '{}' is not a WGS84 point", PARIS.name).into());
    }
    logging::info(
        DataSource::Scheduler,
        Some(PARIS.name),
        &format!("Monitoring {}", PARIS.description),
    );

    let store = PgReadingStore::connect(&config.database).await?;
    store.ensure_schema().await?;
    let store = Arc::new(store);

    let provider = Arc::new(IqAirClient::new(&config.provider)?);

    let shutdown = CancellationToken::new();
    let ingestion = Arc::new(IngestionTask::new(provider.clone(), store.clone(), &PARIS));
    let scheduler = Scheduler::every_minute().overlap(config.overlap).spawn(
        move || {
            let ingestion = ingestion.clone();
            async move { ingestion.run_logged().await }
        },
        shutdown.clone(),
    );

    let app = web::router(AppState {
        query: QueryService::new(provider, store),
    });
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    logging::info(DataSource::Http, None, &format!("Listening on port {}", config.port));

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            logging::info(DataSource::System, None, "got SIGINT, shutting down");
            signal.cancel();
        })
        .await?;

    shutdown.cancel();
    let _ = scheduler.await;
    logging::info(DataSource::System, None, "shut down");
    Ok(())
}
