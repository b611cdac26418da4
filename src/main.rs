use anyhow::Result;
use clap::Parser;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use audit_engine::{
    config::Config,
    database::{
        Database,
        repositories::{
            JobSeaOrmRepository, MonitoringConfigSeaOrmRepository, MonitoringRunSeaOrmRepository,
            ThresholdAlertSeaOrmRepository,
        },
    },
    events::EventBroadcaster,
    job_engine::{AllowAllAuthorizer, JobScheduler, NoopExecutor, QueueProcessor},
    monitoring::{FixedScoreAuditor, RecurringMonitor},
    web::{AppState, serve},
};

#[derive(Parser)]
#[command(name = "audit-engine")]
#[command(version)]
#[command(about = "Background audit scheduling and monitoring engine")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Listening IP address
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Database URL (overrides config file)
    #[arg(short = 'd', long, value_name = "URL")]
    database_url: Option<String>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = Config::load_from_file(&cli.config)?;
    if let Some(host) = cli.host {
        config.web.host = host;
    }
    if let Some(port) = cli.port {
        config.web.port = port;
    }
    if let Some(url) = cli.database_url {
        config.database.url = url;
    }

    let database = Database::new(&config.database).await?;
    database.migrate().await?;

    let connection = database.connection();
    let broadcaster = Arc::new(EventBroadcaster::new(config.events.buffer_size));

    let job_repository = JobSeaOrmRepository::new(connection.clone());
    let scheduler = Arc::new(JobScheduler::new(
        job_repository.clone(),
        Arc::new(AllowAllAuthorizer),
        broadcaster.clone(),
        config.jobs.clone(),
    ));
    let processor = Arc::new(QueueProcessor::new(
        job_repository,
        Arc::new(NoopExecutor),
        broadcaster.clone(),
        &config.jobs,
    )?);
    let monitor = Arc::new(RecurringMonitor::new(
        MonitoringConfigSeaOrmRepository::new(connection.clone()),
        MonitoringRunSeaOrmRepository::new(connection.clone()),
        ThresholdAlertSeaOrmRepository::new(connection.clone()),
        Arc::new(FixedScoreAuditor::new(HashMap::new())),
        broadcaster.clone(),
        &config.monitoring,
    )?);

    let shutdown = CancellationToken::new();

    let processor_task = {
        let processor = processor.clone();
        let token = shutdown.clone();
        tokio::spawn(async move { processor.run(token).await })
    };
    let monitor_task = {
        let monitor = monitor.clone();
        let token = shutdown.clone();
        tokio::spawn(async move { monitor.run(token).await })
    };

    let state = AppState {
        database,
        scheduler,
        processor,
        monitor,
        broadcaster,
    };

    let ctrl_c_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            ctrl_c_token.cancel();
        }
    });

    serve(state, &config.web.host, config.web.port, shutdown.clone()).await?;

    shutdown.cancel();
    let _ = processor_task.await;
    let _ = monitor_task.await;
    info!("audit engine stopped");
    Ok(())
}
