#![warn(clippy::all, clippy::pedantic)]

use std::net::SocketAddr;
use std::sync::Arc;

use actix_web::{App, HttpServer, middleware, web};
use clap::Parser;
use sitewatch_service::{CheckExecutor, Config, EventLog, EventStore, PollScheduler, RawConfig, StatusService, Target};
use tokio::sync::watch;
use tracing::{error, info};

mod cli;
mod error;
mod html;
mod routes;
mod state;

use cli::Cli;
use error::AppError;
use state::AppState;

#[actix_web::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logger::init_tracing(cli.log_level());

    let mut config = RawConfig::from_file(cli.file.as_ref())?.validate(cli.interval)?;
    if let Some(database) = cli.database {
        config.database = database;
    }

    if cli.check_config {
        println!("{config}");
        return Ok(());
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    run(config, addr).await
}

/// Run the poll scheduler and the status server until the server is told to stop
async fn run(config: Config, addr: SocketAddr) -> Result<(), AppError> {
    info!(database = %config.database, "Opening event log");
    let log = EventLog::open(&config.database).await?;
    let retired = log.retired_urls(&config.targets).await?;
    if !retired.is_empty() {
        info!(count = retired.len(), urls = ?retired, "Event log holds history for urls no longer monitored");
    }

    let store: Arc<dyn EventStore> = Arc::new(log);
    let targets: Arc<[Target]> = config.targets.into();

    let executor = Arc::new(CheckExecutor::new(config.timeout)?);
    let scheduler = PollScheduler::new(Arc::clone(&targets), config.interval, executor, Arc::clone(&store))?;

    let (stop_tx, stop_rx) = watch::channel(false);
    let monitor = tokio::spawn(async move { scheduler.run(stop_rx).await });

    let state = web::Data::new(AppState { status: StatusService::new(store), targets, interval: config.interval });

    info!(%addr, "Status server listening");
    let served = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(middleware::Logger::default())
            .configure(routes::routes)
    })
    .bind(addr)?
    .run()
    .await;

    info!("Status server stopped, stopping poll scheduler");
    let _ = stop_tx.send(true);
    if let Err(e) = monitor.await {
        error!("Poll scheduler task failed: {}", e);
    }

    served?;
    Ok(())
}
