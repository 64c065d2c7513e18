mod api;
mod bucket;
mod config;
mod db;
mod deals;
mod dispatch;
mod error;
mod events;
mod keepa;
mod scheduler;
mod search;
mod types;

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use api::HealthState;
use bucket::TokenBucket;
use config::Config;
use deals::DealPipeline;
use dispatch::AlertDispatcher;
use error::Result;
use events::{DealConsumer, EventLogProducer, PriceConsumer};
use keepa::KeepaClient;
use scheduler::Scheduler;
use search::SearchIndexClient;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("configuration error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("fatal startup error: {e}");
        std::process::exit(1);
    }
}

/// The one-time startup sequence (§4.8): open the database and apply
/// migrations, seed the system user, build the upstream client and its
/// token bucket, connect the event log and search index, spawn every
/// long-running task, then serve the ops surface until shutdown.
async fn run(cfg: Config) -> Result<()> {
    let health = Arc::new(HealthState::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    info!("opening database pool and applying migrations");
    let pool = db::pool::init(&cfg.database_url).await?;
    health.set_db_reachable(true);

    db::users::ensure_system_user(&pool).await?;
    let backfilled = db::history::backfill_price_history_from_deals(&pool).await?;
    if backfilled > 0 {
        info!(backfilled, "seeded price history from prior deal collections");
    }

    let bucket = Arc::new(TokenBucket::new(cfg.tokens_capacity, cfg.tokens_per_minute));
    let client = Arc::new(KeepaClient::new(&cfg, Arc::clone(&bucket))?);

    info!("connecting to event log");
    let producer = Arc::new(EventLogProducer::new(&cfg.event_log_brokers)?);
    match producer.ping(config::topics::PRICE_UPDATES).await {
        Ok(()) => health.set_event_log_connected(true),
        Err(e) => warn!("event log connectivity check failed, continuing degraded: {e}"),
    }

    info!("connecting to search index");
    let search = Arc::new(SearchIndexClient::new(&cfg.search_index_url)?);
    match search.ensure_indices().await {
        Ok(()) => health.set_search_index_reachable(true),
        Err(e) => warn!("search index unavailable at startup, continuing degraded: {e}"),
    }

    let dispatcher = Arc::new(AlertDispatcher::new(pool.clone()));

    let price_consumer = PriceConsumer::new(&cfg.event_log_brokers, pool.clone())?;
    let deal_consumer = DealConsumer::new(&cfg.event_log_brokers, pool.clone())?;
    let deal_pipeline = DealPipeline::new(
        &cfg,
        pool.clone(),
        Arc::clone(&client),
        Arc::clone(&producer),
        Arc::clone(&search),
    );
    let scheduler = Scheduler::new(
        cfg.clone(),
        pool.clone(),
        Arc::clone(&client),
        Arc::clone(&producer),
        Arc::clone(&search),
        Arc::clone(&dispatcher),
    );

    let mut tasks = tokio::task::JoinSet::new();
    tasks.spawn(price_consumer.run(shutdown_rx.clone()));
    tasks.spawn(deal_consumer.run(shutdown_rx.clone()));
    tasks.spawn(deal_pipeline.run(shutdown_rx.clone()));
    tasks.spawn(scheduler.run(shutdown_rx.clone()));

    health.set_startup_complete(true);
    info!("startup sequence complete");

    let api_state = api::ApiState { health: Arc::clone(&health) };
    let app = api::router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(error::AppError::Io)?;

    info!("ops surface listening on {bind_addr}");
    let serve = axum::serve(listener, app);

    tokio::select! {
        result = serve => {
            if let Err(e) = result {
                error!("ops surface server error: {e}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    shutdown(shutdown_tx, tasks).await;
    Ok(())
}

/// Signals every long-running task to stop and waits up to
/// `SHUTDOWN_DEADLINE_SECS` for them to drain (§5). Tasks still running past
/// the deadline are abandoned rather than blocking process exit.
async fn shutdown(shutdown_tx: watch::Sender<bool>, mut tasks: tokio::task::JoinSet<()>) {
    info!("beginning graceful shutdown");
    let _ = shutdown_tx.send(true);

    let deadline = tokio::time::sleep(std::time::Duration::from_secs(config::SHUTDOWN_DEADLINE_SECS));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => {
                warn!("shutdown deadline reached with tasks still running, aborting remainder");
                tasks.shutdown().await;
                break;
            }
            next = tasks.join_next() => {
                match next {
                    Some(_) => continue,
                    None => break,
                }
            }
        }
    }
    info!("shutdown complete");
}
