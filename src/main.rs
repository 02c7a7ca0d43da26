mod config;
mod error;
mod handlers;
mod ingest;
mod metrics;
mod models;
mod monitor;
mod rate_limit;
mod sentry;
mod state;
mod worker;

use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::config::Args;
use crate::ingest::VitalsPipeline;
use crate::monitor::{ErrorReporter, LogSink, ReportSink};
use crate::rate_limit::RateLimiter;
use crate::sentry::{SentryDsn, SentrySink};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // parse cli arguments
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    let sink = report_sink(&args)?;
    let (reporter, report_rx) = ErrorReporter::channel(args.report_queue);
    let limiter = Arc::new(RateLimiter::new(args.rate_limit, args.rate_window()));

    let state = Arc::new(AppState {
        pipeline: VitalsPipeline::new(Arc::clone(&limiter), reporter),
        max_body_bytes: args.max_body_bytes,
        trust_forwarded_for: args.trust_forwarded_for,
    });

    // spawn the background workers
    tokio::spawn(worker::report_worker(report_rx, sink));
    tokio::spawn(rate_limit::sweeper(limiter, args.sweep_interval()));

    let app = handlers::router(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(%addr, path = handlers::VITALS_PATH, "vitals gateway listening");
    tracing::info!(
        "Rate limit: {} requests per {} seconds, swept every {} seconds",
        args.rate_limit,
        args.rate_window,
        args.sweep_interval
    );

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("vitals gateway stopped");
    Ok(())
}

fn report_sink(args: &Args) -> anyhow::Result<Arc<dyn ReportSink>> {
    if !args.sentry_enabled() {
        tracing::info!(environment = %args.environment, "Sentry disabled, error reports go to the log");
        return Ok(Arc::new(LogSink));
    }

    let dsn = args.sentry_dsn.as_deref().unwrap_or_default();
    let dsn = SentryDsn::parse(dsn)?;
    tracing::info!(store = %dsn.store_url, "forwarding error reports to Sentry");

    Ok(Arc::new(SentrySink::new(dsn, args.app_version.clone())?))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
