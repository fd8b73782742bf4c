//! backlogd — the backlog autoscaler daemon.
//!
//! Assembles the subsystems into one process:
//! - Resque backlog sampler (Redis)
//! - Render fleet client
//! - Decision loop + actuation task
//!
//! # Usage
//!
//! ```text
//! WORKER_SERVICE_ID=srv-xxxx RENDER_API_KEY=rnd_xxxx REDIS_ADDRESS=redis:6379 backlogd
//! backlogd --check-config
//! ```

use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use backlog_autoscale::Controller;
use backlog_render::RenderClient;
use backlog_resque::ResqueSampler;

mod config;

use config::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let scaler_config = cli.scaler_config()?;

    if cli.check_config {
        println!("{}", cli.summary());
        return Ok(());
    }

    info!(
        service = %cli.worker_service_id,
        render_api = %cli.render_api_url,
        redis = %cli.redis_address,
        namespace = %cli.resque_namespace,
        redis_auth = cli.redis_password.is_some(),
        scale_up_delay = %humantime::format_duration(scaler_config.scale_up_delay),
        scale_down_delay = %humantime::format_duration(scaler_config.scale_down_delay),
        "backlogd starting"
    );

    // ── Initialize subsystems ──────────────────────────────────

    let mut sampler = ResqueSampler::new(cli.resque_config());
    if sampler.ping().await {
        info!(addr = %cli.redis_address, "redis reachable");
    } else {
        warn!(
            addr = %cli.redis_address,
            "redis not reachable, backlog will read as zero until it is"
        );
    }

    let fleet = Arc::new(RenderClient::new(cli.render_config())?);
    info!(api = %cli.render_api_url, "render client initialized");

    let controller = Controller::new(scaler_config, sampler, fleet);

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl-C handler, running until killed");
            std::future::pending::<()>().await;
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    controller.run_until(shutdown_rx).await;

    info!("backlogd stopped");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,backlogd=debug,backlog=debug"));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
