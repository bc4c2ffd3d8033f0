use gridbot::{
    aemo::{AemoClient, poller::run_aemo_poller},
    config::AppConfig,
    logger::init_tracing,
    mastodon::{DryRunPublisher, MastodonClient, MastodonPublisher, Outbox, PublishError},
    metrics::Counters,
    region::{RegionOrchestrator, RegionRegistry, WorkerSettings},
};
use tokio::sync::watch;

/// Spawns one worker per configured region, wired to the right publisher.
///
/// Test mode never opens a Mastodon connection.
fn start_orchestrator(cfg: &AppConfig, counters: Counters) -> anyhow::Result<RegionOrchestrator> {
    let registry = RegionRegistry::from_config(cfg);
    let settings = WorkerSettings::from_config(cfg);

    if cfg.test_mode {
        let outbox = Outbox::new();
        return Ok(RegionOrchestrator::spawn(registry, settings, counters, |entry| {
            DryRunPublisher::new(entry.region, outbox.clone())
        }));
    }

    let server = cfg
        .mastodon_server
        .clone()
        .ok_or(PublishError::NotConfigured)?;
    let client = MastodonClient::new(server)?;

    Ok(RegionOrchestrator::spawn(registry, settings, counters, |entry| {
        MastodonPublisher::new(client.clone(), entry.credentials.clone())
    }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let is_production = std::env::var("APP_ENV").unwrap_or_default() == "production";
    init_tracing(is_production);

    tracing::info!("Starting gridbot...");

    let cfg = AppConfig::from_env()?;

    let counters = Counters::default();
    let orchestrator = start_orchestrator(&cfg, counters.clone())?;

    let regions: Vec<&str> = orchestrator
        .registry()
        .entries()
        .map(|e| e.region.as_str())
        .collect();
    tracing::info!(?regions, test_mode = cfg.test_mode, "regions configured");

    let client = AemoClient::new(cfg.aemo_host.clone())?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let poller = run_aemo_poller(client, &orchestrator, cfg.poll_interval, shutdown_rx);
    let signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = ?e, "failed to listen for shutdown signal");
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    };

    let (polled, ()) = tokio::join!(poller, signal);
    if let Err(e) = polled {
        tracing::error!(error = ?e, "aemo poller failed");
    }

    orchestrator.shutdown().await;

    tracing::info!(
        cycles = Counters::get(&counters.poll_cycles),
        poll_failures = Counters::get(&counters.poll_failures),
        notifications = Counters::get(&counters.notifications_emitted),
        dispatched = Counters::get(&counters.dispatch_succeeded),
        dispatch_failed = Counters::get(&counters.dispatch_failed),
        dispatch_dropped = Counters::get(&counters.dispatch_dropped),
        "gridbot stopped"
    );

    Ok(())
}
