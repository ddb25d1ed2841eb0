//! blescout demonstration CLI.

mod cli;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use tokio::sync::broadcast;
use tracing::info;
use uuid::Uuid;

use blescout_btleplug::BtleplugDriver;
use blescout_core::{
    AdapterState, CentralConfig, CentralService, PeripheralRecord, ServiceId, Timestamp,
};
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let driver = Arc::new(BtleplugDriver::new());
    let service = CentralService::new(driver, CentralConfig::default());
    service.request_authorization().await?;

    match cli.command {
        Commands::Scan { duration, service: services } => {
            run_scan(&service, duration, services).await
        }
        Commands::State { duration } => watch_state(&service, duration).await,
    }
}

/// Setup logging based on verbosity level
fn setup_logging(verbose: bool) {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

async fn run_scan(service: &CentralService, duration: u64, services: Vec<Uuid>) -> Result<()> {
    wait_for_ready(service).await?;

    let filter = if services.is_empty() {
        None
    } else {
        Some(services.into_iter().map(ServiceId::new).collect())
    };

    let mut collections = service.subscribe_peripherals();
    service.start_scan(filter).await;
    info!("scanning for {duration} seconds");

    let deadline = tokio::time::sleep(Duration::from_secs(duration));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            snapshot = collections.recv() => {
                match snapshot {
                    Ok(snapshot) => render(&snapshot),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            _ = &mut deadline => break,
        }
    }

    service.stop_scan().await;

    println!("\nScan finished.");
    render(&service.peripherals());
    Ok(())
}

async fn watch_state(service: &CentralService, duration: u64) -> Result<()> {
    let mut states = service.subscribe_state();
    println!("state: {}", service.current_state());

    let deadline = tokio::time::sleep(Duration::from_secs(duration));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            state = states.recv() => {
                match state {
                    Ok(state) => println!("state: {state}"),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            _ = &mut deadline => break,
        }
    }
    Ok(())
}

/// Wait until the adapter reports `Ready`, surfacing stuck states to the user.
async fn wait_for_ready(service: &CentralService) -> Result<()> {
    let mut states = service.subscribe_state();
    if service.current_state().is_ready() {
        return Ok(());
    }
    info!(state = %service.current_state(), "waiting for adapter");

    loop {
        let state = tokio::time::timeout(Duration::from_secs(5), states.recv()).await;
        match state {
            Ok(Ok(AdapterState::Ready)) => return Ok(()),
            Ok(Ok(_)) => continue,
            Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
            Ok(Err(broadcast::error::RecvError::Closed)) => bail!("state feed closed"),
            Err(_) => bail!(
                "adapter did not become ready (state: {})",
                service.current_state()
            ),
        }
    }
}

fn render(snapshot: &[PeripheralRecord]) {
    let mut records: Vec<_> = snapshot.iter().collect();
    records.sort_by_key(|r| std::cmp::Reverse(r.last_signal_strength().unwrap_or(i16::MIN)));

    println!("-- {} peripheral(s) --", records.len());
    for record in records {
        let rssi = record
            .last_signal_strength()
            .map(|r| format!("{r} dBm"))
            .unwrap_or_else(|| "--".into());
        let seen = record
            .last_seen_at()
            .map(|t| format!("{:.1}s ago", (Timestamp::now() - t) as f64 / 1000.0))
            .unwrap_or_else(|| "never".into());
        let stale = if record.is_linked() { "" } else { " (stale)" };
        println!("  {:<28} {:>8}  {:>10}{}", record.identity(), rssi, seen, stale);
    }
}
