//! Status and water-level checks against a real device.
//!
//! Demonstrates:
//! - Building a monitor from the environment (`WATERTANK_*`)
//! - Following state, level and error channels
//! - The delayed startup status check
//! - Periodic water-level polling with `--watch`
//!
//! Usage:
//!   cargo run --example check_device
//!   cargo run --example check_device -- --debug
//!   cargo run --example check_device -- --dev
//!   cargo run --example check_device -- --watch 60 --no-wait

mod common;

// ============================================================================
// Imports
// ============================================================================

use common::Args;
use futures_util::StreamExt;
use watertank_monitor::monitor::DEFAULT_STARTUP_DELAY;
use watertank_monitor::{DeviceMonitor, MonitorBuilder, MonitorConfig, Result};

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    common::init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    println!("=== Water Tank: Check Device ===\n");

    // ========================================================================
    // Build Monitor
    // ========================================================================

    let preset = if args.dev {
        MonitorConfig::development()
    } else {
        MonitorConfig::production()
    };
    let config = preset.overlay(std::env::vars())?;
    println!("[Setup] Device at {}", config.base_url);

    let monitor = MonitorBuilder::from_config(config).build()?;
    println!("        ✓ Platform: {}\n", monitor.platform());

    follow_channels(&monitor);

    // ========================================================================
    // Startup Status Check
    // ========================================================================

    println!("[Status] Checking device...");
    let startup = monitor.spawn_startup_check(DEFAULT_STARTUP_DELAY);
    match startup.await {
        Ok(Ok(status)) if status.connected => {
            println!(
                "        ✓ Online (signal {:?} dBm, uptime {:?} s)",
                status.signal, status.uptime
            );
        }
        Ok(Ok(_)) => println!("        ✗ Device reports offline"),
        Ok(Err(e)) => println!("        ✗ {}", e.user_message()),
        Err(e) => println!("        ✗ Startup check aborted: {e}"),
    }

    // ========================================================================
    // Water Level
    // ========================================================================

    read_level(&monitor).await;

    if let Some(period) = args.watch {
        println!("\n[Watch] Polling every {}s, Ctrl+C to stop", period.as_secs());
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => read_level(&monitor).await,
                _ = tokio::signal::ctrl_c() => break,
            }
        }
    } else {
        common::wait_for_exit(args.no_wait).await;
    }

    println!("\n=== Done ===");
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// Prints every state and error publication.
fn follow_channels(monitor: &DeviceMonitor) {
    let states = monitor.subscribe_state().into_stream();
    tokio::spawn(async move {
        tokio::pin!(states);
        while let Some(Ok(state)) = states.next().await {
            println!("        [state] {} - {}", state.title(), state.description());
        }
    });

    let errors = monitor.subscribe_error().into_stream();
    tokio::spawn(async move {
        tokio::pin!(errors);
        while let Some(Ok(error)) = errors.next().await {
            if let Some(message) = error {
                println!("        [error] {message}");
            }
        }
    });
}

async fn read_level(monitor: &DeviceMonitor) {
    println!("[Water] Reading level...");
    match monitor.try_check_water_level().await {
        Ok(Some(reading)) => println!(
            "        ✓ {:.1}% ({}), battery {:?}",
            reading.level,
            reading.band().label(),
            reading.battery
        ),
        Ok(None) => println!("        - Check already running, skipped"),
        Err(_) => match monitor.last_known_level() {
            Some(level) => println!("        ✗ Read failed, last known level {level:.1}%"),
            None => println!("        ✗ Read failed, level unknown"),
        },
    }
}
