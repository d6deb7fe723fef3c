//! Shared utilities for demos.
//!
//! Provides common functionality used across all demos:
//! - Command-line argument parsing
//! - Logging initialization
//! - Graceful exit handling

#![allow(dead_code)]

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tracing_subscriber::EnvFilter;

// ============================================================================
// Types
// ============================================================================

/// Command-line arguments for demos.
#[derive(Debug, Clone)]
pub struct Args {
    pub debug: bool,
    pub dev: bool,
    pub no_wait: bool,
    /// Poll period for `--watch <secs>`.
    pub watch: Option<Duration>,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse() -> Self {
        let args: Vec<String> = std::env::args().collect();
        let watch = args
            .iter()
            .position(|a| a == "--watch")
            .map(|i| {
                args.get(i + 1)
                    .and_then(|secs| secs.parse().ok())
                    .unwrap_or(30)
            })
            .map(Duration::from_secs);

        Self {
            debug: args.iter().any(|a| a == "--debug"),
            dev: args.iter().any(|a| a == "--dev"),
            no_wait: args.iter().any(|a| a == "--no-wait"),
            watch,
        }
    }
}

// ============================================================================
// Functions
// ============================================================================

/// Initialize tracing/logging.
pub fn init_logging(debug: bool) {
    let filter = if debug {
        "watertank_monitor=debug"
    } else {
        "watertank_monitor=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}

/// Wait for Ctrl+C or skip if `--no-wait` flag is set.
pub async fn wait_for_exit(no_wait: bool) {
    if no_wait {
        println!("[--no-wait] Skipping wait");
        return;
    }

    println!("Press Ctrl+C to exit...");
    tokio::signal::ctrl_c().await.ok();
}
