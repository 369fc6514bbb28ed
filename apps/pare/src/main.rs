//! # pare - Test-Case Reducer
//!
//! The main binary for the pare delta-debugging reducer.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     apps/pare (THE BINARY)                   │
//! │                                                              │
//! │  ┌───────────┐   ┌────────────────┐   ┌──────────────────┐  │
//! │  │   CLI     │──▶│ Session Driver │──▶│  Chunk Bisector  │  │
//! │  │  (clap)   │   │    (rounds)    │   │  (ddmin, jobs)   │  │
//! │  └───────────┘   └───────┬────────┘   └────────┬─────────┘  │
//! │                          │                     ▼            │
//! │                          │            ┌──────────────────┐  │
//! │                          │            │  Oracle Invoker  │  │
//! │                          │            │ (tokio process)  │  │
//! │                          ▼            └──────────────────┘  │
//! │                  ┌───────────────┐                          │
//! │                  │   pare-core   │                          │
//! │                  │  (THE MODEL)  │                          │
//! │                  └───────────────┘                          │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! pare crash.pare --test ./still-crashes.sh
//! pare crash.pare --test ./check.sh --test-arg {} --test-arg --strict -o min.pare
//! ```
//!
//! Exit status is 0 when reduction completes (even without progress) and 1 on
//! a setup error.

mod cli;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // Initialize tracing. PARE_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("PARE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "pare=info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    // Parse CLI arguments
    let cli = cli::Cli::parse();

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}
