//! # Topika - Topic Map Engine
//!
//! Binary entry point: tracing setup, banner, CLI dispatch.
//!
//! ## Usage
//!
//! ```bash
//! # Initialize a database
//! topika init
//!
//! # Create a topic and attach a name
//! topika topic -s http://example.org/alice
//! topika name -t http://example.org/alice -v "Alice"
//!
//! # Query
//! topika query -t identifiers --pattern "example.org"
//! topika status
//! ```

use clap::Parser;
use topika::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // Initialize tracing — TOPIKA_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("TOPIKA_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "topika=info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    // Parse CLI arguments
    let cli = cli::Cli::parse();

    // Display startup banner
    if !cli.quiet {
        print_banner();
    }

    // Execute command
    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Topika startup banner.
fn print_banner() {
    println!(
        r#"
  ████████╗ ██████╗ ██████╗ ██╗██╗  ██╗ █████╗
  ╚══██╔══╝██╔═══██╗██╔══██╗██║██║ ██╔╝██╔══██╗
     ██║   ██║   ██║██████╔╝██║█████╔╝ ███████║
     ██║   ██║   ██║██╔═══╝ ██║██╔═██╗ ██╔══██║
     ██║   ╚██████╔╝██║     ██║██║  ██╗██║  ██║
     ╚═╝    ╚═════╝ ╚═╝     ╚═╝╚═╝  ╚═╝╚═╝  ╚═╝

  Topic Map Engine v{}

  Deterministic • Merging • Scoped
"#,
        env!("CARGO_PKG_VERSION")
    );
}
