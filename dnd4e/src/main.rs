//! D&D 4E character manager.
//!
//! Runs the headless line protocol over a SQLite character store:
//!
//! ```bash
//! cargo run -p dnd4e -- --database sqlite://party.db
//! ```
//!
//! Logs go to stderr so stdout stays a clean protocol stream. Set
//! `RUST_LOG` to change verbosity.

mod headless;

use dnd4e_core::{StoreConfig, StoreHandle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dnd4e=info,dnd4e_core=info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return;
    }

    let handle = StoreHandle::new(parse_config_from_args(&args));
    let store = match handle.store().await {
        Ok(store) => store,
        Err(e) => {
            tracing::error!(error = %e, "Could not open character store");
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = headless::run_headless(store.clone()).await {
        eprintln!("Error: {e}");
        store.close().await;
        std::process::exit(1);
    }
    store.close().await;
}

/// Build store configuration from the environment, then command line overrides.
fn parse_config_from_args(args: &[String]) -> StoreConfig {
    let mut config = StoreConfig::from_env();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--database" => {
                if let Some(url) = args.get(i + 1) {
                    config.database_url = url.clone();
                    i += 1;
                }
            }
            "--max-connections" => {
                if let Some(n) = args.get(i + 1).and_then(|n| n.parse().ok()) {
                    config = config.with_max_connections(n);
                    i += 1;
                }
            }
            "--no-wal" => config = config.with_wal(false),
            _ => {}
        }
        i += 1;
    }

    config
}

fn print_help() {
    println!("D&D 4E Character Manager");
    println!();
    println!("USAGE:");
    println!("  dnd4e [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("  -h, --help                Show this help message");
    println!("  --database <URL>          SQLite URL (default: $DND4E_DATABASE_URL or sqlite://dnd4e.db)");
    println!("  --max-connections <N>     Pool size (default: $DND4E_MAX_CONNECTIONS or 4)");
    println!("  --no-wal                  Disable write-ahead logging");
    println!();
    println!("Commands are read from stdin; type #help once running.");
}
