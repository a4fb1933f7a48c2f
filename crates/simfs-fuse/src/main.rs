#![warn(missing_docs)]
//! SimFS mount daemon
//!
//! Usage: simfs <mountpoint> [options]

use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use simfs_fuse::adapter::SimFsFuse;
use simfs_fuse::filesystem::SimFs;
use simfs_fuse::mount;
use simfs_llm::{Generator, LlmClient, API_KEY_ENV, DEFAULT_ENDPOINT};
use simfs_store::Store;

/// Environment override for the endpoint when no flag is given.
const ENDPOINT_ENV: &str = "LLM_ENDPOINT";

const DEFAULT_DB_PATH: &str = "./simfs.db";

fn print_usage(prog: &str) {
    eprintln!("Usage: {} <mountpoint> [options]", prog);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db-path=PATH       Path to the store database (default: {})", DEFAULT_DB_PATH);
    eprintln!("  --llm-endpoint=URL   LLM API endpoint (default: {})", DEFAULT_ENDPOINT);
    eprintln!("  -f                   Run in foreground (simfs always runs in the foreground)");
    eprintln!("  -d                   Enable debug output");
    eprintln!("  -h, --help           Print this help message");
    eprintln!();
    eprintln!("Environment variables:");
    eprintln!("  {}       API key for the default endpoint (required for it)", API_KEY_ENV);
    eprintln!("  {}         Overrides the default endpoint when no flag is given", ENDPOINT_ENV);
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let prog = args.first().map(|s| s.as_str()).unwrap_or("simfs");

    if args.iter().any(|a| a == "-h" || a == "--help") {
        print_usage(prog);
        return Ok(());
    }

    let mut db_path = DEFAULT_DB_PATH.to_string();
    let mut endpoint_flag: Option<String> = None;
    let mut debug = false;
    let mut mountpoint: Option<PathBuf> = None;

    for arg in &args[1..] {
        if let Some(value) = arg.strip_prefix("--db-path=") {
            db_path = value.to_string();
        } else if let Some(value) = arg.strip_prefix("--llm-endpoint=") {
            endpoint_flag = Some(value.to_string());
        } else if arg == "-d" {
            debug = true;
        } else if arg == "-f" {
            // Accepted for compatibility; the daemon never daemonizes.
        } else if arg.starts_with('-') {
            eprintln!("Unknown option: {}", arg);
            print_usage(prog);
            std::process::exit(1);
        } else if mountpoint.is_none() {
            mountpoint = Some(PathBuf::from(arg));
        } else {
            eprintln!("Unexpected argument: {}", arg);
            print_usage(prog);
            std::process::exit(1);
        }
    }

    let Some(mountpoint) = mountpoint else {
        eprintln!("Error: no mountpoint specified");
        print_usage(prog);
        std::process::exit(1);
    };

    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let endpoint = endpoint_flag
        .or_else(|| std::env::var(ENDPOINT_ENV).ok())
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

    if endpoint.contains("openai.com") && std::env::var(API_KEY_ENV).is_err() {
        anyhow::bail!(
            "{} is not set; set your API key or use a different --llm-endpoint",
            API_KEY_ENV
        );
    }

    mount::validate_mountpoint(&mountpoint)?;

    let store = Store::open(&db_path)?;
    let client = LlmClient::new(endpoint.clone())?;
    let fs = Arc::new(SimFs::new(store, Arc::new(client) as Arc<dyn Generator>));

    tracing::info!(
        mountpoint = %mountpoint.display(),
        db_path = %db_path,
        endpoint = %endpoint,
        "mounting SimFS"
    );

    fuser::mount2(
        SimFsFuse::new(Arc::clone(&fs)),
        &mountpoint,
        &mount::mount_options(),
    )?;

    fs.store().flush()?;
    tracing::info!("unmounted cleanly");
    Ok(())
}
