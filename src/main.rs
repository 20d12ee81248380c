//! tracklogd - GPX track logging daemon
//!
//! Connects to a gpsd-compatible positioning service, filters the fix
//! stream, and writes a GPX track log to a file or stdout. SIGHUP rotates
//! the output file when a filename template is configured; SIGINT, SIGTERM
//! and SIGQUIT close the document and exit cleanly.

use log::{error, info};
use std::env;
use std::path::Path;
use std::process;
use tracklogd::app::App;
use tracklogd::config::Config;
use tracklogd::error::Result;

/// Parse config path from command line arguments.
///
/// Supports:
/// - `tracklogd <path>` (positional)
/// - `tracklogd --config <path>` (flag-based)
/// - `tracklogd -c <path>` (short flag)
///
/// Defaults to `/etc/tracklogd.toml` if not specified.
fn parse_config_path() -> String {
    let args: Vec<String> = env::args().collect();

    for i in 1..args.len() {
        if (args[i] == "--config" || args[i] == "-c") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }

    if args.len() > 1 && !args[1].starts_with('-') {
        return args[1].clone();
    }

    "/etc/tracklogd.toml".to_string()
}

fn run(config: Config) -> Result<()> {
    let mut app = App::new(config)?;
    app.run()
}

fn main() {
    let config_path = parse_config_path();

    // The daemon also runs with no config file at all: localhost source,
    // default filters, GPX to stdout.
    let (config, loaded) = if Path::new(&config_path).exists() {
        match Config::from_file(&config_path) {
            Ok(config) => (config, true),
            Err(e) => {
                eprintln!("tracklogd: failed to load {}: {}", config_path, e);
                process::exit(1);
            }
        }
    } else {
        (Config::default(), false)
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.logging.level),
    )
    .init();

    info!("tracklogd v{} starting...", env!("CARGO_PKG_VERSION"));
    if loaded {
        info!("using config: {}", config_path);
    } else {
        info!("no config file at {}, using defaults", config_path);
    }

    if let Err(e) = run(config) {
        error!("fatal: {}", e);
        process::exit(1);
    }

    info!("tracklogd stopped");
}
