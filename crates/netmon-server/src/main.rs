use std::fmt;

use netmon_server::ServerBuilder;
use netmon_server::config::loader::load_config;
use netmon_server::observability;

const DEFAULT_CONFIG: &str = "netmon.toml";

/// Where the configuration file path came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigOrigin {
    Flag,
    Env,
    Default,
}

impl fmt::Display for ConfigOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Flag => "--config",
            Self::Env => "NETMON_CONFIG",
            Self::Default => "default",
        })
    }
}

/// Picks the config file: `--config <path>`, then `NETMON_CONFIG`, then
/// `netmon.toml`.
fn config_path(
    args: impl IntoIterator<Item = String>,
    env_value: Option<String>,
) -> (String, ConfigOrigin) {
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        if arg == "--config" {
            if let Some(path) = args.next() {
                return (path, ConfigOrigin::Flag);
            }
        } else if let Some(path) = arg.strip_prefix("--config=") {
            return (path.to_string(), ConfigOrigin::Flag);
        }
    }

    match env_value.filter(|v| !v.trim().is_empty()) {
        Some(path) => (path, ConfigOrigin::Env),
        None => (DEFAULT_CONFIG.to_string(), ConfigOrigin::Default),
    }
}

#[tokio::main]
async fn main() {
    match dotenvy::dotenv() {
        Ok(_) => {}
        Err(e) if e.not_found() => {}
        Err(e) => eprintln!("Warning: ignoring unreadable .env file: {e}"),
    }

    observability::init_tracing();

    let (path, origin) = config_path(
        std::env::args().skip(1),
        std::env::var("NETMON_CONFIG").ok(),
    );
    let cfg = load_config(Some(&path)).unwrap_or_else(|e| {
        eprintln!("Configuration error ({path}): {e}");
        std::process::exit(2);
    });
    tracing::info!(%path, %origin, "Configuration loaded");
    observability::apply_logging_level(&cfg.logging.level);

    let server = ServerBuilder::new()
        .with_config(cfg)
        .build()
        .unwrap_or_else(|e| {
            eprintln!("Startup failed: {e:#}");
            std::process::exit(2);
        });

    if let Err(e) = server.run().await {
        tracing::error!(error = %e, "Server stopped with an error");
        std::process::exit(1);
    }
}
