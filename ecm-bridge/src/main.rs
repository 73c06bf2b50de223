//! ECM bridge entry point.
//!
//! ```text
//! ecm-bridge local                       Decode the link and draw locally
//! ecm-bridge relay [--host H] [--port P] Decode the link and relay over TCP
//! ecm-bridge serve [--port P]            Receive relayed packets and draw
//! ecm-bridge --config <path> <mode>      Load a custom config TOML
//! ecm-bridge --gen-config                Write default config to stdout
//! ```

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ecm_bridge::config::BridgeConfig;
use ecm_bridge::service::{BridgeService, Deployment};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "ecm-bridge", version, about = "ECM parallel display bridge")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "ecm-bridge.toml")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,

    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Decode the parallel link and draw into the local framebuffer.
    Local,
    /// Decode the parallel link and forward each packet over TCP.
    Relay {
        /// Renderer host (overrides network.host).
        #[arg(long)]
        host: Option<String>,
        /// Renderer port (overrides network.port).
        #[arg(long)]
        port: Option<u16>,
    },
    /// Listen for relayed packets and draw them.
    Serve {
        /// Listen port (overrides network.port).
        #[arg(long)]
        port: Option<u16>,
    },
}

impl Mode {
    fn apply(self, config: &mut BridgeConfig) -> Deployment {
        match self {
            Mode::Local => Deployment::Local,
            Mode::Relay { host, port } => {
                if let Some(host) = host {
                    config.network.host = host;
                }
                if let Some(port) = port {
                    config.network.port = port;
                }
                Deployment::Relay
            }
            Mode::Serve { port } => {
                if let Some(port) = port {
                    config.network.port = port;
                }
                Deployment::Serve
            }
        }
    }
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&BridgeConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let Some(mode) = cli.mode else {
        Cli::command().print_help()?;
        return Ok(());
    };

    // Load config before tracing so its level applies; report afterwards.
    let loaded = BridgeConfig::load(&cli.config);
    let level = match &loaded {
        Ok(config) => config.logging.level.clone(),
        Err(_) => "info".to_string(),
    };

    // Init tracing.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("ecm-bridge v{}", env!("CARGO_PKG_VERSION"));
    let mut config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return Err(e.into());
        }
    };
    if !cli.config.exists() {
        info!("no config at {}; using defaults", cli.config.display());
    }

    // Command-line overrides.
    let deployment = mode.apply(&mut config);
    info!("mode: {deployment}");
    info!("framebuffer: {}", config.framebuffer.device);
    info!("gpio chip: {}", config.lines.chip);

    let service = BridgeService::new(config);
    let stop = service.cancel_handle();

    // Ctrl-C handler.
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        stop.cancel();
    });

    if let Err(e) = service.run(deployment).await {
        error!("bridge failed: {e}");
        return Err(e.into());
    }

    Ok(())
}
