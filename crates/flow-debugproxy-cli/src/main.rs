//! flow-debugproxy
//!
//! Sits between the debugger engine and the IDE:
//! - the debugger engine connects to `--listen` (default 127.0.0.1:9000)
//! - every session is relayed to the IDE at `--ide` (default 127.0.0.1:9010)
//! - breakpoints on Flow package sources are moved to the compiled proxy
//!   classes, and file references coming back are moved to the sources

use anyhow::Result;
use clap::Parser;
use flow_debugproxy_core::{Config, Framework};
use flow_debugproxy_relay::Relay;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(author, version, about = "DBGp proxy for Flow Framework proxy classes", long_about = None)]
struct Args {
    /// Address the debugger engine connects to
    #[arg(short, long)]
    listen: Option<String>,

    /// Address of the IDE
    #[arg(short, long)]
    ide: Option<String>,

    /// Flow context
    #[arg(short, long, env = "FLOW_CONTEXT")]
    context: Option<String>,

    /// Path mapping framework (flow, dummy)
    #[arg(long)]
    framework: Option<Framework>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log sessions and discovered mappings
    #[arg(short, long)]
    verbose: bool,

    /// Also dump the raw and processed protocol
    #[arg(long)]
    vv: bool,

    /// Log path resolution details
    #[arg(long)]
    debug: bool,
}

impl Args {
    /// Defaults, then the config file, then the command line
    fn into_config(self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_json_file(path)?,
            None => Config::default(),
        };
        if let Some(listen) = self.listen {
            config.listen = listen;
        }
        if let Some(ide) = self.ide {
            config.ide = ide;
        }
        if let Some(context) = self.context {
            config.context = context;
        }
        if let Some(framework) = self.framework {
            config.framework = framework;
        }
        config.verbose |= self.verbose || self.vv;
        config.very_verbose |= self.vv;
        config.debug |= self.debug;
        Ok(config)
    }
}

/// Default filter for the verbosity flags; `RUST_LOG` wins when set
fn log_level(config: &Config) -> &'static str {
    if config.very_verbose {
        "trace"
    } else if config.debug {
        "debug"
    } else if config.verbose {
        "info"
    } else {
        "warn"
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Args::parse().into_config()?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level(&config)));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let relay = Relay::new(config)?;
    let listener = relay.bind().await?;
    info!(
        "flow-debugproxy listening on {} for {}",
        relay.config().listen,
        relay.config().ide
    );

    tokio::select! {
        result = relay.serve(listener) => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down ({} mappings discovered)", relay.store().len());
        }
    }

    Ok(())
}
