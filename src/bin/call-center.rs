//! Call-center service entry point
//!
//! Wires the dispatch loop, the configuration reloader, and the HTTP
//! ingress together and runs until the process is killed.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use call_center::{
    config, ConfigLoader, Dispatcher, LoggingSink, RestApiServer, Scheduler, SystemClock,
};
use clap::Parser;
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "call-center")]
#[command(about = "Call-center dispatch engine with HTTP ingress")]
#[command(version)]
struct Cli {
    /// Host address for the HTTP ingress
    host: String,

    /// TCP port for the HTTP ingress
    port: u16,

    /// Reload the configuration every N seconds (0 disables reloading)
    #[arg(default_value_t = 0)]
    reload_interval: u64,

    /// User configuration file, merged over the defaults
    #[arg(long, default_value = "call-center.json")]
    config: PathBuf,

    /// Defaults configuration file, required at startup
    #[arg(long, default_value = "default-call-center.json")]
    default_config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let loader = ConfigLoader::new(cli.default_config, Some(cli.config));
    let initial = loader
        .load()
        .context("default configuration is required at startup")?;

    let clock = Arc::new(SystemClock);
    let dispatcher = Arc::new(Dispatcher::new(clock.clone(), Arc::new(LoggingSink)));
    config::apply(&initial, &dispatcher);

    let scheduler = Scheduler::new(Arc::clone(&dispatcher));
    std::thread::spawn(move || scheduler.run());

    if cli.reload_interval > 0 {
        config::spawn_reload(
            loader,
            Arc::clone(&dispatcher),
            Duration::from_secs(cli.reload_interval),
        );
    }

    let server = RestApiServer::new(dispatcher, clock);
    if let Err(err) = server.serve(&cli.host, cli.port).await {
        error!(%err, "http ingress failed");
        std::process::exit(2);
    }
    Ok(())
}
