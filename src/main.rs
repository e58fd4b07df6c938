//! Arena server entry point.
//!
//! Loads configuration from the environment, wires up tracing, and
//! runs the WebSocket accept loop until a shutdown signal (SIGINT) is
//! observed. Exit code `0` on clean shutdown, `1` on a fatal
//! configuration or bind error.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use arena::config::ArenaConfig;
use arena::network::{GameServer, ServerConfig};
use arena::VERSION;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("arena server v{}", VERSION);

    match bootstrap() {
        Ok(code) => code,
        Err(err) => {
            error!(%err, "fatal error during startup");
            ExitCode::FAILURE
        }
    }
}

/// Load configuration and the async runtime, then run to completion.
/// Wrapped in `anyhow` at this process edge so every setup failure
/// (bad env var, runtime init) carries its `Context` through to the
/// top-level log line, the same split the library/binary error types
/// draw elsewhere in this crate (`thiserror` below, `anyhow` here).
fn bootstrap() -> anyhow::Result<ExitCode> {
    let config = ArenaConfig::from_env().context("loading configuration from the environment")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting the async runtime")?;

    Ok(runtime.block_on(run(config)))
}

async fn run(config: ArenaConfig) -> ExitCode {
    let server = GameServer::new(ServerConfig::default(), Arc::new(config));

    tokio::select! {
        result = server.run() => {
            if let Err(err) = result {
                error!(%err, "server exited with error");
                return ExitCode::FAILURE;
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("ctrl-c received, shutting down");
            server.shutdown();
        }
    }

    ExitCode::SUCCESS
}
