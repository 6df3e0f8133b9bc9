//! Web server for the Plume playground sandbox-execution service
//!
//! This binary wires the execution pipeline to its deployment: it reads the
//! environment-level configuration (exchange directory, image names,
//! platform override), picks a container-runner strategy, and serves the
//! compile/save/fetch API until shut down.

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;
use playground_core::PlaygroundConfig;
use playground_server::{
    production_service, relay_service, shutdown_signal, PlaygroundServer, ServerConfig,
};
use std::net::SocketAddr;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Playground Server - Run the Plume playground API")]
struct Cli {
    #[clap(long, default_value = "127.0.0.1:3001")]
    bind_addr: String,

    #[clap(long, short, default_value = "info")]
    log_level: String,

    #[clap(long, help = "Root directory containing the tmp/ and files/ subdirectories (overrides SERVER_PATH)")]
    server_path: Option<String>,

    #[clap(long, help = "Compiler image name (overrides COMPILER_IMAGE)")]
    compiler_image: Option<String>,

    #[clap(long, help = "Interpreter image name (overrides INTERPRETER_IMAGE)")]
    interpreter_image: Option<String>,

    #[clap(long, help = "Invoke the runtime through a relay shell instead of the Docker daemon")]
    relay: bool,

    #[clap(long, help = "Disable CORS headers")]
    no_cors: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logger
    let log_level_filter = cli.log_level.parse().unwrap_or(LevelFilter::Info);
    env_logger::Builder::new()
        .filter_level(log_level_filter)
        .init();

    let mut config = PlaygroundConfig::from_env();
    if let Some(server_path) = cli.server_path {
        config = config.with_server_path(server_path);
    }
    if let Some(image) = cli.compiler_image {
        config.compiler_image = image;
    }
    if let Some(image) = cli.interpreter_image {
        config.interpreter_image = image;
    }
    config.validate().map_err(|e| anyhow::anyhow!("{}", e))?;

    log::info!(
        "Exchange directory: {}, images: {} / {}",
        config.exchange_dir.display(),
        config.compiler_image,
        config.interpreter_image
    );
    if let Some(platform) = &config.platform {
        log::info!("Forcing container platform {}", platform);
    }

    let service = if cli.relay {
        log::info!("Using relay container runner");
        relay_service(config)
    } else {
        production_service(config)?
    };

    let bind_socket_addr: SocketAddr = cli
        .bind_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address '{}': {}", cli.bind_addr, e))?;

    let server_config = ServerConfig::default()
        .with_bind_addr(bind_socket_addr)
        .with_cors(!cli.no_cors)
        .with_logging(true);

    log::info!("Starting playground server on {}...", bind_socket_addr);

    let server = PlaygroundServer::with_config(service, server_config);
    if let Err(e) = server.serve_with_shutdown(shutdown_signal()).await {
        log::error!("Server failed: {}", e);
        return Err(e.into());
    }

    log::info!("Playground server shut down gracefully.");
    Ok(())
}
