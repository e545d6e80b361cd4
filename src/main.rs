use anyhow::{Context, Result};
use clap::Parser;
use docqa::{api, config, logging, processing};
use std::net::Ipv4Addr;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

const PORT_RANGE: RangeInclusive<u16> = 8000..=8099;

/// Upload a PDF and ask questions about it over HTTP.
#[derive(Debug, Parser)]
#[command(name = "docqa", version, about)]
struct Args {
    /// Port to listen on; overrides SERVER_PORT.
    #[arg(long)]
    port: Option<u16>,
    /// Read environment overrides from this file instead of `.env`.
    #[arg(long, value_name = "PATH")]
    env_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let loaded = match &args.env_file {
        Some(path) => config::init_config_from(path),
        None => config::init_config(),
    };
    loaded.context("invalid configuration")?;
    logging::init_tracing();

    let service = processing::DocumentQaService::new().context("failed to build QA service")?;
    let app = api::create_router(Arc::new(service));

    let requested = args.port.or(config::get_config().server_port);
    let (listener, port) = bind_listener(requested)
        .await
        .context("failed to bind listener")?;
    tracing::info!("Listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

async fn bind_listener(requested: Option<u16>) -> std::io::Result<(TcpListener, u16)> {
    if let Some(port) = requested {
        return TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map(|listener| (listener, port));
    }

    for port in PORT_RANGE {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => {
                tracing::debug!(port, "Bound server port");
                return Ok((listener, port));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
            }
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        format!(
            "No available port found in range {}-{}",
            PORT_RANGE.start(),
            PORT_RANGE.end()
        ),
    ))
}
