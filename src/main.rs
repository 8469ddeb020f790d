use std::net::{SocketAddr, UdpSocket as StdUdpSocket};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

use opendlna::config::{Cli, ServerConfig};
use opendlna::state::AppState;
use opendlna::{logging, ssdp, web};

/// Resolve the LAN IP clients should use to reach this server, via the
/// classic UDP-connect trick (no packet is actually sent). Falls back to
/// the loopback address if no route is available.
fn resolve_server_ip() -> String {
    StdUdpSocket::bind("0.0.0.0:0")
        .and_then(|socket| {
            socket.connect("8.8.8.8:80")?;
            socket.local_addr()
        })
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|_| "127.0.0.1".to_string())
}

/// Bind the HTTP listener, incrementing the port on `EADDRINUSE` until one
/// is free.
async fn bind_with_autoincrement(
    ip: &str,
    starting_port: u16,
) -> anyhow::Result<(tokio::net::TcpListener, u16)> {
    let mut port = starting_port;
    loop {
        let addr: SocketAddr = format!("{ip}:{port}").parse()?;
        match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => return Ok((listener, port)),
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse && port < u16::MAX => {
                port += 1;
            }
            Err(err) => return Err(err).context("failed to bind HTTP listener"),
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = ServerConfig::from_cli(cli)?;
    info!("Media directory: {}", config.media_root.display());
    info!("Server name: {}", config.server_name);

    let server_ip = resolve_server_ip();
    let requested_port = config.port;
    let mime_types_path = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|d| d.join("mime.types")));

    let state = AppState::new(config, mime_types_path, server_ip.clone());
    let uuid = state.identity.uuid().await;
    info!("Device UUID: {uuid}");

    let (listener, port) = bind_with_autoincrement(&server_ip, requested_port).await?;
    if port != requested_port {
        info!("Port {requested_port} was in use; bound to {port} instead");
    }
    info!("HTTP listening on http://{server_ip}:{port}");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let app = web::create_router(state.clone());
    let http_task = tokio::spawn(async move {
        axum::serve(listener, app.into_make_service())
            .await
            .context("HTTP server failed")
    });

    let ssdp_task = tokio::spawn(ssdp::run(
        uuid,
        server_ip,
        port,
        state.config.server_name.clone(),
        shutdown_rx,
    ));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown requested, sending SSDP byebye");
    let _ = shutdown_tx.send(true);

    http_task.abort();
    match tokio::time::timeout(std::time::Duration::from_secs(5), ssdp_task).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(err))) => error!("SSDP task exited with error: {err}"),
        Ok(Err(err)) => error!("SSDP task panicked: {err}"),
        Err(_) => error!("SSDP task did not shut down within 5s"),
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("opendlna: {err:#}");
            ExitCode::FAILURE
        }
    }
}
