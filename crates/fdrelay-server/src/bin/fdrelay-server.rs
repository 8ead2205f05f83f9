// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! fdrelay server executable.
//!
//! Binds the endpoint selected by `RPC_TRANSPORT` (or the CLI
//! override) and serves connections until killed. All state is
//! per-connection; there is nothing to persist.

use anyhow::{bail, Context, Result};
use clap::Parser;
use fdrelay_proto::transport::{Endpoint, TCP_HOST, TCP_PORT};
use fdrelay_server::Listener;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fdrelay-server")]
#[command(about = "Executes relayed file-I/O calls on behalf of fdrelay clients")]
#[command(version, long_about = None)]
struct Cli {
    /// Transport override: "unix" or "tcp". Defaults to RPC_TRANSPORT.
    #[arg(long)]
    transport: Option<String>,

    /// Unix socket path override.
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Tcp port override.
    #[arg(long)]
    port: Option<u16>,

    /// Log filter, e.g. "info" or "fdrelay_server=debug".
    #[arg(long, default_value = "info")]
    log: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&cli.log).with_context(|| format!("bad log filter {:?}", cli.log))?,
        )
        .with_writer(std::io::stderr)
        .init();

    let endpoint = resolve_endpoint(&cli)?;
    info!(?endpoint, "starting fdrelay server");

    let listener = Listener::bind(&endpoint).context("failed to bind endpoint")?;
    listener.serve_forever().context("accept loop failed")?;
    Ok(())
}

fn resolve_endpoint(cli: &Cli) -> Result<Endpoint> {
    let mut endpoint = match cli.transport.as_deref() {
        None => Endpoint::from_env(),
        Some(t) if t.eq_ignore_ascii_case("unix") => {
            Endpoint::Unix(fdrelay_proto::transport::UNIX_SOCKET_PATH.into())
        }
        Some(t) if t.eq_ignore_ascii_case("tcp") => Endpoint::Tcp(TCP_HOST.to_string(), TCP_PORT),
        Some(other) => bail!("unknown transport {other:?} (expected \"unix\" or \"tcp\")"),
    };

    match &mut endpoint {
        Endpoint::Unix(path) => {
            if let Some(socket) = &cli.socket {
                *path = socket.clone();
            }
        }
        Endpoint::Tcp(_, port) => {
            if let Some(override_port) = cli.port {
                *port = override_port;
            }
        }
    }
    Ok(endpoint)
}
