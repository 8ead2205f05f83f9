// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Endpoint binding and the accept loop.
//!
//! Each accepted connection is served on its own thread with its own
//! translation table; connections are otherwise independent. The unix
//! form unlinks a stale socket entry before binding. The tcp form
//! binds the compiled-in host and port.

use crate::dispatch::serve_connection;
use fdrelay_proto::transport::Endpoint;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::os::unix::net::UnixListener;
use std::path::Path;
use std::thread;
use tracing::{error, info};

pub enum Listener {
    Unix(UnixListener),
    Tcp(TcpListener),
}

impl Listener {
    /// Bind the endpoint. For the unix form a stale socket file from a
    /// previous run is removed first.
    pub fn bind(endpoint: &Endpoint) -> std::io::Result<Self> {
        match endpoint {
            Endpoint::Unix(path) => {
                remove_stale_socket(path)?;
                let listener = UnixListener::bind(path)?;
                info!(path = %path.display(), "listening on unix socket");
                Ok(Listener::Unix(listener))
            }
            Endpoint::Tcp(host, port) => {
                let listener = TcpListener::bind((host.as_str(), *port))?;
                info!(%host, port, "listening on tcp");
                Ok(Listener::Tcp(listener))
            }
        }
    }

    /// Accept and serve connections until the process exits. Accept
    /// failures are logged and do not stop the loop.
    pub fn serve_forever(&self) -> std::io::Result<()> {
        match self {
            Listener::Unix(listener) => loop {
                match listener.accept() {
                    Ok((stream, _)) => spawn_connection(stream, "unix peer".to_string()),
                    Err(err) => error!(%err, "accept failed"),
                }
            },
            Listener::Tcp(listener) => loop {
                match listener.accept() {
                    Ok((stream, peer)) => spawn_connection(stream, peer.to_string()),
                    Err(err) => error!(%err, "accept failed"),
                }
            },
        }
    }
}

fn spawn_connection<S>(stream: S, peer: String)
where
    S: Read + Write + Send + 'static,
{
    info!(%peer, "connection accepted");
    thread::spawn(move || match serve_connection(stream) {
        Ok(()) => info!(%peer, "connection finished"),
        Err(err) => error!(%peer, %err, "connection torn down"),
    });
}

fn remove_stale_socket(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            info!(path = %path.display(), "removed stale socket");
            Ok(())
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_unlinks_a_stale_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stale.sock");

        // First bind creates the entry; dropping the listener leaves
        // the filesystem entry behind, like a crashed server would.
        let endpoint = Endpoint::Unix(path.clone());
        let first = Listener::bind(&endpoint).unwrap();
        drop(first);
        assert!(path.exists());

        Listener::bind(&endpoint).unwrap();
    }

    #[test]
    fn tcp_bind_on_ephemeral_port() {
        let endpoint = Endpoint::Tcp("127.0.0.1".to_string(), 0);
        let listener = Listener::bind(&endpoint).unwrap();
        match listener {
            Listener::Tcp(l) => assert_ne!(l.local_addr().unwrap().port(), 0),
            _ => panic!("expected tcp listener"),
        }
    }
}
