// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Helpers for end-to-end tests: an in-process server bound to a
//! throwaway socket, and a client session connected to it.

use anyhow::{Context, Result};
use fdrelay_client::{Session, StandardIo};
use fdrelay_proto::transport::Endpoint;
use fdrelay_server::Listener;
use std::path::{Path, PathBuf};
use std::thread;
use tempfile::TempDir;

/// A server accepting on a socket inside its own temp directory. The
/// directory doubles as scratch space for the files the scenarios
/// relay operations against.
pub struct TestServer {
    dir: TempDir,
    endpoint: Endpoint,
}

impl TestServer {
    /// Start over the unix transport.
    pub fn start() -> Result<Self> {
        let dir = tempfile::tempdir().context("creating scratch dir")?;
        let socket_path = dir.path().join("fdrelay.sock");
        let endpoint = Endpoint::Unix(socket_path);
        let listener = Listener::bind(&endpoint).context("binding test server")?;
        thread::spawn(move || {
            let _ = listener.serve_forever();
        });
        Ok(Self { dir, endpoint })
    }

    /// Start over tcp on an ephemeral loopback port.
    pub fn start_tcp() -> Result<Self> {
        let dir = tempfile::tempdir().context("creating scratch dir")?;
        let listener = Listener::bind(&Endpoint::Tcp("127.0.0.1".to_string(), 0))
            .context("binding test server")?;
        let port = match &listener {
            Listener::Tcp(inner) => inner.local_addr()?.port(),
            _ => unreachable!("bound tcp"),
        };
        let endpoint = Endpoint::Tcp("127.0.0.1".to_string(), port);
        thread::spawn(move || {
            let _ = listener.serve_forever();
        });
        Ok(Self { dir, endpoint })
    }

    pub fn connect(&self) -> Result<Session<StandardIo>> {
        Session::connect(&self.endpoint, StandardIo).context("connecting test session")
    }

    /// A path inside the scratch directory.
    pub fn scratch_path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn scratch_dir(&self) -> &Path {
        self.dir.path()
    }
}
