// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Transport selection and the compiled-in endpoint constants.
//!
//! The transport is chosen by the `RPC_TRANSPORT` environment variable
//! on both sides, "unix" (default) or "tcp", case-insensitive. The
//! unix form is a named socket at a fixed path; the tcp form uses the
//! compiled-in host and port.

use std::path::PathBuf;

/// Environment variable selecting the transport on server and client.
pub const ENV_TRANSPORT: &str = "RPC_TRANSPORT";

/// Named socket path for the unix transport. The server unlinks a
/// stale entry before binding.
pub const UNIX_SOCKET_PATH: &str = "/tmp/p3_tb";

/// Host for the tcp transport. Must be an address literal: the shim
/// connects from inside interposed calls and cannot run a resolver.
pub const TCP_HOST: &str = "127.0.0.1";

/// Port for the tcp transport.
pub const TCP_PORT: u16 = 9999;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportKind {
    Unix,
    Tcp,
}

impl TransportKind {
    /// Read `RPC_TRANSPORT`; anything other than "tcp" means unix.
    pub fn from_env() -> Self {
        match std::env::var(ENV_TRANSPORT) {
            Ok(v) if v.eq_ignore_ascii_case("tcp") => TransportKind::Tcp,
            _ => TransportKind::Unix,
        }
    }
}

/// A concrete endpoint the server binds and the client connects to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Endpoint {
    Unix(PathBuf),
    Tcp(String, u16),
}

impl Endpoint {
    /// The endpoint implied by the environment and the compiled-in
    /// constants.
    pub fn from_env() -> Self {
        match TransportKind::from_env() {
            TransportKind::Unix => Endpoint::Unix(PathBuf::from(UNIX_SOCKET_PATH)),
            TransportKind::Tcp => Endpoint::Tcp(TCP_HOST.to_string(), TCP_PORT),
        }
    }
}
