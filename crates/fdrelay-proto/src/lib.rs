// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Protocol definition shared by the fdrelay shim, client and server.
//!
//! One procedure family per relayed call, each a (request, reply) pair
//! encoded with the `fdrelay-wire` value codec. The procedure number
//! travels in the call envelope; request and reply bodies carry only
//! the fields listed here.

pub mod fcntl_table;
pub mod messages;
pub mod procedure;
pub mod transport;
pub mod validation;

pub use messages::*;
pub use procedure::Procedure;
pub use validation::{validate_request, ValidationError};

/// Program number carried in every call envelope.
pub const PROGRAM: u32 = 0x2fd5_0001;

/// Protocol version carried in every call envelope.
pub const VERSION: u32 = 1;

/// Upper bound on path strings, in bytes.
pub const MAX_PATH_LEN: usize = 4096;

/// Upper bound on a single read/write data payload, in bytes. Reads
/// are clamped to this server-side; writes above it are chunked by the
/// client.
pub const MAX_PAYLOAD_LEN: usize = 1_048_576;
