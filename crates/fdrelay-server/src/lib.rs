// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! fdrelay server library.
//!
//! The server owns the real kernel descriptors. Each accepted
//! connection gets its own [`fd_table::FdTable`] and its own
//! [`handlers::Handler`]; the [`dispatch`] loop reads framed calls,
//! executes them strictly in arrival order and writes framed replies.
//! [`listener`] binds the configured endpoint and serves each
//! connection on its own thread.

pub mod dispatch;
pub mod fd_table;
pub mod handlers;
pub mod listener;

pub use dispatch::serve_connection;
pub use fd_table::{FdTable, TableFull};
pub use handlers::Handler;
pub use listener::Listener;
