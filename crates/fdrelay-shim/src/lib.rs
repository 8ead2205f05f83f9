// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! fdrelay interpose shim.
//!
//! Loaded through LD_PRELOAD, this library shadows a fixed set of
//! glibc file-I/O entry points and relays them to the fdrelay server
//! over a per-thread session. Two layers of thread-local guards keep
//! the shim out of its own way: a per-entry-point bit breaks direct
//! recursion, and a shared "RPC in progress" flag covers every
//! syscall the transport machinery itself performs. A guarded or
//! session-less call degrades to a direct kernel invocation, so the
//! instrumented process keeps working when the server is unreachable.

#![cfg_attr(not(target_os = "linux"), allow(unused))]

#[cfg(target_os = "linux")]
#[macro_use]
mod logging;

#[cfg(target_os = "linux")]
mod guards;
#[cfg(target_os = "linux")]
mod hook_io;
#[cfg(target_os = "linux")]
mod ops;
#[cfg(target_os = "linux")]
mod state;
#[cfg(target_os = "linux")]
mod sys;

// The hooks define no_mangle symbols named open/read/write/...; in the
// unit-test binary those would shadow glibc for the harness itself, so
// they are only built into the preloadable artifact.
#[cfg(all(target_os = "linux", not(test)))]
mod hooks;

#[cfg(target_os = "linux")]
pub use logging::ENV_LOG;

#[cfg(target_os = "linux")]
#[ctor::ctor]
fn init() {
    shim_log!(
        "loaded, transport {:?}",
        fdrelay_proto::transport::TransportKind::from_env()
    );
}

/// Process-teardown hook: close whatever session the exiting thread
/// still holds. Other threads' sessions are closed by their own
/// thread-local destructors.
#[cfg(target_os = "linux")]
#[ctor::dtor]
fn teardown() {
    state::close_current_thread_session();
}
