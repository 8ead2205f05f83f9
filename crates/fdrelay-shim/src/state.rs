// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Per-thread session lifecycle.
//!
//! Each thread owns at most one session, stored in thread-local state
//! and constructed lazily on the thread's first interposed call. The
//! slot moves through three states: unset (no connection attempt has
//! succeeded; calls fall back to the kernel and later calls may retry
//! the connect), ready, and broken (the server was contacted and then
//! lost; every further call on this thread reports an I/O error until
//! the thread ends). Construction and every call run under the shared
//! RPC flag.

use crate::guards::RpcFlag;
use crate::hook_io::HookSafeIo;
use fdrelay_client::{Session, SessionError};
use fdrelay_proto::transport::Endpoint;
use fdrelay_proto::{Request, Response};
use std::cell::RefCell;

enum Slot {
    Unset,
    Ready(Session<HookSafeIo>),
    Broken,
}

thread_local! {
    static SESSION: RefCell<Slot> = const { RefCell::new(Slot::Unset) };
}

pub enum CallOutcome {
    Response(Response),
    /// The session failed during or after contact with the server.
    /// The caller reports the generic I/O error; no fallback.
    SessionBroken,
    /// The request was refused locally before anything was written.
    Refused,
    /// No session exists and none could be constructed. The caller
    /// takes the direct kernel path for this call.
    NoSession,
}

pub fn call(request: &Request) -> CallOutcome {
    SESSION
        .try_with(|cell| {
            let mut slot = cell.borrow_mut();

            if let Slot::Unset = *slot {
                let _flag = RpcFlag::set();
                match Session::connect(&Endpoint::from_env(), HookSafeIo) {
                    Ok(session) => {
                        shim_log!("session established");
                        *slot = Slot::Ready(session);
                    }
                    Err(err) => {
                        shim_log!("session construction failed: {err}");
                        return CallOutcome::NoSession;
                    }
                }
            }

            match &mut *slot {
                Slot::Ready(session) => {
                    let _flag = RpcFlag::set();
                    match session.call(request) {
                        Ok(response) => CallOutcome::Response(response),
                        Err(SessionError::Validation(err)) => {
                            shim_log!("request refused: {err}");
                            CallOutcome::Refused
                        }
                        Err(err) => {
                            shim_log!("session broken: {err}");
                            *slot = Slot::Broken;
                            CallOutcome::SessionBroken
                        }
                    }
                }
                Slot::Broken => CallOutcome::SessionBroken,
                Slot::Unset => unreachable!("slot was just initialised"),
            }
        })
        // Thread-local storage already destroyed: the thread is
        // exiting, take the direct path.
        .unwrap_or(CallOutcome::NoSession)
}

/// Drop the calling thread's session, closing its socket. Used by the
/// process-teardown hook; per-thread destruction happens implicitly
/// when the thread-local is dropped.
pub fn close_current_thread_session() {
    let _ = SESSION.try_with(|cell| {
        if let Ok(mut slot) = cell.try_borrow_mut() {
            if matches!(*slot, Slot::Ready(_)) {
                shim_log!("closing session at teardown");
            }
            *slot = Slot::Unset;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use fdrelay_proto::transport::ENV_TRANSPORT;
    use fdrelay_proto::CloseRequest;

    // With the unix transport pointed at its default path and no
    // server bound there, construction must fail and the outcome must
    // be the fallback signal, repeatedly (unset, not broken).
    #[test]
    fn construction_failure_means_fallback() {
        std::env::set_var(ENV_TRANSPORT, "unix");
        let request = Request::Close(CloseRequest { handle: 3 });

        // Run on a dedicated thread in case another test in this
        // process has a live session on the current one.
        std::thread::spawn(move || {
            for _ in 0..2 {
                match call(&request) {
                    CallOutcome::NoSession => {}
                    CallOutcome::Response(_) => panic!("unexpected session to {:?}", Endpoint::from_env()),
                    _ => panic!("expected NoSession"),
                }
            }
        })
        .join()
        .unwrap();
    }
}
