// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Classification of fcntl command codes.
//!
//! The shim uses this table to decide how to extract the variadic
//! third argument, and the server uses the same table to decide how to
//! interpret the argument union. The two sides must never disagree, so
//! the table lives here in the shared protocol crate.

/// Shape of the third fcntl argument for a given command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FcntlArgKind {
    None,
    Int,
    Lock,
}

/// Map a command code to its argument shape. Unknown commands are
/// treated as argument-free, matching the kernel's tolerance for
/// ignored arguments.
pub fn classify(cmd: i32) -> FcntlArgKind {
    match cmd {
        libc::F_GETFD | libc::F_GETFL | libc::F_GETOWN => FcntlArgKind::None,
        libc::F_DUPFD | libc::F_DUPFD_CLOEXEC | libc::F_SETFD | libc::F_SETFL | libc::F_SETOWN => {
            FcntlArgKind::Int
        }
        libc::F_GETLK | libc::F_SETLK | libc::F_SETLKW => FcntlArgKind::Lock,
        _ => FcntlArgKind::None,
    }
}

/// Commands that duplicate the descriptor with a caller-supplied lower
/// bound on the new handle.
pub fn is_dup(cmd: i32) -> bool {
    cmd == libc::F_DUPFD || cmd == libc::F_DUPFD_CLOEXEC
}
