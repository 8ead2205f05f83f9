// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Per-thread re-entry guards.
//!
//! Two guard classes, both thread-local. The per-entry-point bit stops
//! an entry point from re-entering itself (a write issued while
//! handling a write). The shared RPC flag is held across session
//! construction and every session call, so any OTHER entry point the
//! transport machinery trips over bypasses the shim too. Every hook
//! must test both before doing anything else; dropping either check
//! turns lazy connection setup into a stack overflow.
//!
//! Accessors use `try_with` so a hook that fires during thread
//! teardown (after the thread-local storage is gone) reads "blocked"
//! and takes the direct kernel path.

use std::cell::Cell;

/// One bit per interposed entry point. Aliases (open64, pread64,
/// newfstatat, ...) share the bit of the entry they forward to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Entry {
    Open,
    OpenAt,
    Close,
    Read,
    Pread,
    Write,
    Pwrite,
    Stat,
    StatAt,
    Fstat,
    Fcntl,
    Fdatasync,
}

impl Entry {
    fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

thread_local! {
    static IN_ENTRY: Cell<u16> = const { Cell::new(0) };
    static RPC_IN_PROGRESS: Cell<bool> = const { Cell::new(false) };
}

/// True when the calling thread must bypass the shim for this entry
/// point and invoke the kernel directly.
pub fn reentry_blocked(entry: Entry) -> bool {
    let in_entry = IN_ENTRY.try_with(|cell| cell.get() & entry.bit() != 0).unwrap_or(true);
    let in_rpc = RPC_IN_PROGRESS.try_with(|cell| cell.get()).unwrap_or(true);
    in_entry || in_rpc
}

/// RAII per-entry-point guard, held for the whole interposed call.
pub struct EntryGuard(Entry);

impl EntryGuard {
    pub fn enter(entry: Entry) -> Self {
        let _ = IN_ENTRY.try_with(|cell| cell.set(cell.get() | entry.bit()));
        Self(entry)
    }
}

impl Drop for EntryGuard {
    fn drop(&mut self) {
        let _ = IN_ENTRY.try_with(|cell| cell.set(cell.get() & !self.0.bit()));
    }
}

/// RAII shared flag, held while the RPC machinery itself may perform
/// syscalls (session construction and every session call). Nestable:
/// the previous state is restored on drop.
pub struct RpcFlag {
    prev: bool,
}

impl RpcFlag {
    pub fn set() -> Self {
        let prev = RPC_IN_PROGRESS.try_with(|cell| cell.replace(true)).unwrap_or(true);
        Self { prev }
    }
}

impl Drop for RpcFlag {
    fn drop(&mut self) {
        let _ = RPC_IN_PROGRESS.try_with(|cell| cell.set(self.prev));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_guard_blocks_only_its_own_entry() {
        assert!(!reentry_blocked(Entry::Write));
        {
            let _guard = EntryGuard::enter(Entry::Write);
            assert!(reentry_blocked(Entry::Write));
            assert!(!reentry_blocked(Entry::Read));
            assert!(!reentry_blocked(Entry::Open));
        }
        assert!(!reentry_blocked(Entry::Write));
    }

    #[test]
    fn rpc_flag_blocks_every_entry() {
        {
            let _flag = RpcFlag::set();
            assert!(reentry_blocked(Entry::Open));
            assert!(reentry_blocked(Entry::Read));
            assert!(reentry_blocked(Entry::Fdatasync));
        }
        assert!(!reentry_blocked(Entry::Open));
    }

    #[test]
    fn rpc_flag_nests() {
        let outer = RpcFlag::set();
        {
            let _inner = RpcFlag::set();
            assert!(reentry_blocked(Entry::Open));
        }
        // Inner drop must not clear the outer hold.
        assert!(reentry_blocked(Entry::Open));
        drop(outer);
        assert!(!reentry_blocked(Entry::Open));
    }

    #[test]
    fn guards_are_per_thread() {
        let _guard = EntryGuard::enter(Entry::Write);
        let other = std::thread::spawn(|| reentry_blocked(Entry::Write)).join().unwrap();
        assert!(!other);
        assert!(reentry_blocked(Entry::Write));
    }

    /// The re-entry discipline in miniature: a wrapper that re-enters
    /// itself terminates because the nested invocation sees the guard
    /// and takes the direct path instead of recursing.
    #[test]
    fn simulated_reentrant_call_terminates() {
        fn wrapper(depth: usize, bypasses: &mut usize) {
            if reentry_blocked(Entry::Write) {
                *bypasses += 1;
                return;
            }
            let _guard = EntryGuard::enter(Entry::Write);
            if depth < 64 {
                wrapper(depth + 1, bypasses);
            }
        }

        let mut bypasses = 0;
        wrapper(0, &mut bypasses);
        assert_eq!(bypasses, 1);
        assert!(!reentry_blocked(Entry::Write));
    }
}
