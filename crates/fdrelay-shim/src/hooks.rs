// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Interposed entry points.
//!
//! Every hook follows the same template: extract the variadic
//! argument where the entry has one, test both guard classes and
//! bypass to the kernel if either is set, take the per-entry guard,
//! relay through the ops layer, copy out-parameters back and return.
//! The 64-bit aliases forward to their base entry, so they share its
//! guard bit.

use crate::guards::{reentry_blocked, Entry, EntryGuard};
use crate::ops::{self, Outcome};
use crate::sys;
use fdrelay_proto::fcntl_table::{classify, FcntlArgKind};
use fdrelay_proto::{FcntlArg, LockRecord};
use libc::{c_char, c_int, c_void, mode_t, off_t, size_t, ssize_t};
use std::ffi::CStr;

redhook::hook! {
    unsafe fn open(path: *const c_char, flags: c_int, mode: mode_t) -> c_int => shim_open {
        // The mode argument only exists when a creation flag asks for
        // it; otherwise the register carries garbage.
        let mode = if flags & (libc::O_CREAT | libc::O_TMPFILE) != 0 { mode } else { 0 };
        if path.is_null() || reentry_blocked(Entry::Open) {
            return sys::open(path, flags, mode);
        }
        let _guard = EntryGuard::enter(Entry::Open);
        let cpath = CStr::from_ptr(path);
        shim_log!("intercepted open({:?}, {:#x}, {:#o})", cpath, flags, mode);
        match ops::open(cpath, flags, mode) {
            Outcome::Done(result) => result,
            Outcome::Fallback => sys::open(path, flags, mode),
        }
    }
}

redhook::hook! {
    unsafe fn open64(path: *const c_char, flags: c_int, mode: mode_t) -> c_int => shim_open64 {
        shim_open(path, flags | libc::O_LARGEFILE, mode)
    }
}

redhook::hook! {
    unsafe fn openat(dirfd: c_int, path: *const c_char, flags: c_int, mode: mode_t) -> c_int => shim_openat {
        let mode = if flags & (libc::O_CREAT | libc::O_TMPFILE) != 0 { mode } else { 0 };
        if path.is_null() || reentry_blocked(Entry::OpenAt) {
            return sys::openat(dirfd, path, flags, mode);
        }
        let _guard = EntryGuard::enter(Entry::OpenAt);
        let cpath = CStr::from_ptr(path);
        shim_log!("intercepted openat({}, {:?}, {:#x})", dirfd, cpath, flags);
        match ops::openat(dirfd, cpath, flags, mode) {
            Outcome::Done(result) => result,
            Outcome::Fallback => sys::openat(dirfd, path, flags, mode),
        }
    }
}

redhook::hook! {
    unsafe fn close(fd: c_int) -> c_int => shim_close {
        if reentry_blocked(Entry::Close) {
            return sys::close(fd);
        }
        let _guard = EntryGuard::enter(Entry::Close);
        shim_log!("intercepted close({})", fd);
        match ops::close(fd) {
            Outcome::Done(result) => result,
            Outcome::Fallback => sys::close(fd),
        }
    }
}

redhook::hook! {
    unsafe fn read(fd: c_int, buf: *mut c_void, count: size_t) -> ssize_t => shim_read {
        if (buf.is_null() && count > 0) || reentry_blocked(Entry::Read) {
            return sys::read(fd, buf, count);
        }
        let _guard = EntryGuard::enter(Entry::Read);
        shim_log!("intercepted read({}, {})", fd, count);
        let slice: &mut [u8] = if count == 0 {
            &mut []
        } else {
            std::slice::from_raw_parts_mut(buf as *mut u8, count)
        };
        match ops::read(fd, slice) {
            Outcome::Done(result) => result,
            Outcome::Fallback => sys::read(fd, buf, count),
        }
    }
}

redhook::hook! {
    unsafe fn pread(fd: c_int, buf: *mut c_void, count: size_t, offset: off_t) -> ssize_t => shim_pread {
        if (buf.is_null() && count > 0) || reentry_blocked(Entry::Pread) {
            return sys::pread(fd, buf, count, offset);
        }
        let _guard = EntryGuard::enter(Entry::Pread);
        shim_log!("intercepted pread({}, {}, {})", fd, count, offset);
        let slice: &mut [u8] = if count == 0 {
            &mut []
        } else {
            std::slice::from_raw_parts_mut(buf as *mut u8, count)
        };
        match ops::pread(fd, slice, offset) {
            Outcome::Done(result) => result,
            Outcome::Fallback => sys::pread(fd, buf, count, offset),
        }
    }
}

redhook::hook! {
    unsafe fn pread64(fd: c_int, buf: *mut c_void, count: size_t, offset: off_t) -> ssize_t => shim_pread64 {
        shim_pread(fd, buf, count, offset)
    }
}

redhook::hook! {
    unsafe fn write(fd: c_int, buf: *const c_void, count: size_t) -> ssize_t => shim_write {
        if (buf.is_null() && count > 0) || reentry_blocked(Entry::Write) {
            return sys::write(fd, buf, count);
        }
        let _guard = EntryGuard::enter(Entry::Write);
        shim_log!("intercepted write({}, {})", fd, count);
        let slice: &[u8] = if count == 0 {
            &[]
        } else {
            std::slice::from_raw_parts(buf as *const u8, count)
        };
        match ops::write(fd, slice) {
            Outcome::Done(result) => result,
            Outcome::Fallback => sys::write(fd, buf, count),
        }
    }
}

redhook::hook! {
    unsafe fn pwrite(fd: c_int, buf: *const c_void, count: size_t, offset: off_t) -> ssize_t => shim_pwrite {
        if (buf.is_null() && count > 0) || reentry_blocked(Entry::Pwrite) {
            return sys::pwrite(fd, buf, count, offset);
        }
        let _guard = EntryGuard::enter(Entry::Pwrite);
        shim_log!("intercepted pwrite({}, {}, {})", fd, count, offset);
        let slice: &[u8] = if count == 0 {
            &[]
        } else {
            std::slice::from_raw_parts(buf as *const u8, count)
        };
        match ops::pwrite(fd, slice, offset) {
            Outcome::Done(result) => result,
            Outcome::Fallback => sys::pwrite(fd, buf, count, offset),
        }
    }
}

redhook::hook! {
    unsafe fn pwrite64(fd: c_int, buf: *const c_void, count: size_t, offset: off_t) -> ssize_t => shim_pwrite64 {
        shim_pwrite(fd, buf, count, offset)
    }
}

redhook::hook! {
    unsafe fn stat(path: *const c_char, statbuf: *mut libc::stat) -> c_int => shim_stat {
        if path.is_null() || statbuf.is_null() || reentry_blocked(Entry::Stat) {
            return sys::stat(path, statbuf);
        }
        let _guard = EntryGuard::enter(Entry::Stat);
        let cpath = CStr::from_ptr(path);
        shim_log!("intercepted stat({:?})", cpath);
        match ops::stat(cpath) {
            Outcome::Done((result, record)) => {
                copy_stat_out(result, &record, statbuf);
                result
            }
            Outcome::Fallback => sys::stat(path, statbuf),
        }
    }
}

redhook::hook! {
    unsafe fn fstat(fd: c_int, statbuf: *mut libc::stat) -> c_int => shim_fstat {
        if statbuf.is_null() || reentry_blocked(Entry::Fstat) {
            return sys::fstat(fd, statbuf);
        }
        let _guard = EntryGuard::enter(Entry::Fstat);
        shim_log!("intercepted fstat({})", fd);
        match ops::fstat(fd) {
            Outcome::Done((result, record)) => {
                copy_stat_out(result, &record, statbuf);
                result
            }
            Outcome::Fallback => sys::fstat(fd, statbuf),
        }
    }
}

redhook::hook! {
    unsafe fn fstatat(dirfd: c_int, path: *const c_char, statbuf: *mut libc::stat, flags: c_int) -> c_int => shim_fstatat {
        if path.is_null() || statbuf.is_null() || reentry_blocked(Entry::StatAt) {
            return sys::fstatat(dirfd, path, statbuf, flags);
        }
        let _guard = EntryGuard::enter(Entry::StatAt);
        let cpath = CStr::from_ptr(path);
        shim_log!("intercepted fstatat({}, {:?}, {:#x})", dirfd, cpath, flags);
        match ops::fstatat(dirfd, cpath, flags) {
            Outcome::Done((result, record)) => {
                copy_stat_out(result, &record, statbuf);
                result
            }
            Outcome::Fallback => sys::fstatat(dirfd, path, statbuf, flags),
        }
    }
}

/// Kernel-name alias for fstatat. Exported directly: glibc has no
/// `newfstatat` symbol for the hook machinery's dlsym fallback to
/// find.
#[no_mangle]
pub unsafe extern "C" fn newfstatat(
    dirfd: c_int,
    path: *const c_char,
    statbuf: *mut libc::stat,
    flags: c_int,
) -> c_int {
    shim_fstatat(dirfd, path, statbuf, flags)
}

redhook::hook! {
    unsafe fn fcntl(fd: c_int, cmd: c_int, arg: *mut c_void) -> c_int => shim_fcntl {
        if reentry_blocked(Entry::Fcntl) {
            return sys::fcntl(fd, cmd, arg as usize);
        }
        let _guard = EntryGuard::enter(Entry::Fcntl);
        shim_log!("intercepted fcntl({}, {})", fd, cmd);

        let wire_arg = match classify(cmd) {
            FcntlArgKind::None => FcntlArg::None,
            FcntlArgKind::Int => FcntlArg::Int(arg as usize as c_int),
            FcntlArgKind::Lock => {
                if arg.is_null() {
                    return sys::fcntl(fd, cmd, arg as usize);
                }
                FcntlArg::Lock(LockRecord::from_flock(&*(arg as *const libc::flock)))
            }
        };

        match ops::fcntl(fd, cmd, wire_arg) {
            Outcome::Done((result, lock_out)) => {
                if result >= 0 && cmd == libc::F_GETLK {
                    if let Some(lock) = lock_out {
                        lock.write_to(&mut *(arg as *mut libc::flock));
                    }
                }
                result
            }
            Outcome::Fallback => sys::fcntl(fd, cmd, arg as usize),
        }
    }
}

redhook::hook! {
    unsafe fn fdatasync(fd: c_int) -> c_int => shim_fdatasync {
        if reentry_blocked(Entry::Fdatasync) {
            return sys::fdatasync(fd);
        }
        let _guard = EntryGuard::enter(Entry::Fdatasync);
        shim_log!("intercepted fdatasync({})", fd);
        match ops::fdatasync(fd) {
            Outcome::Done(result) => result,
            Outcome::Fallback => sys::fdatasync(fd),
        }
    }
}

/// Zero the caller's struct, then fill it from the record; only on
/// success.
unsafe fn copy_stat_out(result: c_int, record: &fdrelay_proto::StatRecord, statbuf: *mut libc::stat) {
    if result >= 0 {
        std::ptr::write_bytes(statbuf, 0, 1);
        record.write_to(&mut *statbuf);
    }
}
