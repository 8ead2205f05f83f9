// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Remote execution of each procedure.
//!
//! This layer sits between the raw entry points and the session: it
//! marshals arguments, drives the call, restores the caller's errno
//! from the reply and hands back either a finished result or the
//! fallback signal. Payloads larger than the protocol bound are
//! chunked here (writes) and reassembled here (reads); the blocking
//! lock command is converted to a polling loop so it can never
//! monopolise the session.

use crate::state::{self, CallOutcome};
use fdrelay_proto::{
    CloseRequest, FcntlArg, FcntlRequest, FdatasyncRequest, FstatRequest, LockRecord,
    OpenAtRequest, OpenRequest, PreadRequest, PwriteRequest, ReadRequest, Request, Response,
    StatAtRequest, StatRecord, StatRequest, WriteRequest, MAX_PATH_LEN, MAX_PAYLOAD_LEN,
};
use libc::{c_int, mode_t, off_t, ssize_t};
use std::ffi::CStr;

/// What an interposed entry point should do next.
pub enum Outcome<T> {
    /// The call is finished and errno is already set.
    Done(T),
    /// No session; invoke the kernel directly with the original
    /// arguments.
    Fallback,
}

fn set_errno(err: i32) {
    unsafe {
        *libc::__errno_location() = err;
    }
}

enum CallResult {
    Response(Response),
    Errno(i32),
    Fallback,
}

fn call(request: &Request) -> CallResult {
    match state::call(request) {
        CallOutcome::Response(response) => CallResult::Response(response),
        CallOutcome::SessionBroken => CallResult::Errno(libc::EIO),
        CallOutcome::Refused => CallResult::Errno(libc::EINVAL),
        CallOutcome::NoSession => CallResult::Fallback,
    }
}

pub fn open(path: &CStr, flags: c_int, mode: mode_t) -> Outcome<c_int> {
    if path.to_bytes().len() > MAX_PATH_LEN {
        set_errno(libc::ENAMETOOLONG);
        return Outcome::Done(-1);
    }
    match call(&Request::Open(OpenRequest {
        path: path.to_bytes().to_vec(),
        flags,
        mode: mode as u32,
    })) {
        CallResult::Response(Response::Open(reply)) => {
            shim_log!("open reply: handle {} errno {}", reply.result, reply.err);
            set_errno(reply.err);
            Outcome::Done(reply.result)
        }
        other => finish_int(other),
    }
}

pub fn openat(dirfd: c_int, path: &CStr, flags: c_int, mode: mode_t) -> Outcome<c_int> {
    if path.to_bytes().len() > MAX_PATH_LEN {
        set_errno(libc::ENAMETOOLONG);
        return Outcome::Done(-1);
    }
    match call(&Request::OpenAt(OpenAtRequest {
        dirfd,
        path: path.to_bytes().to_vec(),
        flags,
        mode: mode as u32,
    })) {
        CallResult::Response(Response::OpenAt(reply)) => {
            shim_log!("openat reply: handle {} errno {}", reply.result, reply.err);
            set_errno(reply.err);
            Outcome::Done(reply.result)
        }
        other => finish_int(other),
    }
}

pub fn close(handle: c_int) -> Outcome<c_int> {
    match call(&Request::Close(CloseRequest { handle })) {
        CallResult::Response(Response::Close(reply)) => {
            set_errno(reply.err);
            Outcome::Done(reply.result)
        }
        other => finish_int(other),
    }
}

/// Sequential read, re-issued until the caller's buffer is satisfied,
/// the kernel reports EOF, or a chunk comes back short. At most
/// min(server bytes, caller bytes) land in the buffer.
pub fn read(handle: c_int, buf: &mut [u8]) -> Outcome<ssize_t> {
    let mut filled = 0usize;
    let mut err = 0;
    loop {
        let want = (buf.len() - filled).min(MAX_PAYLOAD_LEN);
        match call(&Request::Read(ReadRequest {
            handle,
            count: want as u32,
        })) {
            CallResult::Response(Response::Read(reply)) => {
                if reply.result < 0 {
                    if filled == 0 {
                        set_errno(reply.err);
                        return Outcome::Done(-1);
                    }
                    err = reply.err;
                    break;
                }
                let take = reply.data.len().min(want);
                buf[filled..filled + take].copy_from_slice(&reply.data[..take]);
                filled += take;
                err = reply.err;
                if reply.result == 0 || take < want || filled == buf.len() {
                    break;
                }
            }
            other => match abort_loop(other, filled) {
                LoopAbort::Return(outcome) => return outcome,
                LoopAbort::Partial(e) => {
                    err = e;
                    break;
                }
            },
        }
    }
    set_errno(err);
    Outcome::Done(filled as ssize_t)
}

pub fn pread(handle: c_int, buf: &mut [u8], offset: off_t) -> Outcome<ssize_t> {
    let mut filled = 0usize;
    let mut err = 0;
    loop {
        let want = (buf.len() - filled).min(MAX_PAYLOAD_LEN);
        match call(&Request::Pread(PreadRequest {
            handle,
            count: want as u32,
            offset: offset as i64 + filled as i64,
        })) {
            CallResult::Response(Response::Pread(reply)) => {
                if reply.result < 0 {
                    if filled == 0 {
                        set_errno(reply.err);
                        return Outcome::Done(-1);
                    }
                    err = reply.err;
                    break;
                }
                let take = reply.data.len().min(want);
                buf[filled..filled + take].copy_from_slice(&reply.data[..take]);
                filled += take;
                err = reply.err;
                if reply.result == 0 || take < want || filled == buf.len() {
                    break;
                }
            }
            other => match abort_loop(other, filled) {
                LoopAbort::Return(outcome) => return outcome,
                LoopAbort::Partial(e) => {
                    err = e;
                    break;
                }
            },
        }
    }
    set_errno(err);
    Outcome::Done(filled as ssize_t)
}

/// Chunked write: payloads above the protocol bound are split and sent
/// back-to-back. A short count from the server stops the loop and
/// surfaces as a plain partial write.
pub fn write(handle: c_int, data: &[u8]) -> Outcome<ssize_t> {
    let total = data.len();
    let mut written = 0usize;
    let mut err = 0;
    loop {
        let end = (written + MAX_PAYLOAD_LEN).min(total);
        let chunk = &data[written..end];
        match call(&Request::Write(WriteRequest {
            handle,
            data: chunk.to_vec(),
        })) {
            CallResult::Response(Response::Write(reply)) => {
                if reply.result < 0 {
                    if written == 0 {
                        set_errno(reply.err);
                        return Outcome::Done(-1);
                    }
                    err = reply.err;
                    break;
                }
                written += reply.result as usize;
                err = reply.err;
                if (reply.result as usize) < chunk.len() || written >= total {
                    break;
                }
            }
            other => match abort_loop(other, written) {
                LoopAbort::Return(outcome) => return outcome,
                LoopAbort::Partial(e) => {
                    err = e;
                    break;
                }
            },
        }
    }
    set_errno(err);
    Outcome::Done(written as ssize_t)
}

pub fn pwrite(handle: c_int, data: &[u8], offset: off_t) -> Outcome<ssize_t> {
    let total = data.len();
    let mut written = 0usize;
    let mut err = 0;
    loop {
        let end = (written + MAX_PAYLOAD_LEN).min(total);
        let chunk = &data[written..end];
        match call(&Request::Pwrite(PwriteRequest {
            handle,
            offset: offset as i64 + written as i64,
            data: chunk.to_vec(),
        })) {
            CallResult::Response(Response::Pwrite(reply)) => {
                if reply.result < 0 {
                    if written == 0 {
                        set_errno(reply.err);
                        return Outcome::Done(-1);
                    }
                    err = reply.err;
                    break;
                }
                written += reply.result as usize;
                err = reply.err;
                if (reply.result as usize) < chunk.len() || written >= total {
                    break;
                }
            }
            other => match abort_loop(other, written) {
                LoopAbort::Return(outcome) => return outcome,
                LoopAbort::Partial(e) => {
                    err = e;
                    break;
                }
            },
        }
    }
    set_errno(err);
    Outcome::Done(written as ssize_t)
}

pub fn stat(path: &CStr) -> Outcome<(c_int, StatRecord)> {
    if path.to_bytes().len() > MAX_PATH_LEN {
        set_errno(libc::ENAMETOOLONG);
        return Outcome::Done((-1, StatRecord::zeroed()));
    }
    match call(&Request::Stat(StatRequest {
        path: path.to_bytes().to_vec(),
    })) {
        CallResult::Response(Response::Stat(reply)) => {
            set_errno(reply.err);
            Outcome::Done((reply.result, reply.stat))
        }
        other => finish_stat(other),
    }
}

pub fn fstatat(dirfd: c_int, path: &CStr, flags: c_int) -> Outcome<(c_int, StatRecord)> {
    if path.to_bytes().len() > MAX_PATH_LEN {
        set_errno(libc::ENAMETOOLONG);
        return Outcome::Done((-1, StatRecord::zeroed()));
    }
    match call(&Request::StatAt(StatAtRequest {
        dirfd,
        path: path.to_bytes().to_vec(),
        flags,
    })) {
        CallResult::Response(Response::StatAt(reply)) => {
            set_errno(reply.err);
            Outcome::Done((reply.result, reply.stat))
        }
        other => finish_stat(other),
    }
}

pub fn fstat(handle: c_int) -> Outcome<(c_int, StatRecord)> {
    match call(&Request::Fstat(FstatRequest { handle })) {
        CallResult::Response(Response::Fstat(reply)) => {
            set_errno(reply.err);
            Outcome::Done((reply.result, reply.stat))
        }
        other => finish_stat(other),
    }
}

pub fn fcntl(handle: c_int, cmd: c_int, arg: FcntlArg) -> Outcome<(c_int, Option<LockRecord>)> {
    if cmd == libc::F_SETLKW {
        return fcntl_setlkw_poll(handle, arg);
    }
    match call(&Request::Fcntl(FcntlRequest { handle, cmd, arg })) {
        CallResult::Response(Response::Fcntl(reply)) => {
            shim_log!("fcntl reply: result {} errno {}", reply.result, reply.err);
            set_errno(reply.err);
            let out = match reply.arg_out {
                FcntlArg::Lock(lock) => Some(lock),
                _ => None,
            };
            Outcome::Done((reply.result, out))
        }
        CallResult::Response(_) => {
            set_errno(libc::EIO);
            Outcome::Done((-1, None))
        }
        CallResult::Errno(err) => {
            set_errno(err);
            Outcome::Done((-1, None))
        }
        CallResult::Fallback => Outcome::Fallback,
    }
}

/// A blocking lock would hold the session for as long as the kernel
/// blocks, stalling every later call on this thread. Poll the
/// non-blocking variant instead.
fn fcntl_setlkw_poll(handle: c_int, arg: FcntlArg) -> Outcome<(c_int, Option<LockRecord>)> {
    shim_log!("F_SETLKW converted to an F_SETLK polling loop");
    loop {
        match call(&Request::Fcntl(FcntlRequest {
            handle,
            cmd: libc::F_SETLK,
            arg: arg.clone(),
        })) {
            CallResult::Response(Response::Fcntl(reply)) => {
                if reply.result >= 0 {
                    set_errno(reply.err);
                    return Outcome::Done((reply.result, None));
                }
                if reply.err == libc::EAGAIN || reply.err == libc::EACCES {
                    sleep_poll_interval();
                    continue;
                }
                set_errno(reply.err);
                return Outcome::Done((reply.result, None));
            }
            CallResult::Response(_) => {
                set_errno(libc::EIO);
                return Outcome::Done((-1, None));
            }
            CallResult::Errno(err) => {
                set_errno(err);
                return Outcome::Done((-1, None));
            }
            CallResult::Fallback => return Outcome::Fallback,
        }
    }
}

fn sleep_poll_interval() {
    let ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 10_000_000,
    };
    unsafe {
        libc::nanosleep(&ts, std::ptr::null_mut());
    }
}

pub fn fdatasync(handle: c_int) -> Outcome<c_int> {
    match call(&Request::Fdatasync(FdatasyncRequest { handle })) {
        CallResult::Response(Response::Fdatasync(reply)) => {
            set_errno(reply.err);
            Outcome::Done(reply.result)
        }
        other => finish_int(other),
    }
}

/// Shared tail for integer-result procedures: a mismatched reply body
/// counts as a transport failure.
fn finish_int(result: CallResult) -> Outcome<c_int> {
    match result {
        CallResult::Response(_) => {
            set_errno(libc::EIO);
            Outcome::Done(-1)
        }
        CallResult::Errno(err) => {
            set_errno(err);
            Outcome::Done(-1)
        }
        CallResult::Fallback => Outcome::Fallback,
    }
}

fn finish_stat(result: CallResult) -> Outcome<(c_int, StatRecord)> {
    match result {
        CallResult::Response(_) => {
            set_errno(libc::EIO);
            Outcome::Done((-1, StatRecord::zeroed()))
        }
        CallResult::Errno(err) => {
            set_errno(err);
            Outcome::Done((-1, StatRecord::zeroed()))
        }
        CallResult::Fallback => Outcome::Fallback,
    }
}

enum LoopAbort<T> {
    Return(Outcome<T>),
    Partial(i32),
}

/// Transport trouble inside a chunking loop: with nothing transferred
/// the normal single-call rules apply; with a partial transfer the
/// count so far is returned like any short read/write.
fn abort_loop<T: From<i8>>(result: CallResult, progress: usize) -> LoopAbort<T> {
    match result {
        CallResult::Response(_) => {
            if progress == 0 {
                set_errno(libc::EIO);
                LoopAbort::Return(Outcome::Done(T::from(-1)))
            } else {
                LoopAbort::Partial(libc::EIO)
            }
        }
        CallResult::Errno(err) => {
            if progress == 0 {
                set_errno(err);
                LoopAbort::Return(Outcome::Done(T::from(-1)))
            } else {
                LoopAbort::Partial(err)
            }
        }
        CallResult::Fallback => {
            if progress == 0 {
                LoopAbort::Return(Outcome::Fallback)
            } else {
                // A session can only vanish mid-loop by breaking, so
                // this arm is unreachable in practice; treat it like a
                // broken session.
                LoopAbort::Partial(libc::EIO)
            }
        }
    }
}
