// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Per-procedure handlers.
//!
//! Each handler translates the inbound handle, executes the real
//! syscall and fills a reply with the result and the errno captured
//! immediately after the call. Failure replies are fully populated:
//! stat records are zeroed so the wire content is deterministic.

use crate::fd_table::FdTable;
use fdrelay_proto::fcntl_table::{classify, is_dup, FcntlArgKind};
use fdrelay_proto::{
    FcntlArg, FcntlReply, FcntlRequest, LockRecord, OpenAtRequest, OpenReply, OpenRequest,
    PreadRequest, PwriteRequest, ReadReply, ReadRequest, Request, Response, SimpleReply,
    StatAtRequest, StatRecord, StatReply, StatRequest, WriteReply, WriteRequest, MAX_PAYLOAD_LEN,
};
use std::ffi::CString;
use std::io;
use std::os::unix::io::RawFd;
use tracing::{debug, warn};

fn last_errno() -> i32 {
    io::Error::last_os_error().raw_os_error().unwrap_or(libc::EIO)
}

/// Executes procedures against one connection's translation table.
pub struct Handler {
    table: FdTable,
    read_buf: Vec<u8>,
}

impl Handler {
    pub fn new() -> Self {
        Self::with_table(FdTable::new())
    }

    pub fn with_table(table: FdTable) -> Self {
        Self {
            table,
            read_buf: Vec::new(),
        }
    }

    pub fn table(&self) -> &FdTable {
        &self.table
    }

    pub fn handle(&mut self, request: Request) -> Response {
        match request {
            Request::Open(r) => Response::Open(self.open(r)),
            Request::OpenAt(r) => Response::OpenAt(self.openat(r)),
            Request::Close(r) => Response::Close(self.close(r.handle)),
            Request::Read(r) => Response::Read(self.read(r)),
            Request::Pread(r) => Response::Pread(self.pread(r)),
            Request::Write(r) => Response::Write(self.write(r)),
            Request::Pwrite(r) => Response::Pwrite(self.pwrite(r)),
            Request::Stat(r) => Response::Stat(self.stat(r)),
            Request::StatAt(r) => Response::StatAt(self.statat(r)),
            Request::Fstat(r) => Response::Fstat(self.fstat(r.handle)),
            Request::Fcntl(r) => Response::Fcntl(self.fcntl(r)),
            Request::Fdatasync(r) => Response::Fdatasync(self.fdatasync(r.handle)),
        }
    }

    fn open(&mut self, req: OpenRequest) -> OpenReply {
        let Some(path) = to_cstring(&req.path) else {
            return open_failure(libc::EINVAL);
        };
        debug!(path = %path.to_string_lossy(), flags = req.flags, mode = req.mode, "open");

        let fd = unsafe { libc::open(path.as_ptr(), req.flags, req.mode as libc::c_uint) };
        let err = last_errno();
        self.finish_open(fd, err)
    }

    fn openat(&mut self, req: OpenAtRequest) -> OpenReply {
        let Some(path) = to_cstring(&req.path) else {
            return open_failure(libc::EINVAL);
        };
        let Some(dirfd) = self.translate_dirfd(req.dirfd) else {
            return open_failure(libc::EBADF);
        };
        debug!(dirfd = req.dirfd, path = %path.to_string_lossy(), flags = req.flags, "openat");

        let fd = unsafe { libc::openat(dirfd, path.as_ptr(), req.flags, req.mode as libc::c_uint) };
        let err = last_errno();
        self.finish_open(fd, err)
    }

    /// Shared tail of the open family: install the fresh descriptor,
    /// closing it again if the table has no room.
    fn finish_open(&mut self, fd: RawFd, err: i32) -> OpenReply {
        if fd < 0 {
            return open_failure(err);
        }
        match self.table.install(fd) {
            Ok(handle) => {
                debug!(server_fd = fd, handle, "descriptor installed");
                OpenReply {
                    handle,
                    result: handle,
                    err: 0,
                }
            }
            Err(_) => {
                warn!(server_fd = fd, "translation table full, closing descriptor");
                unsafe { libc::close(fd) };
                open_failure(libc::ENFILE)
            }
        }
    }

    fn close(&mut self, handle: i32) -> SimpleReply {
        let Some(fd) = self.table.translate(handle) else {
            debug!(handle, "close of invalid handle");
            return SimpleReply {
                result: -1,
                err: libc::EBADF,
            };
        };

        let result = unsafe { libc::close(fd) };
        let err = last_errno();
        if result == 0 {
            self.table.release(handle);
            debug!(handle, server_fd = fd, "closed and released");
            SimpleReply { result: 0, err: 0 }
        } else {
            // The kernel refused; the slot stays installed because the
            // descriptor may still be open in the kernel's view.
            debug!(handle, err, "kernel close failed, slot kept");
            SimpleReply { result: -1, err }
        }
    }

    fn read(&mut self, req: ReadRequest) -> ReadReply {
        let Some(fd) = self.table.translate(req.handle) else {
            return read_failure(libc::EBADF);
        };

        let count = (req.count as usize).min(MAX_PAYLOAD_LEN);
        self.read_buf.resize(count, 0);
        let n = unsafe { libc::read(fd, self.read_buf.as_mut_ptr() as *mut libc::c_void, count) };
        let err = last_errno();
        debug!(handle = req.handle, count, result = n, "read");

        if n < 0 {
            read_failure(err)
        } else {
            ReadReply {
                result: n as i64,
                err: 0,
                data: self.read_buf[..n as usize].to_vec(),
            }
        }
    }

    fn pread(&mut self, req: PreadRequest) -> ReadReply {
        let Some(fd) = self.table.translate(req.handle) else {
            return read_failure(libc::EBADF);
        };

        let count = (req.count as usize).min(MAX_PAYLOAD_LEN);
        self.read_buf.resize(count, 0);
        let n = unsafe {
            libc::pread(
                fd,
                self.read_buf.as_mut_ptr() as *mut libc::c_void,
                count,
                req.offset as libc::off_t,
            )
        };
        let err = last_errno();
        debug!(handle = req.handle, count, offset = req.offset, result = n, "pread");

        if n < 0 {
            read_failure(err)
        } else {
            ReadReply {
                result: n as i64,
                err: 0,
                data: self.read_buf[..n as usize].to_vec(),
            }
        }
    }

    fn write(&mut self, req: WriteRequest) -> WriteReply {
        let Some(fd) = self.table.translate(req.handle) else {
            return WriteReply {
                result: -1,
                err: libc::EBADF,
            };
        };

        let n = unsafe {
            libc::write(
                fd,
                req.data.as_ptr() as *const libc::c_void,
                req.data.len(),
            )
        };
        let err = last_errno();
        debug!(handle = req.handle, count = req.data.len(), result = n, "write");

        if n < 0 {
            WriteReply { result: -1, err }
        } else {
            WriteReply {
                result: n as i64,
                err: 0,
            }
        }
    }

    fn pwrite(&mut self, req: PwriteRequest) -> WriteReply {
        let Some(fd) = self.table.translate(req.handle) else {
            return WriteReply {
                result: -1,
                err: libc::EBADF,
            };
        };

        let n = unsafe {
            libc::pwrite(
                fd,
                req.data.as_ptr() as *const libc::c_void,
                req.data.len(),
                req.offset as libc::off_t,
            )
        };
        let err = last_errno();
        debug!(handle = req.handle, count = req.data.len(), offset = req.offset, result = n, "pwrite");

        if n < 0 {
            WriteReply { result: -1, err }
        } else {
            WriteReply {
                result: n as i64,
                err: 0,
            }
        }
    }

    fn stat(&mut self, req: StatRequest) -> StatReply {
        let Some(path) = to_cstring(&req.path) else {
            return stat_failure(libc::EINVAL);
        };
        debug!(path = %path.to_string_lossy(), "stat");

        let mut st: libc::stat = unsafe { std::mem::zeroed() };
        let result = unsafe { libc::stat(path.as_ptr(), &mut st) };
        let err = last_errno();
        finish_stat(result, err, &st)
    }

    fn statat(&mut self, req: StatAtRequest) -> StatReply {
        let Some(path) = to_cstring(&req.path) else {
            return stat_failure(libc::EINVAL);
        };
        let Some(dirfd) = self.translate_dirfd(req.dirfd) else {
            return stat_failure(libc::EBADF);
        };
        debug!(dirfd = req.dirfd, path = %path.to_string_lossy(), flags = req.flags, "statat");

        let mut st: libc::stat = unsafe { std::mem::zeroed() };
        let result = unsafe { libc::fstatat(dirfd, path.as_ptr(), &mut st, req.flags) };
        let err = last_errno();
        finish_stat(result, err, &st)
    }

    fn fstat(&mut self, handle: i32) -> StatReply {
        let Some(fd) = self.table.translate(handle) else {
            return stat_failure(libc::EBADF);
        };
        debug!(handle, "fstat");

        let mut st: libc::stat = unsafe { std::mem::zeroed() };
        let result = unsafe { libc::fstat(fd, &mut st) };
        let err = last_errno();
        finish_stat(result, err, &st)
    }

    fn fcntl(&mut self, req: FcntlRequest) -> FcntlReply {
        let Some(fd) = self.table.translate(req.handle) else {
            return fcntl_failure(libc::EBADF);
        };

        // Interpret the union through the same table the shim encoded
        // it with; a mismatch means a non-conforming client.
        match (classify(req.cmd), req.arg) {
            (FcntlArgKind::Int, FcntlArg::Int(arg)) if is_dup(req.cmd) => {
                self.fcntl_dup(fd, req.cmd, arg)
            }
            (FcntlArgKind::Int, FcntlArg::Int(arg)) => {
                debug!(handle = req.handle, cmd = req.cmd, arg, "fcntl int");
                let result = unsafe { libc::fcntl(fd, req.cmd, arg) };
                let err = last_errno();
                finish_fcntl(result, err, FcntlArg::None)
            }
            (FcntlArgKind::Lock, FcntlArg::Lock(lock)) => self.fcntl_lock(fd, req.cmd, lock),
            (FcntlArgKind::None, FcntlArg::None) => {
                debug!(handle = req.handle, cmd = req.cmd, "fcntl");
                let result = unsafe { libc::fcntl(fd, req.cmd) };
                let err = last_errno();
                finish_fcntl(result, err, FcntlArg::None)
            }
            (expected, got) => {
                warn!(cmd = req.cmd, ?expected, ?got, "fcntl argument union mismatch");
                fcntl_failure(libc::EINVAL)
            }
        }
    }

    /// Duplicate-with-floor: the floor applies to the handle space,
    /// not the kernel descriptor space, so the kernel dup runs with
    /// floor 0 and the table allocator enforces the bound.
    fn fcntl_dup(&mut self, fd: RawFd, cmd: i32, min_handle: i32) -> FcntlReply {
        let new_fd = unsafe { libc::fcntl(fd, cmd, 0) };
        let err = last_errno();
        if new_fd < 0 {
            return fcntl_failure(err);
        }

        match self.table.install_from(new_fd, min_handle) {
            Ok(handle) => {
                debug!(server_fd = new_fd, handle, min_handle, "descriptor duplicated");
                finish_fcntl(handle, 0, FcntlArg::None)
            }
            Err(_) => {
                warn!(server_fd = new_fd, "translation table full, closing duplicate");
                unsafe { libc::close(new_fd) };
                fcntl_failure(libc::ENFILE)
            }
        }
    }

    fn fcntl_lock(&mut self, fd: RawFd, cmd: i32, lock: LockRecord) -> FcntlReply {
        if cmd == libc::F_SETLKW {
            // Advisory: a blocking acquisition holds this connection's
            // dispatcher until the kernel grants the lock.
            warn!("F_SETLKW stalls the session while the lock is contended");
        }

        let mut fl: libc::flock = unsafe { std::mem::zeroed() };
        lock.write_to(&mut fl);
        let result = unsafe { libc::fcntl(fd, cmd, &mut fl as *mut libc::flock) };
        let err = last_errno();
        debug!(cmd, result, "fcntl lock");

        if result < 0 {
            fcntl_failure(err)
        } else if cmd == libc::F_GETLK {
            finish_fcntl(result, 0, FcntlArg::Lock(LockRecord::from_flock(&fl)))
        } else {
            finish_fcntl(result, 0, FcntlArg::None)
        }
    }

    fn fdatasync(&mut self, handle: i32) -> SimpleReply {
        let Some(fd) = self.table.translate(handle) else {
            return SimpleReply {
                result: -1,
                err: libc::EBADF,
            };
        };
        debug!(handle, "fdatasync");

        let result = unsafe { libc::fdatasync(fd) };
        let err = last_errno();
        if result == 0 {
            SimpleReply { result: 0, err: 0 }
        } else {
            SimpleReply { result: -1, err }
        }
    }

    /// Directory handles are client handles like any other, except the
    /// cwd sentinel which passes through untranslated.
    fn translate_dirfd(&self, dirfd: i32) -> Option<RawFd> {
        if dirfd == libc::AT_FDCWD {
            Some(libc::AT_FDCWD)
        } else {
            self.table.translate(dirfd)
        }
    }
}

impl Default for Handler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Handler {
    fn drop(&mut self) {
        for fd in self.table.drain_live() {
            debug!(server_fd = fd, "closing descriptor at connection teardown");
            unsafe { libc::close(fd) };
        }
    }
}

fn to_cstring(path: &[u8]) -> Option<CString> {
    CString::new(path).ok()
}

fn open_failure(err: i32) -> OpenReply {
    OpenReply {
        handle: -1,
        result: -1,
        err,
    }
}

fn read_failure(err: i32) -> ReadReply {
    ReadReply {
        result: -1,
        err,
        data: Vec::new(),
    }
}

fn stat_failure(err: i32) -> StatReply {
    StatReply {
        result: -1,
        err,
        stat: StatRecord::zeroed(),
    }
}

fn finish_stat(result: i32, err: i32, st: &libc::stat) -> StatReply {
    if result == 0 {
        StatReply {
            result: 0,
            err: 0,
            stat: StatRecord::from_stat(st),
        }
    } else {
        stat_failure(err)
    }
}

fn fcntl_failure(err: i32) -> FcntlReply {
    FcntlReply {
        result: -1,
        err,
        arg_out: FcntlArg::None,
    }
}

fn finish_fcntl(result: i32, err: i32, arg_out: FcntlArg) -> FcntlReply {
    FcntlReply {
        result,
        err,
        arg_out,
    }
}
