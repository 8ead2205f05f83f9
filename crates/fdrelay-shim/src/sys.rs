// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Direct kernel invocation.
//!
//! Raw syscalls, used by the guard-bypass and fallback paths and by
//! the hook-safe socket I/O. Going through `libc::syscall` instead of
//! the named libc wrappers matters: the wrappers resolve against this
//! preloaded library's own exported symbols, which is exactly the
//! recursion the guards exist to stop. errno is set by the syscall
//! wrapper as usual.

use libc::{c_char, c_int, c_void, mode_t, off_t, size_t, ssize_t};

pub unsafe fn open(path: *const c_char, flags: c_int, mode: mode_t) -> c_int {
    libc::syscall(libc::SYS_openat, libc::AT_FDCWD, path, flags, mode as libc::c_uint) as c_int
}

pub unsafe fn openat(dirfd: c_int, path: *const c_char, flags: c_int, mode: mode_t) -> c_int {
    libc::syscall(libc::SYS_openat, dirfd, path, flags, mode as libc::c_uint) as c_int
}

pub unsafe fn close(fd: c_int) -> c_int {
    libc::syscall(libc::SYS_close, fd) as c_int
}

pub unsafe fn read(fd: c_int, buf: *mut c_void, count: size_t) -> ssize_t {
    libc::syscall(libc::SYS_read, fd, buf, count) as ssize_t
}

pub unsafe fn pread(fd: c_int, buf: *mut c_void, count: size_t, offset: off_t) -> ssize_t {
    libc::syscall(libc::SYS_pread64, fd, buf, count, offset) as ssize_t
}

pub unsafe fn write(fd: c_int, buf: *const c_void, count: size_t) -> ssize_t {
    libc::syscall(libc::SYS_write, fd, buf, count) as ssize_t
}

pub unsafe fn pwrite(fd: c_int, buf: *const c_void, count: size_t, offset: off_t) -> ssize_t {
    libc::syscall(libc::SYS_pwrite64, fd, buf, count, offset) as ssize_t
}

pub unsafe fn stat(path: *const c_char, st: *mut libc::stat) -> c_int {
    fstatat(libc::AT_FDCWD, path, st, 0)
}

pub unsafe fn fstat(fd: c_int, st: *mut libc::stat) -> c_int {
    libc::syscall(libc::SYS_fstat, fd, st) as c_int
}

pub unsafe fn fstatat(dirfd: c_int, path: *const c_char, st: *mut libc::stat, flags: c_int) -> c_int {
    libc::syscall(libc::SYS_newfstatat, dirfd, path, st, flags) as c_int
}

/// The third argument is carried as a machine word: an integer for the
/// int-shaped commands, a pointer for the lock-shaped ones, ignored by
/// the rest.
pub unsafe fn fcntl(fd: c_int, cmd: c_int, arg: usize) -> c_int {
    libc::syscall(libc::SYS_fcntl, fd, cmd, arg) as c_int
}

pub unsafe fn fdatasync(fd: c_int) -> c_int {
    libc::syscall(libc::SYS_fdatasync, fd) as c_int
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    #[test]
    fn direct_syscalls_match_kernel_behaviour() {
        let missing = CString::new("/tmp/p3_tb_sys_missing_xyz").unwrap();
        let fd = unsafe { open(missing.as_ptr(), libc::O_RDONLY, 0) };
        assert_eq!(fd, -1);
        assert_eq!(std::io::Error::last_os_error().raw_os_error(), Some(libc::ENOENT));

        let devnull = CString::new("/dev/null").unwrap();
        let fd = unsafe { open(devnull.as_ptr(), libc::O_RDONLY, 0) };
        assert!(fd >= 0);

        let mut buf = [0u8; 8];
        let n = unsafe { read(fd, buf.as_mut_ptr() as *mut c_void, buf.len()) };
        assert_eq!(n, 0);

        let mut st: libc::stat = unsafe { std::mem::zeroed() };
        assert_eq!(unsafe { fstat(fd, &mut st) }, 0);

        assert_eq!(unsafe { close(fd) }, 0);
        assert_eq!(unsafe { close(fd) }, -1);
        assert_eq!(std::io::Error::last_os_error().raw_os_error(), Some(libc::EBADF));
    }
}
