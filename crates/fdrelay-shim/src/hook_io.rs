// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Hook-safe socket I/O for the session.
//!
//! Implements the client crate's [`SocketIo`] seam with raw syscalls
//! for everything the interposed entry points also cover (read, write,
//! close). `socket` and `connect` are not interposed names, so the
//! plain libc wrappers are safe there. The whole implementation runs
//! under the shared RPC flag anyway; this layer is the second line of
//! defence.

use crate::sys;
use fdrelay_client::SocketIo;
use std::io::{self, Error, ErrorKind};
use std::net::Ipv4Addr;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::RawFd;
use std::path::Path;

pub struct HookSafeIo;

impl SocketIo for HookSafeIo {
    fn connect_unix(&self, path: &Path) -> io::Result<RawFd> {
        unsafe {
            let fd = libc::socket(libc::AF_UNIX, libc::SOCK_STREAM | libc::SOCK_CLOEXEC, 0);
            if fd < 0 {
                return Err(Error::last_os_error());
            }

            let mut addr: libc::sockaddr_un = std::mem::zeroed();
            addr.sun_family = libc::AF_UNIX as libc::sa_family_t;

            let bytes = path.as_os_str().as_bytes();
            if bytes.contains(&0) || bytes.len() >= addr.sun_path.len() {
                sys::close(fd);
                return Err(Error::new(ErrorKind::InvalidInput, "bad socket path"));
            }
            std::ptr::copy_nonoverlapping(
                bytes.as_ptr() as *const libc::c_char,
                addr.sun_path.as_mut_ptr(),
                bytes.len(),
            );

            let result = libc::connect(
                fd,
                &addr as *const libc::sockaddr_un as *const libc::sockaddr,
                std::mem::size_of::<libc::sockaddr_un>() as libc::socklen_t,
            );
            if result < 0 {
                let err = Error::last_os_error();
                sys::close(fd);
                return Err(err);
            }
            Ok(fd)
        }
    }

    fn connect_tcp(&self, host: &str, port: u16) -> io::Result<RawFd> {
        // The compiled-in host is an address literal; running a name
        // resolver from inside an interposed call is off the table.
        let ip: Ipv4Addr = host
            .parse()
            .map_err(|_| Error::new(ErrorKind::InvalidInput, "host must be an IPv4 literal"))?;

        unsafe {
            let fd = libc::socket(libc::AF_INET, libc::SOCK_STREAM | libc::SOCK_CLOEXEC, 0);
            if fd < 0 {
                return Err(Error::last_os_error());
            }

            let addr = libc::sockaddr_in {
                sin_family: libc::AF_INET as libc::sa_family_t,
                sin_port: port.to_be(),
                sin_addr: libc::in_addr {
                    s_addr: u32::from_ne_bytes(ip.octets()),
                },
                sin_zero: [0; 8],
            };

            let result = libc::connect(
                fd,
                &addr as *const libc::sockaddr_in as *const libc::sockaddr,
                std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
            );
            if result < 0 {
                let err = Error::last_os_error();
                sys::close(fd);
                return Err(err);
            }
            Ok(fd)
        }
    }

    fn write_all(&self, fd: RawFd, buf: &[u8]) -> io::Result<()> {
        let mut written = 0;
        while written < buf.len() {
            let result = unsafe {
                sys::write(
                    fd,
                    buf[written..].as_ptr() as *const libc::c_void,
                    buf.len() - written,
                )
            };
            if result < 0 {
                return Err(Error::last_os_error());
            }
            written += result as usize;
        }
        Ok(())
    }

    fn read_exact(&self, fd: RawFd, buf: &mut [u8]) -> io::Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let result = unsafe {
                sys::read(
                    fd,
                    buf[filled..].as_mut_ptr() as *mut libc::c_void,
                    buf.len() - filled,
                )
            };
            if result < 0 {
                return Err(Error::last_os_error());
            }
            if result == 0 {
                return Err(Error::new(ErrorKind::UnexpectedEof, "unexpected EOF"));
            }
            filled += result as usize;
        }
        Ok(())
    }

    fn close(&self, fd: RawFd) -> io::Result<()> {
        let result = unsafe { sys::close(fd) };
        if result < 0 {
            Err(Error::last_os_error())
        } else {
            Ok(())
        }
    }
}
