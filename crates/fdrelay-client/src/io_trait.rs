// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Socket I/O abstraction for the session.
//!
//! The session does not touch the socket directly; it goes through
//! this trait so the interpose shim can substitute an implementation
//! that reaches the kernel without running back through its own hooks.
//! [`StandardIo`] is the implementation for everything that is not a
//! hook context (tests, tools).

use std::io::{self, Error, ErrorKind};
use std::os::unix::io::RawFd;
use std::path::Path;

pub trait SocketIo {
    /// Connect to a unix stream socket, returning the raw descriptor.
    fn connect_unix(&self, path: &Path) -> io::Result<RawFd>;

    /// Connect to a tcp endpoint, returning the raw descriptor.
    fn connect_tcp(&self, host: &str, port: u16) -> io::Result<RawFd>;

    /// Write the whole buffer.
    fn write_all(&self, fd: RawFd, buf: &[u8]) -> io::Result<()>;

    /// Fill the whole buffer; a peer close midway is an error.
    fn read_exact(&self, fd: RawFd, buf: &mut [u8]) -> io::Result<()>;

    fn close(&self, fd: RawFd) -> io::Result<()>;
}

/// Plain implementation over std sockets and libc read/write loops.
pub struct StandardIo;

impl SocketIo for StandardIo {
    fn connect_unix(&self, path: &Path) -> io::Result<RawFd> {
        use std::os::unix::io::IntoRawFd;
        use std::os::unix::net::UnixStream;
        let stream = UnixStream::connect(path)?;
        Ok(stream.into_raw_fd())
    }

    fn connect_tcp(&self, host: &str, port: u16) -> io::Result<RawFd> {
        use std::net::TcpStream;
        use std::os::unix::io::IntoRawFd;
        let stream = TcpStream::connect((host, port))?;
        stream.set_nodelay(true)?;
        Ok(stream.into_raw_fd())
    }

    fn write_all(&self, fd: RawFd, buf: &[u8]) -> io::Result<()> {
        let mut written = 0;
        while written < buf.len() {
            let result = unsafe {
                libc::write(
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
                libc::read(
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
        let result = unsafe { libc::close(fd) };
        if result < 0 {
            Err(Error::last_os_error())
        } else {
            Ok(())
        }
    }
}
