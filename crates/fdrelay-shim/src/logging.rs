// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Hook-safe debug logging.
//!
//! Messages are formatted into a fixed stack buffer and written to
//! stderr with a raw write syscall, so logging can never re-enter the
//! interposed `write`. The caller's errno is saved around the write.
//! Enabled by setting `FDRELAY_SHIM_LOG` to anything but "0"/"false".

use once_cell::sync::Lazy;
use std::fmt::{self, Write as _};

pub const ENV_LOG: &str = "FDRELAY_SHIM_LOG";

const LOG_PREFIX: &str = "[fdrelay-shim] ";
const BUF_LEN: usize = 256;

static ENABLED: Lazy<bool> = Lazy::new(|| match std::env::var_os(ENV_LOG) {
    Some(value) => {
        let value = value.to_string_lossy();
        value != "0" && !value.eq_ignore_ascii_case("false")
    }
    None => false,
});

pub fn enabled() -> bool {
    *ENABLED
}

struct StackBuf {
    buf: [u8; BUF_LEN],
    len: usize,
}

impl fmt::Write for StackBuf {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        // Overlong messages are truncated, not allocated.
        let take = (self.buf.len() - self.len).min(s.len());
        self.buf[self.len..self.len + take].copy_from_slice(&s.as_bytes()[..take]);
        self.len += take;
        Ok(())
    }
}

pub fn write_log(args: fmt::Arguments<'_>) {
    let mut out = StackBuf {
        buf: [0; BUF_LEN],
        len: 0,
    };
    let _ = out.write_str(LOG_PREFIX);
    let _ = out.write_fmt(args);
    if out.len < BUF_LEN {
        out.buf[out.len] = b'\n';
        out.len += 1;
    } else {
        out.buf[BUF_LEN - 1] = b'\n';
    }

    unsafe {
        let errno = libc::__errno_location();
        let saved = *errno;
        libc::syscall(
            libc::SYS_write,
            libc::STDERR_FILENO,
            out.buf.as_ptr(),
            out.len,
        );
        *errno = saved;
    }
}

macro_rules! shim_log {
    ($($arg:tt)*) => {
        if $crate::logging::enabled() {
            $crate::logging::write_log(format_args!($($arg)*));
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_messages_are_truncated_with_newline() {
        let mut out = StackBuf {
            buf: [0; BUF_LEN],
            len: 0,
        };
        let big = "x".repeat(BUF_LEN * 2);
        out.write_str(&big).unwrap();
        assert_eq!(out.len, BUF_LEN);
    }

    #[test]
    fn short_messages_fit() {
        let mut out = StackBuf {
            buf: [0; BUF_LEN],
            len: 0,
        };
        out.write_str("hello").unwrap();
        assert_eq!(&out.buf[..out.len], b"hello");
    }
}
