// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Request validation against the protocol bounds.
//!
//! The client validates before marshalling so an over-limit argument
//! fails locally instead of tearing down the session. The server does
//! not need to call this: its decoder enforces the same bounds while
//! reading the frame.

use crate::messages::Request;
use crate::{MAX_PATH_LEN, MAX_PAYLOAD_LEN};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("path of {len} bytes exceeds the {MAX_PATH_LEN}-byte bound")]
    PathTooLong { len: usize },

    #[error("payload of {len} bytes exceeds the {MAX_PAYLOAD_LEN}-byte bound")]
    PayloadTooLarge { len: usize },
}

pub fn validate_request(request: &Request) -> Result<(), ValidationError> {
    match request {
        Request::Open(r) => check_path(&r.path),
        Request::OpenAt(r) => check_path(&r.path),
        Request::Stat(r) => check_path(&r.path),
        Request::StatAt(r) => check_path(&r.path),
        Request::Write(r) => check_payload(&r.data),
        Request::Pwrite(r) => check_payload(&r.data),
        Request::Close(_)
        | Request::Read(_)
        | Request::Pread(_)
        | Request::Fstat(_)
        | Request::Fcntl(_)
        | Request::Fdatasync(_) => Ok(()),
    }
}

fn check_path(path: &[u8]) -> Result<(), ValidationError> {
    if path.len() > MAX_PATH_LEN {
        return Err(ValidationError::PathTooLong { len: path.len() });
    }
    Ok(())
}

fn check_payload(data: &[u8]) -> Result<(), ValidationError> {
    if data.len() > MAX_PAYLOAD_LEN {
        return Err(ValidationError::PayloadTooLarge { len: data.len() });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{OpenRequest, StatRequest, WriteRequest};

    #[test]
    fn in_bounds_requests_pass() {
        let req = Request::Open(OpenRequest {
            path: b"/tmp/file".to_vec(),
            flags: 0,
            mode: 0,
        });
        assert_eq!(validate_request(&req), Ok(()));

        let req = Request::Write(WriteRequest {
            handle: 3,
            data: vec![0u8; MAX_PAYLOAD_LEN],
        });
        assert_eq!(validate_request(&req), Ok(()));
    }

    #[test]
    fn over_limit_path_is_refused() {
        let req = Request::Stat(StatRequest {
            path: vec![b'x'; MAX_PATH_LEN + 1],
        });
        assert_eq!(
            validate_request(&req),
            Err(ValidationError::PathTooLong {
                len: MAX_PATH_LEN + 1
            })
        );
    }

    #[test]
    fn over_limit_payload_is_refused() {
        let req = Request::Write(WriteRequest {
            handle: 3,
            data: vec![0u8; MAX_PAYLOAD_LEN + 1],
        });
        assert_eq!(
            validate_request(&req),
            Err(ValidationError::PayloadTooLarge {
                len: MAX_PAYLOAD_LEN + 1
            })
        );
    }
}
