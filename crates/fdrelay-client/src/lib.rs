// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Client session for the fdrelay protocol.
//!
//! A [`Session`] is one connected stream endpoint with exactly one
//! outstanding call at a time: `call` writes a framed request and
//! blocks until the matching reply frame is read back. A session that
//! fails a call is broken; the owner must drop it and (if it wants to
//! keep going) construct a new one. There is no retry and no
//! reconnection here by design.

pub mod io_trait;

pub use io_trait::{SocketIo, StandardIo};

use fdrelay_proto::transport::Endpoint;
use fdrelay_proto::{validate_request, Procedure, Request, Response, ValidationError};
use fdrelay_wire::{
    frame_payload_len, CallHeader, Decode, Decoder, Encode, Encoder, ReplyHeader, ReplyStatus,
    WireError, FRAME_HEADER_LEN,
};
use std::io;
use std::os::unix::io::RawFd;
use thiserror::Error;

/// Ways a call can fail. Every variant means the session is no longer
/// usable except [`SessionError::Validation`], which is detected
/// before anything is written.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("transport: {0}")]
    Io(#[from] io::Error),

    #[error("codec: {0}")]
    Wire(#[from] WireError),

    #[error("request refused: {0}")]
    Validation(#[from] ValidationError),

    #[error("server rejected call with status {0:?}")]
    Rejected(ReplyStatus),

    #[error("reply xid {got} does not match call xid {want}")]
    XidMismatch { want: u32, got: u32 },
}

/// One connected endpoint plus framing. Owned by exactly one thread.
pub struct Session<IO: SocketIo> {
    io: IO,
    fd: RawFd,
    next_xid: u32,
}

impl<IO: SocketIo> Session<IO> {
    /// Connect to the given endpoint. The caller decides when this
    /// happens; the shim calls it lazily on first interposed call.
    pub fn connect(endpoint: &Endpoint, io: IO) -> Result<Self, SessionError> {
        let fd = match endpoint {
            Endpoint::Unix(path) => io.connect_unix(path)?,
            Endpoint::Tcp(host, port) => io.connect_tcp(host, *port)?,
        };
        Ok(Self {
            io,
            fd,
            // Start away from zero so a zeroed frame is never a
            // plausible reply.
            next_xid: 1,
        })
    }

    /// Issue one call and block for its reply.
    pub fn call(&mut self, request: &Request) -> Result<Response, SessionError> {
        validate_request(request)?;

        let xid = self.next_xid;
        self.next_xid = self.next_xid.wrapping_add(1).max(1);

        let proc_num = request.procedure();
        let frame = encode_call(xid, proc_num, request);
        self.io.write_all(self.fd, &frame)?;

        let mut header = [0u8; FRAME_HEADER_LEN];
        self.io.read_exact(self.fd, &mut header)?;
        let len = frame_payload_len(header)?;
        let mut payload = vec![0u8; len];
        self.io.read_exact(self.fd, &mut payload)?;

        decode_reply(xid, proc_num, &payload)
    }
}

impl<IO: SocketIo> Drop for Session<IO> {
    fn drop(&mut self) {
        let _ = self.io.close(self.fd);
    }
}

fn encode_call(xid: u32, proc_num: Procedure, request: &Request) -> Vec<u8> {
    let mut body = Encoder::new();
    CallHeader::new(
        xid,
        fdrelay_proto::PROGRAM,
        fdrelay_proto::VERSION,
        proc_num.number(),
    )
    .encode(&mut body);
    request.encode_body(&mut body);

    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
    frame.extend_from_slice(body.as_slice());
    frame
}

fn decode_reply(xid: u32, proc_num: Procedure, payload: &[u8]) -> Result<Response, SessionError> {
    let mut dec = Decoder::new(payload);
    let reply = ReplyHeader::decode(&mut dec)?;
    if reply.xid != xid {
        return Err(SessionError::XidMismatch {
            want: xid,
            got: reply.xid,
        });
    }
    if reply.status != ReplyStatus::Accepted {
        return Err(SessionError::Rejected(reply.status));
    }
    let response = Response::decode_body(proc_num, &mut dec)?;
    dec.finish()?;
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fdrelay_proto::{CloseRequest, SimpleReply};
    use std::cell::RefCell;
    use std::path::Path;

    /// Scripted I/O: collects writes, serves reads from a canned
    /// reply buffer.
    struct ScriptedIo {
        reply: RefCell<Vec<u8>>,
        written: RefCell<Vec<u8>>,
        closed: std::rc::Rc<std::cell::Cell<bool>>,
    }

    impl ScriptedIo {
        fn new(reply_payload: Vec<u8>) -> Self {
            let mut reply = (reply_payload.len() as u32).to_be_bytes().to_vec();
            reply.extend_from_slice(&reply_payload);
            Self {
                reply: RefCell::new(reply),
                written: RefCell::new(Vec::new()),
                closed: Default::default(),
            }
        }
    }

    impl SocketIo for ScriptedIo {
        fn connect_unix(&self, _path: &Path) -> io::Result<RawFd> {
            Ok(0)
        }

        fn connect_tcp(&self, _host: &str, _port: u16) -> io::Result<RawFd> {
            Ok(0)
        }

        fn write_all(&self, _fd: RawFd, buf: &[u8]) -> io::Result<()> {
            self.written.borrow_mut().extend_from_slice(buf);
            Ok(())
        }

        fn read_exact(&self, _fd: RawFd, buf: &mut [u8]) -> io::Result<()> {
            let mut reply = self.reply.borrow_mut();
            if reply.len() < buf.len() {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "script empty"));
            }
            buf.copy_from_slice(&reply[..buf.len()]);
            reply.drain(..buf.len());
            Ok(())
        }

        fn close(&self, _fd: RawFd) -> io::Result<()> {
            self.closed.set(true);
            Ok(())
        }
    }

    fn reply_payload(xid: u32, status: ReplyStatus, body: Option<&Response>) -> Vec<u8> {
        let mut enc = Encoder::new();
        ReplyHeader { xid, status }.encode(&mut enc);
        if let Some(body) = body {
            body.encode_body(&mut enc);
        }
        enc.into_vec()
    }

    fn close_request() -> Request {
        Request::Close(CloseRequest { handle: 3 })
    }

    #[test]
    fn call_round_trips_a_reply() {
        let response = Response::Close(SimpleReply { result: 0, err: 0 });
        let io = ScriptedIo::new(reply_payload(1, ReplyStatus::Accepted, Some(&response)));
        let endpoint = Endpoint::Unix("/nonexistent".into());
        let mut session = Session::connect(&endpoint, io).unwrap();

        let got = session.call(&close_request()).unwrap();
        assert_eq!(got, response);

        // The frame on the wire starts with the envelope: xid 1,
        // program, version, procedure 3.
        let written = session.io.written.borrow().clone();
        let mut dec = Decoder::new(&written[FRAME_HEADER_LEN..]);
        let header = CallHeader::decode(&mut dec).unwrap();
        assert_eq!(header.xid, 1);
        assert_eq!(header.prog, fdrelay_proto::PROGRAM);
        assert_eq!(header.vers, fdrelay_proto::VERSION);
        assert_eq!(header.proc_num, Procedure::Close.number());
    }

    #[test]
    fn mismatched_xid_is_an_error() {
        let response = Response::Close(SimpleReply { result: 0, err: 0 });
        let io = ScriptedIo::new(reply_payload(7, ReplyStatus::Accepted, Some(&response)));
        let endpoint = Endpoint::Unix("/nonexistent".into());
        let mut session = Session::connect(&endpoint, io).unwrap();

        match session.call(&close_request()) {
            Err(SessionError::XidMismatch { want: 1, got: 7 }) => {}
            other => panic!("expected xid mismatch, got {other:?}"),
        }
    }

    #[test]
    fn rejected_status_is_an_error() {
        let io = ScriptedIo::new(reply_payload(1, ReplyStatus::ProcUnavail, None));
        let endpoint = Endpoint::Unix("/nonexistent".into());
        let mut session = Session::connect(&endpoint, io).unwrap();

        match session.call(&close_request()) {
            Err(SessionError::Rejected(ReplyStatus::ProcUnavail)) => {}
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn oversized_request_fails_before_any_io() {
        let io = ScriptedIo::new(Vec::new());
        let endpoint = Endpoint::Unix("/nonexistent".into());
        let mut session = Session::connect(&endpoint, io).unwrap();

        let request = Request::Stat(fdrelay_proto::StatRequest {
            path: vec![b'x'; fdrelay_proto::MAX_PATH_LEN + 1],
        });
        assert!(matches!(
            session.call(&request),
            Err(SessionError::Validation(_))
        ));
        assert!(session.io.written.borrow().is_empty());
    }

    #[test]
    fn drop_closes_the_socket() {
        let io = ScriptedIo::new(Vec::new());
        let closed = io.closed.clone();
        let endpoint = Endpoint::Unix("/nonexistent".into());
        let session = Session::connect(&endpoint, io).unwrap();
        assert!(!closed.get());
        drop(session);
        assert!(closed.get());
    }
}
