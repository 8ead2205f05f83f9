// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Request-serial dispatch loop for one connection.
//!
//! The dispatcher owns the session for the connection's lifetime. It
//! never emits an unsolicited message: every reply corresponds to
//! exactly one prior call and echoes its xid. Envelope-level problems
//! that can be attributed to a well-formed call (wrong program,
//! unknown procedure, undecodable body) are answered with a non-zero
//! status; anything below that (bad frame, truncated header) tears the
//! connection down.

use crate::handlers::Handler;
use fdrelay_proto::{Procedure, Request, PROGRAM, VERSION};
use fdrelay_wire::frame::{read_frame, write_frame};
use fdrelay_wire::{CallHeader, Decode, Decoder, Encode, Encoder, ReplyHeader, ReplyStatus};
use std::io::{Read, Write};
use tracing::{debug, info, warn};

/// Serve one connection until the peer closes or the stream breaks.
/// Teardown (the [`Handler`] drop) closes every descriptor the
/// connection still owns.
pub fn serve_connection<S: Read + Write>(mut stream: S) -> std::io::Result<()> {
    let mut handler = Handler::new();

    loop {
        let payload = match read_frame(&mut stream)? {
            Some(payload) => payload,
            None => {
                info!("client closed the connection");
                return Ok(());
            }
        };

        let mut dec = Decoder::new(&payload);
        let call = match CallHeader::decode(&mut dec) {
            Ok(call) => call,
            Err(err) => {
                warn!(%err, "undecodable call envelope, tearing down");
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    err.to_string(),
                ));
            }
        };

        let mut reply = Encoder::new();
        match screen_call(&call, dec) {
            Ok(request) => {
                debug!(xid = call.xid, procedure = ?request.procedure(), "dispatch");
                let response = handler.handle(request);
                ReplyHeader {
                    xid: call.xid,
                    status: ReplyStatus::Accepted,
                }
                .encode(&mut reply);
                response.encode_body(&mut reply);
            }
            Err(status) => {
                warn!(xid = call.xid, ?status, prog = call.prog, proc_num = call.proc_num, "call refused");
                ReplyHeader {
                    xid: call.xid,
                    status,
                }
                .encode(&mut reply);
            }
        }

        write_frame(&mut stream, reply.as_slice())?;
    }
}

/// Envelope validation: program, version, procedure number, then the
/// body decode with nothing left over.
fn screen_call(call: &CallHeader, mut dec: Decoder<'_>) -> Result<Request, ReplyStatus> {
    if call.prog != PROGRAM {
        return Err(ReplyStatus::ProgMismatch);
    }
    if call.vers != VERSION {
        return Err(ReplyStatus::VersMismatch);
    }
    let proc_num = Procedure::from_u32(call.proc_num).ok_or(ReplyStatus::ProcUnavail)?;
    let request =
        Request::decode_body(proc_num, &mut dec).map_err(|_| ReplyStatus::GarbageArgs)?;
    dec.finish().map_err(|_| ReplyStatus::GarbageArgs)?;
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fdrelay_proto::{CloseRequest, Response};
    use std::os::unix::net::UnixStream;
    use std::thread;

    fn call_frame(xid: u32, prog: u32, vers: u32, proc_num: u32, body: Option<&Request>) -> Vec<u8> {
        let mut enc = Encoder::new();
        CallHeader::new(xid, prog, vers, proc_num).encode(&mut enc);
        if let Some(body) = body {
            body.encode_body(&mut enc);
        }
        let mut frame = (enc.len() as u32).to_be_bytes().to_vec();
        frame.extend_from_slice(enc.as_slice());
        frame
    }

    fn exchange(frames: &[Vec<u8>]) -> Vec<Vec<u8>> {
        let (mut client, server) = UnixStream::pair().unwrap();
        let worker = thread::spawn(move || {
            let _ = serve_connection(server);
        });

        let mut replies = Vec::new();
        for frame in frames {
            client.write_all(frame).unwrap();
            let reply = read_frame(&mut client).unwrap().expect("reply frame");
            replies.push(reply);
        }
        drop(client);
        worker.join().unwrap();
        replies
    }

    fn reply_status(payload: &[u8]) -> (u32, ReplyStatus) {
        let mut dec = Decoder::new(payload);
        let header = ReplyHeader::decode(&mut dec).unwrap();
        (header.xid, header.status)
    }

    #[test]
    fn accepted_call_is_answered_with_matching_xid() {
        let request = Request::Close(CloseRequest { handle: 999 });
        let frames = [call_frame(77, PROGRAM, VERSION, 3, Some(&request))];
        let replies = exchange(&frames);

        let (xid, status) = reply_status(&replies[0]);
        assert_eq!(xid, 77);
        assert_eq!(status, ReplyStatus::Accepted);

        let mut dec = Decoder::new(&replies[0]);
        ReplyHeader::decode(&mut dec).unwrap();
        match Response::decode_body(Procedure::Close, &mut dec).unwrap() {
            Response::Close(reply) => {
                assert_eq!(reply.result, -1);
                assert_eq!(reply.err, libc::EBADF);
            }
            other => panic!("unexpected response {other:?}"),
        }
    }

    #[test]
    fn wrong_program_is_refused() {
        let request = Request::Close(CloseRequest { handle: 3 });
        let replies = exchange(&[call_frame(1, PROGRAM + 1, VERSION, 3, Some(&request))]);
        assert_eq!(reply_status(&replies[0]), (1, ReplyStatus::ProgMismatch));
    }

    #[test]
    fn wrong_version_is_refused() {
        let request = Request::Close(CloseRequest { handle: 3 });
        let replies = exchange(&[call_frame(2, PROGRAM, VERSION + 1, 3, Some(&request))]);
        assert_eq!(reply_status(&replies[0]), (2, ReplyStatus::VersMismatch));
    }

    #[test]
    fn unknown_procedure_is_refused() {
        let replies = exchange(&[call_frame(3, PROGRAM, VERSION, 99, None)]);
        assert_eq!(reply_status(&replies[0]), (3, ReplyStatus::ProcUnavail));
    }

    #[test]
    fn undecodable_body_is_garbage_args() {
        // Procedure 3 (close) with an empty body.
        let replies = exchange(&[call_frame(4, PROGRAM, VERSION, 3, None)]);
        assert_eq!(reply_status(&replies[0]), (4, ReplyStatus::GarbageArgs));

        // A well-formed body followed by trailing bytes.
        let request = Request::Close(CloseRequest { handle: 3 });
        let mut frame = call_frame(5, PROGRAM, VERSION, 3, Some(&request));
        frame.extend_from_slice(&[0, 0, 0, 0]);
        let len = (frame.len() - 4) as u32;
        frame[..4].copy_from_slice(&len.to_be_bytes());
        let replies = exchange(&[frame]);
        assert_eq!(reply_status(&replies[0]), (5, ReplyStatus::GarbageArgs));
    }

    #[test]
    fn serial_calls_share_one_table() {
        // Two sequential bad-handle closes against the same connection
        // must both answer and keep the connection alive.
        let request = Request::Close(CloseRequest { handle: 42 });
        let frames = [
            call_frame(10, PROGRAM, VERSION, 3, Some(&request)),
            call_frame(11, PROGRAM, VERSION, 3, Some(&request)),
        ];
        let replies = exchange(&frames);
        assert_eq!(reply_status(&replies[0]).0, 10);
        assert_eq!(reply_status(&replies[1]).0, 11);
    }
}
