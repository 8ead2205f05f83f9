// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Call and reply envelopes.
//!
//! Every request frame starts with a [`CallHeader`] and every reply
//! frame with a [`ReplyHeader`]; the procedure body follows the header
//! in the same frame. A reply body is only present when the status is
//! [`ReplyStatus::Accepted`].

use crate::codec::{Decode, Decoder, Encode, Encoder, WireError};

/// Upper bound on the credentials opaque. The current protocol version
/// always sends an empty block but the field is carried so a later
/// version can fill it without reframing.
pub const MAX_CRED_LEN: usize = 400;

/// Envelope preceding every request body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallHeader {
    /// Transaction id, echoed verbatim in the reply.
    pub xid: u32,
    pub prog: u32,
    pub vers: u32,
    pub proc_num: u32,
    pub cred: Vec<u8>,
}

impl CallHeader {
    pub fn new(xid: u32, prog: u32, vers: u32, proc_num: u32) -> Self {
        Self {
            xid,
            prog,
            vers,
            proc_num,
            cred: Vec::new(),
        }
    }
}

impl Encode for CallHeader {
    fn encode(&self, enc: &mut Encoder) {
        enc.put_u32(self.xid);
        enc.put_u32(self.prog);
        enc.put_u32(self.vers);
        enc.put_u32(self.proc_num);
        enc.put_opaque(&self.cred);
    }
}

impl Decode for CallHeader {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, WireError> {
        Ok(Self {
            xid: dec.take_u32()?,
            prog: dec.take_u32()?,
            vers: dec.take_u32()?,
            proc_num: dec.take_u32()?,
            cred: dec.take_opaque(MAX_CRED_LEN)?,
        })
    }
}

/// Outcome of envelope-level validation on the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum ReplyStatus {
    Accepted = 0,
    ProgMismatch = 1,
    VersMismatch = 2,
    ProcUnavail = 3,
    GarbageArgs = 4,
}

impl ReplyStatus {
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(Self::Accepted),
            1 => Some(Self::ProgMismatch),
            2 => Some(Self::VersMismatch),
            3 => Some(Self::ProcUnavail),
            4 => Some(Self::GarbageArgs),
            _ => None,
        }
    }
}

/// Envelope preceding every reply body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplyHeader {
    pub xid: u32,
    pub status: ReplyStatus,
}

impl Encode for ReplyHeader {
    fn encode(&self, enc: &mut Encoder) {
        enc.put_u32(self.xid);
        enc.put_u32(self.status as u32);
    }
}

impl Decode for ReplyHeader {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, WireError> {
        let xid = dec.take_u32()?;
        let raw = dec.take_u32()?;
        let status = ReplyStatus::from_u32(raw).ok_or(WireError::UnknownTag { tag: raw })?;
        Ok(Self { xid, status })
    }
}
