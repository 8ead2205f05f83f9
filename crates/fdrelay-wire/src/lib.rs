// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Wire layer for the fdrelay protocol.
//!
//! Three things live here, in dependency order: the value codec
//! (big-endian primitives, 4-byte-aligned length-prefixed opaques,
//! tagged unions), the length-delimited record framing used to carry
//! one message per frame over a stream socket, and the call/reply
//! envelope that precedes every procedure body.

pub mod codec;
pub mod envelope;
pub mod frame;

pub use codec::{decode_from_slice, encode_to_vec, Decode, Decoder, Encode, Encoder, WireError};
pub use envelope::{CallHeader, ReplyHeader, ReplyStatus};
pub use frame::{frame_payload_len, write_frame, FRAME_HEADER_LEN, MAX_FRAME_LEN};
