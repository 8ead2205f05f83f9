// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Value-layer codec.
//!
//! All multi-byte integers are big-endian. Opaques (byte strings) are a
//! 4-byte unsigned length followed by the bytes and 0-3 zero bytes of
//! padding so the total is a multiple of 4; there is no terminator.
//! Unions are a 4-byte tag followed by the variant body. Records emit
//! their fields in declaration order with no padding between fields.

use thiserror::Error;

/// Errors produced while decoding wire values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("unexpected end of input at byte {at}")]
    UnexpectedEof { at: usize },

    #[error("length {len} exceeds bound {max}")]
    LengthOutOfBounds { len: usize, max: usize },

    #[error("unknown union tag {tag}")]
    UnknownTag { tag: u32 },

    #[error("{rest} trailing bytes after message")]
    TrailingBytes { rest: usize },
}

/// Append-only encoder over a growable buffer.
#[derive(Debug, Default)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn put_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    /// Length-prefixed byte string, zero-padded to a 4-byte boundary.
    pub fn put_opaque(&mut self, bytes: &[u8]) {
        self.put_u32(bytes.len() as u32);
        self.buf.extend_from_slice(bytes);
        let pad = padding_for(bytes.len());
        self.buf.extend_from_slice(&[0u8; 3][..pad]);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor-style decoder over a borrowed byte slice.
#[derive(Debug)]
pub struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        if self.buf.len() - self.pos < n {
            return Err(WireError::UnexpectedEof { at: self.pos });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn take_u32(&mut self) -> Result<u32, WireError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn take_i32(&mut self) -> Result<i32, WireError> {
        Ok(self.take_u32()? as i32)
    }

    pub fn take_u64(&mut self) -> Result<u64, WireError> {
        let b = self.take(8)?;
        Ok(u64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    pub fn take_i64(&mut self) -> Result<i64, WireError> {
        Ok(self.take_u64()? as i64)
    }

    /// Length-prefixed byte string with the length checked against
    /// `max` before any allocation happens.
    pub fn take_opaque(&mut self, max: usize) -> Result<Vec<u8>, WireError> {
        let len = self.take_u32()? as usize;
        if len > max {
            return Err(WireError::LengthOutOfBounds { len, max });
        }
        let bytes = self.take(len)?.to_vec();
        self.take(padding_for(len))?;
        Ok(bytes)
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Succeeds only when the whole input has been consumed.
    pub fn finish(self) -> Result<(), WireError> {
        match self.remaining() {
            0 => Ok(()),
            rest => Err(WireError::TrailingBytes { rest }),
        }
    }
}

fn padding_for(len: usize) -> usize {
    (4 - len % 4) % 4
}

/// A value that can be written to an [`Encoder`].
pub trait Encode {
    fn encode(&self, enc: &mut Encoder);
}

/// A value that can be read back from a [`Decoder`].
pub trait Decode: Sized {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, WireError>;
}

pub fn encode_to_vec(value: &impl Encode) -> Vec<u8> {
    let mut enc = Encoder::new();
    value.encode(&mut enc);
    enc.into_vec()
}

/// Decode a single value and reject trailing bytes.
pub fn decode_from_slice<T: Decode>(bytes: &[u8]) -> Result<T, WireError> {
    let mut dec = Decoder::new(bytes);
    let value = T::decode(&mut dec)?;
    dec.finish()?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_are_big_endian() {
        let mut enc = Encoder::new();
        enc.put_u32(0x0102_0304);
        enc.put_i32(-2);
        enc.put_u64(0x0506_0708_090a_0b0c);
        let bytes = enc.into_vec();

        assert_eq!(&bytes[..4], &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(&bytes[4..8], &[0xff, 0xff, 0xff, 0xfe]);
        assert_eq!(
            &bytes[8..16],
            &[0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c]
        );

        let mut dec = Decoder::new(&bytes);
        assert_eq!(dec.take_u32().unwrap(), 0x0102_0304);
        assert_eq!(dec.take_i32().unwrap(), -2);
        assert_eq!(dec.take_u64().unwrap(), 0x0506_0708_090a_0b0c);
        dec.finish().unwrap();
    }

    #[test]
    fn opaque_pads_to_four_byte_boundary() {
        for (payload, padded_len) in [
            (&b""[..], 4),
            (&b"a"[..], 8),
            (&b"ab"[..], 8),
            (&b"abc"[..], 8),
            (&b"abcd"[..], 8),
            (&b"abcde"[..], 12),
        ] {
            let mut enc = Encoder::new();
            enc.put_opaque(payload);
            let bytes = enc.into_vec();
            assert_eq!(bytes.len(), padded_len, "payload {payload:?}");
            // Pad bytes are zero.
            assert!(bytes[4 + payload.len()..].iter().all(|&b| b == 0));

            let mut dec = Decoder::new(&bytes);
            assert_eq!(dec.take_opaque(16).unwrap(), payload);
            dec.finish().unwrap();
        }
    }

    #[test]
    fn opaque_length_bound_is_enforced() {
        let mut enc = Encoder::new();
        enc.put_opaque(b"abcdef");
        let bytes = enc.into_vec();
        let mut dec = Decoder::new(&bytes);
        assert_eq!(
            dec.take_opaque(4),
            Err(WireError::LengthOutOfBounds { len: 6, max: 4 })
        );
    }

    #[test]
    fn truncated_input_reports_eof() {
        let mut dec = Decoder::new(&[0x00, 0x01]);
        assert_eq!(dec.take_u32(), Err(WireError::UnexpectedEof { at: 0 }));

        // Truncated inside the opaque body.
        let mut dec = Decoder::new(&[0x00, 0x00, 0x00, 0x08, 0x61]);
        assert_eq!(dec.take_opaque(16), Err(WireError::UnexpectedEof { at: 4 }));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut enc = Encoder::new();
        enc.put_u32(7);
        enc.put_u32(9);
        let bytes = enc.into_vec();

        #[derive(Debug)]
        struct One(u32);
        impl Decode for One {
            fn decode(dec: &mut Decoder<'_>) -> Result<Self, WireError> {
                Ok(One(dec.take_u32()?))
            }
        }

        assert_eq!(
            decode_from_slice::<One>(&bytes).unwrap_err(),
            WireError::TrailingBytes { rest: 4 }
        );
    }
}
