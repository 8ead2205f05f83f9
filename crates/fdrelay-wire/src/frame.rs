// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Length-delimited record framing.
//!
//! A frame is a 4-byte big-endian payload length followed by the
//! payload. The length is validated against [`MAX_FRAME_LEN`] before
//! any buffer is allocated, so a corrupt peer cannot force an
//! arbitrary-size allocation.

use std::io::{self, Read, Write};

pub const FRAME_HEADER_LEN: usize = 4;

/// Largest accepted frame payload: the data-payload bound of the
/// protocol plus headroom for the envelope and fixed fields.
pub const MAX_FRAME_LEN: usize = (1 << 20) + (64 << 10);

/// Validate a frame header and return the payload length it announces.
pub fn frame_payload_len(header: [u8; FRAME_HEADER_LEN]) -> io::Result<usize> {
    let len = u32::from_be_bytes(header) as usize;
    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame length {len} exceeds bound {MAX_FRAME_LEN}"),
        ));
    }
    Ok(len)
}

/// Write one frame: header then payload.
pub fn write_frame<W: Write>(w: &mut W, payload: &[u8]) -> io::Result<()> {
    debug_assert!(payload.len() <= MAX_FRAME_LEN);
    w.write_all(&(payload.len() as u32).to_be_bytes())?;
    w.write_all(payload)?;
    w.flush()
}

/// Read one frame. Returns `Ok(None)` on a clean end-of-stream (the
/// peer closed between frames); a close mid-frame is an error.
pub fn read_frame<R: Read>(r: &mut R) -> io::Result<Option<Vec<u8>>> {
    let mut header = [0u8; FRAME_HEADER_LEN];
    let mut filled = 0;
    while filled < header.len() {
        match r.read(&mut header[filled..])? {
            0 if filled == 0 => return Ok(None),
            0 => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "stream closed inside frame header",
                ))
            }
            n => filled += n,
        }
    }

    let len = frame_payload_len(header)?;
    let mut payload = vec![0u8; len];
    r.read_exact(&mut payload)?;
    Ok(Some(payload))
}
