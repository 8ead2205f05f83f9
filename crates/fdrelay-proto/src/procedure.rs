// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Stable procedure numbers, 1..=12 within protocol version 1.

/// The fixed procedure set. Numbers are part of the wire contract and
/// must never be renumbered within a version.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Procedure {
    /// Open by absolute or cwd-relative path.
    Open = 1,
    /// Open relative to a directory handle.
    OpenAt = 2,
    Close = 3,
    Read = 4,
    /// Positional read.
    Pread = 5,
    Write = 6,
    /// Positional write.
    Pwrite = 7,
    /// Stat by path.
    Stat = 8,
    /// Stat relative to a directory handle.
    StatAt = 9,
    /// Stat by open handle.
    Fstat = 10,
    /// Descriptor-attribute manipulation and advisory locking.
    Fcntl = 11,
    Fdatasync = 12,
}

impl Procedure {
    pub fn from_u32(v: u32) -> Option<Self> {
        Some(match v {
            1 => Self::Open,
            2 => Self::OpenAt,
            3 => Self::Close,
            4 => Self::Read,
            5 => Self::Pread,
            6 => Self::Write,
            7 => Self::Pwrite,
            8 => Self::Stat,
            9 => Self::StatAt,
            10 => Self::Fstat,
            11 => Self::Fcntl,
            12 => Self::Fdatasync,
            _ => return None,
        })
    }

    pub fn number(self) -> u32 {
        self as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_round_trip() {
        for n in 1..=12u32 {
            let proc_num = Procedure::from_u32(n).unwrap();
            assert_eq!(proc_num.number(), n);
        }
        assert_eq!(Procedure::from_u32(0), None);
        assert_eq!(Procedure::from_u32(13), None);
    }
}
