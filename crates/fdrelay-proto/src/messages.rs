// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Request and reply bodies for every procedure.
//!
//! Paths and data buffers are carried as raw byte strings: the shim
//! sees C strings, not UTF-8, and the server hands them to the kernel
//! unmodified. Handles are the opaque client-visible descriptors
//! minted by the server's translation table, never kernel descriptor
//! numbers.

use crate::procedure::Procedure;
use crate::{MAX_PATH_LEN, MAX_PAYLOAD_LEN};
use fdrelay_wire::{Decode, Decoder, Encode, Encoder, WireError};

/// Flattened file metadata, carried by value in stat replies. All
/// fields are zeroed on failure so the wire content stays
/// deterministic.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatRecord {
    pub dev: u64,
    pub ino: u64,
    pub mode: u32,
    pub nlink: u64,
    pub uid: u32,
    pub gid: u32,
    pub rdev: u64,
    pub size: i64,
    pub blksize: i64,
    pub blocks: i64,
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
}

impl StatRecord {
    pub fn zeroed() -> Self {
        Self::default()
    }

    #[cfg(unix)]
    pub fn from_stat(st: &libc::stat) -> Self {
        Self {
            dev: st.st_dev as u64,
            ino: st.st_ino as u64,
            mode: st.st_mode as u32,
            nlink: st.st_nlink as u64,
            uid: st.st_uid as u32,
            gid: st.st_gid as u32,
            rdev: st.st_rdev as u64,
            size: st.st_size as i64,
            blksize: st.st_blksize as i64,
            blocks: st.st_blocks as i64,
            atime: st.st_atime as i64,
            mtime: st.st_mtime as i64,
            ctime: st.st_ctime as i64,
        }
    }

    /// Fill a caller-provided stat struct. The caller zeroes the
    /// struct first; fields this record does not carry stay zero.
    #[cfg(unix)]
    pub fn write_to(&self, st: &mut libc::stat) {
        st.st_dev = self.dev as libc::dev_t;
        st.st_ino = self.ino as libc::ino_t;
        st.st_mode = self.mode as libc::mode_t;
        st.st_nlink = self.nlink as libc::nlink_t;
        st.st_uid = self.uid as libc::uid_t;
        st.st_gid = self.gid as libc::gid_t;
        st.st_rdev = self.rdev as libc::dev_t;
        st.st_size = self.size as libc::off_t;
        st.st_blksize = self.blksize as libc::blksize_t;
        st.st_blocks = self.blocks as libc::blkcnt_t;
        st.st_atime = self.atime as libc::time_t;
        st.st_mtime = self.mtime as libc::time_t;
        st.st_ctime = self.ctime as libc::time_t;
    }
}

impl Encode for StatRecord {
    fn encode(&self, enc: &mut Encoder) {
        enc.put_u64(self.dev);
        enc.put_u64(self.ino);
        enc.put_u32(self.mode);
        enc.put_u64(self.nlink);
        enc.put_u32(self.uid);
        enc.put_u32(self.gid);
        enc.put_u64(self.rdev);
        enc.put_i64(self.size);
        enc.put_i64(self.blksize);
        enc.put_i64(self.blocks);
        enc.put_i64(self.atime);
        enc.put_i64(self.mtime);
        enc.put_i64(self.ctime);
    }
}

impl Decode for StatRecord {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, WireError> {
        Ok(Self {
            dev: dec.take_u64()?,
            ino: dec.take_u64()?,
            mode: dec.take_u32()?,
            nlink: dec.take_u64()?,
            uid: dec.take_u32()?,
            gid: dec.take_u32()?,
            rdev: dec.take_u64()?,
            size: dec.take_i64()?,
            blksize: dec.take_i64()?,
            blocks: dec.take_i64()?,
            atime: dec.take_i64()?,
            mtime: dec.take_i64()?,
            ctime: dec.take_i64()?,
        })
    }
}

/// Advisory-lock description exchanged inside the fcntl argument
/// union. Mirrors the kernel's flock record field for field.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LockRecord {
    pub kind: i32,
    pub whence: i32,
    pub start: i64,
    pub len: i64,
    pub pid: i32,
}

impl LockRecord {
    #[cfg(unix)]
    pub fn from_flock(fl: &libc::flock) -> Self {
        Self {
            kind: fl.l_type as i32,
            whence: fl.l_whence as i32,
            start: fl.l_start as i64,
            len: fl.l_len as i64,
            pid: fl.l_pid as i32,
        }
    }

    #[cfg(unix)]
    pub fn write_to(&self, fl: &mut libc::flock) {
        fl.l_type = self.kind as libc::c_short;
        fl.l_whence = self.whence as libc::c_short;
        fl.l_start = self.start as libc::off_t;
        fl.l_len = self.len as libc::off_t;
        fl.l_pid = self.pid as libc::pid_t;
    }
}

impl Encode for LockRecord {
    fn encode(&self, enc: &mut Encoder) {
        enc.put_i32(self.kind);
        enc.put_i32(self.whence);
        enc.put_i64(self.start);
        enc.put_i64(self.len);
        enc.put_i32(self.pid);
    }
}

impl Decode for LockRecord {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, WireError> {
        Ok(Self {
            kind: dec.take_i32()?,
            whence: dec.take_i32()?,
            start: dec.take_i64()?,
            len: dec.take_i64()?,
            pid: dec.take_i32()?,
        })
    }
}

const FCNTL_ARG_NONE: u32 = 0;
const FCNTL_ARG_INT: u32 = 1;
const FCNTL_ARG_LOCK: u32 = 2;

/// Third argument of the control procedure: nothing, a signed integer
/// or a lock record, chosen by the command classification table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum FcntlArg {
    #[default]
    None,
    Int(i32),
    Lock(LockRecord),
}

impl Encode for FcntlArg {
    fn encode(&self, enc: &mut Encoder) {
        match self {
            FcntlArg::None => enc.put_u32(FCNTL_ARG_NONE),
            FcntlArg::Int(v) => {
                enc.put_u32(FCNTL_ARG_INT);
                enc.put_i32(*v);
            }
            FcntlArg::Lock(lock) => {
                enc.put_u32(FCNTL_ARG_LOCK);
                lock.encode(enc);
            }
        }
    }
}

impl Decode for FcntlArg {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, WireError> {
        match dec.take_u32()? {
            FCNTL_ARG_NONE => Ok(FcntlArg::None),
            FCNTL_ARG_INT => Ok(FcntlArg::Int(dec.take_i32()?)),
            FCNTL_ARG_LOCK => Ok(FcntlArg::Lock(LockRecord::decode(dec)?)),
            tag => Err(WireError::UnknownTag { tag }),
        }
    }
}

// Request bodies.

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenRequest {
    pub path: Vec<u8>,
    pub flags: i32,
    pub mode: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenAtRequest {
    pub dirfd: i32,
    pub path: Vec<u8>,
    pub flags: i32,
    pub mode: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloseRequest {
    pub handle: i32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadRequest {
    pub handle: i32,
    pub count: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreadRequest {
    pub handle: i32,
    pub count: u32,
    pub offset: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteRequest {
    pub handle: i32,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PwriteRequest {
    pub handle: i32,
    pub offset: i64,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatRequest {
    pub path: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatAtRequest {
    pub dirfd: i32,
    pub path: Vec<u8>,
    pub flags: i32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FstatRequest {
    pub handle: i32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FcntlRequest {
    pub handle: i32,
    pub cmd: i32,
    pub arg: FcntlArg,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FdatasyncRequest {
    pub handle: i32,
}

// Reply bodies.

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenReply {
    pub handle: i32,
    pub result: i32,
    pub err: i32,
}

/// Shared by close and data-sync: a bare result plus the captured
/// error indicator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimpleReply {
    pub result: i32,
    pub err: i32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadReply {
    pub result: i64,
    pub err: i32,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteReply {
    pub result: i64,
    pub err: i32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatReply {
    pub result: i32,
    pub err: i32,
    pub stat: StatRecord,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FcntlReply {
    pub result: i32,
    pub err: i32,
    pub arg_out: FcntlArg,
}

macro_rules! record_codec {
    ($ty:ty { $($field:ident: $put:ident / $take:ident),+ $(,)? }) => {
        impl Encode for $ty {
            fn encode(&self, enc: &mut Encoder) {
                $(record_codec!(@put enc, self.$field, $put);)+
            }
        }
        impl Decode for $ty {
            fn decode(dec: &mut Decoder<'_>) -> Result<Self, WireError> {
                Ok(Self { $($field: record_codec!(@take dec, $take)),+ })
            }
        }
    };
    (@put $enc:ident, $value:expr, put_path) => { $enc.put_opaque(&$value) };
    (@put $enc:ident, $value:expr, put_data) => { $enc.put_opaque(&$value) };
    (@put $enc:ident, $value:expr, put_nested) => { $value.encode($enc) };
    (@put $enc:ident, $value:expr, $put:ident) => { $enc.$put($value) };
    (@take $dec:ident, take_path) => { $dec.take_opaque(MAX_PATH_LEN)? };
    (@take $dec:ident, take_data) => { $dec.take_opaque(MAX_PAYLOAD_LEN)? };
    (@take $dec:ident, take_nested) => { Decode::decode($dec)? };
    (@take $dec:ident, $take:ident) => { $dec.$take()? };
}

record_codec!(OpenRequest { path: put_path/take_path, flags: put_i32/take_i32, mode: put_u32/take_u32 });
record_codec!(OpenAtRequest { dirfd: put_i32/take_i32, path: put_path/take_path, flags: put_i32/take_i32, mode: put_u32/take_u32 });
record_codec!(CloseRequest { handle: put_i32/take_i32 });
record_codec!(ReadRequest { handle: put_i32/take_i32, count: put_u32/take_u32 });
record_codec!(PreadRequest { handle: put_i32/take_i32, count: put_u32/take_u32, offset: put_i64/take_i64 });
record_codec!(WriteRequest { handle: put_i32/take_i32, data: put_data/take_data });
record_codec!(PwriteRequest { handle: put_i32/take_i32, offset: put_i64/take_i64, data: put_data/take_data });
record_codec!(StatRequest { path: put_path/take_path });
record_codec!(StatAtRequest { dirfd: put_i32/take_i32, path: put_path/take_path, flags: put_i32/take_i32 });
record_codec!(FstatRequest { handle: put_i32/take_i32 });
record_codec!(FcntlRequest { handle: put_i32/take_i32, cmd: put_i32/take_i32, arg: put_nested/take_nested });
record_codec!(FdatasyncRequest { handle: put_i32/take_i32 });

record_codec!(OpenReply { handle: put_i32/take_i32, result: put_i32/take_i32, err: put_i32/take_i32 });
record_codec!(SimpleReply { result: put_i32/take_i32, err: put_i32/take_i32 });
record_codec!(ReadReply { result: put_i64/take_i64, err: put_i32/take_i32, data: put_data/take_data });
record_codec!(WriteReply { result: put_i64/take_i64, err: put_i32/take_i32 });
record_codec!(StatReply { result: put_i32/take_i32, err: put_i32/take_i32, stat: put_nested/take_nested });
record_codec!(FcntlReply { result: put_i32/take_i32, err: put_i32/take_i32, arg_out: put_nested/take_nested });

/// A request body paired with the procedure that owns it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Request {
    Open(OpenRequest),
    OpenAt(OpenAtRequest),
    Close(CloseRequest),
    Read(ReadRequest),
    Pread(PreadRequest),
    Write(WriteRequest),
    Pwrite(PwriteRequest),
    Stat(StatRequest),
    StatAt(StatAtRequest),
    Fstat(FstatRequest),
    Fcntl(FcntlRequest),
    Fdatasync(FdatasyncRequest),
}

impl Request {
    pub fn procedure(&self) -> Procedure {
        match self {
            Request::Open(_) => Procedure::Open,
            Request::OpenAt(_) => Procedure::OpenAt,
            Request::Close(_) => Procedure::Close,
            Request::Read(_) => Procedure::Read,
            Request::Pread(_) => Procedure::Pread,
            Request::Write(_) => Procedure::Write,
            Request::Pwrite(_) => Procedure::Pwrite,
            Request::Stat(_) => Procedure::Stat,
            Request::StatAt(_) => Procedure::StatAt,
            Request::Fstat(_) => Procedure::Fstat,
            Request::Fcntl(_) => Procedure::Fcntl,
            Request::Fdatasync(_) => Procedure::Fdatasync,
        }
    }

    /// Encode the body only; the procedure number travels in the
    /// envelope.
    pub fn encode_body(&self, enc: &mut Encoder) {
        match self {
            Request::Open(b) => b.encode(enc),
            Request::OpenAt(b) => b.encode(enc),
            Request::Close(b) => b.encode(enc),
            Request::Read(b) => b.encode(enc),
            Request::Pread(b) => b.encode(enc),
            Request::Write(b) => b.encode(enc),
            Request::Pwrite(b) => b.encode(enc),
            Request::Stat(b) => b.encode(enc),
            Request::StatAt(b) => b.encode(enc),
            Request::Fstat(b) => b.encode(enc),
            Request::Fcntl(b) => b.encode(enc),
            Request::Fdatasync(b) => b.encode(enc),
        }
    }

    pub fn decode_body(proc_num: Procedure, dec: &mut Decoder<'_>) -> Result<Self, WireError> {
        Ok(match proc_num {
            Procedure::Open => Request::Open(Decode::decode(dec)?),
            Procedure::OpenAt => Request::OpenAt(Decode::decode(dec)?),
            Procedure::Close => Request::Close(Decode::decode(dec)?),
            Procedure::Read => Request::Read(Decode::decode(dec)?),
            Procedure::Pread => Request::Pread(Decode::decode(dec)?),
            Procedure::Write => Request::Write(Decode::decode(dec)?),
            Procedure::Pwrite => Request::Pwrite(Decode::decode(dec)?),
            Procedure::Stat => Request::Stat(Decode::decode(dec)?),
            Procedure::StatAt => Request::StatAt(Decode::decode(dec)?),
            Procedure::Fstat => Request::Fstat(Decode::decode(dec)?),
            Procedure::Fcntl => Request::Fcntl(Decode::decode(dec)?),
            Procedure::Fdatasync => Request::Fdatasync(Decode::decode(dec)?),
        })
    }
}

/// A reply body paired with the procedure that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Response {
    Open(OpenReply),
    OpenAt(OpenReply),
    Close(SimpleReply),
    Read(ReadReply),
    Pread(ReadReply),
    Write(WriteReply),
    Pwrite(WriteReply),
    Stat(StatReply),
    StatAt(StatReply),
    Fstat(StatReply),
    Fcntl(FcntlReply),
    Fdatasync(SimpleReply),
}

impl Response {
    pub fn procedure(&self) -> Procedure {
        match self {
            Response::Open(_) => Procedure::Open,
            Response::OpenAt(_) => Procedure::OpenAt,
            Response::Close(_) => Procedure::Close,
            Response::Read(_) => Procedure::Read,
            Response::Pread(_) => Procedure::Pread,
            Response::Write(_) => Procedure::Write,
            Response::Pwrite(_) => Procedure::Pwrite,
            Response::Stat(_) => Procedure::Stat,
            Response::StatAt(_) => Procedure::StatAt,
            Response::Fstat(_) => Procedure::Fstat,
            Response::Fcntl(_) => Procedure::Fcntl,
            Response::Fdatasync(_) => Procedure::Fdatasync,
        }
    }

    pub fn encode_body(&self, enc: &mut Encoder) {
        match self {
            Response::Open(b) | Response::OpenAt(b) => b.encode(enc),
            Response::Close(b) | Response::Fdatasync(b) => b.encode(enc),
            Response::Read(b) | Response::Pread(b) => b.encode(enc),
            Response::Write(b) | Response::Pwrite(b) => b.encode(enc),
            Response::Stat(b) | Response::StatAt(b) | Response::Fstat(b) => b.encode(enc),
            Response::Fcntl(b) => b.encode(enc),
        }
    }

    pub fn decode_body(proc_num: Procedure, dec: &mut Decoder<'_>) -> Result<Self, WireError> {
        Ok(match proc_num {
            Procedure::Open => Response::Open(Decode::decode(dec)?),
            Procedure::OpenAt => Response::OpenAt(Decode::decode(dec)?),
            Procedure::Close => Response::Close(Decode::decode(dec)?),
            Procedure::Read => Response::Read(Decode::decode(dec)?),
            Procedure::Pread => Response::Pread(Decode::decode(dec)?),
            Procedure::Write => Response::Write(Decode::decode(dec)?),
            Procedure::Pwrite => Response::Pwrite(Decode::decode(dec)?),
            Procedure::Stat => Response::Stat(Decode::decode(dec)?),
            Procedure::StatAt => Response::StatAt(Decode::decode(dec)?),
            Procedure::Fstat => Response::Fstat(Decode::decode(dec)?),
            Procedure::Fcntl => Response::Fcntl(Decode::decode(dec)?),
            Procedure::Fdatasync => Response::Fdatasync(Decode::decode(dec)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fdrelay_wire::Decoder;

    fn request_round_trip(req: Request) {
        let mut enc = Encoder::new();
        req.encode_body(&mut enc);
        let bytes = enc.into_vec();
        let mut dec = Decoder::new(&bytes);
        let back = Request::decode_body(req.procedure(), &mut dec).unwrap();
        dec.finish().unwrap();
        assert_eq!(back, req);

        // Re-encoding is byte-identical.
        let mut enc2 = Encoder::new();
        back.encode_body(&mut enc2);
        assert_eq!(enc2.into_vec(), bytes);
    }

    fn response_round_trip(resp: Response) {
        let mut enc = Encoder::new();
        resp.encode_body(&mut enc);
        let bytes = enc.into_vec();
        let mut dec = Decoder::new(&bytes);
        let back = Response::decode_body(resp.procedure(), &mut dec).unwrap();
        dec.finish().unwrap();
        assert_eq!(back, resp);

        let mut enc2 = Encoder::new();
        back.encode_body(&mut enc2);
        assert_eq!(enc2.into_vec(), bytes);
    }

    fn sample_stat() -> StatRecord {
        StatRecord {
            dev: 0x803,
            ino: 1234567,
            mode: 0o100644,
            nlink: 1,
            uid: 1000,
            gid: 1000,
            rdev: 0,
            size: 56,
            blksize: 4096,
            blocks: 8,
            atime: 1_700_000_001,
            mtime: 1_700_000_002,
            ctime: 1_700_000_003,
        }
    }

    #[test]
    fn every_request_round_trips() {
        request_round_trip(Request::Open(OpenRequest {
            path: b"/tmp/p3_tb_test.txt".to_vec(),
            flags: 0o101,
            mode: 0o644,
        }));
        request_round_trip(Request::OpenAt(OpenAtRequest {
            dirfd: 5,
            path: b"rel/path".to_vec(),
            flags: 0,
            mode: 0,
        }));
        request_round_trip(Request::Close(CloseRequest { handle: 3 }));
        request_round_trip(Request::Read(ReadRequest {
            handle: 3,
            count: 255,
        }));
        request_round_trip(Request::Pread(PreadRequest {
            handle: 3,
            count: 10,
            offset: 0,
        }));
        request_round_trip(Request::Write(WriteRequest {
            handle: 3,
            data: b"0123456789".to_vec(),
        }));
        request_round_trip(Request::Pwrite(PwriteRequest {
            handle: 3,
            offset: 5,
            data: b"ABCDE".to_vec(),
        }));
        request_round_trip(Request::Stat(StatRequest {
            path: b"/etc/hosts".to_vec(),
        }));
        request_round_trip(Request::StatAt(StatAtRequest {
            dirfd: -100,
            path: b"hosts".to_vec(),
            flags: 0x100,
        }));
        request_round_trip(Request::Fstat(FstatRequest { handle: 4 }));
        request_round_trip(Request::Fcntl(FcntlRequest {
            handle: 4,
            cmd: 0,
            arg: FcntlArg::Int(10),
        }));
        request_round_trip(Request::Fdatasync(FdatasyncRequest { handle: 4 }));
    }

    #[test]
    fn every_response_round_trips() {
        response_round_trip(Response::Open(OpenReply {
            handle: 3,
            result: 3,
            err: 0,
        }));
        response_round_trip(Response::OpenAt(OpenReply {
            handle: -1,
            result: -1,
            err: 2,
        }));
        response_round_trip(Response::Close(SimpleReply { result: 0, err: 0 }));
        response_round_trip(Response::Read(ReadReply {
            result: 56,
            err: 0,
            data: b"Hello from intercepted syscalls! This is a test message.".to_vec(),
        }));
        response_round_trip(Response::Pread(ReadReply {
            result: 0,
            err: 0,
            data: Vec::new(),
        }));
        response_round_trip(Response::Write(WriteReply { result: 56, err: 0 }));
        response_round_trip(Response::Pwrite(WriteReply { result: -1, err: 9 }));
        response_round_trip(Response::Stat(StatReply {
            result: 0,
            err: 0,
            stat: sample_stat(),
        }));
        response_round_trip(Response::StatAt(StatReply {
            result: -1,
            err: 2,
            stat: StatRecord::zeroed(),
        }));
        response_round_trip(Response::Fstat(StatReply {
            result: 0,
            err: 0,
            stat: sample_stat(),
        }));
        response_round_trip(Response::Fcntl(FcntlReply {
            result: 10,
            err: 0,
            arg_out: FcntlArg::None,
        }));
        response_round_trip(Response::Fcntl(FcntlReply {
            result: 0,
            err: 0,
            arg_out: FcntlArg::Lock(LockRecord {
                kind: 1,
                whence: 0,
                start: 0,
                len: 100,
                pid: 4242,
            }),
        }));
        response_round_trip(Response::Fdatasync(SimpleReply { result: 0, err: 0 }));
    }

    #[test]
    fn fcntl_arg_tags_are_stable() {
        let mut enc = Encoder::new();
        FcntlArg::None.encode(&mut enc);
        assert_eq!(enc.as_slice(), &[0, 0, 0, 0]);

        let mut enc = Encoder::new();
        FcntlArg::Int(10).encode(&mut enc);
        assert_eq!(enc.as_slice(), &[0, 0, 0, 1, 0, 0, 0, 10]);

        let mut enc = Encoder::new();
        FcntlArg::Lock(LockRecord::default()).encode(&mut enc);
        assert_eq!(&enc.as_slice()[..4], &[0, 0, 0, 2]);
    }

    #[test]
    fn unknown_fcntl_arg_tag_is_rejected() {
        let bytes = [0, 0, 0, 7];
        let mut dec = Decoder::new(&bytes);
        assert_eq!(
            FcntlArg::decode(&mut dec).unwrap_err(),
            WireError::UnknownTag { tag: 7 }
        );
    }

    #[test]
    fn oversized_path_is_rejected_on_decode() {
        let mut enc = Encoder::new();
        enc.put_opaque(&vec![b'a'; MAX_PATH_LEN + 1]);
        let bytes = enc.into_vec();
        let mut dec = Decoder::new(&bytes);
        assert!(matches!(
            StatRequest::decode(&mut dec),
            Err(WireError::LengthOutOfBounds { .. })
        ));
    }
}
