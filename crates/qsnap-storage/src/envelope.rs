//! On-disk framing for a persisted test session.
//!
//! ```text
//! magic       [u8; 8]  "QSNAPSES"
//! version     u16
//! compression u8       0 = none, 1 = lz4 block
//! reserved    u8       0
//! fingerprint u64      structural index the payload was encoded against
//! length      u32      uncompressed payload length
//! payload
//! ```

use qsnap_binary::BinaryStream;

use crate::error::StorageErrorKind;

pub const SESSION_MAGIC: &[u8; 8] = b"QSNAPSES";
pub const SESSION_VERSION_V2: u16 = 2;

/// Upper bound on the declared payload length, checked before allocating.
pub const MAX_PAYLOAD_LEN: usize = 64 * 1024 * 1024;

/// An lz4 block never expands by more than this factor on decompression.
const LZ4_MAX_EXPANSION: usize = 255;

type Result<T> = std::result::Result<T, StorageErrorKind>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum Compression {
    None = 0,
    #[default]
    Lz4 = 1,
}

impl Compression {
    pub fn from_u8(v: u8) -> Result<Self> {
        match v {
            0 => Ok(Compression::None),
            1 => Ok(Compression::Lz4),
            _ => Err(StorageErrorKind::Corrupt("invalid compression kind")),
        }
    }
}

impl core::str::FromStr for Compression {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "none" => Ok(Compression::None),
            "lz4" => Ok(Compression::Lz4),
            _ => Err(format!("unknown compression: {s}")),
        }
    }
}

/// Frame `payload`, encoded against the index with `fingerprint`, for storage.
pub fn seal(payload: &[u8], compression: Compression, fingerprint: u64) -> Result<Vec<u8>> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(StorageErrorKind::Corrupt("payload too large"));
    }
    let body = match compression {
        Compression::None => payload.to_vec(),
        Compression::Lz4 => lz4_flex::block::compress(payload),
    };

    let mut out = BinaryStream::new();
    out.write_raw(SESSION_MAGIC);
    out.write_u16(SESSION_VERSION_V2);
    out.write_u8(compression as u8);
    out.write_u8(0);
    out.write_raw(&fingerprint.to_le_bytes());
    // Bounded by MAX_PAYLOAD_LEN above.
    out.write_u32(payload.len() as u32);
    out.write_raw(&body);
    Ok(out.into_inner())
}

/// Validate the framing and return the decompressed payload.
///
/// Fails with `IndexMismatch` if the snapshot was not encoded against an index with
/// `fingerprint`.
pub fn open(bytes: &[u8], fingerprint: u64) -> Result<Vec<u8>> {
    let mut stream = BinaryStream::from_bytes(bytes);
    if stream.read_raw(SESSION_MAGIC.len())? != SESSION_MAGIC {
        return Err(StorageErrorKind::Corrupt("invalid snapshot magic"));
    }
    let version = stream.read_u16()?;
    if version != SESSION_VERSION_V2 {
        return Err(StorageErrorKind::UnsupportedVersion(version));
    }
    let compression = Compression::from_u8(stream.read_u8()?)?;
    if stream.read_u8()? != 0 {
        return Err(StorageErrorKind::Corrupt("reserved header byte is not 0"));
    }
    let mut found = [0u8; 8];
    found.copy_from_slice(stream.read_raw(8)?);
    let found = u64::from_le_bytes(found);
    if found != fingerprint {
        return Err(StorageErrorKind::IndexMismatch {
            expected: fingerprint,
            found,
        });
    }
    let len = stream.read_u32()? as usize;
    if len > MAX_PAYLOAD_LEN {
        return Err(StorageErrorKind::Corrupt("payload length exceeds limit"));
    }
    let body = stream.read_raw(stream.remaining())?;

    match compression {
        Compression::None => {
            if body.len() != len {
                return Err(StorageErrorKind::Corrupt("payload length mismatch"));
            }
            Ok(body.to_vec())
        }
        Compression::Lz4 => {
            if len > body.len().saturating_mul(LZ4_MAX_EXPANSION) {
                return Err(StorageErrorKind::Corrupt("payload length exceeds compressed body"));
            }
            let payload = lz4_flex::block::decompress(body, len)?;
            if payload.len() != len {
                return Err(StorageErrorKind::Corrupt("payload length mismatch"));
            }
            Ok(payload)
        }
    }
}
