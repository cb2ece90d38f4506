//! Record file format using nom
//!
//! One file per key:
//! ```text
//! TIERREC1
//! [4 bytes: format version u32 little-endian]
//! [4 bytes: key length u32 little-endian]
//! [8 bytes: value length u64 little-endian]
//! [key bytes: JSON]
//! [value bytes: JSON]
//! ```
//!
//! The key is kept next to the value so that a digest collision on the
//! file name reads back as a miss instead of someone else's value.

use nom::{
    bytes::complete::tag,
    number::complete::{le_u32, le_u64},
    sequence::tuple,
    IResult,
};

use crate::error::{Error, Result};

/// Magic header for record files
pub const RECORD_MAGIC: &[u8] = b"TIERREC1";

/// Current record format version
pub const RECORD_VERSION: u32 = 1;

/// Size of the fixed header in bytes
pub const HEADER_LEN: usize = RECORD_MAGIC.len() + 4 + 4 + 8;

/// Record file header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Format version
    pub version: u32,
    /// Length of the encoded key
    pub key_len: u32,
    /// Length of the encoded value
    pub value_len: u64,
}

/// A decoded record borrowing from the file contents
#[derive(Debug, PartialEq, Eq)]
pub struct Record<'a> {
    /// Parsed header
    pub header: RecordHeader,
    /// Encoded key
    pub key: &'a [u8],
    /// Encoded value
    pub value: &'a [u8],
}

fn header(input: &[u8]) -> IResult<&[u8], RecordHeader> {
    let (rest, (_, version, key_len, value_len)) =
        tuple((tag(RECORD_MAGIC), le_u32, le_u32, le_u64))(input)?;

    Ok((
        rest,
        RecordHeader {
            version,
            key_len,
            value_len,
        },
    ))
}

/// Parse and check the fixed header.
///
/// Returns the reason as a string on failure; callers attach the path.
pub fn parse_header(input: &[u8]) -> std::result::Result<RecordHeader, String> {
    if input.len() < HEADER_LEN {
        return Err(format!("truncated header ({} bytes)", input.len()));
    }

    let (_, parsed) = header(input).map_err(|_| "invalid record magic".to_string())?;

    if parsed.version != RECORD_VERSION {
        return Err(format!("unsupported record version {}", parsed.version));
    }

    Ok(parsed)
}

/// Split a full record into header, key and value.
pub fn decode(input: &[u8]) -> std::result::Result<Record<'_>, String> {
    let header = parse_header(input)?;
    let body = &input[HEADER_LEN..];

    let key_len = header.key_len as usize;
    let expected = (key_len as u64).checked_add(header.value_len).ok_or_else(|| {
        format!(
            "length mismatch: header declares {} + {} body bytes",
            key_len, header.value_len
        )
    })?;
    if body.len() as u64 != expected {
        return Err(format!(
            "length mismatch: header declares {} body bytes, found {}",
            expected,
            body.len()
        ));
    }

    let (key, value) = body.split_at(key_len);
    Ok(Record { header, key, value })
}

/// Build a complete record from encoded key and value.
pub fn encode(key: &[u8], value: &[u8]) -> Result<Vec<u8>> {
    let key_len = u32::try_from(key.len()).map_err(|_| Error::KeyTooLarge(key.len()))?;

    let mut buf = Vec::with_capacity(HEADER_LEN + key.len() + value.len());
    buf.extend_from_slice(RECORD_MAGIC);
    buf.extend_from_slice(&RECORD_VERSION.to_le_bytes());
    buf.extend_from_slice(&key_len.to_le_bytes());
    buf.extend_from_slice(&(value.len() as u64).to_le_bytes());
    buf.extend_from_slice(key);
    buf.extend_from_slice(value);

    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() {
        let buf = encode(b"\"k\"", b"[1,2,3]").unwrap();
        assert_eq!(buf.len(), HEADER_LEN + 3 + 7);

        let record = decode(&buf).unwrap();
        assert_eq!(record.header.version, RECORD_VERSION);
        assert_eq!(record.key, b"\"k\"");
        assert_eq!(record.value, b"[1,2,3]");
    }

    #[test]
    fn test_empty_value() {
        let buf = encode(b"1", b"").unwrap();
        let record = decode(&buf).unwrap();
        assert_eq!(record.key, b"1");
        assert!(record.value.is_empty());
    }

    #[test]
    fn test_invalid_magic() {
        let mut buf = encode(b"1", b"2").unwrap();
        buf[0] = b'X';
        let err = decode(&buf).unwrap_err();
        assert!(err.contains("magic"));
    }

    #[test]
    fn test_truncated_header() {
        let err = parse_header(b"TIERREC1\x01").unwrap_err();
        assert!(err.contains("truncated"));
    }

    #[test]
    fn test_unsupported_version() {
        let mut buf = encode(b"1", b"2").unwrap();
        buf[RECORD_MAGIC.len()] = 9;
        let err = decode(&buf).unwrap_err();
        assert!(err.contains("version 9"));
    }

    #[test]
    fn test_length_mismatch() {
        let mut buf = encode(b"\"key\"", b"\"value\"").unwrap();
        buf.pop();
        let err = decode(&buf).unwrap_err();
        assert!(err.contains("length mismatch"));
    }

    #[test]
    fn test_declared_length_overflow() {
        let mut buf = encode(b"\"k\"", b"1").unwrap();
        let offset = RECORD_MAGIC.len() + 8;
        buf[offset..HEADER_LEN].copy_from_slice(&u64::MAX.to_le_bytes());

        let err = decode(&buf).unwrap_err();
        assert!(err.contains("length mismatch"));
    }
}
