//! The byte format of encoded trees.
//!
//! ```text
//! stream := MAGIC VERSION symbol*
//! symbol := kind                      // open, unnamed kind
//!         | kind leb128(len) utf8     // open, named kind; len 0 means no name
//!         | 0xFF                      // up
//! ```
//! Literal values are not part of the stream. The format is private and not stable across
//! versions of this crate.

use crate::{errors::StructscanErrorKind, Kind, Result, StructscanError};

pub(crate) const MAGIC: u8 = 0xB5;
pub(crate) const VERSION: u8 = 1;
const UP: u8 = 0xFF;

/// A decoded symbol. Names borrow from the decoded bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Symbol<'a> {
    Open(Kind, Option<&'a str>),
    Up,
}

pub(crate) fn write_header(out: &mut Vec<u8>) {
    out.push(MAGIC);
    out.push(VERSION);
}

pub(crate) fn write_open(out: &mut Vec<u8>, kind: Kind, name: Option<&str>) {
    out.push(kind.ordinal());
    if kind.has_name() {
        let name = name.unwrap_or_default();
        write_leb128(out, name.len() as u64);
        out.extend_from_slice(name.as_bytes());
    }
}

#[inline]
pub(crate) fn write_up(out: &mut Vec<u8>) {
    out.push(UP);
}

fn write_leb128(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

fn malformed(message: impl Into<String>) -> StructscanError {
    StructscanError::new(StructscanErrorKind::EncodingError(message.into()))
}

/// Reads symbols from an encoded stream.
#[derive(Debug)]
pub(crate) struct Decoder<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    /// Checks the header and positions the decoder at the first symbol.
    pub(crate) fn new(bytes: &'a [u8]) -> Result<Self> {
        match bytes {
            [MAGIC, VERSION, ..] => Ok(Self { bytes, pos: 2 }),
            [MAGIC, version, ..] => Err(malformed(format!("unknown version {}", version))),
            _ => Err(malformed("missing header")),
        }
    }

    /// The next symbol or `None` at the end of the stream.
    pub(crate) fn next_symbol(&mut self) -> Result<Option<Symbol<'a>>> {
        let Some(&byte) = self.bytes.get(self.pos) else {
            return Ok(None);
        };
        self.pos += 1;
        if byte == UP {
            return Ok(Some(Symbol::Up));
        }
        let kind = Kind::from_ordinal(byte)
            .ok_or_else(|| malformed(format!("unknown kind {} at {}", byte, self.pos - 1)))?;
        if !kind.has_name() {
            return Ok(Some(Symbol::Open(kind, None)));
        }
        let len = self.read_leb128()? as usize;
        if len == 0 {
            return Ok(Some(Symbol::Open(kind, None)));
        }
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| malformed(format!("truncated name at {}", self.pos)))?;
        let name = std::str::from_utf8(&self.bytes[self.pos..end])
            .map_err(|e| malformed(format!("invalid name at {}: {}", self.pos, e)))?;
        self.pos = end;
        Ok(Some(Symbol::Open(kind, Some(name))))
    }

    fn read_leb128(&mut self) -> Result<u64> {
        let mut value = 0u64;
        for shift in (0..64).step_by(7) {
            let Some(&byte) = self.bytes.get(self.pos) else {
                return Err(malformed("truncated length"));
            };
            self.pos += 1;
            value |= u64::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(malformed("length too long"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(bytes: &[u8]) -> Result<Vec<Symbol<'_>>> {
        let mut decoder = Decoder::new(bytes)?;
        let mut symbols = Vec::new();
        while let Some(symbol) = decoder.next_symbol()? {
            symbols.push(symbol);
        }
        Ok(symbols)
    }

    #[test]
    fn test_stream_layout() {
        let mut out = Vec::new();
        write_header(&mut out);
        write_open(&mut out, Kind::Return, None);
        write_open(&mut out, Kind::Identifier, Some("x"));
        write_up(&mut out);
        write_up(&mut out);
        assert_eq!(
            out,
            vec![
                MAGIC,
                VERSION,
                Kind::Return.ordinal(),
                Kind::Identifier.ordinal(),
                1,
                b'x',
                0xFF,
                0xFF
            ]
        );
        assert_eq!(
            decode_all(&out).unwrap(),
            vec![
                Symbol::Open(Kind::Return, None),
                Symbol::Open(Kind::Identifier, Some("x")),
                Symbol::Up,
                Symbol::Up
            ]
        );
    }

    #[test]
    fn test_long_names_use_multi_byte_lengths() {
        let name = "n".repeat(300);
        let mut out = Vec::new();
        write_header(&mut out);
        write_open(&mut out, Kind::Identifier, Some(&name));
        assert_eq!(&out[3..5], &[0xAC, 0x02]);
        assert_eq!(
            decode_all(&out).unwrap(),
            vec![Symbol::Open(Kind::Identifier, Some(name.as_str()))]
        );
    }

    #[test]
    fn test_malformed_streams() {
        assert!(decode_all(&[]).is_err());
        assert!(decode_all(&[MAGIC, VERSION + 1]).is_err());
        assert!(decode_all(&[MAGIC, VERSION, 0xF0]).is_err());
        let truncated = [MAGIC, VERSION, Kind::Identifier.ordinal(), 5, b'a'];
        let err = decode_all(&truncated).unwrap_err();
        assert!(
            matches!(err.kind(), StructscanErrorKind::EncodingError(_)),
            "{}",
            err
        );
    }
}
