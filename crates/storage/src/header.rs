//! On-disk bitmap header.
//!
//! ```text
//! +------------------+ 0
//! | magic "TBMP"      | 4 bytes
//! +------------------+ 4
//! | format_version    | 1 byte
//! +------------------+ 5
//! | reserved          | 3 bytes
//! +------------------+ 8
//! | cardinality (u64) | 8 bytes
//! +------------------+ 16
//! | version (u64)     | 8 bytes
//! +------------------+ 24
//! | updated_at (i64)  | 8 bytes
//! +------------------+ 32
//! | roaring bitmap bytes... (self-describing, see `roaring` crate)
//! ```
//!
//! `format_version` is strictly monotonic across format revisions (§4.1):
//! readers must refuse a `format_version` higher than the one they know.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

/// Magic bytes identifying a tag-engine bitmap file: "TBMP".
pub const MAGIC: [u8; 4] = *b"TBMP";

/// Current on-disk format version.
pub const FORMAT_VERSION: u8 = 1;

/// Fixed size, in bytes, of the header that precedes every persisted
/// bitmap's roaring-encoded body.
pub const HEADER_SIZE: usize = 32;

/// The fixed-size record preceding a persisted bitmap's bytes (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitmapHeader {
    /// On-disk format version. Readers must refuse an unknown value.
    pub format_version: u8,
    /// `|B(tag_id)|` at the time this header was written.
    pub cardinality: u64,
    /// Monotonically increasing version, bumped on every successful
    /// mutation (§3).
    pub version: u64,
    /// Microseconds since the Unix epoch.
    pub updated_at: i64,
}

impl BitmapHeader {
    /// Build a header for a freshly-written bitmap.
    pub fn new(cardinality: u64, version: u64, updated_at: i64) -> Self {
        BitmapHeader {
            format_version: FORMAT_VERSION,
            cardinality,
            version,
            updated_at,
        }
    }

    /// Serialize to exactly [`HEADER_SIZE`] bytes.
    pub fn write_to<W: Write>(&self, mut w: W) -> io::Result<()> {
        w.write_all(&MAGIC)?;
        w.write_u8(self.format_version)?;
        w.write_all(&[0u8; 3])?; // reserved
        w.write_u64::<LittleEndian>(self.cardinality)?;
        w.write_u64::<LittleEndian>(self.version)?;
        w.write_i64::<LittleEndian>(self.updated_at)?;
        Ok(())
    }

    /// Parse a header from exactly [`HEADER_SIZE`] bytes.
    pub fn read_from<R: Read>(mut r: R) -> io::Result<Self> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "bitmap header magic mismatch",
            ));
        }
        let format_version = r.read_u8()?;
        if format_version > FORMAT_VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "unsupported bitmap format_version {format_version}, max supported {FORMAT_VERSION}"
                ),
            ));
        }
        let mut reserved = [0u8; 3];
        r.read_exact(&mut reserved)?;
        let cardinality = r.read_u64::<LittleEndian>()?;
        let version = r.read_u64::<LittleEndian>()?;
        let updated_at = r.read_i64::<LittleEndian>()?;
        Ok(BitmapHeader {
            format_version,
            cardinality,
            version,
            updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let h = BitmapHeader::new(42, 7, 1_700_000_000_000_000);
        let mut buf = Vec::new();
        h.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE);
        let h2 = BitmapHeader::read_from(&buf[..]).unwrap();
        assert_eq!(h, h2);
    }

    #[test]
    fn rejects_bad_magic() {
        let buf = [0u8; HEADER_SIZE];
        assert!(BitmapHeader::read_from(&buf[..]).is_err());
    }

    #[test]
    fn rejects_future_format_version() {
        let mut h = BitmapHeader::new(1, 1, 0);
        h.format_version = FORMAT_VERSION + 1;
        let mut buf = Vec::new();
        h.write_to(&mut buf).unwrap();
        assert!(BitmapHeader::read_from(&buf[..]).is_err());
    }
}
