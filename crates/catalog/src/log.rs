//! Append-only, self-delimiting log file.
//!
//! Each record is framed as `len: u32 LE | payload | crc32: u32 LE` — the
//! same self-delimiting, checksummed record shape the teacher's WAL uses
//! ("each record contains length and checksum"). `replay` stops at the
//! first truncated or corrupt frame rather than erroring, so a catalog
//! log that was mid-append when the process died still recovers
//! everything durably committed before the crash.

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use parking_lot::Mutex;

/// A single append-only log file of length-prefixed, CRC32-checked
/// records.
pub struct AppendLog {
    file: Mutex<File>,
}

impl AppendLog {
    /// Open (creating if absent) the log file at `path` for appending.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        Ok(AppendLog {
            file: Mutex::new(file),
        })
    }

    /// Append one record, durably, before returning.
    pub fn append(&self, payload: &[u8]) -> io::Result<()> {
        let crc = crc32fast::hash(payload);
        let mut frame = Vec::with_capacity(8 + payload.len());
        frame.write_u32::<LittleEndian>(payload.len() as u32)?;
        frame.write_all(payload)?;
        frame.write_u32::<LittleEndian>(crc)?;

        let mut file = self.file.lock();
        file.write_all(&frame)?;
        file.sync_all()?;
        Ok(())
    }

    /// Replay every durably-committed record in file order. A truncated
    /// or CRC-mismatched tail frame ends replay without error (crash
    /// mid-append).
    pub fn replay(path: &Path) -> io::Result<Vec<Vec<u8>>> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut reader = BufReader::new(file);
        let mut records = Vec::new();
        loop {
            let len = match reader.read_u32::<LittleEndian>() {
                Ok(len) => len,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            };
            let mut payload = vec![0u8; len as usize];
            if reader.read_exact(&mut payload).is_err() {
                break; // truncated tail
            }
            let expected_crc = match reader.read_u32::<LittleEndian>() {
                Ok(c) => c,
                Err(_) => break,
            };
            if crc32fast::hash(&payload) != expected_crc {
                break; // corrupt tail, stop replay
            }
            records.push(payload);
        }
        Ok(records)
    }
}
