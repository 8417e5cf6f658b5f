//! On-disk index file.
//!
//! Layout: [magic: 4 bytes "ANNX"][version: u32][crc32: u32][len: u64][payload: bincode]
//! The payload is the whole index. The file is written atomically.

use crate::error::{AnnError, Result};
use crate::persistence::serialization;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;

const MAGIC: &[u8; 4] = b"ANNX";
const VERSION: u32 = 2;
const HEADER_SIZE: usize = 20;

fn encode_header(crc: u32, len: u64) -> [u8; HEADER_SIZE] {
    let mut header = [0u8; HEADER_SIZE];
    header[0..4].copy_from_slice(MAGIC);
    header[4..8].copy_from_slice(&VERSION.to_le_bytes());
    header[8..12].copy_from_slice(&crc.to_le_bytes());
    header[12..20].copy_from_slice(&len.to_le_bytes());
    header
}

/// Serialize `value` and write it to `path`, replacing any existing file.
pub fn write<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let payload = serialization::to_bincode(value)?;
    let header = encode_header(crc32fast::hash(&payload), payload.len() as u64);

    let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len());
    bytes.extend_from_slice(&header);
    bytes.extend_from_slice(&payload);
    serialization::write_atomic(path, &bytes)
}

/// Read and verify an index file.
pub fn read<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path)?;
    if bytes.len() < HEADER_SIZE {
        return Err(AnnError::IndexError(format!(
            "{} is too small to be an index file",
            path.display()
        )));
    }
    if &bytes[0..4] != MAGIC {
        return Err(AnnError::IndexError(format!("{} is not an index file", path.display())));
    }

    let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if version != VERSION {
        return Err(AnnError::IndexError(format!(
            "Unsupported index file version {} (expected {}); rebuild the index",
            version, VERSION
        )));
    }

    let expected_crc = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
    let mut len_buf = [0u8; 8];
    len_buf.copy_from_slice(&bytes[12..20]);
    let len = u64::from_le_bytes(len_buf) as usize;

    let payload = &bytes[HEADER_SIZE..];
    if payload.len() != len {
        return Err(AnnError::IndexError(format!(
            "{} is truncated: expected {} payload bytes, found {}",
            path.display(),
            len,
            payload.len()
        )));
    }
    if crc32fast::hash(payload) != expected_crc {
        return Err(AnnError::IndexError(format!("{} failed checksum", path.display())));
    }

    serialization::from_bincode(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_write_and_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("v.index");
        write(&path, &vec![1.0f32, 2.0, 3.0]).unwrap();
        let back: Vec<f32> = read(&path).unwrap();
        assert_eq!(back, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_corrupted_payload_fails_checksum() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("v.index");
        write(&path, &vec![1.0f32, 2.0, 3.0]).unwrap();

        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        fs::write(&path, &bytes).unwrap();

        let err = read::<Vec<f32>>(&path).unwrap_err();
        assert!(err.to_string().contains("checksum"));
    }

    #[test]
    fn test_truncated_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("v.index");
        write(&path, &vec![0u8; 64]).unwrap();

        let bytes = fs::read(&path).unwrap();
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(&bytes[..bytes.len() - 10]).unwrap();

        assert!(matches!(read::<Vec<u8>>(&path), Err(AnnError::IndexError(_))));
    }

    #[test]
    fn test_not_an_index_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, b"just some text, definitely long enough").unwrap();
        assert!(matches!(read::<Vec<u8>>(&path), Err(AnnError::IndexError(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            read::<Vec<u8>>(&dir.path().join("nope")),
            Err(AnnError::IoError(_))
        ));
    }
}
