//! Binary sidecar for record embeddings.
//!
//! Float vectors do not belong in the records CSV, so the local store keeps
//! them in `vectors.bin` next to it.
//!
//! File layout:
//! - version: u8 (1)
//! - dimensions: u16 (little-endian)
//! - entry_count: u64 (little-endian)
//! - checksum: u32 (CRC32 of the header fields above)
//!
//! Entries (repeated):
//! - id_len: u8, followed by the id bytes
//! - embedding: [f32; dimensions] (little-endian)

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::eid::Eid;

/// Current file format version
const FORMAT_VERSION: u8 = 1;

#[derive(Debug, thiserror::Error)]
pub enum VectorFileError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid file format: {0}")]
    InvalidFormat(String),

    #[error("version mismatch: file version {0}, supported version {1}")]
    VersionMismatch(u8, u8),

    #[error("checksum mismatch: file may be corrupted")]
    ChecksumMismatch,

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

pub struct VectorFile {
    path: PathBuf,
}

struct Header {
    dimensions: u16,
    entry_count: u64,
}

impl VectorFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load every stored embedding, keyed by record id.
    pub fn load(&self) -> Result<HashMap<Eid, Vec<f32>>, VectorFileError> {
        let file = File::open(&self.path)?;
        let mut reader = BufReader::new(file);

        let header = read_header(&mut reader)?;
        let dimensions = header.dimensions as usize;

        let mut entries = HashMap::with_capacity(header.entry_count as usize);
        for _ in 0..header.entry_count {
            let (id, embedding) = read_entry(&mut reader, dimensions)?;
            entries.insert(id, embedding);
        }

        Ok(entries)
    }

    /// Save all embeddings. Atomic: temp file, then rename.
    pub fn save(&self, entries: &HashMap<Eid, Vec<f32>>) -> Result<(), VectorFileError> {
        let temp_path = self.path.with_extension("tmp");

        let result = write_to_file(&temp_path, entries);
        if result.is_err() {
            let _ = std::fs::remove_file(&temp_path);
            return result;
        }

        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

fn write_to_file(
    path: &Path,
    entries: &HashMap<Eid, Vec<f32>>,
) -> Result<(), VectorFileError> {
    let dimensions = entries.values().next().map(|v| v.len()).unwrap_or(0);
    if dimensions > u16::MAX as usize {
        return Err(VectorFileError::InvalidFormat(format!(
            "embedding dimensionality {dimensions} exceeds format limit"
        )));
    }
    for (id, embedding) in entries {
        if embedding.len() != dimensions {
            return Err(VectorFileError::DimensionMismatch {
                expected: dimensions,
                got: embedding.len(),
            });
        }
        if id.as_str().len() > u8::MAX as usize {
            return Err(VectorFileError::InvalidFormat(format!(
                "id {id} is too long for the entry header"
            )));
        }
    }

    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    write_header(&mut writer, dimensions as u16, entries.len() as u64)?;

    // deterministic order keeps the file stable across rewrites
    let mut ids: Vec<&Eid> = entries.keys().collect();
    ids.sort();

    for id in ids {
        let id_bytes = id.as_str().as_bytes();
        writer.write_all(&[id_bytes.len() as u8])?;
        writer.write_all(id_bytes)?;
        for value in &entries[id] {
            writer.write_all(&value.to_le_bytes())?;
        }
    }

    writer.flush()?;
    Ok(())
}

fn header_checksum(version: u8, dimensions: u16, entry_count: u64) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&[version]);
    hasher.update(&dimensions.to_le_bytes());
    hasher.update(&entry_count.to_le_bytes());
    hasher.finalize()
}

fn write_header<W: Write>(
    writer: &mut W,
    dimensions: u16,
    entry_count: u64,
) -> Result<(), VectorFileError> {
    writer.write_all(&[FORMAT_VERSION])?;
    writer.write_all(&dimensions.to_le_bytes())?;
    writer.write_all(&entry_count.to_le_bytes())?;
    writer.write_all(&header_checksum(FORMAT_VERSION, dimensions, entry_count).to_le_bytes())?;
    Ok(())
}

fn read_header<R: Read>(reader: &mut R) -> Result<Header, VectorFileError> {
    let mut version = [0u8; 1];
    reader.read_exact(&mut version)?;
    if version[0] != FORMAT_VERSION {
        return Err(VectorFileError::VersionMismatch(version[0], FORMAT_VERSION));
    }

    let mut dimensions = [0u8; 2];
    reader.read_exact(&mut dimensions)?;
    let dimensions = u16::from_le_bytes(dimensions);

    let mut entry_count = [0u8; 8];
    reader.read_exact(&mut entry_count)?;
    let entry_count = u64::from_le_bytes(entry_count);

    let mut checksum = [0u8; 4];
    reader.read_exact(&mut checksum)?;
    if u32::from_le_bytes(checksum) != header_checksum(FORMAT_VERSION, dimensions, entry_count) {
        return Err(VectorFileError::ChecksumMismatch);
    }

    Ok(Header {
        dimensions,
        entry_count,
    })
}

fn read_entry<R: Read>(
    reader: &mut R,
    dimensions: usize,
) -> Result<(Eid, Vec<f32>), VectorFileError> {
    let mut id_len = [0u8; 1];
    reader.read_exact(&mut id_len)?;

    let mut id_bytes = vec![0u8; id_len[0] as usize];
    reader.read_exact(&mut id_bytes)?;
    let id = String::from_utf8(id_bytes)
        .map_err(|_| VectorFileError::InvalidFormat("entry id is not utf8".to_string()))?;

    let mut embedding = Vec::with_capacity(dimensions);
    let mut buf = [0u8; 4];
    for _ in 0..dimensions {
        reader.read_exact(&mut buf)?;
        embedding.push(f32::from_le_bytes(buf));
    }

    Ok((Eid::from(id), embedding))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_vector_file() -> (tempfile::TempDir, VectorFile) {
        let dir = tempfile::tempdir().unwrap();
        let file = VectorFile::new(dir.path().join("vectors.bin"));
        (dir, file)
    }

    #[test]
    fn save_and_reload_round_trip() {
        let (_dir, file) = temp_vector_file();

        let mut entries = HashMap::new();
        entries.insert(Eid::from("01A"), vec![1.0f32, -0.5, 0.25]);
        entries.insert(Eid::from("01B"), vec![0.0f32, 2.0, 3.5]);

        file.save(&entries).unwrap();
        let loaded = file.load().unwrap();

        assert_eq!(loaded, entries);
    }

    #[test]
    fn empty_file_round_trips() {
        let (_dir, file) = temp_vector_file();
        file.save(&HashMap::new()).unwrap();
        assert!(file.load().unwrap().is_empty());
    }

    #[test]
    fn mixed_dimensions_are_rejected() {
        let (_dir, file) = temp_vector_file();

        let mut entries = HashMap::new();
        entries.insert(Eid::from("01A"), vec![1.0f32, 2.0]);
        entries.insert(Eid::from("01B"), vec![1.0f32, 2.0, 3.0]);

        assert!(matches!(
            file.save(&entries),
            Err(VectorFileError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn corrupted_header_is_detected() {
        let (_dir, file) = temp_vector_file();

        let mut entries = HashMap::new();
        entries.insert(Eid::from("01A"), vec![1.0f32]);
        file.save(&entries).unwrap();

        let mut bytes = std::fs::read(file.path()).unwrap();
        bytes[3] ^= 0xFF; // flip a bit inside the entry count
        std::fs::write(file.path(), &bytes).unwrap();

        assert!(matches!(
            file.load(),
            Err(VectorFileError::ChecksumMismatch)
        ));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let (_dir, file) = temp_vector_file();
        file.save(&HashMap::new()).unwrap();

        let mut bytes = std::fs::read(file.path()).unwrap();
        bytes[0] = 9;
        std::fs::write(file.path(), &bytes).unwrap();

        assert!(matches!(
            file.load(),
            Err(VectorFileError::VersionMismatch(9, FORMAT_VERSION))
        ));
    }
}
