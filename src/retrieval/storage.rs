//! Binary storage for the embedding cache.
//!
//! File format: vectors.bin
//!
//! Header (55 bytes):
//! - version: u8 (1)
//! - model_id: [u8; 32] (SHA256 hash of model name)
//! - dimensions: u16 (little-endian)
//! - entry_count: u64 (little-endian)
//! - corpus_hash: u64 (little-endian, order-sensitive hash of all corpus texts)
//! - checksum: u32 (CRC32 of header fields before checksum)
//!
//! Entries (repeated, one per record, in record order):
//! - embedding: [f32; dimensions] (little-endian)

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::retrieval::index::MemoryIndex;

/// Current file format version
const FORMAT_VERSION: u8 = 1;

/// Header size in bytes:
/// version(1) + model_id(32) + dimensions(2) + entry_count(8) + corpus_hash(8) + checksum(4)
const HEADER_SIZE: usize = 55;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum VectorStorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("Version mismatch: file version {0}, supported version {1}")]
    VersionMismatch(u8, u8),

    #[error("Model mismatch: file uses different model")]
    ModelMismatch,

    #[error("Corpus mismatch: memories changed since the cache was written")]
    CorpusMismatch,

    #[error("Checksum mismatch: file may be corrupted")]
    ChecksumMismatch,

    #[error("Dimension mismatch: expected {expected}, file has {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Order-sensitive hash over the corpus texts. Any edit, addition,
/// removal, or reorder of the memory collection changes the value.
pub fn corpus_hash(texts: &[String]) -> u64 {
    use std::hash::{Hash, Hasher};

    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    texts.len().hash(&mut hasher);
    for text in texts {
        text.hash(&mut hasher);
    }
    hasher.finish()
}

/// Storage manager for the embedding cache.
pub struct VectorStorage {
    path: PathBuf,
}

impl VectorStorage {
    /// Create a new storage manager for the given path.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Get the storage file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the storage file exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the vector index from storage.
    ///
    /// The cache is only usable when it was written by the same model,
    /// with the same dimensions, over the same corpus. Each mismatch is
    /// reported as its own error so the caller can log why a rebuild
    /// happens.
    pub fn load(
        &self,
        expected_model_id: &[u8; 32],
        expected_dimensions: usize,
        expected_corpus_hash: u64,
    ) -> Result<MemoryIndex, VectorStorageError> {
        let file = File::open(&self.path)?;
        let mut reader = BufReader::new(file);

        let header = self.read_header(&mut reader)?;
        self.validate_header(
            &header,
            expected_model_id,
            expected_dimensions,
            expected_corpus_hash,
        )?;

        let mut index = MemoryIndex::new(header.dimensions as usize);

        for entry in 0..header.entry_count {
            let embedding = self.read_entry(&mut reader, header.dimensions as usize)?;
            index.push(embedding).map_err(|e| {
                VectorStorageError::InvalidFormat(format!("entry {entry}: {e}"))
            })?;
        }

        Ok(index)
    }

    /// Save the vector index to storage.
    ///
    /// Uses atomic write: temp file -> fsync -> rename
    pub fn save(
        &self,
        index: &MemoryIndex,
        model_id: &[u8; 32],
        corpus_hash: u64,
    ) -> Result<(), VectorStorageError> {
        let temp_path = self.path.with_extension("tmp");

        let result = self.write_to_file(&temp_path, index, model_id, corpus_hash);

        if result.is_err() {
            // Clean up temp file on error
            let _ = std::fs::remove_file(&temp_path);
            return result;
        }

        std::fs::rename(&temp_path, &self.path)?;

        Ok(())
    }

    /// Delete the storage file if it exists.
    pub fn delete(&self) -> Result<(), VectorStorageError> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    fn write_to_file(
        &self,
        path: &Path,
        index: &MemoryIndex,
        model_id: &[u8; 32],
        corpus_hash: u64,
    ) -> Result<(), VectorStorageError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        let header = Header {
            version: FORMAT_VERSION,
            model_id: *model_id,
            dimensions: index.dimensions() as u16,
            entry_count: index.len() as u64,
            corpus_hash,
        };
        self.write_header(&mut writer, &header)?;

        for embedding in index.iter() {
            self.write_entry(&mut writer, embedding)?;
        }

        writer.flush()?;
        let file = writer
            .into_inner()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        file.sync_all()?;

        Ok(())
    }

    fn read_header(&self, reader: &mut BufReader<File>) -> Result<Header, VectorStorageError> {
        let mut header_bytes = [0u8; HEADER_SIZE];
        reader.read_exact(&mut header_bytes)?;

        let version = header_bytes[0];

        // Version check first
        if version > FORMAT_VERSION {
            return Err(VectorStorageError::VersionMismatch(version, FORMAT_VERSION));
        }

        let mut model_id = [0u8; 32];
        model_id.copy_from_slice(&header_bytes[1..33]);

        let dimensions = u16::from_le_bytes([header_bytes[33], header_bytes[34]]);

        let mut count_bytes = [0u8; 8];
        count_bytes.copy_from_slice(&header_bytes[35..43]);
        let entry_count = u64::from_le_bytes(count_bytes);

        let mut hash_bytes = [0u8; 8];
        hash_bytes.copy_from_slice(&header_bytes[43..51]);
        let corpus_hash = u64::from_le_bytes(hash_bytes);

        let mut checksum_bytes = [0u8; 4];
        checksum_bytes.copy_from_slice(&header_bytes[51..55]);
        let stored_checksum = u32::from_le_bytes(checksum_bytes);

        // Verify checksum (computed over header without checksum field)
        let computed_checksum = Self::compute_checksum(&header_bytes[0..51]);
        if stored_checksum != computed_checksum {
            return Err(VectorStorageError::ChecksumMismatch);
        }

        Ok(Header {
            version,
            model_id,
            dimensions,
            entry_count,
            corpus_hash,
        })
    }

    fn validate_header(
        &self,
        header: &Header,
        expected_model_id: &[u8; 32],
        expected_dimensions: usize,
        expected_corpus_hash: u64,
    ) -> Result<(), VectorStorageError> {
        if header.model_id != *expected_model_id {
            return Err(VectorStorageError::ModelMismatch);
        }

        if header.dimensions as usize != expected_dimensions {
            return Err(VectorStorageError::DimensionMismatch {
                expected: expected_dimensions,
                got: header.dimensions as usize,
            });
        }

        if header.corpus_hash != expected_corpus_hash {
            return Err(VectorStorageError::CorpusMismatch);
        }

        Ok(())
    }

    fn write_header(
        &self,
        writer: &mut BufWriter<File>,
        header: &Header,
    ) -> Result<(), VectorStorageError> {
        let mut header_bytes = [0u8; HEADER_SIZE];

        header_bytes[0] = header.version;
        header_bytes[1..33].copy_from_slice(&header.model_id);
        header_bytes[33..35].copy_from_slice(&header.dimensions.to_le_bytes());
        header_bytes[35..43].copy_from_slice(&header.entry_count.to_le_bytes());
        header_bytes[43..51].copy_from_slice(&header.corpus_hash.to_le_bytes());

        let checksum = Self::compute_checksum(&header_bytes[0..51]);
        header_bytes[51..55].copy_from_slice(&checksum.to_le_bytes());

        writer.write_all(&header_bytes)?;
        Ok(())
    }

    fn read_entry(
        &self,
        reader: &mut BufReader<File>,
        dimensions: usize,
    ) -> Result<Vec<f32>, VectorStorageError> {
        let mut embedding = Vec::with_capacity(dimensions);
        for _ in 0..dimensions {
            let mut float_bytes = [0u8; 4];
            reader.read_exact(&mut float_bytes)?;
            embedding.push(f32::from_le_bytes(float_bytes));
        }

        Ok(embedding)
    }

    fn write_entry(
        &self,
        writer: &mut BufWriter<File>,
        embedding: &[f32],
    ) -> Result<(), VectorStorageError> {
        for &value in embedding {
            writer.write_all(&value.to_le_bytes())?;
        }

        Ok(())
    }

    fn compute_checksum(data: &[u8]) -> u32 {
        crc32fast::hash(data)
    }
}

/// File header structure.
#[derive(Debug)]
struct Header {
    version: u8,
    model_id: [u8; 32],
    dimensions: u16,
    entry_count: u64,
    corpus_hash: u64,
}
