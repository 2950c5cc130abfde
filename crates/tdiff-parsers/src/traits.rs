// tdiff-parsers/src/traits.rs
//! Core traits defining the parser interface.
//!
//! This module establishes the parsing interface shared by the container
//! reader and the record decoders:
//! - Consistent error handling across all layers
//! - Reader-agnostic parsing (`Read + Seek`)
//! - Options controlling validation cost and memory use

use std::io::{Read, Seek};
use std::path::Path;

use thiserror::Error;

/// Errors that can occur during parsing operations
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid magic bytes: expected {expected:?}, found {found:?}")]
    InvalidMagic { expected: Vec<u8>, found: Vec<u8> },

    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },

    #[error("Corrupted data at offset {offset}: {message}")]
    CorruptedData { offset: u64, message: String },

    #[error("Decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("Invalid structure: {0}")]
    InvalidStructure(String),

    #[error("Checksum mismatch: expected {expected:08X}, got {actual:08X}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("Branch holds {found} records, cannot read into {expected}")]
    ClassMismatch { expected: String, found: String },

    #[error("Entry {entry} out of range: branch has {entries} entries")]
    EntryOutOfRange { entry: u64, entries: u64 },

    #[error("Unknown branch: {0}")]
    UnknownBranch(String),

    #[error("Memory limit exceeded: {requested} bytes requested, limit {limit}")]
    MemoryLimit { requested: usize, limit: usize },

    #[error("Nested error in {context}: {source}")]
    Nested {
        context: String,
        #[source]
        source: Box<ParseError>,
    },
}

impl ParseError {
    /// Wrap this error with additional context
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ParseError::Nested {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Shorthand for a corruption error
    pub fn corrupted(offset: u64, message: impl Into<String>) -> Self {
        ParseError::CorruptedData {
            offset,
            message: message.into(),
        }
    }
}

/// Result type alias for parsing operations
pub type ParseResult<T> = Result<T, ParseError>;

/// Configuration options for parsing
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Verify the CRC32 of every basket (the directory is always verified)
    pub verify_checksums: bool,
    /// Memory limit for decompression buffers (in bytes)
    pub decompression_memory_limit: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            verify_checksums: false,
            decompression_memory_limit: 512 * 1024 * 1024, // 512 MB
        }
    }
}

impl ParseOptions {
    /// Options with checksum verification enabled
    pub fn strict() -> Self {
        Self {
            verify_checksums: true,
            ..Self::default()
        }
    }

    /// Fail if an allocation of `requested` bytes would exceed the limit
    pub fn check_allocation(&self, requested: usize) -> ParseResult<()> {
        if requested > self.decompression_memory_limit {
            return Err(ParseError::MemoryLimit {
                requested,
                limit: self.decompression_memory_limit,
            });
        }
        Ok(())
    }
}

/// Core trait for all file format parsers
pub trait Parser: Send + Sync {
    /// The parsed output type
    type Output: Send + Sync;

    /// Returns the file extensions this parser handles (e.g., ["tdf"])
    fn extensions(&self) -> &[&str];

    /// Returns the magic bytes that identify this file type (if applicable)
    fn magic_bytes(&self) -> Option<&[u8]> {
        None
    }

    /// Returns a human-readable name for this parser
    fn name(&self) -> &str;

    /// Returns the format version(s) supported by this parser
    fn supported_versions(&self) -> &[u32] {
        &[]
    }

    /// Parse from a reader with default options
    fn parse<R: Read + Seek>(&self, reader: R) -> ParseResult<Self::Output> {
        self.parse_with_options(reader, &ParseOptions::default())
    }

    /// Parse from a reader with custom options
    fn parse_with_options<R: Read + Seek>(
        &self,
        reader: R,
        options: &ParseOptions,
    ) -> ParseResult<Self::Output>;

    /// Parse from a file path
    fn parse_file(&self, path: &Path) -> ParseResult<Self::Output> {
        self.parse_file_with_options(path, &ParseOptions::default())
    }

    /// Parse from a file path with options
    fn parse_file_with_options(
        &self,
        path: &Path,
        options: &ParseOptions,
    ) -> ParseResult<Self::Output> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        self.parse_with_options(reader, options)
    }

    /// Check if this parser can handle the given file
    fn can_parse(&self, path: &Path) -> bool {
        if let Some(ext) = path.extension() {
            let ext_str = ext.to_string_lossy().to_lowercase();
            if self.extensions().iter().any(|e| e.to_lowercase() == ext_str) {
                return true;
            }
        }

        if let Some(magic) = self.magic_bytes() {
            if let Ok(file) = std::fs::File::open(path) {
                let mut reader = std::io::BufReader::new(file);
                let mut buffer = vec![0u8; magic.len()];
                if reader.read_exact(&mut buffer).is_ok() {
                    return buffer == magic;
                }
            }
        }

        false
    }
}

/// Record types that can be stored in a branch
///
/// Decoding writes into an existing value so one allocation can be reused
/// across every entry of a branch.
pub trait BranchRecord {
    /// Class name stored in the branch descriptor
    fn class_name() -> &'static str;

    /// Replace the contents of `self` with the record encoded in `data`
    fn decode_into(&mut self, data: &[u8]) -> ParseResult<()>;

    /// Append the encoded record to `out`
    fn encode(&self, out: &mut Vec<u8>) -> ParseResult<()>;
}
