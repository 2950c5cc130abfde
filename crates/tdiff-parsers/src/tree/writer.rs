// tdiff-parsers/src/tree/writer.rs
//! Writing tree files

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::debug;

use super::basket::Basket;
use super::compression::{BasketCompression, Compression};
use super::directory::{BasketInfo, BranchInfo, DirectoryObject, TreeDirectory, TreeInfo};
use super::{FileHeader, FILE_HEADER_SIZE, FORMAT_VERSION};
use crate::traits::{BranchRecord, ParseError, ParseResult};

/// Options controlling how entries are packed
#[derive(Debug, Clone)]
pub struct WriterOptions {
    pub compression: Compression,
    /// Number of entries grouped into one basket
    pub entries_per_basket: u32,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            compression: Compression::Zlib,
            entries_per_basket: 100,
        }
    }
}

/// Entries of one branch not yet written to disk
#[derive(Debug, Default)]
struct PendingBasket {
    entries: Vec<Vec<u8>>,
}

/// Writes trees of branch records to a seekable sink
///
/// Baskets are written as they fill up; the directory and the final header
/// are written by [`TreeFileWriter::finish`]. A writer dropped without
/// `finish` leaves an unreadable file.
pub struct TreeFileWriter<W: Write + Seek> {
    writer: W,
    options: WriterOptions,
    directory: TreeDirectory,
    pending: BTreeMap<(String, String), PendingBasket>,
    position: u64,
}

impl TreeFileWriter<BufWriter<File>> {
    /// Create (or truncate) a tree file at `path`
    pub fn create(path: impl AsRef<Path>, options: WriterOptions) -> ParseResult<Self> {
        let file = File::create(path)?;
        Self::new(BufWriter::new(file), options)
    }
}

impl<W: Write + Seek> TreeFileWriter<W> {
    /// Start a tree file in `writer`
    pub fn new(mut writer: W, options: WriterOptions) -> ParseResult<Self> {
        if options.entries_per_basket == 0 {
            return Err(ParseError::InvalidStructure(
                "entries_per_basket must be at least 1".to_string(),
            ));
        }

        writer.seek(SeekFrom::Start(0))?;
        // Placeholder, rewritten by finish()
        FileHeader {
            version: FORMAT_VERSION,
            directory_offset: 0,
            directory_len: 0,
            directory_crc32: 0,
        }
        .write_to(&mut writer)?;

        Ok(Self {
            writer,
            options,
            directory: TreeDirectory::default(),
            pending: BTreeMap::new(),
            position: FILE_HEADER_SIZE,
        })
    }

    /// Declare a tree; a no-op if it already exists
    pub fn add_tree(&mut self, name: &str) -> ParseResult<()> {
        match self.directory.get(name) {
            Some(DirectoryObject::Tree(_)) => Ok(()),
            Some(DirectoryObject::Other { .. }) => Err(ParseError::InvalidStructure(format!(
                "object {} exists and is not a tree",
                name
            ))),
            None => {
                self.directory.objects.push(DirectoryObject::Tree(TreeInfo::new(name)));
                Ok(())
            }
        }
    }

    /// Store a named object of a kind the reader does not interpret
    pub fn add_object(&mut self, name: &str, kind: u8) -> ParseResult<()> {
        if self.directory.get(name).is_some() {
            return Err(ParseError::InvalidStructure(format!("object {} already exists", name)));
        }
        self.directory.objects.push(DirectoryObject::Other {
            name: name.to_string(),
            kind,
        });
        Ok(())
    }

    /// Declare a branch holding records of `class_name`
    pub fn add_branch(&mut self, tree: &str, branch: &str, class_name: &str) -> ParseResult<()> {
        self.add_tree(tree)?;
        let info = self.tree_mut(tree)?;

        let existing = info.branch(branch).map(|b| b.class_name.clone());
        match existing {
            Some(found) if found != class_name => Err(ParseError::ClassMismatch {
                expected: class_name.to_string(),
                found,
            }),
            Some(_) => Ok(()),
            None => {
                info.branches.push(BranchInfo::new(branch, class_name));
                Ok(())
            }
        }
    }

    /// Append `record` as the next entry of `tree/branch`
    ///
    /// Returns the index of the new entry.
    pub fn fill<T: BranchRecord>(&mut self, tree: &str, branch: &str, record: &T) -> ParseResult<u64> {
        self.add_branch(tree, branch, T::class_name())?;

        let mut bytes = Vec::new();
        record.encode(&mut bytes)?;

        let key = (tree.to_string(), branch.to_string());
        let pending = self.pending.entry(key.clone()).or_default();
        pending.entries.push(bytes);
        let buffered = pending.entries.len() as u64;
        let full = buffered >= self.options.entries_per_basket as u64;

        let written = self.branch_mut(tree, branch)?.entries();

        if full {
            self.flush_basket(&key)?;
        }

        Ok(written + buffered - 1)
    }

    /// Write the pending basket of one branch
    fn flush_basket(&mut self, key: &(String, String)) -> ParseResult<()> {
        let entries = match self.pending.remove(key) {
            Some(pending) if !pending.entries.is_empty() => pending.entries,
            _ => return Ok(()),
        };

        let bytes = Basket::encode(&entries, self.options.compression)?;
        let offset = self.position;
        self.writer.write_all(&bytes)?;
        self.position += bytes.len() as u64;

        let branch = self.branch_mut(&key.0, &key.1)?;
        let info = BasketInfo {
            offset,
            first_entry: branch.entries(),
            entry_count: entries.len() as u32,
        };
        branch.push_basket(info);

        debug!(
            tree = %key.0,
            branch = %key.1,
            offset,
            entries = entries.len(),
            "Wrote basket"
        );

        Ok(())
    }

    /// Flush every branch, write the directory and the final header
    pub fn finish(mut self) -> ParseResult<W> {
        let keys: Vec<_> = self.pending.keys().cloned().collect();
        for key in &keys {
            self.flush_basket(key)?;
        }

        let mut block = Vec::new();
        self.directory.write_to(&mut block)?;
        let directory_len = u32::try_from(block.len()).map_err(|_| {
            ParseError::InvalidStructure(format!("directory too large: {} bytes", block.len()))
        })?;

        self.writer.write_all(&block)?;

        let header = FileHeader {
            version: FORMAT_VERSION,
            directory_offset: self.position,
            directory_len,
            directory_crc32: BasketCompression::crc32(&block),
        };

        self.writer.seek(SeekFrom::Start(0))?;
        header.write_to(&mut self.writer)?;
        self.writer.flush()?;

        Ok(self.writer)
    }

    fn tree_mut(&mut self, tree: &str) -> ParseResult<&mut TreeInfo> {
        self.directory
            .objects
            .iter_mut()
            .find_map(|o| match o {
                DirectoryObject::Tree(t) if t.name == tree => Some(t),
                _ => None,
            })
            .ok_or_else(|| ParseError::UnknownBranch(tree.to_string()))
    }

    fn branch_mut(&mut self, tree: &str, branch: &str) -> ParseResult<&mut BranchInfo> {
        self.tree_mut(tree)?
            .branch_mut(branch)
            .ok_or_else(|| ParseError::UnknownBranch(format!("{}/{}", tree, branch)))
    }
}
