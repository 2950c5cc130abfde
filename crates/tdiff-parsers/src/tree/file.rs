// tdiff-parsers/src/tree/file.rs
//! Open tree files and random access to branch entries

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::basket::Basket;
use super::directory::{BranchInfo, DirectoryObject, TreeDirectory, TreeInfo};
use super::{TreeFileIndex, TreeFileParser};
use crate::logging::instrument_parse;
use crate::traits::{BranchRecord, ParseError, ParseOptions, ParseResult, Parser};

/// An open tree file
///
/// Owns the underlying reader. The most recently used basket is kept
/// decompressed, so reading consecutive entries touches the disk once per
/// basket.
pub struct TreeFile<R> {
    reader: R,
    index: TreeFileIndex,
    options: ParseOptions,
    cache: Option<Basket>,
    path: Option<PathBuf>,
}

impl TreeFile<BufReader<File>> {
    /// Open a tree file with default options
    pub fn open(path: impl AsRef<Path>) -> ParseResult<Self> {
        Self::open_with_options(path, ParseOptions::default())
    }

    /// Open a tree file, reading its header and directory
    pub fn open_with_options(path: impl AsRef<Path>, options: ParseOptions) -> ParseResult<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);

        let mut file = instrument_parse("tree-file", || Self::from_reader(reader, options))?;
        file.path = Some(path.to_path_buf());

        info!(
            path = %path.display(),
            objects = file.directory().objects.len(),
            "Opened tree file"
        );

        Ok(file)
    }
}

impl<R: Read + Seek> TreeFile<R> {
    /// Parse the header and directory from an arbitrary reader
    pub fn from_reader(mut reader: R, options: ParseOptions) -> ParseResult<Self> {
        let index = TreeFileParser::new().parse_with_options(&mut reader, &options)?;

        Ok(Self {
            reader,
            index,
            options,
            cache: None,
            path: None,
        })
    }

    /// Path the file was opened from, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn directory(&self) -> &TreeDirectory {
        &self.index.directory
    }

    /// Get an object of any kind by name
    pub fn get_object(&self, name: &str) -> Option<&DirectoryObject> {
        self.index.directory.get(name)
    }

    /// Get a tree by name
    pub fn tree(&self, name: &str) -> Option<&TreeInfo> {
        self.index.directory.tree(name)
    }

    /// Get a branch of a tree by name
    pub fn branch(&self, tree: &str, branch: &str) -> Option<&BranchInfo> {
        self.tree(tree)?.branch(branch)
    }

    /// Raw bytes of one entry
    pub fn read_raw_entry(&mut self, branch: &BranchInfo, entry: u64) -> ParseResult<&[u8]> {
        if entry >= branch.entries() {
            return Err(ParseError::EntryOutOfRange {
                entry,
                entries: branch.entries(),
            });
        }

        let info = branch.basket_for(entry).ok_or_else(|| {
            ParseError::InvalidStructure(format!(
                "no basket of branch {} holds entry {}",
                branch.name, entry
            ))
        })?;

        let basket = match self.cache.take() {
            Some(basket) if basket.offset == info.offset => self.cache.insert(basket),
            _ => {
                debug!(branch = %branch.name, entry, offset = info.offset, "Loading basket");
                self.cache.insert(Basket::read(&mut self.reader, info, &self.options)?)
            }
        };

        basket.entry(entry).ok_or_else(|| {
            ParseError::corrupted(info.offset, format!("entry {} missing from basket", entry))
        })
    }

    /// Decode entry `entry` of `branch` into `target`
    ///
    /// The target's previous contents are replaced. Fails without touching
    /// the target if the branch stores a different record class.
    pub fn read_entry<T: BranchRecord>(
        &mut self,
        branch: &BranchInfo,
        entry: u64,
        target: &mut T,
    ) -> ParseResult<()> {
        if branch.class_name != T::class_name() {
            return Err(ParseError::ClassMismatch {
                expected: T::class_name().to_string(),
                found: branch.class_name.clone(),
            });
        }

        let data = self.read_raw_entry(branch, entry)?;
        target
            .decode_into(data)
            .map_err(|e| e.with_context(format!("entry {} of branch {}", entry, branch.name)))
    }

    /// Decode an entry by tree and branch name
    pub fn read_named_entry<T: BranchRecord>(
        &mut self,
        tree: &str,
        branch: &str,
        entry: u64,
        target: &mut T,
    ) -> ParseResult<()> {
        let info = self
            .branch(tree, branch)
            .cloned()
            .ok_or_else(|| ParseError::UnknownBranch(format!("{}/{}", tree, branch)))?;
        self.read_entry(&info, entry, target)
    }

    /// Release the file, returning the reader
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R> std::fmt::Debug for TreeFile<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeFile")
            .field("path", &self.path)
            .field("header", &self.index.header)
            .field("objects", &self.index.directory.objects.len())
            .finish()
    }
}
