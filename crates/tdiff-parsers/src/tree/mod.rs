// tdiff-parsers/src/tree/mod.rs
//! Tree-File Container Parser
//!
//! A tree file stores named trees; each tree holds named branches, and each
//! branch is an ordered sequence of serialized per-event records. Records
//! are grouped into compressed baskets so a reader only inflates the block
//! holding the entry it needs.
//!
//! # Format Structure
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Tree File                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │                  Header (24 bytes)                      ││
//! │  │  - Magic: "TDTF"                                        ││
//! │  │  - Version                                              ││
//! │  │  - Directory offset, length, CRC32                      ││
//! │  └─────────────────────────────────────────────────────────┘│
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │                Baskets (Compressed)                     ││
//! │  │  ┌──────────┐ ┌──────────┐ ┌──────────┐                 ││
//! │  │  │ Basket 1 │ │ Basket 2 │ │ Basket N │ ...             ││
//! │  │  └──────────┘ └──────────┘ └──────────┘                 ││
//! │  └─────────────────────────────────────────────────────────┘│
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │                     Directory                           ││
//! │  │  - Objects (trees) by name                              ││
//! │  │  - Branches: name, class, entry count, basket table     ││
//! │  └─────────────────────────────────────────────────────────┘│
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod basket;
mod compression;
mod directory;
mod file;
mod writer;

pub use basket::{Basket, BasketHeader, BASKET_HEADER_SIZE, BASKET_MAGIC};
pub use compression::{BasketCompression, Compression};
pub use directory::{BasketInfo, BranchInfo, DirectoryObject, TreeDirectory, TreeInfo};
pub use file::TreeFile;
pub use writer::{TreeFileWriter, WriterOptions};

use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::traits::{ParseError, ParseOptions, ParseResult, Parser};

/// Magic bytes opening every tree file
pub const TREE_FILE_MAGIC: &[u8] = b"TDTF";

/// Current format version
pub const FORMAT_VERSION: u32 = 1;

/// Size of the fixed file header
pub const FILE_HEADER_SIZE: u64 = 24;

/// Fixed file header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub version: u32,
    pub directory_offset: u64,
    pub directory_len: u32,
    pub directory_crc32: u32,
}

impl FileHeader {
    fn read_from<R: Read>(reader: &mut R) -> ParseResult<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;

        if magic != TREE_FILE_MAGIC {
            return Err(ParseError::InvalidMagic {
                expected: TREE_FILE_MAGIC.to_vec(),
                found: magic.to_vec(),
            });
        }

        Ok(Self {
            version: reader.read_u32::<LittleEndian>()?,
            directory_offset: reader.read_u64::<LittleEndian>()?,
            directory_len: reader.read_u32::<LittleEndian>()?,
            directory_crc32: reader.read_u32::<LittleEndian>()?,
        })
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> ParseResult<()> {
        writer.write_all(TREE_FILE_MAGIC)?;
        writer.write_u32::<LittleEndian>(self.version)?;
        writer.write_u64::<LittleEndian>(self.directory_offset)?;
        writer.write_u32::<LittleEndian>(self.directory_len)?;
        writer.write_u32::<LittleEndian>(self.directory_crc32)?;
        Ok(())
    }
}

/// Header and directory of a parsed tree file
#[derive(Debug, Clone)]
pub struct TreeFileIndex {
    pub header: FileHeader,
    pub directory: TreeDirectory,
}

/// Tree-file directory parser
#[derive(Debug, Default, Clone, Copy)]
pub struct TreeFileParser;

impl TreeFileParser {
    pub fn new() -> Self {
        Self
    }

    /// Every basket must lie between the header and the directory, and the
    /// baskets of a branch must cover its entries in order without gaps
    fn validate_baskets(&self, index: &TreeFileIndex) -> ParseResult<()> {
        for tree in index.directory.trees() {
            for branch in &tree.branches {
                let mut next_entry = 0u64;
                for basket in &branch.baskets {
                    if basket.first_entry != next_entry {
                        return Err(ParseError::corrupted(
                            basket.offset,
                            format!(
                                "basket of branch {} starts at entry {}, expected {}",
                                branch.name, basket.first_entry, next_entry
                            ),
                        ));
                    }
                    next_entry = next_entry
                        .checked_add(basket.entry_count as u64)
                        .ok_or_else(|| {
                            ParseError::corrupted(
                                basket.offset,
                                format!("entry range of branch {} overflows", branch.name),
                            )
                        })?;

                    let end = basket.offset.saturating_add(BASKET_HEADER_SIZE);
                    if basket.offset < FILE_HEADER_SIZE || end > index.header.directory_offset {
                        return Err(ParseError::corrupted(
                            basket.offset,
                            format!("basket of branch {} lies outside the data region", branch.name),
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

impl Parser for TreeFileParser {
    type Output = TreeFileIndex;

    fn extensions(&self) -> &[&str] {
        &["tdf"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(TREE_FILE_MAGIC)
    }

    fn name(&self) -> &str {
        "Tree File Parser"
    }

    fn supported_versions(&self) -> &[u32] {
        &[FORMAT_VERSION]
    }

    fn parse_with_options<R: Read + Seek>(
        &self,
        mut reader: R,
        options: &ParseOptions,
    ) -> ParseResult<Self::Output> {
        reader.seek(SeekFrom::Start(0))?;
        let header = FileHeader::read_from(&mut reader)?;

        if !self.supported_versions().contains(&header.version) {
            return Err(ParseError::UnsupportedVersion {
                version: header.version,
            });
        }

        options.check_allocation(header.directory_len as usize)?;

        reader.seek(SeekFrom::Start(header.directory_offset))?;
        let mut block = vec![0u8; header.directory_len as usize];
        reader
            .read_exact(&mut block)
            .map_err(|e| ParseError::from(e).with_context("reading directory"))?;

        BasketCompression::verify_crc32(&block, header.directory_crc32)
            .map_err(|e| e.with_context("directory"))?;

        let mut cursor = Cursor::new(block.as_slice());
        let directory = TreeDirectory::read_from(&mut cursor)
            .map_err(|e| e.with_context("decoding directory"))?;

        if cursor.position() != block.len() as u64 {
            return Err(ParseError::corrupted(
                header.directory_offset + cursor.position(),
                "trailing bytes after directory",
            ));
        }

        let index = TreeFileIndex { header, directory };
        self.validate_baskets(&index)?;
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parser_metadata() {
        let parser = TreeFileParser::new();
        assert!(parser.extensions().contains(&"tdf"));
        assert_eq!(parser.magic_bytes(), Some(&b"TDTF"[..]));
        assert_eq!(parser.supported_versions(), &[1]);
        assert!(!parser.name().is_empty());
    }

    #[test]
    fn test_header_layout() {
        let header = FileHeader {
            version: FORMAT_VERSION,
            directory_offset: 0x1122334455,
            directory_len: 17,
            directory_crc32: 0xDEADBEEF,
        };
        let mut bytes = Vec::new();
        header.write_to(&mut bytes).unwrap();

        assert_eq!(bytes.len() as u64, FILE_HEADER_SIZE);
        assert_eq!(&bytes[0..4], b"TDTF");
        assert_eq!(FileHeader::read_from(&mut bytes.as_slice()).unwrap(), header);
    }

    #[test]
    fn test_rejects_foreign_magic() {
        let bytes = b"root\x00\x00\x00\x01 and then some more bytes".to_vec();
        let result = TreeFileParser::new().parse(Cursor::new(bytes));
        assert!(matches!(result, Err(ParseError::InvalidMagic { .. })));
    }

    #[test]
    fn test_rejects_unknown_version() {
        let header = FileHeader {
            version: 99,
            directory_offset: FILE_HEADER_SIZE,
            directory_len: 0,
            directory_crc32: 0,
        };
        let mut bytes = Vec::new();
        header.write_to(&mut bytes).unwrap();

        let result = TreeFileParser::new().parse(Cursor::new(bytes));
        assert!(matches!(result, Err(ParseError::UnsupportedVersion { version: 99 })));
    }

    /// File with one single-entry basket starting at `first_entry`
    fn make_file_with_basket(first_entry: u64) -> Vec<u8> {
        let entry = vec![0u8; 12];
        let basket_bytes = Basket::encode(&[entry], Compression::None).unwrap();

        let mut branch = BranchInfo::new("DST#G4TruthInfo", "PHG4TruthInfoContainer");
        branch.push_basket(BasketInfo {
            offset: FILE_HEADER_SIZE,
            first_entry,
            entry_count: 1,
        });
        let mut tree = TreeInfo::new("T");
        tree.branches.push(branch);
        let directory = TreeDirectory {
            objects: vec![DirectoryObject::Tree(tree)],
        };

        let mut block = Vec::new();
        directory.write_to(&mut block).unwrap();

        let header = FileHeader {
            version: FORMAT_VERSION,
            directory_offset: FILE_HEADER_SIZE + basket_bytes.len() as u64,
            directory_len: block.len() as u32,
            directory_crc32: BasketCompression::crc32(&block),
        };

        let mut bytes = Vec::new();
        header.write_to(&mut bytes).unwrap();
        bytes.extend_from_slice(&basket_bytes);
        bytes.extend_from_slice(&block);
        bytes
    }

    #[test]
    fn test_well_formed_basket_table() {
        let bytes = make_file_with_basket(0);
        let index = TreeFileParser::new().parse(Cursor::new(bytes)).unwrap();
        let branch = index.directory.tree("T").unwrap().branch("DST#G4TruthInfo").unwrap();
        assert_eq!(branch.entries(), 1);
    }

    #[test]
    fn test_basket_at_end_of_entry_range_rejected() {
        let bytes = make_file_with_basket(u64::MAX);
        let result = TreeFileParser::new().parse(Cursor::new(bytes));
        assert!(matches!(result, Err(ParseError::CorruptedData { .. })));
    }

    #[test]
    fn test_gap_in_basket_table_rejected() {
        let bytes = make_file_with_basket(1);
        let result = TreeFileParser::new().parse(Cursor::new(bytes));
        assert!(matches!(result, Err(ParseError::CorruptedData { .. })));
    }
}
