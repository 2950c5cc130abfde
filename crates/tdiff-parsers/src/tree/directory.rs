// tdiff-parsers/src/tree/directory.rs
//! Directory structures: named objects, trees, branches and baskets

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use crate::traits::{ParseError, ParseResult};

/// Object kind tag for trees
const KIND_TREE: u8 = 1;

/// Location of one basket and the entries it holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasketInfo {
    /// Absolute file offset of the basket header
    pub offset: u64,
    /// Index of the first entry stored in the basket
    pub first_entry: u64,
    /// Number of entries stored in the basket
    pub entry_count: u32,
}

impl BasketInfo {
    /// One past the last entry; saturates on malformed directories
    pub fn end_entry(&self) -> u64 {
        self.first_entry.saturating_add(self.entry_count as u64)
    }

    /// Whether `entry` falls inside this basket
    pub fn contains(&self, entry: u64) -> bool {
        entry
            .checked_sub(self.first_entry)
            .is_some_and(|local| local < self.entry_count as u64)
    }
}

/// A named, ordered sequence of serialized records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchInfo {
    pub name: String,
    /// Record class stored in every entry
    pub class_name: String,
    entries: u64,
    #[serde(skip)]
    pub baskets: Vec<BasketInfo>,
}

impl BranchInfo {
    pub fn new(name: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class_name: class_name.into(),
            entries: 0,
            baskets: Vec::new(),
        }
    }

    /// Number of entries in the branch
    pub fn entries(&self) -> u64 {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    pub fn basket_count(&self) -> usize {
        self.baskets.len()
    }

    /// Find the basket holding `entry`
    pub fn basket_for(&self, entry: u64) -> Option<&BasketInfo> {
        // Baskets are stored in entry order
        let idx = self
            .baskets
            .partition_point(|b| b.end_entry() <= entry);
        self.baskets.get(idx).filter(|b| b.contains(entry))
    }

    pub(crate) fn push_basket(&mut self, basket: BasketInfo) {
        self.entries = self.entries.saturating_add(basket.entry_count as u64);
        self.baskets.push(basket);
    }
}

/// A named group of branches
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TreeInfo {
    pub name: String,
    pub branches: Vec<BranchInfo>,
}

impl TreeInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            branches: Vec::new(),
        }
    }

    /// Look up a branch by name
    pub fn branch(&self, name: &str) -> Option<&BranchInfo> {
        self.branches.iter().find(|b| b.name == name)
    }

    pub(crate) fn branch_mut(&mut self, name: &str) -> Option<&mut BranchInfo> {
        self.branches.iter_mut().find(|b| b.name == name)
    }
}

/// A named object stored in the file directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirectoryObject {
    Tree(TreeInfo),
    /// Object of a kind this reader does not interpret
    Other { name: String, kind: u8 },
}

impl DirectoryObject {
    pub fn name(&self) -> &str {
        match self {
            DirectoryObject::Tree(tree) => &tree.name,
            DirectoryObject::Other { name, .. } => name,
        }
    }

    pub fn as_tree(&self) -> Option<&TreeInfo> {
        match self {
            DirectoryObject::Tree(tree) => Some(tree),
            DirectoryObject::Other { .. } => None,
        }
    }
}

/// Table of contents of a tree file
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TreeDirectory {
    pub objects: Vec<DirectoryObject>,
}

impl TreeDirectory {
    /// Get an object by name
    pub fn get(&self, name: &str) -> Option<&DirectoryObject> {
        self.objects.iter().find(|o| o.name() == name)
    }

    /// Get a tree by name; objects of other kinds are ignored
    pub fn tree(&self, name: &str) -> Option<&TreeInfo> {
        self.get(name).and_then(DirectoryObject::as_tree)
    }

    pub fn trees(&self) -> impl Iterator<Item = &TreeInfo> {
        self.objects.iter().filter_map(DirectoryObject::as_tree)
    }

    /// Decode a directory block
    pub fn read_from<R: Read>(reader: &mut R) -> ParseResult<Self> {
        let object_count = reader.read_u32::<LittleEndian>()?;
        let mut objects = Vec::new();

        for _ in 0..object_count {
            let kind = reader.read_u8()?;
            let name = read_string(reader)?;

            if kind != KIND_TREE {
                objects.push(DirectoryObject::Other { name, kind });
                continue;
            }

            let branch_count = reader.read_u32::<LittleEndian>()?;
            let mut tree = TreeInfo::new(name);

            for _ in 0..branch_count {
                let name = read_string(reader)?;
                let class_name = read_string(reader)?;
                let entries = reader.read_u64::<LittleEndian>()?;
                let basket_count = reader.read_u32::<LittleEndian>()?;

                let mut branch = BranchInfo::new(name, class_name);
                for _ in 0..basket_count {
                    branch.push_basket(BasketInfo {
                        offset: reader.read_u64::<LittleEndian>()?,
                        first_entry: reader.read_u64::<LittleEndian>()?,
                        entry_count: reader.read_u32::<LittleEndian>()?,
                    });
                }

                if branch.entries() != entries {
                    return Err(ParseError::InvalidStructure(format!(
                        "branch {} declares {} entries but its baskets hold {}",
                        branch.name,
                        entries,
                        branch.entries()
                    )));
                }

                tree.branches.push(branch);
            }

            objects.push(DirectoryObject::Tree(tree));
        }

        Ok(Self { objects })
    }

    /// Encode the directory block
    pub fn write_to<W: Write>(&self, writer: &mut W) -> ParseResult<()> {
        writer.write_u32::<LittleEndian>(self.objects.len() as u32)?;

        for object in &self.objects {
            match object {
                DirectoryObject::Other { name, kind } => {
                    writer.write_u8(*kind)?;
                    write_string(writer, name)?;
                }
                DirectoryObject::Tree(tree) => {
                    writer.write_u8(KIND_TREE)?;
                    write_string(writer, &tree.name)?;
                    writer.write_u32::<LittleEndian>(tree.branches.len() as u32)?;

                    for branch in &tree.branches {
                        write_string(writer, &branch.name)?;
                        write_string(writer, &branch.class_name)?;
                        writer.write_u64::<LittleEndian>(branch.entries())?;
                        writer.write_u32::<LittleEndian>(branch.baskets.len() as u32)?;

                        for basket in &branch.baskets {
                            writer.write_u64::<LittleEndian>(basket.offset)?;
                            writer.write_u64::<LittleEndian>(basket.first_entry)?;
                            writer.write_u32::<LittleEndian>(basket.entry_count)?;
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

/// Read a `u16`-length-prefixed UTF-8 string
pub(crate) fn read_string<R: Read>(reader: &mut R) -> ParseResult<String> {
    let len = reader.read_u16::<LittleEndian>()? as usize;
    let mut bytes = vec![0u8; len];
    reader.read_exact(&mut bytes)?;
    String::from_utf8(bytes)
        .map_err(|e| ParseError::InvalidStructure(format!("name is not valid UTF-8: {}", e)))
}

/// Write a `u16`-length-prefixed UTF-8 string
pub(crate) fn write_string<W: Write>(writer: &mut W, value: &str) -> ParseResult<()> {
    let len = u16::try_from(value.len())
        .map_err(|_| ParseError::InvalidStructure(format!("name too long: {} bytes", value.len())))?;
    writer.write_u16::<LittleEndian>(len)?;
    writer.write_all(value.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn make_branch(name: &str, baskets: &[(u64, u32)]) -> BranchInfo {
        let mut branch = BranchInfo::new(name, "PHG4TruthInfoContainer");
        for (i, (first, count)) in baskets.iter().enumerate() {
            branch.push_basket(BasketInfo {
                offset: 24 + i as u64 * 100,
                first_entry: *first,
                entry_count: *count,
            });
        }
        branch
    }

    #[test]
    fn test_basket_for() {
        let branch = make_branch("b", &[(0, 3), (3, 3), (6, 1)]);
        assert_eq!(branch.entries(), 7);
        assert_eq!(branch.basket_for(0).map(|b| b.first_entry), Some(0));
        assert_eq!(branch.basket_for(2).map(|b| b.first_entry), Some(0));
        assert_eq!(branch.basket_for(3).map(|b| b.first_entry), Some(3));
        assert_eq!(branch.basket_for(6).map(|b| b.first_entry), Some(6));
        assert!(branch.basket_for(7).is_none());
    }

    #[test]
    fn test_basket_at_end_of_entry_range() {
        let branch = make_branch("b", &[(u64::MAX, 1)]);
        let basket = &branch.baskets[0];

        assert_eq!(basket.end_entry(), u64::MAX);
        assert!(!basket.contains(0));
        assert!(basket.contains(u64::MAX));
        assert!(branch.basket_for(0).is_none());
    }

    #[test]
    fn test_lookup_by_name() {
        let mut tree = TreeInfo::new("T");
        tree.branches.push(make_branch("DST#G4TruthInfo", &[(0, 2)]));
        let directory = TreeDirectory {
            objects: vec![
                DirectoryObject::Other { name: "Histo".into(), kind: 7 },
                DirectoryObject::Tree(tree),
            ],
        };

        assert!(directory.tree("T").is_some());
        assert!(directory.get("Histo").is_some());
        assert!(directory.tree("Histo").is_none());
        assert!(directory.tree("missing").is_none());

        let tree = directory.tree("T").unwrap();
        assert!(tree.branch("DST#G4TruthInfo").is_some());
        assert!(tree.branch("DST#PHG4HitContainer").is_none());
    }

    #[test]
    fn test_directory_encoding_preserves_layout() {
        let mut tree = TreeInfo::new("T");
        tree.branches.push(make_branch("DST#G4TruthInfo", &[(0, 4), (4, 2)]));
        tree.branches.push(make_branch("empty", &[]));
        let directory = TreeDirectory {
            objects: vec![DirectoryObject::Tree(tree)],
        };

        let mut bytes = Vec::new();
        directory.write_to(&mut bytes).unwrap();
        let decoded = TreeDirectory::read_from(&mut Cursor::new(bytes)).unwrap();

        assert_eq!(decoded, directory);
        assert!(decoded.tree("T").unwrap().branch("empty").unwrap().is_empty());
    }

    #[test]
    fn test_entry_count_disagreement_is_rejected() {
        let mut bytes = Vec::new();
        bytes.write_u32::<LittleEndian>(1).unwrap();
        bytes.write_u8(KIND_TREE).unwrap();
        write_string(&mut bytes, "T").unwrap();
        bytes.write_u32::<LittleEndian>(1).unwrap();
        write_string(&mut bytes, "b").unwrap();
        write_string(&mut bytes, "X").unwrap();
        bytes.write_u64::<LittleEndian>(5).unwrap();
        bytes.write_u32::<LittleEndian>(0).unwrap();

        let result = TreeDirectory::read_from(&mut Cursor::new(bytes));
        assert!(matches!(result, Err(ParseError::InvalidStructure(_))));
    }
}
