//! tdiff-parsers
//!
//! Reader and writer for the tree-file container holding per-event
//! simulation records, plus the binary codec of the truth record.
//!
//! # Example
//!
//! ```rust,ignore
//! use tdiff_core::TruthInfoContainer;
//! use tdiff_parsers::TreeFile;
//!
//! let mut file = TreeFile::open("G4sPHENIX.tdf")?;
//! let branch = file.branch("T", "DST#G4TruthInfo").cloned().unwrap();
//!
//! let mut truth = TruthInfoContainer::new();
//! file.read_entry(&branch, 0, &mut truth)?;
//! println!("{} particles", truth.particle_map().len());
//! ```

pub mod logging;
pub mod traits;
pub mod tree;
pub mod truth;

// Re-export main types
pub use traits::{BranchRecord, ParseError, ParseOptions, ParseResult, Parser};

pub use tree::{
    BasketCompression, BasketInfo, BranchInfo, Compression, DirectoryObject, FileHeader,
    TreeDirectory, TreeFile, TreeFileIndex, TreeFileParser, TreeFileWriter, TreeInfo,
    WriterOptions,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
