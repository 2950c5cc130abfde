//! tdiff-tools
//!
//! The pieces of a truth comparison run: argument validation, branch
//! lookup, the per-record differ, the comparison driver and report
//! rendering.

pub mod args;
pub mod compare;
pub mod diff;
pub mod locate;
pub mod report;

pub use args::{validate_paths, InputPaths};
pub use compare::{compare, CompareConfig, Comparison, EntrySource, RecordDiff};
pub use diff::{count_mismatches, diff, DiffCount};
pub use locate::{find_branch, find_branches, BranchInput};
pub use report::{render, OutputFormat};
