// tdiff-tools/src/locate.rs
//! Finding the compared branch in each input file

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use tdiff_core::{Error, Result};
use tdiff_parsers::{BranchInfo, BranchRecord, ParseOptions, TreeFile};
use tracing::{info, warn};

use crate::args::InputPaths;

/// An open file together with the branch to read from it
///
/// Dropping the input closes the file.
#[derive(Debug)]
pub struct BranchInput {
    path: PathBuf,
    file: TreeFile<BufReader<File>>,
    branch: BranchInfo,
}

impl BranchInput {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn branch(&self) -> &BranchInfo {
        &self.branch
    }

    /// Number of records in the branch
    pub fn entries(&self) -> u64 {
        self.branch.entries()
    }

    /// Decode record `entry` into `target`, replacing its contents
    pub fn read_entry<T: BranchRecord>(&mut self, entry: u64, target: &mut T) -> Result<()> {
        self.file
            .read_entry(&self.branch, entry, target)
            .map_err(|e| Error::read_failed(&self.path, entry, e))
    }
}

/// Open `path` and look up `branch` in tree `tree`
///
/// Fails if the file cannot be opened, if no tree of that name exists, or if
/// the branch is missing or has no entries.
pub fn find_branch(
    branch: &str,
    tree: &str,
    path: &Path,
    options: &ParseOptions,
) -> Result<BranchInput> {
    let file = TreeFile::open_with_options(path, options.clone())
        .map_err(|e| Error::cannot_open(path, e))?;

    let Some(tree_info) = file.tree(tree) else {
        return Err(Error::TreeNotFound {
            tree: tree.to_string(),
            path: path.to_path_buf(),
        });
    };

    let branch_info = match tree_info.branch(branch) {
        Some(b) if !b.is_empty() => b.clone(),
        _ => {
            return Err(Error::BranchNotFoundOrEmpty {
                branch: branch.to_string(),
                path: path.to_path_buf(),
            });
        }
    };

    info!(
        path = %path.display(),
        tree,
        branch,
        entries = branch_info.entries(),
        "Found branch"
    );

    Ok(BranchInput {
        path: path.to_path_buf(),
        file,
        branch: branch_info,
    })
}

/// Look up the branch in both inputs
///
/// Both lookups always run; every failure is returned.
pub fn find_branches(
    paths: &InputPaths,
    tree: &str,
    branch: &str,
    options: &ParseOptions,
) -> std::result::Result<(BranchInput, BranchInput), Vec<Error>> {
    let first = find_branch(branch, tree, &paths.file1, options);
    let second = find_branch(branch, tree, &paths.file2, options);

    match (first, second) {
        (Ok(a), Ok(b)) => Ok((a, b)),
        (a, b) => {
            let errors: Vec<Error> = [a.err(), b.err()].into_iter().flatten().collect();
            for error in &errors {
                warn!(%error, "Branch lookup failed");
            }
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tdiff_core::{Particle, TruthInfoContainer};
    use tdiff_parsers::{TreeFileWriter, WriterOptions};

    const TREE: &str = "T";
    const BRANCH: &str = "DST#G4TruthInfo";

    fn make_truth(event: i32) -> TruthInfoContainer {
        let mut c = TruthInfoContainer::new();
        c.add_particle(1, Particle::new(1, 11, "e-").with_momentum(event as f64, 0.0, 0.0, 1.0));
        c
    }

    fn make_file(dir: &Path, name: &str, records: i32) -> PathBuf {
        let path = dir.join(name);
        let mut writer = TreeFileWriter::create(&path, WriterOptions::default()).unwrap();
        for event in 0..records {
            writer.fill(TREE, BRANCH, &make_truth(event)).unwrap();
        }
        writer.finish().unwrap();
        path
    }

    #[test]
    fn test_find_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = make_file(dir.path(), "a.tdf", 3);

        let mut input = find_branch(BRANCH, TREE, &path, &ParseOptions::default()).unwrap();
        assert_eq!(input.entries(), 3);
        assert_eq!(input.path(), path.as_path());

        let mut truth = TruthInfoContainer::new();
        input.read_entry(2, &mut truth).unwrap();
        assert_eq!(truth, make_truth(2));
    }

    #[test]
    fn test_read_past_end_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = make_file(dir.path(), "a.tdf", 1);

        let mut input = find_branch(BRANCH, TREE, &path, &ParseOptions::default()).unwrap();
        let mut truth = TruthInfoContainer::new();
        let err = input.read_entry(1, &mut truth).unwrap_err();
        assert!(matches!(err, Error::ReadFailed { entry: 1, .. }));
    }

    #[test]
    fn test_not_a_tree_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "plain text, no header").unwrap();

        let err = find_branch(BRANCH, TREE, &path, &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, Error::CannotOpen { .. }));
    }

    #[test]
    fn test_missing_tree() {
        let dir = tempfile::tempdir().unwrap();
        let path = make_file(dir.path(), "a.tdf", 2);

        let err = find_branch(BRANCH, "Tx", &path, &ParseOptions::default()).unwrap_err();
        assert_eq!(err.to_string(), format!("TTree \"Tx\" not found in {}", path.display()));
    }

    #[test]
    fn test_object_of_other_kind_is_not_a_tree() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("histo.tdf");
        let mut writer = TreeFileWriter::create(&path, WriterOptions::default()).unwrap();
        writer.add_object(TREE, 3).unwrap();
        writer.finish().unwrap();

        let err = find_branch(BRANCH, TREE, &path, &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, Error::TreeNotFound { .. }));
    }

    #[test]
    fn test_missing_branch() {
        let dir = tempfile::tempdir().unwrap();
        let path = make_file(dir.path(), "a.tdf", 2);

        let err = find_branch("DST#PHG4HitContainer", TREE, &path, &ParseOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::BranchNotFoundOrEmpty { .. }));
    }

    #[test]
    fn test_empty_branch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.tdf");
        let mut writer = TreeFileWriter::create(&path, WriterOptions::default()).unwrap();
        writer.add_branch(TREE, BRANCH, TruthInfoContainer::CLASS_NAME).unwrap();
        writer.finish().unwrap();

        let err = find_branch(BRANCH, TREE, &path, &ParseOptions::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            format!(
                "Branch \"{}\" does not exist or has 0 entries in {}",
                BRANCH,
                path.display()
            )
        );
    }

    #[test]
    fn test_find_branches_reports_both_failures() {
        let dir = tempfile::tempdir().unwrap();
        let good = make_file(dir.path(), "good.tdf", 2);
        let paths = InputPaths {
            file1: good.clone(),
            file2: good,
        };

        let errors = find_branches(&paths, "Tx", BRANCH, &ParseOptions::default()).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| matches!(e, Error::TreeNotFound { .. })));
    }

    #[test]
    fn test_find_branches_one_failure() {
        let dir = tempfile::tempdir().unwrap();
        let good = make_file(dir.path(), "good.tdf", 2);
        let bad = dir.path().join("bad.tdf");
        std::fs::write(&bad, "xx").unwrap();
        let paths = InputPaths {
            file1: good,
            file2: bad,
        };

        let errors = find_branches(&paths, TREE, BRANCH, &ParseOptions::default()).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], Error::CannotOpen { .. }));
    }
}
