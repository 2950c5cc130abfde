// tdiff-tools/src/args.rs
//! Validation of the two data-file arguments

use std::fs;
use std::path::{Path, PathBuf};

use tdiff_core::Error;
use tracing::debug;

/// Two validated data-file paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputPaths {
    pub file1: PathBuf,
    pub file2: PathBuf,
}

/// Check that both paths name existing regular files and differ
///
/// Nothing is opened. Every problem found is returned, in argument order,
/// so the caller can report all of them at once.
pub fn validate_paths(file1: &Path, file2: &Path) -> Result<InputPaths, Vec<Error>> {
    let mut errors = Vec::new();

    let exists1 = is_regular_file(file1);
    let exists2 = is_regular_file(file2);

    if !exists1 {
        errors.push(Error::FileNotFound(file1.to_path_buf()));
    }
    if !exists2 {
        errors.push(Error::FileNotFound(file2.to_path_buf()));
    }

    if same_path(file1, file2, exists1 && exists2) {
        errors.push(Error::SamePath(file1.to_path_buf()));
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    debug!(file1 = %file1.display(), file2 = %file2.display(), "Arguments valid");

    Ok(InputPaths {
        file1: file1.to_path_buf(),
        file2: file2.to_path_buf(),
    })
}

fn is_regular_file(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}

/// Compare canonical forms when both files exist, raw paths otherwise
fn same_path(file1: &Path, file2: &Path, both_exist: bool) -> bool {
    if both_exist {
        if let (Ok(a), Ok(b)) = (fs::canonicalize(file1), fs::canonicalize(file2)) {
            return a == b;
        }
    }
    file1 == file2
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_file(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"TDTF").unwrap();
        path
    }

    #[test]
    fn test_two_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = make_file(dir.path(), "a.tdf");
        let b = make_file(dir.path(), "b.tdf");

        let paths = validate_paths(&a, &b).unwrap();
        assert_eq!(paths.file1, a);
        assert_eq!(paths.file2, b);
    }

    #[test]
    fn test_each_missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("missing1.tdf");
        let b = dir.path().join("missing2.tdf");

        let errors = validate_paths(&a, &b).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].to_string(), format!("Data file \"{}\" not found", a.display()));
        assert_eq!(errors[1].to_string(), format!("Data file \"{}\" not found", b.display()));
    }

    #[test]
    fn test_equal_paths_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let a = make_file(dir.path(), "a.tdf");

        let errors = validate_paths(&a, &a).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], Error::SamePath(_)));
    }

    #[test]
    fn test_equal_after_canonicalization() {
        let dir = tempfile::tempdir().unwrap();
        let a = make_file(dir.path(), "a.tdf");
        let dotted = dir.path().join(".").join("a.tdf");

        let errors = validate_paths(&a, &dotted).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], Error::SamePath(_)));
    }

    #[test]
    fn test_directory_is_not_a_data_file() {
        let dir = tempfile::tempdir().unwrap();
        let a = make_file(dir.path(), "a.tdf");

        let errors = validate_paths(&a, dir.path()).unwrap_err();
        assert!(matches!(errors[0], Error::FileNotFound(_)));
    }

    #[test]
    fn test_empty_argument() {
        let dir = tempfile::tempdir().unwrap();
        let a = make_file(dir.path(), "a.tdf");

        let errors = validate_paths(&a, Path::new("")).unwrap_err();
        assert_eq!(errors.len(), 1);
    }
}
