// tdiff-tools/src/compare.rs
//! Record-by-record comparison of two branches

use serde::Serialize;
use tdiff_core::{Result, TruthInfoContainer};
use tracing::{debug, info};

use crate::diff::{diff, DiffCount};
use crate::locate::BranchInput;

/// Default tree holding the truth branch
pub const DEFAULT_TREE: &str = "T";

/// Default truth branch name
pub const DEFAULT_BRANCH: &str = "DST#G4TruthInfo";

/// Default upper bound on compared records
pub const DEFAULT_MAX_RECORDS: u64 = 10;

/// What to compare and how far
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompareConfig {
    pub tree: String,
    pub branch: String,
    pub max_records: u64,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            tree: DEFAULT_TREE.to_string(),
            branch: DEFAULT_BRANCH.to_string(),
            max_records: DEFAULT_MAX_RECORDS,
        }
    }
}

/// A sequence of truth records read by index
pub trait EntrySource {
    /// Number of records available
    fn entries(&self) -> u64;

    /// Decode record `entry` into `target`, replacing its contents
    fn read_entry(&mut self, entry: u64, target: &mut TruthInfoContainer) -> Result<()>;
}

impl EntrySource for BranchInput {
    fn entries(&self) -> u64 {
        BranchInput::entries(self)
    }

    fn read_entry(&mut self, entry: u64, target: &mut TruthInfoContainer) -> Result<()> {
        BranchInput::read_entry(self, entry, target)
    }
}

/// The first differing record and its counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecordDiff {
    pub record: u64,
    pub diff: DiffCount,
}

/// Outcome of a comparison run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Comparison {
    pub records1: u64,
    pub records2: u64,
    /// Number of records the run was bounded to
    pub compared: u64,
    pub first_diff: Option<RecordDiff>,
}

impl Comparison {
    /// Process exit status: the index of the first differing record, or 0
    ///
    /// A difference at record 0 also yields 0.
    pub fn exit_status(&self) -> u8 {
        self.first_diff
            .map(|d| u8::try_from(d.record).unwrap_or(u8::MAX))
            .unwrap_or(0)
    }
}

/// Number of records a run over these inputs will compare
pub fn record_bound(records1: u64, records2: u64, max_records: u64) -> u64 {
    records1.min(records2).min(max_records)
}

/// Compare the first `min(entries1, entries2, max_records)` records
///
/// Stops at the first record pair whose [`DiffCount`] has mismatches. One
/// container per side is allocated up front and reused for every record.
pub fn compare<A, B>(source1: &mut A, source2: &mut B, max_records: u64) -> Result<Comparison>
where
    A: EntrySource + ?Sized,
    B: EntrySource + ?Sized,
{
    let records1 = source1.entries();
    let records2 = source2.entries();
    let compared = record_bound(records1, records2, max_records);

    info!(records1, records2, compared, "Comparing records");

    let mut truth1 = TruthInfoContainer::new();
    let mut truth2 = TruthInfoContainer::new();
    let mut first_diff = None;

    for record in 0..compared {
        source1.read_entry(record, &mut truth1)?;
        source2.read_entry(record, &mut truth2)?;

        let counts = diff(&truth1, &truth2);
        debug!(record, mismatches = counts.has_mismatches(), "Compared record");

        if counts.has_mismatches() {
            info!(record, "First difference found");
            first_diff = Some(RecordDiff {
                record,
                diff: counts,
            });
            break;
        }
    }

    Ok(Comparison {
        records1,
        records2,
        compared,
        first_diff,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tdiff_core::{Error, Particle};

    /// In-memory records, counting reads
    struct MemorySource {
        records: Vec<TruthInfoContainer>,
        reads: Vec<u64>,
    }

    impl MemorySource {
        fn new(records: Vec<TruthInfoContainer>) -> Self {
            Self {
                records,
                reads: Vec::new(),
            }
        }
    }

    impl EntrySource for MemorySource {
        fn entries(&self) -> u64 {
            self.records.len() as u64
        }

        fn read_entry(&mut self, entry: u64, target: &mut TruthInfoContainer) -> Result<()> {
            self.reads.push(entry);
            let record = self
                .records
                .get(entry as usize)
                .ok_or_else(|| Error::read_failed("memory", entry, "no such record"))?;
            target.clone_from(record);
            Ok(())
        }
    }

    fn make_record(event: i32, px: f64) -> TruthInfoContainer {
        let mut c = TruthInfoContainer::new();
        c.add_particle(event, Particle::new(event, 13, "mu-").with_momentum(px, 0.0, 0.0, 1.0));
        c
    }

    fn make_records(count: i32) -> Vec<TruthInfoContainer> {
        (0..count).map(|e| make_record(e, 1.0)).collect()
    }

    #[test]
    fn test_identical_sources() {
        let mut a = MemorySource::new(make_records(4));
        let mut b = MemorySource::new(make_records(4));

        let result = compare(&mut a, &mut b, DEFAULT_MAX_RECORDS).unwrap();
        assert_eq!(result.compared, 4);
        assert_eq!(result.first_diff, None);
        assert_eq!(result.exit_status(), 0);
    }

    #[test]
    fn test_stops_at_first_difference() {
        let mut records = make_records(8);
        records[5] = make_record(5, 2.0);
        records[6] = make_record(6, 2.0);

        let mut a = MemorySource::new(make_records(8));
        let mut b = MemorySource::new(records);

        let result = compare(&mut a, &mut b, DEFAULT_MAX_RECORDS).unwrap();
        let first = result.first_diff.unwrap();
        assert_eq!(first.record, 5);
        assert_eq!(first.diff.particles, 1);
        assert_eq!(result.exit_status(), 5);
        assert_eq!(b.reads, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_bounded_by_shorter_side() {
        let mut a = MemorySource::new(make_records(3));
        let mut b = MemorySource::new(make_records(7));

        let result = compare(&mut a, &mut b, DEFAULT_MAX_RECORDS).unwrap();
        assert_eq!((result.records1, result.records2, result.compared), (3, 7, 3));
        assert!(result.first_diff.is_none());
        assert_eq!(b.reads.len(), 3);
    }

    #[test]
    fn test_bounded_by_max_records() {
        let mut records = make_records(20);
        records[12] = make_record(12, 5.0);

        let mut a = MemorySource::new(make_records(20));
        let mut b = MemorySource::new(records);

        let result = compare(&mut a, &mut b, DEFAULT_MAX_RECORDS).unwrap();
        assert_eq!(result.compared, 10);
        assert!(result.first_diff.is_none());
    }

    #[test]
    fn test_difference_at_record_zero() {
        let mut a = MemorySource::new(vec![make_record(0, 1.0)]);
        let mut b = MemorySource::new(vec![make_record(0, -1.0)]);

        let result = compare(&mut a, &mut b, DEFAULT_MAX_RECORDS).unwrap();
        assert_eq!(result.first_diff.map(|d| d.record), Some(0));
        assert_eq!(result.exit_status(), 0);
    }

    #[test]
    fn test_read_failure_propagates() {
        struct Broken;
        impl EntrySource for Broken {
            fn entries(&self) -> u64 {
                5
            }
            fn read_entry(&mut self, entry: u64, _: &mut TruthInfoContainer) -> Result<()> {
                Err(Error::read_failed("broken", entry, "corrupted basket"))
            }
        }

        let mut a = MemorySource::new(make_records(5));
        let result = compare(&mut a, &mut Broken, DEFAULT_MAX_RECORDS);
        assert!(matches!(result, Err(Error::ReadFailed { entry: 0, .. })));
    }

    #[test]
    fn test_default_config() {
        let config = CompareConfig::default();
        assert_eq!(config.tree, "T");
        assert_eq!(config.branch, "DST#G4TruthInfo");
        assert_eq!(config.max_records, 10);
    }
}
