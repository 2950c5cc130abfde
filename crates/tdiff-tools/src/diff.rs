// tdiff-tools/src/diff.rs
//! Per-record comparison of two truth containers

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tdiff_core::TruthInfoContainer;

/// Result of comparing one pair of records
///
/// Holds a mismatch count per collection kind and the size of each
/// collection on both sides. Displayed as three lines: the mismatch counts,
/// then the sizes in file 1, then the sizes in file 2.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffCount {
    pub particles: usize,
    pub vertices: usize,
    pub showers: usize,

    pub particles1: usize,
    pub vertices1: usize,
    pub showers1: usize,

    pub particles2: usize,
    pub vertices2: usize,
    pub showers2: usize,
}

impl DiffCount {
    /// True if any collection has a mismatching element
    pub fn has_mismatches(&self) -> bool {
        self.particles != 0 || self.vertices != 0 || self.showers != 0
    }
}

impl fmt::Display for DiffCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {} {}", self.particles, self.vertices, self.showers)?;
        writeln!(f, "{} {} {}", self.particles1, self.vertices1, self.showers1)?;
        write!(f, "{} {} {}", self.particles2, self.vertices2, self.showers2)
    }
}

/// Count positions where the key-ordered elements of `a` and `b` differ
///
/// Only the first `min(a.len(), b.len())` positions are compared. Extra
/// elements on the longer side do not count as mismatches.
pub fn count_mismatches<K, V>(a: &BTreeMap<K, V>, b: &BTreeMap<K, V>) -> usize
where
    K: PartialEq,
    V: PartialEq,
{
    a.iter().zip(b.iter()).filter(|(x, y)| x != y).count()
}

/// Compare the particle, vertex and shower maps of two records
pub fn diff(c1: &TruthInfoContainer, c2: &TruthInfoContainer) -> DiffCount {
    DiffCount {
        particles: count_mismatches(c1.particle_map(), c2.particle_map()),
        vertices: count_mismatches(c1.vertex_map(), c2.vertex_map()),
        showers: count_mismatches(c1.shower_map(), c2.shower_map()),

        particles1: c1.particle_map().len(),
        vertices1: c1.vertex_map().len(),
        showers1: c1.shower_map().len(),

        particles2: c2.particle_map().len(),
        vertices2: c2.vertex_map().len(),
        showers2: c2.shower_map().len(),
    }
}
