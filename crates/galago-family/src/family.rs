use std::fmt;

use indexmap::IndexMap;

use crate::bitset::BitSet;

/// A unique identifier for a hole within its family.
pub type HoleId = usize;

/// An unresolved decision point with a finite option domain.
///
/// The admissible subset is a bit-mask over `0..num_options_total`; the
/// refinement loop narrows it, the coloring components only read it.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Hole {
    num_options_total: usize,
    options: BitSet,
}

/// A product of per-hole admissible-option sets.
///
/// Families created from the same unrefined root share hole indices.
/// Out-of-range hole ids are a contract violation; no bounds-checked
/// accessors are provided.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Family {
    holes: Vec<Hole>,
}

impl Family {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_holes(&self) -> usize {
        self.holes.len()
    }

    /// Adds a hole with the full admissible domain `0..num_options`.
    pub fn add_hole(&mut self, num_options: usize) -> HoleId {
        let hole = Hole {
            num_options_total: num_options,
            options: BitSet::full(num_options),
        };
        self.holes.push(hole);
        self.holes.len() - 1
    }

    /// Narrows the admissible domain of `hole` to exactly `options`.
    ///
    /// Used by the outer refinement loop when splitting a family; an empty
    /// `options` list leaves the family unsatisfiable.
    pub fn hole_set_options(&mut self, hole: HoleId, options: &[usize]) {
        let slot = &mut self.holes[hole];
        slot.options = BitSet::from_indices(slot.num_options_total, options.iter().copied());
    }

    /// Admissible options of `hole` in increasing order.
    pub fn hole_options(&self, hole: HoleId) -> Vec<usize> {
        self.holes[hole].options.iter().collect()
    }

    pub fn hole_options_mask(&self, hole: HoleId) -> &BitSet {
        &self.holes[hole].options
    }

    /// Number of currently admissible options of `hole`.
    pub fn hole_num_options(&self, hole: HoleId) -> usize {
        self.holes[hole].options.count()
    }

    /// Size of the total option domain of `hole`.
    pub fn hole_num_options_total(&self, hole: HoleId) -> usize {
        self.holes[hole].num_options_total
    }

    pub fn hole_contains(&self, hole: HoleId, option: usize) -> bool {
        self.holes[hole].options.contains(option)
    }

    /// True iff every hole has exactly one admissible option.
    pub fn is_assignment(&self) -> bool {
        self.holes.iter().all(|h| h.options.count() == 1)
    }

    /// True iff every hole's admissible set is a subset of `other`'s.
    pub fn is_subset_of(&self, other: &Family) -> bool {
        debug_assert_eq!(self.num_holes(), other.num_holes());
        self.holes
            .iter()
            .zip(&other.holes)
            .all(|(a, b)| a.options.is_subset_of(&b.options))
    }

    /// Dense overload: `assignment[h]` is the option chosen for hole `h`.
    pub fn includes_assignment(&self, assignment: &[usize]) -> bool {
        debug_assert_eq!(assignment.len(), self.num_holes());
        assignment
            .iter()
            .enumerate()
            .all(|(hole, &option)| self.hole_contains(hole, option))
    }

    /// Sparse-map overload: holes absent from the map are unconstrained.
    pub fn includes_assignment_map(&self, assignment: &IndexMap<HoleId, usize>) -> bool {
        assignment
            .iter()
            .all(|(&hole, &option)| self.hole_contains(hole, option))
    }

    /// Sparse pair-list overload: holes absent from the list are
    /// unconstrained. This is the shape of choice colors.
    pub fn includes_assignment_pairs(&self, assignment: &[(HoleId, usize)]) -> bool {
        assignment
            .iter()
            .all(|&(hole, option)| self.hole_contains(hole, option))
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (hole, slot) in self.holes.iter().enumerate() {
            if hole > 0 {
                write!(f, " ")?;
            }
            write!(f, "{hole}:{}", slot.options)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family_of(domains: &[usize]) -> Family {
        let mut family = Family::new();
        for &n in domains {
            family.add_hole(n);
        }
        family
    }

    #[test]
    fn fresh_hole_has_full_domain() {
        let mut family = Family::new();
        let h = family.add_hole(4);
        assert_eq!(family.hole_options(h), vec![0, 1, 2, 3]);
        assert_eq!(family.hole_num_options(h), 4);
        assert_eq!(family.hole_num_options_total(h), 4);
        assert!(!family.is_assignment());
    }

    #[test]
    fn narrowing_and_assignment_detection() {
        let mut family = family_of(&[3, 2]);
        family.hole_set_options(0, &[1]);
        assert!(!family.is_assignment());
        family.hole_set_options(1, &[0]);
        assert!(family.is_assignment());
        assert!(family.hole_contains(0, 1));
        assert!(!family.hole_contains(0, 0));
    }

    #[test]
    fn subset_ordering() {
        let root = family_of(&[3, 3]);
        let mut narrowed = root.clone();
        narrowed.hole_set_options(0, &[0, 2]);
        assert!(narrowed.is_subset_of(&root));
        assert!(!root.is_subset_of(&narrowed));
        assert!(narrowed.is_subset_of(&narrowed));
    }

    #[test]
    fn includes_assignment_overloads_agree() {
        let mut family = family_of(&[3, 4]);
        family.hole_set_options(1, &[2, 3]);

        assert!(family.includes_assignment(&[0, 2]));
        assert!(!family.includes_assignment(&[0, 1]));

        let mut sparse = IndexMap::new();
        sparse.insert(1usize, 3usize);
        assert!(family.includes_assignment_map(&sparse));
        sparse.insert(1usize, 0usize);
        assert!(!family.includes_assignment_map(&sparse));

        assert!(family.includes_assignment_pairs(&[(0, 2), (1, 2)]));
        assert!(!family.includes_assignment_pairs(&[(1, 0)]));
        // An empty color constrains nothing.
        assert!(family.includes_assignment_pairs(&[]));
    }

    #[test]
    fn display_renders_admissible_sets() {
        let mut family = family_of(&[2, 3]);
        family.hole_set_options(1, &[0, 2]);
        assert_eq!(family.to_string(), "[0:{0,1} 1:{0,2}]");
    }

    #[test]
    fn empty_option_set_excludes_every_assignment() {
        let mut family = family_of(&[2]);
        family.hole_set_options(0, &[]);
        assert!(!family.includes_assignment(&[0]));
        assert!(!family.includes_assignment(&[1]));
        assert_eq!(family.hole_num_options(0), 0);
    }
}
