use std::collections::BTreeSet;

use galago_family::bitset::BitSet;
use galago_family::family::{Family, HoleId};
use galago_family::quotient::{ChoiceId, RowGroups};

/// The (hole, option) pairs a choice depends on; empty = uncolored.
pub type Color = Vec<(HoleId, usize)>;

/// Static choice-to-color mapping over a fixed quotient, with derived
/// per-state hole relevance. Built once, immutable afterward; no solving
/// happens here.
#[derive(Debug, Clone)]
pub struct Coloring {
    num_holes: usize,
    row_groups: RowGroups,
    choice_to_assignment: Vec<Color>,
    state_to_holes: Vec<BitSet>,
}

impl Coloring {
    pub fn new(
        family: &Family,
        row_groups: RowGroups,
        choice_to_assignment: Vec<Color>,
    ) -> Self {
        debug_assert_eq!(row_groups.num_choices(), choice_to_assignment.len());
        let num_holes = family.num_holes();
        let mut state_to_holes = Vec::with_capacity(row_groups.num_states());
        for state in 0..row_groups.num_states() {
            let mut holes = BitSet::new(num_holes);
            for choice in row_groups.range(state) {
                for &(hole, _) in &choice_to_assignment[choice] {
                    holes.insert(hole);
                }
            }
            state_to_holes.push(holes);
        }
        Self {
            num_holes,
            row_groups,
            choice_to_assignment,
            state_to_holes,
        }
    }

    pub fn num_holes(&self) -> usize {
        self.num_holes
    }

    pub fn row_groups(&self) -> &RowGroups {
        &self.row_groups
    }

    pub fn choice_to_assignment(&self) -> &[Color] {
        &self.choice_to_assignment
    }

    /// Holes relevant to any outgoing choice, per state.
    pub fn state_to_holes(&self) -> &[BitSet] {
        &self.state_to_holes
    }

    /// Choices compatible with `subfamily`: every uncolored choice, plus
    /// every colored choice whose full color the subfamily includes.
    pub fn select_compatible_choices(&self, subfamily: &Family) -> BitSet {
        let mut selected = BitSet::new(self.choice_to_assignment.len());
        for (choice, color) in self.choice_to_assignment.iter().enumerate() {
            if color.is_empty() || subfamily.includes_assignment_pairs(color) {
                selected.insert(choice);
            }
        }
        selected
    }

    /// Per-hole union of options appearing in the colors of `choices`,
    /// each list sorted ascending. Drives split-candidate selection in the
    /// refinement loop.
    pub fn collect_hole_options(&self, choices: &BitSet) -> Vec<Vec<usize>> {
        let mut collected: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); self.num_holes];
        for choice in choices {
            for &(hole, option) in &self.choice_to_assignment[choice] {
                collected[hole].insert(option);
            }
        }
        collected
            .into_iter()
            .map(|set| set.into_iter().collect())
            .collect()
    }

    /// Convenience lookup for counterexample preparation: the relevant
    /// holes of the quotient state owning `choice`.
    pub fn holes_of_choice(&self, choice: ChoiceId) -> &BitSet {
        &self.state_to_holes[self.row_groups.state_of_choice(choice)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two states, three choices: state 0 has choices colored with hole 0
    /// options 0/1, state 1 has one uncolored choice.
    fn small_coloring() -> (Family, Coloring) {
        let mut family = Family::new();
        family.add_hole(2);
        let row_groups = RowGroups::from_group_sizes(&[2, 1]);
        let colors = vec![vec![(0, 0)], vec![(0, 1)], vec![]];
        let coloring = Coloring::new(&family, row_groups, colors);
        (family, coloring)
    }

    #[test]
    fn full_family_keeps_all_choices() {
        let (family, coloring) = small_coloring();
        let selected = coloring.select_compatible_choices(&family);
        assert_eq!(selected.count(), 3);
    }

    #[test]
    fn narrowing_removes_incompatible_colors() {
        let (mut family, coloring) = small_coloring();
        family.hole_set_options(0, &[0]);
        let selected = coloring.select_compatible_choices(&family);
        assert!(selected.contains(0));
        assert!(!selected.contains(1));
        // Uncolored choices survive any narrowing.
        assert!(selected.contains(2));
    }

    #[test]
    fn state_hole_relevance_is_aggregated() {
        let (_, coloring) = small_coloring();
        assert_eq!(coloring.state_to_holes()[0].count(), 1);
        assert!(coloring.state_to_holes()[0].contains(0));
        assert!(coloring.state_to_holes()[1].is_empty());
        assert!(coloring.holes_of_choice(1).contains(0));
        assert!(coloring.holes_of_choice(2).is_empty());
    }

    #[test]
    fn collect_hole_options_unions_colors() {
        let (_, coloring) = small_coloring();
        let all = BitSet::full(3);
        assert_eq!(coloring.collect_hole_options(&all), vec![vec![0, 1]]);

        let only_first = BitSet::from_indices(3, [0]);
        assert_eq!(coloring.collect_hole_options(&only_first), vec![vec![0]]);
    }

    #[test]
    fn subset_families_select_subset_choices() {
        let (family, coloring) = small_coloring();
        let mut narrowed = family.clone();
        narrowed.hole_set_options(0, &[1]);
        let wide = coloring.select_compatible_choices(&family);
        let tight = coloring.select_compatible_choices(&narrowed);
        assert!(tight.is_subset_of(&wide));
    }
}
