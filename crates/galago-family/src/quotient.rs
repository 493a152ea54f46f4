use indexmap::IndexMap;

use crate::bitset::BitSet;

/// A state identifier within one transition structure.
pub type StateId = usize;
/// A choice (state-action alternative) identifier within the quotient.
pub type ChoiceId = usize;

/// State-to-choice-range mapping of a nondeterministic transition
/// structure: choices of state `s` are `offsets[s]..offsets[s + 1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowGroups {
    offsets: Vec<usize>,
}

impl RowGroups {
    /// Builds row groups from `num_choices_per_state`.
    pub fn from_group_sizes(sizes: &[usize]) -> Self {
        let mut offsets = Vec::with_capacity(sizes.len() + 1);
        let mut total = 0;
        offsets.push(0);
        for &size in sizes {
            total += size;
            offsets.push(total);
        }
        Self { offsets }
    }

    /// Wraps an explicit offset vector; `offsets` must be monotone and
    /// start at 0.
    pub fn from_offsets(offsets: Vec<usize>) -> Self {
        debug_assert!(offsets.first() == Some(&0));
        debug_assert!(offsets.windows(2).all(|w| w[0] <= w[1]));
        Self { offsets }
    }

    pub fn num_states(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn num_choices(&self) -> usize {
        *self.offsets.last().unwrap_or(&0)
    }

    /// Choice range of `state`.
    pub fn range(&self, state: StateId) -> std::ops::Range<ChoiceId> {
        self.offsets[state]..self.offsets[state + 1]
    }

    /// State owning `choice`.
    pub fn state_of_choice(&self, choice: ChoiceId) -> StateId {
        // offsets is sorted; partition_point returns the first state whose
        // group starts beyond the choice.
        self.offsets.partition_point(|&offset| offset <= choice) - 1
    }
}

/// Choice-level transition structure of the quotient model.
#[derive(Debug, Clone)]
pub struct QuotientModel {
    row_groups: RowGroups,
    /// Sparse successor distribution per choice.
    rows: Vec<Vec<(StateId, f64)>>,
}

impl QuotientModel {
    pub fn new(row_groups: RowGroups, rows: Vec<Vec<(StateId, f64)>>) -> Self {
        debug_assert_eq!(row_groups.num_choices(), rows.len());
        Self { row_groups, rows }
    }

    pub fn row_groups(&self) -> &RowGroups {
        &self.row_groups
    }

    pub fn num_states(&self) -> usize {
        self.row_groups.num_states()
    }

    pub fn row(&self, choice: ChoiceId) -> &[(StateId, f64)] {
        &self.rows[choice]
    }
}

/// A deterministic member of the family: one outgoing distribution per
/// state, plus the labeling and reward models counterexample analysis
/// needs.
#[derive(Debug, Clone)]
pub struct SubModel {
    initial_state: StateId,
    rows: Vec<Vec<(StateId, f64)>>,
    labels: IndexMap<String, BitSet>,
    reward_models: IndexMap<String, Vec<f64>>,
}

impl SubModel {
    pub fn new(initial_state: StateId, rows: Vec<Vec<(StateId, f64)>>) -> Self {
        Self {
            initial_state,
            rows,
            labels: IndexMap::new(),
            reward_models: IndexMap::new(),
        }
    }

    pub fn num_states(&self) -> usize {
        self.rows.len()
    }

    pub fn initial_state(&self) -> StateId {
        self.initial_state
    }

    pub fn row(&self, state: StateId) -> &[(StateId, f64)] {
        &self.rows[state]
    }

    /// Attaches a named state set; replaces any previous set of that name.
    pub fn set_label(&mut self, name: impl Into<String>, states: BitSet) {
        debug_assert_eq!(states.capacity(), self.num_states());
        self.labels.insert(name.into(), states);
    }

    pub fn label(&self, name: &str) -> Option<&BitSet> {
        self.labels.get(name)
    }

    /// Attaches a named per-state reward vector.
    pub fn set_reward_model(&mut self, name: impl Into<String>, rewards: Vec<f64>) {
        debug_assert_eq!(rewards.len(), self.num_states());
        self.reward_models.insert(name.into(), rewards);
    }

    pub fn reward_model(&self, name: &str) -> Option<&[f64]> {
        self.reward_models.get(name).map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_groups_ranges_and_reverse_lookup() {
        let groups = RowGroups::from_group_sizes(&[2, 1, 3]);
        assert_eq!(groups.num_states(), 3);
        assert_eq!(groups.num_choices(), 6);
        assert_eq!(groups.range(0), 0..2);
        assert_eq!(groups.range(1), 2..3);
        assert_eq!(groups.range(2), 3..6);
        for state in 0..3 {
            for choice in groups.range(state) {
                assert_eq!(groups.state_of_choice(choice), state);
            }
        }
    }

    #[test]
    fn explicit_offsets_round_trip() {
        let groups = RowGroups::from_offsets(vec![0, 2, 3]);
        assert_eq!(groups.num_states(), 2);
        assert_eq!(groups.num_choices(), 3);
        assert_eq!(groups.range(1), 2..3);
    }

    #[test]
    fn row_groups_tolerate_empty_groups() {
        let groups = RowGroups::from_group_sizes(&[1, 0, 2]);
        assert_eq!(groups.range(1), 1..1);
        assert_eq!(groups.state_of_choice(1), 2);
    }

    #[test]
    fn sub_model_labels_and_rewards() {
        let mut sub = SubModel::new(0, vec![vec![(1, 1.0)], vec![(1, 1.0)]]);
        sub.set_label("target", BitSet::from_indices(2, [1]));
        sub.set_reward_model("steps", vec![1.0, 0.0]);

        assert!(sub.label("target").is_some_and(|s| s.contains(1)));
        assert!(sub.label("missing").is_none());
        assert_eq!(sub.reward_model("steps"), Some(&[1.0, 0.0][..]));
    }
}
