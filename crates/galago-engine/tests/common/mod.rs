#![allow(dead_code)]

use std::convert::Infallible;

use galago_engine::checker::{CeModel, ModelChecker, QuantitativeResult, QueryKind};
use galago_family::bitset::BitSet;
use galago_family::quotient::{QuotientModel, RowGroups, SubModel};

/// Reference numeric checker for tests: Gauss-Seidel value iteration over
/// the counterexample model, warm-started from the hint when present.
pub struct ValueIterationChecker {
    pub precision: f64,
    pub max_iterations: usize,
}

impl Default for ValueIterationChecker {
    fn default() -> Self {
        Self {
            precision: 1e-9,
            max_iterations: 100_000,
        }
    }
}

impl ModelChecker for ValueIterationChecker {
    type Error = Infallible;

    fn check(
        &mut self,
        model: &CeModel,
        query: QueryKind,
        hint: Option<&QuantitativeResult>,
    ) -> Result<QuantitativeResult, Infallible> {
        let num_states = model.num_states();
        let mut values = match hint {
            Some(hint) if hint.values.len() == num_states => hint.values.clone(),
            _ => vec![0.0; num_states],
        };

        for _ in 0..self.max_iterations {
            let mut delta: f64 = 0.0;
            for state in 0..num_states {
                let fresh = if model.target.contains(state) {
                    match query {
                        QueryKind::Probability => 1.0,
                        QueryKind::ExpectedReward => 0.0,
                    }
                } else if model
                    .until
                    .as_ref()
                    .is_some_and(|until| !until.contains(state))
                {
                    0.0
                } else {
                    let base = model
                        .rewards
                        .as_ref()
                        .map_or(0.0, |rewards| rewards[state]);
                    model.rows[state]
                        .iter()
                        .fold(base, |acc, &(succ, p)| acc + p * values[succ])
                };
                delta = delta.max((fresh - values[state]).abs());
                values[state] = fresh;
            }
            if delta < self.precision {
                break;
            }
        }
        Ok(QuantitativeResult { values })
    }
}

/// A deterministic n-state chain `0 -> 1 -> ... -> n-1` with an absorbing
/// final state labeled `target`.
pub fn chain_sub_model(num_states: usize) -> SubModel {
    let rows = (0..num_states)
        .map(|state| {
            if state + 1 < num_states {
                vec![(state + 1, 1.0)]
            } else {
                vec![(state, 1.0)]
            }
        })
        .collect();
    let mut sub = SubModel::new(0, rows);
    sub.set_label(
        "target",
        BitSet::from_indices(num_states, [num_states - 1]),
    );
    sub
}

/// The quotient matching [`chain_sub_model`]: one choice per state.
pub fn chain_quotient(num_states: usize) -> QuotientModel {
    let row_groups = RowGroups::from_group_sizes(&vec![1; num_states]);
    let rows = (0..num_states)
        .map(|state| {
            if state + 1 < num_states {
                vec![(state + 1, 1.0)]
            } else {
                vec![(state, 1.0)]
            }
        })
        .collect();
    QuotientModel::new(row_groups, rows)
}

/// Per-quotient-state hole relevance: `holes[i]` lists the holes of
/// state `i`.
pub fn state_holes(num_states: usize, num_holes: usize, holes: &[(usize, usize)]) -> Vec<BitSet> {
    let mut sets = vec![BitSet::new(num_holes); num_states];
    for &(state, hole) in holes {
        sets[state].insert(hole);
    }
    sets
}
