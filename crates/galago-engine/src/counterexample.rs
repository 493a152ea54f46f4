use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info};

use galago_family::bitset::BitSet;
use galago_family::family::HoleId;
use galago_family::property::{ClassifiedProperty, FormulaError, Property, PropertyDirection};
use galago_family::quotient::{QuotientModel, StateId, SubModel};

use crate::checker::{CeModel, ModelChecker, QuantitativeResult, QueryKind};
use crate::result::CexProfile;

/// Errors surfaced while constructing a conflict.
#[derive(Debug, Error)]
pub enum CexError<E: std::error::Error> {
    #[error("model checker error: {0}")]
    Checker(#[source] E),
}

/// Transient exploration state of one conflict construction: the wave
/// counter, per-hole registration waves, and the two horizons.
///
/// Owned by a single `construct_conflict` invocation and reset at its
/// start; exposed as a value object so the wave algorithm is testable in
/// isolation.
#[derive(Debug, Clone)]
pub struct WaveState {
    current_wave: usize,
    /// Wave at which each hole was registered; 0 = unregistered.
    hole_wave: Vec<usize>,
    /// Unregistered relevant holes per state.
    unregistered: Vec<usize>,
    reachable: Vec<bool>,
    expanded: Vec<bool>,
    /// States ready to expand (all relevant holes registered).
    horizon: Vec<StateId>,
    /// Discovered states still blocked by unregistered holes.
    blocking: Vec<StateId>,
    blocking_candidate: Option<StateId>,
    /// States expanded by the most recent `explore_wave` call.
    wave_expanded: Vec<StateId>,
    fully_explored: bool,
}

impl WaveState {
    pub fn new(state_to_holes: &[BitSet], num_holes: usize, initial: StateId) -> Self {
        let num_states = state_to_holes.len();
        let mut wave = Self {
            current_wave: 0,
            hole_wave: vec![0; num_holes],
            unregistered: state_to_holes.iter().map(BitSet::count).collect(),
            reachable: vec![false; num_states],
            expanded: vec![false; num_states],
            horizon: Vec::new(),
            blocking: Vec::new(),
            blocking_candidate: None,
            wave_expanded: Vec::new(),
            fully_explored: false,
        };
        wave.reachable[initial] = true;
        if wave.unregistered[initial] == 0 {
            wave.horizon.push(initial);
        } else {
            wave.blocking.push(initial);
            wave.blocking_candidate = Some(initial);
        }
        wave
    }

    pub fn current_wave(&self) -> usize {
        self.current_wave
    }

    pub fn hole_wave(&self) -> &[usize] {
        &self.hole_wave
    }

    pub fn is_fully_explored(&self) -> bool {
        self.fully_explored
    }

    /// States expanded by the most recent wave.
    pub fn wave_expanded(&self) -> &[StateId] {
        &self.wave_expanded
    }

    /// True once `state` has been expanded by any wave.
    pub fn is_expanded(&self, state: StateId) -> bool {
        self.expanded[state]
    }

    /// Holes registered so far: `{h : 0 < hole_wave[h] <= current_wave}`.
    pub fn critical_holes(&self) -> Vec<HoleId> {
        (0..self.hole_wave.len())
            .filter(|&hole| self.hole_wave[hole] > 0 && self.hole_wave[hole] <= self.current_wave)
            .collect()
    }

    /// Candidate order: fewest unregistered holes, then lowest state id.
    fn consider_candidate(&mut self, state: StateId) {
        let better = match self.blocking_candidate {
            None => true,
            Some(current) => {
                let current_key = (self.unregistered[current], current);
                (self.unregistered[state], state) < current_key
            }
        };
        if better {
            self.blocking_candidate = Some(state);
        }
    }

    /// Drains the non-blocking horizon by stack expansion; on exhaustion
    /// either reports full exploration or opens the next wave by
    /// registering the blocking candidate's holes and re-partitioning the
    /// blocking horizon. Returns true when exploration is complete.
    pub fn explore_wave(&mut self, sub: &SubModel, state_to_holes: &[BitSet]) -> bool {
        self.wave_expanded.clear();
        while let Some(state) = self.horizon.pop() {
            self.expanded[state] = true;
            self.wave_expanded.push(state);
            for &(successor, _) in sub.row(state) {
                if self.reachable[successor] {
                    continue;
                }
                self.reachable[successor] = true;
                if self.unregistered[successor] == 0 {
                    self.horizon.push(successor);
                } else {
                    self.blocking.push(successor);
                    self.consider_candidate(successor);
                }
            }
        }

        let Some(candidate) = self.blocking_candidate.take() else {
            self.fully_explored = true;
            return true;
        };

        self.current_wave += 1;
        for hole in &state_to_holes[candidate] {
            if self.hole_wave[hole] == 0 {
                self.hole_wave[hole] = self.current_wave;
            }
        }
        for (state, holes) in state_to_holes.iter().enumerate() {
            self.unregistered[state] =
                holes.iter().filter(|&hole| self.hole_wave[hole] == 0).count();
        }
        let discovered = std::mem::take(&mut self.blocking);
        for state in discovered {
            if self.unregistered[state] == 0 {
                self.horizon.push(state);
            } else {
                self.blocking.push(state);
                self.consider_candidate(state);
            }
        }
        debug!(
            wave = self.current_wave,
            unblocked = self.horizon.len(),
            still_blocked = self.blocking.len(),
            "opened next wave"
        );
        false
    }
}

struct Prepared {
    sub: SubModel,
    state_map: Vec<StateId>,
    state_to_holes: Vec<BitSet>,
    wave: WaveState,
}

/// Wave-based counterexample construction over deterministic members of
/// the family.
///
/// Given a sub-model violating a property, incrementally re-expands the
/// model wave by wave, registering the holes that must be unblocked to
/// explain the violation; the registered holes form the critical set the
/// refinement loop splits on.
pub struct CounterexampleGenerator {
    quotient: QuotientModel,
    num_holes: usize,
    quotient_state_to_holes: Vec<BitSet>,
    properties: Vec<ClassifiedProperty>,
    prepared: Option<Prepared>,
    profile: CexProfile,
}

impl CounterexampleGenerator {
    /// Classifies every property once; an unsupported formula shape is a
    /// fatal input error surfaced here, not during conflict construction.
    pub fn new(
        quotient: QuotientModel,
        num_holes: usize,
        quotient_state_to_holes: Vec<BitSet>,
        properties: &[Property],
    ) -> Result<Self, FormulaError> {
        debug_assert_eq!(quotient_state_to_holes.len(), quotient.num_states());
        let properties = properties
            .iter()
            .map(Property::classify)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            quotient,
            num_holes,
            quotient_state_to_holes,
            properties,
            prepared: None,
            profile: CexProfile::default(),
        })
    }

    pub fn quotient(&self) -> &QuotientModel {
        &self.quotient
    }

    /// Installs a deterministic sub-model and resets all wave state.
    ///
    /// `state_map` maps sub-model states to their quotient states; hole
    /// relevance is inherited through it. Every reward model referenced by
    /// a property must exist on the sub-model.
    pub fn prepare(&mut self, sub: SubModel, state_map: Vec<StateId>) {
        let started = Instant::now();
        assert_eq!(state_map.len(), sub.num_states());
        debug_assert!(state_map.iter().all(|&q| q < self.quotient.num_states()));
        for property in &self.properties {
            assert!(
                sub.label(&property.target).is_some(),
                "target label `{}` missing on sub-model",
                property.target
            );
            if let Some(safe) = &property.safe {
                assert!(
                    sub.label(safe).is_some(),
                    "until label `{safe}` missing on sub-model"
                );
            }
            if let Some(reward_model) = &property.reward_model {
                assert!(
                    sub.reward_model(reward_model).is_some(),
                    "reward model `{reward_model}` missing on sub-model"
                );
            }
        }

        let state_to_holes: Vec<BitSet> = state_map
            .iter()
            .map(|&q| self.quotient_state_to_holes[q].clone())
            .collect();
        let wave = WaveState::new(&state_to_holes, self.num_holes, sub.initial_state());
        self.prepared = Some(Prepared {
            sub,
            state_map,
            state_to_holes,
            wave,
        });
        self.profile.prepare_elapsed_ms += started.elapsed().as_millis();
    }

    /// Runs one wave; returns true when exploration is complete.
    pub fn explore_wave(&mut self) -> bool {
        let prepared = self
            .prepared
            .as_mut()
            .expect("prepare must be called before explore_wave");
        let started = Instant::now();
        let done = prepared
            .wave
            .explore_wave(&prepared.sub, &prepared.state_to_holes);
        self.profile.explore_elapsed_ms += started.elapsed().as_millis();
        self.profile.waves += 1;
        done
    }

    pub fn wave_state(&self) -> Option<&WaveState> {
        self.prepared.as_ref().map(|p| &p.wave)
    }

    /// Explores wave by wave until the partial model alone violates the
    /// property (explanation found) or exploration completes; returns the
    /// critical hole set.
    ///
    /// `prior_bounds` carries per-quotient-state values from earlier
    /// family-level analysis used to weight shortcut transitions; absent
    /// priors default to the value most favorable to satisfaction.
    pub fn construct_conflict<C: ModelChecker>(
        &mut self,
        checker: &mut C,
        formula_index: usize,
        bound: f64,
        prior_bounds: Option<&[f64]>,
    ) -> Result<Vec<HoleId>, CexError<C::Error>> {
        let property = self.properties[formula_index].clone();
        let num_holes = self.num_holes;
        let prepared = self
            .prepared
            .as_mut()
            .expect("prepare must be called before construct_conflict");
        // Wave state is transient per conflict.
        prepared.wave = WaveState::new(
            &prepared.state_to_holes,
            num_holes,
            prepared.sub.initial_state(),
        );
        let Prepared {
            sub,
            state_map,
            state_to_holes,
            wave,
        } = prepared;

        let num_states = sub.num_states();
        let bot = num_states;
        let top = num_states + 1;
        let query = if property.reward_model.is_some() {
            QueryKind::ExpectedReward
        } else {
            QueryKind::Probability
        };

        let mut target = BitSet::new(num_states + 2);
        for state in sub.label(&property.target).expect("target label checked in prepare") {
            target.insert(state);
        }
        target.insert(top);
        let until = property.safe.as_ref().map(|label| {
            let mut until = BitSet::new(num_states + 2);
            for state in sub.label(label).expect("until label checked in prepare") {
                until.insert(state);
            }
            until
        });
        let real_rewards = property
            .reward_model
            .as_ref()
            .map(|name| sub.reward_model(name).expect("reward model checked in prepare").to_vec());

        let optimistic_default = match (query, property.direction) {
            (QueryKind::Probability, PropertyDirection::Safety) => 0.0,
            (QueryKind::Probability, PropertyDirection::Liveness) => 1.0,
            (QueryKind::ExpectedReward, _) => 0.0,
        };
        let shortcut = |state: StateId| -> f64 {
            prior_bounds
                .map(|bounds| bounds[state_map[state]])
                .unwrap_or(optimistic_default)
        };

        // Every state starts shortcut: probability mass split between the
        // sinks by the known bound, or the bound as a one-step reward for
        // reward queries. Real rows replace shortcuts as waves expand.
        let mut rows: Vec<Vec<(StateId, f64)>> = (0..num_states)
            .map(|state| match query {
                QueryKind::Probability => {
                    let p = shortcut(state).clamp(0.0, 1.0);
                    vec![(top, p), (bot, 1.0 - p)]
                }
                QueryKind::ExpectedReward => vec![(top, 1.0)],
            })
            .collect();
        rows.push(vec![(bot, 1.0)]);
        rows.push(vec![(top, 1.0)]);
        let mut rewards = match query {
            QueryKind::ExpectedReward => {
                let mut rewards: Vec<f64> = (0..num_states).map(shortcut).collect();
                rewards.push(0.0);
                rewards.push(0.0);
                Some(rewards)
            }
            QueryKind::Probability => None,
        };

        let mut satisfied = true;
        let mut hint: Option<QuantitativeResult> = None;
        loop {
            let started = Instant::now();
            let done = wave.explore_wave(sub, state_to_holes);
            self.profile.explore_elapsed_ms += started.elapsed().as_millis();
            self.profile.waves += 1;
            if done {
                break;
            }

            for &state in wave.wave_expanded() {
                rows[state] = sub.row(state).to_vec();
                if let (Some(rewards), Some(real)) = (&mut rewards, &real_rewards) {
                    rewards[state] = real[state];
                }
            }
            let model = CeModel {
                initial: sub.initial_state(),
                rows: rows.clone(),
                until: until.clone(),
                target: target.clone(),
                rewards: rewards.clone(),
            };

            let started = Instant::now();
            let result = checker
                .check(&model, query, hint.as_ref())
                .map_err(CexError::Checker)?;
            self.profile.check_elapsed_ms += started.elapsed().as_millis();
            self.profile.checker_calls += 1;

            let value = result.values[sub.initial_state()];
            satisfied = property.satisfied(value, bound);
            debug!(
                wave = wave.current_wave(),
                value,
                bound,
                satisfied,
                "checked partial model"
            );
            hint = Some(result);
            if !satisfied {
                break;
            }
        }

        self.profile.conflicts += 1;
        let critical = wave.critical_holes();
        info!(
            waves = wave.current_wave(),
            critical = critical.len(),
            explained = !satisfied,
            "conflict constructed"
        );
        Ok(critical)
    }

    pub fn profile(&self) -> &CexProfile {
        &self.profile
    }

    pub fn print_profiling(&self) {
        info!(profile = %self.profile, "counterexample generator profile");
    }
}
