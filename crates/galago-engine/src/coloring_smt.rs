use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;

use galago_family::bitset::BitSet;
use galago_family::family::{Family, HoleId};
use galago_family::quotient::{ChoiceId, RowGroups};
use galago_family::tree::{DecisionTree, NodeId, TreeError};
use galago_smt::backends::smtlib_printer::to_smtlib;
use galago_smt::solver::{with_scope, Model, SatResult, SmtSolver};
use galago_smt::sorts::SmtSort;
use galago_smt::terms::SmtTerm;

use crate::result::{ConsistencyOutcome, HoleInfo, HoleKind};

/// Errors arising while building or querying the symbolic coloring.
#[derive(Debug, Error)]
pub enum ColoringSmtError<E: std::error::Error> {
    #[error("malformed decision tree: {0}")]
    Tree(#[from] TreeError),
    #[error("solver error: {0}")]
    Solver(#[source] E),
    #[error("solver returned unknown: {0}")]
    Unknown(String),
}

/// One conjunct of a grounded path: the branch constraint of an inner
/// node, or the action equality of the terminal.
#[derive(Debug, Clone)]
enum PathLiteral {
    Step {
        node: NodeId,
        go_true: bool,
        term: SmtTerm,
    },
    Action {
        hole: HoleId,
        option: usize,
        term: SmtTerm,
    },
}

impl PathLiteral {
    fn term(&self) -> &SmtTerm {
        match self {
            PathLiteral::Step { term, .. } | PathLiteral::Action { term, .. } => term,
        }
    }
}

/// A root-to-terminal path grounded in one choice's state valuation.
#[derive(Debug, Clone)]
struct GroundedPath {
    literals: Vec<PathLiteral>,
}

enum Select {
    Choices(BitSet),
    NoScheduler,
    Unknown(String),
}

enum Consistency {
    Sat(Model),
    /// Coordinates `(choice, path, literal)` of literals infeasible in
    /// isolation under the family restriction.
    Unsat(Vec<(ChoiceId, usize, usize)>),
    Unknown(String),
}

/// Symbolic coloring of a quotient whose scheduler is a decision tree
/// over program-state variables.
///
/// Every hole of the tree (decision, threshold, action) owns one solver
/// integer variable; each choice's color is a disjunction over the tree
/// paths that would produce it, grounded in the owning state's variable
/// valuation. The solver context lives as long as the coloring and every
/// query wraps its assertions in a push/pop scope.
pub struct ColoringSmt<S: SmtSolver> {
    solver: S,
    family: Family,
    row_groups: RowGroups,
    state_valuations: Vec<Vec<i64>>,
    variable_names: Vec<String>,
    hole_info: Vec<HoleInfo>,
    hole_var: Vec<String>,
    /// Value domain for interval (threshold) holes; `None` for discrete.
    hole_domain: Vec<Option<Vec<i64>>>,
    decision_hole: Vec<Option<HoleId>>,
    threshold_holes: Vec<Option<Vec<HoleId>>>,
    choice_paths: Vec<Vec<GroundedPath>>,
    choice_term: Vec<SmtTerm>,
    assumption_nonce: usize,
    select_elapsed: Duration,
}

impl<S: SmtSolver> ColoringSmt<S> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mut solver: S,
        row_groups: RowGroups,
        choice_to_action: Vec<usize>,
        state_valuations: Vec<Vec<i64>>,
        variable_names: Vec<String>,
        variable_domains: Vec<Vec<i64>>,
        tree_description: &[(Option<NodeId>, Option<NodeId>, Option<NodeId>)],
    ) -> Result<Self, ColoringSmtError<S::Error>> {
        assert_eq!(state_valuations.len(), row_groups.num_states());
        assert_eq!(choice_to_action.len(), row_groups.num_choices());
        assert_eq!(variable_names.len(), variable_domains.len());
        for valuation in &state_valuations {
            assert_eq!(valuation.len(), variable_names.len());
        }
        for domain in &variable_domains {
            assert!(!domain.is_empty(), "variable domains must be non-empty");
            debug_assert!(domain.windows(2).all(|w| w[0] < w[1]));
        }

        let tree = DecisionTree::from_description(tree_description)?;
        let num_vars = variable_names.len();
        let num_actions = choice_to_action.iter().copied().max().map_or(0, |m| m + 1);

        let mut family = Family::new();
        let mut hole_info = Vec::new();
        let mut hole_var = Vec::new();
        let mut hole_domain = Vec::new();
        let mut decision_hole = vec![None; tree.num_nodes()];
        let mut threshold_holes = vec![None; tree.num_nodes()];
        let mut action_hole = vec![None; tree.num_nodes()];

        for node in 0..tree.num_nodes() {
            if tree.is_terminal(node) {
                let hole = family.add_hole(num_actions);
                hole_info.push(HoleInfo {
                    name: format!("act_{node}"),
                    kind: HoleKind::Action,
                });
                hole_var.push(format!("act_{node}"));
                hole_domain.push(None);
                action_hole[node] = Some(hole);
            } else {
                let hole = family.add_hole(num_vars);
                hole_info.push(HoleInfo {
                    name: format!("sel_{node}"),
                    kind: HoleKind::Decision,
                });
                hole_var.push(format!("sel_{node}"));
                hole_domain.push(None);
                decision_hole[node] = Some(hole);

                let mut per_variable = Vec::with_capacity(num_vars);
                for (variable, domain) in variable_domains.iter().enumerate() {
                    let hole = family.add_hole(domain.len());
                    let name = format!("thr_{node}_{}", variable_names[variable]);
                    hole_info.push(HoleInfo {
                        name: name.clone(),
                        kind: HoleKind::Threshold,
                    });
                    hole_var.push(name);
                    hole_domain.push(Some(domain.clone()));
                    per_variable.push(hole);
                }
                threshold_holes[node] = Some(per_variable);
            }
        }

        for name in &hole_var {
            solver
                .declare_var(name, &SmtSort::Int)
                .map_err(ColoringSmtError::Solver)?;
        }

        // Threshold ordering along root-to-node paths keeps instantiated
        // trees canonical: below a true branch a variable's threshold may
        // only tighten, below a false branch it may only grow. Asserted
        // once, outside any query scope.
        for node in 0..tree.num_nodes() {
            let Some(descendants) = threshold_holes[node].as_ref() else {
                continue;
            };
            let mut child = node;
            while let Some(parent) = tree.node(child).parent {
                let (true_child, _) = tree
                    .node(parent)
                    .children
                    .expect("parents are inner nodes");
                let via_true = true_child == child;
                let ancestors = threshold_holes[parent]
                    .as_ref()
                    .expect("inner node has threshold holes");
                for variable in 0..num_vars {
                    let descendant = SmtTerm::var(hole_var[descendants[variable]].clone());
                    let ancestor = SmtTerm::var(hole_var[ancestors[variable]].clone());
                    let ordering = if via_true {
                        descendant.le(ancestor)
                    } else {
                        descendant.ge(ancestor)
                    };
                    solver.assert(&ordering).map_err(ColoringSmtError::Solver)?;
                }
                child = parent;
            }
        }

        let paths = tree.paths();
        let num_choices = row_groups.num_choices();
        let mut choice_paths = Vec::with_capacity(num_choices);
        let mut choice_term = Vec::with_capacity(num_choices);
        for (choice, &action) in choice_to_action.iter().enumerate() {
            let state = row_groups.state_of_choice(choice);
            let valuation = &state_valuations[state];
            let mut grounded = Vec::with_capacity(paths.len());
            let mut disjuncts = Vec::with_capacity(paths.len());
            for path in &paths {
                let mut literals = Vec::with_capacity(path.steps.len() + 1);
                for &(node, go_true) in &path.steps {
                    let sel = decision_hole[node].expect("inner node has a decision hole");
                    let thresholds = threshold_holes[node]
                        .as_ref()
                        .expect("inner node has threshold holes");
                    let term =
                        step_term(&hole_var, sel, thresholds, valuation, go_true);
                    literals.push(PathLiteral::Step {
                        node,
                        go_true,
                        term,
                    });
                }
                let hole = action_hole[path.terminal].expect("terminal has an action hole");
                let term =
                    SmtTerm::var(hole_var[hole].clone()).eq(SmtTerm::int(action as i64));
                literals.push(PathLiteral::Action {
                    hole,
                    option: action,
                    term,
                });
                disjuncts.push(SmtTerm::and(
                    literals.iter().map(|l| l.term().clone()).collect(),
                ));
                grounded.push(GroundedPath { literals });
            }
            choice_term.push(SmtTerm::or(disjuncts));
            choice_paths.push(grounded);
        }

        Ok(Self {
            solver,
            family,
            row_groups,
            state_valuations,
            variable_names,
            hole_info,
            hole_var,
            hole_domain,
            decision_hole,
            threshold_holes,
            choice_paths,
            choice_term,
            assumption_nonce: 0,
            select_elapsed: Duration::ZERO,
        })
    }

    /// The unrefined family holding every registered hole.
    pub fn family(&self) -> &Family {
        &self.family
    }

    /// Name and kind of every registered hole, in hole-id order.
    pub fn family_info(&self) -> &[HoleInfo] {
        &self.hole_info
    }

    /// Accumulated wall time spent in `select_compatible_choices`.
    pub fn select_compatible_choices_time(&self) -> Duration {
        self.select_elapsed
    }

    /// Choices of the quotient compatible with `subfamily`, or the empty
    /// set if no tree instantiation within `subfamily` yields a scheduler.
    pub fn select_compatible_choices(
        &mut self,
        subfamily: &Family,
    ) -> Result<BitSet, ColoringSmtError<S::Error>> {
        self.select_compatible_choices_among(subfamily, None)
    }

    /// Like [`Self::select_compatible_choices`], restricted to `base`.
    pub fn select_compatible_choices_among(
        &mut self,
        subfamily: &Family,
        base: Option<&BitSet>,
    ) -> Result<BitSet, ColoringSmtError<S::Error>> {
        let started = Instant::now();
        let outcome = self.run_select(subfamily, base);
        self.select_elapsed += started.elapsed();
        outcome
    }

    fn run_select(
        &mut self,
        subfamily: &Family,
        base: Option<&BitSet>,
    ) -> Result<BitSet, ColoringSmtError<S::Error>> {
        let restriction = self.family_restriction(subfamily);
        let num_choices = self.row_groups.num_choices();
        let num_states = self.row_groups.num_states();
        let row_groups = &self.row_groups;
        let choice_term = &self.choice_term;

        let outcome = with_scope(&mut self.solver, |solver| {
            for term in &restriction {
                solver.assert(term)?;
            }
            match solver.check_sat()? {
                SatResult::Sat => {}
                SatResult::Unsat => return Ok(Select::NoScheduler),
                SatResult::Unknown(reason) => return Ok(Select::Unknown(reason)),
            }

            let mut selected = BitSet::new(num_choices);
            let mut state_disjunctions = Vec::with_capacity(num_states);
            for state in 0..num_states {
                let mut enabled = Vec::new();
                for choice in row_groups.range(state) {
                    if base.is_some_and(|b| !b.contains(choice)) {
                        continue;
                    }
                    let sat = with_scope(solver, |solver| {
                        solver.assert(&choice_term[choice])?;
                        solver.check_sat()
                    })?;
                    match sat {
                        SatResult::Sat => {
                            selected.insert(choice);
                            enabled.push(choice_term[choice].clone());
                        }
                        SatResult::Unsat => {}
                        SatResult::Unknown(reason) => return Ok(Select::Unknown(reason)),
                    }
                }
                if enabled.is_empty() {
                    debug!(state, "state retains no compatible choice");
                    return Ok(Select::NoScheduler);
                }
                state_disjunctions.push(SmtTerm::or(enabled));
            }

            // Every choice was individually satisfiable; a scheduler also
            // needs one simultaneous assignment enabling a choice in every
            // state.
            let sat = with_scope(solver, |solver| {
                for term in &state_disjunctions {
                    solver.assert(term)?;
                }
                solver.check_sat()
            })?;
            Ok(match sat {
                SatResult::Sat => Select::Choices(selected),
                SatResult::Unsat => Select::NoScheduler,
                SatResult::Unknown(reason) => Select::Unknown(reason),
            })
        })
        .map_err(ColoringSmtError::Solver)?;

        match outcome {
            Select::Choices(selected) => {
                debug!(
                    selected = selected.count(),
                    total = num_choices,
                    "compatible choices selected"
                );
                Ok(selected)
            }
            Select::NoScheduler => Ok(BitSet::new(num_choices)),
            Select::Unknown(reason) => Err(ColoringSmtError::Unknown(reason)),
        }
    }

    /// Checks whether one hole assignment within `subfamily` selects every
    /// choice in `choices` simultaneously.
    ///
    /// Returns the single assignment per hole when consistent; otherwise
    /// the per-hole sets of conflicting options discovered by unsat-core
    /// minimization.
    pub fn are_choices_consistent(
        &mut self,
        choices: &BitSet,
        subfamily: &Family,
    ) -> Result<ConsistencyOutcome, ColoringSmtError<S::Error>> {
        let restriction = self.family_restriction(subfamily);
        self.assumption_nonce += 1;
        let nonce = self.assumption_nonce;
        let labeled: Vec<(String, ChoiceId)> = choices
            .iter()
            .map(|choice| (format!("__color_{nonce}_c{choice}"), choice))
            .collect();

        let num_holes = self.family.num_holes();
        let hole_var = &self.hole_var;
        let choice_term = &self.choice_term;
        let choice_paths = &self.choice_paths;

        let outcome = with_scope(&mut self.solver, |solver| {
            for term in &restriction {
                solver.assert(term)?;
            }
            let mut names = Vec::with_capacity(labeled.len());
            for (label, choice) in &labeled {
                solver.declare_var(label, &SmtSort::Bool)?;
                solver.assert(&SmtTerm::var(label.clone()).implies(choice_term[*choice].clone()))?;
                names.push(label.clone());
            }

            match solver.check_sat_assuming(&names)? {
                SatResult::Sat => {
                    // Re-check with the labels asserted to read a model off
                    // the same assignment space.
                    let vars: Vec<(&str, &SmtSort)> = hole_var
                        .iter()
                        .map(|name| (name.as_str(), &SmtSort::Int))
                        .collect();
                    let (sat, model) = with_scope(solver, |solver| {
                        for (label, _) in &labeled {
                            solver.assert(&SmtTerm::var(label.clone()))?;
                        }
                        solver.check_sat_with_model(&vars)
                    })?;
                    match (sat, model) {
                        (SatResult::Sat, Some(model)) => Ok(Consistency::Sat(model)),
                        (SatResult::Unknown(reason), _) => Ok(Consistency::Unknown(reason)),
                        _ => Ok(Consistency::Unknown(
                            "model extraction failed after SAT".into(),
                        )),
                    }
                }
                SatResult::Unsat => {
                    let core = solver.get_unsat_core_assumptions()?;
                    let core_choices: Vec<ChoiceId> = labeled
                        .iter()
                        .filter(|(label, _)| core.contains(label))
                        .map(|(_, choice)| *choice)
                        .collect();
                    // Re-examine each implicated color literal by literal
                    // under the family restriction alone; the label
                    // implications above leave the hole variables free.
                    let mut infeasible = Vec::new();
                    for &choice in &core_choices {
                        for (path_idx, path) in choice_paths[choice].iter().enumerate() {
                            for (lit_idx, literal) in path.literals.iter().enumerate() {
                                let sat = with_scope(solver, |solver| {
                                    solver.assert(literal.term())?;
                                    solver.check_sat()
                                })?;
                                if sat == SatResult::Unsat {
                                    debug!(
                                        choice,
                                        literal = %to_smtlib(literal.term()),
                                        "literal infeasible in isolation"
                                    );
                                    infeasible.push((choice, path_idx, lit_idx));
                                }
                            }
                        }
                    }
                    Ok(Consistency::Unsat(infeasible))
                }
                SatResult::Unknown(reason) => Ok(Consistency::Unknown(reason)),
            }
        })
        .map_err(ColoringSmtError::Solver)?;

        match outcome {
            Consistency::Sat(model) => {
                let hole_options = (0..num_holes)
                    .map(|hole| vec![self.hole_option_from_model(&model, hole, subfamily)])
                    .collect();
                Ok(ConsistencyOutcome {
                    consistent: true,
                    hole_options,
                })
            }
            Consistency::Unsat(infeasible) => {
                let mut conflicts: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); num_holes];
                for (choice, path_idx, lit_idx) in infeasible {
                    let literal = &self.choice_paths[choice][path_idx].literals[lit_idx];
                    self.attribute_literal(literal, choice, subfamily, &mut conflicts);
                }
                debug!(
                    conflicting_holes = conflicts.iter().filter(|c| !c.is_empty()).count(),
                    "inconsistent choice set"
                );
                Ok(ConsistencyOutcome {
                    consistent: false,
                    hole_options: conflicts
                        .into_iter()
                        .map(|set| set.into_iter().collect())
                        .collect(),
                })
            }
            Consistency::Unknown(reason) => Err(ColoringSmtError::Unknown(reason)),
        }
    }

    /// One restriction term per hole: a contiguous value range for
    /// interval holes, an equality disjunction for discrete ones.
    fn family_restriction(&self, family: &Family) -> Vec<SmtTerm> {
        debug_assert_eq!(family.num_holes(), self.family.num_holes());
        (0..family.num_holes())
            .map(|hole| {
                let mask = family.hole_options_mask(hole);
                let var = || SmtTerm::var(self.hole_var[hole].clone());
                match &self.hole_domain[hole] {
                    _ if mask.is_empty() => SmtTerm::bool(false),
                    Some(domain) => {
                        let lo = domain[mask.first().expect("non-empty mask")];
                        let hi = domain[mask.last().expect("non-empty mask")];
                        SmtTerm::and(vec![
                            var().ge(SmtTerm::int(lo)),
                            var().le(SmtTerm::int(hi)),
                        ])
                    }
                    None => SmtTerm::or(
                        mask.iter()
                            .map(|option| var().eq(SmtTerm::int(option as i64)))
                            .collect(),
                    ),
                }
            })
            .collect()
    }

    /// Maps a solver model back to one option per hole; threshold values
    /// snap to the largest admissible option not exceeding the value.
    fn hole_option_from_model(&self, model: &Model, hole: HoleId, subfamily: &Family) -> usize {
        let value = model.get_int(&self.hole_var[hole]).unwrap_or(0);
        match &self.hole_domain[hole] {
            Some(domain) => {
                let mask = subfamily.hole_options_mask(hole);
                let mut snapped = None;
                for option in mask.iter() {
                    if domain[option] <= value {
                        snapped = Some(option);
                    } else {
                        break;
                    }
                }
                snapped.or_else(|| mask.first()).unwrap_or(0)
            }
            None => value.max(0) as usize,
        }
    }

    /// Attributes one infeasible literal to conflicting (hole, option)
    /// pairs; comparisons against threshold ranges are arithmetic, only
    /// the infeasibility itself came from the solver.
    fn attribute_literal(
        &self,
        literal: &PathLiteral,
        choice: ChoiceId,
        subfamily: &Family,
        conflicts: &mut [BTreeSet<usize>],
    ) {
        match literal {
            PathLiteral::Action { hole, option, .. } => {
                if !subfamily.hole_contains(*hole, *option) {
                    conflicts[*hole].insert(*option);
                }
            }
            PathLiteral::Step { node, go_true, .. } => {
                let state = self.row_groups.state_of_choice(choice);
                let valuation = &self.state_valuations[state];
                let sel = self.decision_hole[*node].expect("inner node has a decision hole");
                let thresholds = self.threshold_holes[*node]
                    .as_ref()
                    .expect("inner node has threshold holes");
                for variable in 0..self.variable_names.len() {
                    let thr = thresholds[variable];
                    let mask = subfamily.hole_options_mask(thr);
                    let domain = self.hole_domain[thr].as_ref().expect("threshold domain");
                    let feasible = if *go_true {
                        mask.last().is_some_and(|opt| valuation[variable] <= domain[opt])
                    } else {
                        mask.first().is_some_and(|opt| valuation[variable] > domain[opt])
                    };
                    let selectable = subfamily.hole_contains(sel, variable);
                    match (selectable, feasible) {
                        (true, false) => {
                            // The boundary option failed to admit the
                            // comparison; it is the value to split away.
                            let boundary = if *go_true { mask.last() } else { mask.first() };
                            if let Some(option) = boundary {
                                conflicts[thr].insert(option);
                            }
                        }
                        (false, true) => {
                            conflicts[sel].insert(variable);
                        }
                        _ => {}
                    }
                }
            }
        }
    }
}

/// Branch constraint of an inner node grounded in one state valuation:
/// the selected variable's value compares against that variable's
/// threshold in the branch direction.
fn step_term(
    hole_var: &[String],
    sel: HoleId,
    thresholds: &[HoleId],
    valuation: &[i64],
    go_true: bool,
) -> SmtTerm {
    let branches = thresholds
        .iter()
        .enumerate()
        .map(|(variable, &thr)| {
            let value = SmtTerm::int(valuation[variable]);
            let threshold = SmtTerm::var(hole_var[thr].clone());
            let comparison = if go_true {
                value.le(threshold)
            } else {
                value.gt(threshold)
            };
            SmtTerm::and(vec![
                SmtTerm::var(hole_var[sel].clone()).eq(SmtTerm::int(variable as i64)),
                comparison,
            ])
        })
        .collect();
    SmtTerm::or(branches)
}
