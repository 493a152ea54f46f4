use galago_family::bitset::BitSet;
use galago_family::quotient::StateId;

/// Per-state value vector produced by a quantitative model check.
///
/// A result can serve as the warm-start hint to the next check over a
/// structurally related (incrementally modified) model.
#[derive(Debug, Clone)]
pub struct QuantitativeResult {
    pub values: Vec<f64>,
}

/// Per-state truth vector produced by a qualitative model check.
#[derive(Debug, Clone)]
pub struct QualitativeResult {
    pub truth: Vec<bool>,
}

/// What the checker is asked to compute for a counterexample model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// Probability of reaching `target` through `until` states.
    Probability,
    /// Expected accumulated reward until `target` is reached.
    ExpectedReward,
}

/// A counterexample model handed to the external checker: the formula is
/// already compiled into explicit target/until state sets and an optional
/// reward vector.
#[derive(Debug, Clone)]
pub struct CeModel {
    pub initial: StateId,
    /// Sparse successor distribution per state; deterministic per state.
    pub rows: Vec<Vec<(StateId, f64)>>,
    /// States allowed before the target; `None` means all states.
    pub until: Option<BitSet>,
    pub target: BitSet,
    /// Per-state rewards, present exactly for reward queries.
    pub rewards: Option<Vec<f64>>,
}

impl CeModel {
    pub fn num_states(&self) -> usize {
        self.rows.len()
    }
}

/// The external numeric model checker the core drives.
///
/// Implementations are synchronous and own their convergence control;
/// the core only supplies and consumes the hint object.
pub trait ModelChecker {
    type Error: std::error::Error;

    fn check(
        &mut self,
        model: &CeModel,
        query: QueryKind,
        hint: Option<&QuantitativeResult>,
    ) -> Result<QuantitativeResult, Self::Error>;

    /// Qualitative variant; the default derives per-state truth from a
    /// positive quantitative value.
    fn check_qualitative(
        &mut self,
        model: &CeModel,
        query: QueryKind,
        hint: Option<&QuantitativeResult>,
    ) -> Result<QualitativeResult, Self::Error> {
        let result = self.check(model, query, hint)?;
        Ok(QualitativeResult {
            truth: result.values.iter().map(|&value| value > 0.0).collect(),
        })
    }
}
