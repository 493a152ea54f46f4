use thiserror::Error;

/// Path formula shape as supplied by the preprocessing front end.
///
/// Labels name state sets attached to the model under analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathFormula {
    /// `safe U target`.
    Until { safe: String, target: String },
    /// `F target`.
    Eventually { target: String },
    /// `G target`; not supported by conflict analysis.
    Globally { target: String },
}

/// Direction of a quantitative bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyDirection {
    /// Satisfied while the checked value stays below the bound.
    Safety,
    /// Satisfied while the checked value stays above the bound.
    Liveness,
}

/// A quantitative property over a transition structure.
///
/// The threshold bound is not part of the property: the refinement loop
/// supplies per-query bounds refined from family-level analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub formula: PathFormula,
    pub direction: PropertyDirection,
    /// Name of the reward model this property accumulates, if any.
    pub reward_model: Option<String>,
}

/// Internal until/target form every supported property classifies into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedProperty {
    /// States allowed before reaching the target; `None` means all.
    pub safe: Option<String>,
    pub target: String,
    pub direction: PropertyDirection,
    pub reward_model: Option<String>,
}

impl ClassifiedProperty {
    /// Applies the direction to compare a checked value against a bound.
    pub fn satisfied(&self, value: f64, bound: f64) -> bool {
        match self.direction {
            PropertyDirection::Safety => value < bound,
            PropertyDirection::Liveness => value > bound,
        }
    }
}

/// Rejection of a property at preprocessing time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormulaError {
    #[error("unsupported path formula shape: {0}")]
    Unsupported(String),
    #[error("reward property must use an eventually-formula, found an until-formula")]
    RewardWithUntil,
}

impl Property {
    /// Classifies the property into the internal until/target form.
    ///
    /// Unsupported shapes surface here, once, as a typed error; downstream
    /// construction never re-inspects the formula shape.
    pub fn classify(&self) -> Result<ClassifiedProperty, FormulaError> {
        let (safe, target) = match &self.formula {
            PathFormula::Until { safe, target } => (Some(safe.clone()), target.clone()),
            PathFormula::Eventually { target } => (None, target.clone()),
            PathFormula::Globally { target } => {
                return Err(FormulaError::Unsupported(format!("G {target}")));
            }
        };
        if self.reward_model.is_some() && safe.is_some() {
            return Err(FormulaError::RewardWithUntil);
        }
        Ok(ClassifiedProperty {
            safe,
            target,
            direction: self.direction,
            reward_model: self.reward_model.clone(),
        })
    }
}
