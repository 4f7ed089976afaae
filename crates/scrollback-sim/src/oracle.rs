use scrollback_core::{EditOp, LiveTree, RenderState, apply, generate};

// ── Core result types ─────────────────────────────────────────────────────────

/// Oracle result for the checks run on one step, or on a whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleResult {
    /// `true` iff no violations were found.
    pub passed: bool,
    pub violations: Vec<InvariantViolation>,
}

impl OracleResult {
    #[must_use]
    pub const fn pass() -> Self {
        Self {
            passed: true,
            violations: Vec::new(),
        }
    }

    #[must_use]
    pub const fn fail(violations: Vec<InvariantViolation>) -> Self {
        Self {
            passed: false,
            violations,
        }
    }

    /// Merge another result into this one (failures accumulate).
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        if !other.passed {
            self.passed = false;
            self.violations.extend(other.violations);
        }
        self
    }
}

// ── Invariant violation diagnostics ──────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// The generated ops did not apply to a tree rendered from the old state.
    ApplyFailed { step: usize, error: String },

    /// The patched tree differs from a full render of the new state.
    Divergence {
        step: usize,
        expected: String,
        actual: String,
    },

    /// Diffing a state against itself produced ops.
    NonEmptyIdentity { step: usize, ops: usize },

    /// Ops generated from the empty state did not reproduce a full render.
    FromEmptyMismatch { step: usize },

    /// The reconciler had to fall back to a full rebuild.
    UnexpectedRebuild { step: usize, error: String },
}

impl InvariantViolation {
    #[must_use]
    pub const fn step(&self) -> usize {
        match self {
            Self::ApplyFailed { step, .. }
            | Self::Divergence { step, .. }
            | Self::NonEmptyIdentity { step, .. }
            | Self::FromEmptyMismatch { step }
            | Self::UnexpectedRebuild { step, .. } => *step,
        }
    }
}

// ── Oracle ────────────────────────────────────────────────────────────────────

/// Checks the edit-sequence invariants for one transition between states.
pub struct ReconciliationOracle;

impl ReconciliationOracle {
    /// Run every check on the transition `old` → `new`.
    ///
    /// `ops` are the ops the simulator generated for this step; passing them
    /// in keeps the oracle honest about what was actually applied.
    #[must_use]
    pub fn check_all(step: usize, old: &RenderState, new: &RenderState, ops: &[EditOp]) -> OracleResult {
        Self::check_equivalence(step, old, new, ops)
            .merge(Self::check_identity(step, new))
            .merge(Self::check_from_empty(step, new))
    }

    /// Ops applied to a fresh render of `old` must yield a render of `new`.
    #[must_use]
    pub fn check_equivalence(
        step: usize,
        old: &RenderState,
        new: &RenderState,
        ops: &[EditOp],
    ) -> OracleResult {
        let mut live = LiveTree::from_rendered(&old.render());
        if let Err(error) = apply(ops, &mut live) {
            return OracleResult::fail(vec![InvariantViolation::ApplyFailed {
                step,
                error: error.to_string(),
            }]);
        }

        let expected = LiveTree::from_rendered(&new.render()).fingerprint();
        let actual = live.fingerprint();
        if expected == actual {
            OracleResult::pass()
        } else {
            OracleResult::fail(vec![InvariantViolation::Divergence {
                step,
                expected,
                actual,
            }])
        }
    }

    #[must_use]
    pub fn check_identity(step: usize, state: &RenderState) -> OracleResult {
        let ops = generate(state, &state.clone());
        if ops.is_empty() {
            OracleResult::pass()
        } else {
            OracleResult::fail(vec![InvariantViolation::NonEmptyIdentity {
                step,
                ops: ops.len(),
            }])
        }
    }

    #[must_use]
    pub fn check_from_empty(step: usize, state: &RenderState) -> OracleResult {
        let empty = RenderState::empty(state.background.clone(), state.narrow.clone());
        let mut live = LiveTree::new();
        let reproduced = apply(&generate(&empty, state), &mut live).is_ok()
            && live.snapshot() == state.render();
        if reproduced {
            OracleResult::pass()
        } else {
            OracleResult::fail(vec![InvariantViolation::FromEmptyMismatch { step }])
        }
    }
}
