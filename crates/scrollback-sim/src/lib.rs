//! scrollback-sim library.
//!
//! Drives the reconciler through seeded random histories and checks every
//! step with [`oracle::ReconciliationOracle`]. A seed fully determines a run,
//! so any failure replays exactly.
//!
//! # Conventions
//!
//! - **Errors**: Use `anyhow::Result` for return types.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod campaign;
pub mod history;
pub mod oracle;
pub mod rng;

use anyhow::{Result, bail};
use scrollback_core::{Grouper, OpCounts, Reconciler, RenderState, UpdateOutcome, generate};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::history::{Mutation, MutationMix, World};
use crate::oracle::{InvariantViolation, OracleResult, ReconciliationOracle};
use crate::rng::SimRng;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub seed: u64,
    /// Mutations applied after the initial render.
    pub steps: usize,
    /// Messages present before the first render.
    pub initial_messages: usize,
    pub mix: MutationMix,
    /// Day boundaries for grouping, in minutes east of UTC.
    pub utc_offset_minutes: i32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            steps: 40,
            initial_messages: 30,
            mix: MutationMix::default(),
            utc_offset_minutes: 0,
        }
    }
}

/// What happened at one step of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub step: usize,
    /// `None` for the initial render.
    pub mutation: Option<Mutation>,
    pub ops: OpCounts,
    pub live_nodes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationResult {
    pub trace: Vec<TraceEvent>,
    pub oracle: OracleResult,
    /// Fingerprint of the reconciler's live tree after the last step.
    pub final_fingerprint: String,
    /// Times the reconciler fell back to a full rebuild.
    pub rebuilds: usize,
}

impl SimulationResult {
    #[must_use]
    pub fn total_ops(&self) -> usize {
        self.trace.iter().map(|t| t.ops.total()).sum()
    }
}

pub struct Simulator {
    config: SimulationConfig,
    rng: SimRng,
    grouper: Grouper,
}

impl Simulator {
    /// # Errors
    ///
    /// Returns an error if the configuration has nothing to simulate.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        if config.steps == 0 && config.initial_messages == 0 {
            bail!("simulation needs at least one step or one initial message");
        }
        Ok(Self {
            rng: SimRng::new(config.seed),
            grouper: Grouper::with_utc_offset(config.utc_offset_minutes),
            config,
        })
    }

    /// Run the configured number of steps, checking each one.
    ///
    /// # Errors
    ///
    /// Currently infallible once constructed; the `Result` keeps room for
    /// harness-level failures that are not invariant violations.
    #[instrument(level = "debug", skip(self), fields(seed = self.config.seed))]
    pub fn run(&mut self) -> Result<SimulationResult> {
        let mut world = World::seeded(&mut self.rng, self.config.initial_messages);
        let mut reconciler = Reconciler::new(self.grouper);
        let mut trace = Vec::with_capacity(self.config.steps + 1);
        let mut oracle = OracleResult::pass();
        let mut rebuilds = 0;

        for step in 0..=self.config.steps {
            let mutation = (step > 0).then(|| {
                let m = world.random_mutation(&mut self.rng, self.config.mix);
                world.apply(&m);
                m
            });

            let old = reconciler.state().clone();
            let new = RenderState::new(
                world.background.clone(),
                world.narrow.clone(),
                self.grouper.group(&world.messages, &world.narrow),
            );
            let ops = generate(&old, &new);
            oracle = oracle.merge(ReconciliationOracle::check_all(step, &old, &new, &ops));

            let outcome = reconciler.update_state(new);
            if let UpdateOutcome::Rebuilt { error } = &outcome {
                rebuilds += 1;
                oracle = oracle.merge(OracleResult::fail(vec![
                    InvariantViolation::UnexpectedRebuild {
                        step,
                        error: error.to_string(),
                    },
                ]));
            }

            let event = TraceEvent {
                step,
                mutation,
                ops: OpCounts::of(&ops),
                live_nodes: reconciler.live().len(),
            };
            debug!(
                step,
                ops = event.ops.total(),
                nodes = event.live_nodes,
                "step reconciled"
            );
            trace.push(event);
        }

        Ok(SimulationResult {
            trace,
            oracle,
            final_fingerprint: reconciler.live().fingerprint(),
            rebuilds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_is_rejected() {
        let config = SimulationConfig {
            steps: 0,
            initial_messages: 0,
            ..SimulationConfig::default()
        };
        assert!(Simulator::new(config).is_err());
    }

    #[test]
    fn default_run_passes() {
        let mut sim = Simulator::new(SimulationConfig::default()).expect("valid config");
        let result = sim.run().expect("run completes");
        assert!(result.oracle.passed, "{:?}", result.oracle.violations);
        assert_eq!(result.trace.len(), 41);
        assert_eq!(result.rebuilds, 0);
        assert!(result.trace[0].mutation.is_none());
    }

    #[test]
    fn runs_are_deterministic() {
        let config = SimulationConfig {
            seed: 99,
            ..SimulationConfig::default()
        };
        let a = Simulator::new(config.clone()).expect("valid").run().expect("run");
        let b = Simulator::new(config).expect("valid").run().expect("run");
        assert_eq!(a, b);
    }
}
