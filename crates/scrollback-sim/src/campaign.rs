//! Campaign runner for deterministic simulation campaigns.
//!
//! Executes many seeds with the same parameters, collecting pass/fail
//! results and identifying the first failing seed for replay.

use std::ops::Range;

use anyhow::{Result, bail};
use scrollback_core::config::SimConfig;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::history::MutationMix;
use crate::oracle::InvariantViolation;
use crate::{SimulationConfig, SimulationResult, Simulator};

/// Campaign-level configuration controlling how many seeds to run and
/// what simulation parameters to use for each seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignConfig {
    /// Range of seeds to execute, e.g., `0..100`.
    pub seed_range: Range<u64>,
    pub steps: usize,
    pub initial_messages: usize,
    /// Chance per step of switching the narrow (percent, 0–100).
    pub narrow_switch_percent: u8,
    /// Chance per step of changing background data (percent, 0–100).
    pub background_change_percent: u8,
    pub utc_offset_minutes: i32,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self::from_settings(&SimConfig::default())
    }
}

impl CampaignConfig {
    /// Campaign parameters from the `[sim]` config section.
    #[must_use]
    pub fn from_settings(settings: &SimConfig) -> Self {
        let mix = MutationMix::default();
        Self {
            seed_range: 0..settings.seeds,
            steps: settings.steps,
            initial_messages: settings.initial_messages,
            narrow_switch_percent: mix.narrow_switch_percent,
            background_change_percent: mix.background_change_percent,
            utc_offset_minutes: 0,
        }
    }

    /// Build a [`SimulationConfig`] for a specific seed.
    #[must_use]
    pub const fn sim_config_for_seed(&self, seed: u64) -> SimulationConfig {
        SimulationConfig {
            seed,
            steps: self.steps,
            initial_messages: self.initial_messages,
            mix: MutationMix {
                narrow_switch_percent: self.narrow_switch_percent,
                background_change_percent: self.background_change_percent,
            },
            utc_offset_minutes: self.utc_offset_minutes,
        }
    }

    /// Validate configuration before running.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        if self.seed_range.is_empty() {
            bail!("seed_range must not be empty");
        }
        if self.steps == 0 {
            bail!("steps must be > 0");
        }
        if self.narrow_switch_percent > 100 || self.background_change_percent > 100 {
            bail!("percentages must be within 0..=100");
        }
        Ok(())
    }
}

/// Failure details for a single seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedFailure {
    pub seed: u64,
    /// Invariant violations found, formatted for humans.
    pub violations: Vec<String>,
}

/// Aggregate report produced by a campaign run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignReport {
    pub seeds_run: usize,
    pub seeds_passed: usize,
    /// First seed that failed (for prioritized replay).
    pub first_failure: Option<u64>,
    pub failures: Vec<SeedFailure>,
    /// Ops generated across every step of every seed.
    pub total_ops: usize,
}

impl CampaignReport {
    /// True if every seed passed.
    #[must_use]
    pub const fn all_passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Run a full campaign across all seeds in the config.
///
/// # Errors
///
/// Returns an error if config validation fails or a simulation encounters
/// an internal error.
pub fn run_campaign(config: &CampaignConfig) -> Result<CampaignReport> {
    config.validate()?;

    let mut report = CampaignReport {
        seeds_run: 0,
        seeds_passed: 0,
        first_failure: None,
        failures: Vec::new(),
        total_ops: 0,
    };

    for seed in config.seed_range.clone() {
        report.seeds_run += 1;
        let result = replay_seed(seed, config)?;
        report.total_ops += result.total_ops();

        if result.oracle.passed {
            report.seeds_passed += 1;
        } else {
            warn!(seed, violations = result.oracle.violations.len(), "seed failed");
            report.first_failure.get_or_insert(seed);
            report.failures.push(SeedFailure {
                seed,
                violations: result.oracle.violations.iter().map(format_violation).collect(),
            });
        }
    }

    info!(
        seeds = report.seeds_run,
        passed = report.seeds_passed,
        ops = report.total_ops,
        "campaign finished"
    );
    Ok(report)
}

/// Replay a single seed with full trace details for debugging.
///
/// # Errors
///
/// Returns an error when config validation or simulation fails.
pub fn replay_seed(seed: u64, config: &CampaignConfig) -> Result<SimulationResult> {
    config.validate()?;
    Simulator::new(config.sim_config_for_seed(seed))?.run()
}

/// Format an invariant violation into a human-readable string.
#[must_use]
pub fn format_violation(v: &InvariantViolation) -> String {
    match v {
        InvariantViolation::ApplyFailed { step, error } => {
            format!("ApplyFailed: step {step} ops rejected by the live tree ({error})")
        }
        InvariantViolation::Divergence {
            step,
            expected,
            actual,
        } => {
            format!(
                "Divergence: step {step} patched tree {} != full render {}",
                short(actual),
                short(expected)
            )
        }
        InvariantViolation::NonEmptyIdentity { step, ops } => {
            format!("NonEmptyIdentity: step {step} state diffed against itself gave {ops} ops")
        }
        InvariantViolation::FromEmptyMismatch { step } => {
            format!("FromEmptyMismatch: step {step} render from empty differs from full render")
        }
        InvariantViolation::UnexpectedRebuild { step, error } => {
            format!("UnexpectedRebuild: step {step} reconciler fell back to a rebuild ({error})")
        }
    }
}

fn short(fingerprint: &str) -> &str {
    fingerprint.get(..12).unwrap_or(fingerprint)
}
