use anyhow::{Result, anyhow};
use clap::Args;
use scrollback_core::config::SimConfig;
use scrollback_core::error::ErrorCode;
use scrollback_sim::campaign::{CampaignConfig, format_violation, replay_seed, run_campaign};
use serde::Serialize;
use std::io::Write;

use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

/// Arguments for `sb sim`.
#[derive(Args, Debug)]
pub struct SimArgs {
    /// Number of seeds to run, starting at 0. Defaults to `[sim] seeds`.
    #[arg(long, conflicts_with = "seed")]
    pub seeds: Option<u64>,

    /// Replay one seed with its full trace.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Mutations per seed. Defaults to `[sim] steps`.
    #[arg(long)]
    pub steps: Option<usize>,

    /// Messages before the first render. Defaults to `[sim] initial_messages`.
    #[arg(long)]
    pub initial_messages: Option<usize>,
}

impl SimArgs {
    fn campaign(&self, settings: &SimConfig, utc_offset_minutes: i32) -> CampaignConfig {
        let settings = SimConfig {
            seeds: self.seeds.unwrap_or(settings.seeds),
            steps: self.steps.unwrap_or(settings.steps),
            initial_messages: self.initial_messages.unwrap_or(settings.initial_messages),
        };
        CampaignConfig {
            utc_offset_minutes,
            ..CampaignConfig::from_settings(&settings)
        }
    }
}

#[derive(Debug, Serialize)]
struct StepLine {
    step: usize,
    mutation: String,
    ops: usize,
    live_nodes: usize,
}

#[derive(Debug, Serialize)]
struct ReplayReport {
    seed: u64,
    passed: bool,
    fingerprint: String,
    steps: Vec<StepLine>,
    violations: Vec<String>,
}

/// Run a simulation campaign, or replay one seed.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, or one carrying
/// [`ErrorCode::SimulationInvariantFailed`] if any seed fails.
pub fn run_sim(
    args: &SimArgs,
    settings: &SimConfig,
    utc_offset_minutes: i32,
    output: OutputMode,
) -> Result<()> {
    let config = args.campaign(settings, utc_offset_minutes);
    match args.seed {
        Some(seed) => replay(seed, &config, output),
        None => campaign(&config, output),
    }
}

fn campaign(config: &CampaignConfig, output: OutputMode) -> Result<()> {
    let report = run_campaign(config)?;

    render_mode(
        output,
        &report,
        |r, w| {
            writeln!(w, "seeds={} passed={} ops={}", r.seeds_run, r.seeds_passed, r.total_ops)?;
            for failure in &r.failures {
                writeln!(w, "seed {} failed: {}", failure.seed, failure.violations.join("; "))?;
            }
            Ok(())
        },
        |r, w| {
            pretty_section(w, "Simulation campaign")?;
            pretty_kv(w, "seeds", r.seeds_run.to_string())?;
            pretty_kv(w, "passed", r.seeds_passed.to_string())?;
            pretty_kv(w, "ops", r.total_ops.to_string())?;
            for failure in &r.failures {
                writeln!(w, "\nseed {}:", failure.seed)?;
                for v in &failure.violations {
                    writeln!(w, "  - {v}")?;
                }
            }
            Ok(())
        },
    )?;

    match report.first_failure {
        Some(seed) => Err(anyhow!(
            "{} of {} seeds failed; first failing seed {seed}",
            report.failures.len(),
            report.seeds_run
        )
        .context(ErrorCode::SimulationInvariantFailed)),
        None => Ok(()),
    }
}

fn replay(seed: u64, config: &CampaignConfig, output: OutputMode) -> Result<()> {
    let result = replay_seed(seed, config)?;
    let report = ReplayReport {
        seed,
        passed: result.oracle.passed,
        fingerprint: result.final_fingerprint.clone(),
        steps: result
            .trace
            .iter()
            .map(|t| StepLine {
                step: t.step,
                mutation: t
                    .mutation
                    .as_ref()
                    .map_or_else(|| "initial render".to_string(), ToString::to_string),
                ops: t.ops.total(),
                live_nodes: t.live_nodes,
            })
            .collect(),
        violations: result.oracle.violations.iter().map(format_violation).collect(),
    };

    render_mode(
        output,
        &report,
        |r, w| {
            for s in &r.steps {
                writeln!(w, "{}\t{}\t{}\t{}", s.step, s.ops, s.live_nodes, s.mutation)?;
            }
            for v in &r.violations {
                writeln!(w, "violation\t{v}")?;
            }
            Ok(())
        },
        |r, w| {
            pretty_section(w, &format!("Replay of seed {}", r.seed))?;
            pretty_kv(w, "passed", r.passed.to_string())?;
            pretty_kv(w, "fingerprint", &r.fingerprint)?;
            writeln!(w)?;
            for s in &r.steps {
                writeln!(w, "{:>4}  {:>3} ops  {:>4} nodes  {}", s.step, s.ops, s.live_nodes, s.mutation)?;
            }
            for v in &r.violations {
                writeln!(w, "violation: {v}")?;
            }
            Ok(())
        },
    )?;

    if report.passed {
        Ok(())
    } else {
        Err(anyhow!("seed {seed} violated {} invariant(s)", report.violations.len())
            .context(ErrorCode::SimulationInvariantFailed))
    }
}
