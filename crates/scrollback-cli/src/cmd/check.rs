use anyhow::{Result, anyhow};
use clap::Args;
use scrollback_core::error::ErrorCode;
use scrollback_core::{Grouper, LiveTree, OpCounts, apply, generate};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;

use crate::input::StateFile;
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

/// Arguments for `sb check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    #[arg(value_name = "OLD")]
    pub old: PathBuf,

    #[arg(value_name = "NEW")]
    pub new: PathBuf,
}

#[derive(Debug, Serialize)]
struct CheckReport {
    ok: bool,
    counts: OpCounts,
    expected: String,
    actual: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Apply the diff between two state files to a render of the first and
/// compare the result with a full render of the second.
///
/// # Errors
///
/// Returns an error if a state file cannot be loaded, or if the patched tree
/// does not match the full render.
pub fn run_check(args: &CheckArgs, grouper: &Grouper, output: OutputMode) -> Result<()> {
    let old = StateFile::load(&args.old)?.to_render_state(grouper);
    let new = StateFile::load(&args.new)?.to_render_state(grouper);

    let ops = generate(&old, &new);
    let mut live = LiveTree::from_rendered(&old.render());
    let error = apply(&ops, &mut live).err();

    let expected = LiveTree::from_rendered(&new.render()).fingerprint();
    let actual = live.fingerprint();
    let report = CheckReport {
        ok: error.is_none() && expected == actual,
        counts: OpCounts::of(&ops),
        expected,
        actual,
        error: error.as_ref().map(ToString::to_string),
    };

    render_mode(
        output,
        &report,
        |r, w| writeln!(w, "{} {} {}", status(r.ok), r.counts.total(), r.actual),
        |r, w| {
            pretty_section(w, "Reconciliation check")?;
            pretty_kv(w, "result", status(r.ok))?;
            pretty_kv(w, "ops", r.counts.total().to_string())?;
            pretty_kv(w, "expected", &r.expected)?;
            pretty_kv(w, "actual", &r.actual)?;
            if let Some(error) = &r.error {
                pretty_kv(w, "error", error)?;
            }
            Ok(())
        },
    )?;

    if !report.ok {
        let detail = report
            .error
            .unwrap_or_else(|| "patched tree differs from full render".to_string());
        return Err(anyhow!(detail).context(ErrorCode::IntegrityViolation));
    }
    Ok(())
}

const fn status(ok: bool) -> &'static str {
    if ok { "ok" } else { "FAILED" }
}
