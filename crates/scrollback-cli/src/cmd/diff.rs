use anyhow::Result;
use clap::Args;
use scrollback_core::{EditOp, Grouper, OpCounts, generate};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

use crate::input::StateFile;
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

/// Arguments for `sb diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// State the live tree was rendered from.
    #[arg(value_name = "OLD")]
    pub old: PathBuf,

    /// State to bring the live tree to.
    #[arg(value_name = "NEW")]
    pub new: PathBuf,
}

#[derive(Debug, Serialize)]
struct DiffReport {
    counts: OpCounts,
    ops: Vec<EditOp>,
}

/// Print the edit sequence between two state files.
///
/// # Errors
///
/// Returns an error if either state file cannot be loaded or output fails.
pub fn run_diff(args: &DiffArgs, grouper: &Grouper, output: OutputMode) -> Result<()> {
    let old = StateFile::load(&args.old)?.to_render_state(grouper);
    let new = StateFile::load(&args.new)?.to_render_state(grouper);

    let ops = generate(&old, &new);
    let counts = OpCounts::of(&ops);
    info!(total = counts.total(), "diff computed");

    render_mode(
        output,
        &DiffReport { counts, ops },
        |r, w| {
            for op in &r.ops {
                writeln!(w, "{op}")?;
            }
            Ok(())
        },
        |r, w| {
            pretty_section(w, "Edit sequence")?;
            pretty_kv(w, "inserted", r.counts.inserted.to_string())?;
            pretty_kv(w, "deleted", r.counts.deleted.to_string())?;
            pretty_kv(w, "replaced", r.counts.replaced.to_string())?;
            if r.ops.is_empty() {
                writeln!(w, "\n(no changes)")?;
                return Ok(());
            }
            writeln!(w)?;
            for (i, op) in r.ops.iter().enumerate() {
                writeln!(w, "{:>4}. {op}", i + 1)?;
            }
            Ok(())
        },
    )
}
