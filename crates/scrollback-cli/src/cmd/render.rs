use anyhow::Result;
use clap::Args;
use scrollback_core::{Grouper, LiveTree, RenderedNode};
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;

use crate::input::StateFile;
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

/// Arguments for `sb render`.
#[derive(Args, Debug)]
pub struct RenderArgs {
    /// State file to render.
    #[arg(value_name = "STATE")]
    pub state: PathBuf,

    /// Include each node's HTML in text and pretty output.
    #[arg(long)]
    pub html: bool,
}

#[derive(Debug, Serialize)]
struct RenderReport {
    messages: usize,
    nodes: usize,
    fingerprint: String,
    tree: Vec<RenderedNode>,
}

/// Fully render a state file.
///
/// # Errors
///
/// Returns an error if the state file cannot be loaded or output fails.
pub fn run_render(args: &RenderArgs, grouper: &Grouper, output: OutputMode) -> Result<()> {
    let state = StateFile::load(&args.state)?.to_render_state(grouper);
    let tree = state.render();
    let live = LiveTree::from_rendered(&tree);

    let report = RenderReport {
        messages: state.elements.message_count(),
        nodes: live.len(),
        fingerprint: live.fingerprint(),
        tree,
    };

    let html = args.html;
    render_mode(
        output,
        &report,
        |r, w| {
            for node in &r.tree {
                write_outline(w, node, 0, html)?;
            }
            Ok(())
        },
        |r, w| {
            pretty_section(w, "Rendered timeline")?;
            pretty_kv(w, "messages", r.messages.to_string())?;
            pretty_kv(w, "nodes", r.nodes.to_string())?;
            pretty_kv(w, "fingerprint", &r.fingerprint)?;
            writeln!(w)?;
            for node in &r.tree {
                write_outline(w, node, 1, html)?;
            }
            Ok(())
        },
    )
}

/// One line per node, indented by depth.
pub fn write_outline(w: &mut dyn Write, node: &RenderedNode, depth: usize, html: bool) -> io::Result<()> {
    let indent = "  ".repeat(depth);
    if html {
        writeln!(w, "{indent}{}  {}", node.key, node.html)?;
    } else {
        writeln!(w, "{indent}{}", node.key)?;
    }
    for child in &node.children {
        write_outline(w, child, depth + 1, html)?;
    }
    Ok(())
}
