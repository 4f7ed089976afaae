#![forbid(unsafe_code)]

use anyhow::Result;
use scrollback_sim::{SimulationConfig, Simulator};

fn main() -> Result<()> {
    let mut simulator = Simulator::new(SimulationConfig::default())?;
    let result = simulator.run()?;

    println!(
        "simulation complete: steps={} ops={} rebuilds={} passed={} fingerprint={}",
        result.trace.len(),
        result.total_ops(),
        result.rebuilds,
        result.oracle.passed,
        result.final_fingerprint
    );

    Ok(())
}
