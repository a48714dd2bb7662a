//! Hybrid Tower Example - 100-storey tower under the default earthquake
//!
//! Set `RUST_LOG=info` (or `debug`) to follow the pipeline.

use anyhow::Context;
use hybrid_tower::prelude::*;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    println!("=== Hybrid Tower Example: seismic time history ===\n");

    let params = ParameterSet::default();
    let options = SimulationOptions::default();

    println!(
        "Tower: {} floors, {:.1} m, FEM weight {}",
        params.n_floors(),
        params.height(),
        params.hybrid_factor()
    );
    println!(
        "Horizon: 0 to {} s, {} samples, rtol {:e}\n",
        options.t_end, options.sample_count, options.rtol
    );

    let simulation = Simulation::new(params, options)?;
    let series = match simulation.run() {
        Ok(series) => series,
        Err(err) => {
            if let Some(partial) = err.partial() {
                eprintln!("Incomplete result: {} samples computed", partial.len());
            }
            return Err(err).context("seismic simulation failed");
        }
    };

    let u = series.displacement_matrix();
    println!("Displacement matrix: {} samples x {} floors", u.nrows(), u.ncols());

    println!("\nPeak displacement by elevation:");
    let envelope = series.peak_envelope();
    let stride = (series.n_floors() / 10).max(1);
    for (floor, height) in series.elevations().iter().enumerate().step_by(stride) {
        println!("  {:7.1} m : {:.6e} m", height, envelope[floor]);
    }

    println!("\n{}", series.summary().to_json()?);

    Ok(())
}
