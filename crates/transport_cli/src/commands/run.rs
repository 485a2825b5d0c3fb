//! `transport run` - the slab demonstration problem.
//!
//! A monoenergetic isotropic neutron point source in the middle of a
//! homogeneous 1-D slab, tallied with a per-cell track-length flux
//! estimator and a leakage current estimator on the outer planes.

use std::fs;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use transport_core::ParticleType;
use transport_event::{CompletionCriterion, Estimator, EstimatorKind, EventHandler};
use transport_manager::testing::{
    AbsorbScatterCollisionHandler, MonoenergeticIsotropicSource, SlabNavigator,
};
use transport_manager::{
    ParticleSimulationManager, SimulationController, SimulationProperties,
    SimulationPropertiesBuilder,
};

use crate::Result;

const SLAB_WIDTH: f64 = 10.0;
const SLAB_CELLS: usize = 5;
const TOTAL_CROSS_SECTION: f64 = 1.0;
const SCATTER_RATIO: f64 = 0.7;

pub fn run(
    histories: u64,
    threads: Option<usize>,
    seed: Option<u64>,
    wall_time: Option<f64>,
    properties_path: Option<&str>,
    interactive: bool,
) -> Result<()> {
    let properties = build_properties(histories, threads, seed, properties_path)?;

    let slab = SlabNavigator::uniform(SLAB_WIDTH, SLAB_CELLS);
    let source = MonoenergeticIsotropicSource::new(
        ParticleType::Neutron,
        2.0,
        [0.0, 0.0, SLAB_WIDTH / 2.0],
        slab.cell_at(SLAB_WIDTH / 2.0).unwrap_or(1),
    );
    let material = AbsorbScatterCollisionHandler::new(TOTAL_CROSS_SECTION, SCATTER_RATIO);

    let mut flux_builder = Estimator::builder(0, EstimatorKind::CellTrackLengthFlux);
    for cell in 1..=SLAB_CELLS as u64 {
        flux_builder = flux_builder.add_entity(cell, SLAB_WIDTH / SLAB_CELLS as f64);
    }
    let flux = Arc::new(flux_builder.build()?);

    let current = Arc::new(
        Estimator::builder(1, EstimatorKind::SurfaceCurrent)
            .add_entity(0, 1.0)
            .add_entity(SLAB_CELLS as u64, 1.0)
            .build()?,
    );

    let mut event_handler = EventHandler::new();
    event_handler.add_estimator(Arc::clone(&flux));
    event_handler.add_estimator(Arc::clone(&current));

    let criterion = match wall_time {
        Some(seconds) => CompletionCriterion::mixed(
            properties.number_of_histories(),
            Duration::from_secs_f64(seconds),
        )?,
        None => CompletionCriterion::history_count(properties.number_of_histories())?,
    };

    let manager = ParticleSimulationManager::new(
        properties,
        Arc::new(source),
        Arc::new(material),
        Arc::new(slab),
        event_handler,
        criterion,
    )?;

    if interactive {
        spawn_command_reader(manager.controller());
    }

    let report = manager.run()?;
    manager.log_simulation_summary();

    let mut stdout = io::stdout().lock();
    manager.print_simulation_summary(&mut stdout)?;
    print_estimator_table(&mut stdout, &flux, &current, report.histories_completed, &manager)?;

    Ok(())
}

fn build_properties(
    histories: u64,
    threads: Option<usize>,
    seed: Option<u64>,
    properties_path: Option<&str>,
) -> Result<SimulationProperties> {
    let mut builder = match properties_path {
        Some(path) => {
            info!(path, "loading properties file");
            let text = fs::read_to_string(path)?;
            toml::from_str::<SimulationPropertiesBuilder>(&text)?
        }
        None => SimulationProperties::builder()
            .number_of_histories(histories)
            // Demo default: roulette low-weight neutrons.
            .roulette_cutoff(ParticleType::Neutron, 0.05, 0.2),
    };

    if properties_path.is_none() {
        if let Some(threads) = threads {
            builder = builder.number_of_threads(threads);
        }
        if let Some(seed) = seed {
            builder = builder.base_seed(seed);
        }
    }

    Ok(builder.build()?)
}

/// Reads single-letter commands from stdin until the run ends.
fn spawn_command_reader(controller: SimulationController) {
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(_) => break,
            };
            match line.trim() {
                "s" | "status" => controller.request_status(),
                "e" | "end" => {
                    controller.request_end();
                    break;
                }
                "k" | "kill" => {
                    warn!("killing the simulation without committing in-flight histories");
                    std::process::exit(1);
                }
                "" => {}
                other => warn!(command = other, "unknown command (use s/e/k)"),
            }
        }
    });
}

fn print_estimator_table(
    w: &mut dyn Write,
    flux: &Estimator,
    current: &Estimator,
    histories: u64,
    manager: &ParticleSimulationManager,
) -> io::Result<()> {
    let elapsed = manager.sampling_time().as_secs_f64();

    writeln!(w)?;
    writeln!(w, "cell flux (track length)")?;
    writeln!(w, "{:>6} {:>14} {:>12} {:>10}", "cell", "mean", "rel. err.", "FOM")?;
    for cell in flux.entities() {
        if let Some(processed) = flux.entity_total_processed_data(cell, histories, elapsed) {
            writeln!(
                w,
                "{:>6} {:>14.6e} {:>12.4} {:>10.1}",
                cell, processed[0].mean, processed[0].relative_error, processed[0].figure_of_merit
            )?;
        }
    }

    writeln!(w)?;
    writeln!(w, "leakage current")?;
    writeln!(w, "{:>6} {:>14} {:>12} {:>10}", "plane", "mean", "rel. err.", "FOM")?;
    for surface in current.entities() {
        if let Some(processed) = current.entity_total_processed_data(surface, histories, elapsed) {
            writeln!(
                w,
                "{:>6} {:>14.6e} {:>12.4} {:>10.1}",
                surface,
                processed[0].mean,
                processed[0].relative_error,
                processed[0].figure_of_merit
            )?;
        }
    }
    Ok(())
}
