use bitga::logging::{EvolutionLogger, GenerationMemberRecord, ReportingLevel, Stats};
use bitga::{Evolver, EvolverConfig, PerIndividual, StopReason};

use ndarray::{Array1, Array2, ArrayViewD};
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use std::error::Error;
use std::fs;

/// Settings of a batch of independent runs.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
struct RunConfig {
    /// Seed of the first run; run `k` uses `seed + k`.
    seed: u64,
    runs: usize,
    population_size: usize,
    /// Point the individuals must converge to.
    target_point: Vec<f64>,
    /// Initial values are drawn uniformly from `[-spread, spread)`.
    spread: f64,
    max_generations: usize,
    target_fitness: f64,
    evolver: EvolverConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            seed: 0,
            runs: 50,
            population_size: 40,
            target_point: vec![1.0, -2.0, 0.5],
            spread: 10.0,
            max_generations: 200,
            target_fitness: 0.99,
            evolver: EvolverConfig {
                degeneration: false,
                ..EvolverConfig::default()
            },
        }
    }
}

fn closeness(target: &Array1<f64>, individual: ArrayViewD<f64>) -> f64 {
    let distance = individual
        .iter()
        .zip(target)
        .map(|(x, t)| (x - t).powi(2))
        .sum::<f64>();
    if distance.is_nan() {
        0.0
    } else {
        1.0 / (1.0 + distance)
    }
}

/// Generation at which the target was reached, if it was.
fn run(config: &RunConfig, run: usize, logger: Option<&mut EvolutionLogger>) -> Result<Option<usize>, Box<dyn Error + Send + Sync>> {
    let mut rng = bitga::rng::seeded(config.seed + run as u64);
    let dimensions = config.target_point.len();
    let individuals = Array2::from_shape_fn((config.population_size, dimensions), |_| {
        rng.gen_range(-config.spread..config.spread)
    });
    let target = Array1::from(config.target_point.clone());
    let fitness = PerIndividual(move |x: ArrayViewD<f64>| closeness(&target, x));

    let mut evolver = Evolver::new(&individuals, config.evolver.clone(), fitness, rng)?;
    let reason = evolver.evolve(config.max_generations, config.target_fitness)?;
    if let Some(logger) = logger {
        for (generation, population) in evolver.generations().iter().enumerate() {
            logger.log(generation, population)?;
        }
    }
    info!(run, ?reason, generation = evolver.generation(), best = ?evolver.best_fit(), "run finished");
    Ok(match reason {
        StopReason::TargetReached => Some(evolver.generation()),
        StopReason::MaxGenerations => None,
    })
}

fn load_config() -> Result<RunConfig, Box<dyn Error>> {
    match std::env::args().nth(1) {
        Some(path) => Ok(ron::from_str(&fs::read_to_string(path)?)?),
        None => Ok(RunConfig::default()),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_config()?;
    config.evolver.validate()?;
    info!(?config, "starting runs");

    // The first run is logged in detail.
    let mut logger = EvolutionLogger::new(ReportingLevel::Champion);
    if let Err(e) = run(&config, 0, Some(&mut logger)) {
        error!("{}", e);
        return Err(e.to_string().into());
    }
    if let Some(log) = logger.last() {
        println!("{}", log);
        if let GenerationMemberRecord::Champion(champion, fitness) = &log.generation_sample {
            println!("Champion of first run: {} (fitness {})", champion, fitness);
        }
    }

    let generations: Vec<Option<usize>> = (0..config.runs)
        .into_par_iter()
        .map(|k| {
            run(&config, k, None).unwrap_or_else(|e| {
                error!(run = k, "{}", e);
                None
            })
        })
        .collect();

    println!(
        "Successful run generation count {:?}, {}% failure rate over {} runs",
        Stats::from(generations.iter().filter_map(|g| g.map(|g| g as f64))),
        generations.iter().filter(|g| g.is_none()).count() as f64 * 100.0 / config.runs.max(1) as f64,
        config.runs
    );
    Ok(())
}
