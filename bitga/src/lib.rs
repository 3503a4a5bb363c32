//! A genetic algorithm over real-valued individuals, operating
//! directly on their IEEE-754 binary representation.
//!
//! Individuals are `f64` arrays of any shape, encoded element-wise
//! as 32 or 64-bit strings. Each generation is cloned from the
//! previous one with a bias towards fitter individuals, then crossed
//! (single-point, per element) and mutated (bit inversion according
//! to a [`BitSelection`](bits::BitSelection) policy, or the real-valued
//! steps of [`breeder::bga_mutate`]). Only individuals changed by
//! crossover or mutation are re-evaluated.
//!
//! Fitness functions are anything implementing [`FitnessFunction`],
//! including plain closures; [`PerIndividual`] evaluates rows in
//! parallel. Every random draw comes from a caller-supplied generator,
//! so a seeded run is fully reproducible.
//!
//! Generational population logging is supported through
//! [`logging::EvolutionLogger`], and diagnostics are emitted with
//! [`tracing`](https://docs.rs/tracing).
//!
//! # Example usage: minimizing the distance to a point
//! ```
//! use bitga::{Evolver, EvolverConfig, PerIndividual, PopulationConfig, SelectionScheme};
//! use ndarray::{Array2, ArrayViewD};
//!
//! fn closeness(x: ArrayViewD<f64>) -> f64 {
//!     let distance = x.iter().map(|v| (v - 3.0).powi(2)).sum::<f64>();
//!     if distance.is_nan() {
//!         0.0
//!     } else {
//!         1.0 / (1.0 + distance)
//!     }
//! }
//!
//! fn main() {
//!     let config = EvolverConfig {
//!         population: PopulationConfig {
//!             mutation_probability: 0.2,
//!             crossover_probability: 0.6,
//!             selection: SelectionScheme::LinearRank { pressure: 1.8 },
//!             ..PopulationConfig::default()
//!         },
//!         degeneration: false,
//!         elitism: true,
//!         ..EvolverConfig::default()
//!     };
//!     let individuals = Array2::from_shape_fn((20, 2), |(i, j)| i as f64 * 0.5 - j as f64);
//!
//!     let mut evolver = Evolver::new(
//!         &individuals,
//!         config,
//!         PerIndividual(closeness),
//!         bitga::rng::seeded(42),
//!     )
//!     .unwrap();
//!     let initial = evolver.best_fit().unwrap();
//!
//!     let reason = evolver.evolve(100, 0.99).unwrap();
//!     println!("stopped ({:?}) at generation {}", reason, evolver.generation());
//!     println!("best individual: {}", evolver.best_individual().unwrap().unwrap());
//!     assert!(evolver.best_fit().unwrap() >= initial);
//! }
//! ```

pub mod bits;
pub mod breeder;
mod errors;
mod evolver;
mod fitness;
mod populations;
pub mod ranking;
pub mod rng;

pub use errors::*;
pub use evolver::*;
pub use fitness::*;
pub use populations::*;
