//! Deterministic SEIR-D epidemic forecasting.
//!
//! [`forecast::run`] turns epidemiological inputs ([`SeirdParams`]) into a
//! rounded per-compartment [`Trajectory`]; [`cases::daily_new_cases`] turns a
//! cumulative case history into daily counts.

pub mod cases;
pub mod error;
pub mod forecast;
pub mod io;
pub mod math;
pub mod model;

pub use cases::{cumulative, daily_new_cases, CaseHistory};
pub use error::{Error, Result};
pub use forecast::{forecast, run, simulate, time_grid, Solution, Trajectory};
pub use math::ode::{AdaptiveOptions, OdeError, OdeStats, SolverConfig};
pub use model::seird::{Compartment, ExposedSeed, RateConstants, SeirdModel, SeirdParams, SeirdState};
