//! Forecast driver: parameters in, rounded per-compartment daily series out.

use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::math::ode::{OdeStats, SolverConfig};
use crate::model::seird::{Compartment, SeirdModel, SeirdParams, SeirdState};

/// `days` evenly spaced sample times spanning `[0, days]`, endpoints included.
///
/// The spacing is `days / (days - 1)`, slightly over one day. A single day
/// yields just `[0.0]`.
pub fn time_grid(days: usize) -> Vec<f64> {
    match days {
        0 => Vec::new(),
        1 => vec![0.0],
        _ => {
            let end = days as f64;
            let step = end / (days - 1) as f64;
            let mut grid: Vec<f64> = (0..days).map(|k| k as f64 * step).collect();
            grid[days - 1] = end;
            grid
        }
    }
}

/// Un-rounded integrator output on the time grid.
#[derive(Debug, Clone, Serialize)]
pub struct Solution {
    pub times: Vec<f64>,
    pub states: Vec<SeirdState>,
    pub stats: OdeStats,
}

/// Integer compartment counts, one entry per grid sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trajectory {
    pub times: Vec<f64>,
    pub susceptible: Vec<i64>,
    pub exposed: Vec<i64>,
    pub infected: Vec<i64>,
    pub recovered: Vec<i64>,
    pub deceased: Vec<i64>,
}

impl Trajectory {
    /// Round every state to the nearest integer, ties to even.
    ///
    /// Validated parameters keep every count within `±2^53`, where the cast is
    /// exact; beyond that `as i64` saturates.
    pub fn from_solution(sol: &Solution) -> Self {
        let column = |c: Compartment| -> Vec<i64> {
            sol.states
                .iter()
                .map(|s| s.get(c).round_ties_even() as i64)
                .collect()
        };
        Self {
            times: sol.times.clone(),
            susceptible: column(Compartment::Susceptible),
            exposed: column(Compartment::Exposed),
            infected: column(Compartment::Infected),
            recovered: column(Compartment::Recovered),
            deceased: column(Compartment::Deceased),
        }
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn series(&self, c: Compartment) -> &[i64] {
        match c {
            Compartment::Susceptible => &self.susceptible,
            Compartment::Exposed => &self.exposed,
            Compartment::Infected => &self.infected,
            Compartment::Recovered => &self.recovered,
            Compartment::Deceased => &self.deceased,
        }
    }

    /// `[S, E, I, R, D]` for one sample.
    pub fn row(&self, day: usize) -> Option<[i64; 5]> {
        if day >= self.len() {
            return None;
        }
        Some(Compartment::ALL.map(|c| self.series(c)[day]))
    }
}

/// Validate, derive rates and initial state, then integrate over the forecast grid.
pub fn simulate(params: &SeirdParams, solver: &SolverConfig) -> Result<Solution> {
    solver.check()?;
    let model = SeirdModel::new(params.clone())?;
    let y0 = model.initial_state()?;
    let times = time_grid(params.forecast_days);

    debug!(
        beta = model.rates.beta,
        alpha = model.rates.alpha,
        gamma = model.rates.gamma,
        mu = model.rates.mu,
        inflow = model.rates.inflow,
        s0 = y0.susceptible,
        e0 = y0.exposed,
        days = params.forecast_days,
        "starting SEIR-D forecast"
    );

    let (states, stats) = model.simulate(&y0, &times, solver)?;
    debug!(
        accepted = stats.accepted_steps,
        rejected = stats.rejected_steps,
        evaluations = stats.evaluations,
        stiff_switch_at = ?stats.stiff_switch_at,
        "forecast integrated"
    );

    Ok(Solution { times, states, stats })
}

pub fn run(params: &SeirdParams, solver: &SolverConfig) -> Result<Trajectory> {
    let sol = simulate(params, solver)?;
    Ok(Trajectory::from_solution(&sol))
}

/// [`run`] with the default adaptive integrator.
pub fn forecast(params: &SeirdParams) -> Result<Trajectory> {
    run(params, &SolverConfig::default())
}
