use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::math::ode::{integrate_grid, OdeError, OdeStats, SolverConfig};

/// The five compartments, in state-vector order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compartment {
    Susceptible = 0,
    Exposed = 1,
    Infected = 2,
    Recovered = 3,
    Deceased = 4,
}

impl Compartment {
    pub const ALL: [Compartment; 5] = [
        Compartment::Susceptible,
        Compartment::Exposed,
        Compartment::Infected,
        Compartment::Recovered,
        Compartment::Deceased,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            Compartment::Susceptible => "susceptible",
            Compartment::Exposed => "exposed",
            Compartment::Infected => "infected",
            Compartment::Recovered => "recovered",
            Compartment::Deceased => "deceased",
        }
    }
}

impl fmt::Display for Compartment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How the exposed pool at t=0 is seeded.
///
/// `ProportionalToInfected` sets E₀ = β·I₀. This is a heuristic, not a measured
/// quantity; `Fixed` lets a caller supply a measured or fitted value instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExposedSeed {
    #[default]
    ProportionalToInfected,
    Fixed(f64),
}

/// Human-facing epidemiological inputs for one forecast run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeirdParams {
    /// Total population N.
    pub population: f64,
    // Initial compartment counts.
    pub infected: f64,
    pub recovered: f64,
    pub deceased: f64,

    pub reproduction_number: f64,
    /// Days from exposure to becoming infectious.
    pub incubation_period: f64,
    /// Days an individual stays infectious before resolving.
    pub infectious_period: f64,
    pub case_fatality_rate: f64,

    pub forecast_days: usize,

    /// Exogenous new infections per day, as a fraction of N.
    #[serde(default)]
    pub inflow_rate: f64,
    #[serde(default)]
    pub exposed_seed: ExposedSeed,
}

impl SeirdParams {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        population: f64,
        infected: f64,
        recovered: f64,
        deceased: f64,
        reproduction_number: f64,
        incubation_period: f64,
        infectious_period: f64,
        case_fatality_rate: f64,
        forecast_days: usize,
    ) -> Self {
        Self {
            population,
            infected,
            recovered,
            deceased,
            reproduction_number,
            incubation_period,
            infectious_period,
            case_fatality_rate,
            forecast_days,
            inflow_rate: 0.0,
            exposed_seed: ExposedSeed::default(),
        }
    }

    pub fn with_inflow(mut self, inflow_rate: f64) -> Self {
        self.inflow_rate = inflow_rate;
        self
    }

    pub fn with_exposed_seed(mut self, seed: ExposedSeed) -> Self {
        self.exposed_seed = seed;
        self
    }

    pub fn check(&self) -> Result<()> {
        let finite = [
            ("population", self.population),
            ("infected", self.infected),
            ("recovered", self.recovered),
            ("deceased", self.deceased),
            ("reproduction_number", self.reproduction_number),
            ("incubation_period", self.incubation_period),
            ("infectious_period", self.infectious_period),
            ("case_fatality_rate", self.case_fatality_rate),
            ("inflow_rate", self.inflow_rate),
        ];
        for (name, v) in finite {
            if !v.is_finite() {
                return Err(Error::invalid(name, v, "must be finite"));
            }
        }

        ensure(self.population > 0.0, "population", self.population, "must be > 0")?;
        ensure(self.infected >= 0.0, "infected", self.infected, "must be >= 0")?;
        ensure(self.recovered >= 0.0, "recovered", self.recovered, "must be >= 0")?;
        ensure(self.deceased >= 0.0, "deceased", self.deceased, "must be >= 0")?;
        ensure(
            self.reproduction_number >= 0.0,
            "reproduction_number",
            self.reproduction_number,
            "must be >= 0",
        )?;
        ensure(
            self.incubation_period > 0.0,
            "incubation_period",
            self.incubation_period,
            "must be > 0 days",
        )?;
        ensure(
            self.infectious_period > 0.0,
            "infectious_period",
            self.infectious_period,
            "must be > 0 days",
        )?;
        ensure(
            (0.0..=1.0).contains(&self.case_fatality_rate),
            "case_fatality_rate",
            self.case_fatality_rate,
            "must lie in [0, 1]",
        )?;
        ensure(self.forecast_days >= 1, "forecast_days", self.forecast_days as f64, "must be at least 1")?;
        ensure(self.inflow_rate >= 0.0, "inflow_rate", self.inflow_rate, "must be >= 0")?;
        if let ExposedSeed::Fixed(e) = self.exposed_seed {
            ensure(e.is_finite() && e >= 0.0, "exposed_seed", e, "must be finite and >= 0")?;
        }
        // Inflow adds `inflow_rate * population` people a day on top of the
        // closed population; every count must round to an exact i64.
        let peak = self.population * (1.0 + self.inflow_rate * self.forecast_days as f64);
        ensure(
            peak <= MAX_EXACT_COUNT,
            "population",
            self.population,
            "population plus forecast inflow must not exceed 2^53",
        )?;
        Ok(())
    }
}

/// Largest count every integer up to which is exactly representable in `f64`.
pub const MAX_EXACT_COUNT: f64 = 9_007_199_254_740_992.0;

fn ensure(cond: bool, name: &'static str, value: f64, reason: &'static str) -> Result<()> {
    if cond {
        Ok(())
    } else {
        Err(Error::invalid(name, value, reason))
    }
}

/// Per-day rate constants derived once per run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RateConstants {
    /// Transmission coefficient, R0 / incubation period.
    pub beta: f64,
    /// E -> I progression, 1 / incubation period.
    pub alpha: f64,
    /// I -> R|D resolution, 1 / infectious period.
    pub gamma: f64,
    /// Fraction of resolutions ending in death.
    pub mu: f64,
    /// Exogenous inflow into I, fraction of N per day.
    pub inflow: f64,
}

impl RateConstants {
    pub fn from_params(p: &SeirdParams) -> Self {
        Self {
            beta: p.reproduction_number / p.incubation_period,
            alpha: 1.0 / p.incubation_period,
            gamma: 1.0 / p.infectious_period,
            mu: p.case_fatality_rate,
            inflow: p.inflow_rate,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SeirdState {
    pub susceptible: f64,
    pub exposed: f64,
    pub infected: f64,
    pub recovered: f64,
    pub deceased: f64,
}

impl SeirdState {
    pub fn from_array(y: [f64; 5]) -> Self {
        Self {
            susceptible: y[0],
            exposed: y[1],
            infected: y[2],
            recovered: y[3],
            deceased: y[4],
        }
    }

    pub fn to_array(self) -> [f64; 5] {
        [self.susceptible, self.exposed, self.infected, self.recovered, self.deceased]
    }

    pub fn get(&self, c: Compartment) -> f64 {
        self.to_array()[c.index()]
    }

    pub fn total(&self) -> f64 {
        self.to_array().iter().sum()
    }

    /// Initial state: E₀ from the seeding rule, S₀ = N − I₀ − R₀ − D₀ − E₀.
    ///
    /// A negative S₀ means the seeded compartments exceed the population and is rejected.
    pub fn initial(p: &SeirdParams, rates: &RateConstants) -> Result<Self> {
        let exposed = match p.exposed_seed {
            ExposedSeed::ProportionalToInfected => rates.beta * p.infected,
            ExposedSeed::Fixed(e) => e,
        };
        let susceptible = p.population - p.infected - p.recovered - p.deceased - exposed;
        if susceptible < 0.0 {
            return Err(Error::invalid(
                "susceptible",
                susceptible,
                "initial infected, recovered, deceased and exposed exceed the population",
            ));
        }
        Ok(Self {
            susceptible,
            exposed,
            infected: p.infected,
            recovered: p.recovered,
            deceased: p.deceased,
        })
    }
}

/// Autonomous SEIR-D system with fixed rates.
///
/// The force of infection is normalised by S+I+R, leaving E and D out of the
/// mixing pool. This differs from the usual S·I/N form and is kept as is.
#[derive(Debug, Clone)]
pub struct SeirdModel {
    pub params: SeirdParams,
    pub rates: RateConstants,
}

impl SeirdModel {
    pub fn new(params: SeirdParams) -> Result<Self> {
        params.check()?;
        let rates = RateConstants::from_params(&params);
        Ok(Self { params, rates })
    }

    pub fn initial_state(&self) -> Result<SeirdState> {
        SeirdState::initial(&self.params, &self.rates)
    }

    /// Right-hand side over a 5-slot state slice. `_t` is unused; the system is time-invariant.
    pub fn deriv(&self, _t: f64, y: &[f64], dy: &mut [f64]) {
        let r = &self.rates;
        let n = self.params.population;
        let (s, e, i, rec) = (y[0], y[1], y[2], y[3]);

        // Division by zero when S+I+R hits 0 is left to surface as NaN.
        let infection = r.beta * s * i / (s + i + rec);
        let resolved = r.gamma * i;

        dy[0] = -infection;
        dy[1] = infection - r.alpha * e;
        dy[2] = r.inflow * n + r.alpha * e - resolved;
        dy[3] = resolved * (1.0 - r.mu);
        dy[4] = resolved * r.mu;
    }

    pub fn derivative(&self, t: f64, y: &SeirdState) -> SeirdState {
        let mut dy = [0.0; 5];
        self.deriv(t, &y.to_array(), &mut dy);
        SeirdState::from_array(dy)
    }

    /// Integrate from `y0` at `grid[0]`, sampling one state per grid point.
    pub fn simulate(
        &self,
        y0: &SeirdState,
        grid: &[f64],
        solver: &SolverConfig,
    ) -> std::result::Result<(Vec<SeirdState>, OdeStats), OdeError> {
        let sol = integrate_grid(&y0.to_array(), grid, solver, |t, y, dy| self.deriv(t, y, dy))?;
        let states = sol
            .states
            .iter()
            .map(|y| SeirdState::from_array([y[0], y[1], y[2], y[3], y[4]]))
            .collect();
        Ok((states, sol.stats))
    }
}
