use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::math::ode::SolverConfig;
use crate::model::seird::SeirdParams;

/// A forecast run as described in a JSON file: `{ "params": {...}, "solver": {...} }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub params: SeirdParams,
    #[serde(default)]
    pub solver: SolverConfig,
}

pub fn parse_scenario_json(s: &str) -> anyhow::Result<Scenario> {
    let scenario: Scenario = serde_json::from_str(s).context("scenario JSON does not match the expected layout")?;
    scenario.params.check().context("scenario parameters rejected")?;
    scenario.solver.check().context("scenario solver settings rejected")?;
    Ok(scenario)
}

pub fn load_scenario_json(path: impl AsRef<Path>) -> anyhow::Result<Scenario> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario file: {}", path.display()))?;
    parse_scenario_json(&text).with_context(|| format!("Failed to load scenario: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"{
        "params": {
            "population": 59000000, "infected": 709, "recovered": 0, "deceased": 0,
            "reproduction_number": 2.3, "incubation_period": 4, "infectious_period": 14,
            "case_fatality_rate": 0.02, "forecast_days": 14
        },
        "solver": {"method": "rk4", "dt": 0.25}
    }"#;

    #[test]
    fn reads_params_and_solver() {
        let s = parse_scenario_json(SCENARIO).unwrap();
        assert_eq!(s.params.forecast_days, 14);
        assert_eq!(s.solver, SolverConfig::Rk4 { dt: 0.25 });
    }

    #[test]
    fn solver_defaults_to_adaptive() {
        let s = parse_scenario_json(
            r#"{"params": {
                "population": 1000, "infected": 1, "recovered": 0, "deceased": 0,
                "reproduction_number": 2.0, "incubation_period": 4, "infectious_period": 10,
                "case_fatality_rate": 0.0, "forecast_days": 3
            }}"#,
        )
        .unwrap();
        assert_eq!(s.solver, SolverConfig::default());
    }

    #[test]
    fn invalid_parameters_fail_to_load() {
        let bad = SCENARIO.replace("\"incubation_period\": 4", "\"incubation_period\": 0");
        let err = parse_scenario_json(&bad).unwrap_err();
        assert!(format!("{err:#}").contains("incubation_period"));
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenario.json");
        std::fs::write(&path, SCENARIO).unwrap();
        let s = load_scenario_json(&path).unwrap();
        assert_eq!(s.params.population, 59_000_000.0);

        let missing = load_scenario_json(dir.path().join("nope.json")).unwrap_err();
        assert!(format!("{missing:#}").contains("Failed to read scenario file"));
    }
}
