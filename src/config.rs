//! JSON scenario configuration, the request format used by the web layer.

use crate::compute::{DayProfile, Perturbation, ResultSimulation, SimulationModel, SimulationRun, Simulator};
use crate::error::{SimResult, SimulationError};
use crate::model::dairy;
use crate::sampling::{DistributionType, PdfSpec};
use crate::validation::{MetricBindings, ValidationReport, Validator, ValidatorConfig};
use chrono::NaiveDate;
use serde::{Serialize, Deserialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionConfig {
    #[serde(rename = "type")]
    pub kind: String,
    pub params: HashMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub horizon_days: usize,
    pub random_seed: u64,
    pub distribution: DistributionConfig,
    pub historical_demand: Vec<f64>,
    /// Initial values keyed by initials (prices, costs, staffing, capacities).
    #[serde(default)]
    pub parameters: BTreeMap<String, f64>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub perturbation: Option<Perturbation>,
    #[serde(default)]
    pub profiles: BTreeMap<String, DayProfile>,
    #[serde(default)]
    pub validator: ValidatorConfig,
}

/// Everything a scenario request returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    pub result: ResultSimulation,
    pub report: ValidationReport,
}

impl ScenarioConfig {
    pub fn from_json_str(json: &str) -> SimResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> SimResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn pdf(&self) -> SimResult<PdfSpec> {
        let kind: DistributionType = self.distribution.kind.parse()?;
        PdfSpec::from_params(kind, &self.distribution.params)
    }

    /// Builds the run. All request validation happens here.
    pub fn into_run(&self) -> SimResult<SimulationRun> {
        let mut run = SimulationRun::new(self.horizon_days, self.random_seed, self.pdf()?, self.historical_demand.clone())?
            .with_initial_state(self.parameters.iter().map(|(k, v)| (k.clone(), *v)));
        if let Some(date) = self.start_date {
            run = run.with_start_date(date);
        }
        if let Some(p) = &self.perturbation {
            run = run.with_perturbation(p.clone());
        }
        Ok(run)
    }

    pub fn apply_profiles(&self, mut model: SimulationModel) -> SimResult<SimulationModel> {
        for (initials, profile) in &self.profiles {
            model = model.with_profile(initials, profile.clone())?;
        }
        Ok(model)
    }

    /// Runs the scenario on `model` with this config's profiles attached.
    pub fn simulate(&self, model: &SimulationModel) -> SimResult<(SimulationRun, ResultSimulation)> {
        let run = self.into_run()?;
        let model = self.apply_profiles(model.clone())?;
        let result = Simulator::new(model).run(&run)?;
        Ok((run, result))
    }

    /// Runs the scenario on `model` and validates it.
    pub fn execute_on(&self, model: &SimulationModel) -> SimResult<ScenarioOutcome> {
        let (run, result) = self.simulate(model)?;
        let report = Validator::new(self.validator)
            .validate_run(run.historical_demand(), &result, &MetricBindings::default())?;
        Ok(ScenarioOutcome { result, report })
    }

    /// Runs the scenario on the canonical dairy model and validates it.
    pub fn execute(&self) -> SimResult<ScenarioOutcome> {
        self.execute_on(&dairy::model()?)
    }
}

impl std::str::FromStr for ScenarioConfig {
    type Err = SimulationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_json_str(s)
    }
}
