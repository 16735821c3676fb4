//! The day loop.
//!
//! Each day: rebase exogenous variables through their profiles, apply the
//! random perturbation, evaluate the plan in resolver order, snapshot, then
//! roll today's values into tomorrow's "previous".

use super::ledger::{DailyResult, DayDiagnostics, ResultSimulation, RunDiagnostics, RunStatus};
use super::run::{CancellationToken, SimulationRun};
use super::schedule::DayProfile;
use crate::error::{SimResult, SimulationError};
use crate::graph::{Dependency, EquationGraph, ExecutionPlan, Inputs};
use crate::sampling::Sampler;
use crate::store::{VariableId, VariableKind, VariableRegistry};
use chrono::{Days, NaiveDate};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A resolved model: the registry template plus the execution plan. Immutable
/// and shared by every run.
#[derive(Debug, Clone)]
pub struct SimulationModel {
    registry: VariableRegistry,
    plan: ExecutionPlan,
    profiles: Vec<(VariableId, DayProfile)>,
}

impl SimulationModel {
    /// Resolves the graph. Cycle and binding errors surface here, before any run.
    pub fn build(graph: &EquationGraph) -> SimResult<Self> {
        let plan = graph.resolve()?;
        info!(equations = plan.len(), repairs = plan.repairs.len(), "model resolved");
        Ok(Self { registry: graph.registry().clone(), plan, profiles: Vec::new() })
    }

    /// Attaches a day profile to an exogenous variable. A later profile for
    /// the same variable replaces the earlier one.
    pub fn with_profile(mut self, initials: &str, profile: DayProfile) -> SimResult<Self> {
        let id = self.registry.id_of(initials)?;
        if self.registry.variable(id).kind != VariableKind::Exogenous {
            return Err(SimulationError::Config(format!(
                "day profiles apply to exogenous variables, '{}' is not one", initials
            )));
        }
        profile.validate()?;
        self.profiles.retain(|(other, _)| *other != id);
        self.profiles.push((id, profile));
        Ok(self)
    }

    pub fn registry(&self) -> &VariableRegistry { &self.registry }
    pub fn plan(&self) -> &ExecutionPlan { &self.plan }

    pub fn profile(&self, id: VariableId) -> Option<&DayProfile> {
        self.profiles.iter().find(|(v, _)| *v == id).map(|(_, p)| p)
    }
}

/// Runs simulation requests against one shared model.
#[derive(Debug, Clone)]
pub struct Simulator {
    model: Arc<SimulationModel>,
}

impl Simulator {
    pub fn new(model: SimulationModel) -> Self {
        Self { model: Arc::new(model) }
    }

    pub fn model(&self) -> &SimulationModel { &self.model }

    pub fn run(&self, run: &SimulationRun) -> SimResult<ResultSimulation> {
        self.run_with_cancel(run, &CancellationToken::new())
    }

    /// Like `run`, checking `cancel` before each day. A cancelled run returns
    /// the rows produced so far with status `Cancelled`.
    pub fn run_with_cancel(&self, run: &SimulationRun, cancel: &CancellationToken) -> SimResult<ResultSimulation> {
        self.run_observed(run, cancel, |_| {})
    }

    /// Like `run_with_cancel`, calling `on_day` with each finished row before
    /// the next cancellation check.
    pub fn run_observed<F>(&self, run: &SimulationRun, cancel: &CancellationToken, mut on_day: F) -> SimResult<ResultSimulation>
    where
        F: FnMut(&DailyResult),
    {
        let model = &*self.model;
        let mut registry = model.registry.clone();

        for (initials, &value) in run.initial_state() {
            let id = registry.id_of(initials)?;
            registry.seed(id, value);
        }
        let initial_clamps = registry.take_clamps();
        for clamp in &initial_clamps {
            warn!(variable = %clamp.initials, requested = clamp.requested, stored = clamp.stored, "initial value clamped");
        }

        let target = registry.id_of(&run.perturbation().target)?;
        if registry.variable(target).kind != VariableKind::Exogenous {
            return Err(SimulationError::Config(format!(
                "perturbation target '{}' must be exogenous", run.perturbation().target
            )));
        }

        let base: Vec<(VariableId, f64)> = registry.variables()
            .filter(|(_, v)| v.kind == VariableKind::Exogenous)
            .map(|(id, _)| (id, registry.value_of(id)))
            .collect();

        let sampler = Sampler::new(*run.pdf())?;
        let mut rng = ChaCha8Rng::seed_from_u64(run.random_seed());

        info!(
            seed = run.random_seed(),
            horizon = run.horizon_days(),
            distribution = %run.pdf().distribution_type(),
            "simulation started"
        );

        let mut days = Vec::with_capacity(run.horizon_days());
        let mut diagnostics = RunDiagnostics { initial_clamps, ..Default::default() };
        let mut status = RunStatus::Completed;

        for day in 0..run.horizon_days() {
            if cancel.is_cancelled() {
                warn!(day, "simulation cancelled");
                status = RunStatus::Cancelled;
                break;
            }
            let date = run.start_date()
                .checked_add_days(Days::new(day as u64))
                .unwrap_or(NaiveDate::MAX);

            // 1. Day-indexed exogenous values.
            for &(id, value) in &base {
                let factor = model.profile(id).map_or(1.0, |p| p.factor(day, date));
                registry.write(id, value * factor);
            }

            // 2. Random perturbation.
            let draw = sampler.sample_one(&mut rng);
            registry.write(target, run.perturbation().apply(registry.value_of(target), draw));

            // 3-4. Equations in resolver order.
            let mut day_diag = evaluate_day(&model.plan, &mut registry);

            // 5. Snapshot.
            day_diag.clamps = registry.take_clamps();
            debug!(
                day,
                draw,
                guarded = day_diag.guarded_divisions,
                clamps = day_diag.clamps.len(),
                "day simulated"
            );
            diagnostics.absorb(&day_diag);
            let row = DailyResult {
                day_index: day,
                date,
                values: registry.snapshot().into_iter().collect::<BTreeMap<_, _>>(),
                diagnostics: day_diag,
            };
            on_day(&row);
            days.push(row);
            registry.roll_day();
        }

        info!(
            seed = run.random_seed(),
            rows = days.len(),
            status = ?status,
            guarded_divisions = diagnostics.guarded_divisions,
            clamps = diagnostics.clamps,
            "simulation finished"
        );

        Ok(ResultSimulation {
            random_seed: run.random_seed(),
            status,
            days,
            diagnostics,
            repairs: model.plan.repairs.clone(),
        })
    }
}

/// Evaluates every step once against `registry`, writing each output back
/// (bounds applied at write time so downstream steps read stored values).
pub(crate) fn evaluate_day(plan: &ExecutionPlan, registry: &mut VariableRegistry) -> DayDiagnostics {
    let mut diag = DayDiagnostics::default();
    for step in &plan.steps {
        let mut inputs = Inputs::new();
        let (mut current, mut previous) = (step.current.iter(), step.previous.iter());
        for dep in &step.equation.inputs {
            match dep {
                Dependency::Current(name) => {
                    if let Some(&id) = current.next() {
                        inputs.insert_current(name, registry.value_of(id));
                    }
                }
                Dependency::Previous(name) => {
                    if let Some(&id) = previous.next() {
                        inputs.insert_previous(name, registry.previous_of(id));
                    }
                }
            }
        }

        let mut value = step.equation.evaluate(&inputs);
        diag.guarded_divisions += inputs.guarded_divisions();
        if inputs.undeclared_reads() > 0 {
            diag.undeclared_reads.push(step.equation.output.clone());
        }
        if !value.is_finite() {
            debug!(output = %step.equation.output, value, "non-finite result stored as 0");
            diag.non_finite.push(step.equation.output.clone());
            value = 0.0;
        }
        registry.write(step.output, value);
    }
    diag
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::expr::{var, prev, min, lit};
    use crate::graph::Equation;
    use crate::sampling::PdfSpec;
    use crate::store::Variable;

    /// Demand, production capacity, inventory recurrence and a guarded ratio.
    fn small_model() -> SimulationModel {
        let mut reg = VariableRegistry::new();
        reg.register(Variable::exogenous("DE", "Demand").non_negative()).unwrap();
        reg.register(Variable::exogenous("CPROD", "Capacity").default_value(100.0)).unwrap();
        reg.register(Variable::endogenous("TPP", "Produced").non_negative()).unwrap();
        reg.register(Variable::endogenous("TPV", "Sold").non_negative()).unwrap();
        reg.register(Variable::state("II", "Inventory").non_negative()).unwrap();
        reg.register(Variable::endogenous("FR", "Fill rate")).unwrap();

        let mut g = EquationGraph::new(reg);
        g.add_equation(Equation::new("II", prev("II") + var("TPP") - var("TPV"), "Inventario")).unwrap();
        g.add_equation(Equation::new("TPV", min(var("DE"), prev("II") + var("TPP")), "Ventas")).unwrap();
        g.add_equation(Equation::new("TPP", var("CPROD") * lit(1.0), "Produccion")).unwrap();
        g.add_equation(Equation::new("FR", var("TPV") / var("DE"), "Ventas")).unwrap();
        SimulationModel::build(&g).unwrap()
    }

    fn history() -> Vec<f64> {
        vec![90.0; 30]
    }

    fn run(seed: u64) -> SimulationRun {
        SimulationRun::new(20, seed, PdfSpec::Normal { mean: 90.0, std: 30.0 }, history()).unwrap()
    }

    #[test]
    fn test_run_produces_one_row_per_day() {
        let sim = Simulator::new(small_model());
        let out = sim.run(&run(42)).unwrap();
        assert_eq!(out.len(), 20);
        assert_eq!(out.status, RunStatus::Completed);
        for (i, d) in out.days.iter().enumerate() {
            assert_eq!(d.day_index, i);
            assert!(d.get("TPV").unwrap() <= d.get("DE").unwrap() + 1e-9);
            assert!(d.get("II").unwrap() >= 0.0);
        }
    }

    #[test]
    fn test_state_carries_across_days() {
        let sim = Simulator::new(small_model());
        let out = sim.run(&run(3)).unwrap();
        for w in out.days.windows(2) {
            let expected = w[0].get("II").unwrap() + w[1].get("TPP").unwrap() - w[1].get("TPV").unwrap();
            assert!((w[1].get("II").unwrap() - expected.max(0.0)).abs() < 1e-9);
        }
    }

    #[test]
    fn test_same_seed_is_byte_identical() {
        let sim = Simulator::new(small_model());
        let a = serde_json::to_string(&sim.run(&run(42)).unwrap()).unwrap();
        let b = serde_json::to_string(&sim.run(&run(42)).unwrap()).unwrap();
        assert_eq!(a, b);
        let c = serde_json::to_string(&sim.run(&run(43)).unwrap()).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_zero_demand_guards_division() {
        let sim = Simulator::new(small_model());
        let r = SimulationRun::new(3, 1, PdfSpec::Uniform { min: -2.0, max: -1.0 }, history()).unwrap();
        let out = sim.run(&r).unwrap();
        for d in &out.days {
            assert_eq!(d.get("DE"), Some(0.0));
            assert_eq!(d.get("FR"), Some(0.0));
            assert_eq!(d.diagnostics.guarded_divisions, 1);
            assert!(d.diagnostics.clamps.iter().any(|c| c.initials == "DE"));
        }
        assert_eq!(out.diagnostics.guarded_divisions, 3);
    }

    #[test]
    fn test_cancelled_before_start_returns_no_rows() {
        let sim = Simulator::new(small_model());
        let token = CancellationToken::new();
        token.cancel();
        let out = sim.run_with_cancel(&run(1), &token).unwrap();
        assert_eq!(out.status, RunStatus::Cancelled);
        assert!(out.is_empty());
    }

    #[test]
    fn test_cancelled_mid_run_keeps_finished_days() {
        let sim = Simulator::new(small_model());
        let full = sim.run(&run(9)).unwrap();

        let token = CancellationToken::new();
        let mut seen = Vec::new();
        let out = sim.run_observed(&run(9), &token, |row| {
            seen.push(row.day_index);
            if row.day_index == 4 {
                token.cancel();
            }
        }).unwrap();

        assert_eq!(out.status, RunStatus::Cancelled);
        assert_eq!(out.len(), 5);
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        assert_eq!(out.days[..], full.days[..5]);
    }

    #[test]
    fn test_cancel_from_another_thread() {
        let sim = Simulator::new(small_model());
        let full = sim.run(&run(2)).unwrap();

        let token = CancellationToken::new();
        let (day_tx, day_rx) = std::sync::mpsc::channel();
        let (ack_tx, ack_rx) = std::sync::mpsc::channel();
        let canceller = {
            let token = token.clone();
            std::thread::spawn(move || {
                if day_rx.recv() == Ok(2) {
                    token.cancel();
                }
                let _ = ack_tx.send(());
            })
        };
        let out = sim.run_observed(&run(2), &token, |row| {
            if row.day_index == 2 {
                let _ = day_tx.send(row.day_index);
                let _ = ack_rx.recv();
            }
        }).unwrap();
        canceller.join().unwrap();

        assert_eq!(out.status, RunStatus::Cancelled);
        assert_eq!(out.len(), 3);
        assert_eq!(out.days[..], full.days[..3]);
    }

    #[test]
    fn test_undeclared_read_shows_in_diagnostics() {
        let mut reg = VariableRegistry::new();
        reg.register(Variable::exogenous("DE", "Demand").default_value(80.0)).unwrap();
        reg.register(Variable::exogenous("CPROD", "Capacity").default_value(100.0)).unwrap();
        reg.register(Variable::endogenous("UT", "Utilisation")).unwrap();
        let mut g = EquationGraph::new(reg);
        // Declares DE only, but also reads CPROD.
        g.add_equation(Equation::native("UT", [Dependency::current("DE")], "Produccion", |i| {
            i.div(i.get("DE"), i.get("CPROD"))
        })).unwrap();

        let out = Simulator::new(SimulationModel::build(&g).unwrap()).run(&run(1).with_seed(4)).unwrap();
        for d in &out.days {
            assert_eq!(d.diagnostics.undeclared_reads, vec!["UT".to_string()]);
            assert_eq!(d.get("UT"), Some(0.0));
        }
        assert_eq!(out.diagnostics.undeclared_reads, 20);
    }

    #[test]
    fn test_weekly_profile_scales_capacity() {
        let model = small_model()
            .with_profile("CPROD", DayProfile::Weekly { factors: [1.0, 1.0, 1.0, 1.0, 1.0, 0.5, 0.0] })
            .unwrap();
        let r = run(5).with_start_date(NaiveDate::from_ymd_opt(2024, 1, 6).unwrap());
        let out = Simulator::new(model).run(&r).unwrap();
        assert_eq!(out.days[0].get("CPROD"), Some(50.0));
        assert_eq!(out.days[1].get("CPROD"), Some(0.0));
        assert_eq!(out.days[2].get("CPROD"), Some(100.0));
    }

    #[test]
    fn test_profile_and_target_validation() {
        assert!(matches!(
            small_model().with_profile("II", DayProfile::Constant),
            Err(SimulationError::Config(_))
        ));
        let sim = Simulator::new(small_model());
        let r = run(1).with_perturbation(crate::compute::Perturbation::new("TPP", Default::default()));
        assert!(matches!(sim.run(&r), Err(SimulationError::Config(_))));
        let r = run(1).with_initial_state([("NOPE", 1.0)]);
        assert_eq!(sim.run(&r).unwrap_err(), SimulationError::UnknownVariable("NOPE".into()));
    }
}
