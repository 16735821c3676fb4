//! The canonical dairy plant model.
//!
//! Variable initials follow the plant's own vocabulary:
//!
//! | Initials | Meaning | Kind |
//! |---|---|---|
//! | DE | expected demand (L/day) | exogenous, perturbed daily |
//! | PVP | sale price per litre, 12..20 | exogenous |
//! | CPROD | daily production capacity | exogenous |
//! | NEPP | production employees | exogenous |
//! | SE | daily wage per employee | exogenous |
//! | CUIP | input cost per litre produced | exogenous |
//! | GG | daily overhead | exogenous |
//! | CMI | inventory holding cost per litre | exogenous |
//! | II | closing inventory | state |
//! | DAC | cumulative demand | state |
//! | GAC | cumulative profit | state |
//! | TPP | litres produced | endogenous |
//! | OD | supply available for sale | endogenous |
//! | TPV | litres sold | endogenous |
//! | DI | unmet demand | endogenous |
//! | NSC | service level | endogenous |
//! | IT | revenue | endogenous |
//! | CTP | production cost | endogenous |
//! | CNOM | payroll | endogenous |
//! | CAI | holding cost | endogenous |
//! | GT | total cost | endogenous |
//! | GO | operating profit | endogenous |
//! | RR | margin (GO / IT) | endogenous |
//! | CPP | average cost per litre | endogenous |
//! | PE | output per employee | endogenous |
//!
//! Older equation sheets define supply as `OD = II + TPP`, reading today's
//! closing inventory, which closes the loop `II -> OD -> TPV -> II`. The
//! `legacy_graph` keeps that sheet and registers the rule that rewrites it to
//! yesterday's inventory, which is the form `graph` uses directly.

use crate::analysis::repair::SubstitutionRule;
use crate::compute::{DayProfile, SimulationModel};
use crate::error::SimResult;
use crate::graph::expr::{lit, max, min, prev, var};
use crate::graph::{Equation, EquationGraph};
use crate::store::{Variable, VariableRegistry};

pub fn registry() -> SimResult<VariableRegistry> {
    let mut reg = VariableRegistry::new();
    let vars = [
        Variable::exogenous("DE", "Demanda esperada").unit("L").default_value(2500.0).non_negative(),
        Variable::exogenous("PVP", "Precio de venta").unit("$/L").default_value(15.0).bounds(12.0, 20.0),
        Variable::exogenous("CPROD", "Capacidad de produccion").unit("L").default_value(3000.0).non_negative(),
        Variable::exogenous("NEPP", "Empleados de produccion").default_value(12.0).non_negative(),
        Variable::exogenous("SE", "Sueldo diario por empleado").unit("$").default_value(150.0),
        Variable::exogenous("CUIP", "Costo de insumos por litro").unit("$/L").default_value(6.5),
        Variable::exogenous("GG", "Gastos generales").unit("$").default_value(4000.0),
        Variable::exogenous("CMI", "Costo de mantener inventario").unit("$/L").default_value(0.2),
        Variable::state("II", "Inventario final").unit("L").non_negative(),
        Variable::state("DAC", "Demanda acumulada").unit("L").non_negative(),
        Variable::state("GAC", "Ganancia acumulada").unit("$"),
        Variable::endogenous("TPP", "Total producido").unit("L").non_negative(),
        Variable::endogenous("OD", "Oferta disponible").unit("L").non_negative(),
        Variable::endogenous("TPV", "Total vendido").unit("L").non_negative(),
        Variable::endogenous("DI", "Demanda insatisfecha").unit("L").non_negative(),
        Variable::endogenous("NSC", "Nivel de servicio").bounds(0.0, 1.0),
        Variable::endogenous("IT", "Ingresos totales").unit("$").non_negative(),
        Variable::endogenous("CTP", "Costo de produccion").unit("$").non_negative(),
        Variable::endogenous("CNOM", "Costo de nomina").unit("$").non_negative(),
        Variable::endogenous("CAI", "Costo de inventario").unit("$").non_negative(),
        Variable::endogenous("GT", "Gastos totales").unit("$").non_negative(),
        Variable::endogenous("GO", "Ganancia operativa").unit("$"),
        Variable::endogenous("RR", "Rentabilidad"),
        Variable::endogenous("CPP", "Costo promedio por litro").unit("$/L").non_negative(),
        Variable::endogenous("PE", "Productividad por empleado").unit("L").non_negative(),
    ];
    for v in vars {
        reg.register(v)?;
    }
    Ok(reg)
}

/// Everything except the supply equation, which differs between sheets.
fn common_equations() -> Vec<Equation> {
    vec![
        // Produce what demand needs beyond yesterday's stock, up to capacity.
        Equation::new("TPP", min(var("CPROD"), max(var("DE") - prev("II"), lit(0.0))), "Produccion"),
        Equation::new("TPV", min(var("DE"), var("OD")), "Ventas"),
        Equation::new("DI", var("DE") - var("TPV"), "Ventas"),
        Equation::new("NSC", var("TPV") / var("DE"), "Ventas"),
        Equation::new("II", var("OD") - var("TPV"), "Inventario"),
        // State self-read: yesterday's total carried into today.
        Equation::new("DAC", var("DAC") + var("DE"), "Ventas"),
        Equation::new("IT", var("TPV") * var("PVP"), "Contabilidad"),
        Equation::new("CTP", var("TPP") * var("CUIP"), "Produccion"),
        Equation::new("CNOM", var("NEPP") * var("SE"), "Recursos Humanos"),
        Equation::new("CAI", var("II") * var("CMI"), "Inventario"),
        Equation::new("GT", var("CTP") + var("CNOM") + var("CAI") + var("GG"), "Contabilidad"),
        Equation::new("GO", var("IT") - var("GT"), "Contabilidad"),
        Equation::new("GAC", prev("GAC") + var("GO"), "Contabilidad"),
        Equation::new("RR", var("GO") / var("IT"), "Contabilidad"),
        Equation::new("CPP", var("GT") / var("TPP"), "Produccion"),
        Equation::new("PE", var("TPP") / var("NEPP"), "Recursos Humanos"),
    ]
}

/// The cycle-free equation set.
pub fn graph() -> SimResult<EquationGraph> {
    let mut g = EquationGraph::new(registry()?);
    g.add_equation(Equation::new("OD", prev("II") + var("TPP"), "Inventario"))?;
    for eq in common_equations() {
        g.add_equation(eq)?;
    }
    Ok(g)
}

/// Rules for circular shapes found in older equation sheets.
pub fn repair_rules() -> Vec<SubstitutionRule> {
    vec![SubstitutionRule::new(
        "OD",
        "II",
        prev("II"),
        "supply is built from the previous day's closing inventory",
    )]
}

/// The older sheet: `OD = II + TPP` plus the rules that make it resolvable.
pub fn legacy_graph() -> SimResult<EquationGraph> {
    let mut g = EquationGraph::new(registry()?);
    g.add_equation(Equation::new("OD", var("II") + var("TPP"), "Inventario"))?;
    for eq in common_equations() {
        g.add_equation(eq)?;
    }
    for rule in repair_rules() {
        g.add_substitution_rule(rule)?;
    }
    Ok(g)
}

pub fn model() -> SimResult<SimulationModel> {
    SimulationModel::build(&graph()?)
}

/// Lower weekend throughput for plants that run short shifts on Saturday and Sunday.
pub fn weekend_capacity() -> DayProfile {
    DayProfile::Weekly { factors: [1.0, 1.0, 1.0, 1.0, 1.0, 0.8, 0.6] }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::{SimulationRun, Simulator};
    use crate::error::SimulationError;
    use crate::sampling::PdfSpec;
    use crate::validation::{TestMethod, Validator};

    /// 30 values with mean exactly 2500 and sample std 250.
    fn history() -> Vec<f64> {
        let raw: Vec<f64> = (0..30).map(|i| ((i * 7919) % 30) as f64 - 14.5).collect();
        let n = raw.len() as f64;
        let m = raw.iter().sum::<f64>() / n;
        let s = (raw.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (n - 1.0)).sqrt();
        raw.iter().map(|x| 2500.0 + 250.0 * (x - m) / s).collect()
    }

    fn scenario(seed: u64) -> SimulationRun {
        SimulationRun::new(30, seed, PdfSpec::Normal { mean: 2500.0, std: 250.0 }, history()).unwrap()
    }

    #[test]
    fn test_history_fixture() {
        let h = history();
        let m = h.iter().sum::<f64>() / 30.0;
        assert!((m - 2500.0).abs() < 1e-9);
    }

    #[test]
    fn test_canonical_plan_resolves_without_repairs() {
        let model = model().unwrap();
        let plan = model.plan();
        assert_eq!(plan.len(), 17);
        assert!(plan.repairs.is_empty());
        let pos = |o: &str| plan.position(o).unwrap();
        assert!(pos("TPP") < pos("OD"));
        assert!(pos("OD") < pos("TPV"));
        assert!(pos("TPV") < pos("II"));
        assert!(pos("II") < pos("CAI"));
        assert!(pos("GT") < pos("CPP"));
    }

    #[test]
    fn test_legacy_sheet_is_repaired() {
        let legacy = legacy_graph().unwrap().resolve().unwrap();
        assert_eq!(legacy.repairs.len(), 1);
        assert_eq!(legacy.repairs[0].before, "OD = (II + TPP)");
        assert_eq!(legacy.repairs[0].after, "OD = (II.prev + TPP)");
        assert_eq!(legacy.order(), model().unwrap().plan().order());
    }

    #[test]
    fn test_legacy_sheet_without_rules_is_circular() {
        let mut g = EquationGraph::new(registry().unwrap());
        g.add_equation(Equation::new("OD", var("II") + var("TPP"), "Inventario")).unwrap();
        for eq in common_equations() {
            g.add_equation(eq).unwrap();
        }
        match g.resolve() {
            Err(SimulationError::CircularDependency { members }) => {
                assert!(members.contains(&"OD".to_string()));
                assert!(members.contains(&"II".to_string()));
            }
            other => panic!("expected a cycle, got {:?}", other.map(|p| p.order().len())),
        }
    }

    #[test]
    fn test_end_to_end_scenario() {
        let sim = Simulator::new(model().unwrap());
        let run = scenario(42);
        let out = sim.run(&run).unwrap();

        assert_eq!(out.len(), 30);
        for day in &out.days {
            assert!(day.get("TPV").unwrap() <= day.get("DE").unwrap());
            for key in ["II", "TPP", "DE", "TPV", "DI"] {
                assert!(day.get(key).unwrap() >= 0.0, "{} negative on day {}", key, day.day_index);
            }
        }

        let report = Validator::default().validate_run(run.historical_demand(), &out, &Default::default()).unwrap();
        assert_eq!(report.fit.method, TestMethod::ShapiroWilk);
        assert!((0.0..=1.0).contains(&report.fit.p_value));
        assert!(report.kpis.service_level.is_some());
    }

    #[test]
    fn test_identical_seed_identical_rows() {
        let sim = Simulator::new(model().unwrap());
        let a = sim.run(&scenario(42)).unwrap();
        let b = sim.run(&scenario(42)).unwrap();
        assert_eq!(serde_json::to_vec(&a).unwrap(), serde_json::to_vec(&b).unwrap());
    }

    #[test]
    fn test_accounting_identities_hold_each_day() {
        let out = Simulator::new(model().unwrap()).run(&scenario(7)).unwrap();
        let mut profit = 0.0;
        let mut demand = 0.0;
        for d in &out.days {
            let v = |k: &str| d.get(k).unwrap();
            assert!((v("GO") - (v("IT") - v("GT"))).abs() < 1e-6);
            assert!((v("DI") - (v("DE") - v("TPV"))).abs() < 1e-9);
            profit += v("GO");
            demand += v("DE");
            assert!((v("GAC") - profit).abs() < 1e-6);
            assert!((v("DAC") - demand).abs() < 1e-6);
        }
    }

    #[test]
    fn test_price_bounds_apply_to_initial_state() {
        let run = scenario(1).with_initial_state([("PVP", 25.0)]);
        let out = Simulator::new(model().unwrap()).run(&run).unwrap();
        assert!(out.days.iter().all(|d| d.get("PVP") == Some(20.0)));
        assert_eq!(out.diagnostics.initial_clamps.len(), 1);
    }

    #[test]
    fn test_no_production_guards_cost_per_unit() {
        let run = scenario(1).with_initial_state([("CPROD", 0.0)]);
        let out = Simulator::new(model().unwrap()).run(&run).unwrap();
        for d in &out.days {
            assert_eq!(d.get("TPP"), Some(0.0));
            assert_eq!(d.get("CPP"), Some(0.0));
            assert_eq!(d.get("PE"), Some(0.0));
        }
        assert!(out.diagnostics.guarded_divisions >= 30);
    }
}
