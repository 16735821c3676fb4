use crate::compute::{ResultSimulation, SimulationModel};
use crate::graph::{Dependency, Equation};
use crate::store::VariableKind;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;

/// Renders the dependency tree behind one variable on one simulated day,
/// with the stored value of every node.
pub fn format_trace(
    model: &SimulationModel,
    result: &ResultSimulation,
    day_index: usize,
    initials: &str,
) -> String {
    let mut output = String::new();
    let Some(day) = result.days.get(day_index) else {
        let _ = writeln!(output, "Error: day {} is not part of the result ({} rows)", day_index, result.len());
        return output;
    };
    if !model.registry().contains(initials) {
        let _ = writeln!(output, "Error: Unknown variable '{}'", initials);
        return output;
    }

    let previous = day_index.checked_sub(1).and_then(|i| result.days.get(i)).map(|d| &d.values);
    let mut tracer = Tracer {
        model,
        values: &day.values,
        previous,
        visited_at_level: HashMap::new(),
        output,
    };

    let _ = writeln!(tracer.output, "AUDIT TRACE for '{}' on day {} ({}):", initials, day_index, day.date);
    let _ = writeln!(tracer.output, "--------------------------------------------------");
    tracer.trace_variable(initials, 1, "");
    tracer.output
}

struct Tracer<'a> {
    model: &'a SimulationModel,
    values: &'a BTreeMap<String, f64>,
    previous: Option<&'a BTreeMap<String, f64>>,
    visited_at_level: HashMap<String, usize>,
    output: String,
}

impl<'a> Tracer<'a> {
    fn trace_variable(&mut self, initials: &str, level: usize, prefix: &str) {
        if let Some(&first_seen) = self.visited_at_level.get(initials) {
            let _ = writeln!(self.output, "{}-> {} (Ref to L{})", prefix, initials, first_seen);
            return;
        }
        self.visited_at_level.insert(initials.to_string(), level);

        let header = format!("[L{}] {}{}", level, initials, format_value(self.values.get(initials)));
        match self.equation_for(initials) {
            Some(eq) => {
                let kind = self.kind_of(initials);
                let tag = if kind == Some(VariableKind::State) { " (state)" } else { "" };
                let full = eq.to_string();
                let rhs = full.split_once(" = ").map_or(full.as_str(), |(_, rhs)| rhs);
                let _ = writeln!(self.output, "{}{} = {}{}", prefix, header, rhs, tag);
                self.recurse_inputs(prefix, eq, level);
            }
            None => {
                let _ = writeln!(self.output, "{}{} -> Exogenous", prefix, header);
            }
        }
    }

    fn recurse_inputs(&mut self, prefix: &str, eq: &'a Equation, level: usize) {
        let stem = build_child_stem(prefix);
        let count = eq.inputs.len();
        for (i, dep) in eq.inputs.iter().enumerate() {
            let connector = if i == count - 1 { "`--" } else { "|--" };
            let full_prefix = format!("{}{}", stem, connector);
            match dep {
                Dependency::Previous(name) => {
                    let value = self.previous.and_then(|p| p.get(name));
                    let _ = writeln!(
                        self.output,
                        "{}[L{}] {}.prev{} (previous day)",
                        full_prefix, level + 1, name, format_value(value)
                    );
                }
                Dependency::Current(name) if *name == eq.output => {
                    // A state equation reading its own output gets yesterday's value.
                    let value = self.previous.and_then(|p| p.get(name));
                    let _ = writeln!(
                        self.output,
                        "{}[L{}] {}{} (carried from previous day)",
                        full_prefix, level + 1, name, format_value(value)
                    );
                }
                Dependency::Current(name) => self.trace_variable(name, level + 1, &full_prefix),
            }
        }
    }

    fn equation_for(&self, initials: &str) -> Option<&'a Equation> {
        self.model.plan().equations().find(|e| e.output == initials)
    }

    fn kind_of(&self, initials: &str) -> Option<VariableKind> {
        self.model.registry().get(initials).ok().map(|v| v.kind)
    }
}

fn format_value(value: Option<&f64>) -> String {
    match value {
        Some(v) => format!("[{:.3}]", v),
        None => "[?]".to_string(),
    }
}

fn build_child_stem(current_prefix: &str) -> String {
    current_prefix.replace("`--", "   ").replace("|--", "|  ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::{SimulationRun, Simulator};
    use crate::model::dairy;
    use crate::sampling::PdfSpec;

    fn simulate() -> (Simulator, ResultSimulation) {
        let sim = Simulator::new(dairy::model().unwrap());
        let run = SimulationRun::new(5, 42, PdfSpec::Normal { mean: 2500.0, std: 250.0 }, vec![2500.0; 30]).unwrap();
        let result = sim.run(&run).unwrap();
        (sim, result)
    }

    #[test]
    fn test_trace_sales_tree() {
        let (sim, result) = simulate();
        let out = format_trace(sim.model(), &result, 2, "TPV");
        let lines: Vec<&str> = out.lines().collect();

        assert!(lines[0].starts_with("AUDIT TRACE for 'TPV' on day 2 (1970-01-03)"));
        assert!(lines[2].starts_with("[L1] TPV["));
        assert!(lines[2].ends_with("= min(DE, OD)"));
        assert!(out.contains("|--[L2] DE["));
        assert!(out.contains("-> Exogenous"));
        assert!(out.contains("II.prev["));
        assert!(out.contains("(previous day)"));
    }

    #[test]
    fn test_trace_marks_state_carry() {
        let (sim, result) = simulate();
        let out = format_trace(sim.model(), &result, 1, "DAC");
        let expected = format!("DAC[{:.3}] (carried from previous day)", result.days[0].get("DAC").unwrap());
        assert!(out.contains("(state)"));
        assert!(out.contains(&expected), "{}", out);
    }

    #[test]
    fn test_trace_repeated_nodes_are_references() {
        let (sim, result) = simulate();
        let out = format_trace(sim.model(), &result, 1, "GO");
        // TPP feeds both CTP and (through OD) IT.
        assert!(out.contains("(Ref to L"));
    }

    #[test]
    fn test_trace_errors() {
        let (sim, result) = simulate();
        assert!(format_trace(sim.model(), &result, 99, "TPV").starts_with("Error: day 99"));
        assert!(format_trace(sim.model(), &result, 0, "XX").starts_with("Error: Unknown variable 'XX'"));
        let first_day = format_trace(sim.model(), &result, 0, "OD");
        assert!(first_day.contains("II.prev[?]"));
    }
}
