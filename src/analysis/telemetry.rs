use crate::compute::SimulationModel;
use crate::store::VariableKind;
use super::topology;
use serde::{Serialize, Deserialize};
use std::collections::BTreeMap;

/// Structural summary of a resolved model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelReport {
    pub total_equations: usize,
    pub equations_by_area: BTreeMap<String, usize>,
    pub variables_by_kind: BTreeMap<String, usize>,
    /// Number of equations on the longest same-day dependency chain.
    pub max_depth: usize,
    /// Outputs along that chain, upstream first.
    pub critical_path: Vec<String>,
    /// Inputs read as yesterday's value (including state carries).
    pub previous_day_reads: usize,
    pub repairs_applied: usize,
}

impl ModelReport {
    pub fn analyze(model: &SimulationModel) -> Self {
        let plan = model.plan();
        let mut equations_by_area = BTreeMap::new();
        let mut previous_day_reads = 0;
        for step in &plan.steps {
            *equations_by_area.entry(step.equation.area.clone()).or_insert(0) += 1;
            previous_day_reads += step.previous.len();
            // State equation reading its own output as today's value.
            previous_day_reads += step.current.iter().filter(|&&id| id == step.output).count();
        }

        let mut variables_by_kind = BTreeMap::new();
        for (_, var) in model.registry().variables() {
            let kind = match var.kind {
                VariableKind::Exogenous => "exogenous",
                VariableKind::State => "state",
                VariableKind::Endogenous => "endogenous",
            };
            *variables_by_kind.entry(kind.to_string()).or_insert(0) += 1;
        }

        // Plan positions are already a topological order.
        let order: Vec<usize> = (0..plan.len()).collect();
        let depths = topology::depths(&plan.parents, &order);
        let critical_path = Self::longest_chain(&plan.parents, &depths)
            .into_iter()
            .map(|i| plan.steps[i].equation.output.clone())
            .collect::<Vec<_>>();

        Self {
            total_equations: plan.len(),
            equations_by_area,
            variables_by_kind,
            max_depth: critical_path.len(),
            critical_path,
            previous_day_reads,
            repairs_applied: plan.repairs.len(),
        }
    }

    fn longest_chain(parents: &[Vec<usize>], depths: &[usize]) -> Vec<usize> {
        // Deepest node, first in plan order on ties.
        let Some(mut node) = (0..depths.len()).fold(None, |best: Option<usize>, i| match best {
            Some(b) if depths[b] >= depths[i] => Some(b),
            _ => Some(i),
        }) else {
            return Vec::new();
        };

        let mut chain = vec![node];
        while let Some(&p) = parents[node].iter().find(|&&p| depths[p] + 1 == depths[node]) {
            chain.push(p);
            node = p;
        }
        chain.reverse();
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::dairy;

    #[test]
    fn test_dairy_report() {
        let report = ModelReport::analyze(&dairy::model().unwrap());
        assert_eq!(report.total_equations, 17);
        assert_eq!(report.equations_by_area.values().sum::<usize>(), 17);
        assert_eq!(report.equations_by_area.get("Contabilidad"), Some(&5));
        assert_eq!(report.variables_by_kind.get("state"), Some(&3));
        assert_eq!(report.variables_by_kind.get("exogenous"), Some(&8));
        assert_eq!(report.repairs_applied, 0);
        // TPP -> OD -> TPV -> II -> CAI -> GT -> GO -> GAC
        assert_eq!(report.critical_path, vec!["TPP", "OD", "TPV", "II", "CAI", "GT", "GO", "GAC"]);
        assert_eq!(report.max_depth, 8);
        // TPP, OD and GAC read yesterday's II / GAC; DAC carries itself.
        assert_eq!(report.previous_day_reads, 4);
    }

    #[test]
    fn test_legacy_report_counts_repair() {
        let model = SimulationModel::build(&dairy::legacy_graph().unwrap()).unwrap();
        assert_eq!(ModelReport::analyze(&model).repairs_applied, 1);
    }
}
