//! dag.rs
//! The equation graph: variable catalog + equations, resolved once into an
//! immutable execution plan.

use super::equation::{Dependency, Equation};
use crate::analysis::repair::{AppliedRepair, SubstitutionRule};
use crate::analysis::topology;
use crate::error::{SimResult, SimulationError};
use crate::store::{VariableId, VariableKind, VariableRegistry};
use smallvec::SmallVec;
use std::collections::HashMap;
use tracing::{debug, warn};

/// An equation whose names have been checked against the registry.
#[derive(Debug, Clone)]
pub(crate) struct BoundEquation {
    pub equation: Equation,
    pub output: VariableId,
    pub current: SmallVec<[VariableId; 4]>,
    pub previous: SmallVec<[VariableId; 4]>,
}

#[derive(Debug, Clone, Default)]
pub struct EquationGraph {
    registry: VariableRegistry,
    equations: Vec<BoundEquation>,
    producer: HashMap<VariableId, usize>,
    rules: Vec<SubstitutionRule>,
}

/// The resolver's output: equations in evaluation order plus any repairs made.
#[derive(Debug, Clone, Default)]
pub struct ExecutionPlan {
    pub(crate) steps: Vec<BoundEquation>,
    pub(crate) parents: Vec<Vec<usize>>,
    pub repairs: Vec<AppliedRepair>,
}

impl ExecutionPlan {
    pub fn len(&self) -> usize { self.steps.len() }
    pub fn is_empty(&self) -> bool { self.steps.is_empty() }

    pub fn equations(&self) -> impl Iterator<Item = &Equation> {
        self.steps.iter().map(|s| &s.equation)
    }

    /// Output initials in evaluation order.
    pub fn order(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.equation.output.as_str()).collect()
    }

    pub fn position(&self, output: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.equation.output == output)
    }
}

impl EquationGraph {
    pub fn new(registry: VariableRegistry) -> Self {
        Self { registry, ..Default::default() }
    }

    pub fn registry(&self) -> &VariableRegistry { &self.registry }

    pub fn equation_count(&self) -> usize { self.equations.len() }

    pub fn equations(&self) -> impl Iterator<Item = &Equation> {
        self.equations.iter().map(|b| &b.equation)
    }

    /// Adds an equation. Every name it references must already be registered.
    pub fn add_equation(&mut self, equation: Equation) -> SimResult<()> {
        let bound = bind(&self.registry, equation)?;
        if self.producer.contains_key(&bound.output) {
            return Err(SimulationError::DuplicateEquation { output: bound.equation.output });
        }
        debug!(equation = %bound.equation, area = %bound.equation.area, "equation added");
        self.producer.insert(bound.output, self.equations.len());
        self.equations.push(bound);
        Ok(())
    }

    /// Registers a repair for a known circular shape. The rule is only used
    /// when `resolve` flags a cycle it matches.
    pub fn add_substitution_rule(&mut self, rule: SubstitutionRule) -> SimResult<()> {
        self.registry.id_of(&rule.output)?;
        self.registry.id_of(&rule.offending_input)?;
        for dep in rule.replacement.dependencies() {
            self.registry.id_of(dep.initials())?;
        }
        self.rules.push(rule);
        Ok(())
    }

    /// Orders the equations so every same-day input is computed before it is
    /// read. Cycles are repaired only through registered rules; anything else
    /// fails with `CircularDependency`.
    pub fn resolve(&self) -> SimResult<ExecutionPlan> {
        let mut equations = self.equations.clone();
        let mut used = vec![false; self.rules.len()];
        let mut repairs = Vec::new();

        loop {
            self.check_producers(&equations)?;
            let parents = self.same_day_parents(&equations);
            let cycle = match topology::sort(&parents) {
                Ok(order) => {
                    // Re-index parents into plan positions.
                    let mut position = vec![0; order.len()];
                    for (pos, &i) in order.iter().enumerate() {
                        position[i] = pos;
                    }
                    let plan_parents = order.iter()
                        .map(|&i| parents[i].iter().map(|&p| position[p]).collect())
                        .collect();
                    let steps = order.into_iter().map(|i| equations[i].clone()).collect();
                    return Ok(ExecutionPlan { steps, parents: plan_parents, repairs });
                }
                Err(cycle) => cycle,
            };

            let members: Vec<String> = cycle.iter()
                .map(|&i| equations[i].equation.output.clone())
                .collect();

            let candidate = self.rules.iter().enumerate()
                .filter(|(r, _)| !used[*r])
                .find_map(|(r, rule)| {
                    let idx = *self.producer.get(&self.registry.id_of(&rule.output).ok()?)?;
                    rule.matches(&equations[idx].equation, &members).then_some((r, idx, rule))
                });

            let Some((r, idx, rule)) = candidate else {
                return Err(SimulationError::CircularDependency { members });
            };
            let Some((rewritten, repair)) = rule.apply(&equations[idx].equation) else {
                return Err(SimulationError::CircularDependency { members });
            };

            warn!(
                output = %repair.output,
                before = %repair.before,
                after = %repair.after,
                cycle = ?members,
                "circular equation repaired by substitution rule"
            );
            equations[idx] = bind(&self.registry, rewritten)?;
            repairs.push(repair);
            used[r] = true;
        }
    }

    /// A same-day read of an Endogenous variable needs an equation that
    /// writes it that day; without one the reader would see a stale default.
    fn check_producers(&self, equations: &[BoundEquation]) -> SimResult<()> {
        for eq in equations {
            for &id in &eq.current {
                let input = self.registry.variable(id);
                if input.kind == VariableKind::Endogenous && !self.producer.contains_key(&id) {
                    return Err(SimulationError::InvalidEquation {
                        output: eq.equation.output.clone(),
                        reason: format!("reads endogenous '{}', which no equation produces", input.initials),
                    });
                }
            }
        }
        Ok(())
    }

    /// For every equation, the equations producing its same-day inputs.
    /// A State equation's read of its own output is a cross-step carry and
    /// produces no edge; any other self-read is a one-node cycle.
    fn same_day_parents(&self, equations: &[BoundEquation]) -> Vec<Vec<usize>> {
        equations.iter().map(|eq| {
            let own_state = self.registry.variable(eq.output).kind == VariableKind::State;
            let mut ps: Vec<usize> = eq.current.iter()
                .filter(|&&id| !(id == eq.output && own_state))
                .filter_map(|id| self.producer.get(id).copied())
                .collect();
            ps.sort_unstable();
            ps.dedup();
            ps
        }).collect()
    }
}

fn bind(registry: &VariableRegistry, equation: Equation) -> SimResult<BoundEquation> {
    let output = registry.id_of(&equation.output)?;
    if registry.variable(output).kind == VariableKind::Exogenous {
        return Err(SimulationError::InvalidEquation {
            output: equation.output,
            reason: "exogenous variables are inputs and cannot be an equation output".into(),
        });
    }

    let mut current = SmallVec::new();
    let mut previous = SmallVec::new();
    for dep in &equation.inputs {
        let id = registry.id_of(dep.initials())?;
        match dep {
            Dependency::Current(_) => current.push(id),
            Dependency::Previous(_) => previous.push(id),
        }
    }
    Ok(BoundEquation { equation, output, current, previous })
}
