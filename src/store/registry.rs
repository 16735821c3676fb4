use super::types::*;
use crate::error::{SimResult, SimulationError};
use serde::{Serialize, Deserialize};
use std::collections::HashMap;
use tracing::warn;

/// Catalog of variables plus their current and previous-day values.
///
/// A model keeps one registry as a template; every run works on its own clone,
/// so runs never share mutable values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VariableRegistry {
    // Columnar Arrays
    pub(crate) variables: Vec<Variable>,
    pub(crate) values: Vec<f64>,
    pub(crate) previous: Vec<f64>,

    // Clamps recorded since the last `take_clamps` call.
    #[serde(skip)]
    clamps: Vec<ClampEvent>,

    // Ephemeral lookup (Not serialized, rebuilt on load)
    #[serde(skip)]
    by_initials: HashMap<String, VariableId>,
}

impl VariableRegistry {
    pub fn new() -> Self { Self::default() }
    pub fn count(&self) -> usize { self.variables.len() }

    /// Rebuilds the initials lookup after deserialization.
    pub fn rebuild_index(&mut self) {
        self.by_initials = self.variables.iter().enumerate()
            .map(|(i, v)| (v.initials.clone(), VariableId::new(i)))
            .collect();
    }

    pub fn register(&mut self, variable: Variable) -> SimResult<VariableId> {
        if self.by_initials.contains_key(&variable.initials) {
            return Err(SimulationError::DuplicateVariable(variable.initials));
        }
        if let (Some(min), Some(max)) = (variable.min_value, variable.max_value) {
            if !(min <= max) {
                return Err(SimulationError::Config(format!(
                    "Variable '{}' has min_value {} above max_value {}", variable.initials, min, max
                )));
            }
        }

        let id = VariableId::new(self.variables.len());
        let start = variable.constrain(variable.default_value);
        self.by_initials.insert(variable.initials.clone(), id);
        self.values.push(start);
        self.previous.push(start);
        self.variables.push(variable);
        Ok(id)
    }

    pub fn id_of(&self, initials: &str) -> SimResult<VariableId> {
        self.by_initials.get(initials).copied()
            .ok_or_else(|| SimulationError::UnknownVariable(initials.to_string()))
    }

    pub fn contains(&self, initials: &str) -> bool { self.by_initials.contains_key(initials) }

    pub fn get(&self, initials: &str) -> SimResult<&Variable> {
        self.id_of(initials).map(|id| &self.variables[id.index()])
    }

    #[inline(always)]
    pub fn variable(&self, id: VariableId) -> &Variable { &self.variables[id.index()] }

    pub fn variables(&self) -> impl Iterator<Item = (VariableId, &Variable)> {
        self.variables.iter().enumerate().map(|(i, v)| (VariableId::new(i), v))
    }

    pub fn value(&self, initials: &str) -> SimResult<f64> {
        self.id_of(initials).map(|id| self.values[id.index()])
    }

    /// Stores `value`, clamped to the variable's bounds. The clamp is logged and
    /// recorded; the stored value is returned.
    pub fn set_value(&mut self, initials: &str, value: f64) -> SimResult<f64> {
        let id = self.id_of(initials)?;
        let stored = self.write(id, value);
        if stored != value {
            warn!(variable = initials, requested = value, stored, "value clamped to bounds");
        }
        Ok(stored)
    }

    #[inline(always)]
    pub fn value_of(&self, id: VariableId) -> f64 { self.values[id.index()] }

    #[inline(always)]
    pub fn previous_of(&self, id: VariableId) -> f64 { self.previous[id.index()] }

    /// Hot-path write used by the simulation loop. Same clamping as `set_value`
    /// without the per-call warning; events are still recorded.
    pub(crate) fn write(&mut self, id: VariableId, value: f64) -> f64 {
        let var = &self.variables[id.index()];
        let stored = var.constrain(value);
        if stored != value {
            self.clamps.push(ClampEvent { initials: var.initials.clone(), requested: value, stored });
        }
        self.values[id.index()] = stored;
        stored
    }

    /// Seeds both the current and the previous-day slot (run start).
    pub(crate) fn seed(&mut self, id: VariableId, value: f64) -> f64 {
        let stored = self.write(id, value);
        self.previous[id.index()] = stored;
        stored
    }

    /// Today's values become tomorrow's "previous".
    pub(crate) fn roll_day(&mut self) {
        self.previous.copy_from_slice(&self.values);
    }

    pub fn take_clamps(&mut self) -> Vec<ClampEvent> {
        std::mem::take(&mut self.clamps)
    }

    pub fn snapshot(&self) -> Vec<(String, f64)> {
        self.variables.iter().zip(&self.values).map(|(v, &x)| (v.initials.clone(), x)).collect()
    }
}
