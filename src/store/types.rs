use serde::{Serialize, Deserialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct VariableId(pub u32);

impl VariableId {
    #[inline(always)]
    pub fn index(&self) -> usize { self.0 as usize }
    pub fn new(idx: usize) -> Self { Self(idx as u32) }
}

/// How a variable's value comes to be on a simulated day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableKind {
    /// Fixed per run; may vary by day through a `DayProfile` or the daily perturbation.
    Exogenous,
    /// Carried from one day to the next (inventory, cumulative totals).
    State,
    /// Recomputed every day from other variables.
    Endogenous,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Unit(pub String);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    /// Unique key used by equations (e.g. "TPV").
    pub initials: String,
    pub name: String,
    pub kind: VariableKind,
    pub unit: Option<Unit>,
    pub default_value: f64,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    /// Floors the value at zero after every write.
    #[serde(default)]
    pub non_negative: bool,
}

impl Variable {
    pub fn new(initials: impl Into<String>, name: impl Into<String>, kind: VariableKind) -> Self {
        Self {
            initials: initials.into(),
            name: name.into(),
            kind,
            unit: None,
            default_value: 0.0,
            min_value: None,
            max_value: None,
            non_negative: false,
        }
    }

    pub fn exogenous(initials: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(initials, name, VariableKind::Exogenous)
    }

    pub fn state(initials: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(initials, name, VariableKind::State)
    }

    pub fn endogenous(initials: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(initials, name, VariableKind::Endogenous)
    }

    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(Unit(unit.into()));
        self
    }

    pub fn default_value(mut self, value: f64) -> Self {
        self.default_value = value;
        self
    }

    pub fn bounds(mut self, min: f64, max: f64) -> Self {
        self.min_value = Some(min);
        self.max_value = Some(max);
        self
    }

    pub fn non_negative(mut self) -> Self {
        self.non_negative = true;
        self
    }

    pub fn is_state(&self) -> bool { self.kind == VariableKind::State }

    /// Applies the two-sided bound (only when both ends are declared) and the
    /// non-negativity floor. Returns the stored value.
    pub fn constrain(&self, value: f64) -> f64 {
        let mut v = value;
        if let (Some(min), Some(max)) = (self.min_value, self.max_value) {
            v = v.clamp(min, max);
        }
        if self.non_negative && v < 0.0 {
            v = 0.0;
        }
        v
    }
}

/// Records a write whose value was altered by bounds or the non-negativity floor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClampEvent {
    pub initials: String,
    pub requested: f64,
    pub stored: f64,
}
