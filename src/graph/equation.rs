//! Defines the `Equation`: one output variable, its inputs, and a pure
//! evaluation function over an explicit input map.

use super::expr::{Expr, Inputs};
use serde::{Serialize, Deserialize};
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// How an equation reads one of its inputs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dependency {
    /// Today's value. Creates an ordering edge producer -> consumer.
    Current(String),
    /// Yesterday's stored value. Resolved across steps, never within one.
    Previous(String),
}

impl Dependency {
    pub fn current(initials: &str) -> Self { Self::Current(initials.to_string()) }
    pub fn previous(initials: &str) -> Self { Self::Previous(initials.to_string()) }

    pub fn initials(&self) -> &str {
        match self {
            Dependency::Current(s) | Dependency::Previous(s) => s,
        }
    }

    pub fn is_current(&self) -> bool { matches!(self, Dependency::Current(_)) }
}

pub type NativeFn = Arc<dyn Fn(&Inputs) -> f64 + Send + Sync>;

/// The right-hand side of an equation.
#[derive(Clone)]
pub enum Formula {
    Expr(Expr),
    /// Hand-written evaluation; inputs are declared alongside.
    Native(NativeFn),
}

impl fmt::Debug for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Formula::Expr(e) => write!(f, "Expr({})", e),
            Formula::Native(_) => write!(f, "Native(<fn>)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Equation {
    pub output: String,
    /// Ordered, duplicate-free.
    pub inputs: SmallVec<[Dependency; 4]>,
    pub formula: Formula,
    /// Functional domain tag, e.g. "Ventas", "Producción", "Contabilidad".
    pub area: String,
}

impl Equation {
    /// Builds an equation from an expression; inputs are derived from the tree.
    pub fn new(output: &str, expr: Expr, area: &str) -> Self {
        Self {
            output: output.to_string(),
            inputs: expr.dependencies().into_iter().collect(),
            formula: Formula::Expr(expr),
            area: area.to_string(),
        }
    }

    pub fn native<F>(output: &str, inputs: impl IntoIterator<Item = Dependency>, area: &str, f: F) -> Self
    where
        F: Fn(&Inputs) -> f64 + Send + Sync + 'static,
    {
        let mut deps: SmallVec<[Dependency; 4]> = SmallVec::new();
        for dep in inputs {
            if !deps.contains(&dep) {
                deps.push(dep);
            }
        }
        Self {
            output: output.to_string(),
            inputs: deps,
            formula: Formula::Native(Arc::new(f)),
            area: area.to_string(),
        }
    }

    pub fn evaluate(&self, inputs: &Inputs) -> f64 {
        match &self.formula {
            Formula::Expr(e) => e.eval(inputs),
            Formula::Native(f) => f(inputs),
        }
    }

    pub fn reads_current(&self, initials: &str) -> bool {
        self.inputs.iter().any(|d| d.is_current() && d.initials() == initials)
    }

    pub fn expr(&self) -> Option<&Expr> {
        match &self.formula {
            Formula::Expr(e) => Some(e),
            Formula::Native(_) => None,
        }
    }
}

impl fmt::Display for Equation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.formula {
            Formula::Expr(e) => write!(f, "{} = {}", self.output, e),
            Formula::Native(_) => {
                let args: Vec<String> = self.inputs.iter().map(|d| match d {
                    Dependency::Current(s) => s.clone(),
                    Dependency::Previous(s) => format!("{}.prev", s),
                }).collect();
                write!(f, "{} = f({})", self.output, args.join(", "))
            }
        }
    }
}
