//! Expression formulas: the declarative right-hand side of an equation.
//!
//! An `Expr` names its inputs explicitly, so the dependency list of an
//! equation is derived from the tree instead of being declared twice.

use super::equation::Dependency;
use serde::{Serialize, Deserialize};
use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;
use std::ops;
use tracing::{debug, warn};

/// Denominators at or below this magnitude trigger the division guard.
pub const DIVISION_EPSILON: f64 = f64::EPSILON;

/// The explicit input map handed to an equation's evaluation function.
///
/// Same-day values and previous-day values live in separate maps so an
/// equation can read both `II` today and `II` yesterday without ambiguity.
#[derive(Debug, Default)]
pub struct Inputs<'a> {
    current: HashMap<&'a str, f64>,
    previous: HashMap<&'a str, f64>,
    guarded: Cell<u32>,
    undeclared: Cell<u32>,
}

impl<'a> Inputs<'a> {
    pub fn new() -> Self { Self::default() }

    pub fn insert_current(&mut self, initials: &'a str, value: f64) {
        self.current.insert(initials, value);
    }

    pub fn insert_previous(&mut self, initials: &'a str, value: f64) {
        self.previous.insert(initials, value);
    }

    pub fn with_current(mut self, initials: &'a str, value: f64) -> Self {
        self.insert_current(initials, value);
        self
    }

    pub fn with_previous(mut self, initials: &'a str, value: f64) -> Self {
        self.insert_previous(initials, value);
        self
    }

    /// Same-day value of a declared input. Undeclared names read as 0 and
    /// are counted in `undeclared_reads`.
    pub fn get(&self, initials: &str) -> f64 {
        match self.current.get(initials) {
            Some(v) => *v,
            None => {
                warn!(variable = initials, "read of undeclared input, using 0");
                self.undeclared.set(self.undeclared.get() + 1);
                0.0
            }
        }
    }

    /// Previous-day value of a declared input.
    pub fn previous(&self, initials: &str) -> f64 {
        match self.previous.get(initials) {
            Some(v) => *v,
            None => {
                warn!(variable = initials, "read of undeclared previous-day input, using 0");
                self.undeclared.set(self.undeclared.get() + 1);
                0.0
            }
        }
    }

    /// Guarded division with a fallback of 0.
    pub fn div(&self, num: f64, den: f64) -> f64 {
        self.div_or(num, den, 0.0)
    }

    /// Guarded division. A zero (or non-finite) denominator yields `fallback`
    /// and counts as an applied guard; it never fails.
    pub fn div_or(&self, num: f64, den: f64, fallback: f64) -> f64 {
        if den.abs() <= DIVISION_EPSILON || !den.is_finite() {
            self.guarded.set(self.guarded.get() + 1);
            debug!(num, den, fallback, "division guard applied");
            fallback
        } else {
            num / den
        }
    }

    pub fn guarded_divisions(&self) -> u32 { self.guarded.get() }

    /// Reads of names the equation never declared. Each one returned 0.
    pub fn undeclared_reads(&self) -> u32 { self.undeclared.get() }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "args", rename_all = "snake_case")]
pub enum Expr {
    Const(f64),
    /// Same-day value.
    Var(String),
    /// Previous-day value. Never creates a same-day dependency.
    Prev(String),
    Add(Vec<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Vec<Expr>),
    /// Always guarded: a zero denominator yields `fallback`.
    Div { num: Box<Expr>, den: Box<Expr>, fallback: f64 },
    Min(Vec<Expr>),
    Max(Vec<Expr>),
    Neg(Box<Expr>),
}

pub fn var(initials: &str) -> Expr { Expr::Var(initials.to_string()) }
pub fn prev(initials: &str) -> Expr { Expr::Prev(initials.to_string()) }
pub fn lit(value: f64) -> Expr { Expr::Const(value) }
pub fn min(a: Expr, b: Expr) -> Expr { Expr::Min(vec![a, b]) }
pub fn max(a: Expr, b: Expr) -> Expr { Expr::Max(vec![a, b]) }

impl Expr {
    pub fn div_or(self, den: Expr, fallback: f64) -> Expr {
        Expr::Div { num: Box::new(self), den: Box::new(den), fallback }
    }

    pub fn eval(&self, inputs: &Inputs) -> f64 {
        match self {
            Expr::Const(c) => *c,
            Expr::Var(name) => inputs.get(name),
            Expr::Prev(name) => inputs.previous(name),
            Expr::Add(terms) => terms.iter().map(|t| t.eval(inputs)).sum(),
            Expr::Sub(a, b) => a.eval(inputs) - b.eval(inputs),
            Expr::Mul(terms) => terms.iter().map(|t| t.eval(inputs)).product(),
            Expr::Div { num, den, fallback } => {
                inputs.div_or(num.eval(inputs), den.eval(inputs), *fallback)
            }
            Expr::Min(terms) => fold_or_zero(terms, inputs, f64::min),
            Expr::Max(terms) => fold_or_zero(terms, inputs, f64::max),
            Expr::Neg(a) => -a.eval(inputs),
        }
    }

    /// Inputs referenced by the tree, first occurrence order, without duplicates.
    pub fn dependencies(&self) -> Vec<Dependency> {
        let mut out = Vec::new();
        self.collect(&mut out);
        out
    }

    fn collect(&self, out: &mut Vec<Dependency>) {
        let dep = match self {
            Expr::Var(name) => Some(Dependency::Current(name.clone())),
            Expr::Prev(name) => Some(Dependency::Previous(name.clone())),
            _ => None,
        };
        if let Some(dep) = dep {
            if !out.contains(&dep) {
                out.push(dep);
            }
            return;
        }
        for child in self.children() {
            child.collect(out);
        }
    }

    fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Const(_) | Expr::Var(_) | Expr::Prev(_) => Vec::new(),
            Expr::Add(t) | Expr::Mul(t) | Expr::Min(t) | Expr::Max(t) => t.iter().collect(),
            Expr::Sub(a, b) => vec![&**a, &**b],
            Expr::Div { num, den, .. } => vec![&**num, &**den],
            Expr::Neg(a) => vec![&**a],
        }
    }

    /// Replaces every same-day read of `initials` with `replacement`.
    pub fn substitute(&self, initials: &str, replacement: &Expr) -> Expr {
        let sub = |e: &Expr| e.substitute(initials, replacement);
        let sub_all = |t: &[Expr]| t.iter().map(sub).collect::<Vec<_>>();
        match self {
            Expr::Var(name) if name == initials => replacement.clone(),
            Expr::Const(_) | Expr::Var(_) | Expr::Prev(_) => self.clone(),
            Expr::Add(t) => Expr::Add(sub_all(t.as_slice())),
            Expr::Mul(t) => Expr::Mul(sub_all(t.as_slice())),
            Expr::Min(t) => Expr::Min(sub_all(t.as_slice())),
            Expr::Max(t) => Expr::Max(sub_all(t.as_slice())),
            Expr::Sub(a, b) => Expr::Sub(Box::new(sub(&**a)), Box::new(sub(&**b))),
            Expr::Div { num, den, fallback } => Expr::Div {
                num: Box::new(sub(&**num)),
                den: Box::new(sub(&**den)),
                fallback: *fallback,
            },
            Expr::Neg(a) => Expr::Neg(Box::new(sub(&**a))),
        }
    }
}

fn fold_or_zero(terms: &[Expr], inputs: &Inputs, f: fn(f64, f64) -> f64) -> f64 {
    terms.iter().map(|t| t.eval(inputs)).reduce(f).unwrap_or(0.0)
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |terms: &[Expr], sep: &str| {
            terms.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(sep)
        };
        match self {
            Expr::Const(c) => write!(f, "{}", c),
            Expr::Var(name) => write!(f, "{}", name),
            Expr::Prev(name) => write!(f, "{}.prev", name),
            Expr::Add(t) => write!(f, "({})", join(t.as_slice(), " + ")),
            Expr::Mul(t) => write!(f, "({})", join(t.as_slice(), " * ")),
            Expr::Sub(a, b) => write!(f, "({} - {})", a, b),
            Expr::Div { num, den, .. } => write!(f, "({} / {})", num, den),
            Expr::Min(t) => write!(f, "min({})", join(t.as_slice(), ", ")),
            Expr::Max(t) => write!(f, "max({})", join(t.as_slice(), ", ")),
            Expr::Neg(a) => write!(f, "-{}", a),
        }
    }
}

// --- Operator sugar ---

impl ops::Add for Expr {
    type Output = Expr;
    fn add(self, rhs: Expr) -> Expr {
        match self {
            Expr::Add(mut terms) => { terms.push(rhs); Expr::Add(terms) }
            lhs => Expr::Add(vec![lhs, rhs]),
        }
    }
}

impl ops::Sub for Expr {
    type Output = Expr;
    fn sub(self, rhs: Expr) -> Expr { Expr::Sub(Box::new(self), Box::new(rhs)) }
}

impl ops::Mul for Expr {
    type Output = Expr;
    fn mul(self, rhs: Expr) -> Expr {
        match self {
            Expr::Mul(mut terms) => { terms.push(rhs); Expr::Mul(terms) }
            lhs => Expr::Mul(vec![lhs, rhs]),
        }
    }
}

impl ops::Div for Expr {
    type Output = Expr;
    fn div(self, rhs: Expr) -> Expr { self.div_or(rhs, 0.0) }
}

impl ops::Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr { Expr::Neg(Box::new(self)) }
}
