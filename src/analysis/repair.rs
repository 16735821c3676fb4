//! Declared substitution rules for known circular equation shapes.
//!
//! A rule only fires when the resolver has flagged a cycle that contains both
//! the rule's equation and the offending input, and that equation still reads
//! the input as a same-day value. Anything else stays an error.

use crate::graph::{Equation, Expr};
use serde::{Serialize, Deserialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubstitutionRule {
    /// Output of the equation to rewrite.
    pub output: String,
    /// The same-day read that closes the cycle.
    pub offending_input: String,
    /// Expression that replaces every same-day read of `offending_input`.
    pub replacement: Expr,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedRepair {
    pub output: String,
    pub description: String,
    pub before: String,
    pub after: String,
}

impl SubstitutionRule {
    pub fn new(output: &str, offending_input: &str, replacement: Expr, description: &str) -> Self {
        Self {
            output: output.to_string(),
            offending_input: offending_input.to_string(),
            replacement,
            description: description.to_string(),
        }
    }

    /// True when `equation` has exactly the shape this rule knows how to fix
    /// and the flagged cycle runs through it.
    pub fn matches(&self, equation: &Equation, cycle: &[String]) -> bool {
        equation.output == self.output
            && equation.expr().is_some()
            && equation.reads_current(&self.offending_input)
            && cycle.iter().any(|m| *m == self.output)
            && cycle.iter().any(|m| *m == self.offending_input)
    }

    /// Rewrites the equation. Callers check `matches` first.
    pub fn apply(&self, equation: &Equation) -> Option<(Equation, AppliedRepair)> {
        let expr = equation.expr()?;
        let rewritten = Equation::new(
            &equation.output,
            expr.substitute(&self.offending_input, &self.replacement),
            &equation.area,
        );
        let repair = AppliedRepair {
            output: equation.output.clone(),
            description: self.description.clone(),
            before: equation.to_string(),
            after: rewritten.to_string(),
        };
        Some((rewritten, repair))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::expr::{var, prev};

    fn offer_rule() -> SubstitutionRule {
        SubstitutionRule::new("OD", "II", prev("II"), "offer reads yesterday's inventory")
    }

    #[test]
    fn test_rule_matches_only_flagged_shape() {
        let rule = offer_rule();
        let legacy = Equation::new("OD", var("II") + var("TPP"), "Inventario");
        let cycle = vec!["II".to_string(), "OD".to_string(), "TPV".to_string()];

        assert!(rule.matches(&legacy, &cycle));
        assert!(!rule.matches(&legacy, &["TPV".to_string(), "II".to_string()]));

        let fixed = Equation::new("OD", prev("II") + var("TPP"), "Inventario");
        assert!(!rule.matches(&fixed, &cycle));
    }

    #[test]
    fn test_apply_rewrites_expression() {
        let legacy = Equation::new("OD", var("II") + var("TPP"), "Inventario");
        let (fixed, repair) = offer_rule().apply(&legacy).unwrap();
        assert!(!fixed.reads_current("II"));
        assert_eq!(repair.before, "OD = (II + TPP)");
        assert_eq!(repair.after, "OD = (II.prev + TPP)");
    }
}
