//! Function-scoped invariants (named constants).

use crate::ir::types::Expr;
use std::fmt;

/// A named constant, scoped to its function.
#[derive(Debug, Clone, PartialEq)]
pub struct Constant {
    /// The invariant's name.
    pub name: String,
    /// Its defining expression.
    pub expr: Expr,
}

impl Constant {
    /// Create an invariant.
    pub fn new(name: impl Into<String>, expr: Expr) -> Self {
        Self {
            name: name.into(),
            expr,
        }
    }

    /// Diagnostic dump through the `log` facade.
    pub fn dump(&self) {
        log::debug!("invariant \"{}\" = {}", self.name, self.expr);
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.name, self.expr)
    }
}
