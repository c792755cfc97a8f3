//! Linear constraints and constraint systems.
//!
//! A constraint is `expr >= 0` (inequality) or `expr = 0` (equality) over
//! the columns of a space. The constraint system also implements the two
//! workhorses of the relation algebra: column elimination (Gaussian
//! substitution with a Fourier-Motzkin fallback) and canonicalization.

use crate::polyhedral::expr::{floor_div, AffineExpr};
use num_integer::Integer;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConstraintKind {
    /// `expr = 0`
    Equality,
    /// `expr >= 0`
    Inequality,
}

/// A linear constraint over space columns.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Constraint {
    /// Kind of constraint.
    pub kind: ConstraintKind,
    /// The affine row; the constraint reads `expr >= 0` or `expr = 0`.
    pub expr: AffineExpr,
}

impl Constraint {
    /// `expr >= 0`
    pub fn ge_zero(expr: AffineExpr) -> Self {
        Self {
            kind: ConstraintKind::Inequality,
            expr,
        }
    }

    /// `expr = 0`
    pub fn eq_zero(expr: AffineExpr) -> Self {
        Self {
            kind: ConstraintKind::Equality,
            expr,
        }
    }

    /// `lhs >= rhs`
    pub fn ge(lhs: AffineExpr, rhs: AffineExpr) -> Self {
        Self::ge_zero(lhs - rhs)
    }

    /// `lhs <= rhs`
    pub fn le(lhs: AffineExpr, rhs: AffineExpr) -> Self {
        Self::ge_zero(rhs - lhs)
    }

    /// `lhs = rhs`
    pub fn eq(lhs: AffineExpr, rhs: AffineExpr) -> Self {
        Self::eq_zero(lhs - rhs)
    }

    /// True for equality constraints.
    pub fn is_equality(&self) -> bool {
        self.kind == ConstraintKind::Equality
    }

    /// A constraint with no free columns that always holds.
    pub fn is_tautology(&self) -> bool {
        self.expr.is_constant()
            && match self.kind {
                ConstraintKind::Inequality => self.expr.constant >= 0,
                ConstraintKind::Equality => self.expr.constant == 0,
            }
    }

    /// A constraint with no free columns that can never hold.
    pub fn is_contradiction(&self) -> bool {
        self.expr.is_constant() && !self.is_tautology()
    }

    /// Check the constraint at a concrete point.
    pub fn is_satisfied(&self, values: &[i64]) -> bool {
        let v = self.expr.evaluate(values);
        match self.kind {
            ConstraintKind::Inequality => v >= 0,
            ConstraintKind::Equality => v == 0,
        }
    }

    /// Divide out the coefficient gcd. Inequalities tighten the constant
    /// with a floor; equalities whose constant is not divisible are
    /// reported as infeasible (`false`).
    pub fn normalize(&mut self) -> bool {
        let g = self.expr.coeff_gcd();
        if g > 1 {
            match self.kind {
                ConstraintKind::Inequality => {
                    for c in &mut self.expr.coeffs {
                        *c /= g;
                    }
                    self.expr.constant = floor_div(self.expr.constant, g);
                }
                ConstraintKind::Equality => {
                    if self.expr.constant % g != 0 {
                        return false;
                    }
                    for c in &mut self.expr.coeffs {
                        *c /= g;
                    }
                    self.expr.constant /= g;
                }
            }
        }
        // Equalities get a canonical sign: first non-zero coefficient positive.
        if self.kind == ConstraintKind::Equality {
            if let Some(lead) = self.expr.leading_col() {
                if self.expr.coeff(lead) < 0 {
                    self.expr = self.expr.clone().scale(-1);
                }
            }
        }
        true
    }

    /// Render with column names.
    pub fn to_string_with_names(&self, names: &[String]) -> String {
        let e = self.expr.to_string_with_names(names);
        match self.kind {
            ConstraintKind::Inequality => format!("{} >= 0", e),
            ConstraintKind::Equality => format!("{} = 0", e),
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = (0..self.expr.n_cols()).map(|i| format!("x{}", i)).collect();
        write!(f, "{}", self.to_string_with_names(&names))
    }
}

/// A conjunction of constraints over a fixed number of columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintSystem {
    /// Number of columns every row must have.
    pub n_cols: usize,
    /// The rows.
    pub constraints: Vec<Constraint>,
}

impl ConstraintSystem {
    /// An unconstrained system.
    pub fn new(n_cols: usize) -> Self {
        Self {
            n_cols,
            constraints: Vec::new(),
        }
    }

    /// A system with a single unsatisfiable row.
    pub fn infeasible(n_cols: usize) -> Self {
        let mut sys = Self::new(n_cols);
        sys.constraints
            .push(Constraint::ge_zero(AffineExpr::constant(-1, n_cols)));
        sys
    }

    /// Add a row.
    pub fn add(&mut self, constraint: Constraint) {
        assert_eq!(constraint.expr.n_cols(), self.n_cols);
        self.constraints.push(constraint);
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    /// True when the system has no rows.
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Check all rows at a concrete point.
    pub fn is_satisfied(&self, values: &[i64]) -> bool {
        self.constraints.iter().all(|c| c.is_satisfied(values))
    }

    /// True when some row is a plain constant contradiction.
    pub fn is_obviously_empty(&self) -> bool {
        self.constraints.iter().any(|c| c.is_contradiction())
    }

    /// The constant a column is pinned to, when some equality fixes it
    /// independently of every other column.
    pub fn pinned_value(&self, col: usize) -> Option<i64> {
        for c in &self.constraints {
            if !c.is_equality() {
                continue;
            }
            let a = c.expr.coeff(col);
            if a.abs() != 1 {
                continue;
            }
            if c.expr
                .coeffs
                .iter()
                .enumerate()
                .all(|(k, &v)| k == col || v == 0)
            {
                return Some(-c.expr.constant * a);
            }
        }
        None
    }

    /// Insert zero columns at `at` in every row.
    pub fn insert_cols(&mut self, at: usize, count: usize) {
        for c in &mut self.constraints {
            c.expr.insert_cols(at, count);
        }
        self.n_cols += count;
    }

    /// Re-lay every row over `new_n_cols` columns via `col_map`.
    pub fn remap(&self, new_n_cols: usize, col_map: &[usize]) -> Self {
        Self {
            n_cols: new_n_cols,
            constraints: self
                .constraints
                .iter()
                .map(|c| Constraint {
                    kind: c.kind,
                    expr: c.expr.remap(new_n_cols, col_map),
                })
                .collect(),
        }
    }

    /// Existentially project out one column, then drop it from the layout.
    ///
    /// Prefers exact Gaussian substitution through an equality with a unit
    /// coefficient; otherwise falls back to Fourier-Motzkin combination of
    /// the bounding inequalities (exact over the rationals, an
    /// over-approximation over the integers).
    pub fn eliminate_col(&mut self, col: usize) {
        let unit = self
            .constraints
            .iter()
            .position(|c| c.is_equality() && c.expr.coeff(col).abs() == 1);

        if let Some(idx) = unit {
            let eq = self.constraints.remove(idx);
            let pivot = eq.expr.coeff(col);
            for c in &mut self.constraints {
                let a = c.expr.coeff(col);
                if a != 0 {
                    c.expr = c.expr.clone() - eq.expr.scale(a * pivot);
                }
            }
        } else {
            let rows = std::mem::take(&mut self.constraints);
            let mut lowers = Vec::new();
            let mut uppers = Vec::new();
            for c in rows {
                let a = c.expr.coeff(col);
                if a == 0 {
                    self.constraints.push(c);
                } else if c.is_equality() {
                    // Split into a pair of bounds and let FM combine them.
                    lowers.push(if a > 0 {
                        c.expr.clone()
                    } else {
                        c.expr.clone().scale(-1)
                    });
                    uppers.push(if a > 0 {
                        c.expr.scale(-1)
                    } else {
                        c.expr
                    });
                } else if a > 0 {
                    lowers.push(c.expr);
                } else {
                    uppers.push(c.expr);
                }
            }
            for lo in &lowers {
                for up in &uppers {
                    let al = lo.coeff(col);
                    let au = -up.coeff(col);
                    let l = al.lcm(&au);
                    let combined = lo.scale(l / al) + up.scale(l / au);
                    debug_assert_eq!(combined.coeff(col), 0);
                    self.constraints.push(Constraint::ge_zero(combined));
                }
            }
        }

        for c in &mut self.constraints {
            c.expr.remove_col(col);
        }
        self.n_cols -= 1;
        self.tidy();
    }

    /// Project out several columns (indices in the current layout).
    pub fn eliminate_cols(&mut self, cols: &[usize]) {
        let mut sorted: Vec<usize> = cols.to_vec();
        sorted.sort_unstable();
        for &col in sorted.iter().rev() {
            self.eliminate_col(col);
        }
    }

    /// Normalize rows, drop tautologies, collapse to a single infeasible
    /// row when a contradiction is present.
    pub fn tidy(&mut self) {
        let mut infeasible = false;
        for c in &mut self.constraints {
            if !c.normalize() {
                infeasible = true;
            }
        }
        if infeasible || self.is_obviously_empty() {
            *self = Self::infeasible(self.n_cols);
            return;
        }
        self.constraints.retain(|c| !c.is_tautology());
    }

    /// Canonical form: normalized rows, opposite inequality pairs merged
    /// into equalities, unit equalities substituted through the rest, and
    /// rows sorted and deduplicated.
    ///
    /// Two systems describing the same single-valued relation through
    /// different transformation routes reduce to the same canonical form;
    /// that is all the schedule algebra needs for equality checks.
    pub fn canonicalize(&mut self) {
        self.tidy();

        // Merge e >= 0 with -e >= 0 into e = 0.
        let mut i = 0;
        while i < self.constraints.len() {
            if !self.constraints[i].is_equality() {
                let neg = self.constraints[i].expr.clone().scale(-1);
                if let Some(j) = self
                    .constraints
                    .iter()
                    .enumerate()
                    .position(|(k, c)| k != i && !c.is_equality() && c.expr == neg)
                {
                    self.constraints.remove(j.max(i));
                    let keep = j.min(i);
                    self.constraints[keep] = Constraint::eq_zero(neg.scale(-1));
                    i = 0;
                    continue;
                }
            }
            i += 1;
        }

        // Echelon pass: substitute each unit-pivot equality into the others.
        let mut order: Vec<usize> = (0..self.constraints.len())
            .filter(|&k| self.constraints[k].is_equality())
            .collect();
        order.sort_by_key(|&k| self.constraints[k].expr.leading_col());
        for k in order {
            let eq = self.constraints[k].clone();
            let pivot_col = match eq
                .expr
                .coeffs
                .iter()
                .position(|&c| c.abs() == 1)
            {
                Some(p) => p,
                None => continue,
            };
            let pivot = eq.expr.coeff(pivot_col);
            for (m, c) in self.constraints.iter_mut().enumerate() {
                if m == k {
                    continue;
                }
                let a = c.expr.coeff(pivot_col);
                if a != 0 {
                    c.expr = c.expr.clone() - eq.expr.scale(a * pivot);
                }
            }
        }

        self.tidy();
        self.constraints.sort();
        self.constraints.dedup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ineq(coeffs: &[i64], constant: i64) -> Constraint {
        let mut e = AffineExpr::zero(coeffs.len());
        e.coeffs = coeffs.to_vec();
        e.constant = constant;
        Constraint::ge_zero(e)
    }

    fn eq(coeffs: &[i64], constant: i64) -> Constraint {
        let mut e = AffineExpr::zero(coeffs.len());
        e.coeffs = coeffs.to_vec();
        e.constant = constant;
        Constraint::eq_zero(e)
    }

    #[test]
    fn test_satisfaction() {
        // 0 <= x < 10 over one column
        let mut sys = ConstraintSystem::new(1);
        sys.add(ineq(&[1], 0));
        sys.add(ineq(&[-1], 9));
        assert!(sys.is_satisfied(&[0]));
        assert!(sys.is_satisfied(&[9]));
        assert!(!sys.is_satisfied(&[10]));
        assert!(!sys.is_satisfied(&[-1]));
    }

    #[test]
    fn test_gaussian_elimination() {
        // y = x + 1, 0 <= y <= 9; eliminate y -> -1 <= x <= 8
        let mut sys = ConstraintSystem::new(2);
        sys.add(eq(&[1, -1], 1)); // x - y + 1 = 0
        sys.add(ineq(&[0, 1], 0)); // y >= 0
        sys.add(ineq(&[0, -1], 9)); // y <= 9
        sys.eliminate_col(1);
        assert_eq!(sys.n_cols, 1);
        assert!(sys.is_satisfied(&[-1]));
        assert!(sys.is_satisfied(&[8]));
        assert!(!sys.is_satisfied(&[9]));
        assert!(!sys.is_satisfied(&[-2]));
    }

    #[test]
    fn test_fourier_motzkin() {
        // 2y >= x, y <= 5, no equality on y: eliminate y -> x <= 10
        let mut sys = ConstraintSystem::new(2);
        sys.add(ineq(&[-1, 2], 0)); // 2y - x >= 0
        sys.add(ineq(&[0, -1], 5)); // 5 - y >= 0
        sys.eliminate_col(1);
        assert_eq!(sys.n_cols, 1);
        assert!(sys.is_satisfied(&[10]));
        assert!(!sys.is_satisfied(&[11]));
    }

    #[test]
    fn test_infeasible_detection() {
        let mut sys = ConstraintSystem::new(1);
        sys.add(ineq(&[1], 0)); // x >= 0
        sys.add(ineq(&[-1], -1)); // x <= -1
        sys.eliminate_col(0);
        assert!(sys.is_obviously_empty());
    }

    #[test]
    fn test_canonical_pair_merge() {
        // x - 3 >= 0 and 3 - x >= 0 collapse into x = 3.
        let mut sys = ConstraintSystem::new(1);
        sys.add(ineq(&[1], -3));
        sys.add(ineq(&[-1], 3));
        sys.canonicalize();
        assert_eq!(sys.len(), 1);
        assert!(sys.constraints[0].is_equality());
        assert!(sys.is_satisfied(&[3]));
        assert!(!sys.is_satisfied(&[4]));
    }

    #[test]
    fn test_canonical_equal_routes() {
        // The same line expressed two ways canonicalizes identically.
        let mut a = ConstraintSystem::new(2);
        a.add(eq(&[2, -2], 4));
        let mut b = ConstraintSystem::new(2);
        b.add(eq(&[-1, 1], -2));
        a.canonicalize();
        b.canonicalize();
        assert_eq!(a, b);
    }
}
