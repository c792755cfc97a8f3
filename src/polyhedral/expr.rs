//! Affine rows: linear combinations of space columns plus a constant.
//!
//! An affine row is `c0 + a1*x1 + ... + an*xn` over the columns of an
//! owning space (`[params | inputs | outputs]`). The row itself does not
//! know what its columns mean; sets and maps interpret it through their
//! space.

use num_integer::Integer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Neg, Sub};

/// Integer floor division (rounds toward negative infinity).
pub fn floor_div(a: i64, b: i64) -> i64 {
    debug_assert!(b != 0);
    let d = a / b;
    let r = a % b;
    if r != 0 && (r < 0) != (b < 0) {
        d - 1
    } else {
        d
    }
}

/// Integer ceiling division.
pub fn ceil_div(a: i64, b: i64) -> i64 {
    -floor_div(-a, b)
}

/// An affine expression: `constant + sum(coeffs[i] * col[i])`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AffineExpr {
    /// Constant term.
    pub constant: i64,
    /// One coefficient per column of the owning space.
    pub coeffs: Vec<i64>,
}

impl AffineExpr {
    /// The zero expression over `n_cols` columns.
    pub fn zero(n_cols: usize) -> Self {
        Self {
            constant: 0,
            coeffs: vec![0; n_cols],
        }
    }

    /// A constant expression.
    pub fn constant(value: i64, n_cols: usize) -> Self {
        Self {
            constant: value,
            coeffs: vec![0; n_cols],
        }
    }

    /// The expression selecting a single column.
    pub fn var(col: usize, n_cols: usize) -> Self {
        let mut coeffs = vec![0; n_cols];
        coeffs[col] = 1;
        Self { constant: 0, coeffs }
    }

    /// Number of columns.
    pub fn n_cols(&self) -> usize {
        self.coeffs.len()
    }

    /// Coefficient of a column.
    pub fn coeff(&self, col: usize) -> i64 {
        self.coeffs.get(col).copied().unwrap_or(0)
    }

    /// Set the coefficient of a column.
    pub fn set_coeff(&mut self, col: usize, value: i64) {
        self.coeffs[col] = value;
    }

    /// True when every coefficient is zero.
    pub fn is_constant(&self) -> bool {
        self.coeffs.iter().all(|&c| c == 0)
    }

    /// The constant value, when the expression is constant.
    pub fn as_constant(&self) -> Option<i64> {
        if self.is_constant() {
            Some(self.constant)
        } else {
            None
        }
    }

    /// The lowest column with a non-zero coefficient.
    pub fn leading_col(&self) -> Option<usize> {
        self.coeffs.iter().position(|&c| c != 0)
    }

    /// Evaluate the expression over concrete column values.
    pub fn evaluate(&self, values: &[i64]) -> i64 {
        let mut result = self.constant;
        for (i, &c) in self.coeffs.iter().enumerate() {
            if c != 0 {
                result += c * values[i];
            }
        }
        result
    }

    /// Scale by a constant factor.
    pub fn scale(&self, factor: i64) -> Self {
        Self {
            constant: self.constant * factor,
            coeffs: self.coeffs.iter().map(|&c| c * factor).collect(),
        }
    }

    /// GCD of the coefficients (excluding the constant), 0 when all zero.
    pub fn coeff_gcd(&self) -> i64 {
        let mut g: i64 = 0;
        for &c in &self.coeffs {
            g = g.gcd(&c.abs());
        }
        g
    }

    /// Remove one column, shifting higher columns down.
    pub fn remove_col(&mut self, col: usize) {
        self.coeffs.remove(col);
    }

    /// Insert `count` zero columns at `at`.
    pub fn insert_cols(&mut self, at: usize, count: usize) {
        for _ in 0..count {
            self.coeffs.insert(at, 0);
        }
    }

    /// Re-lay the expression over `new_n_cols` columns, sending old column
    /// `i` to column `col_map[i]`.
    pub fn remap(&self, new_n_cols: usize, col_map: &[usize]) -> Self {
        debug_assert_eq!(col_map.len(), self.coeffs.len());
        let mut coeffs = vec![0; new_n_cols];
        for (i, &c) in self.coeffs.iter().enumerate() {
            if c != 0 {
                coeffs[col_map[i]] += c;
            }
        }
        Self {
            constant: self.constant,
            coeffs,
        }
    }

    /// Render with the given column names.
    pub fn to_string_with_names(&self, names: &[String]) -> String {
        let mut parts = Vec::new();
        for (i, &c) in self.coeffs.iter().enumerate() {
            if c == 0 {
                continue;
            }
            let name = names
                .get(i)
                .cloned()
                .unwrap_or_else(|| format!("x{}", i));
            match c {
                1 => parts.push(name),
                -1 => parts.push(format!("-{}", name)),
                _ => parts.push(format!("{}{}", c, name)),
            }
        }
        if self.constant != 0 || parts.is_empty() {
            parts.push(self.constant.to_string());
        }
        parts.join(" + ").replace("+ -", "- ")
    }
}

impl Add for AffineExpr {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        assert_eq!(self.coeffs.len(), other.coeffs.len());
        Self {
            constant: self.constant + other.constant,
            coeffs: self
                .coeffs
                .iter()
                .zip(&other.coeffs)
                .map(|(&a, &b)| a + b)
                .collect(),
        }
    }
}

impl Sub for AffineExpr {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        assert_eq!(self.coeffs.len(), other.coeffs.len());
        Self {
            constant: self.constant - other.constant,
            coeffs: self
                .coeffs
                .iter()
                .zip(&other.coeffs)
                .map(|(&a, &b)| a - b)
                .collect(),
        }
    }
}

impl Neg for AffineExpr {
    type Output = Self;

    fn neg(self) -> Self {
        self.scale(-1)
    }
}

impl fmt::Display for AffineExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = (0..self.n_cols()).map(|i| format!("x{}", i)).collect();
        write!(f, "{}", self.to_string_with_names(&names))
    }
}
