//! Integer sets over named spaces: iteration domains and contexts.

use crate::error::{Error, Result};
use crate::polyhedral::constraint::{Constraint, ConstraintSystem};
use crate::polyhedral::parse;
use crate::polyhedral::space::Space;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An integer set defined by affine constraints over a named space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Set {
    /// The space; set dimensions live on the output side.
    pub space: Space,
    /// Conjunction of constraints over `[params | dims]`.
    pub system: ConstraintSystem,
}

impl Set {
    /// The unconstrained set over a space.
    pub fn universe(space: Space) -> Self {
        let system = ConstraintSystem::new(space.n_cols());
        Self { space, system }
    }

    /// Parse a textual presentation such as
    /// `[N] -> { S[i, j] : 0 <= i < N and 0 <= j < N }`.
    pub fn from_text(text: &str) -> Result<Self> {
        parse::parse_set(text)
    }

    /// Number of set dimensions.
    pub fn n_dim(&self) -> usize {
        self.space.n_out()
    }

    /// The tuple name, when the set is named.
    pub fn tuple_name(&self) -> Option<&str> {
        self.space.out_tuple.as_deref()
    }

    /// Rename the tuple.
    pub fn set_tuple_name(&mut self, name: impl Into<String>) {
        self.space.out_tuple = Some(name.into());
    }

    /// Add a constraint row (layout `[params | dims]`).
    pub fn add_constraint(&mut self, constraint: Constraint) {
        self.system.add(constraint);
    }

    /// Membership test with concrete dimension and parameter values.
    pub fn contains(&self, point: &[i64], params: &[i64]) -> bool {
        assert_eq!(point.len(), self.n_dim());
        assert_eq!(params.len(), self.space.n_param());
        let mut values = params.to_vec();
        values.extend_from_slice(point);
        self.system.is_satisfied(&values)
    }

    /// True when some row is a constant contradiction.
    pub fn is_obviously_empty(&self) -> bool {
        self.system.is_obviously_empty()
    }

    /// Intersect with another set over the same tuple.
    pub fn intersect(&self, other: &Set) -> Result<Set> {
        if self.n_dim() != other.n_dim() {
            return Err(Error::poly(format!(
                "cannot intersect sets of rank {} and {}",
                self.n_dim(),
                other.n_dim()
            )));
        }
        let (params, map_a, map_b) =
            Space::merge_params(&self.space.params, &other.space.params);
        let n_cols = params.len() + self.n_dim();

        let col_map_a: Vec<usize> = map_a
            .iter()
            .copied()
            .chain((0..self.n_dim()).map(|i| params.len() + i))
            .collect();
        let col_map_b: Vec<usize> = map_b
            .iter()
            .copied()
            .chain((0..other.n_dim()).map(|i| params.len() + i))
            .collect();

        let mut system = self.system.remap(n_cols, &col_map_a);
        system
            .constraints
            .extend(other.system.remap(n_cols, &col_map_b).constraints);
        system.tidy();

        let mut space = self.space.clone().with_params(params);
        if space.out_tuple.is_none() {
            space.out_tuple = other.space.out_tuple.clone();
        }
        Ok(Set { space, system })
    }

    /// Semantic equality through canonical constraint forms.
    pub fn is_equal(&self, other: &Set) -> bool {
        if self.n_dim() != other.n_dim() || self.tuple_name() != other.tuple_name() {
            return false;
        }
        let (params, map_a, map_b) =
            Space::merge_params(&self.space.params, &other.space.params);
        let n_cols = params.len() + self.n_dim();
        let col_map_a: Vec<usize> = map_a
            .iter()
            .copied()
            .chain((0..self.n_dim()).map(|i| params.len() + i))
            .collect();
        let col_map_b: Vec<usize> = map_b
            .iter()
            .copied()
            .chain((0..other.n_dim()).map(|i| params.len() + i))
            .collect();
        let mut a = self.system.remap(n_cols, &col_map_a);
        let mut b = other.system.remap(n_cols, &col_map_b);
        a.canonicalize();
        b.canonicalize();
        a == b
    }

    /// Dimension names, with positional fallbacks.
    pub fn dim_names(&self) -> Vec<String> {
        (0..self.n_dim())
            .map(|i| {
                self.space.out_dims[i]
                    .clone()
                    .unwrap_or_else(|| format!("i{}", i))
            })
            .collect()
    }
}

impl fmt::Display for Set {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self
            .space
            .params
            .iter()
            .cloned()
            .chain(self.dim_names())
            .collect();
        if !self.space.params.is_empty() {
            write!(f, "[{}] -> ", self.space.params.join(", "))?;
        }
        write!(f, "{{ ")?;
        if let Some(t) = self.tuple_name() {
            write!(f, "{}", t)?;
        }
        write!(f, "[{}]", self.dim_names().join(", "))?;
        if !self.system.is_empty() {
            write!(f, " : ")?;
            for (i, c) in self.system.constraints.iter().enumerate() {
                if i > 0 {
                    write!(f, " and ")?;
                }
                write!(f, "{}", c.to_string_with_names(&names))?;
            }
        }
        write!(f, " }}")
    }
}
