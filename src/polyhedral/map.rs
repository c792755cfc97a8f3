//! Integer relations (affine maps) over named spaces.
//!
//! Schedules are maps from a computation's iteration space into the shared
//! time space. Transformations never mutate a schedule through aliasing:
//! every operation here builds a new relation.

use crate::error::{Error, Result};
use crate::polyhedral::constraint::{Constraint, ConstraintSystem};
use crate::polyhedral::expr::AffineExpr;
use crate::polyhedral::parse;
use crate::polyhedral::set::Set;
use crate::polyhedral::space::Space;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An integer relation defined by affine constraints over
/// `[params | inputs | outputs]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Map {
    /// The named space of the relation.
    pub space: Space,
    /// Conjunction of constraints.
    pub system: ConstraintSystem,
}

impl Map {
    /// The unconstrained relation over a space.
    pub fn universe(space: Space) -> Self {
        let system = ConstraintSystem::new(space.n_cols());
        Self { space, system }
    }

    /// The empty relation over a space.
    pub fn empty(space: Space) -> Self {
        let system = ConstraintSystem::infeasible(space.n_cols());
        Self { space, system }
    }

    /// Parse a textual presentation such as
    /// `[N] -> { S[i, j] -> [0, i, 0, j, 0] : 0 <= i < N }`.
    pub fn from_text(text: &str) -> Result<Self> {
        parse::parse_map(text)
    }

    /// Number of input dimensions.
    pub fn n_in(&self) -> usize {
        self.space.n_in()
    }

    /// Number of output dimensions.
    pub fn n_out(&self) -> usize {
        self.space.n_out()
    }

    /// The input tuple name.
    pub fn in_tuple_name(&self) -> Option<&str> {
        self.space.in_tuple.as_deref()
    }

    /// Rename the input tuple.
    pub fn set_in_tuple_name(&mut self, name: impl Into<String>) {
        self.space.in_tuple = Some(name.into());
    }

    /// Add a constraint row (layout `[params | inputs | outputs]`).
    pub fn add_constraint(&mut self, constraint: Constraint) {
        self.system.add(constraint);
    }

    /// Compose: apply `transform` to the range of `self`.
    ///
    /// The output dimensions of `self` are matched with the input
    /// dimensions of `transform` and existentially projected out.
    pub fn apply_range(&self, transform: &Map) -> Result<Map> {
        if self.n_out() != transform.n_in() {
            return Err(Error::poly(format!(
                "apply_range: range rank {} does not match transform input rank {}",
                self.n_out(),
                transform.n_in()
            )));
        }
        let (params, map_a, map_b) =
            Space::merge_params(&self.space.params, &transform.space.params);
        let np = params.len();
        let na = self.n_in();
        let nm = self.n_out();
        let nb = transform.n_out();
        let n_cols = np + na + nm + nb;

        // self rows over [P | in | mid], transform rows over [P | mid | out].
        let col_map_a: Vec<usize> = map_a
            .iter()
            .copied()
            .chain((0..na + nm).map(|i| np + i))
            .collect();
        let col_map_b: Vec<usize> = map_b
            .iter()
            .copied()
            .chain((0..nm + nb).map(|i| np + na + i))
            .collect();

        let mut system = self.system.remap(n_cols, &col_map_a);
        system
            .constraints
            .extend(transform.system.remap(n_cols, &col_map_b).constraints);

        let mid_cols: Vec<usize> = (np + na..np + na + nm).collect();
        system.eliminate_cols(&mid_cols);

        let space = Space {
            params,
            in_tuple: self.space.in_tuple.clone(),
            in_dims: self.space.in_dims.clone(),
            out_tuple: transform.space.out_tuple.clone(),
            out_dims: transform.space.out_dims.clone(),
        };
        Ok(Map { space, system })
    }

    /// Restrict the domain to a set. A tuple-name mismatch yields the
    /// empty relation.
    pub fn intersect_domain(&self, set: &Set) -> Result<Map> {
        if set.tuple_name() != self.in_tuple_name() {
            return Ok(Map::empty(self.space.clone()));
        }
        if set.n_dim() != self.n_in() {
            return Err(Error::poly(format!(
                "intersect_domain: set rank {} does not match input rank {}",
                set.n_dim(),
                self.n_in()
            )));
        }
        let (params, map_a, map_b) =
            Space::merge_params(&self.space.params, &set.space.params);
        let np = params.len();
        let n_cols = np + self.n_in() + self.n_out();

        let col_map_a: Vec<usize> = map_a
            .iter()
            .copied()
            .chain((0..self.n_in() + self.n_out()).map(|i| np + i))
            .collect();
        let col_map_b: Vec<usize> = map_b
            .iter()
            .copied()
            .chain((0..set.n_dim()).map(|i| np + i))
            .collect();

        let mut system = self.system.remap(n_cols, &col_map_a);
        system
            .constraints
            .extend(set.system.remap(n_cols, &col_map_b).constraints);
        system.tidy();

        let space = Space {
            params,
            ..self.space.clone()
        };
        Ok(Map { space, system })
    }

    /// The image of a set under the relation.
    pub fn apply(&self, set: &Set) -> Result<Set> {
        let restricted = self.intersect_domain(set)?;
        Ok(restricted.range())
    }

    /// The range of the relation, as a set.
    pub fn range(&self) -> Set {
        let mut system = self.system.clone();
        let in_cols: Vec<usize> = (0..self.n_in())
            .map(|i| self.space.in_col(i))
            .collect();
        system.eliminate_cols(&in_cols);
        Set {
            space: self.space.range(),
            system,
        }
    }

    /// Insert `count` unconstrained output dimensions at position `pos`.
    pub fn insert_out_dims(&self, pos: usize, count: usize) -> Map {
        let mut map = self.clone();
        map.system.insert_cols(map.space.out_col_base() + pos, count);
        for _ in 0..count {
            map.space.out_dims.insert(pos, None);
        }
        map
    }

    /// Append output dimensions, each constrained to zero. This is the
    /// padding primitive behind schedule rank alignment.
    pub fn align_range_dims(&self, target: usize) -> Result<Map> {
        let n = self.n_out();
        if target < n {
            return Err(Error::poly(format!(
                "align_range_dims: target rank {} below current rank {}",
                target, n
            )));
        }
        let mut map = self.insert_out_dims(n, target - n);
        for i in n..target {
            let cols = map.space.n_cols();
            let expr = AffineExpr::var(map.space.out_col(i), cols);
            map.system.add(Constraint::eq_zero(expr));
        }
        Ok(map)
    }

    /// Pin output dimension `pos` to the constant `value`.
    ///
    /// Builds an identity relation over the range universe, replaces the
    /// equality at `pos` with `x_pos = value` and applies it to the range.
    /// This is the single mechanism that writes static ordering
    /// coordinates.
    pub fn set_const_out_dim(&self, pos: usize, value: i64) -> Result<Map> {
        let n = self.n_out();
        if pos >= n {
            return Err(Error::InvalidDimension {
                dim: pos as i64,
                rank: n,
            });
        }
        log::trace!(
            "pinning output dimension {} of {} to {}",
            pos,
            self,
            value
        );
        let space = Space {
            params: self.space.params.clone(),
            in_tuple: None,
            in_dims: vec![None; n],
            out_tuple: None,
            out_dims: self.space.out_dims.clone(),
        };
        let mut transform = Map::universe(space);
        for i in 0..n {
            let cols = transform.space.n_cols();
            if i == pos {
                let expr = AffineExpr::var(transform.space.out_col(i), cols);
                let val = AffineExpr::constant(value, cols);
                transform.system.add(Constraint::eq(expr, val));
            } else {
                let lhs = AffineExpr::var(transform.space.in_col(i), cols);
                let rhs = AffineExpr::var(transform.space.out_col(i), cols);
                transform.system.add(Constraint::eq(lhs, rhs));
            }
        }
        self.apply_range(&transform)
    }

    /// Project away output dimension `pos`.
    pub fn project_out_out_dim(&self, pos: usize) -> Result<Map> {
        if pos >= self.n_out() {
            return Err(Error::InvalidDimension {
                dim: pos as i64,
                rank: self.n_out(),
            });
        }
        let mut map = self.clone();
        map.system.eliminate_col(map.space.out_col(pos));
        map.space.out_dims.remove(pos);
        Ok(map)
    }

    /// Read the constant value of an output dimension, when the relation
    /// pins it with a pure-constant equality.
    pub fn out_dim_constant(&self, pos: usize) -> Option<i64> {
        self.system.pinned_value(self.space.out_col(pos))
    }

    /// Semantic equality through canonical constraint forms. Sufficient
    /// for the single-valued relations the schedule algebra produces.
    pub fn is_equal(&self, other: &Map) -> bool {
        if self.n_in() != other.n_in()
            || self.n_out() != other.n_out()
            || self.in_tuple_name() != other.in_tuple_name()
        {
            return false;
        }
        let (params, map_a, map_b) =
            Space::merge_params(&self.space.params, &other.space.params);
        let np = params.len();
        let rest = self.n_in() + self.n_out();
        let col_map_a: Vec<usize> = map_a
            .iter()
            .copied()
            .chain((0..rest).map(|i| np + i))
            .collect();
        let col_map_b: Vec<usize> = map_b
            .iter()
            .copied()
            .chain((0..rest).map(|i| np + i))
            .collect();
        let mut a = self.system.remap(np + rest, &col_map_a);
        let mut b = other.system.remap(np + rest, &col_map_b);
        a.canonicalize();
        b.canonicalize();
        a == b
    }

    /// Input dimension names with positional fallbacks.
    pub fn in_dim_names(&self) -> Vec<String> {
        (0..self.n_in())
            .map(|i| {
                self.space.in_dims[i]
                    .clone()
                    .unwrap_or_else(|| format!("i{}", i))
            })
            .collect()
    }

    /// Output dimension names with positional fallbacks.
    pub fn out_dim_names(&self) -> Vec<String> {
        (0..self.n_out())
            .map(|i| {
                self.space.out_dims[i]
                    .clone()
                    .unwrap_or_else(|| format!("o{}", i))
            })
            .collect()
    }
}

impl fmt::Display for Map {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self
            .space
            .params
            .iter()
            .cloned()
            .chain(self.in_dim_names())
            .chain(self.out_dim_names())
            .collect();
        if !self.space.params.is_empty() {
            write!(f, "[{}] -> ", self.space.params.join(", "))?;
        }
        write!(f, "{{ ")?;
        if let Some(t) = self.in_tuple_name() {
            write!(f, "{}", t)?;
        }
        write!(
            f,
            "[{}] -> [{}]",
            self.in_dim_names().join(", "),
            self.out_dim_names().join(", ")
        )?;
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

#[cfg(test)]
mod tests {
    use super::*;

    fn identity2() -> Map {
        Map::from_text("{ S[i, j] -> [i, j] }").unwrap()
    }

    #[test]
    fn test_identity_relates_equal_points() {
        let map = identity2();
        assert_eq!(map.n_in(), 2);
        assert_eq!(map.n_out(), 2);
        assert_eq!(map.in_tuple_name(), Some("S"));
        // (i,j) -> (i,j) satisfied, (i,j) -> (j,i) not
        assert!(map.system.is_satisfied(&[3, 4, 3, 4]));
        assert!(!map.system.is_satisfied(&[3, 4, 4, 3]));
    }

    #[test]
    fn test_apply_range_composes() {
        let map = identity2();
        // transform swapping the two dimensions
        let t = Map::from_text("{ [a, b] -> [b, a] }").unwrap();
        let swapped = map.apply_range(&t).unwrap();
        assert!(swapped.system.is_satisfied(&[3, 4, 4, 3]));
        assert!(!swapped.system.is_satisfied(&[3, 4, 3, 4]));
    }

    #[test]
    fn test_set_const_out_dim() {
        let map = identity2();
        let pinned = map.set_const_out_dim(0, 7).unwrap();
        assert_eq!(pinned.out_dim_constant(0), Some(7));
        assert_eq!(pinned.out_dim_constant(1), None);
        // The remaining output still tracks the second input.
        assert!(pinned.system.is_satisfied(&[1, 4, 7, 4]));
        assert!(!pinned.system.is_satisfied(&[1, 4, 7, 5]));
    }

    #[test]
    fn test_align_range_dims() {
        let map = identity2();
        let aligned = map.align_range_dims(5).unwrap();
        assert_eq!(aligned.n_out(), 5);
        for pos in 2..5 {
            assert_eq!(aligned.out_dim_constant(pos), Some(0));
        }
    }

    #[test]
    fn test_apply_to_set() {
        let set = Set::from_text("{ S[i] : 0 <= i < 10 }").unwrap();
        let map = Map::from_text("{ S[i] -> [o] : o = i + 2 }").unwrap();
        let image = map.apply(&set).unwrap();
        assert!(image.contains(&[2], &[]));
        assert!(image.contains(&[11], &[]));
        assert!(!image.contains(&[1], &[]));
        assert!(!image.contains(&[12], &[]));
    }

    #[test]
    fn test_is_equal_ignores_route() {
        let a = Map::from_text("{ S[i] -> [o] : o = i }").unwrap();
        let b = Map::from_text("{ S[i] -> [j] : j - i = 0 }").unwrap();
        assert!(a.is_equal(&b));
        let c = Map::from_text("{ S[i] -> [o] : o = i + 1 }").unwrap();
        assert!(!a.is_equal(&c));
    }

    #[test]
    fn test_intersect_domain_mismatch_is_empty() {
        let map = identity2();
        let wrong = Set::from_text("{ T[i, j] : 0 <= i < 4 }").unwrap();
        let out = map.intersect_domain(&wrong).unwrap();
        assert!(out.system.is_obviously_empty());
    }
}
