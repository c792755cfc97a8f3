//! Polyhedral spaces: named dimensions for sets and relations.
//!
//! A space describes the structure of an integer set or relation:
//! parameter dimensions (symbolic constants), input dimensions (relations
//! only) and output dimensions. Sets carry their dimensions on the output
//! side and have no input tuple.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A polyhedral space: parameters plus named input/output tuples.
///
/// Constraint rows over a space are laid out over the columns
/// `[params | inputs | outputs]`; the space translates between dimension
/// indices and column indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Space {
    /// Names of the symbolic parameters.
    pub params: Vec<String>,
    /// Name of the input tuple (`None` for sets).
    pub in_tuple: Option<String>,
    /// Input dimension names (empty for sets).
    pub in_dims: Vec<Option<String>>,
    /// Name of the output tuple, when the relation's range is named.
    pub out_tuple: Option<String>,
    /// Output dimension names; `None` entries are anonymous.
    pub out_dims: Vec<Option<String>>,
}

impl Space {
    /// Create a set space with `n_dim` anonymous dimensions.
    pub fn set(n_dim: usize) -> Self {
        Self {
            params: Vec::new(),
            in_tuple: None,
            in_dims: Vec::new(),
            out_tuple: None,
            out_dims: vec![None; n_dim],
        }
    }

    /// Create a map space with anonymous dimensions.
    pub fn map(n_in: usize, n_out: usize) -> Self {
        Self {
            params: Vec::new(),
            in_tuple: None,
            in_dims: vec![None; n_in],
            out_tuple: None,
            out_dims: vec![None; n_out],
        }
    }

    /// Number of parameter dimensions.
    pub fn n_param(&self) -> usize {
        self.params.len()
    }

    /// Number of input dimensions.
    pub fn n_in(&self) -> usize {
        self.in_dims.len()
    }

    /// Number of output (or set) dimensions.
    pub fn n_out(&self) -> usize {
        self.out_dims.len()
    }

    /// Total number of columns a constraint row over this space has.
    pub fn n_cols(&self) -> usize {
        self.n_param() + self.n_in() + self.n_out()
    }

    /// True when this space has no input tuple.
    pub fn is_set(&self) -> bool {
        self.in_dims.is_empty() && self.in_tuple.is_none()
    }

    /// Column index of parameter `i`.
    pub fn param_col(&self, i: usize) -> usize {
        debug_assert!(i < self.n_param());
        i
    }

    /// Column index of input dimension `i`.
    pub fn in_col(&self, i: usize) -> usize {
        debug_assert!(i < self.n_in());
        self.n_param() + i
    }

    /// Column index of output dimension `i`.
    pub fn out_col(&self, i: usize) -> usize {
        debug_assert!(i < self.n_out());
        self.n_param() + self.n_in() + i
    }

    /// First output column; insertion helpers index from here.
    pub(crate) fn out_col_base(&self) -> usize {
        self.n_param() + self.n_in()
    }

    /// Look up a parameter by name.
    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p == name)
    }

    /// Look up an input dimension by name.
    pub fn in_index(&self, name: &str) -> Option<usize> {
        self.in_dims.iter().position(|d| d.as_deref() == Some(name))
    }

    /// Look up an output dimension by name.
    pub fn out_index(&self, name: &str) -> Option<usize> {
        self.out_dims.iter().position(|d| d.as_deref() == Some(name))
    }

    /// Set parameter names.
    pub fn with_params(mut self, params: Vec<String>) -> Self {
        self.params = params;
        self
    }

    /// Name the input tuple.
    pub fn with_in_tuple(mut self, name: impl Into<String>) -> Self {
        self.in_tuple = Some(name.into());
        self
    }

    /// Name the output tuple.
    pub fn with_out_tuple(mut self, name: impl Into<String>) -> Self {
        self.out_tuple = Some(name.into());
        self
    }

    /// Set input dimension names.
    pub fn with_in_dims(mut self, names: Vec<Option<String>>) -> Self {
        self.in_dims = names;
        self
    }

    /// Set output dimension names.
    pub fn with_out_dims(mut self, names: Vec<Option<String>>) -> Self {
        self.out_dims = names;
        self
    }

    /// The range of a map space, as a set space.
    pub fn range(&self) -> Space {
        Space {
            params: self.params.clone(),
            in_tuple: None,
            in_dims: Vec::new(),
            out_tuple: self.out_tuple.clone(),
            out_dims: self.out_dims.clone(),
        }
    }

    /// Merge two parameter lists by name.
    ///
    /// Returns the merged list and, for each side, the mapping from its
    /// old parameter index to the merged index.
    pub fn merge_params(a: &[String], b: &[String]) -> (Vec<String>, Vec<usize>, Vec<usize>) {
        let mut merged: Vec<String> = a.to_vec();
        let map_a: Vec<usize> = (0..a.len()).collect();
        let mut map_b = Vec::with_capacity(b.len());
        for name in b {
            match merged.iter().position(|m| m == name) {
                Some(i) => map_b.push(i),
                None => {
                    merged.push(name.clone());
                    map_b.push(merged.len() - 1);
                }
            }
        }
        (merged, map_a, map_b)
    }
}

impl fmt::Display for Space {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_set() {
            write!(f, "[{}]", self.n_out())?;
        } else {
            write!(f, "[{}] -> [{}]", self.n_in(), self.n_out())?;
        }
        if self.n_param() > 0 {
            write!(f, " : {} params", self.n_param())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_space() {
        let space = Space::set(3);
        assert!(space.is_set());
        assert_eq!(space.n_out(), 3);
        assert_eq!(space.n_cols(), 3);
    }

    #[test]
    fn test_map_columns() {
        let space = Space::map(2, 3).with_params(vec!["N".to_string()]);
        assert_eq!(space.param_col(0), 0);
        assert_eq!(space.in_col(0), 1);
        assert_eq!(space.out_col(0), 3);
        assert_eq!(space.n_cols(), 6);
    }

    #[test]
    fn test_name_lookup() {
        let space = Space::map(2, 1)
            .with_in_dims(vec![Some("i".to_string()), Some("j".to_string())])
            .with_in_tuple("S");
        assert_eq!(space.in_index("j"), Some(1));
        assert_eq!(space.in_index("k"), None);
        assert_eq!(space.in_col(1), 1);
    }

    #[test]
    fn test_merge_params() {
        let a = vec!["N".to_string(), "M".to_string()];
        let b = vec!["M".to_string(), "K".to_string()];
        let (merged, map_a, map_b) = Space::merge_params(&a, &b);
        assert_eq!(merged, vec!["N", "M", "K"]);
        assert_eq!(map_a, vec![0, 1]);
        assert_eq!(map_b, vec![1, 2]);
    }
}
