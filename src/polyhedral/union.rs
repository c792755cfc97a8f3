//! Unions of sets and maps across differently-named tuples.
//!
//! A function's global iteration domain and schedule are unions of the
//! per-computation pieces; the pieces keep their tuple names so that
//! domain intersection can match them back up.

use crate::error::Result;
use crate::polyhedral::map::Map;
use crate::polyhedral::set::Set;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A union of named integer sets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnionSet {
    sets: Vec<Set>,
}

impl UnionSet {
    /// The empty union.
    pub fn new() -> Self {
        Self::default()
    }

    /// A union with a single member.
    pub fn from_set(set: Set) -> Self {
        Self { sets: vec![set] }
    }

    /// Add a member.
    pub fn add(&mut self, set: Set) {
        self.sets.push(set);
    }

    /// Union with another union.
    pub fn union(mut self, other: UnionSet) -> UnionSet {
        self.sets.extend(other.sets);
        self
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// True when there are no members.
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Iterate over members.
    pub fn iter(&self) -> impl Iterator<Item = &Set> {
        self.sets.iter()
    }

    /// Find the member with the given tuple name.
    pub fn find(&self, tuple: &str) -> Option<&Set> {
        self.sets.iter().find(|s| s.tuple_name() == Some(tuple))
    }
}

impl fmt::Display for UnionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ ")?;
        for (i, s) in self.sets.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", s)?;
        }
        write!(f, " }}")
    }
}

/// A union of named integer relations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnionMap {
    maps: Vec<Map>,
}

impl UnionMap {
    /// The empty union.
    pub fn new() -> Self {
        Self::default()
    }

    /// A union with a single member.
    pub fn from_map(map: Map) -> Self {
        Self { maps: vec![map] }
    }

    /// Add a member.
    pub fn add(&mut self, map: Map) {
        self.maps.push(map);
    }

    /// Union with another union.
    pub fn union(mut self, other: UnionMap) -> UnionMap {
        self.maps.extend(other.maps);
        self
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.maps.len()
    }

    /// True when there are no members.
    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    /// Iterate over members.
    pub fn iter(&self) -> impl Iterator<Item = &Map> {
        self.maps.iter()
    }

    /// Restrict each member to the matching member of a union set.
    ///
    /// Members whose input tuple has no counterpart in the union set are
    /// dropped (their restriction is empty).
    pub fn intersect_domain(&self, domain: &UnionSet) -> Result<UnionMap> {
        let mut out = UnionMap::new();
        for map in &self.maps {
            let set = map
                .in_tuple_name()
                .and_then(|name| domain.find(name));
            if let Some(set) = set {
                let restricted = map.intersect_domain(set)?;
                if !restricted.system.is_obviously_empty() {
                    out.add(restricted);
                }
            }
        }
        Ok(out)
    }
}

impl fmt::Display for UnionMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ ")?;
        for (i, m) in self.maps.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", m)?;
        }
        write!(f, " }}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_set_find() {
        let mut u = UnionSet::new();
        u.add(Set::from_text("{ S0[i] : 0 <= i < 4 }").unwrap());
        u.add(Set::from_text("{ S1[i] : 0 <= i < 8 }").unwrap());
        assert_eq!(u.len(), 2);
        assert!(u.find("S1").is_some());
        assert!(u.find("S2").is_none());
    }

    #[test]
    fn test_union_map_intersect_domain() {
        let mut schedule = UnionMap::new();
        schedule.add(Map::from_text("{ S0[i] -> [i] }").unwrap());
        schedule.add(Map::from_text("{ S1[i] -> [i] }").unwrap());

        let mut domain = UnionSet::new();
        domain.add(Set::from_text("{ S0[i] : 0 <= i < 4 }").unwrap());

        let restricted = schedule.intersect_domain(&domain).unwrap();
        assert_eq!(restricted.len(), 1);
        assert_eq!(restricted.iter().next().unwrap().in_tuple_name(), Some("S0"));
    }
}
