//! Computations: named statements with an iteration domain and a schedule.

use crate::codegen::ast::AstExpr;
use crate::error::{Error, Result};
use crate::ir::types::{Expr, PrimitiveType};
use crate::polyhedral::map::Map;
use crate::polyhedral::set::Set;
use crate::schedule;

/// Reserved prefix marking synthesized let-statement computations.
///
/// `set_schedule` uses it to repair input tuple names that omit the
/// prefix (see [`crate::ir::function::Function::set_schedule`]).
pub const LET_STMT_PREFIX: &str = "_let_stmt_";

/// The ordering level denoting "outside all loops".
pub const ROOT_DIMENSION: i32 = -1;

/// Handle to a computation inside its owning function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompId(pub usize);

impl std::fmt::Display for CompId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "C{}", self.0)
    }
}

/// A statement instance set with its schedule and body expression.
///
/// The owning [`crate::ir::function::Function`] holds all computations;
/// scheduling operations go through it so that cross-computation
/// invariants (unique names, rank alignment, peer ordering) are enforced
/// in one place.
#[derive(Debug, Clone)]
pub struct Computation {
    pub(crate) name: String,
    pub(crate) domain: Set,
    pub(crate) schedule: Map,
    /// The body expression; leaves may reference buffers and loop indices.
    pub body: Expr,
    /// Element type produced by the computation.
    pub dtype: PrimitiveType,
    /// Deterministic re-linearization key for peer ordering.
    pub(crate) relative_order: i64,
    /// When false, the computation is only referenced from others (a let
    /// binding) and is not emitted as its own scheduled statement.
    pub schedule_this_computation: bool,
    /// Access expressions captured by the AST leaf callback.
    pub index_expr: Vec<AstExpr>,
}

impl Computation {
    /// Create a computation from a textual iteration domain, e.g.
    /// `[N] -> { S0[i, j] : 0 <= i < N and 0 <= j < N }`.
    ///
    /// The computation takes its name from the domain's tuple and starts
    /// with the interleaved identity schedule: static ordering slots at
    /// output positions `0, 2, 4, ...` pinned to zero, domain iterators
    /// at positions `1, 3, 5, ...`.
    pub fn new(domain_text: &str, body: Expr, dtype: PrimitiveType) -> Result<Self> {
        let domain = Set::from_text(domain_text)?;
        Self::from_set(domain, body, dtype)
    }

    /// Create a computation from an already-built iteration domain.
    pub fn from_set(domain: Set, body: Expr, dtype: PrimitiveType) -> Result<Self> {
        let name = domain
            .tuple_name()
            .ok_or_else(|| Error::poly("iteration domain must have a tuple name"))?
            .to_string();
        let schedule = schedule::time_identity(&domain.space);
        Ok(Self {
            name,
            domain,
            schedule,
            body,
            dtype,
            relative_order: 0,
            schedule_this_computation: true,
            index_expr: Vec::new(),
        })
    }

    /// The computation's name, unique within its function.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The iteration domain.
    pub fn iteration_domain(&self) -> &Set {
        &self.domain
    }

    /// The current schedule.
    pub fn schedule(&self) -> &Map {
        &self.schedule
    }

    /// The image of the iteration domain under the schedule.
    pub fn time_processor_domain(&self) -> Result<Set> {
        self.schedule.apply(&self.domain)
    }

    /// Replace the schedule, re-establishing the tuple-name invariant.
    pub(crate) fn store_schedule(&mut self, mut map: Map) {
        map.set_in_tuple_name(self.name.clone());
        self.schedule = map;
    }

    /// Diagnostic dump of the whole computation.
    pub fn dump(&self) {
        log::debug!(
            "computation \"{}\" (scheduled: {})",
            self.name,
            self.schedule_this_computation
        );
        self.dump_iteration_domain();
        self.dump_schedule();
        log::debug!("body: {}", self.body);
        for e in &self.index_expr {
            log::debug!("access expression: {}", e);
        }
    }

    /// Diagnostic dump of the schedule.
    pub fn dump_schedule(&self) {
        log::debug!("schedule: {}", self.schedule);
    }

    /// Diagnostic dump of the iteration domain.
    pub fn dump_iteration_domain(&self) {
        log::debug!("iteration domain: {}", self.domain);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comp() -> Computation {
        Computation::new(
            "{ S0[i, j] : 0 <= i < 8 and 0 <= j < 8 }",
            Expr::int32(0),
            PrimitiveType::I32,
        )
        .unwrap()
    }

    #[test]
    fn test_name_from_domain_tuple() {
        let c = comp();
        assert_eq!(c.name(), "S0");
        assert!(c.schedule_this_computation);
    }

    #[test]
    fn test_initial_schedule_is_interleaved_identity() {
        let c = comp();
        let s = c.schedule();
        assert_eq!(s.n_in(), 2);
        assert_eq!(s.n_out(), 5);
        assert_eq!(s.in_tuple_name(), Some("S0"));
        for pos in [0, 2, 4] {
            assert_eq!(s.out_dim_constant(pos), Some(0));
        }
        // (i, j) maps to (0, i, 0, j, 0).
        assert!(s.system.is_satisfied(&[3, 5, 0, 3, 0, 5, 0]));
        assert!(!s.system.is_satisfied(&[3, 5, 0, 5, 0, 3, 0]));
    }

    #[test]
    fn test_time_processor_domain() {
        let c = comp();
        let t = c.time_processor_domain().unwrap();
        assert_eq!(t.n_dim(), 5);
        assert!(t.contains(&[0, 7, 0, 0, 0], &[]));
        assert!(!t.contains(&[0, 8, 0, 0, 0], &[]));
        assert!(!t.contains(&[1, 0, 0, 0, 0], &[]));
    }

    #[test]
    fn test_domain_must_be_named() {
        let err = Computation::new("{ [i] : 0 <= i < 4 }", Expr::int32(0), PrimitiveType::I32);
        assert!(err.is_err());
    }
}
