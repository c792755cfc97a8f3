//! # polysched - Polyhedral Scheduling Core
//!
//! The scheduling core of a polyhedral compiler: computations are named
//! statements over integer iteration domains, each carrying an affine
//! schedule into a shared multi-dimensional time space. Scheduling
//! transformations rewrite those relations in place; AST generation
//! projects the result into a loop tree for a downstream code generator.
//!
//! ## Architecture
//!
//! ```text
//! Function ── Computations ── Schedules (polyhedral relations)
//!     │             │
//!     │         transformations (split / interchange / tile / ordering)
//!     │             │
//!     └── align ── schedule ∩ domain ── AST builder ── AST
//! ```
//!
//! ## Example
//!
//! ```rust
//! use polysched::prelude::*;
//!
//! let mut f = Function::new("blur");
//! let s = f.add_computation(Computation::new(
//!     "{ S0[i, j] : 0 <= i < 128 and 0 <= j < 128 }",
//!     Expr::int32(0),
//!     PrimitiveType::F32,
//! )?)?;
//!
//! // Tile the two loops 32x32 and mark the outer tile loop parallel.
//! f.tile(s, 1, 3, 32, 32)?;
//! f.tag_parallel_dimension(s, 1);
//!
//! let ast = f.generate_ast()?;
//! assert_eq!(ast.loop_depth(), 4);
//! # Ok::<(), polysched::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codegen;
pub mod error;
pub mod ir;
pub mod polyhedral;
pub mod schedule;

pub use error::{Error, Result};

/// Convenient re-exports of the commonly used types.
pub mod prelude {
    //! The types most user code needs.

    pub use crate::codegen::{AstExpr, AstNode};
    pub use crate::error::{Error, Result};
    pub use crate::ir::{
        ArgumentKind, Buffer, CompId, Computation, Config, Constant, Expr, Function, Op,
        PrimitiveType, Value, LET_STMT_PREFIX, ROOT_DIMENSION,
    };
    pub use crate::polyhedral::{Map, Set, UnionMap, UnionSet};
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
