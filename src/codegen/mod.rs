//! AST generation from scheduled functions.
//!
//! The builder consumes a union schedule restricted to its iteration
//! domain and produces the loop AST handed to the downstream code
//! generator, invoking the registered per-leaf and post-for callbacks
//! along the way.

pub mod ast;
pub mod build;

pub use ast::{AstBinOp, AstExpr, AstNode};
pub use build::AstBuild;
