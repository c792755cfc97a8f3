//! Program IR: types, expressions, buffers, computations and functions.

pub mod buffer;
pub mod computation;
pub mod constant;
pub mod function;
pub mod types;

pub use buffer::Buffer;
pub use computation::{CompId, Computation, LET_STMT_PREFIX, ROOT_DIMENSION};
pub use constant::Constant;
pub use function::{Config, Function, GPU_THREAD_X, GPU_THREAD_Y};
pub use types::{ArgumentKind, Expr, ExternArgumentKind, Op, PrimitiveType, Value};
