//! Buffers: the memory objects computations read and write.

use crate::error::Result;
use crate::ir::types::{ArgumentKind, Expr, ExternArgumentKind, PrimitiveType};
use std::ffi::c_void;
use std::fmt;

/// A multi-dimensional buffer owned by a function.
///
/// Buffers are registered in the owning function's registry and referred
/// to by name from computation bodies; they hold no back-pointer.
#[derive(Debug, Clone)]
pub struct Buffer {
    /// Unique name within the owning function.
    pub name: String,
    /// Element type.
    pub dtype: PrimitiveType,
    /// One size expression per dimension, outermost first.
    pub dim_sizes: Vec<Expr>,
    /// Role in the generated function signature.
    pub kind: ArgumentKind,
    /// Opaque host data pointer, when the caller pre-binds storage.
    pub data: Option<*mut c_void>,
}

impl Buffer {
    /// Create a buffer with no bound data.
    pub fn new(
        name: impl Into<String>,
        dim_sizes: Vec<Expr>,
        dtype: PrimitiveType,
        kind: ArgumentKind,
    ) -> Self {
        Self {
            name: name.into(),
            dtype,
            dim_sizes,
            kind,
            data: None,
        }
    }

    /// Number of dimensions.
    pub fn n_dims(&self) -> usize {
        self.dim_sizes.len()
    }

    /// Translate the argument role to the downstream signature model.
    /// Fails for temporaries, which never appear in the signature.
    pub fn extern_kind(&self) -> Result<ExternArgumentKind> {
        self.kind.to_extern()
    }

    /// Diagnostic dump through the `log` facade.
    pub fn dump(&self) {
        log::debug!("{}", self);
    }
}

impl fmt::Display for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sizes: Vec<String> = self.dim_sizes.iter().map(|e| e.to_string()).collect();
        write!(
            f,
            "buffer \"{}\" [{}] of {} ({}, data {})",
            self.name,
            sizes.join(", "),
            self.dtype,
            self.kind,
            if self.data.is_some() { "bound" } else { "unbound" }
        )
    }
}
