//! Primitive types, operators and expression trees.
//!
//! Expressions are the bodies of computations and the sizes of buffer
//! dimensions. They are plain trees; the scheduling core never evaluates
//! them, it only carries them through to the downstream code generator.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Primitive element types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveType {
    /// 8-bit unsigned integer
    U8,
    /// 8-bit signed integer
    I8,
    /// 16-bit unsigned integer
    U16,
    /// 16-bit signed integer
    I16,
    /// 32-bit unsigned integer
    U32,
    /// 32-bit signed integer
    I32,
    /// 64-bit unsigned integer
    U64,
    /// 64-bit signed integer
    I64,
    /// 32-bit float
    F32,
    /// 64-bit float
    F64,
    /// Boolean
    Bool,
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::U8 => "uint8",
            Self::I8 => "int8",
            Self::U16 => "uint16",
            Self::I16 => "int16",
            Self::U32 => "uint32",
            Self::I32 => "int32",
            Self::U64 => "uint64",
            Self::I64 => "int64",
            Self::F32 => "float32",
            Self::F64 => "float64",
            Self::Bool => "bool",
        };
        write!(f, "{}", s)
    }
}

/// Operation tags for expression nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Op {
    /// Unary negation
    Minus,
    /// Addition
    Add,
    /// Subtraction
    Sub,
    /// Multiplication
    Mul,
    /// Division
    Div,
    /// Modulo
    Mod,
    /// Minimum
    Min,
    /// Maximum
    Max,
    /// Equality comparison
    Eq,
    /// Inequality comparison
    Ne,
    /// Less-or-equal comparison
    Le,
    /// Less-than comparison
    Lt,
    /// Greater-or-equal comparison
    Ge,
    /// Greater-than comparison
    Gt,
    /// Logical and
    And,
    /// Logical or
    Or,
    /// Logical not
    Not,
    /// Conditional selection
    Cond,
    /// Function call
    Call,
    /// Buffer access
    Access,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Minus => "minus",
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Div => "div",
            Self::Mod => "mod",
            Self::Min => "min",
            Self::Max => "max",
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Le => "le",
            Self::Lt => "lt",
            Self::Ge => "ge",
            Self::Gt => "gt",
            Self::And => "and",
            Self::Or => "or",
            Self::Not => "not",
            Self::Cond => "cond",
            Self::Call => "call",
            Self::Access => "access",
        };
        write!(f, "{}", s)
    }
}

/// A literal value carrying its primitive type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// 8-bit unsigned
    U8(u8),
    /// 8-bit signed
    I8(i8),
    /// 16-bit unsigned
    U16(u16),
    /// 16-bit signed
    I16(i16),
    /// 32-bit unsigned
    U32(u32),
    /// 32-bit signed
    I32(i32),
    /// 64-bit unsigned
    U64(u64),
    /// 64-bit signed
    I64(i64),
    /// 32-bit float
    F32(f32),
    /// 64-bit float
    F64(f64),
    /// Boolean
    Bool(bool),
}

impl Value {
    /// The primitive type of the literal.
    pub fn dtype(&self) -> PrimitiveType {
        match self {
            Self::U8(_) => PrimitiveType::U8,
            Self::I8(_) => PrimitiveType::I8,
            Self::U16(_) => PrimitiveType::U16,
            Self::I16(_) => PrimitiveType::I16,
            Self::U32(_) => PrimitiveType::U32,
            Self::I32(_) => PrimitiveType::I32,
            Self::U64(_) => PrimitiveType::U64,
            Self::I64(_) => PrimitiveType::I64,
            Self::F32(_) => PrimitiveType::F32,
            Self::F64(_) => PrimitiveType::F64,
            Self::Bool(_) => PrimitiveType::Bool,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::U8(v) => write!(f, "{}", v),
            Self::I8(v) => write!(f, "{}", v),
            Self::U16(v) => write!(f, "{}", v),
            Self::I16(v) => write!(f, "{}", v),
            Self::U32(v) => write!(f, "{}", v),
            Self::I32(v) => write!(f, "{}", v),
            Self::U64(v) => write!(f, "{}", v),
            Self::I64(v) => write!(f, "{}", v),
            Self::F32(v) => write!(f, "{}", v),
            Self::F64(v) => write!(f, "{}", v),
            Self::Bool(v) => write!(f, "{}", v),
        }
    }
}

/// An expression tree. Leaves reference loop indices, invariants or
/// buffers by name; interior nodes are tagged operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// A named identifier (loop index, invariant, buffer).
    Id(String),
    /// A literal value.
    Val(Value),
    /// A tagged operation over operand subtrees.
    Operation {
        /// The operation tag.
        op: Op,
        /// Operand subtrees; `Call` and `Access` store the callee or
        /// buffer name as a leading `Id` operand.
        operands: Vec<Expr>,
    },
}

impl Expr {
    /// An identifier leaf.
    pub fn id(name: impl Into<String>) -> Self {
        Self::Id(name.into())
    }

    /// A literal leaf.
    pub fn val(value: Value) -> Self {
        Self::Val(value)
    }

    /// A 32-bit signed literal, the most common constant kind.
    pub fn int32(v: i32) -> Self {
        Self::Val(Value::I32(v))
    }

    /// An operation node.
    pub fn op(op: Op, operands: Vec<Expr>) -> Self {
        Self::Operation { op, operands }
    }

    /// An access to a buffer at the given index expressions.
    pub fn access(buffer: impl Into<String>, indices: Vec<Expr>) -> Self {
        let mut operands = vec![Expr::id(buffer)];
        operands.extend(indices);
        Self::Operation {
            op: Op::Access,
            operands,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(name) => write!(f, "{}", name),
            Self::Val(v) => write!(f, "{}", v),
            Self::Operation { op, operands } => {
                let parts: Vec<String> = operands.iter().map(|e| e.to_string()).collect();
                write!(f, "{}({})", op, parts.join(", "))
            }
        }
    }
}

/// Role a buffer plays in the generated function signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArgumentKind {
    /// Read-only input argument.
    Input,
    /// Output argument.
    Output,
    /// Function-local scratch storage, never part of the signature.
    Temporary,
}

impl fmt::Display for ArgumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Input => "input",
            Self::Output => "output",
            Self::Temporary => "temporary",
        };
        write!(f, "{}", s)
    }
}

/// Argument kind in the downstream code generator's signature model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternArgumentKind {
    /// Buffer read by the generated function.
    InputBuffer,
    /// Buffer written by the generated function.
    OutputBuffer,
}

impl ArgumentKind {
    /// Translate to the downstream signature model. Temporary buffers are
    /// never emitted as arguments.
    pub fn to_extern(self) -> Result<ExternArgumentKind> {
        match self {
            Self::Input => Ok(ExternArgumentKind::InputBuffer),
            Self::Output => Ok(ExternArgumentKind::OutputBuffer),
            Self::Temporary => Err(Error::UnsupportedTypeMapping(
                "temporary buffer as a function argument".to_string(),
            )),
        }
    }
}
