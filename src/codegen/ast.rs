//! AST nodes produced from a scheduled program.
//!
//! The AST bridges the polyhedral representation and a downstream code
//! generator: loops over time dimensions, sequence blocks for static
//! ordering, and user statements carrying their access expressions.

use std::fmt;

/// Expression in the generated AST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AstExpr {
    /// Integer constant
    Int(i64),
    /// Variable reference
    Var(String),
    /// Binary operation
    Binary {
        /// Operator
        op: AstBinOp,
        /// Left operand
        left: Box<AstExpr>,
        /// Right operand
        right: Box<AstExpr>,
    },
    /// Floor division
    FloorDiv(Box<AstExpr>, Box<AstExpr>),
    /// Ceiling division
    CeilDiv(Box<AstExpr>, Box<AstExpr>),
    /// Minimum of two expressions
    Min(Box<AstExpr>, Box<AstExpr>),
    /// Maximum of two expressions
    Max(Box<AstExpr>, Box<AstExpr>),
}

/// Binary operators in AST expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AstBinOp {
    /// Addition
    Add,
    /// Subtraction
    Sub,
    /// Multiplication
    Mul,
}

impl AstExpr {
    /// Integer constant.
    pub fn int(v: i64) -> Self {
        Self::Int(v)
    }

    /// Variable reference.
    pub fn var(name: impl Into<String>) -> Self {
        Self::Var(name.into())
    }

    /// Addition.
    pub fn add(self, other: Self) -> Self {
        Self::Binary {
            op: AstBinOp::Add,
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    /// Multiplication.
    pub fn mul(self, other: Self) -> Self {
        Self::Binary {
            op: AstBinOp::Mul,
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    /// Floor division.
    pub fn floordiv(self, other: Self) -> Self {
        Self::FloorDiv(Box::new(self), Box::new(other))
    }

    /// Ceiling division.
    pub fn ceildiv(self, other: Self) -> Self {
        Self::CeilDiv(Box::new(self), Box::new(other))
    }

    /// Minimum.
    pub fn min(self, other: Self) -> Self {
        Self::Min(Box::new(self), Box::new(other))
    }

    /// Maximum.
    pub fn max(self, other: Self) -> Self {
        Self::Max(Box::new(self), Box::new(other))
    }

    /// Try to evaluate as a constant.
    pub fn eval_constant(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Binary { op, left, right } => {
                let l = left.eval_constant()?;
                let r = right.eval_constant()?;
                Some(match op {
                    AstBinOp::Add => l + r,
                    AstBinOp::Sub => l - r,
                    AstBinOp::Mul => l * r,
                })
            }
            Self::FloorDiv(a, b) => {
                let (a, b) = (a.eval_constant()?, b.eval_constant()?);
                if b == 0 {
                    return None;
                }
                Some(crate::polyhedral::expr::floor_div(a, b))
            }
            Self::CeilDiv(a, b) => {
                let (a, b) = (a.eval_constant()?, b.eval_constant()?);
                if b == 0 {
                    return None;
                }
                Some(crate::polyhedral::expr::ceil_div(a, b))
            }
            Self::Min(a, b) => Some(a.eval_constant()?.min(b.eval_constant()?)),
            Self::Max(a, b) => Some(a.eval_constant()?.max(b.eval_constant()?)),
            _ => None,
        }
    }

    /// Constant-fold and apply identity simplifications.
    pub fn simplify(self) -> Self {
        if let Some(v) = self.eval_constant() {
            return Self::Int(v);
        }
        match self {
            Self::Binary { op, left, right } => {
                let l = left.simplify();
                let r = right.simplify();
                match (&op, l.eval_constant(), r.eval_constant()) {
                    (AstBinOp::Add, Some(0), _) => return r,
                    (AstBinOp::Add, _, Some(0)) => return l,
                    (AstBinOp::Sub, _, Some(0)) => return l,
                    (AstBinOp::Mul, Some(1), _) => return r,
                    (AstBinOp::Mul, _, Some(1)) => return l,
                    (AstBinOp::Mul, Some(0), _) | (AstBinOp::Mul, _, Some(0)) => {
                        return Self::Int(0)
                    }
                    _ => {}
                }
                Self::Binary {
                    op,
                    left: Box::new(l),
                    right: Box::new(r),
                }
            }
            Self::Min(a, b) => {
                let a = a.simplify();
                let b = b.simplify();
                if a == b {
                    return a;
                }
                Self::Min(Box::new(a), Box::new(b))
            }
            Self::Max(a, b) => {
                let a = a.simplify();
                let b = b.simplify();
                if a == b {
                    return a;
                }
                Self::Max(Box::new(a), Box::new(b))
            }
            Self::FloorDiv(a, b) => {
                let a = a.simplify();
                let b = b.simplify();
                if b.eval_constant() == Some(1) {
                    return a;
                }
                Self::FloorDiv(Box::new(a), Box::new(b))
            }
            Self::CeilDiv(a, b) => {
                let a = a.simplify();
                let b = b.simplify();
                if b.eval_constant() == Some(1) {
                    return a;
                }
                Self::CeilDiv(Box::new(a), Box::new(b))
            }
            other => other,
        }
    }
}

impl fmt::Display for AstExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::Var(name) => write!(f, "{}", name),
            Self::Binary { op, left, right } => {
                let op_str = match op {
                    AstBinOp::Add => "+",
                    AstBinOp::Sub => "-",
                    AstBinOp::Mul => "*",
                };
                write!(f, "({} {} {})", left, op_str, right)
            }
            Self::FloorDiv(a, b) => write!(f, "floord({}, {})", a, b),
            Self::CeilDiv(a, b) => write!(f, "ceild({}, {})", a, b),
            Self::Min(a, b) => write!(f, "min({}, {})", a, b),
            Self::Max(a, b) => write!(f, "max({}, {})", a, b),
        }
    }
}

/// AST node for the scheduled program.
#[derive(Debug, Clone, PartialEq)]
pub enum AstNode {
    /// A for loop over one dynamic time dimension.
    For {
        /// Loop iterator variable
        iterator: String,
        /// Lower bound (inclusive)
        lower: AstExpr,
        /// Upper bound (inclusive)
        upper: AstExpr,
        /// Loop body
        body: Vec<AstNode>,
    },
    /// An ordered sequence of subtrees (static ordering).
    Block(Vec<AstNode>),
    /// A user statement instance with its access expressions.
    User {
        /// Computation name
        name: String,
        /// Original iterators expressed over the loop variables
        args: Vec<AstExpr>,
    },
}

impl AstNode {
    /// Iterate over all `User` leaves of the tree.
    pub fn leaves(&self) -> Vec<&AstNode> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a AstNode>) {
        match self {
            AstNode::For { body, .. } => {
                for n in body {
                    n.collect_leaves(out);
                }
            }
            AstNode::Block(nodes) => {
                for n in nodes {
                    n.collect_leaves(out);
                }
            }
            AstNode::User { .. } => out.push(self),
        }
    }

    /// Depth of the deepest loop nest in the tree.
    pub fn loop_depth(&self) -> usize {
        match self {
            AstNode::For { body, .. } => {
                1 + body.iter().map(|n| n.loop_depth()).max().unwrap_or(0)
            }
            AstNode::Block(nodes) => nodes.iter().map(|n| n.loop_depth()).max().unwrap_or(0),
            AstNode::User { .. } => 0,
        }
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let pad = "  ".repeat(depth);
        match self {
            AstNode::For {
                iterator,
                lower,
                upper,
                body,
            } => {
                writeln!(f, "{}for ({} = {}; {} <= {}; {}++)", pad, iterator, lower, iterator, upper, iterator)?;
                for n in body {
                    n.write_indented(f, depth + 1)?;
                }
                Ok(())
            }
            AstNode::Block(nodes) => {
                for n in nodes {
                    n.write_indented(f, depth)?;
                }
                Ok(())
            }
            AstNode::User { name, args } => {
                let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                writeln!(f, "{}{}({})", pad, name, args.join(", "))
            }
        }
    }
}

impl fmt::Display for AstNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simplify_identities() {
        let e = AstExpr::int(0).add(AstExpr::var("x"));
        assert_eq!(e.simplify(), AstExpr::var("x"));

        let e = AstExpr::var("x").mul(AstExpr::int(1));
        assert_eq!(e.simplify(), AstExpr::var("x"));

        let e = AstExpr::int(2).add(AstExpr::int(3));
        assert_eq!(e.simplify(), AstExpr::Int(5));
    }

    #[test]
    fn test_constant_folding_div() {
        let e = AstExpr::int(-7).floordiv(AstExpr::int(2));
        assert_eq!(e.simplify(), AstExpr::Int(-4));
        let e = AstExpr::int(7).ceildiv(AstExpr::int(2));
        assert_eq!(e.simplify(), AstExpr::Int(4));
    }

    #[test]
    fn test_min_of_equal_terms() {
        let e = AstExpr::var("n").min(AstExpr::var("n"));
        assert_eq!(e.simplify(), AstExpr::var("n"));
    }

    #[test]
    fn test_display() {
        let e = AstExpr::var("i").add(AstExpr::int(1));
        assert_eq!(e.to_string(), "(i + 1)");
        let e = AstExpr::var("i").floordiv(AstExpr::int(32));
        assert_eq!(e.to_string(), "floord(i, 32)");
    }

    #[test]
    fn test_leaves_and_depth() {
        let tree = AstNode::For {
            iterator: "c0".to_string(),
            lower: AstExpr::int(0),
            upper: AstExpr::int(9),
            body: vec![AstNode::User {
                name: "S0".to_string(),
                args: vec![AstExpr::var("c0")],
            }],
        };
        assert_eq!(tree.leaves().len(), 1);
        assert_eq!(tree.loop_depth(), 1);
    }
}
