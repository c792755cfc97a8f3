//! AST construction from a domain-restricted schedule.
//!
//! `AstBuild` walks the time dimensions of the union schedule left to
//! right. Output dimensions pinned to a constant for every statement are
//! static ordering levels and become ordered sequences; the remaining
//! dimensions become loops whose bounds are projected out of the
//! time-processor sets. Leaves are user statements whose arguments are
//! the original domain iterators solved from the schedule relation.

use crate::codegen::ast::{AstExpr, AstNode};
use crate::error::{Error, Result};
use crate::polyhedral::constraint::{Constraint, ConstraintSystem};
use crate::polyhedral::expr::AffineExpr;
use crate::polyhedral::set::Set;
use crate::polyhedral::space::Space;
use crate::polyhedral::union::UnionMap;

/// Callback invoked at each user-statement leaf.
pub type DomainCallback<'a> = Box<dyn FnMut(&str, &[AstExpr]) + 'a>;
/// Callback invoked after each for node is built; may rewrite the node.
pub type ForCallback<'a> = Box<dyn FnMut(AstNode) -> AstNode + 'a>;

/// Builder for ASTs from union schedules.
pub struct AstBuild<'a> {
    context: Option<&'a Set>,
    atomic_upper_bound: bool,
    exploit_nested_bounds: bool,
    at_each_domain: Option<DomainCallback<'a>>,
    after_each_for: Option<ForCallback<'a>>,
}

/// One statement's relation and time set, re-laid over the merged
/// parameter list.
struct StmtInfo {
    name: String,
    n_in: usize,
    in_names: Vec<String>,
    /// Rows over `[params | in | time]`.
    rel: ConstraintSystem,
    /// Rows over `[params | time]`, context included.
    time: ConstraintSystem,
}

/// The bounds of one loop dimension for one statement.
struct LoopBounds {
    lower: AstExpr,
    upper: AstExpr,
    /// The surviving bound rows over `[params | time]`, available as
    /// context when bounding deeper dimensions.
    rows: Vec<Constraint>,
}

impl<'a> AstBuild<'a> {
    /// A builder with no context set.
    pub fn new() -> Self {
        Self {
            context: None,
            atomic_upper_bound: false,
            exploit_nested_bounds: false,
            at_each_domain: None,
            after_each_for: None,
        }
    }

    /// A builder whose loop bounds may assume the context constraints.
    pub fn from_context(context: &'a Set) -> Self {
        let mut build = Self::new();
        build.context = Some(context);
        build
    }

    /// Emit a single min/max-combined bound expression per loop.
    pub fn set_atomic_upper_bound(mut self, enable: bool) -> Self {
        self.atomic_upper_bound = enable;
        self
    }

    /// Prune bound terms already guaranteed by the enclosing loops.
    pub fn set_exploit_nested_bounds(mut self, enable: bool) -> Self {
        self.exploit_nested_bounds = enable;
        self
    }

    /// Register the per-leaf callback.
    pub fn at_each_domain(mut self, cb: impl FnMut(&str, &[AstExpr]) + 'a) -> Self {
        self.at_each_domain = Some(Box::new(cb));
        self
    }

    /// Register the post-for callback.
    pub fn after_each_for(mut self, cb: impl FnMut(AstNode) -> AstNode + 'a) -> Self {
        self.after_each_for = Some(Box::new(cb));
        self
    }

    /// Build an AST from a union schedule already restricted to its
    /// iteration domain.
    pub fn build_from_schedule_map(&mut self, schedule: &UnionMap) -> Result<AstNode> {
        if schedule.is_empty() {
            return Err(Error::poly("cannot build an AST from an empty schedule"));
        }
        log::debug!(
            "building AST (atomic_upper_bound={}, exploit_nested_bounds={}) from {}",
            self.atomic_upper_bound,
            self.exploit_nested_bounds,
            schedule
        );

        let d_total = schedule.iter().next().unwrap().n_out();
        for map in schedule.iter() {
            if map.n_out() != d_total {
                return Err(Error::poly(
                    "schedules must be rank-aligned before AST generation",
                ));
            }
        }

        // Merge parameter lists across all members and the context.
        let mut params: Vec<String> = Vec::new();
        for map in schedule.iter() {
            params = Space::merge_params(&params, &map.space.params).0;
        }
        if let Some(ctx) = self.context {
            if ctx.n_dim() != 0 {
                return Err(Error::poly("context must be a parameter-only set"));
            }
            params = Space::merge_params(&params, &ctx.space.params).0;
        }
        let np = params.len();

        let mut stmts = Vec::new();
        for map in schedule.iter() {
            let name = map
                .in_tuple_name()
                .ok_or_else(|| Error::poly("schedule member has an unnamed input tuple"))?
                .to_string();
            let n_in = map.n_in();
            let param_map: Vec<usize> = map
                .space
                .params
                .iter()
                .map(|p| params.iter().position(|q| q == p).unwrap())
                .collect();
            let col_map: Vec<usize> = param_map
                .iter()
                .copied()
                .chain((0..n_in + d_total).map(|i| np + i))
                .collect();
            let rel = map.system.remap(np + n_in + d_total, &col_map);

            let mut time = rel.clone();
            let in_cols: Vec<usize> = (np..np + n_in).collect();
            time.eliminate_cols(&in_cols);
            if let Some(ctx) = self.context {
                let ctx_map: Vec<usize> = ctx
                    .space
                    .params
                    .iter()
                    .map(|p| params.iter().position(|q| q == p).unwrap())
                    .collect();
                time.constraints
                    .extend(ctx.system.remap(np + d_total, &ctx_map).constraints);
            }
            time.tidy();
            if time.is_obviously_empty() {
                continue;
            }

            stmts.push(StmtInfo {
                name,
                n_in,
                in_names: map.in_dim_names(),
                rel,
                time,
            });
        }

        if stmts.is_empty() {
            return Err(Error::poly("all schedule members have empty domains"));
        }

        let order: Vec<usize> = (0..stmts.len()).collect();
        let ctxs = vec![ConstraintSystem::new(np + d_total); stmts.len()];
        let nodes = self.generate(0, d_total, np, &params, &stmts, &order, &ctxs)?;
        Ok(match nodes.len() {
            1 => nodes.into_iter().next().unwrap(),
            _ => AstNode::Block(nodes),
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn generate(
        &mut self,
        level: usize,
        d_total: usize,
        np: usize,
        params: &[String],
        stmts: &[StmtInfo],
        active: &[usize],
        ctxs: &[ConstraintSystem],
    ) -> Result<Vec<AstNode>> {
        if level == d_total {
            let mut out = Vec::new();
            for &idx in active {
                let stmt = &stmts[idx];
                let args = solve_iterators(stmt, np, d_total, params)?;
                if let Some(cb) = self.at_each_domain.as_mut() {
                    cb(&stmt.name, &args);
                }
                out.push(AstNode::User {
                    name: stmt.name.clone(),
                    args,
                });
            }
            return Ok(out);
        }

        let values: Vec<Option<i64>> = active
            .iter()
            .map(|&idx| stmts[idx].time.pinned_value(np + level))
            .collect();

        if values.iter().all(|v| v.is_some()) {
            // Static ordering level: group by the constant coordinate.
            let mut groups: Vec<(i64, Vec<usize>)> = Vec::new();
            for (&idx, v) in active.iter().zip(&values) {
                let v = v.unwrap();
                match groups.iter_mut().find(|(gv, _)| *gv == v) {
                    Some((_, members)) => members.push(idx),
                    None => groups.push((v, vec![idx])),
                }
            }
            groups.sort_by_key(|(v, _)| *v);
            let mut out = Vec::new();
            for (_, members) in groups {
                out.extend(self.generate(level + 1, d_total, np, params, stmts, &members, ctxs)?);
            }
            return Ok(out);
        }

        if values.iter().any(|v| v.is_some()) {
            return Err(Error::poly(format!(
                "computations disagree on whether dimension {} is a static ordering level",
                level
            )));
        }

        // Dynamic level: one loop covering all active statements.
        let names = col_names(params, level);
        let mut lowers = Vec::new();
        let mut uppers = Vec::new();
        let mut new_ctxs = ctxs.to_vec();
        for &idx in active {
            let bounds = self.loop_bounds(&stmts[idx].time, &ctxs[idx], np, d_total, level, &names)?;
            push_unique(&mut lowers, bounds.lower);
            push_unique(&mut uppers, bounds.upper);
            new_ctxs[idx].constraints.extend(bounds.rows);
        }
        // The loop of a union covers every member: min of the lower
        // bounds, max of the upper bounds.
        let lower = fold_bounds(lowers, AstExpr::min);
        let upper = fold_bounds(uppers, AstExpr::max);

        let body = self.generate(level + 1, d_total, np, params, stmts, active, &new_ctxs)?;
        let mut node = AstNode::For {
            iterator: format!("c{}", level),
            lower: lower.simplify(),
            upper: upper.simplify(),
            body,
        };
        if let Some(cb) = self.after_each_for.as_mut() {
            node = cb(node);
        }
        Ok(vec![node])
    }

    /// Inclusive loop bounds of one time dimension for one statement,
    /// expressed over the parameters and the outer loop iterators.
    fn loop_bounds(
        &self,
        time: &ConstraintSystem,
        ctx: &ConstraintSystem,
        np: usize,
        d_total: usize,
        level: usize,
        names: &[String],
    ) -> Result<LoopBounds> {
        let mut sys = time.clone();
        let inner: Vec<usize> = (np + level + 1..np + d_total).collect();
        sys.eliminate_cols(&inner);
        let n_proj = sys.n_cols;

        let col = np + level;

        // A unit equality collapses the loop to a single iteration.
        for c in &sys.constraints {
            if c.is_equality() && c.expr.coeff(col).abs() == 1 {
                let a = c.expr.coeff(col);
                let mut rest = c.expr.clone();
                rest.set_coeff(col, 0);
                let e = affine_to_ast(&rest.scale(-a), names).simplify();
                return Ok(LoopBounds {
                    lower: e.clone(),
                    upper: e,
                    rows: vec![widen(c, n_proj, np + d_total)],
                });
            }
        }

        // Conjoin the bounds guaranteed by the enclosing loops; they only
        // mention outer columns, so truncation to the projected layout is
        // lossless.
        let mut rows: Vec<Constraint> = sys.constraints.clone();
        if self.exploit_nested_bounds {
            for c in &ctx.constraints {
                rows.push(truncate(c, n_proj));
            }
        }

        let mut candidates: Vec<Constraint> = rows
            .iter()
            .filter(|c| !c.is_equality() && c.expr.coeff(col) != 0)
            .cloned()
            .collect();

        if self.exploit_nested_bounds && candidates.len() > 1 {
            let mut k = 0;
            while k < candidates.len() {
                if candidates.len() == 1 {
                    break;
                }
                let r = candidates[k].clone();
                let mut test: Vec<Constraint> = rows
                    .iter()
                    .filter(|c| **c != r)
                    .cloned()
                    .collect();
                // not(expr >= 0)  <=>  -expr - 1 >= 0
                let mut neg = r.expr.clone().scale(-1);
                neg.constant -= 1;
                test.push(Constraint::ge_zero(neg));
                if rationally_infeasible(test, n_proj) {
                    rows.retain(|c| *c != r);
                    candidates.remove(k);
                } else {
                    k += 1;
                }
            }
        }

        let mut lowers = Vec::new();
        let mut uppers = Vec::new();
        let mut kept_rows = Vec::new();
        for c in &candidates {
            let a = c.expr.coeff(col);
            let mut rest = c.expr.clone();
            rest.set_coeff(col, 0);
            if a > 0 {
                // a*x + rest >= 0  =>  x >= ceil(-rest / a)
                let num = affine_to_ast(&rest.scale(-1), names).simplify();
                let bound = if a == 1 {
                    num
                } else {
                    num.ceildiv(AstExpr::int(a))
                };
                push_unique(&mut lowers, bound);
            } else {
                // a*x + rest >= 0  =>  x <= floor(rest / |a|)
                let num = affine_to_ast(&rest, names).simplify();
                let bound = if a == -1 {
                    num
                } else {
                    num.floordiv(AstExpr::int(-a))
                };
                push_unique(&mut uppers, bound);
            }
            kept_rows.push(widen(c, n_proj, np + d_total));
        }

        if lowers.is_empty() || uppers.is_empty() {
            return Err(Error::poly(format!(
                "schedule dimension {} is unbounded; the iteration domain must bound every loop",
                level
            )));
        }

        Ok(LoopBounds {
            lower: fold_bounds(lowers, AstExpr::max),
            upper: fold_bounds(uppers, AstExpr::min),
            rows: kept_rows,
        })
    }
}

impl Default for AstBuild<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Column display names for a time system: parameters then `c0..`.
fn col_names(params: &[String], up_to_level: usize) -> Vec<String> {
    params
        .iter()
        .cloned()
        .chain((0..up_to_level).map(|k| format!("c{}", k)))
        .collect()
}

/// Re-lay a projected row over the full `[params | time]` layout.
fn widen(c: &Constraint, from_cols: usize, to_cols: usize) -> Constraint {
    let mut expr = c.expr.clone();
    expr.insert_cols(from_cols, to_cols - from_cols);
    Constraint {
        kind: c.kind,
        expr,
    }
}

/// Drop trailing zero columns of a wide row.
fn truncate(c: &Constraint, to_cols: usize) -> Constraint {
    let mut expr = AffineExpr::zero(to_cols);
    expr.constant = c.expr.constant;
    for i in 0..to_cols {
        expr.set_coeff(i, c.expr.coeff(i));
    }
    debug_assert!(c.expr.coeffs.iter().skip(to_cols).all(|&v| v == 0));
    Constraint {
        kind: c.kind,
        expr,
    }
}

/// Fourier-Motzkin feasibility test, exact over the rationals.
fn rationally_infeasible(rows: Vec<Constraint>, n_cols: usize) -> bool {
    let mut sys = ConstraintSystem::new(n_cols);
    for r in rows {
        sys.add(r);
    }
    let all: Vec<usize> = (0..n_cols).collect();
    sys.eliminate_cols(&all);
    sys.is_obviously_empty()
}

fn push_unique(list: &mut Vec<AstExpr>, e: AstExpr) {
    let e = e.simplify();
    if !list.contains(&e) {
        list.push(e);
    }
}

fn fold_bounds(mut list: Vec<AstExpr>, combine: fn(AstExpr, AstExpr) -> AstExpr) -> AstExpr {
    let first = list.remove(0);
    list.into_iter().fold(first, combine)
}

/// Convert an affine row into an AST expression using column names.
fn affine_to_ast(expr: &AffineExpr, names: &[String]) -> AstExpr {
    let mut acc: Option<AstExpr> = None;
    for (i, &c) in expr.coeffs.iter().enumerate() {
        if c == 0 {
            continue;
        }
        let var = AstExpr::var(names[i].clone());
        let term = if c == 1 {
            var
        } else {
            AstExpr::int(c).mul(var)
        };
        acc = Some(match acc {
            Some(a) => a.add(term),
            None => term,
        });
    }
    match acc {
        Some(a) => {
            if expr.constant != 0 {
                a.add(AstExpr::int(expr.constant))
            } else {
                a
            }
        }
        None => AstExpr::int(expr.constant),
    }
}

/// Express a statement's original iterators over the loop variables by
/// solving the schedule relation.
fn solve_iterators(
    stmt: &StmtInfo,
    np: usize,
    d_total: usize,
    params: &[String],
) -> Result<Vec<AstExpr>> {
    // Static coordinates get substituted so the solved expressions only
    // reference real loop iterators.
    let statics: Vec<Option<i64>> = (0..d_total)
        .map(|level| stmt.time.pinned_value(np + level))
        .collect();
    let names = col_names(params, d_total);

    let mut args = Vec::with_capacity(stmt.n_in);
    for j in 0..stmt.n_in {
        let mut sys = stmt.rel.clone();
        // Project out every other input dimension; the target input lands
        // at column `np` afterwards.
        let others: Vec<usize> = (0..stmt.n_in).filter(|&k| k != j).map(|k| np + k).collect();
        sys.eliminate_cols(&others);

        let col = np;
        let mut solved = None;
        for c in &sys.constraints {
            if !c.is_equality() {
                continue;
            }
            let a = c.expr.coeff(col);
            if a.abs() != 1 {
                continue;
            }
            let mut rest = c.expr.clone();
            rest.set_coeff(col, 0);
            let mut rest = rest.scale(-a);
            // Substitute static coordinates by their constants.
            for (level, v) in statics.iter().enumerate() {
                if let Some(v) = v {
                    let tcol = np + 1 + level;
                    let coeff = rest.coeff(tcol);
                    if coeff != 0 {
                        rest.constant += coeff * v;
                        rest.set_coeff(tcol, 0);
                    }
                }
            }
            // Re-lay over [params | time] for naming.
            let mut layed = AffineExpr::zero(np + d_total);
            layed.constant = rest.constant;
            for p in 0..np {
                layed.set_coeff(p, rest.coeff(p));
            }
            for t in 0..d_total {
                layed.set_coeff(np + t, rest.coeff(np + 1 + t));
            }
            solved = Some(affine_to_ast(&layed, &names).simplify());
            break;
        }

        args.push(solved.unwrap_or_else(|| AstExpr::var(stmt.in_names[j].clone())));
    }
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polyhedral::map::Map;
    use crate::polyhedral::set::Set;
    use crate::polyhedral::union::{UnionMap, UnionSet};

    fn restricted(map_text: &str, set_text: &str) -> UnionMap {
        let map = Map::from_text(map_text).unwrap();
        let set = Set::from_text(set_text).unwrap();
        UnionMap::from_map(map)
            .intersect_domain(&UnionSet::from_set(set))
            .unwrap()
    }

    #[test]
    fn test_single_loop() {
        let umap = restricted("{ S[i] -> [0, i, 0] }", "{ S[i] : 0 <= i < 10 }");
        let ast = AstBuild::new().build_from_schedule_map(&umap).unwrap();
        match &ast {
            AstNode::For {
                iterator,
                lower,
                upper,
                body,
            } => {
                assert_eq!(iterator, "c1");
                assert_eq!(lower, &AstExpr::int(0));
                assert_eq!(upper, &AstExpr::int(9));
                assert_eq!(body.len(), 1);
            }
            other => panic!("expected a loop, got {:?}", other),
        }
        assert_eq!(ast.leaves().len(), 1);
    }

    #[test]
    fn test_leaf_arguments_track_iterators() {
        let umap = restricted(
            "{ S[i, j] -> [0, i, 0, j, 0] }",
            "{ S[i, j] : 0 <= i < 4 and 0 <= j < 4 }",
        );
        let mut seen = Vec::new();
        let mut build = AstBuild::new().at_each_domain(|name, args| {
            seen.push((name.to_string(), args.to_vec()));
        });
        let ast = build.build_from_schedule_map(&umap).unwrap();
        drop(build);
        assert_eq!(ast.loop_depth(), 2);
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "S");
        assert_eq!(seen[0].1, vec![AstExpr::var("c1"), AstExpr::var("c3")]);
    }

    #[test]
    fn test_static_sequence_orders_statements() {
        let mut umap = restricted("{ A[i] -> [1, i, 0] }", "{ A[i] : 0 <= i < 4 }");
        umap = umap.union(restricted("{ B[i] -> [0, i, 0] }", "{ B[i] : 0 <= i < 4 }"));
        let ast = AstBuild::new().build_from_schedule_map(&umap).unwrap();
        match &ast {
            AstNode::Block(nodes) => {
                assert_eq!(nodes.len(), 2);
                // B is pinned to 0 at the root, so it comes first.
                let first_leaves = nodes[0].leaves();
                match first_leaves[0] {
                    AstNode::User { name, .. } => assert_eq!(name.as_str(), "B"),
                    _ => unreachable!(),
                }
            }
            other => panic!("expected a sequence, got {:?}", other),
        }
    }

    #[test]
    fn test_parametric_bounds() {
        let umap = restricted("[N] -> { S[i] -> [0, i, 0] }", "[N] -> { S[i] : 0 <= i < N }");
        let ast = AstBuild::new().build_from_schedule_map(&umap).unwrap();
        match &ast {
            AstNode::For { upper, .. } => {
                assert_eq!(upper, &AstExpr::var("N").add(AstExpr::int(-1)).simplify());
            }
            other => panic!("expected a loop, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_bound_pruning() {
        // Strip-mined schedule: i = 4*o + r. With nested-bound
        // exploitation the inner loop lower bound collapses to 0 and the
        // outer tile loop has a single upper bound.
        let umap = restricted(
            "{ S[i] -> [o, 0, r] : i = 4o + r and 0 <= r < 4 }",
            "{ S[i] : 0 <= i < 16 }",
        );
        let ast = AstBuild::new()
            .set_atomic_upper_bound(true)
            .set_exploit_nested_bounds(true)
            .build_from_schedule_map(&umap)
            .unwrap();
        match &ast {
            AstNode::For {
                lower,
                upper,
                body,
                ..
            } => {
                assert_eq!(lower, &AstExpr::int(0));
                assert_eq!(upper, &AstExpr::int(3));
                match &body[0] {
                    AstNode::For { lower, upper, .. } => {
                        assert_eq!(lower, &AstExpr::int(0));
                        assert_eq!(upper, &AstExpr::int(3));
                    }
                    other => panic!("expected the point loop, got {:?}", other),
                }
            }
            other => panic!("expected the tile loop, got {:?}", other),
        }
    }
}
