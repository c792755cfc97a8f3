//! Map-level schedule transformation builders.
//!
//! A schedule maps a computation's iteration space into the shared time
//! space. Output positions `0, 2, 4, ...` are static ordering slots, each
//! pinned to an integer constant that encodes peer ordering at that
//! nesting level; positions `1, 3, 5, ...` are the dynamic loop
//! iterators. Every builder here consumes a schedule and produces a new
//! relation preserving that interleaving.

use crate::error::{Error, Result};
use crate::polyhedral::constraint::Constraint;
use crate::polyhedral::expr::AffineExpr;
use crate::polyhedral::map::Map;
use crate::polyhedral::space::Space;

/// The interleaved identity schedule over an iteration space:
/// `{ S[i, j] -> [0, i, 0, j, 0] }`.
pub fn time_identity(domain_space: &Space) -> Map {
    let n = domain_space.n_out();
    let rank = 2 * n + 1;
    let space = Space {
        params: domain_space.params.clone(),
        in_tuple: domain_space.out_tuple.clone(),
        in_dims: domain_space.out_dims.clone(),
        out_tuple: None,
        out_dims: vec![None; rank],
    };
    let mut map = Map::universe(space);
    let cols = map.space.n_cols();
    for i in 0..n {
        let lhs = AffineExpr::var(map.space.out_col(2 * i + 1), cols);
        let rhs = AffineExpr::var(map.space.in_col(i), cols);
        map.system.add(Constraint::eq(lhs, rhs));
    }
    for s in 0..=n {
        let slot = AffineExpr::var(map.space.out_col(2 * s), cols);
        map.system.add(Constraint::eq_zero(slot));
    }
    map
}

/// Strip-mine output dimension `d` into `(outer, 0, inner)` with
/// `old = size * outer + inner` and `0 <= inner < size`.
///
/// The middle zero is the fresh static ordering slot, keeping the
/// interleaved layout intact. `outer_name`/`inner_name` label the two new
/// dynamic dimensions.
pub fn split_map(
    schedule: &Map,
    d: usize,
    size: i64,
    outer_name: String,
    inner_name: String,
) -> Result<Map> {
    let n = schedule.n_out();
    if d >= n {
        return Err(Error::InvalidDimension {
            dim: d as i64,
            rank: n,
        });
    }
    if size < 1 {
        return Err(Error::InvalidTileSize(size));
    }

    log::debug!(
        "splitting dimension {} of {} with size {}",
        d,
        schedule,
        size
    );

    let mut out_dims: Vec<Option<String>> = Vec::with_capacity(n + 2);
    for (i, name) in schedule.space.out_dims.iter().enumerate() {
        if i == d {
            out_dims.push(Some(outer_name.clone()));
            out_dims.push(None);
            out_dims.push(Some(inner_name.clone()));
        } else {
            out_dims.push(name.clone());
        }
    }

    let space = Space {
        params: schedule.space.params.clone(),
        in_tuple: None,
        in_dims: vec![None; n],
        out_tuple: None,
        out_dims,
    };
    let mut transform = Map::universe(space);
    let cols = transform.space.n_cols();
    for i in 0..n {
        let shifted = if i < d { i } else { i + 2 };
        if i == d {
            // in_d = size * outer + inner
            let outer = AffineExpr::var(transform.space.out_col(d), cols).scale(size);
            let inner = AffineExpr::var(transform.space.out_col(d + 2), cols);
            let lhs = AffineExpr::var(transform.space.in_col(d), cols);
            transform.system.add(Constraint::eq(lhs, outer + inner));
            // fresh static slot pinned to zero
            let slot = AffineExpr::var(transform.space.out_col(d + 1), cols);
            transform.system.add(Constraint::eq_zero(slot));
            // 0 <= inner < size
            let inner = AffineExpr::var(transform.space.out_col(d + 2), cols);
            transform.system.add(Constraint::ge_zero(inner.clone()));
            let mut upper = -inner;
            upper.constant += size - 1;
            transform.system.add(Constraint::ge_zero(upper));
        } else {
            let lhs = AffineExpr::var(transform.space.out_col(shifted), cols);
            let rhs = AffineExpr::var(transform.space.in_col(i), cols);
            transform.system.add(Constraint::eq(lhs, rhs));
        }
    }

    let split = schedule.apply_range(&transform)?;
    log::debug!("schedule after splitting: {}", split);
    Ok(split)
}

/// Swap output dimensions `d0` and `d1`, carrying their names along.
pub fn interchange_map(schedule: &Map, d0: usize, d1: usize) -> Result<Map> {
    let n = schedule.n_out();
    for d in [d0, d1] {
        if d >= n {
            return Err(Error::InvalidDimension {
                dim: d as i64,
                rank: n,
            });
        }
    }

    log::debug!("interchanging dimensions {} and {} of {}", d0, d1, schedule);

    let mut out_dims = schedule.space.out_dims.clone();
    out_dims.swap(d0, d1);

    let space = Space {
        params: schedule.space.params.clone(),
        in_tuple: None,
        in_dims: vec![None; n],
        out_tuple: None,
        out_dims,
    };
    let mut transform = Map::universe(space);
    let cols = transform.space.n_cols();
    for i in 0..n {
        let source = if i == d0 {
            d1
        } else if i == d1 {
            d0
        } else {
            i
        };
        let lhs = AffineExpr::var(transform.space.out_col(i), cols);
        let rhs = AffineExpr::var(transform.space.in_col(source), cols);
        transform.system.add(Constraint::eq(lhs, rhs));
    }

    let swapped = schedule.apply_range(&transform)?;
    log::debug!("schedule after interchange: {}", swapped);
    Ok(swapped)
}
