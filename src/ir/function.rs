//! Functions: collections of computations with buffers, tags and the
//! global schedule.
//!
//! The function exclusively owns its computations and buffers; every
//! cross-computation invariant (unique names, rank alignment, peer
//! ordering) is enforced here. Scheduling operations are addressed by
//! [`CompId`] handles.

use crate::codegen::ast::{AstExpr, AstNode};
use crate::codegen::build::AstBuild;
use crate::error::{Error, Result};
use crate::ir::buffer::Buffer;
use crate::ir::computation::{CompId, Computation, LET_STMT_PREFIX, ROOT_DIMENSION};
use crate::ir::constant::Constant;
use crate::ir::types::ExternArgumentKind;
use crate::polyhedral::map::Map;
use crate::polyhedral::set::Set;
use crate::polyhedral::union::{UnionMap, UnionSet};
use crate::schedule;
use std::collections::HashMap;

/// GPU iterator name for the first tagged dimension.
pub const GPU_THREAD_X: &str = "__thread_id_x";
/// GPU iterator name for the second tagged dimension.
pub const GPU_THREAD_Y: &str = "__thread_id_y";

/// Per-function configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct Config {
    /// Automatically map computation results to buffers of the same name.
    pub auto_data_mapping: bool,
}

/// A function under scheduling.
#[derive(Debug)]
pub struct Function {
    name: String,
    body: Vec<Computation>,
    invariants: Vec<Constant>,
    buffers: HashMap<String, Buffer>,
    arguments: Vec<String>,
    context: Option<Set>,
    parallel_dims: HashMap<String, usize>,
    vector_dims: HashMap<String, usize>,
    gpu_dims: HashMap<String, (usize, usize)>,
    ast: Option<AstNode>,
    /// Counter behind generated dimension names (`c0`, `c1`, ...).
    name_counter: u64,
    /// Configuration record.
    pub config: Config,
}

impl Function {
    /// Create an empty function.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: Vec::new(),
            invariants: Vec::new(),
            buffers: HashMap::new(),
            arguments: Vec::new(),
            context: None,
            parallel_dims: HashMap::new(),
            vector_dims: HashMap::new(),
            gpu_dims: HashMap::new(),
            ast: None,
            name_counter: 0,
            config: Config::default(),
        }
    }

    /// The function's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a computation. Fails when a peer already uses the name.
    pub fn add_computation(&mut self, computation: Computation) -> Result<CompId> {
        if self.computation_by_name(computation.name()).is_some() {
            return Err(Error::DuplicateName(computation.name().to_string()));
        }
        self.body.push(computation);
        Ok(CompId(self.body.len() - 1))
    }

    /// Append an invariant.
    pub fn add_invariant(&mut self, invariant: Constant) {
        self.invariants.push(invariant);
    }

    /// The function's invariants.
    pub fn invariants(&self) -> &[Constant] {
        &self.invariants
    }

    /// Register a buffer. Fails on a duplicate name.
    pub fn add_buffer(&mut self, buffer: Buffer) -> Result<()> {
        if self.buffers.contains_key(&buffer.name) {
            return Err(Error::DuplicateName(buffer.name.clone()));
        }
        self.buffers.insert(buffer.name.clone(), buffer);
        Ok(())
    }

    /// Look up a buffer by name.
    pub fn buffer(&self, name: &str) -> Option<&Buffer> {
        self.buffers.get(name)
    }

    /// Declare which buffers form the generated function's signature,
    /// in order.
    pub fn set_arguments(&mut self, names: Vec<String>) {
        self.arguments = names;
    }

    /// The argument buffers translated to the downstream signature model.
    /// Fails on unknown names and on temporaries.
    pub fn extern_arguments(&self) -> Result<Vec<(String, ExternArgumentKind)>> {
        self.arguments
            .iter()
            .map(|name| {
                let buf = self
                    .buffers
                    .get(name)
                    .ok_or_else(|| Error::poly(format!("unknown argument buffer `{}`", name)))?;
                Ok((name.clone(), buf.extern_kind()?))
            })
            .collect()
    }

    /// Constrain the symbolic parameters. The context must be a
    /// parameter-only set.
    pub fn set_context(&mut self, context: Set) -> Result<()> {
        if context.n_dim() != 0 {
            return Err(Error::poly("context must be a parameter-only set"));
        }
        self.context = Some(context);
        Ok(())
    }

    /// The context set, when one was provided.
    pub fn context(&self) -> Option<&Set> {
        self.context.as_ref()
    }

    /// Access a computation by handle.
    pub fn computation(&self, id: CompId) -> &Computation {
        &self.body[id.0]
    }

    /// Mutable access to a computation by handle.
    pub fn computation_mut(&mut self, id: CompId) -> &mut Computation {
        &mut self.body[id.0]
    }

    /// Find a computation by name.
    pub fn computation_by_name(&self, name: &str) -> Option<&Computation> {
        self.body.iter().find(|c| c.name() == name)
    }

    fn computation_by_name_mut(&mut self, name: &str) -> Option<&mut Computation> {
        self.body.iter_mut().find(|c| c.name() == name)
    }

    /// Iterate over all computations in body order.
    pub fn computations(&self) -> impl Iterator<Item = &Computation> {
        self.body.iter()
    }

    /// A fresh generated dimension name.
    pub(crate) fn fresh_name(&mut self) -> String {
        let n = self.name_counter;
        self.name_counter += 1;
        format!("c{}", n)
    }

    // ----- schedule manipulation ---------------------------------------

    /// Adopt `map` as the schedule of `id`.
    ///
    /// The map's input tuple must name a declared computation; when it
    /// does not, the let-statement prefix is prepended and the lookup is
    /// retried before giving up.
    pub fn set_schedule(&mut self, id: CompId, mut map: Map) -> Result<()> {
        let tuple = map
            .in_tuple_name()
            .ok_or_else(|| Error::UnknownComputation("<anonymous>".to_string()))?
            .to_string();
        if self.computation_by_name(&tuple).is_none() {
            let prefixed = format!("{}{}", LET_STMT_PREFIX, tuple);
            if self.computation_by_name(&prefixed).is_some() {
                log::debug!("repairing schedule domain name `{}` to `{}`", tuple, prefixed);
                map.set_in_tuple_name(prefixed);
            } else {
                return Err(Error::UnknownComputation(tuple));
            }
        }
        self.body[id.0].schedule = map;
        Ok(())
    }

    /// Adopt a schedule given in textual presentation.
    pub fn set_schedule_text(&mut self, id: CompId, text: &str) -> Result<()> {
        self.set_schedule(id, Map::from_text(text)?)
    }

    /// Strip-mine schedule dimension `d` of `id` into two dimensions, the
    /// inner of extent `size`.
    pub fn split(&mut self, id: CompId, d: usize, size: i64) -> Result<()> {
        let outer = self.fresh_name();
        let inner = self.fresh_name();
        let split = schedule::split_map(&self.body[id.0].schedule, d, size, outer, inner)?;
        self.body[id.0].store_schedule(split);
        Ok(())
    }

    /// Swap schedule dimensions `d0` and `d1` of `id`.
    pub fn interchange(&mut self, id: CompId, d0: usize, d1: usize) -> Result<()> {
        let swapped = schedule::interchange_map(&self.body[id.0].schedule, d0, d1)?;
        self.body[id.0].store_schedule(swapped);
        Ok(())
    }

    /// Tile the two dynamic dimensions `d0` and `d1` with sizes
    /// `size_x`/`size_y`.
    ///
    /// `d0` and `d1` are schedule positions and must be exactly two
    /// apart: the static ordering slot between two adjacent dynamic
    /// dimensions is part of the interleaved layout, so adjacent loops
    /// sit at positions `d` and `d + 2`.
    pub fn tile(
        &mut self,
        id: CompId,
        d0: usize,
        d1: usize,
        size_x: i64,
        size_y: i64,
    ) -> Result<()> {
        let rank = self.body[id.0].schedule.n_out();
        if d1 != d0 + 2 {
            return Err(Error::InvalidDimension {
                dim: d1 as i64,
                rank,
            });
        }
        if d1 >= rank {
            return Err(Error::InvalidDimension {
                dim: d1 as i64,
                rank,
            });
        }
        if size_x <= 0 || size_y <= 0 {
            return Err(Error::InvalidTileSize(size_x.min(size_y)));
        }

        self.split(id, d0, size_x)?;
        self.split(id, d1 + 2, size_y)?;
        self.interchange(id, d0 + 2, d1 + 2)
    }

    /// Order `id` after `target` at the given nesting level
    /// ([`ROOT_DIMENSION`] for the outermost sequence).
    ///
    /// Peer ordering is re-linearized deterministically: every peer's
    /// `relative_order` shifts one decimal digit left and everyone but
    /// the target gains one, then the sorted order is written into the
    /// static slot at position `level + 1` of every peer schedule.
    pub fn after(&mut self, id: CompId, target: CompId, level: i32) -> Result<()> {
        log::debug!(
            "ordering {} after {} at level {}",
            self.body[id.0].name(),
            self.body[target.0].name(),
            level
        );
        let pos = self.ordering_position(level)?;
        for (k, c) in self.body.iter_mut().enumerate() {
            c.relative_order *= 10;
            if k != target.0 {
                c.relative_order += 1;
            }
        }
        self.assign_static_orders(pos)
    }

    /// Make `id` the first computation among its peers at the given
    /// nesting level. Peers keep their relative order.
    pub fn first(&mut self, id: CompId, level: i32) -> Result<()> {
        log::debug!(
            "ordering {} first at level {}",
            self.body[id.0].name(),
            level
        );
        let pos = self.ordering_position(level)?;
        for (k, c) in self.body.iter_mut().enumerate() {
            if k != id.0 {
                c.relative_order += 1;
            }
        }
        self.assign_static_orders(pos)
    }

    /// Order `id` before `other` at the given nesting level. Delegates to
    /// [`Function::after`] on `other`.
    pub fn before(&mut self, id: CompId, other: CompId, level: i32) -> Result<()> {
        self.after(other, id, level)
    }

    /// Align schedule ranks, validate the level and return the static
    /// slot position it addresses.
    fn ordering_position(&mut self, level: i32) -> Result<usize> {
        self.align_schedules()?;
        let rank = self.max_schedules_range_dim();
        if level < ROOT_DIMENSION || level + 1 >= rank as i32 {
            return Err(Error::InvalidDimension {
                dim: level as i64,
                rank,
            });
        }
        Ok((level + 1) as usize)
    }

    /// Write `0, 1, 2, ...` into the static slot at `pos`, walking the
    /// computations in `relative_order` (stable on ties).
    fn assign_static_orders(&mut self, pos: usize) -> Result<()> {
        let mut order: Vec<usize> = (0..self.body.len()).collect();
        order.sort_by_key(|&k| self.body[k].relative_order);
        for (rank, &k) in order.iter().enumerate() {
            let pinned = self.body[k].schedule.set_const_out_dim(pos, rank as i64)?;
            self.body[k].store_schedule(pinned);
            log::debug!("schedule adjusted: {}", self.body[k].schedule);
        }
        Ok(())
    }

    // ----- dimension tags ----------------------------------------------

    /// Tag a schedule dimension of `id` for parallel lowering.
    pub fn tag_parallel_dimension(&mut self, id: CompId, dim: usize) {
        let name = self.body[id.0].name().to_string();
        self.parallel_dims.insert(name, dim);
    }

    /// Tag a schedule dimension of `id` for vector lowering.
    pub fn tag_vector_dimension(&mut self, id: CompId, dim: usize) {
        let name = self.body[id.0].name().to_string();
        self.vector_dims.insert(name, dim);
    }

    /// Tag two adjacent schedule dimensions of `id` for GPU lowering.
    pub fn tag_gpu_dimensions(&mut self, id: CompId, dim0: usize, dim1: usize) -> Result<()> {
        if dim1 != dim0 + 1 {
            return Err(Error::InvalidDimension {
                dim: dim1 as i64,
                rank: self.body[id.0].schedule.n_out(),
            });
        }
        let name = self.body[id.0].name().to_string();
        self.gpu_dims.insert(name, (dim0, dim1));
        Ok(())
    }

    /// The parallel tag table (computation name to dimension).
    pub fn parallel_dims(&self) -> &HashMap<String, usize> {
        &self.parallel_dims
    }

    /// The vector tag table.
    pub fn vector_dims(&self) -> &HashMap<String, usize> {
        &self.vector_dims
    }

    /// The GPU tag table.
    pub fn gpu_dims(&self) -> &HashMap<String, (usize, usize)> {
        &self.gpu_dims
    }

    /// The GPU iterator name a tagged level maps to.
    pub fn get_gpu_iterator(&self, name: &str, level: usize) -> Result<&'static str> {
        match self.gpu_dims.get(name) {
            Some(&(d0, _)) if level == d0 => Ok(GPU_THREAD_X),
            Some(&(_, d1)) if level == d1 => Ok(GPU_THREAD_Y),
            _ => Err(Error::GpuLevelMismatch {
                name: name.to_string(),
                level,
            }),
        }
    }

    /// Whether a level of a computation is mapped to the GPU.
    pub fn should_map_to_gpu(&self, name: &str, level: usize) -> bool {
        matches!(self.gpu_dims.get(name), Some(&(d0, d1)) if level == d0 || level == d1)
    }

    // ----- global schedule assembly ------------------------------------

    /// The largest schedule output rank across the body.
    pub fn max_schedules_range_dim(&self) -> usize {
        self.body
            .iter()
            .map(|c| c.schedule().n_out())
            .max()
            .unwrap_or(0)
    }

    /// Pad every schedule to the common output rank with zero-constrained
    /// dimensions. Idempotent when already aligned.
    pub fn align_schedules(&mut self) -> Result<()> {
        let max_dim = self.max_schedules_range_dim();
        for c in &mut self.body {
            let aligned = c.schedule.align_range_dims(max_dim)?;
            c.store_schedule(aligned);
        }
        Ok(())
    }

    /// Union of the iteration domains of all scheduled computations.
    pub fn get_iteration_domain(&self) -> UnionSet {
        let mut union = UnionSet::new();
        for c in &self.body {
            if c.schedule_this_computation {
                union.add(c.iteration_domain().clone());
            }
        }
        union
    }

    /// Union of all schedules, restricted to the iteration-domain union.
    pub fn get_schedule(&self) -> Result<UnionMap> {
        let mut union = UnionMap::new();
        for c in &self.body {
            union.add(c.schedule().clone());
        }
        union.intersect_domain(&self.get_iteration_domain())
    }

    /// Union of the per-computation time-processor domains.
    pub fn get_time_processor_domain(&self) -> Result<UnionSet> {
        let mut union = UnionSet::new();
        for c in &self.body {
            union.add(c.time_processor_domain()?);
        }
        Ok(union)
    }

    // ----- AST generation ----------------------------------------------

    /// Build the AST for the scheduled function.
    ///
    /// Aligns schedule ranks, forms `schedule ∩ domain` and hands the
    /// result to the AST builder with the atomic-upper-bound and
    /// nested-bound options set. The per-leaf callback captures each
    /// statement's access expressions into its `index_expr`; the post-for
    /// hook is registered for the downstream generator to extend.
    pub fn generate_ast(&mut self) -> Result<&AstNode> {
        if self.body.is_empty() {
            return Err(Error::poly("cannot generate an AST for an empty function"));
        }
        self.align_schedules()?;

        let schedule = self.get_schedule()?;
        let umap = schedule.intersect_domain(&self.get_iteration_domain())?;
        log::debug!("schedule intersect iteration domain: {}", umap);

        let mut collected: Vec<(String, Vec<AstExpr>)> = Vec::new();
        let ast = {
            let mut build = match &self.context {
                Some(ctx) => AstBuild::from_context(ctx),
                None => AstBuild::new(),
            }
            .set_atomic_upper_bound(true)
            .set_exploit_nested_bounds(true)
            .at_each_domain(|name, args| collected.push((name.to_string(), args.to_vec())))
            .after_each_for(|node| node);
            build.build_from_schedule_map(&umap)?
        };

        for (name, args) in collected {
            if let Some(c) = self.computation_by_name_mut(&name) {
                c.index_expr = args;
            }
        }
        self.ast = Some(ast);
        Ok(self.ast.as_ref().unwrap())
    }

    /// The AST built by the last `generate_ast` call.
    pub fn ast(&self) -> Option<&AstNode> {
        self.ast.as_ref()
    }

    // ----- diagnostics -------------------------------------------------

    /// Diagnostic dump of the whole function.
    pub fn dump(&self) {
        log::debug!("function \"{}\"", self.name);
        for name in &self.arguments {
            if let Some(buf) = self.buffers.get(name) {
                buf.dump();
            }
        }
        for inv in &self.invariants {
            inv.dump();
        }
        if let Some(ctx) = &self.context {
            log::debug!("context: {}", ctx);
        }
        self.dump_schedule();
        for c in &self.body {
            c.dump();
        }
        for buf in self.buffers.values() {
            log::debug!("buffer: {}", buf.name);
        }
    }

    /// Diagnostic dump of all schedules and tag tables.
    pub fn dump_schedule(&self) {
        for c in &self.body {
            c.dump_schedule();
        }
        log::debug!("parallel dimensions: {:?}", self.parallel_dims);
        log::debug!("vector dimensions: {:?}", self.vector_dims);
    }

    /// Diagnostic dump of the iteration domains.
    pub fn dump_iteration_domain(&self) {
        for c in &self.body {
            c.dump_iteration_domain();
        }
    }

    /// Diagnostic dump of the time-processor domains.
    pub fn dump_time_processor_domain(&self) {
        for c in &self.body {
            match c.time_processor_domain() {
                Ok(t) => log::debug!("{}: {}", c.name(), t),
                Err(e) => log::debug!("{}: <{}>", c.name(), e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::types::{ArgumentKind, Expr, PrimitiveType};

    fn two_comp_function() -> (Function, CompId, CompId) {
        let mut f = Function::new("test");
        let c1 = f
            .add_computation(
                Computation::new("{ S0[i] : 0 <= i < 4 }", Expr::int32(0), PrimitiveType::I32)
                    .unwrap(),
            )
            .unwrap();
        let c2 = f
            .add_computation(
                Computation::new("{ S1[i] : 0 <= i < 4 }", Expr::int32(1), PrimitiveType::I32)
                    .unwrap(),
            )
            .unwrap();
        (f, c1, c2)
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let (mut f, _, _) = two_comp_function();
        let dup =
            Computation::new("{ S0[i] : 0 <= i < 4 }", Expr::int32(0), PrimitiveType::I32).unwrap();
        assert!(matches!(
            f.add_computation(dup),
            Err(Error::DuplicateName(_))
        ));
    }

    #[test]
    fn test_set_schedule_prefix_repair() {
        let mut f = Function::new("test");
        let id = f
            .add_computation(
                Computation::new(
                    "{ _let_stmt_v[i] : 0 <= i < 4 }",
                    Expr::int32(0),
                    PrimitiveType::I32,
                )
                .unwrap(),
            )
            .unwrap();
        // Schedule text omits the reserved prefix; the lookup repairs it.
        f.set_schedule_text(id, "{ v[i] -> [0, i, 0] }").unwrap();
        assert_eq!(
            f.computation(id).schedule().in_tuple_name(),
            Some("_let_stmt_v")
        );
    }

    #[test]
    fn test_set_schedule_unknown_rejected() {
        let (mut f, c1, _) = two_comp_function();
        let err = f.set_schedule_text(c1, "{ nope[i] -> [0, i, 0] }");
        assert!(matches!(err, Err(Error::UnknownComputation(_))));
    }

    #[test]
    fn test_align_schedules_pads_with_zero() {
        let (mut f, c1, c2) = two_comp_function();
        f.split(c1, 1, 2).unwrap();
        f.align_schedules().unwrap();
        let r1 = f.computation(c1).schedule().n_out();
        let r2 = f.computation(c2).schedule().n_out();
        assert_eq!(r1, r2);
        assert_eq!(f.computation(c2).schedule().out_dim_constant(r2 - 1), Some(0));
    }

    #[test]
    fn test_gpu_tags() {
        let (mut f, c1, _) = two_comp_function();
        f.tag_gpu_dimensions(c1, 1, 2).unwrap();
        assert_eq!(f.get_gpu_iterator("S0", 1).unwrap(), GPU_THREAD_X);
        assert_eq!(f.get_gpu_iterator("S0", 2).unwrap(), GPU_THREAD_Y);
        assert!(f.should_map_to_gpu("S0", 1));
        assert!(!f.should_map_to_gpu("S0", 3));
        assert!(matches!(
            f.get_gpu_iterator("S0", 3),
            Err(Error::GpuLevelMismatch { .. })
        ));
        assert!(matches!(
            f.tag_gpu_dimensions(c1, 1, 3),
            Err(Error::InvalidDimension { .. })
        ));
    }

    #[test]
    fn test_arguments_skip_temporaries() {
        let (mut f, _, _) = two_comp_function();
        f.add_buffer(Buffer::new(
            "A",
            vec![Expr::int32(4)],
            PrimitiveType::I32,
            ArgumentKind::Input,
        ))
        .unwrap();
        f.add_buffer(Buffer::new(
            "tmp",
            vec![Expr::int32(4)],
            PrimitiveType::I32,
            ArgumentKind::Temporary,
        ))
        .unwrap();
        f.set_arguments(vec!["A".to_string()]);
        assert_eq!(f.extern_arguments().unwrap().len(), 1);
        f.set_arguments(vec!["A".to_string(), "tmp".to_string()]);
        assert!(f.extern_arguments().is_err());
    }
}
