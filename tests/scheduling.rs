//! Integration tests for the scheduling pipeline: transformations,
//! peer ordering and AST generation.

use polysched::prelude::*;

fn single(name_domain: &str) -> (Function, CompId) {
    let mut f = Function::new("test");
    let id = f
        .add_computation(
            Computation::new(name_domain, Expr::int32(0), PrimitiveType::I32).unwrap(),
        )
        .unwrap();
    (f, id)
}

/// Walk the unique loop spine of an AST, returning (iterator, lower, upper).
fn loop_spine(ast: &AstNode) -> Vec<(String, AstExpr, AstExpr)> {
    let mut out = Vec::new();
    let mut node = ast;
    loop {
        match node {
            AstNode::For {
                iterator,
                lower,
                upper,
                body,
            } => {
                out.push((iterator.clone(), lower.clone(), upper.clone()));
                if body.len() != 1 {
                    break;
                }
                node = &body[0];
            }
            _ => break,
        }
    }
    out
}

#[test]
fn identity_schedule_row_major() {
    let (mut f, _) = single("{ S[i, j] : 0 <= i < 3 and 0 <= j < 2 }");
    let ast = f.generate_ast().unwrap().clone();

    let spine = loop_spine(&ast);
    assert_eq!(spine.len(), 2);
    // Outer loop is the i loop, inner the j loop.
    assert_eq!(spine[0].0, "c1");
    assert_eq!(spine[0].2, AstExpr::int(2));
    assert_eq!(spine[1].0, "c3");
    assert_eq!(spine[1].2, AstExpr::int(1));

    // The leaf visits S[i, j] with i driven by the outer iterator.
    match ast.leaves()[0] {
        AstNode::User { name, args } => {
            assert_eq!(name.as_str(), "S");
            assert_eq!(args, &vec![AstExpr::var("c1"), AstExpr::var("c3")]);
        }
        _ => unreachable!(),
    }

    // The leaf callback captured the same expressions.
    assert_eq!(
        f.computation_by_name("S").unwrap().index_expr,
        vec![AstExpr::var("c1"), AstExpr::var("c3")]
    );
}

#[test]
fn split_by_four_emits_strip_mined_nest() {
    let mut f = Function::new("test");
    let id = f
        .add_computation(
            Computation::new(
                "[N, M] -> { S[i, j] : 0 <= i < N and 0 <= j < M }",
                Expr::int32(0),
                PrimitiveType::I32,
            )
            .unwrap(),
        )
        .unwrap();

    f.split(id, 1, 4).unwrap();
    let ast = f.generate_ast().unwrap();

    let spine = loop_spine(ast);
    assert_eq!(spine.len(), 3);

    // Outer tile loop: 0 .. floord(N - 1, 4).
    assert_eq!(spine[0].1, AstExpr::int(0));
    assert_eq!(
        spine[0].2,
        AstExpr::var("N").add(AstExpr::int(-1)).floordiv(AstExpr::int(4))
    );

    // Inner point loop: 0 .. min(3, N - 4*c1 - 1).
    assert_eq!(spine[1].1, AstExpr::int(0));
    match &spine[1].2 {
        AstExpr::Min(a, b) => {
            let rendered = format!("min({}, {})", a, b);
            assert!(rendered.contains('3'), "unexpected bound {}", rendered);
            assert!(rendered.contains('N'), "unexpected bound {}", rendered);
        }
        other => panic!("expected a min bound, got {}", other),
    }

    // The leaf rebuilds i as 4*outer + inner.
    match ast.leaves()[0] {
        AstNode::User { args, .. } => {
            assert_eq!(
                args[0],
                AstExpr::int(4)
                    .mul(AstExpr::var("c1"))
                    .add(AstExpr::var("c3"))
            );
            assert_eq!(args[1], AstExpr::var("c5"));
        }
        _ => unreachable!(),
    }
}

#[test]
fn tile_32_by_32_exposes_four_loops() {
    let (mut f, id) = single("{ S[i, j] : 0 <= i < 128 and 0 <= j < 128 }");

    f.tile(id, 1, 3, 32, 32).unwrap();
    let ast = f.generate_ast().unwrap();

    let spine = loop_spine(ast);
    assert_eq!(spine.len(), 4);
    for (_, lower, _) in &spine {
        assert_eq!(lower, &AstExpr::int(0));
    }
    // Two tile loops of 128/32 iterations, then two point loops of 32.
    assert_eq!(spine[0].2, AstExpr::int(3));
    assert_eq!(spine[1].2, AstExpr::int(3));
    assert_eq!(spine[2].2, AstExpr::int(31));
    assert_eq!(spine[3].2, AstExpr::int(31));

    // Loop order: tile-i, tile-j, point-i, point-j; the leaf recombines
    // the original iterators from tile and point loops.
    match ast.leaves()[0] {
        AstNode::User { args, .. } => {
            assert_eq!(
                args[0],
                AstExpr::int(32)
                    .mul(AstExpr::var("c1"))
                    .add(AstExpr::var("c5"))
            );
            assert_eq!(
                args[1],
                AstExpr::int(32)
                    .mul(AstExpr::var("c3"))
                    .add(AstExpr::var("c7"))
            );
        }
        _ => unreachable!(),
    }
}

#[test]
fn interchange_gives_column_major() {
    let (mut f, id) = single("{ S[i, j] : 0 <= i < 3 and 0 <= j < 5 }");

    f.interchange(id, 1, 3).unwrap();
    let ast = f.generate_ast().unwrap();

    let spine = loop_spine(ast);
    assert_eq!(spine.len(), 2);
    // The outer loop now ranges over j (bound 4), the inner over i.
    assert_eq!(spine[0].2, AstExpr::int(4));
    assert_eq!(spine[1].2, AstExpr::int(2));

    match ast.leaves()[0] {
        AstNode::User { args, .. } => {
            // i comes from the inner loop, j from the outer.
            assert_eq!(args[0], AstExpr::var("c3"));
            assert_eq!(args[1], AstExpr::var("c1"));
        }
        _ => unreachable!(),
    }
}

#[test]
fn after_sequences_statements_and_is_idempotent() {
    let mut f = Function::new("test");
    let s1 = f
        .add_computation(
            Computation::new("{ S1[i] : 0 <= i < 4 }", Expr::int32(0), PrimitiveType::I32)
                .unwrap(),
        )
        .unwrap();
    let s2 = f
        .add_computation(
            Computation::new("{ S2[i] : 0 <= i < 4 }", Expr::int32(0), PrimitiveType::I32)
                .unwrap(),
        )
        .unwrap();

    f.after(s2, s1, ROOT_DIMENSION).unwrap();

    // Static coordinates at the root slot: S1 strictly before S2.
    let c1 = f.computation(s1).schedule().out_dim_constant(0).unwrap();
    let c2 = f.computation(s2).schedule().out_dim_constant(0).unwrap();
    assert!(c1 < c2);

    let leaf_order = |f: &mut Function| -> Vec<String> {
        let ast = f.generate_ast().unwrap();
        ast.leaves()
            .iter()
            .map(|leaf| match leaf {
                AstNode::User { name, .. } => name.clone(),
                _ => unreachable!(),
            })
            .collect()
    };
    assert_eq!(leaf_order(&mut f), vec!["S1", "S2"]);

    // Repeating the call does not flip the order.
    f.after(s2, s1, ROOT_DIMENSION).unwrap();
    assert_eq!(leaf_order(&mut f), vec!["S1", "S2"]);
}

#[test]
fn first_moves_computation_ahead_of_peers() {
    let mut f = Function::new("test");
    let mut ids = Vec::new();
    for name in ["A", "B", "C"] {
        let domain = format!("{{ {}[i] : 0 <= i < 2 }}", name);
        ids.push(
            f.add_computation(
                Computation::new(&domain, Expr::int32(0), PrimitiveType::I32).unwrap(),
            )
            .unwrap(),
        );
    }

    f.first(ids[1], ROOT_DIMENSION).unwrap();

    let ast = f.generate_ast().unwrap();
    let order: Vec<String> = ast
        .leaves()
        .iter()
        .map(|leaf| match leaf {
            AstNode::User { name, .. } => name.clone(),
            _ => unreachable!(),
        })
        .collect();
    // B first; A and C keep their relative order.
    assert_eq!(order, vec!["B", "A", "C"]);

    // Every peer received a static coordinate at the root slot.
    for &id in &ids {
        assert!(f.computation(id).schedule().out_dim_constant(0).is_some());
    }
}

#[test]
fn before_delegates_to_after() {
    let mut f = Function::new("test");
    let a = f
        .add_computation(
            Computation::new("{ A[i] : 0 <= i < 2 }", Expr::int32(0), PrimitiveType::I32)
                .unwrap(),
        )
        .unwrap();
    let b = f
        .add_computation(
            Computation::new("{ B[i] : 0 <= i < 2 }", Expr::int32(0), PrimitiveType::I32)
                .unwrap(),
        )
        .unwrap();

    // a.before(b) places a ahead of b.
    f.before(a, b, ROOT_DIMENSION).unwrap();
    let ca = f.computation(a).schedule().out_dim_constant(0).unwrap();
    let cb = f.computation(b).schedule().out_dim_constant(0).unwrap();
    assert!(ca < cb);
}

#[test]
fn split_round_trip_at_size_one() {
    let (mut f, id) = single("{ S[i, j] : 0 <= i < 6 and 0 <= j < 6 }");
    let original = f
        .computation(id)
        .schedule()
        .intersect_domain(f.computation(id).iteration_domain())
        .unwrap();

    f.split(id, 1, 1).unwrap();
    let split = f
        .computation(id)
        .schedule()
        .intersect_domain(f.computation(id).iteration_domain())
        .unwrap();

    // Project away the new inner dimension and its static slot; the range
    // collapses back to the original time space.
    let projected = split
        .project_out_out_dim(3)
        .unwrap()
        .project_out_out_dim(2)
        .unwrap();
    assert!(projected.range().is_equal(&original.range()));
}

#[test]
fn interchange_is_an_involution() {
    let (mut f, id) = single("{ S[i, j] : 0 <= i < 7 and 0 <= j < 9 }");
    let original = f.computation(id).schedule().clone();

    f.interchange(id, 1, 3).unwrap();
    f.interchange(id, 1, 3).unwrap();

    assert!(f.computation(id).schedule().is_equal(&original));
}

#[test]
fn transformer_calls_preserve_interleaving() {
    let (mut f, id) = single("{ S[i, j] : 0 <= i < 16 and 0 <= j < 16 }");
    f.split(id, 1, 4).unwrap();
    f.interchange(id, 3, 5).unwrap();

    let s = f.computation(id).schedule();
    assert_eq!(s.n_out(), 7);
    for pos in (0..7).step_by(2) {
        assert_eq!(s.out_dim_constant(pos), Some(0), "position {}", pos);
    }
    for pos in [1, 3, 5] {
        assert_eq!(s.out_dim_constant(pos), None, "position {}", pos);
    }
}

#[test]
fn union_schedule_matches_member_schedules() -> anyhow::Result<()> {
    let mut f = Function::new("test");
    let s1 = f.add_computation(Computation::new(
        "{ S1[i] : 0 <= i < 4 }",
        Expr::int32(0),
        PrimitiveType::I32,
    )?)?;
    let s2 = f.add_computation(Computation::new(
        "{ S2[i] : 0 <= i < 8 }",
        Expr::int32(0),
        PrimitiveType::I32,
    )?)?;

    let union = f.get_schedule()?;
    assert_eq!(union.len(), 2);
    for id in [s1, s2] {
        let expected = f
            .computation(id)
            .schedule()
            .intersect_domain(f.computation(id).iteration_domain())?;
        let member = union
            .iter()
            .find(|m| m.in_tuple_name() == expected.in_tuple_name())
            .expect("member missing from union");
        assert!(member.is_equal(&expected));
    }
    Ok(())
}

#[test]
fn unscheduled_computations_are_not_emitted() {
    let mut f = Function::new("test");
    let s1 = f
        .add_computation(
            Computation::new("{ S1[i] : 0 <= i < 4 }", Expr::int32(0), PrimitiveType::I32)
                .unwrap(),
        )
        .unwrap();
    let s2 = f
        .add_computation(
            Computation::new("{ S2[i] : 0 <= i < 4 }", Expr::int32(0), PrimitiveType::I32)
                .unwrap(),
        )
        .unwrap();
    let _ = s1;
    f.computation_mut(s2).schedule_this_computation = false;

    let ast = f.generate_ast().unwrap();
    let names: Vec<&str> = ast
        .leaves()
        .iter()
        .map(|leaf| match leaf {
            AstNode::User { name, .. } => name.as_str(),
            _ => unreachable!(),
        })
        .collect();
    assert_eq!(names, vec!["S1"]);
}

#[test]
fn parametric_context_tightens_bounds() {
    let mut f = Function::new("test");
    f.set_context(Set::from_text("[N] -> { [] : N >= 1 }").unwrap())
        .unwrap();
    let _ = f
        .add_computation(
            Computation::new(
                "[N] -> { S[i] : 0 <= i < N }",
                Expr::int32(0),
                PrimitiveType::I32,
            )
            .unwrap(),
        )
        .unwrap();
    let ast = f.generate_ast().unwrap();
    assert_eq!(ast.loop_depth(), 1);
}

#[test]
fn schedule_text_round_trip_through_function() -> anyhow::Result<()> {
    let (mut f, id) = single("{ S[i, j] : 0 <= i < 4 and 0 <= j < 4 }");
    f.set_schedule_text(id, "{ S[i, j] -> [0, j, 0, i, 0] }")?;
    let ast = f.generate_ast()?;

    match ast.leaves()[0] {
        AstNode::User { args, .. } => {
            // Column-major: i now comes from the inner loop.
            assert_eq!(args[0], AstExpr::var("c3"));
            assert_eq!(args[1], AstExpr::var("c1"));
        }
        _ => unreachable!(),
    }
    Ok(())
}
