//! Distance properties over randomly shaped method bodies

mod common;

use branchscope::bytecode::{Condition, Instruction, MethodBody, Opcode, Operand};
use branchscope::cfg::CfgBuilder;
use branchscope::distance::{MethodGraph, Path, PathStep};
use branchscope::Registry;
use common::*;
use proptest::prelude::*;

/// Stack-neutral instruction: falls through, jumps, branches or returns
fn instruction(len: usize) -> impl Strategy<Value = Instruction> {
    prop_oneof![
        Just(nop()),
        (0..len).prop_map(goto),
        (0..len).prop_map(|target| insn(Opcode::If {
            condition: Condition::Eq,
            operand: Operand::Opaque { pops: 0 },
            target,
        })),
        Just(ret()),
    ]
}

fn body() -> impl Strategy<Value = MethodBody> {
    (2usize..12)
        .prop_flat_map(|len| {
            (
                prop::collection::vec(instruction(len), len - 1),
                prop::collection::vec(0..len, 0..3),
            )
        })
        .prop_map(|(mut instructions, mutants)| {
            instructions.push(ret());
            let mut body = MethodBody::new("P", "m", "()V", instructions);
            for (id, at) in mutants.into_iter().enumerate() {
                body = body.with_mutation(at, id as u64);
            }
            body
        })
}

fn precompute(body: &MethodBody) -> MethodGraph {
    MethodGraph::precompute(CfgBuilder::new(&Registry::new()).build(body).unwrap())
}

proptest! {
    #[test]
    fn test_distance_identity_and_bounds(body in body()) {
        let graph = precompute(&body);
        let n = graph.vertex_count();
        for u in 0..n {
            prop_assert_eq!(graph.distance(u, u), Some(0));
            for v in 0..n {
                if let Some(d) = graph.distance(u, v) {
                    prop_assert!(d <= graph.diameter());
                }
            }
        }
    }

    #[test]
    fn test_triangle_inequality(body in body()) {
        let graph = precompute(&body);
        let n = graph.vertex_count();
        for u in 0..n {
            for v in 0..n {
                for w in 0..n {
                    if let (Some(uv), Some(vw)) = (graph.distance(u, v), graph.distance(v, w)) {
                        let uw = graph.distance(u, w);
                        prop_assert!(uw.is_some());
                        prop_assert!(uw.unwrap_or(u32::MAX) <= uv + vw);
                    }
                }
            }
        }
    }

    #[test]
    fn test_diameter_is_longest_finite_distance(body in body()) {
        let graph = precompute(&body);
        let n = graph.vertex_count();
        let longest = (0..n)
            .flat_map(|u| (0..n).map(move |v| (u, v)))
            .filter_map(|(u, v)| graph.distance(u, v))
            .max()
            .unwrap_or(0);
        prop_assert_eq!(graph.diameter(), longest);
    }

    #[test]
    fn test_annotations_match_shortest_paths(body in body()) {
        let graph = precompute(&body);
        for mutation in graph.mutations().collect::<Vec<_>>() {
            let carrier = graph.mutation_vertex(mutation).unwrap().id;
            for vertex in graph.vertices() {
                prop_assert_eq!(vertex.distance_to(mutation), graph.distance(vertex.id, carrier));
            }
        }
    }

    #[test]
    fn test_control_distance_never_exceeds_diameter(body in body(), steps in prop::collection::vec(0usize..16, 0..6)) {
        let graph = precompute(&body);
        let path: Path = steps.iter().map(|&p| PathStep::new(p, 0.0)).collect();
        for mutation in graph.mutations().collect::<Vec<_>>() {
            prop_assert!(graph.control_distance_to_mutation(&path, mutation) <= graph.diameter());
        }
    }
}
