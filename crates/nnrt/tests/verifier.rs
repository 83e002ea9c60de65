use nnrt::ir::{DataType, Graph, OpKind, Operation, OperandIndex, OperationIndex, Shape, TypeInfo};
use nnrt::verifier::{verify_graph, DagChecker, EdgeConsistencyChecker, EdgeMismatch, VerifyError};
use proptest::prelude::*;

fn f32_operand(graph: &mut Graph) -> OperandIndex {
    graph.add_operand(Shape::new([2]), TypeInfo::new(DataType::Float32))
}

fn unary(graph: &mut Graph, input: OperandIndex, output: OperandIndex) -> OperationIndex {
    graph
        .add_operation(Operation::new(OpKind::ReLU, [input], [output]))
        .expect("operands exist")
}

/// x -> A -> y -> B -> z
fn chain() -> (Graph, [OperandIndex; 3], [OperationIndex; 2]) {
    let mut graph = Graph::new();
    let x = f32_operand(&mut graph);
    let y = f32_operand(&mut graph);
    let z = f32_operand(&mut graph);
    let a = unary(&mut graph, x, y);
    let b = unary(&mut graph, y, z);
    graph.add_input(x);
    graph.add_output(z);
    graph.finish_building();
    (graph, [x, y, z], [a, b])
}

#[test]
fn three_operation_cycle_is_rejected() {
    let mut graph = Graph::new();
    let x = f32_operand(&mut graph);
    let y = f32_operand(&mut graph);
    let z = f32_operand(&mut graph);
    unary(&mut graph, z, x);
    unary(&mut graph, x, y);
    unary(&mut graph, y, z);
    graph.finish_building();

    assert!(!DagChecker::verify(&graph));
    let report = DagChecker::check(&graph);
    assert!(!report.back_edges.is_empty());
    assert!(matches!(verify_graph(&graph), Err(VerifyError::Cyclic(_))));
    assert!(graph.topological_order().is_err());
}

#[test]
fn chain_passes_both_checks() {
    let (graph, _, ops) = chain();
    assert!(DagChecker::verify(&graph));
    assert_eq!(EdgeConsistencyChecker::check(&graph).mismatch_count(), 0);
    verify_graph(&graph).expect("consistent dag");
    assert_eq!(graph.topological_order().expect("acyclic"), ops.to_vec());
}

#[test]
fn redirected_def_is_reported() {
    let (mut graph, [_, y, _], [a, b]) = chain();
    graph.operand_mut(y).expect("operand").set_def(b);

    let report = EdgeConsistencyChecker::check(&graph);
    assert_eq!(report.mismatch_count(), 1);
    assert_eq!(
        report.mismatches[0],
        EdgeMismatch::WrongDef {
            operation: a,
            operand: y,
            actual: Some(b),
        }
    );
    assert!(matches!(
        verify_graph(&graph),
        Err(VerifyError::EdgeMismatch(_))
    ));

    graph.operand_mut(y).expect("operand").set_def(a);
    assert!(EdgeConsistencyChecker::verify(&graph));
}

#[test]
fn removed_use_is_reported() {
    let (mut graph, [x, _, _], [a, _]) = chain();
    graph.operand_mut(x).expect("operand").remove_use(a);

    let report = EdgeConsistencyChecker::check(&graph);
    assert_eq!(
        report.mismatches,
        vec![EdgeMismatch::MissingUse {
            operation: a,
            operand: x,
        }]
    );
}

#[test]
fn every_violation_is_collected() {
    let (mut graph, [x, y, z], [a, b]) = chain();
    graph.operand_mut(x).expect("operand").remove_use(a);
    graph.operand_mut(z).expect("operand").unset_def();

    let report = EdgeConsistencyChecker::check(&graph);
    assert_eq!(report.mismatch_count(), 2);
    assert!(report.mismatches.contains(&EdgeMismatch::WrongDef {
        operation: b,
        operand: z,
        actual: None,
    }));
    // y is untouched.
    assert!(!report
        .mismatches
        .iter()
        .any(|m| matches!(m, EdgeMismatch::WrongDef { operand, .. } if *operand == y)));
}

proptest! {
    /// Graphs whose operations only read earlier operands are acyclic and,
    /// once built, edge consistent.
    #[test]
    fn forward_only_graphs_verify(
        picks in prop::collection::vec((any::<prop::sample::Index>(), any::<prop::sample::Index>()), 1..24)
    ) {
        let mut graph = Graph::new();
        let mut available = vec![f32_operand(&mut graph), f32_operand(&mut graph)];
        for (lhs, rhs) in &picks {
            let out = f32_operand(&mut graph);
            let op = Operation::new(
                OpKind::Max,
                [*lhs.get(&available), *rhs.get(&available)],
                [out],
            );
            graph.add_operation(op).expect("operands exist");
            available.push(out);
        }
        graph.finish_building();

        prop_assert!(DagChecker::verify(&graph));
        prop_assert_eq!(EdgeConsistencyChecker::check(&graph).mismatch_count(), 0);

        let order = graph.topological_order().expect("acyclic");
        prop_assert_eq!(order.len(), picks.len());
        let position = |op: OperationIndex| order.iter().position(|o| *o == op);
        for (index, operation) in graph.operations() {
            for input in operation.inputs() {
                if let Some(def) = graph.operand(*input).expect("operand").def() {
                    prop_assert!(position(def) < position(index));
                }
            }
        }
    }
}
