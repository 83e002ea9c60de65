//! Structural checks over a [`Graph`].
//!
//! Both checkers walk the whole graph and collect every violation instead of
//! stopping at the first one. `verify` keeps the plain pass/fail answer; `check`
//! returns the offending indices.

use thiserror::Error;
use tracing::{debug, warn};

use crate::ir::index::{deduplicated, defined};
use crate::ir::{Graph, OperandIndex, OperationIndex};

/// Result of the acyclicity check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DagReport {
    /// `(from, to)` pairs where `to` was reached while still on the DFS stack.
    pub back_edges: Vec<(OperationIndex, OperationIndex)>,
}

impl DagReport {
    pub fn is_acyclic(&self) -> bool {
        self.back_edges.is_empty()
    }
}

/// Depth-first search over operation -> output uses -> operation edges.
pub struct DagChecker;

impl DagChecker {
    pub fn verify(graph: &Graph) -> bool {
        Self::check(graph).is_acyclic()
    }

    pub fn check(graph: &Graph) -> DagReport {
        let count = graph.operation_count();
        let mut visited = vec![false; count];
        let mut on_stack = vec![false; count];
        let mut report = DagReport::default();

        for (root, _) in graph.operations() {
            if visited[root.as_usize()] {
                continue;
            }
            // Frames hold an operation and its pending successors.
            let mut stack: Vec<(OperationIndex, Vec<OperationIndex>)> = Vec::new();
            visited[root.as_usize()] = true;
            on_stack[root.as_usize()] = true;
            stack.push((root, successors(graph, root)));

            while let Some((current, pending)) = stack.last_mut() {
                let current = *current;
                let Some(next) = pending.pop() else {
                    on_stack[current.as_usize()] = false;
                    stack.pop();
                    continue;
                };
                let slot = next.as_usize();
                if slot >= count {
                    continue;
                }
                if on_stack[slot] {
                    report.back_edges.push((current, next));
                }
                if visited[slot] {
                    continue;
                }
                visited[slot] = true;
                on_stack[slot] = true;
                stack.push((next, successors(graph, next)));
            }
        }

        if !report.is_acyclic() {
            debug!(back_edges = report.back_edges.len(), "graph is cyclic");
        }
        report
    }
}

fn successors(graph: &Graph, index: OperationIndex) -> Vec<OperationIndex> {
    let Ok(operation) = graph.operation(index) else {
        return Vec::new();
    };
    let mut next: Vec<OperationIndex> = Vec::new();
    for output in deduplicated(operation.outputs()) {
        if let Ok(operand) = graph.operand(output) {
            for user in operand.uses() {
                if !next.contains(user) {
                    next.push(*user);
                }
            }
        }
    }
    next
}

/// A def/use relationship that one side of the graph does not acknowledge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeMismatch {
    /// `operation` reads `operand`, which does not list it as a use.
    MissingUse {
        operation: OperationIndex,
        operand: OperandIndex,
    },
    /// `operation` writes `operand`, whose def points elsewhere.
    WrongDef {
        operation: OperationIndex,
        operand: OperandIndex,
        actual: Option<OperationIndex>,
    },
    /// `operation` references an operand that does not exist.
    UnknownOperand {
        operation: OperationIndex,
        operand: OperandIndex,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeConsistencyReport {
    pub mismatches: Vec<EdgeMismatch>,
}

impl EdgeConsistencyReport {
    pub fn mismatch_count(&self) -> usize {
        self.mismatches.len()
    }

    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty()
    }
}

pub struct EdgeConsistencyChecker;

impl EdgeConsistencyChecker {
    pub fn verify(graph: &Graph) -> bool {
        Self::check(graph).is_consistent()
    }

    pub fn check(graph: &Graph) -> EdgeConsistencyReport {
        let mut report = EdgeConsistencyReport::default();
        for (index, operation) in graph.operations() {
            for input in defined(operation.inputs()) {
                match graph.operand(input) {
                    Ok(operand) if operand.has_use(index) => {}
                    Ok(_) => report.mismatches.push(EdgeMismatch::MissingUse {
                        operation: index,
                        operand: input,
                    }),
                    Err(_) => report.mismatches.push(EdgeMismatch::UnknownOperand {
                        operation: index,
                        operand: input,
                    }),
                }
            }
            for output in operation.outputs() {
                match graph.operand(*output) {
                    Ok(operand) if operand.def() == Some(index) => {}
                    Ok(operand) => report.mismatches.push(EdgeMismatch::WrongDef {
                        operation: index,
                        operand: *output,
                        actual: operand.def(),
                    }),
                    Err(_) => report.mismatches.push(EdgeMismatch::UnknownOperand {
                        operation: index,
                        operand: *output,
                    }),
                }
            }
        }
        if !report.is_consistent() {
            debug!(
                mismatches = report.mismatch_count(),
                "def/use edges are inconsistent"
            );
        }
        report
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("graph is cyclic ({} back edges)", .0.back_edges.len())]
    Cyclic(DagReport),
    #[error("graph has {} def/use mismatches", .0.mismatch_count())]
    EdgeMismatch(EdgeConsistencyReport),
}

/// Runs both checks; the DAG check is reported first when both fail.
pub fn verify_graph(graph: &Graph) -> Result<(), VerifyError> {
    let dag = DagChecker::check(graph);
    let edges = EdgeConsistencyChecker::check(graph);
    if !dag.is_acyclic() {
        warn!(back_edges = ?dag.back_edges, "verifier rejected graph");
        return Err(VerifyError::Cyclic(dag));
    }
    if !edges.is_consistent() {
        warn!(mismatches = ?edges.mismatches, "verifier rejected graph");
        return Err(VerifyError::EdgeMismatch(edges));
    }
    Ok(())
}
