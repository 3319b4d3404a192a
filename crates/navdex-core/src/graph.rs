//! Derived relationship tables.
//!
//! Runs once, after fixups, over the now-stable entity and reference tables:
//!
//! - **Inheritance closure**: direct trait edges are kept as `direct`; every
//!   further pair reachable through a chain of direct edges is added as
//!   `derived`. Reachability is computed by a DFS per node over a dense
//!   adjacency list, so no storage-level fixpoint loop is needed.
//! - **Call graph**: a function reference made from inside a function to a
//!   resolved function, or to the stub of a foreign one, is a static edge. A call with no resolved target but a
//!   trait method declaration id fans out to every function implementing that
//!   declaration. This over-approximates dynamic dispatch on purpose.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use tracing::{debug, info_span};

use crate::error::IndexResult;
use crate::ids::GlobalId;
use crate::session::IngestSession;
use crate::store::{Caller, IndexStore, Inheritance, InheritanceKind};

/// Rows produced by the graph builder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GraphReport {
    pub direct_inheritance: usize,
    pub derived_inheritance: usize,
    pub static_calls: usize,
    pub dynamic_calls: usize,
}

/// Compute and write the derived tables. Fails if they were already written.
pub fn build_graphs(session: &mut IngestSession) -> IndexResult<GraphReport> {
    let span = info_span!("graph");
    let _enter = span.enter();

    let inheritance = inheritance_closure(session.pending_inheritance());
    let (callers, static_calls, dynamic_calls) = call_graph(session.store());

    let report = GraphReport {
        direct_inheritance: inheritance
            .iter()
            .filter(|i| i.kind == InheritanceKind::Direct)
            .count(),
        derived_inheritance: inheritance
            .iter()
            .filter(|i| i.kind == InheritanceKind::Derived)
            .count(),
        static_calls,
        dynamic_calls,
    };
    session
        .store_mut()
        .set_derived_tables(inheritance, callers)?;
    debug!(
        direct = report.direct_inheritance,
        derived = report.derived_inheritance,
        static_calls = report.static_calls,
        dynamic_calls = report.dynamic_calls,
        "graphs built"
    );
    Ok(report)
}

/// Direct edges plus their transitive closure, as `(derived, base)` rows.
///
/// Duplicate direct edges collapse; self-pairs from cycles are dropped.
pub fn inheritance_closure(direct: &[(GlobalId, GlobalId)]) -> Vec<Inheritance> {
    let direct: BTreeSet<(GlobalId, GlobalId)> = direct
        .iter()
        .copied()
        .filter(|(derived, base)| derived != base)
        .collect();

    // Dense node numbering.
    let mut nodes: Vec<GlobalId> = Vec::new();
    let mut index: HashMap<GlobalId, usize> = HashMap::new();
    for &(derived, base) in &direct {
        for id in [derived, base] {
            index.entry(id).or_insert_with(|| {
                nodes.push(id);
                nodes.len() - 1
            });
        }
    }
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for (derived, base) in &direct {
        adjacency[index[derived]].push(index[base]);
    }

    let mut rows: Vec<Inheritance> = direct
        .iter()
        .map(|&(derived, base)| Inheritance {
            derived,
            base,
            kind: InheritanceKind::Direct,
        })
        .collect();

    let mut derived_rows = BTreeSet::new();
    for start in 0..nodes.len() {
        let mut seen = vec![false; nodes.len()];
        let mut stack: Vec<usize> = adjacency[start].clone();
        while let Some(node) = stack.pop() {
            if seen[node] {
                continue;
            }
            seen[node] = true;
            stack.extend(adjacency[node].iter().copied());
        }
        for (reached, _) in seen.iter().enumerate().filter(|(_, s)| **s) {
            let pair = (nodes[start], nodes[reached]);
            if reached != start && !direct.contains(&pair) {
                derived_rows.insert(pair);
            }
        }
    }
    rows.extend(derived_rows.into_iter().map(|(derived, base)| Inheritance {
        derived,
        base,
        kind: InheritanceKind::Derived,
    }));
    rows
}

/// Caller edges, with the number contributed by each rule.
pub fn call_graph(store: &IndexStore) -> (Vec<Caller>, usize, usize) {
    let mut static_edges = BTreeSet::new();
    let mut dynamic_edges = BTreeSet::new();

    for reference in store.references() {
        if !reference.is_function_ref() || store.function(reference.scope).is_none() {
            continue;
        }
        let caller = reference.scope;
        if !reference.target.is_none() {
            if store.function(reference.target).is_some()
                || store.unknown(reference.target).is_some()
            {
                static_edges.insert(Caller {
                    caller,
                    callee: reference.target,
                });
            }
        } else if let Some(declid) = reference.declid {
            for &callee in store.functions_with_declid(declid) {
                dynamic_edges.insert(Caller { caller, callee });
            }
        }
    }

    let static_calls = static_edges.len();
    let mut all = static_edges;
    let before = all.len();
    all.extend(dynamic_edges);
    let dynamic_calls = all.len() - before;
    (all.into_iter().collect(), static_calls, dynamic_calls)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extent::Extent;
    use crate::store::{Function, FunctionKind, RefKind, Reference, Unknown};

    fn g(id: u32) -> GlobalId {
        GlobalId::new(id)
    }

    mod closure_tests {
        use super::*;

        #[test]
        fn two_hop_chain_adds_one_derived_row() {
            let rows = inheritance_closure(&[(g(1), g(2)), (g(2), g(3))]);
            assert_eq!(rows.len(), 3);
            let derived: Vec<_> = rows
                .iter()
                .filter(|r| r.kind == InheritanceKind::Derived)
                .collect();
            assert_eq!(derived.len(), 1);
            assert_eq!((derived[0].derived, derived[0].base), (g(1), g(3)));
            // (1, 2) appears only as direct.
            assert_eq!(
                rows.iter()
                    .filter(|r| (r.derived, r.base) == (g(1), g(2)))
                    .count(),
                1
            );
        }

        #[test]
        fn diamond_is_not_duplicated() {
            let rows = inheritance_closure(&[(g(1), g(2)), (g(1), g(3)), (g(2), g(4)), (g(3), g(4))]);
            let derived: Vec<_> = rows
                .iter()
                .filter(|r| r.kind == InheritanceKind::Derived)
                .map(|r| (r.derived, r.base))
                .collect();
            assert_eq!(derived, vec![(g(1), g(4))]);
        }

        #[test]
        fn cycles_terminate_without_self_pairs() {
            let rows = inheritance_closure(&[(g(1), g(2)), (g(2), g(1))]);
            assert!(rows.iter().all(|r| r.derived != r.base));
            assert_eq!(rows.len(), 2);
        }

        #[test]
        fn long_chain_reaches_every_ancestor() {
            let edges: Vec<_> = (1..6).map(|i| (g(i), g(i + 1))).collect();
            let rows = inheritance_closure(&edges);
            // 5 direct + 4 + 3 + 2 + 1 derived
            assert_eq!(rows.len(), 15);
        }
    }

    mod call_graph_tests {
        use super::*;

        fn function(store: &mut IndexStore, id: u32, declid: Option<u32>) {
            store.insert_function(Function {
                id: g(id),
                kind: FunctionKind::Function,
                name: format!("f{}", id),
                qualname: format!("foo::f{}", id),
                declid: declid.map(g),
                scope: GlobalId::NONE,
                file_id: None,
                extent: Extent::default(),
                language: "rust".to_string(),
            });
        }

        fn call(store: &mut IndexStore, scope: u32, target: u32, declid: Option<u32>) {
            store.insert_reference(
                Reference::new(RefKind::Function, g(target), None, Extent::default())
                    .with_scope(g(scope))
                    .with_declid(declid.map(g)),
            );
        }

        #[test]
        fn static_call_from_function_scope() {
            let mut store = IndexStore::new();
            function(&mut store, 1, None);
            function(&mut store, 2, None);
            call(&mut store, 1, 2, None);
            call(&mut store, 1, 2, None);
            let (edges, statics, dynamics) = call_graph(&store);
            assert_eq!(edges, vec![Caller { caller: g(1), callee: g(2) }]);
            assert_eq!((statics, dynamics), (1, 0));
        }

        #[test]
        fn dynamic_call_fans_out_to_implementations() {
            let mut store = IndexStore::new();
            function(&mut store, 1, None);
            function(&mut store, 11, Some(7));
            function(&mut store, 12, Some(7));
            call(&mut store, 1, 0, Some(7));
            let (edges, _, dynamics) = call_graph(&store);
            assert_eq!(dynamics, 2);
            assert_eq!(
                edges,
                vec![
                    Caller { caller: g(1), callee: g(11) },
                    Caller { caller: g(1), callee: g(12) },
                ]
            );
        }

        #[test]
        fn call_to_foreign_stub_is_a_static_edge() {
            let mut store = IndexStore::new();
            function(&mut store, 1, None);
            store.insert_unknown(Unknown {
                id: g(30),
                crate_name: "std".to_string(),
                qualname: Some("std::process::exit".to_string()),
            });
            let mut exit = Reference::new(RefKind::Function, GlobalId::NONE, None, Extent::default())
                .with_scope(g(1));
            exit.point_at_stub(g(30));
            store.insert_reference(exit);

            // A variable read of a foreign static is not a call.
            let mut read = Reference::new(RefKind::Variable, GlobalId::NONE, None, Extent::default())
                .with_scope(g(1));
            read.point_at_stub(g(30));
            store.insert_reference(read);

            let (edges, statics, _) = call_graph(&store);
            assert_eq!(edges, vec![Caller { caller: g(1), callee: g(30) }]);
            assert_eq!(statics, 1);
        }

        #[test]
        fn references_outside_functions_are_ignored() {
            let mut store = IndexStore::new();
            function(&mut store, 2, None);
            call(&mut store, 99, 2, None);
            assert!(call_graph(&store).0.is_empty());
        }
    }
}
