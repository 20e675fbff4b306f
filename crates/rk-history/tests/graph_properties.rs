//! Property tests for dependency graph ordering and cycle rejection.

use std::collections::HashMap;

use proptest::prelude::*;
use proptest::sample::Index;
use rk_history::{DependencyGraph, FeatureId, HistoryError};

fn node(i: usize) -> FeatureId {
    FeatureId::new(format!("N{i}"))
}

/// Node `i` picks its parents among nodes `0..i`, so the result is acyclic
fn build(picks: &[Vec<Index>]) -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    for (i, choices) in picks.iter().enumerate() {
        let mut parents: Vec<FeatureId> = Vec::new();
        if i > 0 {
            for choice in choices {
                let parent = node(choice.index(i));
                if !parents.contains(&parent) {
                    parents.push(parent);
                }
            }
        }
        graph.add_node(node(i), parents).unwrap();
    }
    graph
}

fn dag() -> impl Strategy<Value = Vec<Vec<Index>>> {
    prop::collection::vec(prop::collection::vec(any::<Index>(), 0..4), 1..24)
}

fn snapshot(graph: &DependencyGraph) -> HashMap<FeatureId, Vec<FeatureId>> {
    graph
        .ids()
        .iter()
        .map(|id| (id.clone(), graph.parents_of(id).unwrap().to_vec()))
        .collect()
}

proptest! {
    #[test]
    fn full_order_puts_parents_first(picks in dag()) {
        let graph = build(&picks);
        let order = graph.full_order().unwrap();
        prop_assert_eq!(order.len(), graph.len());

        let position: HashMap<&FeatureId, usize> =
            order.iter().enumerate().map(|(i, id)| (id, i)).collect();
        prop_assert_eq!(position.len(), order.len());

        for id in graph.ids() {
            for parent in graph.parents_of(id).unwrap() {
                prop_assert!(position[parent] < position[id]);
            }
        }
    }

    #[test]
    fn order_is_deterministic(picks in dag()) {
        let graph = build(&picks);
        prop_assert_eq!(graph.full_order().unwrap(), graph.full_order().unwrap());
        prop_assert_eq!(graph.full_order().unwrap(), build(&picks).full_order().unwrap());
    }

    #[test]
    fn subset_order_matches_full_order(picks in dag(), take in prop::collection::vec(any::<Index>(), 1..8)) {
        let graph = build(&picks);
        let mut subset: Vec<FeatureId> = take.iter().map(|ix| node(ix.index(graph.len()))).collect();
        subset.dedup();

        let ordered = graph.topological_order(&subset).unwrap();
        let full = graph.full_order().unwrap();
        let expected: Vec<FeatureId> = full
            .into_iter()
            .filter(|id| ordered.contains(id))
            .collect();
        prop_assert_eq!(ordered, expected);
    }

    #[test]
    fn closing_a_cycle_changes_nothing(picks in dag(), pick in any::<Index>()) {
        let mut graph = build(&picks);
        let target = node(pick.index(graph.len()));
        let ancestors = graph.ancestors_of(&target);
        prop_assume!(!ancestors.is_empty());

        let mut ancestors: Vec<FeatureId> = ancestors.into_iter().collect();
        ancestors.sort();
        let ancestor = ancestors[0].clone();

        let before = snapshot(&graph);
        let order_before = graph.full_order().unwrap();

        match graph.add_edge(&ancestor, &target) {
            Err(HistoryError::Cycle { path }) => {
                prop_assert_eq!(path.first(), Some(&ancestor));
                prop_assert_eq!(path.last(), Some(&ancestor));
                prop_assert!(path.contains(&target));
            }
            other => prop_assert!(false, "expected a cycle, got {:?}", other),
        }
        prop_assert_eq!(snapshot(&graph), before);
        prop_assert_eq!(graph.full_order().unwrap(), order_before);
    }

    #[test]
    fn descendants_and_ancestors_agree(picks in dag()) {
        let graph = build(&picks);
        for a in graph.ids() {
            for b in graph.descendants_of(a) {
                prop_assert!(graph.ancestors_of(&b).contains(a));
            }
        }
    }
}
