use proptest::prelude::*;
use std::collections::HashSet;
use taskweave_rs::weave::graph::{DependencyGraph, SubTaskDescriptor};

// Acyclic plans: sub-task N may only depend on sub-tasks 0..N-1.
// Every fourth-ish sub-task is informational (no tool).
fn plan_strategy(max_tasks: usize) -> impl Strategy<Value = Vec<SubTaskDescriptor>> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        proptest::collection::vec(
            (proptest::option::of(any::<usize>()), 0..4u8),
            num_tasks,
        )
        .prop_map(|raw| {
            raw.into_iter()
                .enumerate()
                .map(|(i, (dep, kind))| {
                    let mut descriptor = SubTaskDescriptor::new(i, format!("task {}", i));
                    if kind != 0 {
                        descriptor = descriptor.tool(format!("tool_{}", kind));
                    }
                    match dep {
                        Some(d) if i > 0 => descriptor.after(d % i),
                        _ => descriptor,
                    }
                })
                .collect()
        })
    })
}

proptest! {
    #[test]
    fn test_levels_respect_dependencies(plan in plan_strategy(16)) {
        let graph = DependencyGraph::build(&plan).unwrap();
        let levels = graph.compute_levels(false);

        for level in &levels {
            prop_assert!(!level.is_empty());
            prop_assert!(level.windows(2).all(|w| w[0] < w[1]));
        }

        for node in graph.nodes() {
            let Some(level) = graph.level_of(node.index) else { continue };
            for dep in graph.dependencies_of(node.index) {
                let dep_level = graph.level_of(dep).unwrap();
                prop_assert!(dep_level < level);
                // a node is placed as early as its prerequisites allow
                prop_assert_eq!(dep_level + 1, level);
            }
            if graph.dependencies_of(node.index).is_empty() {
                prop_assert_eq!(level, 0);
            }
        }
    }

    #[test]
    fn test_every_actionable_node_placed_once(plan in plan_strategy(16)) {
        let graph = DependencyGraph::build(&plan).unwrap();
        let placed: Vec<usize> = graph.compute_levels(false).concat();
        let unique: HashSet<usize> = placed.iter().copied().collect();
        prop_assert_eq!(placed.len(), unique.len());

        let actionable: HashSet<usize> = plan
            .iter()
            .filter(|d| d.tool_name.is_some())
            .map(|d| d.index)
            .collect();
        prop_assert_eq!(unique, actionable);
    }

    #[test]
    fn test_informational_nodes_form_trailing_level(plan in plan_strategy(16)) {
        let graph = DependencyGraph::build(&plan).unwrap();
        let informational: Vec<usize> = plan
            .iter()
            .filter(|d| d.tool_name.is_none())
            .map(|d| d.index)
            .collect();

        let with = graph.compute_levels(true);
        let without = graph.compute_levels(false);
        if informational.is_empty() {
            prop_assert_eq!(with, without);
        } else {
            prop_assert_eq!(with.len(), without.len() + 1);
            prop_assert_eq!(with.last().unwrap(), &informational);
        }
    }

    #[test]
    fn test_descriptor_order_does_not_matter(plan in plan_strategy(16)) {
        let forward = DependencyGraph::build(&plan).unwrap();
        let mut reversed_plan = plan.clone();
        reversed_plan.reverse();
        let reversed = DependencyGraph::build(&reversed_plan).unwrap();
        prop_assert_eq!(forward.compute_levels(true), reversed.compute_levels(true));
    }
}
