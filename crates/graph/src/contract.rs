use crate::error::{GraphError, Result};
use crate::index::NodeIndex;
use crate::policy::KeepPolicy;
use crate::types::{LinkStyle, ProfileNode};

/// Remove every node `policy` rejects and reattach its children to the
/// nearest surviving ancestor.
///
/// Survivors come back in their original relative order with `parent` and
/// `children` rewritten. Children a node inherits are appended after the
/// children it already had. Link fields are only written in the styles the
/// input used (see [`LinkStyle`]).
///
/// The policy is evaluated exactly once per node. A policy error or a
/// malformed input tree aborts the whole contraction.
pub fn contract<P>(nodes: Vec<ProfileNode>, policy: &P) -> Result<Vec<ProfileNode>>
where
    P: KeepPolicy + ?Sized,
{
    let style = LinkStyle::detect(&nodes);
    let mut index = NodeIndex::build(nodes)?;
    let len = index.len();

    // Phase 1: classify everything before resolving any ancestor, so a parent
    // listed after its child is already known to be kept or removed.
    for slot in 0..len {
        let node = index.node_at(slot);
        let keep = policy.keep(node).map_err(|source| GraphError::Policy {
            node: node.id,
            source,
        })?;
        if keep {
            index.keep_slot(slot);
        } else {
            index.remove_slot(slot);
        }
    }

    // Phase 2: splice the children of removed nodes onto their nearest
    // surviving ancestor, in original order.
    let mut inherited: Vec<Vec<usize>> = vec![Vec::new(); len];
    for slot in 0..len {
        if index.is_kept_slot(slot) {
            continue;
        }
        let Some(ancestor) = index.surviving_ancestor_of_slot(slot)? else {
            continue;
        };
        for child in index.child_slots(slot) {
            if index.is_kept_slot(child) {
                inherited[ancestor].push(child);
            }
        }
    }

    // Phase 3: new parent of every survivor.
    let mut new_parent: Vec<Option<usize>> = vec![None; len];
    for (slot, parent) in new_parent.iter_mut().enumerate() {
        if index.is_kept_slot(slot) {
            *parent = index.surviving_ancestor_of_slot(slot)?;
        }
    }

    // Phase 4: rebuild child lists. A child is only ever listed under its new
    // parent. `placed` covers a child reached both through its own parent's
    // list and the parent-only sweep below.
    let mut placed = vec![false; len];
    let mut rebuilt: Vec<Vec<usize>> = vec![Vec::new(); len];
    for slot in 0..len {
        if !index.is_kept_slot(slot) {
            continue;
        }
        let own = index.child_slots(slot);
        for child in own.into_iter().chain(inherited[slot].iter().copied()) {
            if index.is_kept_slot(child) && new_parent[child] == Some(slot) && !placed[child] {
                placed[child] = true;
                rebuilt[slot].push(child);
            }
        }
    }
    // Survivors reachable only through `parent` links (trace chunk style).
    for child in 0..len {
        if placed[child] || !index.is_kept_slot(child) {
            continue;
        }
        if let Some(parent) = new_parent[child] {
            placed[child] = true;
            rebuilt[parent].push(child);
        }
    }

    for slot in 0..len {
        if !index.is_kept_slot(slot) {
            continue;
        }
        let parent_id = new_parent[slot].map(|p| index.node_at(p).id);
        let child_ids: Vec<_> = rebuilt[slot].iter().map(|&c| index.node_at(c).id).collect();

        let node = index.node_at_mut(slot);
        if style.parents {
            node.parent = parent_id;
        }
        if style.children && (node.children.is_some() || !child_ids.is_empty()) {
            node.children = Some(child_ids);
        }
    }

    let survivors = index.into_survivors();
    log::debug!(
        "Contracted call tree: {} nodes in, {} kept, {} removed",
        len,
        survivors.len(),
        len - survivors.len()
    );
    Ok(survivors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PolicyError;
    use crate::policy::UrlFilter;
    use crate::types::NodeId;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::collections::HashMap;

    fn keep_all(_: &ProfileNode) -> std::result::Result<bool, PolicyError> {
        Ok(true)
    }

    fn remove_ids(
        ids: &'static [NodeId],
    ) -> impl Fn(&ProfileNode) -> std::result::Result<bool, PolicyError> {
        move |node: &ProfileNode| -> std::result::Result<bool, PolicyError> {
            Ok(!ids.contains(&node.id))
        }
    }

    fn by_id(nodes: &[ProfileNode]) -> HashMap<NodeId, &ProfileNode> {
        nodes.iter().map(|n| (n.id, n)).collect()
    }

    fn ids(nodes: &[ProfileNode]) -> Vec<NodeId> {
        nodes.iter().map(|n| n.id).collect()
    }

    #[test]
    fn keep_all_is_identity() {
        let nodes = vec![
            ProfileNode::new(1).with_children([2, 3]),
            ProfileNode::new(2).with_parent(1).with_children([4]).with_url("https://a.example/x.js"),
            ProfileNode::new(3).with_parent(1).with_children([]),
            ProfileNode::new(4).with_parent(2).with_children([]),
        ];
        let out = contract(nodes.clone(), &keep_all).unwrap();
        assert_eq!(out, nodes);
    }

    #[test]
    fn single_removal_appends_children_after_existing_siblings() {
        // P(1) -> [S(2), A(3)], A -> [C1(4), C2(5)]
        let nodes = vec![
            ProfileNode::new(1).with_children([2, 3]),
            ProfileNode::new(2).with_parent(1).with_children([]),
            ProfileNode::new(3).with_parent(1).with_children([4, 5]),
            ProfileNode::new(4).with_parent(3).with_children([]),
            ProfileNode::new(5).with_parent(3).with_children([]),
        ];
        let out = contract(nodes, &remove_ids(&[3])).unwrap();
        assert_eq!(ids(&out), vec![1, 2, 4, 5]);

        let map = by_id(&out);
        assert_eq!(map[&1].children, Some(vec![2, 4, 5]));
        assert_eq!(map[&4].parent, Some(1));
        assert_eq!(map[&5].parent, Some(1));
    }

    #[test]
    fn chain_of_removed_generations_is_collapsed() {
        // P(1) -> A(2) -> B(3) -> C(4)
        let nodes = vec![
            ProfileNode::new(1).with_children([2]),
            ProfileNode::new(2).with_parent(1).with_children([3]),
            ProfileNode::new(3).with_parent(2).with_children([4]),
            ProfileNode::new(4).with_parent(3).with_children([]),
        ];
        let out = contract(nodes, &remove_ids(&[2, 3])).unwrap();

        assert_eq!(ids(&out), vec![1, 4]);
        let map = by_id(&out);
        assert_eq!(map[&1].children, Some(vec![4]));
        assert_eq!(map[&4].parent, Some(1));
        for node in &out {
            assert!(!node.child_ids().contains(&2) && !node.child_ids().contains(&3));
            assert!(node.parent != Some(2) && node.parent != Some(3));
        }
    }

    #[test]
    fn removed_root_promotes_children_to_roots() {
        let nodes = vec![
            ProfileNode::new(1).with_children([2, 3]),
            ProfileNode::new(2).with_parent(1).with_children([4]),
            ProfileNode::new(3).with_parent(1).with_children([]),
            ProfileNode::new(4).with_parent(2).with_children([]),
        ];
        let out = contract(nodes, &remove_ids(&[1])).unwrap();

        let map = by_id(&out);
        assert_eq!(map[&2].parent, None);
        assert_eq!(map[&3].parent, None);
        assert_eq!(map[&2].children, Some(vec![4]));
        assert_eq!(map[&4].parent, Some(2));
    }

    #[test]
    fn node_with_fully_removed_ancestry_becomes_root() {
        let nodes = vec![
            ProfileNode::new(1).with_children([2]),
            ProfileNode::new(2).with_parent(1).with_children([3]),
            ProfileNode::new(3).with_parent(2).with_children([4]),
            ProfileNode::new(4).with_parent(3).with_children([]),
        ];
        let out = contract(nodes, &remove_ids(&[1, 2, 3])).unwrap();
        assert_eq!(out, vec![ProfileNode::new(4).with_children([])]);
    }

    #[test]
    fn rejecting_everything_yields_empty_tree() {
        let nodes = vec![
            ProfileNode::new(1).with_children([2]),
            ProfileNode::new(2).with_parent(1).with_children([]),
        ];
        let out = contract(nodes, &|_: &ProfileNode| -> std::result::Result<bool, PolicyError> {
            Ok(false)
        })
        .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn empty_tree_is_fine() {
        assert!(contract(Vec::new(), &keep_all).unwrap().is_empty());
    }

    #[test]
    fn url_pattern_scenario() {
        let nodes = vec![
            ProfileNode::new(1).with_children([2]),
            ProfileNode::new(2).with_parent(1).with_children([3]).with_url("http://bad.js"),
            ProfileNode::new(3).with_parent(2).with_children([]),
        ];
        let out = contract(nodes, &UrlFilter::new(["bad"])).unwrap();
        assert_eq!(
            out,
            vec![
                ProfileNode::new(1).with_children([3]),
                ProfileNode::new(3).with_parent(1).with_children([]),
            ]
        );
    }

    #[test]
    fn grandchildren_inherited_through_removed_child_follow_splice_order() {
        // 1 -> [2, 5]; 2 -> [3, 4]; 3 -> [6]. Remove 2 and 3.
        let nodes = vec![
            ProfileNode::new(1).with_children([2, 5]),
            ProfileNode::new(2).with_parent(1).with_children([3, 4]),
            ProfileNode::new(3).with_parent(2).with_children([6]),
            ProfileNode::new(4).with_parent(2).with_children([]),
            ProfileNode::new(5).with_parent(1).with_children([]),
            ProfileNode::new(6).with_parent(3).with_children([]),
        ];
        let out = contract(nodes, &remove_ids(&[2, 3])).unwrap();
        let map = by_id(&out);
        assert_eq!(map[&1].children, Some(vec![5, 4, 6]));
        assert_eq!(map[&6].parent, Some(1));
    }

    #[test]
    fn parent_listed_after_child_is_classified_first() {
        let nodes = vec![
            ProfileNode::new(3).with_parent(2).with_children([]),
            ProfileNode::new(2).with_parent(1).with_children([3]),
            ProfileNode::new(1).with_children([2]),
        ];
        let out = contract(nodes, &remove_ids(&[2])).unwrap();
        assert_eq!(
            out,
            vec![
                ProfileNode::new(3).with_parent(1).with_children([]),
                ProfileNode::new(1).with_children([3]),
            ]
        );
    }

    #[test]
    fn parent_only_links_stay_parent_only() {
        // trace ProfileChunk style: no children lists at all
        let nodes = vec![
            ProfileNode::new(1),
            ProfileNode::new(2).with_parent(1),
            ProfileNode::new(3).with_parent(2),
            ProfileNode::new(4).with_parent(3),
        ];
        let out = contract(nodes, &remove_ids(&[2, 3])).unwrap();
        assert_eq!(out, vec![ProfileNode::new(1), ProfileNode::new(4).with_parent(1)]);
    }

    #[test]
    fn children_only_links_stay_children_only() {
        // .cpuprofile style: no parent fields
        let nodes = vec![
            ProfileNode::new(1).with_children([2]),
            ProfileNode::new(2).with_children([3, 4]),
            ProfileNode::new(3),
            ProfileNode::new(4),
        ];
        let out = contract(nodes, &remove_ids(&[2])).unwrap();
        assert_eq!(
            out,
            vec![
                ProfileNode::new(1).with_children([3, 4]),
                ProfileNode::new(3),
                ProfileNode::new(4),
            ]
        );
    }

    #[test]
    fn policy_runs_once_per_node() {
        let calls = RefCell::new(Vec::new());
        let policy = |node: &ProfileNode| -> std::result::Result<bool, PolicyError> {
            calls.borrow_mut().push(node.id);
            Ok(node.id != 2)
        };
        let nodes = vec![
            ProfileNode::new(1).with_children([2]),
            ProfileNode::new(2).with_parent(1).with_children([3]),
            ProfileNode::new(3).with_parent(2).with_children([]),
        ];
        contract(nodes, &policy).unwrap();
        assert_eq!(calls.into_inner(), vec![1, 2, 3]);
    }

    #[test]
    fn policy_failure_aborts_with_node_id() {
        let policy = |node: &ProfileNode| -> std::result::Result<bool, PolicyError> {
            if node.id == 2 {
                Err(PolicyError::new("classifier unavailable"))
            } else {
                Ok(true)
            }
        };
        let nodes = vec![
            ProfileNode::new(1).with_children([2]),
            ProfileNode::new(2).with_parent(1).with_children([]),
        ];
        let err = contract(nodes, &policy).unwrap_err();
        assert_eq!(err.node_id(), 2);
        assert!(matches!(err, GraphError::Policy { .. }));
    }

    #[test]
    fn malformed_input_is_reported_not_repaired() {
        let nodes = vec![
            ProfileNode::new(1).with_children([2]),
            ProfileNode::new(2).with_parent(1).with_children([8]),
        ];
        let err = contract(nodes, &keep_all).unwrap_err();
        assert_eq!(err, GraphError::DanglingChild { node: 2, child: 8 });

        let nodes = vec![
            ProfileNode::new(1).with_parent(2),
            ProfileNode::new(2).with_parent(1),
        ];
        let err = contract(nodes, &remove_ids(&[1])).unwrap_err();
        assert!(matches!(err, GraphError::Cycle { .. }));

        let nodes = vec![
            ProfileNode::new(1).with_children([2, 2]),
            ProfileNode::new(2).with_parent(1),
        ];
        let err = contract(nodes, &keep_all).unwrap_err();
        assert_eq!(err, GraphError::DuplicateChild { node: 1, child: 2 });
    }

    #[test]
    fn unrelated_fields_pass_through() {
        let mut kept = ProfileNode::new(3).with_parent(2).with_children([]);
        kept.extra.insert("hitCount".into(), serde_json::json!(12));
        let nodes = vec![
            ProfileNode::new(1).with_children([2]),
            ProfileNode::new(2).with_parent(1).with_children([3]),
            kept,
        ];
        let out = contract(nodes, &remove_ids(&[2])).unwrap();
        assert_eq!(out[1].extra["hitCount"], serde_json::json!(12));
    }
}
