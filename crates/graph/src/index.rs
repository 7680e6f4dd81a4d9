use crate::error::{GraphError, Result};
use crate::types::{NodeId, ProfileNode};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Pending,
    Kept,
    Removed,
}

/// Id-keyed arena over the nodes of one call tree.
///
/// Removed entries are never erased: their original parent stays available so
/// ancestor walks can pass through them. Only [`NodeIndex::resolve`] hides them.
#[derive(Debug)]
pub struct NodeIndex {
    nodes: Vec<ProfileNode>,

    /// Node id -> arena slot
    slots: HashMap<NodeId, usize>,

    /// Original parent of every slot, derived from `parent` or `children` links
    parents: Vec<Option<usize>>,

    status: Vec<Status>,

    /// Removed slot -> nearest surviving ancestor (path compression)
    compressed: HashMap<usize, Option<usize>>,
}

impl NodeIndex {
    /// Index `nodes`, validating every link.
    ///
    /// The original parent of a node is its `parent` field if present,
    /// otherwise the node whose `children` list names it. Disagreement
    /// between the two is an error, as are dangling ids, a child listed
    /// twice, and parent cycles.
    pub fn build(nodes: Vec<ProfileNode>) -> Result<Self> {
        let mut slots = HashMap::with_capacity(nodes.len());
        for (slot, node) in nodes.iter().enumerate() {
            if slots.insert(node.id, slot).is_some() {
                return Err(GraphError::DuplicateId { id: node.id });
            }
        }

        let mut parents = vec![None; nodes.len()];
        for (slot, node) in nodes.iter().enumerate() {
            if let Some(parent) = node.parent {
                let parent_slot = slots.get(&parent).copied().ok_or(GraphError::DanglingParent {
                    node: node.id,
                    parent,
                })?;
                parents[slot] = Some(parent_slot);
            }
        }

        // slot whose `children` list named each slot
        let mut listed_by: Vec<Option<usize>> = vec![None; nodes.len()];
        for (slot, node) in nodes.iter().enumerate() {
            for &child in node.child_ids() {
                let child_slot = slots.get(&child).copied().ok_or(GraphError::DanglingChild {
                    node: node.id,
                    child,
                })?;
                match listed_by[child_slot] {
                    Some(previous) if previous == slot => {
                        return Err(GraphError::DuplicateChild {
                            node: node.id,
                            child,
                        });
                    }
                    Some(previous) => {
                        return Err(GraphError::ConflictingParent {
                            node: child,
                            parent: nodes[previous].id,
                            listed_by: node.id,
                        });
                    }
                    None => listed_by[child_slot] = Some(slot),
                }
                match parents[child_slot] {
                    None => parents[child_slot] = Some(slot),
                    Some(existing) if existing == slot => {}
                    Some(existing) => {
                        return Err(GraphError::ConflictingParent {
                            node: child,
                            parent: nodes[existing].id,
                            listed_by: node.id,
                        });
                    }
                }
            }
        }

        check_acyclic(&nodes, &parents)?;

        let len = nodes.len();
        Ok(Self {
            nodes,
            slots,
            parents,
            status: vec![Status::Pending; len],
            compressed: HashMap::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up a node that has not been removed.
    pub fn resolve(&self, id: NodeId) -> Option<&ProfileNode> {
        let slot = *self.slots.get(&id)?;
        (self.status[slot] != Status::Removed).then(|| &self.nodes[slot])
    }

    /// Original parent of `id`, available even after `id` was removed.
    pub fn original_parent(&self, id: NodeId) -> Option<NodeId> {
        let slot = *self.slots.get(&id)?;
        self.parents[slot].map(|p| self.nodes[p].id)
    }

    pub fn is_removed(&self, id: NodeId) -> bool {
        self.slots
            .get(&id)
            .is_some_and(|&slot| self.status[slot] == Status::Removed)
    }

    pub fn keep(&mut self, id: NodeId) -> Result<()> {
        let slot = self.slot(id)?;
        self.keep_slot(slot);
        Ok(())
    }

    pub fn remove(&mut self, id: NodeId) -> Result<()> {
        let slot = self.slot(id)?;
        self.remove_slot(slot);
        Ok(())
    }

    /// Nearest ancestor of `id` that has not been removed, or `None` when
    /// every ancestor is gone (the node becomes a root).
    pub fn nearest_surviving_ancestor(&mut self, id: NodeId) -> Result<Option<NodeId>> {
        let slot = self.slot(id)?;
        Ok(self
            .surviving_ancestor_of_slot(slot)?
            .map(|s| self.nodes[s].id))
    }

    pub(crate) fn slot(&self, id: NodeId) -> Result<usize> {
        self.slots
            .get(&id)
            .copied()
            .ok_or(GraphError::NodeNotFound(id))
    }

    pub(crate) fn node_at(&self, slot: usize) -> &ProfileNode {
        &self.nodes[slot]
    }

    pub(crate) fn node_at_mut(&mut self, slot: usize) -> &mut ProfileNode {
        &mut self.nodes[slot]
    }

    pub(crate) fn is_kept_slot(&self, slot: usize) -> bool {
        self.status[slot] != Status::Removed
    }

    pub(crate) fn keep_slot(&mut self, slot: usize) {
        self.status[slot] = Status::Kept;
    }

    pub(crate) fn remove_slot(&mut self, slot: usize) {
        if self.status[slot] != Status::Removed && !self.compressed.is_empty() {
            // cached answers may point at the node being removed
            self.compressed.clear();
        }
        self.status[slot] = Status::Removed;
    }

    /// Slots named in the original `children` list of `slot`.
    pub(crate) fn child_slots(&self, slot: usize) -> Vec<usize> {
        self.nodes[slot]
            .child_ids()
            .iter()
            .filter_map(|id| self.slots.get(id).copied())
            .collect()
    }

    /// Walk the original parent chain above `slot`, through removed entries,
    /// until a surviving slot or the end of the chain.
    pub(crate) fn surviving_ancestor_of_slot(&mut self, slot: usize) -> Result<Option<usize>> {
        let mut visited = Vec::new();
        let mut current = self.parents[slot];

        let resolved = loop {
            let Some(candidate) = current else {
                break None;
            };
            if self.status[candidate] != Status::Removed {
                break Some(candidate);
            }
            if let Some(&cached) = self.compressed.get(&candidate) {
                break cached;
            }
            if visited.len() >= self.nodes.len() {
                return Err(GraphError::Cycle {
                    node: self.nodes[slot].id,
                });
            }
            visited.push(candidate);
            current = self.parents[candidate];
        };

        for removed in visited {
            self.compressed.insert(removed, resolved);
        }
        Ok(resolved)
    }

    /// Surviving nodes in original order.
    pub(crate) fn into_survivors(self) -> Vec<ProfileNode> {
        self.nodes
            .into_iter()
            .zip(self.status)
            .filter(|(_, status)| *status != Status::Removed)
            .map(|(node, _)| node)
            .collect()
    }
}

fn check_acyclic(nodes: &[ProfileNode], parents: &[Option<usize>]) -> Result<()> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mark {
        Unvisited,
        OnPath,
        Done,
    }

    let mut marks = vec![Mark::Unvisited; nodes.len()];
    let mut path = Vec::new();

    for start in 0..nodes.len() {
        let mut current = Some(start);
        while let Some(slot) = current {
            match marks[slot] {
                Mark::Done => break,
                Mark::OnPath => return Err(GraphError::Cycle { node: nodes[slot].id }),
                Mark::Unvisited => {
                    marks[slot] = Mark::OnPath;
                    path.push(slot);
                    current = parents[slot];
                }
            }
        }
        for slot in path.drain(..) {
            marks[slot] = Mark::Done;
        }
    }
    Ok(())
}
