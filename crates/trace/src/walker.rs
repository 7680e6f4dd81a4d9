use crate::annotate::{annotate, Annotation};
use crate::error::{Result, TraceError, TreeError, TreeFailure};
use profile_cleaner_graph::{contract, KeepPolicy, NodeId, ProfileNode};
use profile_cleaner_protocol::ViewerLink;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

const CPU_PROFILE_NODES: &str = "/args/data/cpuProfile/nodes";

/// Outcome for one cleaned call tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeReport {
    pub tree: usize,
    pub event_index: Option<usize>,
    /// Number of `nodes` arrays the tree was spread over
    pub chunks: usize,
    pub nodes_in: usize,
    pub nodes_kept: usize,
    pub annotated: usize,
    pub unparsable_urls: usize,
}

impl TreeReport {
    pub fn nodes_removed(&self) -> usize {
        self.nodes_in - self.nodes_kept
    }
}

/// Outcome for a whole document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanReport {
    pub trees: Vec<TreeReport>,
}

impl CleanReport {
    pub fn nodes_in(&self) -> usize {
        self.trees.iter().map(|t| t.nodes_in).sum()
    }

    pub fn nodes_kept(&self) -> usize {
        self.trees.iter().map(|t| t.nodes_kept).sum()
    }

    pub fn annotated(&self) -> usize {
        self.trees.iter().map(|t| t.annotated).sum()
    }
}

/// One `nodes` array belonging to a call tree.
struct Segment<'a> {
    event_index: Option<usize>,
    nodes: &'a mut Value,
}

/// Where a call tree was found. Trees streamed as `ProfileChunk` events span
/// several segments; every other tree has exactly one.
struct TreeSlot<'a> {
    tree: usize,
    segments: Vec<Segment<'a>>,
}

/// Cleans every CPU profile embedded in a trace document.
///
/// Trees are independent, so they are processed on the rayon pool. A tree
/// that fails is left untouched in the document and reported; the others are
/// still cleaned.
pub struct TraceCleaner<P> {
    policy: P,
    viewer: Option<ViewerLink>,
}

impl<P> TraceCleaner<P>
where
    P: KeepPolicy + Sync,
{
    pub fn new(policy: P) -> Self {
        Self {
            policy,
            viewer: None,
        }
    }

    /// Enable deep-link annotation of surviving remote frames.
    pub fn with_viewer(mut self, viewer: ViewerLink) -> Self {
        self.viewer = Some(viewer);
        self
    }

    /// Contract one node list and annotate the survivors.
    pub fn clean_nodes(
        &self,
        nodes: Vec<ProfileNode>,
    ) -> profile_cleaner_graph::Result<(Vec<ProfileNode>, TreeReport)> {
        let nodes_in = nodes.len();
        let mut kept = contract(nodes, &self.policy)?;

        let mut report = TreeReport {
            nodes_in,
            nodes_kept: kept.len(),
            chunks: 1,
            ..Default::default()
        };
        if let Some(viewer) = &self.viewer {
            for node in &mut kept {
                match annotate(node, viewer) {
                    Annotation::Rewritten => report.annotated += 1,
                    Annotation::Unparsable => report.unparsable_urls += 1,
                    Annotation::NotRemote | Annotation::AlreadyLinked => {}
                }
            }
        }
        Ok((kept, report))
    }

    /// Clean `document` in place.
    ///
    /// Accepts `{"traceEvents": [...]}`, a bare event array, or a bare
    /// cpuprofile (`{"nodes": [...]}`). `ProfileChunk` events sharing a
    /// `(pid, id)` pair are one profile and are contracted together. Everything
    /// outside the node lists is passed through unchanged.
    pub fn clean_document(&self, document: &mut Value) -> Result<CleanReport> {
        let slots = locate_trees(document)?;
        log::info!("Found {} CPU profile(s) in trace", slots.len());

        let results: Vec<_> = slots
            .into_par_iter()
            .map(|slot| self.clean_slot(slot))
            .collect();

        let mut report = CleanReport::default();
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(tree) => report.trees.push(tree),
                Err(failure) => {
                    log::error!("{failure}");
                    failures.push(failure);
                }
            }
        }

        if !failures.is_empty() {
            return Err(TraceError::TreesFailed(failures));
        }
        Ok(report)
    }

    fn clean_slot(&self, slot: TreeSlot<'_>) -> std::result::Result<TreeReport, TreeFailure> {
        let TreeSlot { tree, segments } = slot;
        let event_index = segments.first().and_then(|s| s.event_index);
        let fail = |source: TreeError| TreeFailure {
            tree,
            event_index,
            source,
        };

        // Decode from borrows so a failing tree stays untouched.
        let mut decoded = Vec::new();
        let mut origin: HashMap<NodeId, usize> = HashMap::new();
        for (position, segment) in segments.iter().enumerate() {
            let nodes = Vec::<ProfileNode>::deserialize(&*segment.nodes)
                .map_err(|err| fail(TreeError::InvalidNodes(err)))?;
            origin.extend(nodes.iter().map(|node| (node.id, position)));
            decoded.extend(nodes);
        }

        let (cleaned, mut report) = self
            .clean_nodes(decoded)
            .map_err(|err| fail(TreeError::from(err)))?;

        // Survivors go back to the segment they were read from.
        let mut split: Vec<Vec<ProfileNode>> = vec![Vec::new(); segments.len()];
        for node in cleaned {
            let position = origin.get(&node.id).copied().unwrap_or_default();
            split[position].push(node);
        }
        let encoded = split
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|err| fail(TreeError::Encode(err)))?;

        report.tree = tree;
        report.event_index = event_index;
        report.chunks = segments.len();
        for (segment, nodes) in segments.into_iter().zip(encoded) {
            *segment.nodes = nodes;
        }

        log::info!(
            "Cleaned tree #{}: {} nodes in {} chunk(s), {} removed, {} annotated",
            tree,
            report.nodes_in,
            report.chunks,
            report.nodes_removed(),
            report.annotated
        );
        Ok(report)
    }
}

fn locate_trees(document: &mut Value) -> Result<Vec<TreeSlot<'_>>> {
    let is_cpuprofile = document
        .as_object()
        .is_some_and(|obj| !obj.contains_key("traceEvents") && obj.contains_key("nodes"));
    if is_cpuprofile {
        let nodes = document
            .get_mut("nodes")
            .ok_or(TraceError::UnsupportedDocument)?;
        if nodes.is_null() {
            return Ok(Vec::new());
        }
        return Ok(vec![TreeSlot {
            tree: 0,
            segments: vec![Segment {
                event_index: None,
                nodes,
            }],
        }]);
    }

    let events = match document {
        Value::Array(events) => events,
        Value::Object(obj) => match obj.get_mut("traceEvents") {
            Some(Value::Array(events)) => events,
            _ => return Err(TraceError::UnsupportedDocument),
        },
        _ => return Err(TraceError::UnsupportedDocument),
    };

    let mut slots: Vec<TreeSlot<'_>> = Vec::new();
    let mut chunked: HashMap<(String, String), usize> = HashMap::new();
    for (event_index, event) in events.iter_mut().enumerate() {
        let key = chunk_key(event);
        let Some(nodes) = event.pointer_mut(CPU_PROFILE_NODES) else {
            continue;
        };
        if nodes.is_null() {
            continue;
        }
        let segment = Segment {
            event_index: Some(event_index),
            nodes,
        };

        if let Some(key) = key {
            if let Some(&tree) = chunked.get(&key) {
                slots[tree].segments.push(segment);
                continue;
            }
            chunked.insert(key, slots.len());
        }
        slots.push(TreeSlot {
            tree: slots.len(),
            segments: vec![segment],
        });
    }
    Ok(slots)
}

/// `(pid, id)` of a `ProfileChunk` event. Later chunks of a profile refer to
/// nodes sent in earlier ones.
fn chunk_key(event: &Value) -> Option<(String, String)> {
    if event.get("name").and_then(Value::as_str) != Some("ProfileChunk") {
        return None;
    }
    let id = event.get("id")?;
    let pid = event.get("pid").map(Value::to_string).unwrap_or_default();
    Some((pid, id.to_string()))
}
