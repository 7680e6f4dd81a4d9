use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifier of a node, unique within one call tree.
pub type NodeId = u64;

/// Source location of a sampled frame.
///
/// Fields absent on input stay absent on output; the accessors read them as
/// empty or zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,

    /// Opaque script handle; string or number depending on the producer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_id: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Zero-based; `-1` for native frames
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_number: Option<i64>,

    /// Fields this tool does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CallFrame {
    pub fn function_name(&self) -> &str {
        self.function_name.as_deref().unwrap_or_default()
    }

    pub fn url(&self) -> &str {
        self.url.as_deref().unwrap_or_default()
    }

    pub fn line_number(&self) -> i64 {
        self.line_number.unwrap_or_default()
    }

    pub fn column_number(&self) -> i64 {
        self.column_number.unwrap_or_default()
    }
}

/// One node of a CPU profile call tree.
///
/// `parent` and `children` are id references into the same flat node list,
/// never ownership. Either may be absent depending on the producer: trace
/// `ProfileChunk` events carry only `parent`, `.cpuprofile` files carry only
/// `children`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileNode {
    pub id: NodeId,

    #[serde(default)]
    pub call_frame: CallFrame,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<NodeId>>,

    /// `hitCount`, `positionTicks` and anything else passes through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProfileNode {
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    pub fn with_parent(mut self, parent: NodeId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = NodeId>) -> Self {
        self.children = Some(children.into_iter().collect());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.call_frame.url = Some(url.into());
        self
    }

    pub fn with_function(mut self, name: impl Into<String>) -> Self {
        self.call_frame.function_name = Some(name.into());
        self
    }

    /// Child ids, treating an absent list as empty.
    pub fn child_ids(&self) -> &[NodeId] {
        self.children.as_deref().unwrap_or(&[])
    }
}

/// Which link fields a tree carried on input, and therefore writes on output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkStyle {
    pub parents: bool,
    pub children: bool,
}

impl LinkStyle {
    pub fn detect(nodes: &[ProfileNode]) -> Self {
        Self {
            parents: nodes.iter().any(|n| n.parent.is_some()),
            children: nodes.iter().any(|n| n.children.is_some()),
        }
    }
}
