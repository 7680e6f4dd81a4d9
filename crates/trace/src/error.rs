use profile_cleaner_graph::{GraphError, NodeId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TraceError>;

/// Document-level failure.
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("Unsupported document: expected a traceEvents object, an event array, or a cpuprofile with nodes")]
    UnsupportedDocument,

    #[error("{} call tree(s) failed: {}", .0.len(), summarize(.0))]
    TreesFailed(Vec<TreeFailure>),
}

/// Why one embedded call tree could not be cleaned.
#[derive(Error, Debug)]
pub enum TreeError {
    #[error("nodes list is not a valid call tree: {0}")]
    InvalidNodes(#[source] serde_json::Error),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("failed to encode cleaned nodes: {0}")]
    Encode(#[source] serde_json::Error),
}

impl TreeError {
    pub fn node_id(&self) -> Option<NodeId> {
        match self {
            Self::Graph(err) => Some(err.node_id()),
            Self::InvalidNodes(_) | Self::Encode(_) => None,
        }
    }
}

/// A [`TreeError`] tagged with where the tree lives in the document.
#[derive(Error, Debug)]
#[error("tree #{tree}{}: {source}", location(.event_index))]
pub struct TreeFailure {
    /// Position among the call trees found in the document
    pub tree: usize,

    /// Index into `traceEvents`, absent for a bare cpuprofile
    pub event_index: Option<usize>,

    #[source]
    pub source: TreeError,
}

impl TreeFailure {
    pub fn node_id(&self) -> Option<NodeId> {
        self.source.node_id()
    }
}

fn location(event_index: &Option<usize>) -> String {
    event_index
        .map(|idx| format!(" (traceEvents[{idx}])"))
        .unwrap_or_default()
}

fn summarize(failures: &[TreeFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
