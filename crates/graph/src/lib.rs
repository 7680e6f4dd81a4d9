//! # Profile Cleaner Graph
//!
//! Structural surgery on CPU-profile call trees.
//!
//! A call tree arrives as a flat node list where `parent` and `children`
//! are integer id references. Contraction removes the nodes a
//! [`KeepPolicy`] rejects and hangs their children off the nearest
//! surviving ancestor, however many generations in a row are removed.
//!
//! ## Architecture
//!
//! ```text
//! ProfileNode[]
//!     │
//!     ├──> Node Index (arena + id map)
//!     │      ├─ Validate ids and links
//!     │      └─ Walk parent chains through removed nodes
//!     │
//!     └──> Contraction Engine
//!            ├─ Classify every node once (KeepPolicy)
//!            ├─ Splice children of removed nodes onto survivors
//!            └─ Rebuild parent/children of survivors
//! ```
//!
//! ## Example
//!
//! ```
//! use profile_cleaner_graph::{contract, ProfileNode, UrlFilter};
//!
//! let nodes = vec![
//!     ProfileNode::new(1).with_children([2]),
//!     ProfileNode::new(2).with_parent(1).with_children([3]).with_url("http://bad.js"),
//!     ProfileNode::new(3).with_parent(2).with_children([]),
//! ];
//! let kept = contract(nodes, &UrlFilter::new(["bad"])).unwrap();
//! assert_eq!(kept[0].children, Some(vec![3]));
//! assert_eq!(kept[1].parent, Some(1));
//! ```

mod contract;
mod error;
mod index;
mod policy;
mod types;

pub use contract::contract;
pub use error::{GraphError, PolicyError, Result};
pub use index::NodeIndex;
pub use policy::{AnonymousClassifier, KeepPolicy, NeverAnonymous, UrlFilter};
pub use types::{CallFrame, LinkStyle, NodeId, ProfileNode};
