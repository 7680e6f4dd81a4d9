//! # Profile Cleaner Trace
//!
//! Finds the CPU profiles embedded in a Chrome performance trace, contracts
//! each call tree and annotates surviving remote frames with viewer deep
//! links.
//!
//! ## Pipeline
//!
//! ```text
//! Trace JSON
//!     │
//!     ├──> Locate trees (traceEvents[*].args.data.cpuProfile.nodes)
//!     │      └─ ProfileChunk events with the same (pid, id) form one tree
//!     │
//!     ├──> Per tree, in parallel
//!     │      ├─ Contract (profile-cleaner-graph)
//!     │      └─ Annotate survivors (profile-cleaner-protocol)
//!     │
//!     └──> Write node lists back, report per tree
//! ```

mod annotate;
mod error;
mod walker;

pub use annotate::{annotate, Annotation};
pub use error::{Result, TraceError, TreeError, TreeFailure};
pub use walker::{CleanReport, TraceCleaner, TreeReport};
