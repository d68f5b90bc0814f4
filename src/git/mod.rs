//! Repository topology analysis.
//!
//! `query` is the narrow read-only interface to the version-control
//! system; `topology` turns its answers into branch deltas, worktree
//! state, and recommendations.

pub mod query;
pub mod topology;

pub use query::{GitCli, GitQuery};
pub use topology::{
    analyze, categorize, resolve_base_ref, BranchCategory, BranchDelta, ResolutionError,
    TopologyReport, TopologySnapshot, WorktreeState,
};
