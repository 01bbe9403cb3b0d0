//! Analyses of the netlist.
//!
//! The analyses construct data-structures that make answering certain
//! queries about the netlist easier. They never modify the netlist, except
//! for [ClusterSearch::substitute_with_node] and [disaggregate].
mod cluster_search;
mod sync_domains;
mod sync_group_cluster;

pub use cluster_search::{ClusterSearch, disaggregate, substitute_parts};
pub use sync_domains::SyncDomains;
pub use sync_group_cluster::{SyncGroupClusterContext, control_reads};
