//! Arena based netlist of the hlsnet compiler.
//!
//! Nodes live in one [IndexedMap] owned by the [NetlistCtx] and refer to each
//! other through [NodeId]s and port handles. The containment hierarchy
//! (netlist, aggregates) is kept separately from the dependency graph.

// Modules defining internal structures.
mod builder;
mod consistency;
mod graph;
mod index;
mod netlist;
mod node;
mod partition;
mod platform;
mod printer;
mod realization;
mod types;

// Re-export types at the module level.
pub use builder::{Builder, IoOptions, ReadPorts, WritePorts};
pub use consistency::{CheckOptions, check_acyclic, check_netlist};
pub use graph::ScopeGraph;
pub use index::{ChannelId, InPort, IndexRef, IndexedMap, NodeId, OutPort};
pub use netlist::{Channel, NetlistCtx};
pub use node::{
    Aggregate, AggregateKind, ArchKind, Input, IoNode, IoPorts, LoopStatus,
    Node, NodeKind, OpKind, Output, Parent, SyncNode,
};
pub use partition::{ArchPartition, FsmPartition, PipelinePartition};
pub use platform::{AbstractPlatform, IoKind, OpTiming, Platform};
pub use printer::Printer;
pub use realization::{NodeSchedule, Realization, default_realization};
pub use types::HlsType;
