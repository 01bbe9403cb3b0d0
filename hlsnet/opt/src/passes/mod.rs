//! Passes of the hlsnet compiler.
mod aggregate_bitwise_ops;
mod aggregate_io_sync_scc;
mod aggregate_loops;
mod arch_aggregate;
mod consistency_check;
mod loop_control_lowering;
mod prune_sync_predicates;
mod reduce_redundant_valid;
mod schedule;
mod value_propagation;

pub use aggregate_bitwise_ops::AggregateBitwiseOps;
pub use aggregate_io_sync_scc::AggregateIoSyncScc;
pub use aggregate_loops::AggregateLoops;
pub use arch_aggregate::ArchAggregate;
pub use consistency_check::ConsistencyCheck;
pub use loop_control_lowering::LoopControlLowering;
pub use prune_sync_predicates::PruneSyncPredicates;
pub use reduce_redundant_valid::ReduceRedundantValid;
pub use schedule::Schedule;
pub use value_propagation::{ValuePropagation, simplify, trace_source};
