//! # Scheduling and architecture generation for the hlsnet netlist
//!
//! This library contains the analyses and the transformations which turn an
//! unscheduled [hlsnet_ir::NetlistCtx] into a scheduled netlist partitioned
//! into pipelines and FSMs:
//! 1. clustering of nodes which must be scheduled as a unit
//!    ([passes::AggregateBitwiseOps], [passes::AggregateIoSyncScc],
//!    [passes::AggregateLoops]),
//! 2. the two pass ASAP/ALAP list [scheduler],
//! 3. the architecture aggregation ([passes::ArchAggregate]),
//! 4. lowering and cleanup of the synchronization logic.
//!
//! Passes are registered in a [pass_manager::PassManager], see
//! [pass_manager::PassManager::default_passes].
pub mod analysis;
pub mod default_passes;
pub mod pass_manager;
pub mod passes;
pub mod scheduler;
pub mod traversal;
