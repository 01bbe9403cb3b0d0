//! Defines the default passes available to [PassManager].
use crate::passes::{
    AggregateBitwiseOps, AggregateIoSyncScc, AggregateLoops, ArchAggregate,
    ConsistencyCheck, LoopControlLowering, PruneSyncPredicates,
    ReduceRedundantValid, Schedule, ValuePropagation,
};
use crate::traversal::Named;
use crate::{pass_manager::PassManager, register_alias};
use hlsnet_utils::HlsResult;

impl PassManager {
    pub fn default_passes() -> HlsResult<Self> {
        // Construct the pass manager and register all passes.
        let mut pm = PassManager::default();

        // Validation passes
        pm.register_pass::<ConsistencyCheck>()?;

        // Clustering passes
        pm.register_pass::<AggregateBitwiseOps>()?;
        pm.register_pass::<AggregateIoSyncScc>()?;
        pm.register_pass::<AggregateLoops>()?;

        // Scheduling
        pm.register_pass::<Schedule>()?;
        pm.register_pass::<ArchAggregate>()?;

        // Lowering passes
        pm.register_pass::<LoopControlLowering>()?;
        pm.register_pass::<ReduceRedundantValid>()?;
        pm.register_pass::<PruneSyncPredicates>()?;
        pm.register_pass::<ValuePropagation>()?;

        register_alias!(
            pm,
            "pre-schedule",
            [AggregateBitwiseOps, AggregateIoSyncScc, AggregateLoops]
        );
        register_alias!(
            pm,
            "lower",
            [
                LoopControlLowering,
                ReduceRedundantValid,
                PruneSyncPredicates,
                ValuePropagation,
            ]
        );
        register_alias!(
            pm,
            "all",
            [
                ConsistencyCheck,
                "pre-schedule",
                Schedule,
                ArchAggregate,
                "lower",
                ConsistencyCheck,
            ]
        );

        Ok(pm)
    }
}
