use crate::analysis::{SyncGroupClusterContext, substitute_parts};
use crate::traversal::{ConstructPass, Named, ParseVal, Pass, PassOpt};
use hlsnet_ir::{AggregateKind, NetlistCtx, Parent};
use hlsnet_utils::HlsResult;

/// Substitutes every I/O SCC of the top level with an
/// [AggregateKind::IoSyncScc] aggregate.
///
/// An I/O SCC is a set of explicit sync nodes (non-blocking or conditional
/// I/O, sync and loop status nodes) whose control logic depends on each
/// other inside of one clock window, together with that logic. Its members
/// must be scheduled into a single clock window.
pub struct AggregateIoSyncScc {
    dump_dot: bool,
}

impl Named for AggregateIoSyncScc {
    fn name() -> &'static str {
        "aggregate-io-sync-scc"
    }

    fn description() -> &'static str {
        "cluster synchronization coupled I/O into single cycle aggregates"
    }

    fn opts() -> Vec<PassOpt> {
        vec![PassOpt::new(
            "dump-dot",
            "log the discovered clusters as a Graphviz graph",
            ParseVal::Bool(false),
            PassOpt::parse_bool,
        )]
    }
}

impl ConstructPass for AggregateIoSyncScc {
    fn from(ctx: &NetlistCtx) -> HlsResult<Self> {
        let opts = Self::get_opts(ctx);
        Ok(AggregateIoSyncScc {
            dump_dot: opts["dump-dot"].bool(),
        })
    }
}

impl Pass for AggregateIoSyncScc {
    fn run(&mut self, ctx: &mut NetlistCtx) -> HlsResult<()> {
        // The coupling through a node depends on its registered outputs.
        for id in ctx.scope_nodes(Parent::Netlist) {
            ctx.resolve_realization(id);
        }
        let mut clusters =
            SyncGroupClusterContext::new(ctx, Parent::Netlist)?;
        let sccs = clusters.discover_io_sccs(ctx).to_vec();
        if self.dump_dot {
            log::info!("{}", clusters.to_dot(ctx));
        }
        let aggs =
            substitute_parts(ctx, &sccs, AggregateKind::IoSyncScc, 2)?;
        for (agg, len) in &aggs {
            ctx.tracer.log(|| format!("{agg}: io sync scc of {len}"));
        }
        log::debug!("{}: {} io sync clusters", ctx.name, aggs.len());
        Ok(())
    }
}
