//! Scheduling of a synchronization coupled cluster.
//!
//! Every member of the cluster has to be placed into the same clock window
//! because the synchronization logic of the cluster is evaluated in a single
//! cycle. The window is selected first and the content is then scheduled
//! inside of it.
use super::aggregate::{
    finish, input_times, output_requirements, reset_inner, set_port_in,
    set_port_out,
};
use super::{Snapshot, alap::asap_of, alap_scope, asap_scope, restore, subtree};
use hlsnet_ir::{NetlistCtx, NodeId, Parent};
use hlsnet_utils::{Error, HlsResult, SchedTime};

/// Latest zero time of the members outside of the window starting at `ws`.
fn escapes_window(
    ctx: &NetlistCtx,
    agg: NodeId,
    ws: SchedTime,
) -> Option<SchedTime> {
    let end = ws + ctx.clk_period;
    ctx.aggregate(agg)
        .sub_nodes
        .iter()
        .filter_map(|n| ctx.zero_time(*n))
        .filter(|z| *z < ws || *z >= end)
        .max()
}

pub(super) fn asap(
    ctx: &mut NetlistCtx,
    agg: NodeId,
    begin: SchedTime,
) -> HlsResult<()> {
    let times = input_times(ctx, agg)?;
    let t_max = times.iter().copied().fold(begin, SchedTime::max);
    let first = ctx.start_of_clk(t_max);
    let mut overflow = 0;
    // The inputs arriving late in the first window may push a member into
    // the next one; the second window starts with all inputs registered.
    for ws in [first, first + ctx.clk_period] {
        reset_inner(ctx, agg);
        let clamped: Vec<SchedTime> =
            times.iter().map(|t| (*t).max(ws)).collect();
        set_port_in(ctx, agg, &clamped);
        asap_scope(ctx, Parent::Aggregate(agg), ws)?;
        match escapes_window(ctx, agg, ws) {
            None => {
                ctx.tracer.log(|| format!("{agg} fits into window {ws}"));
                finish(ctx, agg, ws);
                return Ok(());
            }
            Some(z) => {
                ctx.tracer.log(|| format!("{agg} overflows window {ws}"));
                overflow = z - ws;
            }
        }
    }
    Err(Error::timing(
        ctx.desc(agg),
        "io sync cluster",
        overflow,
        ctx.clk_period,
    ))
}

pub(super) fn alap(
    ctx: &mut NetlistCtx,
    agg: NodeId,
    snap: &Snapshot,
) -> HlsResult<()> {
    let req = output_requirements(ctx, agg, snap)?;
    let asap_zero = asap_of(ctx, snap, agg)?.zero;
    let clk = ctx.clk_period;
    let ff = ctx.ff_store_time();
    let lo = ctx.start_of_clk(asap_zero);
    let hi = req
        .iter()
        .copied()
        .min()
        .map_or(lo, |r| ctx.start_of_clk(r).max(lo));

    let mut ws = hi;
    while ws >= lo {
        reset_inner(ctx, agg);
        let capped: Vec<SchedTime> =
            req.iter().map(|r| (*r).min(ws + clk - ff)).collect();
        set_port_out(ctx, agg, &capped);
        alap_scope(ctx, Parent::Aggregate(agg), snap)?;
        if escapes_window(ctx, agg, ws).is_none() {
            ctx.tracer.log(|| format!("{agg} compacted into window {ws}"));
            finish(ctx, agg, ws);
            return Ok(());
        }
        ws -= clk;
    }

    // Nothing later than the ASAP placement keeps the cluster together.
    ctx.tracer.log(|| format!("{agg} keeps its ASAP placement"));
    let nodes = subtree(ctx, agg);
    restore(ctx, snap, &nodes, 0);
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::analysis::ClusterSearch;
    use crate::scheduler::schedule;
    use hlsnet_ir::{
        AggregateKind, Builder, CheckOptions, HlsType, IoOptions, NetlistCtx,
        OpKind, Realization, check_netlist,
    };

    #[test]
    fn late_inputs_move_cluster_to_next_window() {
        let mut ctx = NetlistCtx::new("t", 1000);
        let mut b = Builder::new(&mut ctx);
        let c = b.add_const(3, HlsType::Bits(8));
        b.set_realization(c.node, Realization::uniform(0, 1, 0, 900, 0));
        let r = b.add_read(
            "a",
            HlsType::Bits(8),
            IoOptions::default().non_blocking(),
        );
        let data = r.data.unwrap();
        let x = b.add_op(OpKind::Add, HlsType::Bits(8), &[data, c]);
        let w = b.add_write(
            "b",
            Some(x),
            IoOptions::default().extra_cond(r.valid_nb),
        );
        let members = [r.node, x.node, w.node];
        let cs = ClusterSearch::discover_from_node_list(&ctx, &members);
        cs.substitute_with_node(&mut ctx, AggregateKind::IoSyncScc, None)
            .unwrap();
        schedule(&mut ctx).unwrap();
        check_netlist(
            &ctx,
            CheckOptions {
                causality: true,
                scheduled: true,
            },
        )
        .unwrap();
        let windows: Vec<i64> = members
            .iter()
            .map(|n| ctx.clk_index(ctx.zero_time(*n).unwrap()))
            .collect();
        assert_eq!(windows, vec![1, 1, 1]);
    }
}
