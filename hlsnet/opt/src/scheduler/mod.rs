//! Two pass list scheduler with clock window quantization.
//!
//! The netlist is first scheduled as soon as possible. The ASAP times are
//! recorded in a [Snapshot], every schedule is dropped and the netlist is
//! compacted as late as possible without delaying the outputs. Aggregates
//! are scheduled as a unit by a strategy chosen by their kind:
//! - [AggregateKind::BitwiseOps]: members are retimed as one LUT tree per
//!   clock window,
//! - [AggregateKind::IoSyncScc]: all members share one clock window,
//! - [AggregateKind::Loop]: the body is placed to minimize its latency,
//! - anything else is scheduled through its boundary proxies.
mod aggregate;
mod alap;
mod asap;
mod bitwise_ops;
mod io_sync_scc;
mod loop_cluster;

pub use alap::{alap_generic, alap_scope, push_to_clk_end, required_time};
pub use asap::{asap_generic, asap_scope, asap_walk};

use hlsnet_ir::{AggregateKind, NetlistCtx, NodeId, NodeSchedule, Parent};
use hlsnet_utils::{Error, HlsResult, SchedTime};
use std::collections::HashMap;

/// Schedules of nodes recorded before they are reset.
pub type Snapshot = HashMap<NodeId, NodeSchedule>;

/// Schedule the whole netlist.
pub fn schedule(ctx: &mut NetlistCtx) -> HlsResult<()> {
    let all = ctx.all_nodes_recursive();
    for id in &all {
        ctx.resolve_realization(*id);
        ctx.reset_schedule(*id);
    }

    ctx.traced("asap", |ctx| asap_scope(ctx, Parent::Netlist, 0))?;
    if let Some(id) = all.iter().find(|id| ctx.node(**id).sched.is_none()) {
        return Err(Error::consistency(
            "node was not reached by the ASAP scheduler",
            vec![ctx.desc(*id)],
        ));
    }

    let snap = snapshot(ctx, &all);
    for id in ctx.scope_nodes(Parent::Netlist) {
        ctx.reset_schedule(id);
    }
    ctx.traced("alap", |ctx| alap_scope(ctx, Parent::Netlist, &snap))?;

    renormalize(ctx);
    Ok(())
}

/// Record the schedules of `nodes`.
pub fn snapshot(ctx: &NetlistCtx, nodes: &[NodeId]) -> Snapshot {
    nodes
        .iter()
        .filter_map(|id| ctx.node(*id).sched.clone().map(|s| (*id, s)))
        .collect()
}

/// Restore recorded schedules of `nodes`, shifted by `offset`.
pub fn restore(
    ctx: &mut NetlistCtx,
    snap: &Snapshot,
    nodes: &[NodeId],
    offset: SchedTime,
) {
    for id in nodes {
        let mut s = snap.get(id).cloned();
        if let Some(s) = &mut s {
            s.shift(offset);
        }
        ctx.node_mut(*id).sched = s;
    }
}

/// A node and everything it owns.
pub fn subtree(ctx: &NetlistCtx, id: NodeId) -> Vec<NodeId> {
    let mut out = vec![id];
    if ctx.node(id).aggregate().is_some() {
        out.extend(ctx.nodes_recursive(Parent::Aggregate(id)));
    }
    out
}

/// Shift the schedule by whole clock periods so that the earliest time
/// lies in clock window 0.
pub fn renormalize(ctx: &mut NetlistCtx) {
    let all = ctx.all_nodes_recursive();
    let Some(min) = all
        .iter()
        .filter_map(|id| ctx.node(*id).sched.as_ref().map(|s| s.bounds().0))
        .min()
    else {
        return;
    };
    if min >= 0 && min < ctx.clk_period {
        return;
    }
    let offset = -ctx.start_of_clk(min);
    log::debug!("{}: shifting the schedule by {offset}", ctx.name);
    for id in all {
        if let Some(s) = &mut ctx.node_mut(id).sched {
            s.shift(offset);
        }
    }
}

/// Schedule one node whose drivers are scheduled.
pub(crate) fn schedule_node_asap(
    ctx: &mut NetlistCtx,
    id: NodeId,
    begin: SchedTime,
) -> HlsResult<()> {
    let Some(kind) = ctx.node(id).aggregate().map(|a| a.kind) else {
        return asap_generic(ctx, id, begin);
    };
    ctx.traced(&format!("{} {id}", kind.name()), |ctx| match kind {
        AggregateKind::BitwiseOps => bitwise_ops::asap(ctx, id, begin),
        AggregateKind::IoSyncScc => io_sync_scc::asap(ctx, id, begin),
        AggregateKind::Loop => loop_cluster::asap(ctx, id, begin),
        AggregateKind::Generic | AggregateKind::Arch(_) => {
            aggregate::asap(ctx, id, begin)
        }
    })
}

/// Compact one node whose users are scheduled.
pub(crate) fn schedule_node_alap(
    ctx: &mut NetlistCtx,
    id: NodeId,
    snap: &Snapshot,
) -> HlsResult<()> {
    let Some(kind) = ctx.node(id).aggregate().map(|a| a.kind) else {
        return alap_generic(ctx, id, snap);
    };
    ctx.traced(&format!("{} {id}", kind.name()), |ctx| match kind {
        AggregateKind::BitwiseOps => bitwise_ops::alap(ctx, id, snap),
        AggregateKind::IoSyncScc => io_sync_scc::alap(ctx, id, snap),
        AggregateKind::Loop => loop_cluster::alap(ctx, id, snap),
        AggregateKind::Generic | AggregateKind::Arch(_) => {
            aggregate::alap(ctx, id, snap)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hlsnet_ir::{
        Builder, CheckOptions, HlsType, OpKind, Realization, check_netlist,
    };
    use hlsnet_utils::ErrorKind;

    #[test]
    fn leaf_output_delay() {
        let mut ctx = NetlistCtx::new("t", 1000);
        let mut b = Builder::new(&mut ctx);
        let c = b.add_const(1, HlsType::BIT);
        b.set_realization(c.node, Realization::uniform(0, 1, 0, 5, 0));
        asap_scope(&mut ctx, Parent::Netlist, 0).unwrap();
        assert_eq!(ctx.out_time(c), Some(5));
    }

    #[test]
    fn long_chain_is_split_at_clock_boundary() {
        let mut ctx = NetlistCtx::new("t", 1000);
        let mut b = Builder::new(&mut ctx);
        let c = b.add_const(1, HlsType::BIT);
        let x = b.add_op(OpKind::Add, HlsType::BIT, &[c]);
        let y = b.add_op(OpKind::Add, HlsType::BIT, &[x]);
        b.set_realization(x.node, Realization::uniform(1, 1, 600, 0, 0));
        b.set_realization(y.node, Realization::uniform(1, 1, 600, 0, 0));
        schedule(&mut ctx).unwrap();
        let zx = ctx.zero_time(x.node).unwrap();
        let zy = ctx.zero_time(y.node).unwrap();
        assert_eq!(ctx.clk_index(zy) - ctx.clk_index(zx), 1);
        check_netlist(
            &ctx,
            CheckOptions {
                causality: true,
                scheduled: true,
            },
        )
        .unwrap();
    }

    /// `x` ends at 590, `y` adds its delay and the 10 of register setup.
    fn chain_windows(y_delay: SchedTime) -> (i64, i64) {
        let mut ctx = NetlistCtx::new("t", 1000);
        let mut b = Builder::new(&mut ctx);
        let c = b.add_const(1, HlsType::BIT);
        let x = b.add_op(OpKind::Add, HlsType::BIT, &[c]);
        let y = b.add_op(OpKind::Add, HlsType::BIT, &[x]);
        b.set_realization(c.node, Realization::uniform(0, 1, 0, 0, 0));
        b.set_realization(x.node, Realization::uniform(1, 1, 590, 0, 0));
        b.set_realization(y.node, Realization::uniform(1, 1, y_delay, 0, 0));
        schedule(&mut ctx).unwrap();
        let window = |n| ctx.clk_index(ctx.zero_time(n).unwrap());
        (window(x.node), window(y.node))
    }

    #[test]
    fn delay_filling_the_setup_margin_stays_in_window() {
        let (x, y) = chain_windows(400);
        assert_eq!(x, y);
        let (x, y) = chain_windows(401);
        assert_eq!(y - x, 1);
    }

    #[test]
    fn input_delay_of_one_clock_is_unschedulable() {
        let mut ctx = NetlistCtx::new("t", 1000);
        let mut b = Builder::new(&mut ctx);
        let c = b.add_const(1, HlsType::BIT);
        let x = b.add_op(OpKind::Not, HlsType::BIT, &[c]);
        b.set_realization(x.node, Realization::uniform(1, 1, 1000, 0, 0));
        let err = schedule(&mut ctx).unwrap_err();
        assert!(err.is_timing_constraint());
        let ErrorKind::TimingConstraint { node, delay, .. } = err.kind()
        else {
            unreachable!()
        };
        assert_eq!(node.id, x.node.raw());
        assert_eq!(*delay, 1000);
    }

    #[test]
    fn renormalized_into_first_window() {
        let mut ctx = NetlistCtx::new("t", 1000);
        let mut b = Builder::new(&mut ctx);
        let c = b.add_const(1, HlsType::BIT);
        let x = b.add_op(OpKind::Not, HlsType::BIT, &[c]);
        b.set_realization(x.node, Realization::uniform(1, 1, 0, 0, 0));
        ctx.node_mut(c.node).sched = Some(NodeSchedule::flat(-1500, 0, 1));
        ctx.node_mut(x.node).sched = Some(NodeSchedule::flat(-1200, 1, 1));
        renormalize(&mut ctx);
        assert_eq!(ctx.zero_time(c.node), Some(500));
        assert_eq!(ctx.zero_time(x.node), Some(800));
    }
}
