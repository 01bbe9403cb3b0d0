//! Scheduling of an aggregate through its boundary proxies.
use super::{
    Snapshot, alap::asap_of, alap_scope, asap_scope, required_time,
};
use hlsnet_ir::{InPort, NetlistCtx, NodeId, NodeSchedule, OutPort, Parent};
use hlsnet_utils::{Error, HlsResult, SchedTime};

/// Times at which the drivers of the boundary inputs produce their values.
pub(super) fn input_times(
    ctx: &NetlistCtx,
    agg: NodeId,
) -> HlsResult<Vec<SchedTime>> {
    ctx.inputs_of(agg)
        .map(|dst| {
            ctx.driver(dst)
                .and_then(|src| ctx.out_time(src))
                .ok_or_else(|| {
                    Error::consistency(
                        format!("driver of {dst} is not scheduled"),
                        vec![ctx.desc(agg)],
                    )
                })
        })
        .collect()
}

/// Latest times at which the boundary outputs may be produced.
pub(super) fn output_requirements(
    ctx: &NetlistCtx,
    agg: NodeId,
    snap: &Snapshot,
) -> HlsResult<Vec<SchedTime>> {
    let asap = asap_of(ctx, snap, agg)?;
    ctx.outputs_of(agg)
        .map(|src| required_time(ctx, src, asap.outputs[src.idx as usize]))
        .collect()
}

pub(super) fn set_port_in(
    ctx: &mut NetlistCtx,
    agg: NodeId,
    times: &[SchedTime],
) {
    let proxies = ctx.aggregate(agg).port_in.clone();
    for (proxy, t) in proxies.into_iter().zip(times) {
        ctx.node_mut(proxy).sched = Some(NodeSchedule::flat(*t, 0, 1));
    }
}

pub(super) fn set_port_out(
    ctx: &mut NetlistCtx,
    agg: NodeId,
    times: &[SchedTime],
) {
    let proxies = ctx.aggregate(agg).port_out.clone();
    for (proxy, t) in proxies.into_iter().zip(times) {
        ctx.node_mut(proxy).sched = Some(NodeSchedule::flat(*t, 1, 0));
    }
}

/// Drop the schedules of everything the aggregate owns.
pub(super) fn reset_inner(ctx: &mut NetlistCtx, agg: NodeId) {
    for id in ctx.scope_nodes(Parent::Aggregate(agg)) {
        ctx.reset_schedule(id);
    }
}

/// Copy the proxy times to the boundary ports of the aggregate.
pub(super) fn finish(ctx: &mut NetlistCtx, agg: NodeId, zero: SchedTime) {
    let (port_in, port_out) = {
        let a = ctx.aggregate(agg);
        (a.port_in.clone(), a.port_out.clone())
    };
    let inputs: Vec<SchedTime> = port_in
        .iter()
        .map(|p| ctx.out_time(OutPort::new(*p, 0)).unwrap_or(zero))
        .collect();
    let outputs: Vec<SchedTime> = port_out
        .iter()
        .map(|p| ctx.in_time(InPort::new(*p, 0)).unwrap_or(zero))
        .collect();
    ctx.node_mut(agg).sched = Some(NodeSchedule {
        zero,
        inputs,
        outputs,
    });
}

/// Earliest reference time of the members.
pub(super) fn members_zero(ctx: &NetlistCtx, agg: NodeId) -> Option<SchedTime> {
    ctx.aggregate(agg)
        .sub_nodes
        .iter()
        .filter_map(|n| ctx.zero_time(*n))
        .min()
}

pub(super) fn asap(
    ctx: &mut NetlistCtx,
    agg: NodeId,
    begin: SchedTime,
) -> HlsResult<()> {
    let times = input_times(ctx, agg)?;
    reset_inner(ctx, agg);
    set_port_in(ctx, agg, &times);
    asap_scope(ctx, Parent::Aggregate(agg), begin)?;
    let zero = members_zero(ctx, agg).unwrap_or(begin);
    finish(ctx, agg, zero);
    Ok(())
}

pub(super) fn alap(
    ctx: &mut NetlistCtx,
    agg: NodeId,
    snap: &Snapshot,
) -> HlsResult<()> {
    let req = output_requirements(ctx, agg, snap)?;
    reset_inner(ctx, agg);
    set_port_out(ctx, agg, &req);
    alap_scope(ctx, Parent::Aggregate(agg), snap)?;
    let zero = members_zero(ctx, agg)
        .unwrap_or_else(|| asap_of(ctx, snap, agg).map_or(0, |s| s.zero));
    finish(ctx, agg, zero);
    Ok(())
}
