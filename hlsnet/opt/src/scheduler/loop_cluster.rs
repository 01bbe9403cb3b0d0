//! Scheduling of a loop body.
//!
//! The body is scheduled as a unit which is only ever moved by whole clock
//! periods, so its internal window structure (the latency of one iteration)
//! is fixed during ASAP. Several start windows are tried and the placement
//! occupying the fewest windows without delaying any output wins.
use super::aggregate::{
    finish, input_times, members_zero, output_requirements, reset_inner,
    set_port_in, set_port_out,
};
use super::{
    Snapshot, alap::asap_of, alap_scope, asap_scope, restore, snapshot,
    subtree,
};
use hlsnet_ir::{NetlistCtx, NodeId, OutPort, Parent};
use hlsnet_utils::{HlsResult, SchedTime};

/// One placement of the body.
struct Trial {
    snap: Snapshot,
    span: i64,
    outputs: Vec<SchedTime>,
}

fn port_out_times(ctx: &NetlistCtx, agg: NodeId) -> Vec<SchedTime> {
    ctx.aggregate(agg)
        .port_out
        .iter()
        .map(|p| ctx.zero_time(*p).unwrap_or_default())
        .collect()
}

/// Number of clock windows the members occupy, minus one.
fn span(ctx: &NetlistCtx, agg: NodeId) -> i64 {
    let windows: Vec<i64> = ctx
        .aggregate(agg)
        .sub_nodes
        .iter()
        .filter_map(|n| ctx.zero_time(*n))
        .map(|z| ctx.clk_index(z))
        .collect();
    match (windows.iter().min(), windows.iter().max()) {
        (Some(lo), Some(hi)) => hi - lo,
        _ => 0,
    }
}

/// Pull the members toward the outputs without moving the outputs. The
/// ASAP placement is kept if the body would need an input before it
/// arrives.
fn compact(
    ctx: &mut NetlistCtx,
    agg: NodeId,
    arrivals: &[SchedTime],
    bound: &[SchedTime],
) -> HlsResult<()> {
    let inner = ctx.nodes_recursive(Parent::Aggregate(agg));
    let asap = snapshot(ctx, &inner);
    reset_inner(ctx, agg);
    set_port_out(ctx, agg, bound);
    alap_scope(ctx, Parent::Aggregate(agg), &asap)?;
    let port_in = ctx.aggregate(agg).port_in.clone();
    let early = port_in.iter().zip(arrivals).any(|(p, t)| {
        ctx.out_time(OutPort::new(*p, 0)).is_none_or(|o| o < *t)
    });
    if early {
        restore(ctx, &asap, &inner, 0);
    }
    Ok(())
}

/// Schedule the body with no input before `floor` and no member before
/// `begin`. Returns `None` if an output is produced later than `bound`.
fn run_trial(
    ctx: &mut NetlistCtx,
    agg: NodeId,
    times: &[SchedTime],
    floor: SchedTime,
    begin: SchedTime,
    bound: Option<&[SchedTime]>,
) -> HlsResult<Option<Trial>> {
    reset_inner(ctx, agg);
    let arrivals: Vec<SchedTime> =
        times.iter().map(|t| (*t).max(floor)).collect();
    set_port_in(ctx, agg, &arrivals);
    asap_scope(ctx, Parent::Aggregate(agg), begin)?;
    let outputs = port_out_times(ctx, agg);
    if let Some(bound) = bound {
        if outputs.iter().zip(bound).any(|(o, b)| o > b) {
            return Ok(None);
        }
    }
    compact(ctx, agg, &arrivals, bound.unwrap_or(&outputs))?;
    let inner = ctx.nodes_recursive(Parent::Aggregate(agg));
    Ok(Some(Trial {
        snap: snapshot(ctx, &inner),
        span: span(ctx, agg),
        outputs,
    }))
}

pub(super) fn asap(
    ctx: &mut NetlistCtx,
    agg: NodeId,
    begin: SchedTime,
) -> HlsResult<()> {
    let clk = ctx.clk_period;
    let times = input_times(ctx, agg)?;
    let first = times
        .iter()
        .min()
        .map_or(begin, |t| ctx.start_of_clk(*t));
    let last = times.iter().max().map_or(begin, |t| ctx.start_of_clk(*t));

    let Some(mut best) = run_trial(ctx, agg, &times, first, begin, None)?
    else {
        unreachable!("an unbounded trial always succeeds")
    };
    let bound = best.outputs.clone();
    let mut floor = first + clk;
    while floor <= last {
        let trial = run_trial(
            ctx,
            agg,
            &times,
            floor,
            floor.max(begin),
            Some(&bound),
        )?;
        match trial {
            Some(t) if t.span < best.span => {
                ctx.tracer.log(|| {
                    format!("{agg} starting at {floor} spans {}", t.span)
                });
                best = t;
            }
            _ => break,
        }
        floor += clk;
    }

    let inner = ctx.nodes_recursive(Parent::Aggregate(agg));
    restore(ctx, &best.snap, &inner, 0);
    let zero = members_zero(ctx, agg).unwrap_or(begin);
    finish(ctx, agg, zero);
    Ok(())
}

/// Move the whole body by the largest number of clock periods its users
/// allow.
pub(super) fn alap(
    ctx: &mut NetlistCtx,
    agg: NodeId,
    snap: &Snapshot,
) -> HlsResult<()> {
    let clk = ctx.clk_period;
    let req = output_requirements(ctx, agg, snap)?;
    let asap = asap_of(ctx, snap, agg)?;
    let periods = req
        .iter()
        .zip(&asap.outputs)
        .map(|(r, o)| (r - o).div_euclid(clk))
        .min()
        .unwrap_or(0)
        .max(0);
    ctx.tracer.log(|| format!("{agg} moved by {periods} periods"));
    let nodes = subtree(ctx, agg);
    restore(ctx, snap, &nodes, periods * clk);
    Ok(())
}
