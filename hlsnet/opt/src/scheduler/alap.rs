//! As-late-as-possible compaction of an ASAP schedule.
use super::{Snapshot, asap::cycle_error, schedule_node_alap};
use hlsnet_ir::{NetlistCtx, NodeId, NodeSchedule, OutPort, Parent};
use hlsnet_utils::{Error, HlsResult, SchedTime};
use std::collections::HashSet;

/// Compact every node of `scope` which is not scheduled yet. Nodes are
/// scheduled after all of their users.
pub fn alap_scope(
    ctx: &mut NetlistCtx,
    scope: Parent,
    snap: &Snapshot,
) -> HlsResult<()> {
    let mut roots = ctx.scope_nodes(scope);
    roots.sort();
    let mut on_path: HashSet<NodeId> = HashSet::new();
    let mut path: Vec<NodeId> = Vec::new();
    for root in roots {
        let mut stack = vec![(root, false)];
        while let Some((n, expanded)) = stack.pop() {
            if expanded {
                on_path.remove(&n);
                path.pop();
                if ctx.node(n).sched.is_none() {
                    schedule_node_alap(ctx, n, snap)?;
                }
                continue;
            }
            if ctx.node(n).sched.is_some() {
                continue;
            }
            if on_path.contains(&n) {
                return Err(cycle_error(ctx, &path, n));
            }
            on_path.insert(n);
            path.push(n);
            stack.push((n, true));
            let mut deps = ctx.users_of(n);
            deps.sort();
            deps.dedup();
            for d in deps.into_iter().rev() {
                if ctx.node(d).sched.is_none() {
                    stack.push((d, false));
                }
            }
        }
    }
    Ok(())
}

/// ASAP schedule of a node recorded before the reset.
pub fn asap_of<'a>(
    ctx: &NetlistCtx,
    snap: &'a Snapshot,
    id: NodeId,
) -> HlsResult<&'a NodeSchedule> {
    snap.get(&id).ok_or_else(|| {
        Error::consistency("node has no ASAP schedule", vec![ctx.desc(id)])
    })
}

/// Latest time the value of `src` may be produced: the earliest time one
/// of its users consumes it. An unused value may be produced at the end of
/// the clock window of its ASAP time.
pub fn required_time(
    ctx: &NetlistCtx,
    src: OutPort,
    asap_out: SchedTime,
) -> HlsResult<SchedTime> {
    let mut req: Option<SchedTime> = None;
    for u in ctx.users(src) {
        let t = ctx.in_time(*u).ok_or_else(|| {
            Error::consistency(
                format!("user {u} of {src} is not scheduled"),
                ctx.descs([u.node, src.node]),
            )
        })?;
        req = Some(req.map_or(t, |r| r.min(t)));
    }
    Ok(req.unwrap_or_else(|| push_to_clk_end(ctx, asap_out)))
}

/// Last time in the clock window of `t` which still leaves the setup time
/// of a register, never earlier than `t` itself.
pub fn push_to_clk_end(ctx: &NetlistCtx, t: SchedTime) -> SchedTime {
    t.max(ctx.start_of_next_clk(t) - ctx.ff_store_time())
}

/// Schedule a node whose users are all scheduled.
///
/// The node is placed so that its earliest required output is produced
/// just in time. A node whose input delay would straddle a clock boundary
/// is moved to the end of the previous window.
pub fn alap_generic(
    ctx: &mut NetlistCtx,
    id: NodeId,
    snap: &Snapshot,
) -> HlsResult<()> {
    ctx.resolve_realization(id);
    let clk = ctx.clk_period;
    let ff = ctx.ff_store_time();
    let r = ctx
        .realization(id)
        .cloned()
        .unwrap_or_else(|| unreachable!("realization was just resolved"));

    let zero = if ctx.node(id).const_value().is_some() {
        // Constants have no inputs, they follow their earliest use.
        let mut first_use: Option<SchedTime> = None;
        for src in ctx.outputs_of(id) {
            if !ctx.users(src).is_empty() {
                let o = src.idx as usize;
                let t = required_time(ctx, src, 0)?
                    - r.out_delay[o]
                    - r.out_cycles[o] * clk;
                first_use = Some(first_use.map_or(t, |f| f.min(t)));
            }
        }
        first_use.unwrap_or(0)
    } else {
        let asap = asap_of(ctx, snap, id)?;
        let mut zero: Option<SchedTime> = None;
        for src in ctx.outputs_of(id) {
            let o = src.idx as usize;
            let req = required_time(ctx, src, asap.outputs[o])?;
            let z = req - r.out_delay[o] - r.out_cycles[o] * clk;
            zero = Some(zero.map_or(z, |cur| cur.min(z)));
        }
        let mut zero =
            zero.unwrap_or_else(|| push_to_clk_end(ctx, asap.zero));
        let start = ctx.start_of_clk(zero);
        let straddles = (0..r.in_delay.len()).any(|i| {
            r.in_cycles[i] == 0 && r.in_delay[i] > 0
                && zero - r.in_delay[i] < start
        });
        if straddles {
            zero = start - ff;
        }
        zero
    };

    let sched = NodeSchedule {
        zero,
        inputs: (0..r.in_delay.len())
            .map(|i| zero - r.in_delay[i] - r.in_cycles[i] * clk)
            .collect(),
        outputs: (0..r.out_delay.len())
            .map(|o| zero + r.out_delay[o] + r.out_cycles[o] * clk)
            .collect(),
    };
    ctx.tracer.log(|| {
        format!("alap {id} zero={zero} out={:?}", sched.outputs)
    });
    ctx.node_mut(id).sched = Some(sched);
    Ok(())
}
