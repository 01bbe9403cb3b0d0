//! As-soon-as-possible scheduling.
use super::schedule_node_asap;
use hlsnet_ir::{NetlistCtx, NodeId, NodeSchedule, Parent};
use hlsnet_utils::{Error, HlsResult, SchedTime};
use std::collections::HashSet;

/// Schedule every node of `scope` which is not scheduled yet. No node is
/// scheduled before `begin`.
pub fn asap_scope(
    ctx: &mut NetlistCtx,
    scope: Parent,
    begin: SchedTime,
) -> HlsResult<()> {
    let mut roots = ctx.scope_nodes(scope);
    roots.sort();
    asap_walk(ctx, &roots, begin)
}

/// Depth first walk over the drivers of `roots`. Every node is scheduled
/// after all of its drivers.
pub fn asap_walk(
    ctx: &mut NetlistCtx,
    roots: &[NodeId],
    begin: SchedTime,
) -> HlsResult<()> {
    let mut on_path: HashSet<NodeId> = HashSet::new();
    let mut path: Vec<NodeId> = Vec::new();
    for root in roots {
        let mut stack = vec![(*root, false)];
        while let Some((n, expanded)) = stack.pop() {
            if expanded {
                on_path.remove(&n);
                path.pop();
                if ctx.node(n).sched.is_none() {
                    schedule_node_asap(ctx, n, begin)?;
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
            let mut deps = ctx.drivers_of(n);
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

pub(super) fn cycle_error(
    ctx: &NetlistCtx,
    path: &[NodeId],
    revisited: NodeId,
) -> Error {
    let start = path.iter().position(|n| *n == revisited).unwrap_or(0);
    let mut cycle: Vec<NodeId> = path[start..].to_vec();
    cycle.push(revisited);
    Error::cycle(ctx.descs(cycle))
}

/// Schedule a node whose drivers are all scheduled.
///
/// Each input arrives at the time its driver produces the value. If the
/// combinational delay of an input does not fit into the rest of the clock
/// window of the value the input waits for the next window.
pub fn asap_generic(
    ctx: &mut NetlistCtx,
    id: NodeId,
    begin: SchedTime,
) -> HlsResult<()> {
    ctx.resolve_realization(id);
    let clk = ctx.clk_period;
    let ff = ctx.ff_store_time();
    let r = ctx
        .realization(id)
        .cloned()
        .unwrap_or_else(|| unreachable!("realization was just resolved"));

    for (o, delay) in r.out_delay.iter().enumerate() {
        if *delay >= clk {
            return Err(Error::timing(
                ctx.desc(id),
                format!("output {o}"),
                *delay,
                clk,
            ));
        }
    }

    let mut zero = begin;
    for dst in ctx.inputs_of(id) {
        let i = dst.idx as usize;
        let src = ctx.driver(dst).ok_or_else(|| {
            Error::consistency(
                format!("input {dst} is not driven"),
                vec![ctx.desc(id)],
            )
        })?;
        let mut avail = ctx.out_time(src).ok_or_else(|| {
            Error::consistency(
                format!("driver {src} of {dst} is not scheduled"),
                ctx.descs([src.node, id]),
            )
        })?;
        let delay = r.in_delay[i];
        if delay >= clk {
            return Err(Error::timing(
                ctx.desc(id),
                format!("input {i}"),
                delay,
                clk,
            ));
        }
        let next = ctx.start_of_next_clk(avail);
        if delay > 0 && avail + delay + ff > next {
            avail = next;
        }
        zero = zero.max(avail + delay + r.in_cycles[i] * clk);
    }

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
        format!("asap {id} zero={zero} out={:?}", sched.outputs)
    });
    ctx.node_mut(id).sched = Some(sched);
    Ok(())
}
