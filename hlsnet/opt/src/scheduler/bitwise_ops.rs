//! Retiming of a cluster of bitwise operators.
//!
//! A tree of bitwise operators inside of one clock window is synthesized
//! as a single LUT tree, so the delay of an operator depends on the number
//! of leaves of its tree rather than on its own operand count. The delay of
//! every member is re-derived from its leaves and kept in its schedule,
//! the realization of the member stays as it was. Registered members are
//! scheduled from their realization and start new trees.
use super::aggregate::{
    finish, input_times, members_zero, output_requirements, reset_inner,
    set_port_in, set_port_out,
};
use super::{Snapshot, alap::asap_of, alap_generic, asap_generic};
use hlsnet_ir::{NetlistCtx, NodeId, NodeSchedule, OutPort, Parent, ScopeGraph};
use hlsnet_utils::{Error, HlsResult, SchedTime};
use std::collections::{BTreeSet, HashMap};

/// Leaves of the LUT tree ending in a member.
type Leaves = BTreeSet<OutPort>;

/// Combinational bitwise operator.
fn retimable(ctx: &NetlistCtx, id: NodeId) -> bool {
    let node = ctx.node(id);
    node.op().is_some_and(|op| op.is_bitwise())
        && node
            .realization
            .as_ref()
            .is_none_or(|r| r.out_cycles.iter().all(|c| *c == 0))
}

pub(super) fn asap(
    ctx: &mut NetlistCtx,
    agg: NodeId,
    begin: SchedTime,
) -> HlsResult<()> {
    let times = input_times(ctx, agg)?;
    reset_inner(ctx, agg);
    set_port_in(ctx, agg, &times);
    let order =
        ScopeGraph::from_scope(ctx, Parent::Aggregate(agg)).toposort(ctx)?;
    let mut leaves: HashMap<NodeId, Leaves> = HashMap::new();
    for n in order {
        if ctx.node(n).sched.is_some() {
            continue;
        }
        if retimable(ctx, n) {
            let l = retime(ctx, n, &leaves)?;
            leaves.insert(n, l);
        } else {
            asap_generic(ctx, n, begin)?;
        }
    }
    let zero = members_zero(ctx, agg).unwrap_or(begin);
    finish(ctx, agg, zero);
    Ok(())
}

fn avail(ctx: &NetlistCtx, src: OutPort) -> SchedTime {
    ctx.out_time(src).unwrap_or_default()
}

/// Schedule one operator from the leaves of its LUT tree.
fn retime(
    ctx: &mut NetlistCtx,
    id: NodeId,
    leaves: &HashMap<NodeId, Leaves>,
) -> HlsResult<Leaves> {
    let clk = ctx.clk_period;
    let ff = ctx.ff_store_time();
    let Some(op) = ctx.node(id).op() else {
        unreachable!("only operators are retimed")
    };
    let width = ctx.data_width(id);
    let mut direct: Vec<OutPort> = Vec::new();
    for dst in ctx.inputs_of(id) {
        let src = ctx.driver(dst).ok_or_else(|| {
            Error::consistency(
                format!("input {dst} is not driven"),
                vec![ctx.desc(id)],
            )
        })?;
        direct.push(src);
    }
    let t_in = direct.iter().map(|s| avail(ctx, *s)).max().unwrap_or(0);
    let window = ctx.clk_index(t_in);

    let mut tree = Leaves::new();
    for src in &direct {
        match leaves.get(&src.node) {
            Some(l) if ctx.clk_index(avail(ctx, *src)) == window => {
                tree.extend(l.iter().copied())
            }
            _ => {
                tree.insert(*src);
            }
        }
    }
    let leaf_t = tree.iter().map(|s| avail(ctx, *s)).max().unwrap_or(t_in);
    let mut delay = ctx.platform.op_timing(op, width, tree.len(), clk).delay;
    let mut zero = t_in;
    let mut out = leaf_t + delay;
    if out > ctx.start_of_next_clk(leaf_t) - ff {
        // The tree does not fit, start a new one in the next window.
        tree = direct.iter().copied().collect();
        delay = ctx.platform.op_timing(op, width, tree.len(), clk).delay;
        zero = t_in.max(ctx.start_of_next_clk(leaf_t));
        out = zero + delay;
    }
    if delay >= clk {
        return Err(Error::timing(ctx.desc(id), "LUT tree", delay, clk));
    }

    let ins = direct.len();
    ctx.node_mut(id).sched = Some(NodeSchedule {
        zero,
        inputs: vec![t_in; ins],
        outputs: vec![out],
    });
    ctx.tracer.log(|| {
        format!("retime {id}: {} leaves, out={out}", tree.len())
    });
    Ok(tree)
}

/// Move every operator toward the end of its clock window, never past its
/// users.
pub(super) fn alap(
    ctx: &mut NetlistCtx,
    agg: NodeId,
    snap: &Snapshot,
) -> HlsResult<()> {
    let req = output_requirements(ctx, agg, snap)?;
    reset_inner(ctx, agg);
    set_port_out(ctx, agg, &req);
    let order =
        ScopeGraph::from_scope(ctx, Parent::Aggregate(agg)).toposort(ctx)?;
    let ff = ctx.ff_store_time();
    for n in order.into_iter().rev() {
        if ctx.node(n).sched.is_some() {
            continue;
        }
        if !retimable(ctx, n) {
            alap_generic(ctx, n, snap)?;
            continue;
        }
        let asap = asap_of(ctx, snap, n)?.clone();
        let asap_out = asap.outputs[0];
        let window_slack =
            (ctx.start_of_next_clk(asap_out) - ff - asap_out).max(0);
        let mut slack = window_slack;
        for u in ctx.users(OutPort::new(n, 0)) {
            let t = ctx.in_time(*u).ok_or_else(|| {
                Error::consistency(
                    format!("user {u} is not scheduled"),
                    ctx.descs([n, u.node]),
                )
            })?;
            slack = slack.min(t - asap_out);
        }
        let mut s = asap;
        s.shift(slack);
        ctx.tracer.log(|| format!("alap {n}: shifted by {slack}"));
        ctx.node_mut(n).sched = Some(s);
    }
    let zero = members_zero(ctx, agg).unwrap_or(0);
    finish(ctx, agg, zero);
    Ok(())
}
