use crate::traversal::{Named, Pass};
use hlsnet_ir::{
    Builder, HlsType, InPort, NetlistCtx, NodeId, NodeKind, NodeSchedule,
    OpKind, OutPort, Parent, Realization,
};
use hlsnet_utils::{HlsResult, SchedTime, math::mask};
use std::collections::{HashMap, HashSet};

/// Simplifies the logic of the netlist until nothing changes.
///
/// The following rewrites are applied:
/// 1. operators with constant operands are folded,
/// 2. identities of the bitwise operators (`x & 1 = x`, `x | 1 = 1`,
///    `x ^ x = 0`, `!!x = x`, ...) and of the mux,
/// 3. structurally equal operators of one clock window are merged,
///    constants of one scope are shared,
/// 4. constant and unused aggregate inputs are removed, aggregate outputs
///    forwarding an input are bypassed and unused outputs removed,
/// 5. nodes without users and side effects are removed.
#[derive(Default)]
pub struct ValuePropagation;

impl Named for ValuePropagation {
    fn name() -> &'static str {
        "value-propagation"
    }

    fn description() -> &'static str {
        "fold constants, share equal expressions and remove dead logic"
    }
}

impl Pass for ValuePropagation {
    fn run(&mut self, ctx: &mut NetlistCtx) -> HlsResult<()> {
        simplify(ctx)
    }
}

/// Run all simplifications to a fixpoint and drop the removed nodes.
pub fn simplify(ctx: &mut NetlistCtx) -> HlsResult<()> {
    let mut rounds = 0;
    loop {
        let mut changed = false;
        for id in live_nodes(ctx) {
            if !ctx.is_removed(id) && simplify_op(ctx, id) {
                changed = true;
            }
        }
        changed |= rehash(ctx);
        changed |= simplify_boundaries(ctx);
        changed |= remove_dead(ctx);
        if !changed {
            break;
        }
        rounds += 1;
    }
    ctx.filter_removed();
    log::debug!("{}: simplified in {rounds} rounds", ctx.name);
    Ok(())
}

/// The output producing the value of `src`, looking through aggregate
/// boundaries.
pub fn trace_source(ctx: &NetlistCtx, src: OutPort) -> OutPort {
    let mut cur = src;
    loop {
        let next = match ctx.node(cur.node).kind {
            NodeKind::PortIn => ctx
                .proxy_input_port(cur.node)
                .and_then(|port| ctx.driver(port)),
            NodeKind::Aggregate(_) => {
                ctx.driver(InPort::new(ctx.output_proxy(cur), 0))
            }
            _ => None,
        };
        match next {
            Some(n) => cur = n,
            None => return cur,
        }
    }
}

/// Add a constant to `parent`, produced at `time` if given.
pub(crate) fn add_const(
    ctx: &mut NetlistCtx,
    parent: Parent,
    value: u64,
    ty: HlsType,
    time: Option<SchedTime>,
) -> OutPort {
    let src = Builder::new(ctx)
        .in_scope(parent)
        .add_const(value & mask(ty.width()), ty);
    let node = ctx.node_mut(src.node);
    node.realization = Some(Realization::zero(0, 1));
    node.sched = time.map(|t| NodeSchedule::flat(t, 0, 1));
    src
}

fn live_nodes(ctx: &NetlistCtx) -> Vec<NodeId> {
    let mut nodes = ctx.all_nodes_recursive();
    nodes.sort();
    nodes
}

fn const_of(ctx: &NetlistCtx, src: OutPort) -> Option<u64> {
    ctx.node(src.node).const_value()
}

/// Redirect the users of `out` to a new constant.
fn replace_with_const(ctx: &mut NetlistCtx, out: OutPort, value: u64) {
    let parent = ctx.parent(out.node);
    let ty = ctx.out_ty(out);
    let time = ctx.out_time(out);
    let c = add_const(ctx, parent, value, ty, time);
    ctx.tracer.log(|| format!("{out} replaced by constant {value}"));
    ctx.replace_all_uses(out, c);
}

fn replace_with(ctx: &mut NetlistCtx, out: OutPort, src: OutPort) {
    ctx.tracer.log(|| format!("{out} replaced by {src}"));
    ctx.replace_all_uses(out, src);
}

fn eval(op: OpKind, vals: &[u64], widths: &[u32]) -> u64 {
    let arg = |i: usize| vals[i] & mask(widths[i]);
    match op {
        OpKind::And => vals.iter().fold(u64::MAX, |a, v| a & v),
        OpKind::Or => vals.iter().fold(0, |a, v| a | v),
        OpKind::Xor => vals.iter().fold(0, |a, v| a ^ v),
        OpKind::Not => !vals[0],
        OpKind::Add => vals.iter().fold(0, |a, v| a.wrapping_add(*v)),
        OpKind::Sub => {
            vals[1..].iter().fold(vals[0], |a, v| a.wrapping_sub(*v))
        }
        OpKind::Mul => vals.iter().fold(1, |a, v| a.wrapping_mul(*v)),
        OpKind::Eq => u64::from(arg(0) == arg(1)),
        OpKind::Ne => u64::from(arg(0) != arg(1)),
        OpKind::Ult => u64::from(arg(0) < arg(1)),
        OpKind::Ule => u64::from(arg(0) <= arg(1)),
        OpKind::Mux => {
            let last = vals[vals.len() - 1];
            vals.chunks_exact(2)
                .find(|pair| pair[1] != 0)
                .map_or(last, |pair| pair[0])
        }
        OpKind::Concat => {
            let mut acc = 0;
            let mut shift = 0;
            for (v, w) in vals.iter().zip(widths) {
                if shift < 64 {
                    acc |= (v & mask(*w)) << shift;
                }
                shift += w;
            }
            acc
        }
    }
}

/// Apply the per operator rewrites. Returns true if the netlist changed.
fn simplify_op(ctx: &mut NetlistCtx, id: NodeId) -> bool {
    let Some(op) = ctx.node(id).op() else {
        return false;
    };
    if ctx.node(id).outputs.len() != 1 || !ctx.has_users(id) {
        return false;
    }
    let out = OutPort::new(id, 0);
    let m = mask(ctx.out_ty(out).width());
    let Some(srcs) = ctx
        .inputs_of(id)
        .map(|i| ctx.driver(i))
        .collect::<Option<Vec<OutPort>>>()
    else {
        return false;
    };
    if srcs.is_empty() || (op.is_comparison() && srcs.len() != 2) {
        return false;
    }

    let consts: Option<Vec<u64>> =
        srcs.iter().map(|s| const_of(ctx, *s)).collect();
    if let Some(vals) = consts {
        let widths: Vec<u32> =
            srcs.iter().map(|s| ctx.out_ty(*s).width()).collect();
        replace_with_const(ctx, out, eval(op, &vals, &widths) & m);
        return true;
    }

    match op {
        OpKind::And => simplify_and_or(ctx, id, &srcs, 0, m),
        OpKind::Or => simplify_and_or(ctx, id, &srcs, m, 0),
        OpKind::Xor => simplify_xor(ctx, id, &srcs, m),
        OpKind::Not => {
            let inner = srcs[0].node;
            if ctx.node(inner).op() != Some(OpKind::Not) {
                return false;
            }
            match ctx.driver(InPort::new(inner, 0)) {
                Some(x) => {
                    replace_with(ctx, out, x);
                    true
                }
                None => false,
            }
        }
        OpKind::Mux => {
            if srcs.len() == 1 {
                replace_with(ctx, out, srcs[0]);
                return true;
            }
            match const_of(ctx, srcs[1]) {
                Some(0) => {
                    ctx.remove_input(InPort::new(id, 1));
                    ctx.remove_input(InPort::new(id, 0));
                    true
                }
                Some(_) => {
                    replace_with(ctx, out, srcs[0]);
                    true
                }
                None => false,
            }
        }
        _ => false,
    }
}

/// Remove the inputs listed in `drop` and forward a single remaining
/// operand.
fn drop_operands(ctx: &mut NetlistCtx, id: NodeId, drop: &[usize]) {
    for i in drop.iter().rev() {
        ctx.remove_input(InPort::new(id, *i as u32));
    }
    if ctx.node(id).inputs.len() == 1 {
        if let Some(x) = ctx.driver(InPort::new(id, 0)) {
            replace_with(ctx, OutPort::new(id, 0), x);
        }
    }
}

fn simplify_and_or(
    ctx: &mut NetlistCtx,
    id: NodeId,
    srcs: &[OutPort],
    absorbing: u64,
    neutral: u64,
) -> bool {
    let out = OutPort::new(id, 0);
    let m = mask(ctx.out_ty(out).width());
    let masked =
        |ctx: &NetlistCtx, s: OutPort| const_of(ctx, s).map(|v| v & m);
    if srcs.iter().any(|s| masked(ctx, *s) == Some(absorbing)) {
        replace_with_const(ctx, out, absorbing);
        return true;
    }
    let mut seen = HashSet::new();
    let drop: Vec<usize> = srcs
        .iter()
        .enumerate()
        .filter(|(_, s)| {
            masked(ctx, **s) == Some(neutral) || !seen.insert(**s)
        })
        .map(|(i, _)| i)
        .collect();
    if drop.len() == srcs.len() {
        replace_with_const(ctx, out, neutral);
        return true;
    }
    if drop.is_empty() && srcs.len() > 1 {
        return false;
    }
    drop_operands(ctx, id, &drop);
    true
}

fn simplify_xor(
    ctx: &mut NetlistCtx,
    id: NodeId,
    srcs: &[OutPort],
    m: u64,
) -> bool {
    let mut positions: HashMap<OutPort, Vec<usize>> = HashMap::new();
    for (i, s) in srcs.iter().enumerate() {
        positions.entry(*s).or_default().push(i);
    }
    let mut drop = Vec::new();
    for (s, pos) in &positions {
        if const_of(ctx, *s).map(|v| v & m) == Some(0) || pos.len() % 2 == 0 {
            drop.extend(pos.iter().copied());
        } else {
            drop.extend(pos[1..].iter().copied());
        }
    }
    drop.sort();
    if drop.len() == srcs.len() {
        replace_with_const(ctx, OutPort::new(id, 0), 0);
        return true;
    }
    if drop.is_empty() && srcs.len() > 1 {
        return false;
    }
    drop_operands(ctx, id, &drop);
    true
}

/// Operand of a hashed expression. Constants compare by value, so that
/// equal expressions using different constant nodes are merged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum Operand {
    Port(OutPort),
    Const(u64, HlsType),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct ExprKey {
    op: OpKind,
    operands: Vec<Operand>,
    ty: HlsType,
    parent: Parent,
    window: Option<i64>,
}

fn expr_key(ctx: &NetlistCtx, id: NodeId) -> Option<ExprKey> {
    let op = ctx.node(id).op()?;
    if ctx.node(id).outputs.len() != 1 {
        return None;
    }
    let mut operands = ctx
        .inputs_of(id)
        .map(|i| {
            let src = ctx.driver(i)?;
            Some(match const_of(ctx, src) {
                Some(v) => Operand::Const(v, ctx.out_ty(src)),
                None => Operand::Port(src),
            })
        })
        .collect::<Option<Vec<_>>>()?;
    if op.is_commutative() {
        operands.sort();
    }
    Some(ExprKey {
        op,
        operands,
        ty: ctx.out_ty(OutPort::new(id, 0)),
        parent: ctx.parent(id),
        window: ctx.zero_time(id).map(|z| ctx.clk_index(z)),
    })
}

/// Merge equal constants and structurally equal operators.
fn rehash(ctx: &mut NetlistCtx) -> bool {
    let mut changed = false;
    let mut consts: HashMap<(Parent, u64, HlsType, SchedTime, i64), NodeId> =
        HashMap::new();
    let mut exprs: HashMap<ExprKey, NodeId> = HashMap::new();
    for id in live_nodes(ctx) {
        if ctx.is_removed(id) {
            continue;
        }
        if let Some(v) = ctx.node(id).const_value() {
            if ctx.node(id).outputs.len() != 1 {
                continue;
            }
            let (delay, cycles) = ctx
                .realization(id)
                .map_or((0, 0), |r| (r.out_delay[0], r.out_cycles[0]));
            let ty = ctx.out_ty(OutPort::new(id, 0));
            let key = (ctx.parent(id), v, ty, delay, cycles);
            let Some(&keep) = consts.get(&key) else {
                consts.insert(key, id);
                continue;
            };
            // The shared constant is produced for its earliest user.
            let (a, b) = (ctx.zero_time(keep), ctx.zero_time(id));
            if let (Some(a), Some(b)) = (a, b) {
                if b < a {
                    let s = ctx.node(id).sched.clone();
                    ctx.node_mut(keep).sched = s;
                }
            }
            replace_with(ctx, OutPort::new(id, 0), OutPort::new(keep, 0));
            ctx.remove_node(id);
            changed = true;
            continue;
        }
        let Some(key) = expr_key(ctx, id) else {
            continue;
        };
        let Some(&other) = exprs.get(&key) else {
            exprs.insert(key, id);
            continue;
        };
        let rank = |n: NodeId| (ctx.out_time(OutPort::new(n, 0)), n);
        let (keep, drop) = if rank(id) < rank(other) {
            (id, other)
        } else {
            (other, id)
        };
        exprs.insert(key, keep);
        replace_with(ctx, OutPort::new(drop, 0), OutPort::new(keep, 0));
        ctx.remove_node(drop);
        changed = true;
    }
    changed
}

/// Simplify the boundary ports of every aggregate.
fn simplify_boundaries(ctx: &mut NetlistCtx) -> bool {
    let mut changed = false;
    let aggs: Vec<NodeId> = live_nodes(ctx)
        .into_iter()
        .filter(|n| ctx.node(*n).aggregate().is_some())
        .collect();
    for agg in aggs {
        if ctx.is_removed(agg) {
            continue;
        }
        let parent = Parent::Aggregate(agg);

        // Inputs fed by an output of the same aggregate. Users in the
        // clock window of the producer read it directly.
        for i in 0..ctx.node(agg).inputs.len() as u32 {
            let port = InPort::new(agg, i);
            let Some(outer) = ctx.driver(port).filter(|s| s.node == agg)
            else {
                continue;
            };
            let out_proxy = ctx.output_proxy(outer);
            let Some(src) = ctx.driver(InPort::new(out_proxy, 0)) else {
                continue;
            };
            let proxy = OutPort::new(ctx.input_proxy(port), 0);
            let window = |t: Option<SchedTime>| t.map(|t| ctx.clk_index(t));
            let produced = window(ctx.out_time(src));
            let local: Vec<InPort> = ctx
                .users(proxy)
                .iter()
                .copied()
                .filter(|u| window(ctx.in_time(*u)) == produced)
                .collect();
            for u in local {
                ctx.tracer.log(|| format!("{u}: {outer} -> {i} bypassed"));
                ctx.reconnect(u, src);
                changed = true;
            }
        }

        // Constant and unused inputs.
        for i in (0..ctx.node(agg).inputs.len() as u32).rev() {
            let port = InPort::new(agg, i);
            let proxy = OutPort::new(ctx.input_proxy(port), 0);
            if !ctx.users(proxy).is_empty() {
                let Some(src) = ctx.driver(port) else {
                    continue;
                };
                let Some(v) = const_of(ctx, src) else {
                    continue;
                };
                let (ty, t) = (ctx.out_ty(src), ctx.out_time(proxy));
                let c = add_const(ctx, parent, v, ty, t);
                replace_with(ctx, proxy, c);
            }
            ctx.tracer.log(|| format!("{agg}: input {i} removed"));
            ctx.remove_input(port);
            changed = true;
        }

        // Outputs forwarding an input.
        for o in 0..ctx.node(agg).outputs.len() as u32 {
            let port = OutPort::new(agg, o);
            if ctx.users(port).is_empty() {
                continue;
            }
            let proxy = ctx.output_proxy(port);
            let Some(src) = ctx.driver(InPort::new(proxy, 0)) else {
                continue;
            };
            let outer = ctx
                .proxy_input_port(src.node)
                .filter(|_| ctx.node(src.node).kind == NodeKind::PortIn)
                .and_then(|p| ctx.driver(p));
            if let Some(ext) = outer {
                replace_with(ctx, port, ext);
                changed = true;
            }
        }

        // Unused outputs.
        for o in (0..ctx.node(agg).outputs.len() as u32).rev() {
            let port = OutPort::new(agg, o);
            if !ctx.users(port).is_empty() {
                continue;
            }
            ctx.tracer.log(|| format!("{agg}: output {o} removed"));
            ctx.remove_output(port);
            changed = true;
        }

        let empty = ctx
            .aggregate(agg)
            .sub_nodes
            .iter()
            .all(|n| ctx.is_removed(*n));
        if empty && ctx.node(agg).outputs.is_empty() {
            ctx.tracer.log(|| format!("{agg}: empty aggregate removed"));
            ctx.remove_node(agg);
            changed = true;
        }
    }
    changed
}

fn is_dead(ctx: &NetlistCtx, id: NodeId) -> bool {
    let node = ctx.node(id);
    !node.has_side_effect()
        && !matches!(
            node.kind,
            NodeKind::PortIn | NodeKind::PortOut | NodeKind::Aggregate(_)
        )
        && !ctx.has_users(id)
}

fn remove_dead(ctx: &mut NetlistCtx) -> bool {
    let mut changed = false;
    loop {
        let dead: Vec<NodeId> = live_nodes(ctx)
            .into_iter()
            .filter(|n| is_dead(ctx, *n))
            .collect();
        if dead.is_empty() {
            return changed;
        }
        for id in dead {
            ctx.tracer.log(|| format!("{id} removed"));
            ctx.remove_node(id);
        }
        changed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ClusterSearch;
    use hlsnet_ir::{AggregateKind, IoOptions, Printer};

    #[test]
    fn constants_are_folded() {
        let mut ctx = NetlistCtx::new("t", 1000);
        let mut b = Builder::new(&mut ctx);
        let c3 = b.add_const(3, HlsType::Bits(8));
        let c4 = b.add_const(254, HlsType::Bits(8));
        let s = b.add_op(OpKind::Add, HlsType::Bits(8), &[c3, c4]);
        let w = b.add_write("o", Some(s), IoOptions::default());
        simplify(&mut ctx).unwrap();
        let src = ctx.driver(InPort::new(w.node, 0)).unwrap();
        assert_eq!(ctx.node(src.node).const_value(), Some(1));
        assert_eq!(ctx.top.len(), 2);
    }

    #[test]
    fn bitwise_identities() {
        let mut ctx = NetlistCtx::new("t", 1000);
        let mut b = Builder::new(&mut ctx);
        let r = b.add_read("a", HlsType::BIT, IoOptions::default());
        let x = r.data.unwrap();
        let one = b.add_const(1, HlsType::BIT);
        let and = b.add_op(OpKind::And, HlsType::BIT, &[x, one, x]);
        let not = b.add_op(OpKind::Not, HlsType::BIT, &[and]);
        let not2 = b.add_op(OpKind::Not, HlsType::BIT, &[not]);
        let xor =
            b.add_op(OpKind::Xor, HlsType::BIT, &[not2, r.valid, r.valid]);
        let w = b.add_write("o", Some(xor), IoOptions::default());
        simplify(&mut ctx).unwrap();
        assert_eq!(ctx.driver(InPort::new(w.node, 0)), Some(x));
        assert_eq!(ctx.top, vec![r.node, w.node]);
    }

    #[test]
    fn commutative_expressions_are_shared() {
        let mut ctx = NetlistCtx::new("t", 1000);
        let mut b = Builder::new(&mut ctx);
        let r = b.add_read("a", HlsType::Bits(8), IoOptions::default());
        let d = r.data.unwrap();
        let c1 = b.add_const(1, HlsType::Bits(8));
        let c2 = b.add_const(1, HlsType::Bits(8));
        let x = b.add_op(OpKind::Add, HlsType::Bits(8), &[d, c1]);
        let y = b.add_op(OpKind::Add, HlsType::Bits(8), &[c2, d]);
        let w1 = b.add_write("o", Some(x), IoOptions::default());
        let w2 = b.add_write("p", Some(y), IoOptions::default());
        simplify(&mut ctx).unwrap();
        let s1 = ctx.driver(InPort::new(w1.node, 0));
        let s2 = ctx.driver(InPort::new(w2.node, 0));
        assert_eq!(s1, Some(x));
        assert_eq!(s1, s2);
        assert!(ctx.is_removed(y.node));
        assert!(ctx.is_removed(c2.node));
    }

    #[test]
    fn second_run_changes_nothing() {
        let mut ctx = NetlistCtx::new("t", 1000);
        let mut b = Builder::new(&mut ctx);
        let r = b.add_read("a", HlsType::Bits(8), IoOptions::default());
        let d = r.data.unwrap();
        let zero = b.add_const(0, HlsType::Bits(8));
        let o = b.add_op(OpKind::Or, HlsType::Bits(8), &[d, zero]);
        let e = b.add_op(OpKind::Eq, HlsType::BIT, &[o, d]);
        let m = b.add_op(OpKind::Mux, HlsType::Bits(8), &[d, e, zero]);
        b.add_write("o", Some(m), IoOptions::default());
        simplify(&mut ctx).unwrap();
        let once = Printer::netlist_to_string(&ctx);
        simplify(&mut ctx).unwrap();
        assert_eq!(once, Printer::netlist_to_string(&ctx));
    }

    /// `p` reaches `q` only through `p | 0` outside of the aggregate.
    fn feedback_through_or(
        ctx: &mut NetlistCtx,
    ) -> (NodeId, NodeId, NodeId, NodeId) {
        let mut b = Builder::new(ctx);
        let r = b.add_read("a", HlsType::Bits(8), IoOptions::default());
        let p = b.add_op(OpKind::Not, HlsType::Bits(8), &[r.data.unwrap()]);
        let zero = b.add_const(0, HlsType::Bits(8));
        let e = b.add_op(OpKind::Or, HlsType::Bits(8), &[p, zero]);
        let q = b.add_op(OpKind::Add, HlsType::Bits(8), &[e]);
        b.add_write("o", Some(q), IoOptions::default());
        let agg = ClusterSearch::discover_from_node_list(ctx, &[p.node, q.node])
            .substitute_with_node(ctx, AggregateKind::Generic, None)
            .unwrap();
        assert_eq!(ctx.node(agg).inputs.len(), 2);
        assert_eq!(ctx.node(agg).outputs.len(), 2);
        (agg, p.node, q.node, e.node)
    }

    #[test]
    fn same_window_port_pair_is_removed() {
        let mut ctx = NetlistCtx::new("t", 1000);
        let (agg, p, q, e) = feedback_through_or(&mut ctx);
        simplify(&mut ctx).unwrap();
        assert!(ctx.is_removed(e));
        assert_eq!(ctx.driver(InPort::new(q, 0)), Some(OutPort::new(p, 0)));
        assert_eq!(ctx.node(agg).inputs.len(), 1);
        assert_eq!(ctx.node(agg).outputs.len(), 1);
    }

    #[test]
    fn port_pair_across_clock_windows_is_kept() {
        let mut ctx = NetlistCtx::new("t", 1000);
        let (agg, p, q, e) = feedback_through_or(&mut ctx);
        for n in [p, q] {
            let (ins, outs) =
                (ctx.node(n).inputs.len(), ctx.node(n).outputs.len());
            let zero = if n == p { 100 } else { 1100 };
            ctx.node_mut(n).sched = Some(NodeSchedule::flat(zero, ins, outs));
        }
        simplify(&mut ctx).unwrap();
        assert!(ctx.is_removed(e));
        let src = ctx.driver(InPort::new(q, 0)).unwrap();
        assert_eq!(ctx.node(src.node).kind, NodeKind::PortIn);
        assert_eq!(ctx.node(agg).inputs.len(), 2);
        assert_eq!(ctx.node(agg).outputs.len(), 2);
    }
}
