use crate::analysis::substitute_parts;
use crate::traversal::{Named, Pass};
use hlsnet_ir::{
    AggregateKind, InPort, NetlistCtx, NodeId, NodeKind, OutPort, Parent,
};
use hlsnet_utils::HlsResult;
use std::collections::{BTreeSet, HashSet};

/// Substitutes the body of every loop with an [AggregateKind::Loop]
/// aggregate.
///
/// The loop is identified by its status node. The reads of the backedge
/// channels controlling its re-entry and exit start the body, the writes
/// of the same channels and the status node end it. The body is everything
/// on a path from a start to an end.
#[derive(Default)]
pub struct AggregateLoops;

impl Named for AggregateLoops {
    fn name() -> &'static str {
        "aggregate-loops"
    }

    fn description() -> &'static str {
        "cluster the bodies of loops"
    }
}

/// The ancestor of `id` owned by the netlist.
fn top_ancestor(ctx: &NetlistCtx, id: NodeId) -> NodeId {
    let mut cur = id;
    while let Parent::Aggregate(agg) = ctx.parent(cur) {
        cur = agg;
    }
    cur
}

/// Channel reads which drive `input` combinationally. Aggregate boundaries
/// are crossed in both directions.
fn loop_control_reads(ctx: &NetlistCtx, input: InPort) -> Vec<NodeId> {
    let mut out = BTreeSet::new();
    let mut seen = HashSet::new();
    let mut stack: Vec<OutPort> = ctx.driver(input).into_iter().collect();
    while let Some(src) = stack.pop() {
        if !seen.insert(src) {
            continue;
        }
        let node = ctx.node(src.node);
        match &node.kind {
            NodeKind::Read(io) => {
                if io.channel.is_some() {
                    out.insert(src.node);
                }
            }
            NodeKind::PortIn => stack.extend(
                ctx.proxy_input_port(src.node)
                    .and_then(|p| ctx.driver(p)),
            ),
            NodeKind::Aggregate(_) => stack.extend(
                ctx.driver(InPort::new(ctx.output_proxy(src), 0)),
            ),
            _ if node.is_explicit_sync() => (),
            _ => stack.extend(
                ctx.inputs_of(src.node).filter_map(|i| ctx.driver(i)),
            ),
        }
    }
    out.into_iter().collect()
}

/// Top level nodes reachable from `from` over `next`.
fn reach<F>(ctx: &NetlistCtx, from: &[NodeId], next: F) -> HashSet<NodeId>
where
    F: Fn(&NetlistCtx, NodeId) -> Vec<NodeId>,
{
    let mut seen: HashSet<NodeId> = from.iter().copied().collect();
    let mut stack = from.to_vec();
    while let Some(n) = stack.pop() {
        for m in next(ctx, n) {
            if seen.insert(m) {
                stack.push(m);
            }
        }
    }
    seen
}

impl AggregateLoops {
    /// Body of the loop controlled by `status`, sorted.
    fn loop_body(ctx: &NetlistCtx, status: NodeId) -> Vec<NodeId> {
        let NodeKind::LoopStatus(st) = &ctx.node(status).kind else {
            return vec![];
        };
        let reads: BTreeSet<NodeId> = st
            .reenter
            .iter()
            .chain(&st.exit)
            .flat_map(|i| loop_control_reads(ctx, InPort::new(status, *i)))
            .collect();
        if reads.is_empty() {
            return vec![];
        }
        let writes = reads.iter().filter_map(|r| {
            let ch = ctx.node(*r).io()?.channel?;
            ctx.channel(ch).write
        });

        let top = top_ancestor(ctx, status);
        let mut seeds: Vec<NodeId> =
            reads.iter().map(|r| top_ancestor(ctx, *r)).collect();
        seeds.push(top);
        let mut targets: Vec<NodeId> =
            writes.map(|w| top_ancestor(ctx, w)).collect();
        targets.push(top);

        let fwd = reach(ctx, &seeds, |ctx, n| ctx.users_of(n));
        let bwd = reach(ctx, &targets, |ctx, n| ctx.drivers_of(n));
        let mut body: Vec<NodeId> = fwd.intersection(&bwd).copied().collect();
        body.sort();
        body
    }
}

impl Pass for AggregateLoops {
    fn run(&mut self, ctx: &mut NetlistCtx) -> HlsResult<()> {
        let mut statuses: Vec<NodeId> = ctx
            .all_nodes_recursive()
            .into_iter()
            .filter(|n| matches!(ctx.node(*n).kind, NodeKind::LoopStatus(_)))
            .collect();
        statuses.sort();
        for status in statuses {
            let body = Self::loop_body(ctx, status);
            if body.len() <= 1 {
                ctx.tracer.log(|| format!("{status}: no loop body"));
                continue;
            }
            let aggs = substitute_parts(ctx, &[body], AggregateKind::Loop, 2)?;
            for (agg, len) in aggs {
                ctx.tracer
                    .log(|| format!("{agg}: body of {status}, {len} nodes"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hlsnet_ir::{Builder, HlsType, IoOptions, OpKind};

    #[test]
    fn counter_loop_body_is_clustered() {
        let mut ctx = NetlistCtx::new("t", 1000);
        let mut b = Builder::new(&mut ctx);
        let ch = b.add_channel("i", HlsType::Bits(8), Some(0));
        let rd = b.add_channel_read(ch, IoOptions::default());
        let one = b.add_const(1, HlsType::Bits(8));
        let ten = b.add_const(10, HlsType::Bits(8));
        let inc =
            b.add_op(OpKind::Add, HlsType::Bits(8), &[rd.data.unwrap(), one]);
        let more = b.add_op(OpKind::Ult, HlsType::BIT, &[inc, ten]);
        let done = b.add_op(OpKind::Not, HlsType::BIT, &[more]);
        let wr = b.add_channel_write(ch, Some(inc), IoOptions::default());
        let start = b.add_const(1, HlsType::BIT);
        let (status, _) = b.add_loop_status(None, &[start], &[more], &[done]);
        let outside = b.add_read("a", HlsType::Bits(8), IoOptions::default());
        b.add_write("b", outside.data, IoOptions::default());
        AggregateLoops::do_pass_default(&mut ctx).unwrap();

        let Parent::Aggregate(agg) = ctx.parent(status) else {
            panic!("loop was not clustered");
        };
        assert_eq!(ctx.aggregate(agg).kind, AggregateKind::Loop);
        for n in [rd.node, inc.node, more.node, done.node, wr.node] {
            assert_eq!(ctx.parent(n), Parent::Aggregate(agg));
        }
        for n in [one.node, ten.node, start.node, outside.node] {
            assert_eq!(ctx.parent(n), Parent::Netlist);
        }
    }

    #[test]
    fn status_without_channel_control_is_skipped() {
        let mut ctx = NetlistCtx::new("t", 1000);
        let mut b = Builder::new(&mut ctx);
        let r = b.add_read("a", HlsType::BIT, IoOptions::default());
        let (status, _) =
            b.add_loop_status(None, &[], &[r.data.unwrap()], &[]);
        AggregateLoops::do_pass_default(&mut ctx).unwrap();
        assert_eq!(ctx.parent(status), Parent::Netlist);
    }
}
