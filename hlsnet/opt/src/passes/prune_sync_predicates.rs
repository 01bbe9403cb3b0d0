use super::simplify;
use super::value_propagation::add_const;
use crate::traversal::{Named, Pass};
use hlsnet_ir::{
    AggregateKind, ArchKind, HlsType, InPort, NetlistCtx, NodeId, NodeKind,
    OutPort, Parent,
};
use hlsnet_utils::{HlsResult, SchedTime};
use linked_hash_map::LinkedHashMap;
use std::collections::HashSet;

/// Replaces the valid flags of blocking I/O by 1 in the later stages of a
/// pipeline.
///
/// A pipeline stage advances only once its blocking reads and writes
/// succeeded, so every later stage observes their valid flags as 1. Only
/// unconditional operations are pruned: a skipped or disabled operation
/// does not stall the stage. The replaced flags are folded away by
/// [super::ValuePropagation].
#[derive(Default)]
pub struct PruneSyncPredicates;

impl Named for PruneSyncPredicates {
    fn name() -> &'static str {
        "prune-sync-predicates"
    }

    fn description() -> &'static str {
        "replace valid flags observed in later pipeline stages by 1"
    }
}

/// Some ancestor of `id` is a pipeline.
fn in_pipeline(ctx: &NetlistCtx, id: NodeId) -> bool {
    let mut cur = ctx.parent(id);
    while let Parent::Aggregate(agg) = cur {
        if ctx.aggregate(agg).kind == AggregateKind::Arch(ArchKind::Pipeline)
        {
            return true;
        }
        cur = ctx.parent(agg);
    }
    false
}

/// Valid flags of `id` if it is an unconditional blocking read or write.
fn sync_flags(ctx: &NetlistCtx, id: NodeId) -> Vec<OutPort> {
    let (NodeKind::Read(io) | NodeKind::Write(io)) = &ctx.node(id).kind
    else {
        return vec![];
    };
    let p = &io.ports;
    if !io.blocking || p.extra_cond.is_some() || p.skip_when.is_some() {
        return vec![];
    }
    [p.valid, p.valid_nb]
        .into_iter()
        .flatten()
        .map(|o| OutPort::new(id, o))
        .collect()
}

/// Uses of `flag` consumed in a clock window after `window`, with their
/// input time. Aggregate boundaries are crossed in both directions.
fn later_uses(
    ctx: &NetlistCtx,
    flag: OutPort,
    window: i64,
) -> Vec<(InPort, SchedTime)> {
    let mut res = Vec::new();
    let mut seen = HashSet::new();
    let mut stack = vec![flag];
    while let Some(src) = stack.pop() {
        if !seen.insert(src) {
            continue;
        }
        for u in ctx.users(src) {
            match ctx.node(u.node).kind {
                NodeKind::PortOut => {
                    stack.extend(ctx.proxy_output_port(u.node));
                }
                NodeKind::Aggregate(_) => {
                    stack.push(OutPort::new(ctx.input_proxy(*u), 0));
                }
                _ => {
                    let Some(t) = ctx.in_time(*u) else { continue };
                    if ctx.clk_index(t) > window {
                        res.push((*u, t));
                    }
                }
            }
        }
    }
    res
}

impl Pass for PruneSyncPredicates {
    fn run(&mut self, ctx: &mut NetlistCtx) -> HlsResult<()> {
        let mut nodes: Vec<NodeId> = ctx
            .all_nodes_recursive()
            .into_iter()
            .filter(|n| in_pipeline(ctx, *n))
            .collect();
        nodes.sort();

        let mut uses: LinkedHashMap<Parent, Vec<(InPort, SchedTime)>> =
            LinkedHashMap::new();
        for id in nodes {
            for flag in sync_flags(ctx, id) {
                let Some(t) = ctx.out_time(flag) else { continue };
                for (u, t) in later_uses(ctx, flag, ctx.clk_index(t)) {
                    uses.entry(ctx.parent(u.node)).or_default().push((u, t));
                }
            }
        }
        if uses.is_empty() {
            return Ok(());
        }

        let mut pruned = 0;
        for (parent, ports) in uses {
            let first = ports.iter().map(|(_, t)| *t).min();
            let one = add_const(ctx, parent, 1, HlsType::BIT, first);
            for (u, _) in ports {
                ctx.reconnect(u, one);
                pruned += 1;
            }
        }
        log::debug!("{}: {pruned} sync predicate uses pruned", ctx.name);
        simplify(ctx)
    }
}
