use crate::analysis::{ClusterSearch, disaggregate};
use crate::traversal::{Named, Pass};
use hlsnet_ir::{
    AggregateKind, ArchKind, ArchPartition, NetlistCtx, NodeId, Parent,
    PipelinePartition,
};
use hlsnet_utils::{Error, HlsResult};
use std::collections::{BTreeMap, HashSet};

/// Collapses every pipeline and every FSM of the architecture partition
/// into one [AggregateKind::Arch] element.
///
/// The scheduling clusters are dissolved first so that the partition
/// refers to the operation nodes. Without a partition, the whole netlist
/// becomes a single pipeline whose stages are the clock windows of the
/// schedule. Every live node must be claimed by exactly one stage or
/// state.
#[derive(Default)]
pub struct ArchAggregate;

impl Named for ArchAggregate {
    fn name() -> &'static str {
        "arch-aggregate"
    }

    fn description() -> &'static str {
        "collapse pipelines and FSMs into architecture elements"
    }
}

/// One element to substitute: its kind, name and node sets in order.
type Element = (ArchKind, String, Vec<Vec<NodeId>>);

impl ArchAggregate {
    /// Dissolve the aggregates which are not architecture elements.
    fn flatten(ctx: &mut NetlistCtx) -> HlsResult<()> {
        loop {
            let clusters: Vec<NodeId> = ctx
                .scope_nodes(Parent::Netlist)
                .into_iter()
                .filter(|n| {
                    ctx.node(*n)
                        .aggregate()
                        .is_some_and(|a| !a.kind.is_arch_element())
                })
                .collect();
            if clusters.is_empty() {
                break;
            }
            for agg in clusters {
                let members = disaggregate(ctx, agg)?;
                ctx.tracer.log(|| {
                    format!("{agg} dissolved into {} nodes", members.len())
                });
            }
        }
        ctx.filter_removed();
        Ok(())
    }

    /// A single pipeline with one stage per clock window.
    fn default_partition(
        ctx: &mut NetlistCtx,
        free: &[NodeId],
    ) -> ArchPartition {
        let mut stages: BTreeMap<i64, Vec<NodeId>> = BTreeMap::new();
        for n in free {
            let window = ctx.zero_time(*n).map_or(0, |z| ctx.clk_index(z));
            stages.entry(window).or_default().push(*n);
        }
        ArchPartition {
            pipelines: vec![PipelinePartition {
                name: ctx.gen_name("pipeline"),
                stages: stages.into_values().collect(),
            }],
            fsms: vec![],
        }
    }

    /// Every free node is claimed by exactly one element.
    fn check_partition(
        ctx: &NetlistCtx,
        partition: &ArchPartition,
        free: &[NodeId],
    ) -> HlsResult<()> {
        let free_set: HashSet<NodeId> = free.iter().copied().collect();
        let mut claimed = HashSet::new();
        for n in partition.claimed_nodes() {
            if !free_set.contains(&n) {
                return Err(Error::structural(
                    "partition refers to a node which is not a live top \
                     level node",
                    vec![ctx.desc(n)],
                ));
            }
            if !claimed.insert(n) {
                return Err(Error::structural(
                    "node claimed by more than one stage or state",
                    vec![ctx.desc(n)],
                ));
            }
        }
        let missing: Vec<NodeId> = free
            .iter()
            .filter(|n| !claimed.contains(*n))
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(Error::structural(
                "nodes not claimed by any pipeline or FSM",
                ctx.descs(missing),
            ));
        }
        Ok(())
    }
}

impl Pass for ArchAggregate {
    fn run(&mut self, ctx: &mut NetlistCtx) -> HlsResult<()> {
        Self::flatten(ctx)?;
        let mut free: Vec<NodeId> = ctx
            .scope_nodes(Parent::Netlist)
            .into_iter()
            .filter(|n| {
                !ctx.node(*n)
                    .aggregate()
                    .is_some_and(|a| a.kind.is_arch_element())
            })
            .collect();
        free.sort();
        let partition = match ctx.partition.take() {
            Some(p) => p,
            None if free.is_empty() => return Ok(()),
            None => Self::default_partition(ctx, &free),
        };
        Self::check_partition(ctx, &partition, &free)?;

        let elements: Vec<Element> = partition
            .pipelines
            .into_iter()
            .map(|p| (ArchKind::Pipeline, p.name, p.stages))
            .chain(
                partition
                    .fsms
                    .into_iter()
                    .map(|f| (ArchKind::Fsm, f.name, f.states)),
            )
            .collect();
        for (kind, name, sets) in elements {
            let nodes: Vec<NodeId> = sets.iter().flatten().copied().collect();
            if nodes.is_empty() {
                continue;
            }
            let windows: Vec<i64> = sets
                .iter()
                .enumerate()
                .map(|(i, set)| {
                    set.iter()
                        .filter_map(|n| ctx.zero_time(*n))
                        .min()
                        .map_or(i as i64, |z| ctx.clk_index(z))
                })
                .collect();
            let cs = ClusterSearch::discover_from_node_list(ctx, &nodes);
            let agg = cs.substitute_with_node(
                ctx,
                AggregateKind::Arch(kind),
                Some(name),
            )?;
            ctx.aggregate_mut(agg).clk_windows = windows;
            ctx.tracer.log(|| {
                format!("{agg}: {kind:?} of {} nodes", cs.len())
            });
        }
        log::debug!(
            "{}: {} architecture elements",
            ctx.name,
            ctx.scope_nodes(Parent::Netlist).len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hlsnet_ir::{
        Builder, FsmPartition, HlsType, IoOptions, OpKind, Realization,
    };
    use hlsnet_utils::ErrorKind;

    fn two_window_netlist() -> (NetlistCtx, Vec<NodeId>) {
        let mut ctx = NetlistCtx::new("t", 1000);
        let mut b = Builder::new(&mut ctx);
        let r = b.add_read("a", HlsType::Bits(8), IoOptions::default());
        let x = b.add_op(OpKind::Not, HlsType::Bits(8), &[r.data.unwrap()]);
        b.set_realization(x.node, Realization::uniform(1, 1, 0, 0, 1));
        let w = b.add_write("o", Some(x), IoOptions::default());
        crate::scheduler::schedule(&mut ctx).unwrap();
        (ctx, vec![r.node, x.node, w.node])
    }

    #[test]
    fn default_partition_is_one_pipeline() {
        let (mut ctx, nodes) = two_window_netlist();
        ArchAggregate::do_pass_default(&mut ctx).unwrap();
        assert_eq!(ctx.top.len(), 1);
        let agg = ctx.top[0];
        assert_eq!(
            ctx.aggregate(agg).kind,
            AggregateKind::Arch(ArchKind::Pipeline)
        );
        assert_eq!(ctx.aggregate(agg).clk_windows, vec![0, 1]);
        for n in nodes {
            assert_eq!(ctx.parent(n), Parent::Aggregate(agg));
        }
    }

    #[test]
    fn unclaimed_node_is_rejected() {
        let (mut ctx, nodes) = two_window_netlist();
        ctx.partition = Some(ArchPartition {
            pipelines: vec![],
            fsms: vec![FsmPartition {
                name: "fsm".into(),
                states: vec![vec![nodes[0]], vec![nodes[1]]],
            }],
        });
        let err = ArchAggregate::do_pass_default(&mut ctx).err();
        assert!(matches!(
            err.as_ref().map(|e| e.kind()),
            Some(ErrorKind::Structural { .. })
        ));
    }
}
