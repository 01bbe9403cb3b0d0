use crate::analysis::{ClusterSearch, substitute_parts};
use crate::traversal::{Named, Pass};
use hlsnet_ir::{AggregateKind, NetlistCtx, NodeId, Parent};
use hlsnet_utils::HlsResult;
use std::collections::HashSet;

/// Groups connected bitwise operators of the top level into
/// [AggregateKind::BitwiseOps] clusters, which the scheduler retimes as a
/// single LUT tree.
///
/// A component is split so that no path leaves a cluster and enters it
/// again, and only parts with at least two operators are substituted.
#[derive(Default)]
pub struct AggregateBitwiseOps;

impl Named for AggregateBitwiseOps {
    fn name() -> &'static str {
        "aggregate-bitwise-ops"
    }

    fn description() -> &'static str {
        "cluster connected bitwise operators"
    }
}

fn is_bitwise(ctx: &NetlistCtx, id: NodeId) -> bool {
    ctx.node(id).op().is_some_and(|op| op.is_bitwise())
}

impl Pass for AggregateBitwiseOps {
    fn run(&mut self, ctx: &mut NetlistCtx) -> HlsResult<()> {
        let mut nodes = ctx.scope_nodes(Parent::Netlist);
        nodes.sort();
        let mut seen = HashSet::new();
        let mut components = Vec::new();
        for n in nodes {
            let mut cs = ClusterSearch::default();
            cs.discover(ctx, n, &mut seen, is_bitwise);
            if cs.len() > 1 {
                components.push(cs.nodes);
            }
        }
        let aggs = substitute_parts(
            ctx,
            &components,
            AggregateKind::BitwiseOps,
            2,
        )?;
        for (agg, len) in &aggs {
            ctx.tracer.log(|| format!("{agg}: {len} bitwise operators"));
        }
        log::debug!("{}: {} bitwise clusters", ctx.name, aggs.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hlsnet_ir::{Builder, HlsType, IoOptions, OpKind};

    #[test]
    fn connected_operators_form_one_cluster() {
        let mut ctx = NetlistCtx::new("t", 1000);
        let mut b = Builder::new(&mut ctx);
        let r = b.add_read("a", HlsType::BIT, IoOptions::default());
        let d = r.data.unwrap();
        let x = b.add_op(OpKind::And, HlsType::BIT, &[d, r.valid]);
        let y = b.add_op(OpKind::Not, HlsType::BIT, &[x]);
        let z = b.add_op(OpKind::Or, HlsType::BIT, &[y, d]);
        let lone = b.add_op(OpKind::Xor, HlsType::BIT, &[d, d]);
        b.add_write("o", Some(z), IoOptions::default());
        b.add_write("p", Some(lone), IoOptions::default());
        AggregateBitwiseOps::do_pass_default(&mut ctx).unwrap();

        let Parent::Aggregate(agg) = ctx.parent(x.node) else {
            panic!("operator was not clustered");
        };
        assert_eq!(ctx.parent(y.node), Parent::Aggregate(agg));
        assert_eq!(ctx.parent(z.node), Parent::Aggregate(agg));
        assert_eq!(ctx.aggregate(agg).kind, AggregateKind::BitwiseOps);
        assert_eq!(ctx.parent(lone.node), Parent::Netlist);
    }
}
