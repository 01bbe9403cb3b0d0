use hlsnet_ir::{NetlistCtx, NodeId, OutPort, Parent, ScopeGraph};
use hlsnet_utils::HlsResult;
use std::collections::{BTreeSet, HashMap, HashSet};

/// For every node of a scope the set of explicit sync nodes it is coupled
/// with inside of one clock window.
///
/// Nodes reachable from a sync node through data edges, without passing
/// another sync node or a registered output, get the sync node. Nodes
/// which are not reached inherit the sets of the users they drive
/// combinationally.
#[derive(Clone, Debug, Default)]
pub struct SyncDomains {
    sets: HashMap<NodeId, BTreeSet<NodeId>>,
}

impl SyncDomains {
    pub fn new(ctx: &NetlistCtx, scope: Parent) -> HlsResult<Self> {
        let mut nodes = ctx.scope_nodes(scope);
        nodes.sort();
        let mut domains = SyncDomains::default();

        for s in nodes.iter().filter(|n| ctx.node(**n).is_explicit_sync()) {
            domains.flood_from(ctx, *s);
        }

        let order = ScopeGraph::from_scope(ctx, scope).toposort(ctx)?;
        for n in order.into_iter().rev() {
            if domains.sets.contains_key(&n) {
                continue;
            }
            let inherited: BTreeSet<NodeId> = Self::same_clk_outputs(ctx, n)
                .flat_map(|o| ctx.users(o).iter().map(|u| u.node))
                .filter_map(|u| domains.sets.get(&u))
                .flatten()
                .copied()
                .collect();
            if !inherited.is_empty() {
                domains.sets.insert(n, inherited);
            }
        }
        Ok(domains)
    }

    /// Outputs which keep the value inside of the current clock window.
    fn same_clk_outputs(
        ctx: &NetlistCtx,
        id: NodeId,
    ) -> impl Iterator<Item = OutPort> + '_ {
        let cycles = ctx.realization(id).map(|r| r.out_cycles.clone());
        ctx.outputs_of(id).filter(move |o| {
            let registered = cycles
                .as_ref()
                .and_then(|c| c.get(o.idx as usize))
                .is_some_and(|c| *c > 0);
            !ctx.out_ty(*o).is_void() && !registered
        })
    }

    fn flood_from(&mut self, ctx: &NetlistCtx, sync: NodeId) {
        self.sets.entry(sync).or_default().insert(sync);
        let mut seen = HashSet::from([sync]);
        let mut stack = vec![sync];
        while let Some(n) = stack.pop() {
            let mut users: Vec<NodeId> = Self::same_clk_outputs(ctx, n)
                .flat_map(|o| ctx.users(o).iter().map(|u| u.node))
                .collect();
            users.sort();
            users.dedup();
            for u in users {
                if !seen.insert(u) {
                    continue;
                }
                self.sets.entry(u).or_default().insert(sync);
                if !ctx.node(u).is_explicit_sync() {
                    stack.push(u);
                }
            }
        }
    }

    /// Sync nodes coupled with `id`.
    pub fn get(&self, id: NodeId) -> Option<&BTreeSet<NodeId>> {
        self.sets.get(&id)
    }

    /// Sorted sync set of a node, usable as a hashable label.
    pub fn label(&self, id: NodeId) -> Option<Vec<NodeId>> {
        self.sets.get(&id).map(|s| s.iter().copied().collect())
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.sets.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hlsnet_ir::{Builder, HlsType, IoOptions, OpKind, Realization};

    #[test]
    fn flood_stops_at_sync_nodes_and_sinks_inherit() {
        let mut ctx = NetlistCtx::new("t", 1000);
        let mut b = Builder::new(&mut ctx);
        let r = b.add_read(
            "a",
            HlsType::Bits(8),
            IoOptions::default().non_blocking(),
        );
        let data = r.data.unwrap();
        let c = b.add_const(3, HlsType::Bits(8));
        let glue = b.add_op(OpKind::Not, HlsType::Bits(8), &[c]);
        let sum = b.add_op(OpKind::Add, HlsType::Bits(8), &[data, glue]);
        let w = b.add_write(
            "b",
            Some(sum),
            IoOptions::default().extra_cond(r.valid),
        );
        let after = b.add_op(OpKind::Not, HlsType::BIT, &[w.valid]);
        b.add_write("c", Some(after), IoOptions::default());

        let d = SyncDomains::new(&ctx, Parent::Netlist).unwrap();
        let set = |n: NodeId| d.label(n).unwrap_or_default();
        assert_eq!(set(r.node), vec![r.node]);
        assert_eq!(set(sum.node), vec![r.node]);
        assert_eq!(set(w.node), vec![r.node, w.node]);
        // The flood of the read stops at the write.
        assert_eq!(set(after.node), vec![w.node]);
        // Upstream glue inherits from its sink.
        assert_eq!(set(glue.node), vec![r.node]);
        assert_eq!(set(c.node), vec![r.node]);
    }

    #[test]
    fn registered_output_cuts_the_flood() {
        let mut ctx = NetlistCtx::new("t", 1000);
        let mut b = Builder::new(&mut ctx);
        let r = b.add_read(
            "a",
            HlsType::Bits(8),
            IoOptions::default().non_blocking(),
        );
        let (ins, outs) = {
            let n = b.ctx.node(r.node);
            (n.inputs.len(), n.outputs.len())
        };
        b.set_realization(r.node, Realization::uniform(ins, outs, 0, 0, 1));
        let next = b.add_op(OpKind::Not, HlsType::Bits(8), &[r.data.unwrap()]);
        b.add_write("b", Some(next), IoOptions::default());

        let d = SyncDomains::new(&ctx, Parent::Netlist).unwrap();
        assert_eq!(d.label(r.node), Some(vec![r.node]));
        assert!(!d.get(next.node).is_some_and(|s| s.contains(&r.node)));
    }

    #[test]
    fn registered_output_does_not_inherit() {
        let mut ctx = NetlistCtx::new("t", 1000);
        let mut b = Builder::new(&mut ctx);
        let r = b.add_read(
            "a",
            HlsType::Bits(8),
            IoOptions::default().non_blocking(),
        );
        let c = b.add_const(3, HlsType::Bits(8));
        let reg = b.add_op(OpKind::Not, HlsType::Bits(8), &[c]);
        b.set_realization(reg.node, Realization::uniform(1, 1, 0, 0, 1));
        let sum =
            b.add_op(OpKind::Add, HlsType::Bits(8), &[r.data.unwrap(), reg]);
        b.add_write("b", Some(sum), IoOptions::default().extra_cond(r.valid));

        let d = SyncDomains::new(&ctx, Parent::Netlist).unwrap();
        assert_eq!(d.label(sum.node), Some(vec![r.node]));
        assert_eq!(d.label(reg.node), None);
        assert_eq!(d.label(c.node), None);
    }
}
