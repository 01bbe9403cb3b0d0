use hlsnet_ir::{
    AggregateKind, InPort, NetlistCtx, NodeId, NodeKind, NodeSchedule,
    OutPort, Parent, Realization, ScopeGraph,
};
use hlsnet_utils::{Error, HlsResult};
use linked_hash_map::LinkedHashMap;
use std::collections::{HashMap, HashSet};

/// A connected set of nodes of one scope together with the edges crossing
/// its boundary.
///
/// The boundary is maintained incrementally while nodes are added:
/// `inputs` lists the external outputs which drive a member (in discovery
/// order), `inputs_dict` the member inputs each of them drives and
/// `outputs` the member outputs with a user outside of the cluster.
#[derive(Clone, Debug, Default)]
pub struct ClusterSearch {
    pub nodes: Vec<NodeId>,
    members: HashSet<NodeId>,
    pub inputs: Vec<OutPort>,
    pub inputs_dict: LinkedHashMap<OutPort, Vec<InPort>>,
    pub outputs: Vec<OutPort>,
}

impl ClusterSearch {
    pub fn contains(&self, id: NodeId) -> bool {
        self.members.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a member and update the boundary.
    pub fn add_node(&mut self, ctx: &NetlistCtx, id: NodeId) {
        if !self.members.insert(id) {
            return;
        }
        self.nodes.push(id);

        for dst in ctx.inputs_of(id) {
            let Some(src) = ctx.driver(dst) else {
                continue;
            };
            if self.members.contains(&src.node) {
                self.refresh_output(ctx, src);
            } else {
                if !self.inputs_dict.contains_key(&src) {
                    self.inputs.push(src);
                    self.inputs_dict.insert(src, Vec::new());
                }
                if let Some(dsts) = self.inputs_dict.get_mut(&src) {
                    dsts.push(dst);
                }
            }
        }

        for src in ctx.outputs_of(id) {
            if let Some(mut dsts) = self.inputs_dict.remove(&src) {
                // `src` was an external driver of former members.
                dsts.retain(|d| !self.members.contains(&d.node));
                if dsts.is_empty() {
                    self.inputs.retain(|i| *i != src);
                } else {
                    self.inputs_dict.insert(src, dsts);
                }
            }
            self.refresh_output(ctx, src);
        }
    }

    fn refresh_output(&mut self, ctx: &NetlistCtx, src: OutPort) {
        let external = ctx
            .users(src)
            .iter()
            .any(|u| !self.members.contains(&u.node));
        let listed = self.outputs.contains(&src);
        if external && !listed {
            self.outputs.push(src);
        } else if !external && listed {
            self.outputs.retain(|o| *o != src);
        }
    }

    /// Flood from `seed` over drivers and users satisfying `pred`. Nodes
    /// already in `seen` are not visited again, which allows several
    /// searches to share one `seen` set.
    pub fn discover<P>(
        &mut self,
        ctx: &NetlistCtx,
        seed: NodeId,
        seen: &mut HashSet<NodeId>,
        pred: P,
    ) where
        P: Fn(&NetlistCtx, NodeId) -> bool,
    {
        if seen.contains(&seed) || !pred(ctx, seed) {
            return;
        }
        seen.insert(seed);
        let mut stack = vec![seed];
        while let Some(n) = stack.pop() {
            self.add_node(ctx, n);
            let mut neighbors = ctx.drivers_of(n);
            neighbors.extend(ctx.users_of(n));
            neighbors.sort();
            neighbors.dedup();
            for m in neighbors.into_iter().rev() {
                if seen.contains(&m) || ctx.is_removed(m) || !pred(ctx, m) {
                    continue;
                }
                seen.insert(m);
                stack.push(m);
            }
        }
    }

    /// Cluster made of an explicit node list.
    pub fn discover_from_node_list(ctx: &NetlistCtx, nodes: &[NodeId]) -> Self {
        let mut cs = ClusterSearch::default();
        for n in nodes {
            cs.add_node(ctx, *n);
        }
        cs
    }

    pub fn consistency_check(&self, ctx: &NetlistCtx) -> HlsResult<()> {
        let mut seen = HashSet::new();
        for i in &self.inputs {
            if self.members.contains(&i.node) || !seen.insert(*i) {
                return Err(Error::consistency(
                    format!("bad cluster input {i}"),
                    vec![ctx.desc(i.node)],
                ));
            }
            if !self.inputs_dict.get(i).is_some_and(|d| !d.is_empty()) {
                return Err(Error::consistency(
                    format!("cluster input {i} drives no member"),
                    vec![ctx.desc(i.node)],
                ));
            }
        }
        let mut seen = HashSet::new();
        for o in &self.outputs {
            let external = ctx
                .users(*o)
                .iter()
                .any(|u| !self.members.contains(&u.node));
            if !external || !seen.insert(*o) {
                return Err(Error::consistency(
                    format!("bad cluster output {o}"),
                    vec![ctx.desc(o.node)],
                ));
            }
        }
        Ok(())
    }

    /// Replace the cluster by a new aggregate of `kind`. External edges
    /// are routed through new boundary ports and their proxies. If every
    /// member is scheduled the aggregate and its proxies get the times of
    /// the crossing edges.
    pub fn substitute_with_node(
        &self,
        ctx: &mut NetlistCtx,
        kind: AggregateKind,
        name: Option<String>,
    ) -> HlsResult<NodeId> {
        self.consistency_check(ctx)?;
        let Some(first) = self.nodes.first() else {
            return Err(Error::misc("cannot substitute an empty cluster"));
        };
        let parent = ctx.parent(*first);
        if let Some(n) = self.nodes.iter().find(|n| ctx.parent(**n) != parent)
        {
            return Err(Error::consistency(
                "cluster members are in different scopes",
                ctx.descs([*first, *n]),
            ));
        }
        let scheduled =
            self.nodes.iter().all(|n| ctx.node(*n).sched.is_some());
        let agg = ctx.add_aggregate(name, kind, parent);

        let mut in_times = Vec::new();
        for src in &self.inputs {
            let (port, proxy) = ctx.add_aggregate_input(agg, ctx.out_ty(*src));
            ctx.connect(*src, port);
            for dst in &self.inputs_dict[src] {
                ctx.reconnect(*dst, OutPort::new(proxy, 0));
            }
            if scheduled {
                let t = ctx.out_time(*src).unwrap_or_default();
                ctx.node_mut(proxy).sched = Some(NodeSchedule::flat(t, 0, 1));
                in_times.push(t);
            }
        }

        let mut out_times = Vec::new();
        for src in &self.outputs {
            let (port, proxy) = ctx.add_aggregate_output(agg, ctx.out_ty(*src));
            let external: Vec<InPort> = ctx
                .users(*src)
                .iter()
                .filter(|u| !self.members.contains(&u.node))
                .copied()
                .collect();
            for dst in external {
                ctx.reconnect(dst, port);
            }
            ctx.connect(*src, InPort::new(proxy, 0));
            if scheduled {
                let t = ctx.out_time(*src).unwrap_or_default();
                ctx.node_mut(proxy).sched = Some(NodeSchedule::flat(t, 1, 0));
                out_times.push(t);
            }
        }

        ctx.move_nodes(&self.nodes, Parent::Aggregate(agg));
        let (ins, outs) = (self.inputs.len(), self.outputs.len());
        ctx.node_mut(agg).realization = Some(Realization::zero(ins, outs));
        if scheduled {
            let zero = self
                .nodes
                .iter()
                .filter_map(|n| ctx.zero_time(*n))
                .min()
                .unwrap_or_default();
            ctx.node_mut(agg).sched = Some(NodeSchedule {
                zero,
                inputs: in_times,
                outputs: out_times,
            });
        }
        Ok(agg)
    }

    /// Assign every member a stage so that no path leaves a stage and
    /// returns to it through a node outside of the cluster, then split the
    /// cluster by stage. Substituting each part does not create a cycle.
    pub fn split_to_prevent_outer_cycles(
        &self,
        ctx: &NetlistCtx,
    ) -> HlsResult<Vec<ClusterSearch>> {
        let Some(first) = self.nodes.first() else {
            return Ok(vec![]);
        };
        let scope = ctx.parent(*first);
        let order = ScopeGraph::from_scope(ctx, scope).toposort(ctx)?;
        // Stage of the members and, for outside nodes, the lowest stage a
        // member depending on them can have.
        let mut stage: HashMap<NodeId, usize> = HashMap::new();
        let mut ext_stage: HashMap<NodeId, usize> = HashMap::new();
        for n in order {
            let in_cluster = self.members.contains(&n);
            let mut s = 0;
            for d in ctx.drivers_of(n) {
                let ds = match (stage.get(&d), ext_stage.get(&d)) {
                    (Some(st), _) if !in_cluster => st + 1,
                    (Some(st), _) => *st,
                    (None, Some(st)) => *st,
                    (None, None) => 0,
                };
                s = s.max(ds);
            }
            if in_cluster {
                stage.insert(n, s);
            } else {
                ext_stage.insert(n, s);
            }
        }
        let mut parts: Vec<Vec<NodeId>> = Vec::new();
        for n in &self.nodes {
            let s = stage[n];
            if parts.len() <= s {
                parts.resize(s + 1, Vec::new());
            }
            parts[s].push(*n);
        }
        Ok(parts
            .into_iter()
            .filter(|p| !p.is_empty())
            .map(|p| ClusterSearch::discover_from_node_list(ctx, &p))
            .collect())
    }
}

/// Substitute the node lists of `parts` one after another with aggregates
/// of `kind`. Every part is read from the graph as left by the previous
/// substitutions and split again, since a part may now leave an earlier
/// aggregate and return to itself through it. Pieces with fewer than
/// `min_len` members stay in place. Returns the new aggregates together
/// with their member counts.
pub fn substitute_parts(
    ctx: &mut NetlistCtx,
    parts: &[Vec<NodeId>],
    kind: AggregateKind,
    min_len: usize,
) -> HlsResult<Vec<(NodeId, usize)>> {
    let mut out = Vec::new();
    for part in parts {
        let cs = ClusterSearch::discover_from_node_list(ctx, part);
        let pieces: Vec<Vec<NodeId>> = cs
            .split_to_prevent_outer_cycles(ctx)?
            .into_iter()
            .map(|p| p.nodes)
            .collect();
        for piece in pieces.iter().filter(|p| p.len() >= min_len) {
            let cs = ClusterSearch::discover_from_node_list(ctx, piece);
            let agg = cs.substitute_with_node(ctx, kind, None)?;
            out.push((agg, piece.len()));
        }
    }
    Ok(out)
}

/// Dissolve an aggregate into its parent scope. Works from the current
/// boundary of the aggregate so that ports edited after the substitution
/// are handled. Returns the former members.
pub fn disaggregate(
    ctx: &mut NetlistCtx,
    agg: NodeId,
) -> HlsResult<Vec<NodeId>> {
    let parent = ctx.parent(agg);
    let (port_in, port_out, sub_nodes) = {
        let a = ctx.aggregate(agg);
        (a.port_in.clone(), a.port_out.clone(), a.sub_nodes.clone())
    };

    // Internal source standing for a boundary output.
    let mut out_srcs = Vec::with_capacity(port_out.len());
    for proxy in &port_out {
        let src = ctx.driver(InPort::new(*proxy, 0)).ok_or_else(|| {
            Error::consistency("undriven output proxy", ctx.descs([*proxy]))
        })?;
        let src = match port_in.iter().position(|p| *p == src.node) {
            // Pass-through of a boundary input.
            Some(i) => ctx
                .driver(InPort::new(agg, i as u32))
                .ok_or_else(|| {
                    Error::consistency(
                        "undriven aggregate input",
                        ctx.descs([agg]),
                    )
                })?,
            None => src,
        };
        out_srcs.push(src);
    }

    for (i, proxy) in port_in.iter().enumerate() {
        let ext = ctx.driver(InPort::new(agg, i as u32));
        let users = ctx.users(OutPort::new(*proxy, 0)).to_vec();
        for u in users {
            if ctx.node(u.node).kind == NodeKind::PortOut {
                // Handled together with the outputs.
                ctx.disconnect(u);
                continue;
            }
            match ext {
                Some(d) => ctx.reconnect(u, d),
                None => {
                    ctx.disconnect(u);
                }
            }
        }
    }

    for (o, src) in out_srcs.into_iter().enumerate() {
        let users = ctx.users(OutPort::new(agg, o as u32)).to_vec();
        for u in users {
            ctx.reconnect(u, src);
        }
    }

    let live: Vec<NodeId> =
        sub_nodes.into_iter().filter(|n| !ctx.is_removed(*n)).collect();
    ctx.move_nodes(&live, parent);
    ctx.remove_node(agg);
    Ok(live)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hlsnet_ir::{Builder, CheckOptions, HlsType, OpKind, check_netlist};

    fn is_bitwise(ctx: &NetlistCtx, id: NodeId) -> bool {
        ctx.node(id).op().is_some_and(|op| op.is_bitwise())
    }

    #[test]
    fn boundary_is_tracked_incrementally() {
        let mut ctx = NetlistCtx::new("t", 1000);
        let mut b = Builder::new(&mut ctx);
        let a = b.add_const(1, HlsType::BIT);
        let c = b.add_const(0, HlsType::BIT);
        let x = b.add_op(OpKind::And, HlsType::BIT, &[a, c]);
        let y = b.add_op(OpKind::Not, HlsType::BIT, &[x]);
        let z = b.add_op(OpKind::Add, HlsType::BIT, &[y, x]);
        let mut cs = ClusterSearch::default();
        let mut seen = HashSet::new();
        cs.discover(&ctx, y.node, &mut seen, is_bitwise);
        assert_eq!(cs.len(), 2);
        assert_eq!(cs.inputs, vec![a, c]);
        assert_eq!(cs.outputs, vec![y, x]);
        assert!(!cs.contains(z.node));
        assert!(cs.consistency_check(&ctx).is_ok());
    }

    #[test]
    fn outer_cycle_is_split() {
        let mut ctx = NetlistCtx::new("t", 1000);
        let mut b = Builder::new(&mut ctx);
        let a = b.add_const(1, HlsType::BIT);
        let x = b.add_op(OpKind::Not, HlsType::BIT, &[a]);
        let outside = b.add_op(OpKind::Add, HlsType::BIT, &[x, x]);
        let y = b.add_op(OpKind::And, HlsType::BIT, &[x, outside]);
        let cs =
            ClusterSearch::discover_from_node_list(&ctx, &[x.node, y.node]);
        let parts = cs.split_to_prevent_outer_cycles(&ctx).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].nodes, vec![x.node]);
        assert_eq!(parts[1].nodes, vec![y.node]);
    }

    #[test]
    fn part_closing_a_cycle_through_an_earlier_aggregate_is_split() {
        let mut ctx = NetlistCtx::new("t", 1000);
        let mut b = Builder::new(&mut ctx);
        let c = b.add_const(1, HlsType::BIT);
        let a1 = b.add_op(OpKind::Not, HlsType::BIT, &[c]);
        let b1 = b.add_op(OpKind::Not, HlsType::BIT, &[a1]);
        let b2 = b.add_op(OpKind::Not, HlsType::BIT, &[c]);
        let a2 = b.add_op(OpKind::And, HlsType::BIT, &[b2, c]);
        let parts = vec![vec![a1.node, a2.node], vec![b1.node, b2.node]];
        let aggs =
            substitute_parts(&mut ctx, &parts, AggregateKind::Generic, 2)
                .unwrap();
        assert_eq!(aggs.len(), 1);
        assert_eq!(aggs[0].1, 2);
        assert_eq!(ctx.parent(b1.node), Parent::Netlist);
        assert_eq!(ctx.parent(b2.node), Parent::Netlist);
        check_netlist(&ctx, CheckOptions::default()).unwrap();
    }

    #[test]
    fn substitute_and_disaggregate() {
        let mut ctx = NetlistCtx::new("t", 1000);
        let mut b = Builder::new(&mut ctx);
        let a = b.add_const(1, HlsType::BIT);
        let x = b.add_op(OpKind::Not, HlsType::BIT, &[a]);
        let y = b.add_op(OpKind::Xor, HlsType::BIT, &[x, a]);
        let z = b.add_op(OpKind::Add, HlsType::BIT, &[y, y]);
        let cs =
            ClusterSearch::discover_from_node_list(&ctx, &[x.node, y.node]);
        let agg = cs
            .substitute_with_node(&mut ctx, AggregateKind::Generic, None)
            .unwrap();
        assert_eq!(ctx.node(agg).inputs.len(), 1);
        assert_eq!(ctx.node(agg).outputs.len(), 1);
        assert_eq!(ctx.drivers_of(z.node), vec![agg, agg]);
        check_netlist(&ctx, CheckOptions::default()).unwrap();

        let members = disaggregate(&mut ctx, agg).unwrap();
        ctx.filter_removed();
        assert_eq!(members, vec![x.node, y.node]);
        assert_eq!(ctx.drivers_of(x.node), vec![a.node]);
        assert_eq!(ctx.drivers_of(y.node), vec![x.node, a.node]);
        assert_eq!(ctx.drivers_of(z.node), vec![y.node, y.node]);
        assert_eq!(ctx.parent(x.node), Parent::Netlist);
        check_netlist(&ctx, CheckOptions::default()).unwrap();
    }
}
