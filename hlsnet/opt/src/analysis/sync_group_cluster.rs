use super::SyncDomains;
use hlsnet_ir::{InPort, NetlistCtx, NodeId, NodeKind, Parent, ScopeGraph};
use hlsnet_utils::HlsResult;
use itertools::Itertools;
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::fmt::Write as _;

type Label = Vec<NodeId>;

/// Groups the nodes of a scope by their sync set and discovers the I/O
/// SCCs: sets of nodes which must be scheduled in one clock window.
#[derive(Debug)]
pub struct SyncGroupClusterContext {
    scope: Parent,
    pub domains: SyncDomains,
    /// Nodes grouped by their sorted sync set.
    pub groups: BTreeMap<Label, Vec<NodeId>>,
    /// Discovered I/O SCCs, each sorted, ordered by the smallest member.
    pub sccs: Vec<Vec<NodeId>>,
}

impl SyncGroupClusterContext {
    pub fn new(ctx: &NetlistCtx, scope: Parent) -> HlsResult<Self> {
        let domains = SyncDomains::new(ctx, scope)?;
        let mut groups: BTreeMap<Label, Vec<NodeId>> = BTreeMap::new();
        let mut nodes: Vec<NodeId> = domains.nodes().collect();
        nodes.sort();
        for n in nodes {
            if let Some(label) = domains.label(n) {
                groups.entry(label).or_default().push(n);
            }
        }
        Ok(Self {
            scope,
            domains,
            groups,
            sccs: Vec::new(),
        })
    }

    fn neighbors(ctx: &NetlistCtx, n: NodeId) -> Vec<NodeId> {
        let mut out = ctx.drivers_of(n);
        out.extend(ctx.users_of(n));
        out.sort();
        out.dedup();
        out
    }

    /// Labels transitively connected to `start` through neighboring nodes
    /// whose labels share a sync node.
    fn label_component(
        &self,
        ctx: &NetlistCtx,
        start: &Label,
        done: &mut HashSet<Label>,
    ) -> Vec<NodeId> {
        let mut nodes = Vec::new();
        let mut queue = VecDeque::from([start.clone()]);
        done.insert(start.clone());
        while let Some(label) = queue.pop_front() {
            let members = &self.groups[&label];
            nodes.extend(members.iter().copied());
            for n in members {
                for m in Self::neighbors(ctx, *n) {
                    let Some(other) = self.domains.label(m) else {
                        continue;
                    };
                    if done.contains(&other) {
                        continue;
                    }
                    let overlaps = other.iter().any(|s| label.contains(s));
                    if overlaps {
                        done.insert(other.clone());
                        queue.push_back(other);
                    }
                }
            }
        }
        nodes.sort();
        nodes
    }

    /// Dependency graph of `candidates` and their neighbors extended by
    /// the coupling edges of the sync nodes.
    fn coupling_graph(
        &self,
        ctx: &NetlistCtx,
        candidates: &[NodeId],
    ) -> ScopeGraph {
        let mut nodes: BTreeSet<NodeId> = candidates.iter().copied().collect();
        for n in candidates {
            nodes.extend(Self::neighbors(ctx, *n));
        }
        let nodes: Vec<NodeId> = nodes.into_iter().collect();
        let mut g = ScopeGraph::from_nodes(ctx, &nodes);
        for s in candidates {
            let node = ctx.node(*s);
            if !node.is_explicit_sync() {
                continue;
            }
            for t in self.domains.label(*s).unwrap_or_default() {
                if t != *s && g.contains(t) {
                    g.add_edge(*s, t);
                }
            }
            match &node.kind {
                NodeKind::ExplicitSync(sync) => {
                    if let Some(r) = sync.associated_read {
                        if g.contains(r) {
                            g.add_edge(*s, r);
                        }
                    }
                }
                NodeKind::LoopStatus(st) => {
                    for i in st.reenter.iter().chain(&st.exit) {
                        for r in control_reads(ctx, InPort::new(*s, *i)) {
                            if g.contains(r) {
                                g.add_edge(*s, r);
                            }
                        }
                    }
                }
                _ => (),
            }
        }
        g
    }

    /// Find the I/O SCCs of the scope, each sorted and ordered by its
    /// smallest member.
    pub fn discover_io_sccs(&mut self, ctx: &NetlistCtx) -> &[Vec<NodeId>] {
        let mut done: HashSet<Label> = HashSet::new();
        let mut found: Vec<BTreeSet<NodeId>> = Vec::new();
        let labels: Vec<Label> = self.groups.keys().cloned().collect();
        for label in labels {
            if done.contains(&label) {
                continue;
            }
            let candidates = self.label_component(ctx, &label, &mut done);
            let g = self.coupling_graph(ctx, &candidates);
            for scc in g.sccs() {
                if scc.len() > 1 {
                    log::debug!("io scc {}", scc.iter().join(", "));
                    found.push(scc.into_iter().collect());
                }
            }
        }

        let mut merged = merge_overlapping(found);
        for scc in merged.iter_mut() {
            absorb_constants(ctx, scc);
        }
        self.sccs = merged
            .into_iter()
            .map(|s| s.into_iter().collect())
            .collect();
        self.sccs.sort();
        &self.sccs
    }

    /// Render the scope as a Graphviz digraph with one subgraph per
    /// discovered I/O SCC.
    pub fn to_dot(&self, ctx: &NetlistCtx) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "digraph io_sync_scc {{");
        let mut clustered = HashSet::new();
        for (i, scc) in self.sccs.iter().enumerate() {
            let _ = writeln!(out, "  subgraph cluster_{i} {{");
            let _ = writeln!(out, "    label=\"scc{i}\";");
            for n in scc {
                clustered.insert(*n);
                let _ = writeln!(out, "    {n} [label=\"{}\"];", ctx.repr(*n));
            }
            let _ = writeln!(out, "  }}");
        }
        let mut nodes = ctx.scope_nodes(self.scope);
        nodes.sort();
        for n in &nodes {
            if !clustered.contains(n) {
                let _ = writeln!(out, "  {n} [label=\"{}\"];", ctx.repr(*n));
            }
        }
        for n in &nodes {
            let mut users = ctx.users_of(*n);
            users.sort();
            users.dedup();
            for u in users {
                let _ = writeln!(out, "  {n} -> {u};");
            }
        }
        let _ = writeln!(out, "}}");
        out
    }
}

/// Channel reads which drive `input` through combinational logic of the
/// same scope.
pub fn control_reads(ctx: &NetlistCtx, input: InPort) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    let mut stack: Vec<NodeId> =
        ctx.driver(input).map(|d| d.node).into_iter().collect();
    while let Some(n) = stack.pop() {
        if !seen.insert(n) {
            continue;
        }
        let node = ctx.node(n);
        if node.is_read() {
            if node.is_channel_io() {
                out.push(n);
            }
            continue;
        }
        if node.is_explicit_sync() {
            continue;
        }
        stack.extend(ctx.drivers_of(n));
    }
    out.sort();
    out
}

fn merge_overlapping(sets: Vec<BTreeSet<NodeId>>) -> Vec<BTreeSet<NodeId>> {
    let mut merged: Vec<BTreeSet<NodeId>> = Vec::new();
    for set in sets {
        let mut set = set;
        let mut i = 0;
        while i < merged.len() {
            if merged[i].is_disjoint(&set) {
                i += 1;
            } else {
                set.extend(merged.swap_remove(i));
                i = 0;
            }
        }
        merged.push(set);
    }
    merged
}

/// Constants used only inside of the SCC become part of it.
fn absorb_constants(ctx: &NetlistCtx, scc: &mut BTreeSet<NodeId>) {
    let mut drivers: Vec<NodeId> =
        scc.iter().flat_map(|n| ctx.drivers_of(*n)).collect();
    drivers.sort();
    drivers.dedup();
    for d in drivers {
        if scc.contains(&d) || ctx.node(d).const_value().is_none() {
            continue;
        }
        if ctx.users_of(d).iter().all(|u| scc.contains(u)) {
            scc.insert(d);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hlsnet_ir::{Builder, HlsType, IoOptions, OpKind};

    #[test]
    fn optional_read_and_gated_write_form_an_scc() {
        let mut ctx = NetlistCtx::new("t", 1000);
        let mut b = Builder::new(&mut ctx);
        let r = b.add_read(
            "a",
            HlsType::Bits(8),
            IoOptions::default().non_blocking(),
        );
        let one = b.add_const(1, HlsType::Bits(8));
        let sum =
            b.add_op(OpKind::Add, HlsType::Bits(8), &[r.data.unwrap(), one]);
        let w = b.add_write(
            "b",
            Some(sum),
            IoOptions::default().extra_cond(r.valid),
        );
        let other = b.add_read("c", HlsType::Bits(8), IoOptions::default());
        b.add_write("d", other.data, IoOptions::default());

        let mut sg =
            SyncGroupClusterContext::new(&ctx, Parent::Netlist).unwrap();
        let sccs = sg.discover_io_sccs(&ctx).to_vec();
        assert_eq!(sccs, vec![vec![r.node, one.node, sum.node, w.node]]);
        let dot = sg.to_dot(&ctx);
        assert!(dot.contains("subgraph cluster_0"));
        assert!(dot.contains(&format!("{} -> {};", r.node, w.node)));
    }
}
