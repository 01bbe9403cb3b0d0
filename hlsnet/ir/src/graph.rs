use crate::{NetlistCtx, NodeId, Parent};
use hlsnet_utils::{Error, HlsResult};
use petgraph::{
    Direction::{Incoming, Outgoing},
    algo,
    graph::{DiGraph, NodeIndex},
};
use std::collections::HashMap;

/// A petgraph::DiGraph where the live nodes of one scope are the nodes and
/// each edge `X -> Y` means that an output of `X` drives an input of `Y`.
///
/// Graph nodes are inserted in ascending [NodeId] order so that every
/// traversal of the graph is deterministic.
#[derive(Clone, Debug, Default)]
pub struct ScopeGraph {
    pub graph: DiGraph<NodeId, ()>,
    index: HashMap<NodeId, NodeIndex>,
}

impl ScopeGraph {
    /// Dependency graph of the nodes directly owned by `parent`.
    pub fn from_scope(ctx: &NetlistCtx, parent: Parent) -> Self {
        let mut nodes = ctx.scope_nodes(parent);
        nodes.sort();
        Self::from_nodes(ctx, &nodes)
    }

    /// Dependency graph induced by `nodes`. Edges from or to other nodes are
    /// ignored.
    pub fn from_nodes(ctx: &NetlistCtx, nodes: &[NodeId]) -> Self {
        let mut g = ScopeGraph::default();
        for n in nodes {
            g.add_node(*n);
        }
        for n in nodes {
            let dst = g.index[n];
            for d in ctx.drivers_of(*n) {
                if let Some(src) = g.index.get(&d) {
                    if g.graph.find_edge(*src, dst).is_none() {
                        g.graph.add_edge(*src, dst, ());
                    }
                }
            }
        }
        g
    }

    pub fn add_node(&mut self, id: NodeId) -> NodeIndex {
        if let Some(idx) = self.index.get(&id) {
            return *idx;
        }
        let idx = self.graph.add_node(id);
        self.index.insert(id, idx);
        idx
    }

    pub fn add_edge(&mut self, src: NodeId, dst: NodeId) {
        let (s, d) = (self.add_node(src), self.add_node(dst));
        if self.graph.find_edge(s, d).is_none() {
            self.graph.add_edge(s, d, ());
        }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn predecessors(&self, id: NodeId) -> Vec<NodeId> {
        self.neighbors(id, Incoming)
    }

    pub fn successors(&self, id: NodeId) -> Vec<NodeId> {
        self.neighbors(id, Outgoing)
    }

    fn neighbors(
        &self,
        id: NodeId,
        dir: petgraph::Direction,
    ) -> Vec<NodeId> {
        let Some(idx) = self.index.get(&id) else {
            return vec![];
        };
        let mut out: Vec<NodeId> = self
            .graph
            .neighbors_directed(*idx, dir)
            .map(|n| self.graph[n])
            .collect();
        out.sort();
        out
    }

    /// Nodes in an order where every driver precedes its users.
    pub fn toposort(&self, ctx: &NetlistCtx) -> HlsResult<Vec<NodeId>> {
        algo::toposort(&self.graph, None)
            .map(|order| order.into_iter().map(|i| self.graph[i]).collect())
            .map_err(|cycle| {
                let start = self.graph[cycle.node_id()];
                Error::cycle(ctx.descs(self.cycle_through(start)))
            })
    }

    /// Strongly connected components, each sorted by id, ordered by their
    /// smallest member.
    pub fn sccs(&self) -> Vec<Vec<NodeId>> {
        let mut sccs: Vec<Vec<NodeId>> = algo::tarjan_scc(&self.graph)
            .into_iter()
            .map(|scc| {
                let mut ids: Vec<_> =
                    scc.into_iter().map(|i| self.graph[i]).collect();
                ids.sort();
                ids
            })
            .collect();
        sccs.sort();
        sccs
    }

    /// Shortest cycle through `start` found by a breadth first search, the
    /// start node repeated at the end. Only `start` if it is on no cycle.
    pub fn cycle_through(&self, start: NodeId) -> Vec<NodeId> {
        let Some(&s) = self.index.get(&start) else {
            return vec![start];
        };
        let mut prev: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut queue = std::collections::VecDeque::from([s]);
        while let Some(n) = queue.pop_front() {
            for m in self.graph.neighbors_directed(n, Outgoing) {
                if m == s {
                    let mut back = Vec::new();
                    let mut cur = n;
                    while cur != s {
                        back.push(self.graph[cur]);
                        cur = prev[&cur];
                    }
                    back.reverse();
                    let mut path = vec![start];
                    path.extend(back);
                    path.push(start);
                    return path;
                }
                if !prev.contains_key(&m) {
                    prev.insert(m, n);
                    queue.push_back(m);
                }
            }
        }
        vec![start]
    }
}
