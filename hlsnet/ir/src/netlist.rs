//! The netlist context: node arena, containment hierarchy and graph edits.
//!
//! Every edit of the dependency graph goes through [NetlistCtx] so that the
//! driver and user lists of the ports stay consistent after each call.
use crate::{
    AbstractPlatform, Aggregate, AggregateKind, ArchPartition, ChannelId,
    HlsType, InPort, IndexedMap, Input, Node, NodeId, NodeKind,
    OutPort, Output, Parent, Platform, Realization, default_realization,
};
use hlsnet_utils::{NameGenerator, NodeDesc, SchedTime, Tracer, time};
use std::rc::Rc;

/// Register backed communication path between a write and a read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Channel {
    pub name: String,
    pub ty: HlsType,
    /// Value the register holds after reset.
    pub init: Option<u64>,
    pub read: Option<NodeId>,
    pub write: Option<NodeId>,
}

/// Top level object of one netlist and its scheduling configuration.
#[derive(Clone, Debug)]
pub struct NetlistCtx {
    pub name: String,
    pub nodes: IndexedMap<NodeId, Node>,
    /// Nodes owned directly by the netlist.
    pub top: Vec<NodeId>,
    pub channels: IndexedMap<ChannelId, Channel>,
    /// Normalized clock period.
    pub clk_period: SchedTime,
    /// Length of one normalized time unit in picoseconds.
    pub resolution_ps: u64,
    pub platform: Rc<dyn Platform>,
    /// Pipelines and FSMs detected by the structural analyses.
    pub partition: Option<ArchPartition>,
    /// Extra options provided on the command line, interpreted by passes.
    pub extra_opts: Vec<String>,
    pub namegen: NameGenerator,
    pub tracer: Tracer,
}

impl NetlistCtx {
    pub fn new<S: Into<String>>(name: S, clk_period: SchedTime) -> Self {
        assert!(clk_period > 0, "clock period must be positive");
        Self {
            name: name.into(),
            nodes: IndexedMap::new(),
            top: Vec::new(),
            channels: IndexedMap::new(),
            clk_period,
            resolution_ps: time::DEFAULT_RESOLUTION_PS,
            platform: Rc::new(AbstractPlatform::default()),
            partition: None,
            extra_opts: Vec::new(),
            namegen: NameGenerator::default(),
            tracer: Tracer::default(),
        }
    }

    pub fn with_platform(mut self, platform: Rc<dyn Platform>) -> Self {
        self.platform = platform;
        self
    }

    pub fn ff_store_time(&self) -> SchedTime {
        self.platform.ff_store_time(self.clk_period)
    }

    pub fn clk_index(&self, t: SchedTime) -> i64 {
        time::clk_index(t, self.clk_period)
    }

    pub fn start_of_clk(&self, t: SchedTime) -> SchedTime {
        time::start_of_clk(t, self.clk_period)
    }

    pub fn start_of_next_clk(&self, t: SchedTime) -> SchedTime {
        time::start_of_next_clk(t, self.clk_period)
    }

    pub fn end_of_clk(&self, t: SchedTime) -> SchedTime {
        time::end_of_clk(t, self.clk_period)
    }

    pub fn gen_name(&mut self, prefix: &str) -> String {
        self.namegen.gen_name(prefix)
    }

    /// Name a node. Generated names never repeat a name set this way.
    pub fn set_name<S: Into<String>>(&mut self, id: NodeId, name: S) {
        let name = name.into();
        self.namegen.add_name(name.clone());
        self.nodes[id].name = Some(name);
    }

    /// Run `f` inside a named trace scope.
    pub fn traced<R, F>(&mut self, scope: &str, f: F) -> R
    where
        F: FnOnce(&mut Self) -> R,
    {
        self.tracer.enter(scope);
        let res = f(self);
        self.tracer.leave();
        res
    }

    // ---------------------------------------------------------------------
    // Node access

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    pub fn is_removed(&self, id: NodeId) -> bool {
        self.nodes[id].removed
    }

    /// Short textual identity of a node.
    pub fn repr(&self, id: NodeId) -> String {
        let node = &self.nodes[id];
        match &node.name {
            Some(name) => format!("{}:{}", node.kind_name(), name),
            None => node.kind_name().to_string(),
        }
    }

    pub fn desc(&self, id: NodeId) -> NodeDesc {
        NodeDesc::new(id.raw(), self.repr(id))
    }

    pub fn descs<I: IntoIterator<Item = NodeId>>(
        &self,
        ids: I,
    ) -> Vec<NodeDesc> {
        ids.into_iter().map(|id| self.desc(id)).collect()
    }

    /// Find a live node by its name.
    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|(_, n)| !n.removed && n.name.as_deref() == Some(name))
            .map(|(id, _)| id)
    }

    // ---------------------------------------------------------------------
    // Hierarchy

    /// Owner of a node.
    pub fn parent(&self, id: NodeId) -> Parent {
        self.nodes[id].parent
    }

    /// The list of children of a scope, boundary proxies excluded.
    pub fn scope_list(&self, parent: Parent) -> &[NodeId] {
        match parent {
            Parent::Netlist => &self.top,
            Parent::Aggregate(a) => &self.aggregate(a).sub_nodes,
        }
    }

    pub fn scope_list_mut(&mut self, parent: Parent) -> &mut Vec<NodeId> {
        match parent {
            Parent::Netlist => &mut self.top,
            Parent::Aggregate(a) => &mut self.aggregate_mut(a).sub_nodes,
        }
    }

    /// Live nodes of a scope including the boundary proxies of an
    /// aggregate.
    pub fn scope_nodes(&self, parent: Parent) -> Vec<NodeId> {
        let ids: Vec<NodeId> = match parent {
            Parent::Netlist => self.top.clone(),
            Parent::Aggregate(a) => self.aggregate(a).scope().collect(),
        };
        ids.into_iter().filter(|id| !self.nodes[*id].removed).collect()
    }

    /// All live nodes below `parent`, parents listed before their children.
    pub fn nodes_recursive(&self, parent: Parent) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> =
            self.scope_nodes(parent).into_iter().rev().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Some(agg) = self.nodes[id].aggregate() {
                let children: Vec<_> = agg
                    .scope()
                    .filter(|c| !self.nodes[*c].removed)
                    .collect();
                stack.extend(children.into_iter().rev());
            }
        }
        out
    }

    /// All live nodes of the netlist.
    pub fn all_nodes_recursive(&self) -> Vec<NodeId> {
        self.nodes_recursive(Parent::Netlist)
    }

    /// Move nodes into another scope. Proxies cannot be moved.
    pub fn move_nodes(&mut self, ids: &[NodeId], to: Parent) {
        let moved: std::collections::HashSet<NodeId> =
            ids.iter().copied().collect();
        let mut from: Vec<Parent> = Vec::new();
        for id in ids {
            let p = self.nodes[*id].parent;
            if !from.contains(&p) {
                from.push(p);
            }
        }
        for p in from {
            self.scope_list_mut(p).retain(|n| !moved.contains(n));
        }
        for id in ids {
            assert!(
                !matches!(
                    self.nodes[*id].kind,
                    NodeKind::PortIn | NodeKind::PortOut
                ),
                "boundary proxy {id} cannot change its scope"
            );
            self.nodes[*id].parent = to;
        }
        self.scope_list_mut(to).extend_from_slice(ids);
    }

    // ---------------------------------------------------------------------
    // Creation

    /// Create a node without ports. Proxies are not inserted into any list,
    /// they are registered by [NetlistCtx::add_aggregate_input] and
    /// [NetlistCtx::add_aggregate_output].
    pub fn add_node(
        &mut self,
        name: Option<String>,
        kind: NodeKind,
        parent: Parent,
    ) -> NodeId {
        let is_proxy = matches!(kind, NodeKind::PortIn | NodeKind::PortOut);
        if let Some(n) = &name {
            self.namegen.add_name(n.clone());
        }
        let id = self.nodes.push(Node::new(name, kind, parent));
        if !is_proxy {
            self.scope_list_mut(parent).push(id);
        }
        id
    }

    pub fn add_input(&mut self, id: NodeId) -> InPort {
        let node = &mut self.nodes[id];
        let idx = node.inputs.len() as u32;
        node.inputs.push(Input { driver: None });
        if let Some(r) = &mut node.realization {
            r.in_delay.push(0);
            r.in_cycles.push(0);
        }
        if let Some(s) = &mut node.sched {
            s.inputs.push(s.zero);
        }
        InPort::new(id, idx)
    }

    pub fn add_output(&mut self, id: NodeId, ty: HlsType) -> OutPort {
        let node = &mut self.nodes[id];
        let idx = node.outputs.len() as u32;
        node.outputs.push(Output {
            ty,
            users: Vec::new(),
        });
        if let Some(r) = &mut node.realization {
            r.out_delay.push(0);
            r.out_cycles.push(0);
        }
        if let Some(s) = &mut node.sched {
            s.outputs.push(s.zero);
        }
        OutPort::new(id, idx)
    }

    pub fn add_channel<S: Into<String>>(
        &mut self,
        name: S,
        ty: HlsType,
        init: Option<u64>,
    ) -> ChannelId {
        self.channels.push(Channel {
            name: name.into(),
            ty,
            init,
            read: None,
            write: None,
        })
    }

    pub fn channel(&self, id: ChannelId) -> &Channel {
        &self.channels[id]
    }

    // ---------------------------------------------------------------------
    // Aggregates

    pub fn aggregate(&self, id: NodeId) -> &Aggregate {
        self.nodes[id]
            .aggregate()
            .unwrap_or_else(|| panic!("{} is not an aggregate", self.repr(id)))
    }

    pub fn aggregate_mut(&mut self, id: NodeId) -> &mut Aggregate {
        self.nodes[id]
            .aggregate_mut()
            .unwrap_or_else(|| panic!("{id} is not an aggregate"))
    }

    pub fn add_aggregate(
        &mut self,
        name: Option<String>,
        kind: AggregateKind,
        parent: Parent,
    ) -> NodeId {
        let agg = Box::new(Aggregate::new(kind));
        self.add_node(name, NodeKind::Aggregate(agg), parent)
    }

    /// Add a boundary input and its internal proxy.
    pub fn add_aggregate_input(
        &mut self,
        agg: NodeId,
        ty: HlsType,
    ) -> (InPort, NodeId) {
        let port = self.add_input(agg);
        let proxy =
            self.add_node(None, NodeKind::PortIn, Parent::Aggregate(agg));
        self.add_output(proxy, ty);
        self.nodes[proxy].realization = Some(Realization::zero(0, 1));
        self.aggregate_mut(agg).port_in.push(proxy);
        (port, proxy)
    }

    /// Add a boundary output and its internal proxy.
    pub fn add_aggregate_output(
        &mut self,
        agg: NodeId,
        ty: HlsType,
    ) -> (OutPort, NodeId) {
        let port = self.add_output(agg, ty);
        let proxy =
            self.add_node(None, NodeKind::PortOut, Parent::Aggregate(agg));
        self.add_input(proxy);
        self.nodes[proxy].realization = Some(Realization::zero(1, 0));
        self.aggregate_mut(agg).port_out.push(proxy);
        (port, proxy)
    }

    /// Internal proxy of a boundary input.
    pub fn input_proxy(&self, port: InPort) -> NodeId {
        self.aggregate(port.node).port_in[port.idx as usize]
    }

    /// Internal proxy of a boundary output.
    pub fn output_proxy(&self, port: OutPort) -> NodeId {
        self.aggregate(port.node).port_out[port.idx as usize]
    }

    /// The boundary input which a [NodeKind::PortIn] proxy stands for.
    pub fn proxy_input_port(&self, proxy: NodeId) -> Option<InPort> {
        let Parent::Aggregate(agg) = self.nodes[proxy].parent else {
            return None;
        };
        let idx =
            self.aggregate(agg).port_in.iter().position(|p| *p == proxy)?;
        Some(InPort::new(agg, idx as u32))
    }

    /// The boundary output which a [NodeKind::PortOut] proxy stands for.
    pub fn proxy_output_port(&self, proxy: NodeId) -> Option<OutPort> {
        let Parent::Aggregate(agg) = self.nodes[proxy].parent else {
            return None;
        };
        let idx =
            self.aggregate(agg).port_out.iter().position(|p| *p == proxy)?;
        Some(OutPort::new(agg, idx as u32))
    }

    // ---------------------------------------------------------------------
    // Ports and edges

    pub fn driver(&self, port: InPort) -> Option<OutPort> {
        self.nodes[port.node].inputs[port.idx as usize].driver
    }

    pub fn users(&self, port: OutPort) -> &[InPort] {
        &self.nodes[port.node].outputs[port.idx as usize].users
    }

    pub fn out_ty(&self, port: OutPort) -> HlsType {
        self.nodes[port.node].outputs[port.idx as usize].ty
    }

    /// Type of the value entering an input, void if disconnected.
    pub fn in_ty(&self, port: InPort) -> HlsType {
        self.driver(port)
            .map(|d| self.out_ty(d))
            .unwrap_or(HlsType::Void)
    }

    pub fn inputs_of(
        &self,
        id: NodeId,
    ) -> impl Iterator<Item = InPort> + use<> {
        let n = self.nodes[id].inputs.len() as u32;
        (0..n).map(move |i| InPort::new(id, i))
    }

    pub fn outputs_of(
        &self,
        id: NodeId,
    ) -> impl Iterator<Item = OutPort> + use<> {
        let n = self.nodes[id].outputs.len() as u32;
        (0..n).map(move |i| OutPort::new(id, i))
    }

    /// Nodes driving any input of `id`, in input order with duplicates.
    pub fn drivers_of(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes[id]
            .inputs
            .iter()
            .filter_map(|i| i.driver.map(|d| d.node))
            .collect()
    }

    /// Nodes using any output of `id`, in output order with duplicates.
    pub fn users_of(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes[id]
            .outputs
            .iter()
            .flat_map(|o| o.users.iter().map(|u| u.node))
            .collect()
    }

    pub fn has_users(&self, id: NodeId) -> bool {
        self.nodes[id].outputs.iter().any(|o| !o.users.is_empty())
    }

    pub fn connect(&mut self, src: OutPort, dst: InPort) {
        let input = &mut self.nodes[dst.node].inputs[dst.idx as usize];
        assert!(input.driver.is_none(), "{dst} is already driven");
        input.driver = Some(src);
        self.nodes[src.node].outputs[src.idx as usize].users.push(dst);
    }

    /// Remove the edge ending at `dst` and return its former driver.
    pub fn disconnect(&mut self, dst: InPort) -> Option<OutPort> {
        let src =
            self.nodes[dst.node].inputs[dst.idx as usize].driver.take()?;
        self.nodes[src.node].outputs[src.idx as usize]
            .users
            .retain(|u| *u != dst);
        Some(src)
    }

    pub fn reconnect(&mut self, dst: InPort, src: OutPort) {
        self.disconnect(dst);
        self.connect(src, dst);
    }

    /// Redirect every user of `old` to `new`.
    pub fn replace_all_uses(&mut self, old: OutPort, new: OutPort) {
        if old == new {
            return;
        }
        let users = std::mem::take(
            &mut self.nodes[old.node].outputs[old.idx as usize].users,
        );
        for u in users {
            self.nodes[u.node].inputs[u.idx as usize].driver = Some(new);
            self.nodes[new.node].outputs[new.idx as usize].users.push(u);
        }
    }

    /// Delete an input port. Later inputs are shifted down by one. Removing
    /// a boundary input of an aggregate also removes its proxy, which must
    /// be unused.
    pub fn remove_input(&mut self, dst: InPort) {
        self.disconnect(dst);
        let id = dst.node;
        let cnt = self.nodes[id].inputs.len() as u32;
        for j in (dst.idx + 1)..cnt {
            if let Some(d) = self.nodes[id].inputs[j as usize].driver {
                for u in
                    self.nodes[d.node].outputs[d.idx as usize].users.iter_mut()
                {
                    if *u == InPort::new(id, j) {
                        u.idx -= 1;
                    }
                }
            }
        }
        let proxy = self.nodes[id]
            .aggregate()
            .map(|agg| agg.port_in[dst.idx as usize]);
        self.nodes[id].inputs.remove(dst.idx as usize);
        self.nodes[id].on_input_removed(dst.idx);
        if let Some(proxy) = proxy {
            debug_assert!(!self.has_users(proxy), "removed proxy still used");
            self.remove_node(proxy);
        }
    }

    /// Delete an unused output port. Later outputs are shifted down by one.
    pub fn remove_output(&mut self, src: OutPort) {
        assert!(
            self.users(src).is_empty(),
            "cannot remove used output {src}"
        );
        let id = src.node;
        let cnt = self.nodes[id].outputs.len() as u32;
        for j in (src.idx + 1)..cnt {
            let users = self.nodes[id].outputs[j as usize].users.clone();
            for u in users {
                self.nodes[u.node].inputs[u.idx as usize].driver =
                    Some(OutPort::new(id, j - 1));
            }
        }
        let proxy = self.nodes[id]
            .aggregate()
            .map(|agg| agg.port_out[src.idx as usize]);
        self.nodes[id].outputs.remove(src.idx as usize);
        self.nodes[id].on_output_removed(src.idx);
        if let Some(proxy) = proxy {
            self.remove_node(proxy);
        }
    }

    /// Mark a node and everything it owns as removed and disconnect their
    /// inputs. The node stays in the arena and in the scope lists until
    /// [NetlistCtx::filter_removed] is called.
    pub fn remove_node(&mut self, id: NodeId) {
        let mut subtree = vec![id];
        let mut i = 0;
        while i < subtree.len() {
            if let Some(agg) = self.nodes[subtree[i]].aggregate() {
                subtree.extend(agg.scope());
            }
            i += 1;
        }
        for n in &subtree {
            for port in self.inputs_of(*n) {
                self.disconnect(port);
            }
        }
        for n in subtree {
            self.nodes[n].removed = true;
        }
    }

    /// Drop removed nodes from all scope lists.
    pub fn filter_removed(&mut self) {
        let removed: Vec<bool> =
            self.nodes.iter().map(|(_, n)| n.removed).collect();
        let is_removed = |id: &NodeId| removed[id.raw() as usize];
        log::debug!(
            "{}: dropping {} removed nodes",
            self.name,
            removed.iter().filter(|r| **r).count()
        );
        self.top.retain(|id| !is_removed(id));
        for id in self.nodes.keys() {
            if removed[id.raw() as usize] {
                continue;
            }
            if let Some(agg) = self.nodes[id].aggregate_mut() {
                agg.sub_nodes.retain(|id| !is_removed(id));
            }
        }
    }

    // ---------------------------------------------------------------------
    // Timing

    /// Width of the data a node processes, used to query the platform.
    pub fn data_width(&self, id: NodeId) -> u32 {
        let node = &self.nodes[id];
        let max_out = node.outputs.iter().map(|o| o.ty.width()).max();
        match &node.kind {
            NodeKind::Write(io) => io
                .ports
                .data_in
                .map(|i| self.in_ty(InPort::new(id, i)).width())
                .unwrap_or(0),
            NodeKind::Operator(op) if op.is_comparison() => {
                self.in_ty(InPort::new(id, 0)).width()
            }
            NodeKind::Read(io) => io
                .ports
                .data_out
                .map(|o| node.outputs[o as usize].ty.width())
                .unwrap_or(0),
            _ => max_out.unwrap_or(0),
        }
    }

    /// Assign the platform default realization unless the node already has
    /// one.
    pub fn resolve_realization(&mut self, id: NodeId) {
        if self.nodes[id].realization.is_some() {
            return;
        }
        let width = self.data_width(id);
        let r = default_realization(
            &self.nodes[id],
            width,
            self.platform.as_ref(),
            self.clk_period,
        );
        self.nodes[id].realization = Some(r);
    }

    pub fn realization(&self, id: NodeId) -> Option<&Realization> {
        self.nodes[id].realization.as_ref()
    }

    pub fn out_time(&self, port: OutPort) -> Option<SchedTime> {
        self.nodes[port.node]
            .sched
            .as_ref()
            .map(|s| s.outputs[port.idx as usize])
    }

    pub fn in_time(&self, port: InPort) -> Option<SchedTime> {
        self.nodes[port.node]
            .sched
            .as_ref()
            .map(|s| s.inputs[port.idx as usize])
    }

    pub fn zero_time(&self, id: NodeId) -> Option<SchedTime> {
        self.nodes[id].sched.as_ref().map(|s| s.zero)
    }

    /// Drop the schedule of a node and of everything it owns.
    pub fn reset_schedule(&mut self, id: NodeId) {
        self.nodes[id].sched = None;
        let children: Vec<NodeId> = match self.nodes[id].aggregate() {
            Some(agg) => agg.scope().collect(),
            None => return,
        };
        for c in children {
            self.reset_schedule(c);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::OpKind;

    fn op(ctx: &mut NetlistCtx, op: OpKind, ins: &[OutPort]) -> OutPort {
        let id = ctx.add_node(None, NodeKind::Operator(op), Parent::Netlist);
        for src in ins {
            let dst = ctx.add_input(id);
            ctx.connect(*src, dst);
        }
        ctx.add_output(id, HlsType::BIT)
    }

    fn konst(ctx: &mut NetlistCtx, v: u64) -> OutPort {
        let id = ctx.add_node(None, NodeKind::Const(v), Parent::Netlist);
        ctx.add_output(id, HlsType::BIT)
    }

    #[test]
    fn remove_input_shifts_users() {
        let mut ctx = NetlistCtx::new("t", 1000);
        let a = konst(&mut ctx, 0);
        let b = konst(&mut ctx, 1);
        let c = konst(&mut ctx, 1);
        let and = op(&mut ctx, OpKind::And, &[a, b, c]);
        ctx.remove_input(InPort::new(and.node, 0));
        assert_eq!(ctx.driver(InPort::new(and.node, 0)), Some(b));
        assert_eq!(ctx.driver(InPort::new(and.node, 1)), Some(c));
        assert_eq!(ctx.users(b), [InPort::new(and.node, 0)]);
        assert_eq!(ctx.users(c), [InPort::new(and.node, 1)]);
        assert!(ctx.users(a).is_empty());
    }

    #[test]
    fn generated_names_avoid_given_ones() {
        let mut ctx = NetlistCtx::new("t", 1000);
        let a = konst(&mut ctx, 0);
        ctx.set_name(a.node, "busy_n");
        assert_eq!(ctx.node(a.node).name.as_deref(), Some("busy_n"));
        assert_ne!(ctx.gen_name("busy_n"), "busy_n");
    }

    #[test]
    fn traced_scopes_are_indented() {
        let mut ctx = NetlistCtx::new("t", 1000);
        ctx.tracer = Tracer::capturing();
        let n = ctx.traced("outer", |ctx| {
            ctx.tracer.log(|| "a");
            ctx.traced("inner", |ctx| konst(ctx, 0)).node
        });
        ctx.tracer.log(|| "b");
        assert_eq!(ctx.tracer.lines(), ["outer", "  a", "  inner", "b"]);
        assert_eq!(ctx.node(n).const_value(), Some(0));
    }

    #[test]
    fn replace_uses_and_filter() {
        let mut ctx = NetlistCtx::new("t", 1000);
        let a = konst(&mut ctx, 0);
        let b = konst(&mut ctx, 1);
        let not = op(&mut ctx, OpKind::Not, &[a]);
        ctx.replace_all_uses(a, b);
        assert_eq!(ctx.driver(InPort::new(not.node, 0)), Some(b));
        ctx.remove_node(a.node);
        ctx.filter_removed();
        assert_eq!(ctx.top, vec![b.node, not.node]);
    }

    #[test]
    fn aggregate_ports_have_proxies() {
        let mut ctx = NetlistCtx::new("t", 1000);
        let agg =
            ctx.add_aggregate(None, AggregateKind::Generic, Parent::Netlist);
        let (i, pi) = ctx.add_aggregate_input(agg, HlsType::BIT);
        let (o, po) = ctx.add_aggregate_output(agg, HlsType::BIT);
        assert_eq!(ctx.input_proxy(i), pi);
        assert_eq!(ctx.output_proxy(o), po);
        assert_eq!(ctx.proxy_input_port(pi), Some(i));
        assert_eq!(ctx.proxy_output_port(po), Some(o));
        assert!(ctx.aggregate(agg).sub_nodes.is_empty());
        ctx.remove_input(i);
        assert!(ctx.is_removed(pi));
        assert!(ctx.aggregate(agg).port_in.is_empty());
    }
}
