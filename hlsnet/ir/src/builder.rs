//! IR Builder. Provides convenience methods to construct nodes together
//! with their ports and role indices.
use crate::{
    AggregateKind, ChannelId, HlsType, IoNode, IoPorts, LoopStatus,
    NetlistCtx, NodeId, NodeKind, OpKind, OutPort, Parent, Realization,
    SyncNode,
};

/// Configuration of a read or a write.
#[derive(Clone, Debug)]
pub struct IoOptions {
    pub name: Option<String>,
    pub blocking: bool,
    pub extra_cond: Option<OutPort>,
    pub skip_when: Option<OutPort>,
}

impl Default for IoOptions {
    fn default() -> Self {
        Self {
            name: None,
            blocking: true,
            extra_cond: None,
            skip_when: None,
        }
    }
}

impl IoOptions {
    pub fn named<S: Into<String>>(name: S) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn non_blocking(mut self) -> Self {
        self.blocking = false;
        self
    }

    pub fn extra_cond(mut self, cond: OutPort) -> Self {
        self.extra_cond = Some(cond);
        self
    }

    pub fn skip_when(mut self, cond: OutPort) -> Self {
        self.skip_when = Some(cond);
        self
    }
}

/// Output ports of a read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadPorts {
    pub node: NodeId,
    pub data: Option<OutPort>,
    pub valid: OutPort,
    pub valid_nb: OutPort,
    pub ordering: OutPort,
}

/// Output ports of a write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WritePorts {
    pub node: NodeId,
    /// Ready of the write.
    pub valid: OutPort,
    pub valid_nb: OutPort,
    pub ordering: OutPort,
}

/// IR builder.
/// Nodes are added into `parent`, the top level of the netlist by default.
pub struct Builder<'a> {
    pub ctx: &'a mut NetlistCtx,
    parent: Parent,
}

impl<'a> Builder<'a> {
    pub fn new(ctx: &'a mut NetlistCtx) -> Self {
        Self {
            ctx,
            parent: Parent::Netlist,
        }
    }

    /// Add nodes into another scope.
    pub fn in_scope(mut self, parent: Parent) -> Self {
        self.parent = parent;
        self
    }

    pub fn parent(&self) -> Parent {
        self.parent
    }

    fn connect_all(&mut self, node: NodeId, srcs: &[OutPort]) {
        for src in srcs {
            let dst = self.ctx.add_input(node);
            self.ctx.connect(*src, dst);
        }
    }

    pub fn add_const(&mut self, value: u64, ty: HlsType) -> OutPort {
        let id = self.ctx.add_node(None, NodeKind::Const(value), self.parent);
        self.ctx.add_output(id, ty)
    }

    pub fn add_op(
        &mut self,
        op: OpKind,
        ty: HlsType,
        operands: &[OutPort],
    ) -> OutPort {
        self.add_named_op(None, op, ty, operands)
    }

    pub fn add_named_op(
        &mut self,
        name: Option<String>,
        op: OpKind,
        ty: HlsType,
        operands: &[OutPort],
    ) -> OutPort {
        if op == OpKind::Mux {
            assert!(operands.len() % 2 == 1, "mux needs an odd operand count");
        }
        let id = self.ctx.add_node(name, NodeKind::Operator(op), self.parent);
        self.connect_all(id, operands);
        self.ctx.add_output(id, ty)
    }

    fn io_inputs(&mut self, node: NodeId, opts: &IoOptions) -> IoPorts {
        let mut ports = IoPorts::default();
        if let Some(c) = opts.extra_cond {
            let i = self.ctx.add_input(node);
            self.ctx.connect(c, i);
            ports.extra_cond = Some(i.idx);
        }
        if let Some(c) = opts.skip_when {
            let i = self.ctx.add_input(node);
            self.ctx.connect(c, i);
            ports.skip_when = Some(i.idx);
        }
        ports
    }

    fn add_read_node(
        &mut self,
        interface: String,
        channel: Option<ChannelId>,
        ty: HlsType,
        opts: IoOptions,
    ) -> ReadPorts {
        let io = IoNode {
            interface,
            blocking: opts.blocking,
            channel,
            ports: IoPorts::default(),
        };
        let node =
            self.ctx
                .add_node(opts.name.clone(), NodeKind::Read(io), self.parent);
        let mut ports = self.io_inputs(node, &opts);
        let data = (!ty.is_void()).then(|| self.ctx.add_output(node, ty));
        let valid = self.ctx.add_output(node, HlsType::BIT);
        let valid_nb = self.ctx.add_output(node, HlsType::BIT);
        let ordering = self.ctx.add_output(node, HlsType::Void);
        ports.data_out = data.map(|d| d.idx);
        ports.valid = Some(valid.idx);
        ports.valid_nb = Some(valid_nb.idx);
        ports.ordering_out = Some(ordering.idx);
        if let NodeKind::Read(io) = &mut self.ctx.node_mut(node).kind {
            io.ports = ports;
        }
        ReadPorts {
            node,
            data,
            valid,
            valid_nb,
            ordering,
        }
    }

    fn add_write_node(
        &mut self,
        interface: String,
        channel: Option<ChannelId>,
        data: Option<OutPort>,
        opts: IoOptions,
    ) -> WritePorts {
        let io = IoNode {
            interface,
            blocking: opts.blocking,
            channel,
            ports: IoPorts::default(),
        };
        let node = self.ctx.add_node(
            opts.name.clone(),
            NodeKind::Write(io),
            self.parent,
        );
        let mut data_in = None;
        if let Some(d) = data {
            let i = self.ctx.add_input(node);
            self.ctx.connect(d, i);
            data_in = Some(i.idx);
        }
        let mut ports = self.io_inputs(node, &opts);
        ports.data_in = data_in;
        let valid = self.ctx.add_output(node, HlsType::BIT);
        let valid_nb = self.ctx.add_output(node, HlsType::BIT);
        let ordering = self.ctx.add_output(node, HlsType::Void);
        ports.valid = Some(valid.idx);
        ports.valid_nb = Some(valid_nb.idx);
        ports.ordering_out = Some(ordering.idx);
        if let NodeKind::Write(io) = &mut self.ctx.node_mut(node).kind {
            io.ports = ports;
        }
        WritePorts {
            node,
            valid,
            valid_nb,
            ordering,
        }
    }

    /// Read from an external interface.
    pub fn add_read<S: Into<String>>(
        &mut self,
        interface: S,
        ty: HlsType,
        opts: IoOptions,
    ) -> ReadPorts {
        self.add_read_node(interface.into(), None, ty, opts)
    }

    /// Write to an external interface.
    pub fn add_write<S: Into<String>>(
        &mut self,
        interface: S,
        data: Option<OutPort>,
        opts: IoOptions,
    ) -> WritePorts {
        self.add_write_node(interface.into(), None, data, opts)
    }

    pub fn add_channel<S: Into<String>>(
        &mut self,
        name: S,
        ty: HlsType,
        init: Option<u64>,
    ) -> ChannelId {
        self.ctx.add_channel(name, ty, init)
    }

    /// Read the current value of a backedge channel.
    pub fn add_channel_read(
        &mut self,
        ch: ChannelId,
        opts: IoOptions,
    ) -> ReadPorts {
        let channel = self.ctx.channel(ch);
        let (name, ty) = (channel.name.clone(), channel.ty);
        let ports = self.add_read_node(name, Some(ch), ty, opts);
        self.ctx.channels[ch].read = Some(ports.node);
        ports
    }

    /// Write the next value of a backedge channel.
    pub fn add_channel_write(
        &mut self,
        ch: ChannelId,
        data: Option<OutPort>,
        opts: IoOptions,
    ) -> WritePorts {
        let name = self.ctx.channel(ch).name.clone();
        let ports = self.add_write_node(name, Some(ch), data, opts);
        self.ctx.channels[ch].write = Some(ports.node);
        ports
    }

    /// Conditional pass-through of `data`. Returns the node and its data
    /// output.
    pub fn add_explicit_sync(
        &mut self,
        data: OutPort,
        associated_read: Option<NodeId>,
        opts: IoOptions,
    ) -> (NodeId, OutPort) {
        let ty = self.ctx.out_ty(data);
        let sync = SyncNode {
            associated_read,
            ports: IoPorts::default(),
        };
        let node = self.ctx.add_node(
            opts.name.clone(),
            NodeKind::ExplicitSync(sync),
            self.parent,
        );
        let i = self.ctx.add_input(node);
        self.ctx.connect(data, i);
        let mut ports = self.io_inputs(node, &opts);
        ports.data_in = Some(i.idx);
        let out = self.ctx.add_output(node, ty);
        ports.data_out = Some(out.idx);
        if let NodeKind::ExplicitSync(s) = &mut self.ctx.node_mut(node).kind {
            s.ports = ports;
        }
        (node, out)
    }

    /// Busy lock of a loop. Returns the node and its busy output.
    pub fn add_loop_status(
        &mut self,
        name: Option<String>,
        enter: &[OutPort],
        reenter: &[OutPort],
        exit: &[OutPort],
    ) -> (NodeId, OutPort) {
        let node = self.ctx.add_node(
            name,
            NodeKind::LoopStatus(LoopStatus::default()),
            self.parent,
        );
        let mut status = LoopStatus::default();
        for (srcs, roles) in [
            (enter, &mut status.enter),
            (reenter, &mut status.reenter),
            (exit, &mut status.exit),
        ] {
            for src in srcs {
                let i = self.ctx.add_input(node);
                self.ctx.connect(*src, i);
                roles.push(i.idx);
            }
        }
        let busy = self.ctx.add_output(node, HlsType::BIT);
        self.ctx.add_output(node, HlsType::Void);
        self.ctx.node_mut(node).kind = NodeKind::LoopStatus(status);
        (node, busy)
    }

    /// Order `to` after `from` using the ordering token of `from`.
    pub fn add_ordering(&mut self, from: NodeId, to: NodeId) {
        let ord = self.ctx.node(from).ordering_out().unwrap_or_else(|| {
            panic!("{} has no ordering output", self.ctx.repr(from))
        });
        let i = self.ctx.add_input(to);
        self.ctx.connect(crate::OutPort::new(from, ord), i);
    }

    /// Empty aggregate of the given kind.
    pub fn add_aggregate(
        &mut self,
        name: Option<String>,
        kind: AggregateKind,
    ) -> NodeId {
        self.ctx.add_aggregate(name, kind, self.parent)
    }

    /// Override the platform timing of a node.
    pub fn set_realization(&mut self, node: NodeId, r: Realization) {
        let n = self.ctx.node(node);
        assert!(
            r.fits(n.inputs.len(), n.outputs.len()),
            "realization does not match the ports of {}",
            self.ctx.repr(node)
        );
        self.ctx.node_mut(node).realization = Some(r);
    }
}
