//! Node kinds of the HLS netlist.
use crate::{ChannelId, HlsType, NodeId, NodeSchedule, OutPort, Realization};
use smallvec::SmallVec;
use std::fmt;

/// Pure combinational operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum OpKind {
    And,
    Or,
    Xor,
    Not,
    Add,
    Sub,
    Mul,
    Eq,
    Ne,
    Ult,
    Ule,
    /// Inputs are `v0, c0, v1, c1, ..., vN`: the first value whose condition
    /// is set, `vN` otherwise.
    Mux,
    /// Concatenation, the first operand is the least significant part.
    Concat,
}

impl OpKind {
    pub const ALL: [OpKind; 13] = [
        OpKind::And,
        OpKind::Or,
        OpKind::Xor,
        OpKind::Not,
        OpKind::Add,
        OpKind::Sub,
        OpKind::Mul,
        OpKind::Eq,
        OpKind::Ne,
        OpKind::Ult,
        OpKind::Ule,
        OpKind::Mux,
        OpKind::Concat,
    ];

    /// Operators which are synthesized as a single LUT tree.
    pub fn is_bitwise(self) -> bool {
        matches!(self, OpKind::And | OpKind::Or | OpKind::Xor | OpKind::Not)
    }

    pub fn is_commutative(self) -> bool {
        matches!(
            self,
            OpKind::And
                | OpKind::Or
                | OpKind::Xor
                | OpKind::Add
                | OpKind::Mul
                | OpKind::Eq
                | OpKind::Ne
        )
    }

    /// Operators producing a single bit regardless of the operand width.
    pub fn is_comparison(self) -> bool {
        matches!(self, OpKind::Eq | OpKind::Ne | OpKind::Ult | OpKind::Ule)
    }

    pub fn name(self) -> &'static str {
        match self {
            OpKind::And => "and",
            OpKind::Or => "or",
            OpKind::Xor => "xor",
            OpKind::Not => "not",
            OpKind::Add => "add",
            OpKind::Sub => "sub",
            OpKind::Mul => "mul",
            OpKind::Eq => "eq",
            OpKind::Ne => "ne",
            OpKind::Ult => "ult",
            OpKind::Ule => "ule",
            OpKind::Mux => "mux",
            OpKind::Concat => "concat",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Indices of the role ports of I/O-like nodes. Ordering inputs are always
/// placed after all role inputs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IoPorts {
    /// Input: the operation happens only if this is 1.
    pub extra_cond: Option<u32>,
    /// Input: the operation is skipped (and does not block) if this is 1.
    pub skip_when: Option<u32>,
    /// Input: data written.
    pub data_in: Option<u32>,
    /// Output: data read.
    pub data_out: Option<u32>,
    /// Output: valid of a read, ready of a write.
    pub valid: Option<u32>,
    /// Output: non-blocking variant of `valid`.
    pub valid_nb: Option<u32>,
    /// Output: ordering token.
    pub ordering_out: Option<u32>,
}

impl IoPorts {
    fn on_input_removed(&mut self, idx: u32) {
        for p in [&mut self.extra_cond, &mut self.skip_when, &mut self.data_in]
        {
            shift_role(p, idx);
        }
    }

    fn on_output_removed(&mut self, idx: u32) {
        for p in [
            &mut self.data_out,
            &mut self.valid,
            &mut self.valid_nb,
            &mut self.ordering_out,
        ] {
            shift_role(p, idx);
        }
    }
}

fn shift_role(role: &mut Option<u32>, removed: u32) {
    match *role {
        Some(i) if i == removed => *role = None,
        Some(i) if i > removed => *role = Some(i - 1),
        _ => (),
    }
}

fn shift_role_list(roles: &mut Vec<u32>, removed: u32) {
    roles.retain(|i| *i != removed);
    for i in roles.iter_mut() {
        if *i > removed {
            *i -= 1;
        }
    }
}

/// Read or write of an interface or of a backedge channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IoNode {
    pub interface: String,
    /// A blocking operation stalls until the other side is ready.
    pub blocking: bool,
    /// Set for both ends of a backedge channel.
    pub channel: Option<ChannelId>,
    pub ports: IoPorts,
}

/// Conditional pass-through implementing optional reads.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncNode {
    pub associated_read: Option<NodeId>,
    pub ports: IoPorts,
}

/// Busy lock of a loop body. Output 0 is the busy flag, output 1 the
/// ordering token.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoopStatus {
    pub enter: Vec<u32>,
    pub reenter: Vec<u32>,
    pub exit: Vec<u32>,
}

impl LoopStatus {
    pub const BUSY_OUT: u32 = 0;
    pub const ORDERING_OUT: u32 = 1;
}

/// Kind of an architecture element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArchKind {
    Fsm,
    Pipeline,
}

/// Kind of a compound node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AggregateKind {
    Generic,
    /// Cluster of bitwise operators retimed as a single LUT tree.
    BitwiseOps,
    /// Synchronization coupled nodes which share one clock window.
    IoSyncScc,
    /// Body of a loop scheduled as a unit.
    Loop,
    /// Pipeline or FSM produced by architecture aggregation.
    Arch(ArchKind),
}

impl AggregateKind {
    pub fn is_arch_element(&self) -> bool {
        matches!(self, AggregateKind::Arch(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            AggregateKind::Generic => "aggregate",
            AggregateKind::BitwiseOps => "bitwise_ops",
            AggregateKind::IoSyncScc => "io_sync_scc",
            AggregateKind::Loop => "loop",
            AggregateKind::Arch(ArchKind::Fsm) => "arch_fsm",
            AggregateKind::Arch(ArchKind::Pipeline) => "arch_pipeline",
        }
    }
}

/// Compound node owning a sub-list of nodes. Every boundary input `i` has an
/// internal [NodeKind::PortIn] proxy `port_in[i]` and every boundary output
/// `o` an internal [NodeKind::PortOut] proxy `port_out[o]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Aggregate {
    pub kind: AggregateKind,
    pub sub_nodes: Vec<NodeId>,
    pub port_in: Vec<NodeId>,
    pub port_out: Vec<NodeId>,
    /// Clock indices of the states/stages of an architecture element.
    pub clk_windows: Vec<i64>,
}

impl Aggregate {
    pub fn new(kind: AggregateKind) -> Self {
        Self {
            kind,
            sub_nodes: Vec::new(),
            port_in: Vec::new(),
            port_out: Vec::new(),
            clk_windows: Vec::new(),
        }
    }

    /// Proxies and children in scheduling order.
    pub fn scope(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.port_in
            .iter()
            .chain(&self.sub_nodes)
            .chain(&self.port_out)
            .copied()
    }
}

/// Variants of the node capability set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Const(u64),
    Operator(OpKind),
    Read(IoNode),
    Write(IoNode),
    ExplicitSync(SyncNode),
    LoopStatus(LoopStatus),
    /// Boundary input proxy inside an aggregate.
    PortIn,
    /// Boundary output proxy inside an aggregate.
    PortOut,
    Aggregate(Box<Aggregate>),
}

/// Owner of a node in the containment hierarchy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Parent {
    Netlist,
    Aggregate(NodeId),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Input {
    pub driver: Option<OutPort>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Output {
    pub ty: HlsType,
    pub users: Vec<crate::InPort>,
}

/// A unit of computation or control.
#[derive(Clone, Debug)]
pub struct Node {
    pub name: Option<String>,
    pub kind: NodeKind,
    pub inputs: SmallVec<[Input; 4]>,
    pub outputs: SmallVec<[Output; 2]>,
    pub realization: Option<Realization>,
    pub sched: Option<NodeSchedule>,
    pub parent: Parent,
    pub removed: bool,
}

impl Node {
    pub(crate) fn new(
        name: Option<String>,
        kind: NodeKind,
        parent: Parent,
    ) -> Self {
        Self {
            name,
            kind,
            inputs: SmallVec::new(),
            outputs: SmallVec::new(),
            realization: None,
            sched: None,
            parent,
            removed: false,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            NodeKind::Const(_) => "const",
            NodeKind::Operator(op) => op.name(),
            NodeKind::Read(io) if io.channel.is_some() => "channel_read",
            NodeKind::Read(_) => "read",
            NodeKind::Write(io) if io.channel.is_some() => "channel_write",
            NodeKind::Write(_) => "write",
            NodeKind::ExplicitSync(_) => "explicit_sync",
            NodeKind::LoopStatus(_) => "loop_status",
            NodeKind::PortIn => "port_in",
            NodeKind::PortOut => "port_out",
            NodeKind::Aggregate(agg) => agg.kind.name(),
        }
    }

    pub fn op(&self) -> Option<OpKind> {
        match &self.kind {
            NodeKind::Operator(op) => Some(*op),
            _ => None,
        }
    }

    pub fn const_value(&self) -> Option<u64> {
        match &self.kind {
            NodeKind::Const(v) => Some(*v),
            _ => None,
        }
    }

    pub fn io(&self) -> Option<&IoNode> {
        match &self.kind {
            NodeKind::Read(io) | NodeKind::Write(io) => Some(io),
            _ => None,
        }
    }

    pub fn io_ports(&self) -> Option<&IoPorts> {
        match &self.kind {
            NodeKind::Read(io) | NodeKind::Write(io) => Some(&io.ports),
            NodeKind::ExplicitSync(s) => Some(&s.ports),
            _ => None,
        }
    }

    pub fn aggregate(&self) -> Option<&Aggregate> {
        match &self.kind {
            NodeKind::Aggregate(agg) => Some(agg),
            _ => None,
        }
    }

    pub fn aggregate_mut(&mut self) -> Option<&mut Aggregate> {
        match &mut self.kind {
            NodeKind::Aggregate(agg) => Some(agg),
            _ => None,
        }
    }

    pub fn is_read(&self) -> bool {
        matches!(self.kind, NodeKind::Read(_))
    }

    pub fn is_channel_io(&self) -> bool {
        self.io().is_some_and(|io| io.channel.is_some())
    }

    /// Nodes implementing conditional (optional, non-blocking) I/O and loop
    /// locks. Their reachable logic must share their clock window.
    pub fn is_explicit_sync(&self) -> bool {
        match &self.kind {
            NodeKind::ExplicitSync(_) | NodeKind::LoopStatus(_) => true,
            NodeKind::Read(io) | NodeKind::Write(io) => {
                !io.blocking
                    || io.ports.extra_cond.is_some()
                    || io.ports.skip_when.is_some()
            }
            _ => false,
        }
    }

    /// Nodes which must never be removed only because nothing uses them.
    pub fn has_side_effect(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Read(_)
                | NodeKind::Write(_)
                | NodeKind::LoopStatus(_)
                | NodeKind::ExplicitSync(_)
        )
    }

    pub fn ordering_out(&self) -> Option<u32> {
        match &self.kind {
            NodeKind::Read(io) | NodeKind::Write(io) => io.ports.ordering_out,
            NodeKind::LoopStatus(_) => Some(LoopStatus::ORDERING_OUT),
            _ => None,
        }
    }

    /// Fix role port indices after the removal of input `idx`.
    pub(crate) fn on_input_removed(&mut self, idx: u32) {
        match &mut self.kind {
            NodeKind::Read(io) | NodeKind::Write(io) => {
                io.ports.on_input_removed(idx)
            }
            NodeKind::ExplicitSync(s) => s.ports.on_input_removed(idx),
            NodeKind::LoopStatus(st) => {
                shift_role_list(&mut st.enter, idx);
                shift_role_list(&mut st.reenter, idx);
                shift_role_list(&mut st.exit, idx);
            }
            NodeKind::Aggregate(agg) => {
                agg.port_in.remove(idx as usize);
            }
            _ => (),
        }
        if let Some(r) = &mut self.realization {
            r.in_delay.remove(idx as usize);
            r.in_cycles.remove(idx as usize);
        }
        if let Some(s) = &mut self.sched {
            s.inputs.remove(idx as usize);
        }
    }

    /// Fix role port indices after the removal of output `idx`.
    pub(crate) fn on_output_removed(&mut self, idx: u32) {
        match &mut self.kind {
            NodeKind::Read(io) | NodeKind::Write(io) => {
                io.ports.on_output_removed(idx)
            }
            NodeKind::ExplicitSync(s) => s.ports.on_output_removed(idx),
            NodeKind::Aggregate(agg) => {
                agg.port_out.remove(idx as usize);
            }
            _ => (),
        }
        if let Some(r) = &mut self.realization {
            r.out_delay.remove(idx as usize);
            r.out_cycles.remove(idx as usize);
        }
        if let Some(s) = &mut self.sched {
            s.outputs.remove(idx as usize);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn op_names_round_trip() {
        for op in OpKind::ALL {
            assert_eq!(OpKind::from_name(op.name()), Some(op));
        }
        assert_eq!(OpKind::from_name("frobnicate"), None);
    }

    #[test]
    fn role_ports_shift_on_removal() {
        let mut ports = IoPorts {
            extra_cond: Some(0),
            skip_when: Some(1),
            data_in: Some(2),
            ..Default::default()
        };
        ports.on_input_removed(1);
        assert_eq!(ports.extra_cond, Some(0));
        assert_eq!(ports.skip_when, None);
        assert_eq!(ports.data_in, Some(1));
    }
}
