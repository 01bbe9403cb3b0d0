//! Timing records attached to the nodes.
use crate::{IoKind, Node, NodeKind, Platform};
use hlsnet_utils::SchedTime;

/// Resolved timing model of a node for a specific platform and clock.
///
/// `in_delay[i]` is the combinational delay from input `i` to the first
/// register, `in_cycles[i]` the number of clock cycles the input is
/// registered ahead. `out_delay[o]` is the delay from the last register to
/// output `o` and `out_cycles[o]` the number of pipeline registers in front
/// of it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Realization {
    pub in_delay: Vec<SchedTime>,
    pub in_cycles: Vec<i64>,
    pub out_delay: Vec<SchedTime>,
    pub out_cycles: Vec<i64>,
}

impl Realization {
    /// Zero delay pass-through with the given number of ports.
    pub fn zero(inputs: usize, outputs: usize) -> Self {
        Self::uniform(inputs, outputs, 0, 0, 0)
    }

    pub fn uniform(
        inputs: usize,
        outputs: usize,
        in_delay: SchedTime,
        out_delay: SchedTime,
        out_cycles: i64,
    ) -> Self {
        Self {
            in_delay: vec![in_delay; inputs],
            in_cycles: vec![0; inputs],
            out_delay: vec![out_delay; outputs],
            out_cycles: vec![out_cycles; outputs],
        }
    }

    /// Assert that the record matches the port counts of a node.
    pub fn fits(&self, inputs: usize, outputs: usize) -> bool {
        self.in_delay.len() == inputs
            && self.in_cycles.len() == inputs
            && self.out_delay.len() == outputs
            && self.out_cycles.len() == outputs
    }
}

/// Scheduled times of all ports of a node.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeSchedule {
    /// Reference time, inputs are scheduled before and outputs after it.
    pub zero: SchedTime,
    pub inputs: Vec<SchedTime>,
    pub outputs: Vec<SchedTime>,
}

impl NodeSchedule {
    /// All port times of a node which has no ports of its own timing.
    pub fn flat(zero: SchedTime, inputs: usize, outputs: usize) -> Self {
        Self {
            zero,
            inputs: vec![zero; inputs],
            outputs: vec![zero; outputs],
        }
    }

    pub fn shift(&mut self, offset: SchedTime) {
        self.zero += offset;
        self.inputs.iter_mut().for_each(|t| *t += offset);
        self.outputs.iter_mut().for_each(|t| *t += offset);
    }

    /// Earliest and latest port time.
    pub fn bounds(&self) -> (SchedTime, SchedTime) {
        self.inputs.iter().chain(&self.outputs).fold(
            (self.zero, self.zero),
            |(lo, hi), t| (lo.min(*t), hi.max(*t)),
        )
    }
}

/// Compute the default realization of a node from the platform oracle.
/// `width` is the width of the data processed by the node.
///
/// Aggregates get a zero-delay record, their timing is derived by the
/// scheduler from their content.
pub fn default_realization(
    node: &Node,
    width: u32,
    platform: &dyn Platform,
    clk_period: SchedTime,
) -> Realization {
    let ins = node.inputs.len();
    let outs = node.outputs.len();
    match &node.kind {
        NodeKind::Operator(op) => {
            let timing = platform.op_timing(*op, width, ins, clk_period);
            Realization::uniform(ins, outs, timing.delay, 0, timing.clk_cycles)
        }
        NodeKind::Read(_) => {
            let timing = platform.io_timing(IoKind::Read, width, clk_period);
            Realization::uniform(ins, outs, 0, timing.delay, timing.clk_cycles)
        }
        NodeKind::Write(_) => {
            let timing = platform.io_timing(IoKind::Write, width, clk_period);
            Realization::uniform(ins, outs, timing.delay, 0, timing.clk_cycles)
        }
        NodeKind::Const(_)
        | NodeKind::ExplicitSync(_)
        | NodeKind::LoopStatus(_)
        | NodeKind::PortIn
        | NodeKind::PortOut
        | NodeKind::Aggregate(_) => Realization::zero(ins, outs),
    }
}
