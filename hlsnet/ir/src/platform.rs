//! Timing oracle of the target device.
use crate::OpKind;
use hlsnet_utils::{SchedTime, math::tree_levels};
use std::fmt::Debug;

/// Timing of one operation: combinational delay in front of the first
/// register and the number of registers on the path.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OpTiming {
    pub delay: SchedTime,
    pub clk_cycles: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IoKind {
    Read,
    Write,
}

/// Device specific timing model. All times are normalized scheduler units.
pub trait Platform: Debug {
    /// Timing of an operator of `width` bits with `input_cnt` operands.
    fn op_timing(
        &self,
        op: OpKind,
        width: u32,
        input_cnt: usize,
        clk_period: SchedTime,
    ) -> OpTiming;

    /// Timing of a read or a write of `width` bits.
    fn io_timing(
        &self,
        kind: IoKind,
        width: u32,
        clk_period: SchedTime,
    ) -> OpTiming;

    /// Setup time of a flip-flop, the minimal slack kept at the end of each
    /// clock window.
    fn ff_store_time(&self, clk_period: SchedTime) -> SchedTime;
}

/// Parametrized model of a LUT based device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AbstractPlatform {
    pub lut_delay: SchedTime,
    pub wire_delay: SchedTime,
    pub ff_store: SchedTime,
    pub carry_per_bit: SchedTime,
    pub mul_delay: SchedTime,
    pub io_delay: SchedTime,
    pub lut_inputs: usize,
}

impl Default for AbstractPlatform {
    fn default() -> Self {
        Self {
            lut_delay: 40,
            wire_delay: 20,
            ff_store: 10,
            carry_per_bit: 2,
            mul_delay: 300,
            io_delay: 50,
            lut_inputs: 6,
        }
    }
}

impl AbstractPlatform {
    fn lut_tree(&self, leaves: usize) -> SchedTime {
        let levels = tree_levels(leaves, self.lut_inputs).max(1);
        SchedTime::from(levels) * self.lut_delay + self.wire_delay
    }

    /// Split a long combinational path into pipeline stages which fit into
    /// the clock period.
    fn pipelined(&self, delay: SchedTime, clk_period: SchedTime) -> OpTiming {
        let budget = clk_period - self.ff_store;
        if budget <= 0 || delay < budget {
            return OpTiming {
                delay,
                clk_cycles: 0,
            };
        }
        OpTiming {
            delay: delay % budget,
            clk_cycles: delay / budget,
        }
    }
}

impl Platform for AbstractPlatform {
    fn op_timing(
        &self,
        op: OpKind,
        width: u32,
        input_cnt: usize,
        clk_period: SchedTime,
    ) -> OpTiming {
        let width = SchedTime::from(width.max(1));
        let delay = match op {
            OpKind::And | OpKind::Or | OpKind::Xor | OpKind::Not => {
                self.lut_tree(input_cnt)
            }
            OpKind::Mux => self.lut_tree(input_cnt),
            OpKind::Eq | OpKind::Ne => {
                self.lut_tree(2 * width as usize)
            }
            OpKind::Add | OpKind::Sub | OpKind::Ult | OpKind::Ule => {
                self.lut_delay + self.carry_per_bit * width + self.wire_delay
            }
            OpKind::Concat => 0,
            OpKind::Mul => {
                return self.pipelined(
                    self.mul_delay + self.wire_delay,
                    clk_period,
                );
            }
        };
        OpTiming {
            delay,
            clk_cycles: 0,
        }
    }

    fn io_timing(
        &self,
        _kind: IoKind,
        _width: u32,
        _clk_period: SchedTime,
    ) -> OpTiming {
        OpTiming {
            delay: self.io_delay,
            clk_cycles: 0,
        }
    }

    fn ff_store_time(&self, _clk_period: SchedTime) -> SchedTime {
        self.ff_store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitwise_delay_grows_with_fan_in() {
        let p = AbstractPlatform::default();
        let two = p.op_timing(OpKind::And, 1, 2, 1000).delay;
        let six = p.op_timing(OpKind::And, 1, 6, 1000).delay;
        let seven = p.op_timing(OpKind::And, 1, 7, 1000).delay;
        assert_eq!(two, 60);
        assert_eq!(two, six);
        assert_eq!(seven, 100);
        assert_eq!(p.op_timing(OpKind::Not, 1, 1, 1000).delay, 60);
    }

    #[test]
    fn long_multiplier_is_pipelined() {
        let p = AbstractPlatform::default();
        let t = p.op_timing(OpKind::Mul, 32, 2, 200);
        assert_eq!(t.clk_cycles, 1);
        assert!(t.delay < 200);
        let t = p.op_timing(OpKind::Mul, 32, 2, 1000);
        assert_eq!(t.clk_cycles, 0);
        assert_eq!(t.delay, 320);
    }
}
