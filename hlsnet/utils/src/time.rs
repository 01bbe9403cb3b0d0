//! Normalized scheduler time.
//!
//! All times in the netlist are integers in units of the scheduler
//! resolution (10ps by default). Using integers keeps repeated shifts of the
//! schedule exact, which matters because most consistency checks compare
//! times for equality.

/// Time in normalized units.
pub type SchedTime = i64;

/// Default resolution of the scheduler: one unit is 10ps.
pub const DEFAULT_RESOLUTION_PS: u64 = 10;

/// Convert nanoseconds into normalized units of `resolution_ps`.
pub fn normalize_ns(ns: f64, resolution_ps: u64) -> SchedTime {
    assert!(resolution_ps > 0, "scheduler resolution must be positive");
    (ns * 1000.0 / resolution_ps as f64).round() as SchedTime
}

/// Convert a frequency in MHz to a normalized clock period.
pub fn clk_period_from_mhz(freq_mhz: f64, resolution_ps: u64) -> SchedTime {
    normalize_ns(1000.0 / freq_mhz, resolution_ps)
}

/// Index of the clock window which contains `time`.
pub fn clk_index(time: SchedTime, clk_period: SchedTime) -> i64 {
    time.div_euclid(clk_period)
}

/// Start of the clock window which contains `time`.
pub fn start_of_clk(time: SchedTime, clk_period: SchedTime) -> SchedTime {
    clk_index(time, clk_period) * clk_period
}

/// Start of the clock window after the one which contains `time`.
pub fn start_of_next_clk(time: SchedTime, clk_period: SchedTime) -> SchedTime {
    start_of_clk(time, clk_period) + clk_period
}

/// Last time which still belongs to the clock window of `time`.
pub fn end_of_clk(time: SchedTime, clk_period: SchedTime) -> SchedTime {
    start_of_next_clk(time, clk_period) - 1
}

/// Offset of `time` from the beginning of its clock window.
pub fn offset_in_clk(time: SchedTime, clk_period: SchedTime) -> SchedTime {
    time.rem_euclid(clk_period)
}
