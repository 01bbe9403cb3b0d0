use crate::scheduler;
use crate::traversal::{Named, Pass};
use hlsnet_ir::{NetlistCtx, Parent};
use hlsnet_utils::HlsResult;

/// Schedules the netlist as soon as possible and compacts it as late as
/// possible afterwards. See [scheduler].
#[derive(Default)]
pub struct Schedule;

impl Named for Schedule {
    fn name() -> &'static str {
        "schedule"
    }

    fn description() -> &'static str {
        "assign a clock window and a time to every node"
    }
}

impl Pass for Schedule {
    fn run(&mut self, ctx: &mut NetlistCtx) -> HlsResult<()> {
        scheduler::schedule(ctx)?;
        let windows = ctx
            .all_nodes_recursive()
            .into_iter()
            .filter_map(|n| ctx.zero_time(n))
            .map(|z| ctx.clk_index(z))
            .max()
            .map_or(0, |w| w + 1);
        log::info!(
            "{}: {} top level nodes scheduled into {windows} clock windows",
            ctx.name,
            ctx.scope_nodes(Parent::Netlist).len()
        );
        Ok(())
    }
}
