use super::{ConstructPass, Named};
use hlsnet_ir::NetlistCtx;
use hlsnet_utils::HlsResult;

/// A transformation or an analysis of the whole netlist.
pub trait Pass {
    /// Run the pass on the netlist.
    fn run(&mut self, ctx: &mut NetlistCtx) -> HlsResult<()>;

    /// Construct the pass from the context and run it. The pass decisions
    /// are traced inside a scope named after the pass.
    fn do_pass_default(ctx: &mut NetlistCtx) -> HlsResult<Self>
    where
        Self: ConstructPass + Named + Sized,
    {
        let mut pass = Self::from(ctx)?;
        ctx.traced(Self::name(), |ctx| pass.run(ctx))?;
        Ok(pass)
    }
}
