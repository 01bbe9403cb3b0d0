//! Driver for the hlsnet scheduler.
use crate::cmdline::Opts;
use crate::frontend::{self, FrontendConf};
use hlsnet_ir::Printer;
use hlsnet_opt::pass_manager::PassManager;
use hlsnet_utils::{HlsResult, Tracer, trace::TRACE_TARGET};
use std::io::Write;

/// Run the scheduler from the command line.
pub fn run_compiler() -> HlsResult<()> {
    // parse the command line arguments into Opts struct
    let mut opts = Opts::get_opts()?;

    // enable tracing
    let mut logger = env_logger::Builder::new();
    logger
        .format_timestamp(None)
        .filter_level(opts.log_level)
        .target(env_logger::Target::Stderr);
    if opts.trace {
        logger.filter(Some(TRACE_TARGET), log::LevelFilter::Trace);
    }
    logger.init();

    let pm = PassManager::default_passes()?;

    // list all the available passes when --list-passes is enabled
    if opts.list_passes {
        println!("{}", pm.complete_help());
        return Ok(());
    }

    let conf = FrontendConf {
        clk_period_ns: opts.clk_period_ns,
        resolution_ps: opts.resolution_ps,
    };
    let Some(file) = &opts.file else {
        unreachable!("input file is checked by the option parser")
    };
    let mut ctx = frontend::load_netlist(file, &conf)?;
    // Extra options for the passes
    ctx.extra_opts = opts.extra_opts.drain(..).collect();
    if opts.trace {
        ctx.tracer = Tracer::enabled();
    }

    // Run all passes specified by the command line
    pm.execute_plan(&mut ctx, &opts.pass, &opts.disable_pass, opts.dump_ir)?;

    let out = &mut opts.output.get_write()?;
    Printer::write_netlist(&ctx, out)?;
    out.flush()?;
    Ok(())
}
