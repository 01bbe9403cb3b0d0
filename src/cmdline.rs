//! Command line parsing for the hlsnet driver.
use argh::FromArgs;
use hlsnet_utils::{
    Error, HlsResult, OutputFile, time::DEFAULT_RESOLUTION_PS,
};
use std::path::PathBuf;

#[derive(FromArgs, Debug)]
#[argh(help_triggers("-h", "--help"))]
/// Schedules a netlist and partitions it into pipelines and FSMs.
pub struct Opts {
    /// input netlist description (JSON)
    #[argh(positional)]
    pub file: Option<PathBuf>,

    /// output file, default is stdout
    #[argh(option, short = 'o', default = "OutputFile::Stdout")]
    pub output: OutputFile,

    /// execute this pass or alias, may be repeated (default: all)
    #[argh(option, short = 'p', long = "pass")]
    pub pass: Vec<String>,

    /// disable this pass or alias, may be repeated
    #[argh(option, short = 'd', long = "disable-pass")]
    pub disable_pass: Vec<String>,

    /// extra options for the passes, e.g. `-x aggregate-io-sync-scc:dump-dot`
    #[argh(option, short = 'x', long = "extra-opt")]
    pub extra_opts: Vec<String>,

    /// clock period in nanoseconds, overrides the input description
    #[argh(option, long = "clk-period-ns")]
    pub clk_period_ns: Option<f64>,

    /// length of one scheduler time unit in picoseconds
    #[argh(option, long = "resolution-ps", default = "DEFAULT_RESOLUTION_PS")]
    pub resolution_ps: u64,

    /// list all passes and aliases
    #[argh(switch, long = "list-passes")]
    pub list_passes: bool,

    /// print the netlist after every pass
    #[argh(switch, long = "dump-ir")]
    pub dump_ir: bool,

    /// logging level
    #[argh(option, long = "log-level", default = "log::LevelFilter::Warn")]
    pub log_level: log::LevelFilter,

    /// log every decision of the passes
    #[argh(switch, long = "trace")]
    pub trace: bool,
}

impl Opts {
    /// Parse the process arguments.
    pub fn get_opts() -> HlsResult<Self> {
        let mut opts: Opts = argh::from_env();

        if opts.pass.is_empty() {
            opts.pass.push("all".to_string());
        }
        if opts.file.is_none() && !opts.list_passes {
            return Err(Error::misc("No input netlist given"));
        }
        if opts.clk_period_ns.is_some_and(|ns| ns <= 0.0) {
            return Err(Error::misc("Clock period must be positive"));
        }
        if opts.resolution_ps == 0 {
            return Err(Error::misc("Resolution must be positive"));
        }

        Ok(opts)
    }
}
