//! Compile the netlist descriptions in `tests/netlists`.
use hlsnet::frontend::{FrontendConf, parse_netlist};
use hlsnet_ir::{
    AggregateKind, ArchKind, CheckOptions, NetlistCtx, NodeKind, Printer,
    check_netlist,
};
use hlsnet_opt::pass_manager::PassManager;

fn compile(src: &str, passes: &[&str]) -> NetlistCtx {
    let mut ctx = parse_netlist(src, &FrontendConf::default()).unwrap();
    let pm = PassManager::default_passes().unwrap();
    let incl: Vec<String> = passes.iter().map(|p| p.to_string()).collect();
    pm.execute_plan(&mut ctx, &incl, &[], false).unwrap();
    check_netlist(
        &ctx,
        CheckOptions {
            causality: true,
            scheduled: true,
        },
    )
    .unwrap();
    ctx
}

#[test]
fn mac_follows_the_given_partition() {
    let ctx = compile(include_str!("netlists/mac.json"), &["all"]);
    assert_eq!(ctx.top.len(), 1);
    let pipe = ctx.top[0];
    assert_eq!(ctx.node(pipe).name.as_deref(), Some("mac_pipe"));
    let agg = ctx.aggregate(pipe);
    assert_eq!(agg.kind, AggregateKind::Arch(ArchKind::Pipeline));
    assert_eq!(agg.clk_windows.len(), 2);
    assert!(agg.clk_windows[0] <= agg.clk_windows[1]);
}

#[test]
fn counter_loop_is_lowered() {
    let ctx = compile(include_str!("netlists/counter.json"), &["all"]);
    let statuses = ctx
        .all_nodes_recursive()
        .into_iter()
        .filter(|n| matches!(ctx.node(*n).kind, NodeKind::LoopStatus(_)))
        .count();
    assert_eq!(statuses, 0);
    assert!(ctx.find_by_name("i_rd").is_some());
    let text = Printer::netlist_to_string(&ctx);
    assert!(text.contains("busy_n"));
}

#[test]
fn single_passes_can_be_selected() {
    let ctx = compile(
        include_str!("netlists/mac.json"),
        &["consistency-check", "schedule"],
    );
    // Without architecture aggregation the nodes stay on the top level.
    assert_eq!(ctx.top.len(), 6);
}
