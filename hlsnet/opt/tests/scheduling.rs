//! End to end properties of the scheduler and of the clustering passes.
use hlsnet_ir::{
    AggregateKind, Builder, CheckOptions, HlsType, InPort, IoOptions,
    NetlistCtx, NodeId, NodeKind, OpKind, OutPort, Parent, Realization,
    check_netlist,
};
use hlsnet_opt::analysis::{ClusterSearch, disaggregate};
use hlsnet_opt::pass_manager::PassManager;
use hlsnet_opt::scheduler::{asap_generic, schedule};
use std::collections::BTreeSet;

const CHECK_SCHEDULED: CheckOptions = CheckOptions {
    causality: true,
    scheduled: true,
};

fn run(ctx: &mut NetlistCtx, passes: &[&str]) {
    let pm = PassManager::default_passes().unwrap();
    let incl: Vec<String> = passes.iter().map(|p| p.to_string()).collect();
    pm.execute_plan(ctx, &incl, &[], false).unwrap();
}

fn window(ctx: &NetlistCtx, id: NodeId) -> i64 {
    ctx.clk_index(ctx.zero_time(id).unwrap())
}

fn is_proxy(ctx: &NetlistCtx, id: NodeId) -> bool {
    matches!(ctx.node(id).kind, NodeKind::PortIn | NodeKind::PortOut)
}

#[test]
fn leaf_output_follows_its_latency() {
    let mut ctx = NetlistCtx::new("leaf", 1000);
    let mut b = Builder::new(&mut ctx);
    let c = b.add_const(1, HlsType::Bits(8));
    b.set_realization(c.node, Realization::uniform(0, 1, 0, 5, 0));
    asap_generic(&mut ctx, c.node, 0).unwrap();
    assert_eq!(ctx.out_time(c), Some(5));
}

#[test]
fn chain_longer_than_the_clock_is_split_at_the_boundary() {
    let mut ctx = NetlistCtx::new("snap", 1000);
    let mut b = Builder::new(&mut ctx);
    let ty = HlsType::Bits(8);
    let a = b.add_read("a", ty, IoOptions::default());
    let x = b.add_op(OpKind::Not, ty, &[a.data.unwrap()]);
    b.set_realization(x.node, Realization::uniform(1, 1, 600, 0, 0));
    let y = b.add_op(OpKind::Not, ty, &[x]);
    b.set_realization(y.node, Realization::uniform(1, 1, 600, 0, 0));
    b.add_write("o", Some(y), IoOptions::default());
    schedule(&mut ctx).unwrap();

    assert_eq!(window(&ctx, y.node), window(&ctx, x.node) + 1);
    // The input delay of the second operator lies inside its own window.
    let y_in = ctx.in_time(InPort::new(y.node, 0)).unwrap();
    assert_eq!(ctx.clk_index(y_in), window(&ctx, y.node));
    check_netlist(&ctx, CHECK_SCHEDULED).unwrap();
}

#[test]
fn delay_of_a_whole_clock_is_unschedulable() {
    let mut ctx = NetlistCtx::new("slow", 1000);
    let mut b = Builder::new(&mut ctx);
    let ty = HlsType::Bits(8);
    let a = b.add_read("a", ty, IoOptions::default());
    let x = b.add_op(OpKind::Not, ty, &[a.data.unwrap()]);
    b.set_realization(x.node, Realization::uniform(1, 1, 1000, 0, 0));
    b.add_write("o", Some(x), IoOptions::default());
    let err = schedule(&mut ctx).unwrap_err();
    assert!(err.is_timing_constraint());
}

#[test]
fn io_sync_clusters_stay_in_one_clock_window() {
    let mut ctx = NetlistCtx::new("scc", 1000);
    let mut b = Builder::new(&mut ctx);
    let nb = IoOptions::default().non_blocking();
    let a = b.add_read("a", HlsType::Bits(8), nb.clone());
    let c = b.add_read("c", HlsType::Bits(8), nb);
    let both = b.add_op(OpKind::And, HlsType::BIT, &[a.valid_nb, c.valid_nb]);
    let prod = b.add_op(
        OpKind::Mul,
        HlsType::Bits(8),
        &[a.data.unwrap(), c.data.unwrap()],
    );
    b.add_write("o", Some(prod), IoOptions::default().extra_cond(both));
    run(&mut ctx, &["pre-schedule", "schedule"]);
    check_netlist(&ctx, CHECK_SCHEDULED).unwrap();

    let clusters: Vec<NodeId> = ctx
        .all_nodes_recursive()
        .into_iter()
        .filter(|n| {
            ctx.node(*n)
                .aggregate()
                .is_some_and(|a| a.kind == AggregateKind::IoSyncScc)
        })
        .collect();
    assert!(!clusters.is_empty());
    for agg in clusters {
        let members: Vec<NodeId> = ctx
            .nodes_recursive(Parent::Aggregate(agg))
            .into_iter()
            .filter(|n| !is_proxy(&ctx, *n))
            .collect();
        let begin = members
            .iter()
            .map(|n| ctx.start_of_clk(ctx.zero_time(*n).unwrap()))
            .min()
            .unwrap();
        for n in members {
            let z = ctx.zero_time(n).unwrap();
            assert!(z >= begin && z < begin + ctx.clk_period, "{n} at {z}");
        }
    }
}

/// Every driven input of the live operation nodes.
fn wiring(ctx: &NetlistCtx) -> BTreeSet<(InPort, OutPort)> {
    ctx.all_nodes_recursive()
        .into_iter()
        .filter(|n| !is_proxy(ctx, *n) && ctx.node(*n).aggregate().is_none())
        .flat_map(|n| {
            ctx.inputs_of(n)
                .filter_map(|i| ctx.driver(i).map(|d| (i, d)))
                .collect::<Vec<_>>()
        })
        .collect()
}

#[test]
fn substitution_is_undone_by_disaggregation() {
    let mut ctx = NetlistCtx::new("round_trip", 1000);
    let mut b = Builder::new(&mut ctx);
    let ty = HlsType::Bits(8);
    let a = b.add_read("a", ty, IoOptions::default()).data.unwrap();
    let c = b.add_read("c", ty, IoOptions::default()).data.unwrap();
    let x = b.add_op(OpKind::And, ty, &[a, c]);
    let y = b.add_op(OpKind::Or, ty, &[x, a]);
    let z = b.add_op(OpKind::Xor, ty, &[x, y]);
    b.add_write("o", Some(y), IoOptions::default());
    b.add_write("p", Some(z), IoOptions::default());
    let before = wiring(&ctx);
    let top_before: BTreeSet<NodeId> = ctx.top.iter().copied().collect();

    let cs = ClusterSearch::discover_from_node_list(
        &ctx,
        &[x.node, y.node, z.node],
    );
    let agg = cs
        .substitute_with_node(&mut ctx, AggregateKind::Generic, None)
        .unwrap();
    assert_eq!(ctx.parent(x.node), Parent::Aggregate(agg));
    check_netlist(&ctx, CheckOptions::default()).unwrap();

    disaggregate(&mut ctx, agg).unwrap();
    ctx.filter_removed();
    assert_eq!(wiring(&ctx), before);
    let top_after: BTreeSet<NodeId> = ctx.top.iter().copied().collect();
    assert_eq!(top_after, top_before);
    check_netlist(&ctx, CheckOptions::default()).unwrap();
}

#[test]
fn every_node_ends_in_one_architecture_element() {
    let mut ctx = NetlistCtx::new("arch", 1000);
    let mut b = Builder::new(&mut ctx);
    let ty = HlsType::Bits(16);
    let a = b.add_read("a", ty, IoOptions::default()).data.unwrap();
    let c = b.add_read("c", ty, IoOptions::default()).data.unwrap();
    let p = b.add_op(OpKind::Mul, ty, &[a, c]);
    let q = b.add_op(OpKind::Mul, ty, &[p, a]);
    let s = b.add_op(OpKind::Add, ty, &[p, q]);
    b.add_write("o", Some(s), IoOptions::default());
    let original = ctx.all_nodes_recursive();
    run(&mut ctx, &["pre-schedule", "schedule", "arch-aggregate"]);

    for n in &ctx.top {
        let agg = ctx.node(*n).aggregate().unwrap();
        assert!(agg.kind.is_arch_element());
    }
    for n in original {
        let Parent::Aggregate(agg) = ctx.parent(n) else {
            panic!("{n} left outside of the architecture elements");
        };
        assert!(ctx.aggregate(agg).kind.is_arch_element());
        assert_eq!(ctx.parent(agg), Parent::Netlist);
    }
    check_netlist(&ctx, CHECK_SCHEDULED).unwrap();
}
