//! The full pass pipeline on small designs.
use hlsnet_ir::{
    Builder, CheckOptions, HlsType, InPort, IoOptions, NetlistCtx, NodeId,
    NodeKind, OpKind, Printer, WritePorts, check_netlist,
};
use hlsnet_opt::pass_manager::PassManager;
use hlsnet_opt::passes::simplify;

fn run(ctx: &mut NetlistCtx, passes: &[&str]) {
    let pm = PassManager::default_passes().unwrap();
    let incl: Vec<String> = passes.iter().map(|p| p.to_string()).collect();
    pm.execute_plan(ctx, &incl, &[], false).unwrap();
}

fn observed(ctx: &NetlistCtx, w: &WritePorts) -> Option<u64> {
    let src = ctx.driver(InPort::new(w.node, 0))?;
    ctx.node(src.node).const_value()
}

/// `i = 0; while i < 10: i += 1` with the index on a backedge channel.
fn counter() -> (NetlistCtx, NodeId) {
    let mut ctx = NetlistCtx::new("counter", 1000);
    let mut b = Builder::new(&mut ctx);
    let ty = HlsType::Bits(8);
    let ch = b.add_channel("i", ty, Some(0));
    let rd = b.add_channel_read(ch, IoOptions::default());
    let one = b.add_const(1, ty);
    let ten = b.add_const(10, ty);
    let inc = b.add_op(OpKind::Add, ty, &[rd.data.unwrap(), one]);
    let more = b.add_op(OpKind::Ult, HlsType::BIT, &[inc, ten]);
    let done = b.add_op(OpKind::Not, HlsType::BIT, &[more]);
    b.add_channel_write(ch, Some(inc), IoOptions::default());
    let start = b.add_const(1, HlsType::BIT);
    let (status, busy) = b.add_loop_status(None, &[start], &[more], &[done]);
    b.add_write("busy", Some(busy), IoOptions::default());
    b.add_write("o", Some(inc), IoOptions::default().extra_cond(done));
    (ctx, status)
}

#[test]
fn counter_loop_compiles() {
    let (mut ctx, status) = counter();
    run(&mut ctx, &["all"]);
    assert!(ctx.is_removed(status));
    let statuses = ctx
        .all_nodes_recursive()
        .into_iter()
        .filter(|n| matches!(ctx.node(*n).kind, NodeKind::LoopStatus(_)))
        .count();
    assert_eq!(statuses, 0);
    // The index and the busy flag.
    assert_eq!(ctx.channels.iter().count(), 2);
    for n in &ctx.top {
        assert!(ctx.node(*n).aggregate().unwrap().kind.is_arch_element());
    }
    check_netlist(
        &ctx,
        CheckOptions {
            causality: true,
            scheduled: true,
        },
    )
    .unwrap();
}

#[test]
fn lowered_netlist_is_a_fixpoint_of_simplification() {
    let (mut ctx, _) = counter();
    run(&mut ctx, &["all"]);
    let before = Printer::netlist_to_string(&ctx);
    simplify(&mut ctx).unwrap();
    assert_eq!(Printer::netlist_to_string(&ctx), before);
}

/// A backedge channel written exactly when its read was valid.
fn self_guarded(init: Option<u64>) -> (NetlistCtx, WritePorts) {
    let mut ctx = NetlistCtx::new("guarded", 1000);
    let mut b = Builder::new(&mut ctx);
    let ch = b.add_channel("acc", HlsType::Bits(8), init);
    let rd = b.add_channel_read(ch, IoOptions::default().non_blocking());
    let x = b.add_read("x", HlsType::Bits(8), IoOptions::default());
    let sum = b.add_op(
        OpKind::Add,
        HlsType::Bits(8),
        &[rd.data.unwrap(), x.data.unwrap()],
    );
    let cond = b.add_op(OpKind::And, HlsType::BIT, &[rd.valid]);
    let n = b.add_op(OpKind::Not, HlsType::BIT, &[rd.valid]);
    let skip = b.add_op(OpKind::And, HlsType::BIT, &[n]);
    b.add_channel_write(
        ch,
        Some(sum),
        IoOptions::default().extra_cond(cond).skip_when(skip),
    );
    let w = b.add_write("valid", Some(rd.valid), IoOptions::default());
    (ctx, w)
}

#[test]
fn self_guarded_valid_becomes_constant() {
    for (init, value) in [(None, 0), (Some(7), 1)] {
        let (mut ctx, w) = self_guarded(init);
        run(&mut ctx, &["reduce-redundant-valid"]);
        assert_eq!(observed(&ctx, &w), Some(value));
    }
}

#[test]
fn self_guarded_valid_survives_scheduling() {
    let (mut ctx, w) = self_guarded(Some(7));
    run(&mut ctx, &["all"]);
    assert_eq!(observed(&ctx, &w), Some(1));
}
