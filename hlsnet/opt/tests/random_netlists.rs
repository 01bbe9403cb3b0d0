//! Invariants of the pass pipeline on randomly generated data flow graphs.
use hlsnet_ir::{
    Builder, CheckOptions, HlsType, IoOptions, NetlistCtx, OpKind, OutPort,
    Parent, Printer, check_netlist,
};
use hlsnet_opt::pass_manager::PassManager;
use hlsnet_opt::passes::simplify;
use proptest::prelude::*;

/// Operation kind and two operand picks of one generated node.
type Step = (u8, usize, usize);

const OPS: [OpKind; 6] = [
    OpKind::And,
    OpKind::Or,
    OpKind::Xor,
    OpKind::Add,
    OpKind::Sub,
    OpKind::Not,
];

fn build(reads: usize, steps: &[Step], outs: usize) -> NetlistCtx {
    let mut ctx = NetlistCtx::new("random", 1000);
    let mut b = Builder::new(&mut ctx);
    let ty = HlsType::Bits(8);
    let mut pool: Vec<OutPort> = (0..reads)
        .filter_map(|i| {
            b.add_read(format!("in{i}"), ty, IoOptions::default()).data
        })
        .collect();
    for (op, x, y) in steps {
        let op = OPS[*op as usize % OPS.len()];
        let a = pool[x % pool.len()];
        let v = if op == OpKind::Not {
            b.add_op(op, ty, &[a])
        } else {
            b.add_op(op, ty, &[a, pool[y % pool.len()]])
        };
        pool.push(v);
    }
    for (i, v) in pool.iter().rev().take(outs).enumerate() {
        b.add_write(format!("out{i}"), Some(*v), IoOptions::default());
    }
    ctx
}

/// Read count, generated nodes and write count.
fn shapes() -> impl Strategy<Value = (usize, Vec<Step>, usize)> {
    let step = (any::<u8>(), any::<usize>(), any::<usize>());
    (1usize..4, prop::collection::vec(step, 1..20), 1usize..3)
}

fn run(ctx: &mut NetlistCtx, passes: &[&str]) {
    let pm = PassManager::default_passes().unwrap();
    let incl: Vec<String> = passes.iter().map(|p| p.to_string()).collect();
    pm.execute_plan(ctx, &incl, &[], false).unwrap();
}

const CHECK_SCHEDULED: CheckOptions = CheckOptions {
    causality: true,
    scheduled: true,
};

#[test]
fn split_bitwise_clusters_keep_edges_in_scope() {
    // n1 = n0 | n0, n2 = n0 - n1, n3 = n2 ^ n2, n4 = n1 ^ n0, n5 = n3 | n4.
    // The bitwise component {n1, n3, n4, n5} is split in two parts and the
    // second one is driven by the first.
    let steps = [(1, 0, 0), (4, 0, 1), (2, 2, 2), (2, 1, 0), (1, 3, 4)];
    let mut ctx = build(1, &steps, 1);
    run(&mut ctx, &["pre-schedule"]);
    check_netlist(&ctx, CheckOptions::default()).unwrap();
    run(&mut ctx, &["schedule"]);
    check_netlist(&ctx, CHECK_SCHEDULED).unwrap();
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn schedule_is_causal((reads, steps, outs) in shapes()) {
        let mut ctx = build(reads, &steps, outs);
        run(&mut ctx, &["pre-schedule", "schedule"]);
        prop_assert!(check_netlist(&ctx, CHECK_SCHEDULED).is_ok());
    }

    #[test]
    fn architecture_elements_own_every_node((reads, steps, outs) in shapes()) {
        let mut ctx = build(reads, &steps, outs);
        let original = ctx.all_nodes_recursive();
        run(&mut ctx, &["pre-schedule", "schedule", "arch-aggregate"]);
        for n in original {
            let Parent::Aggregate(agg) = ctx.parent(n) else {
                return Err(TestCaseError::fail(format!("{n} is top level")));
            };
            prop_assert!(ctx.aggregate(agg).kind.is_arch_element());
            prop_assert_eq!(ctx.parent(agg), Parent::Netlist);
        }
        prop_assert!(check_netlist(&ctx, CHECK_SCHEDULED).is_ok());
    }

    #[test]
    fn lowering_keeps_schedule_consistent((reads, steps, outs) in shapes()) {
        let mut ctx = build(reads, &steps, outs);
        run(&mut ctx, &["all"]);
        prop_assert!(check_netlist(&ctx, CHECK_SCHEDULED).is_ok());
    }

    #[test]
    fn simplification_is_idempotent((reads, steps, outs) in shapes()) {
        let mut ctx = build(reads, &steps, outs);
        simplify(&mut ctx).unwrap();
        let once = Printer::netlist_to_string(&ctx);
        simplify(&mut ctx).unwrap();
        prop_assert_eq!(Printer::netlist_to_string(&ctx), once);
    }
}
