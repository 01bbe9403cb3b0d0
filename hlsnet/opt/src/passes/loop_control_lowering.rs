use super::simplify;
use super::value_propagation::add_const;
use crate::scheduler::asap_generic;
use crate::traversal::{Named, Pass};
use hlsnet_ir::{
    Builder, HlsType, InPort, IoOptions, LoopStatus, NetlistCtx, NodeId,
    NodeKind, NodeSchedule, OpKind, OutPort, Parent, Realization,
};
use hlsnet_utils::{Error, HlsResult, SchedTime};

/// Replaces every loop status node by a `busy_n` backedge register and the
/// logic computing its next value.
///
/// | enter | exit | busy                                   | reset |
/// |-------|------|----------------------------------------|-------|
/// | no    | no   | constant 1                             |       |
/// | yes   | no   | `busy \| en`                           | 0     |
/// | yes   | yes  | `(en & !ex) \| (busy & !(ex & !en))`   | 0     |
/// | no    | yes  | `busy & !ex`                           | 1     |
///
/// The new nodes are scheduled into the clock window of the status node.
/// Users of the ordering token of the status node are ordered after its
/// own ordering predecessors instead.
#[derive(Default)]
pub struct LoopControlLowering;

impl Named for LoopControlLowering {
    fn name() -> &'static str {
        "loop-control-lowering"
    }

    fn description() -> &'static str {
        "lower loop status nodes to busy flag registers"
    }
}

/// Or of all `srcs`, `None` if there is none.
fn or_all(b: &mut Builder, srcs: &[OutPort]) -> Option<OutPort> {
    match srcs {
        [] => None,
        [single] => Some(*single),
        _ => Some(b.add_op(OpKind::Or, HlsType::BIT, srcs)),
    }
}

impl LoopControlLowering {
    fn role_drivers(
        ctx: &NetlistCtx,
        status: NodeId,
        roles: &[u32],
    ) -> HlsResult<Vec<OutPort>> {
        roles
            .iter()
            .map(|i| {
                ctx.driver(InPort::new(status, *i)).ok_or_else(|| {
                    Error::consistency(
                        format!("loop control input {i} is not driven"),
                        vec![ctx.desc(status)],
                    )
                })
            })
            .collect()
    }

    /// Drivers of the inputs which only order the status node.
    fn ordering_drivers(
        ctx: &NetlistCtx,
        status: NodeId,
        st: &LoopStatus,
    ) -> Vec<OutPort> {
        ctx.inputs_of(status)
            .filter(|i| {
                let idx = &i.idx;
                !st.enter.contains(idx)
                    && !st.reenter.contains(idx)
                    && !st.exit.contains(idx)
            })
            .filter_map(|i| ctx.driver(i))
            .collect()
    }

    /// Build the register and its next state logic. Returns the value
    /// replacing the busy flag and the nodes to schedule in order.
    fn build_busy(
        ctx: &mut NetlistCtx,
        parent: Parent,
        en: &[OutPort],
        ex: &[OutPort],
    ) -> (OutPort, Option<NodeId>, Vec<NodeId>) {
        if en.is_empty() && ex.is_empty() {
            let one = add_const(ctx, parent, 1, HlsType::BIT, None);
            return (one, None, vec![one.node]);
        }
        let init = if en.is_empty() { 1 } else { 0 };
        let name = ctx.gen_name("busy_n");
        let mut b = Builder::new(ctx).in_scope(parent);
        let ch = b.add_channel(name, HlsType::BIT, Some(init));
        let rd = b.add_channel_read(ch, IoOptions::default());
        let Some(busy) = rd.data else {
            unreachable!("busy flag channel carries one bit")
        };
        let en = or_all(&mut b, en);
        let ex = or_all(&mut b, ex);
        let next = match (en, ex) {
            (Some(en), None) => b.add_op(OpKind::Or, HlsType::BIT, &[busy, en]),
            (None, Some(ex)) => {
                let n_ex = b.add_op(OpKind::Not, HlsType::BIT, &[ex]);
                b.add_op(OpKind::And, HlsType::BIT, &[busy, n_ex])
            }
            (Some(en), Some(ex)) => {
                let n_ex = b.add_op(OpKind::Not, HlsType::BIT, &[ex]);
                let set = b.add_op(OpKind::And, HlsType::BIT, &[en, n_ex]);
                let n_en = b.add_op(OpKind::Not, HlsType::BIT, &[en]);
                let clear = b.add_op(OpKind::And, HlsType::BIT, &[ex, n_en]);
                let keep = b.add_op(OpKind::Not, HlsType::BIT, &[clear]);
                let hold = b.add_op(OpKind::And, HlsType::BIT, &[busy, keep]);
                b.add_op(OpKind::Or, HlsType::BIT, &[set, hold])
            }
            (None, None) => unreachable!("handled above"),
        };
        let wr = b.add_channel_write(ch, Some(next), IoOptions::default());
        // Everything created after the read, in creation order.
        let first = rd.node;
        let new: Vec<NodeId> = ctx
            .scope_list(parent)
            .iter()
            .copied()
            .filter(|n| *n > first && *n <= wr.node)
            .collect();
        (busy, Some(rd.node), new)
    }

    /// Redirect the users of the ordering token of `status`.
    fn reroute_ordering(
        ctx: &mut NetlistCtx,
        status: NodeId,
        preds: &[OutPort],
    ) {
        let token = OutPort::new(status, LoopStatus::ORDERING_OUT);
        let mut users = ctx.users(token).to_vec();
        users.sort();
        let parent = ctx.parent(status);
        for u in users.into_iter().rev() {
            let boundary = matches!(
                ctx.node(u.node).kind,
                NodeKind::PortOut | NodeKind::Aggregate(_)
            );
            match preds.split_first() {
                Some((first, rest)) => {
                    ctx.reconnect(u, *first);
                    if !boundary {
                        for p in rest {
                            let i = ctx.add_input(u.node);
                            ctx.connect(*p, i);
                        }
                    }
                }
                None if boundary => {
                    let t = ctx.out_time(token);
                    let void = add_const(ctx, parent, 0, HlsType::Void, t);
                    ctx.reconnect(u, void);
                }
                None => ctx.remove_input(u),
            }
        }
    }

    fn lower(ctx: &mut NetlistCtx, status: NodeId) -> HlsResult<()> {
        let NodeKind::LoopStatus(st) = ctx.node(status).kind.clone() else {
            return Ok(());
        };
        if st.reenter.is_empty() {
            return Err(Error::structural(
                "loop status without reenter inputs is not a loop",
                vec![ctx.desc(status)],
            ));
        }
        let en = Self::role_drivers(ctx, status, &st.enter)?;
        let ex = Self::role_drivers(ctx, status, &st.exit)?;
        let preds = Self::ordering_drivers(ctx, status, &st);
        let parent = ctx.parent(status);
        let ws: Option<SchedTime> =
            ctx.zero_time(status).map(|z| ctx.start_of_clk(z));

        let (busy, read, new) = Self::build_busy(ctx, parent, &en, &ex);
        if let Some(ws) = ws {
            if let Some(rd) = read {
                let outs = ctx.node(rd).outputs.len();
                let node = ctx.node_mut(rd);
                node.realization = Some(Realization::zero(0, outs));
                node.sched = Some(NodeSchedule::flat(ws, 0, outs));
            }
            for n in new {
                asap_generic(ctx, n, ws)?;
            }
        }
        ctx.tracer.log(|| {
            format!(
                "{status}: {} enter, {} exit inputs lowered to {busy}",
                en.len(),
                ex.len()
            )
        });

        ctx.replace_all_uses(OutPort::new(status, LoopStatus::BUSY_OUT), busy);
        Self::reroute_ordering(ctx, status, &preds);
        ctx.remove_node(status);
        Ok(())
    }
}

impl Pass for LoopControlLowering {
    fn run(&mut self, ctx: &mut NetlistCtx) -> HlsResult<()> {
        let mut statuses: Vec<NodeId> = ctx
            .all_nodes_recursive()
            .into_iter()
            .filter(|n| matches!(ctx.node(*n).kind, NodeKind::LoopStatus(_)))
            .collect();
        if statuses.is_empty() {
            return Ok(());
        }
        statuses.sort();
        for status in statuses {
            Self::lower(ctx, status)?;
        }
        simplify(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hlsnet_ir::WritePorts;
    use hlsnet_utils::ErrorKind;

    fn status_netlist(
        enter: bool,
        exit: bool,
    ) -> (NetlistCtx, NodeId, WritePorts) {
        let mut ctx = NetlistCtx::new("t", 1000);
        let mut b = Builder::new(&mut ctx);
        let a = b.add_read("a", HlsType::BIT, IoOptions::default());
        let r = b.add_read("r", HlsType::BIT, IoOptions::default());
        let e = b.add_read("e", HlsType::BIT, IoOptions::default());
        let en: Vec<OutPort> = a.data.filter(|_| enter).into_iter().collect();
        let ex: Vec<OutPort> = e.data.filter(|_| exit).into_iter().collect();
        let reenter = r.data.unwrap();
        let (status, busy) = b.add_loop_status(None, &en, &[reenter], &ex);
        let w = b.add_write("o", Some(busy), IoOptions::default());
        b.add_ordering(status, w.node);
        (ctx, status, w)
    }

    fn busy_channel(ctx: &NetlistCtx, w: &WritePorts) -> Option<u64> {
        let src = ctx.driver(InPort::new(w.node, 0))?;
        let ch = ctx.node(src.node).io()?.channel?;
        ctx.channel(ch).init
    }

    #[test]
    fn initial_busy_value_depends_on_the_controls() {
        let cases = [(true, false, 0), (true, true, 0), (false, true, 1)];
        for (enter, exit, init) in cases {
            let (mut ctx, status, w) = status_netlist(enter, exit);
            LoopControlLowering::do_pass_default(&mut ctx).unwrap();
            assert!(ctx.is_removed(status));
            assert_eq!(busy_channel(&ctx, &w), Some(init));
            // The ordering input of the write was removed with the status.
            assert_eq!(ctx.node(w.node).inputs.len(), 1);
        }
    }

    #[test]
    fn loop_without_controls_is_always_busy() {
        let (mut ctx, _, w) = status_netlist(false, false);
        LoopControlLowering::do_pass_default(&mut ctx).unwrap();
        let src = ctx.driver(InPort::new(w.node, 0)).unwrap();
        assert_eq!(ctx.node(src.node).const_value(), Some(1));
        assert!(ctx.channels.is_empty());
    }

    #[test]
    fn status_without_reenter_is_rejected() {
        let mut ctx = NetlistCtx::new("t", 1000);
        let mut b = Builder::new(&mut ctx);
        let a = b.add_read("a", HlsType::BIT, IoOptions::default());
        b.add_loop_status(None, &[a.data.unwrap()], &[], &[]);
        let err = LoopControlLowering::do_pass_default(&mut ctx).err();
        assert!(matches!(
            err.as_ref().map(|e| e.kind()),
            Some(ErrorKind::Structural { .. })
        ));
    }

    #[test]
    fn lowered_logic_stays_in_the_status_window() {
        let (mut ctx, status, _) = status_netlist(true, true);
        crate::scheduler::schedule(&mut ctx).unwrap();
        let window = ctx.clk_index(ctx.zero_time(status).unwrap());
        LoopControlLowering::do_pass_default(&mut ctx).unwrap();
        let ch = ctx.channels.iter().next().map(|(_, c)| c.clone()).unwrap();
        let rd = ch.read.unwrap();
        assert_eq!(ctx.clk_index(ctx.zero_time(rd).unwrap()), window);
        hlsnet_ir::check_netlist(
            &ctx,
            hlsnet_ir::CheckOptions {
                causality: true,
                scheduled: true,
            },
        )
        .unwrap();
    }
}
