//! Structural invariants every transformation of the netlist must preserve.
use crate::{
    InPort, NetlistCtx, NodeId, NodeKind, OpKind, OutPort, Parent,
    ScopeGraph,
};
use hlsnet_utils::{Error, HlsResult};
use std::collections::HashSet;

/// Which groups of invariants to check.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CheckOptions {
    /// Require every output to be scheduled no later than its users.
    pub causality: bool,
    /// Require every live node to carry a schedule.
    pub scheduled: bool,
}

/// Run all structural checks on the netlist.
pub fn check_netlist(ctx: &NetlistCtx, opts: CheckOptions) -> HlsResult<()> {
    let live = check_hierarchy(ctx)?;
    for id in &live {
        check_ports(ctx, *id)?;
        check_node_shape(ctx, *id)?;
        if opts.scheduled && ctx.node(*id).sched.is_none() {
            return Err(Error::consistency(
                "node was not scheduled",
                vec![ctx.desc(*id)],
            ));
        }
        if opts.causality {
            check_causality(ctx, *id)?;
        }
    }
    check_acyclic(ctx, Parent::Netlist)?;
    for id in &live {
        if ctx.node(*id).aggregate().is_some() {
            check_acyclic(ctx, Parent::Aggregate(*id))?;
        }
    }
    Ok(())
}

/// Every live node is reachable through the hierarchy exactly once and its
/// parent pointer names the scope which lists it. Returns the live nodes.
fn check_hierarchy(ctx: &NetlistCtx) -> HlsResult<Vec<NodeId>> {
    let mut seen: HashSet<NodeId> = HashSet::new();
    let mut stack = vec![Parent::Netlist];
    let mut out = Vec::new();
    while let Some(scope) = stack.pop() {
        let listed: Vec<NodeId> = match scope {
            Parent::Netlist => ctx.top.clone(),
            Parent::Aggregate(a) => ctx.aggregate(a).scope().collect(),
        };
        for id in listed {
            let node = ctx.node(id);
            if node.removed {
                if let Parent::Aggregate(_) = scope {
                    if matches!(node.kind, NodeKind::PortIn | NodeKind::PortOut)
                    {
                        return Err(Error::consistency(
                            "removed boundary proxy still registered",
                            vec![ctx.desc(id)],
                        ));
                    }
                }
                continue;
            }
            if node.parent != scope {
                return Err(Error::consistency(
                    format!(
                        "parent pointer {:?} disagrees with the owning \
                         scope {scope:?}",
                        node.parent
                    ),
                    vec![ctx.desc(id)],
                ));
            }
            if !seen.insert(id) {
                return Err(Error::consistency(
                    "node listed more than once in the hierarchy",
                    vec![ctx.desc(id)],
                ));
            }
            if node.aggregate().is_some() {
                stack.push(Parent::Aggregate(id));
            }
            out.push(id);
        }
    }
    if let Some((id, _)) = ctx
        .nodes
        .iter()
        .find(|(id, n)| !n.removed && !seen.contains(id))
    {
        return Err(Error::consistency(
            "live node is not owned by any scope",
            vec![ctx.desc(id)],
        ));
    }
    out.sort();
    Ok(out)
}

/// Driver and user lists agree, no edge touches a removed node and both
/// ends of an edge share their scope.
fn check_ports(ctx: &NetlistCtx, id: NodeId) -> HlsResult<()> {
    let node = ctx.node(id);
    for (i, input) in node.inputs.iter().enumerate() {
        let dst = InPort::new(id, i as u32);
        let Some(src) = input.driver else {
            return Err(Error::consistency(
                format!("input {dst} is not driven"),
                vec![ctx.desc(id)],
            ));
        };
        let driver = ctx.node(src.node);
        if driver.removed {
            return Err(Error::consistency(
                format!("input {dst} driven by removed node"),
                ctx.descs([id, src.node]),
            ));
        }
        let valid_port = (src.idx as usize) < driver.outputs.len();
        if !valid_port || !ctx.users(src).contains(&dst) {
            return Err(Error::consistency(
                format!("{src} does not list {dst} as its user"),
                ctx.descs([id, src.node]),
            ));
        }
        if driver.parent != node.parent {
            return Err(Error::consistency(
                format!("edge {src} -> {dst} crosses a scope boundary"),
                ctx.descs([src.node, id]),
            ));
        }
    }
    for (o, output) in node.outputs.iter().enumerate() {
        let src = OutPort::new(id, o as u32);
        for u in &output.users {
            let user = ctx.node(u.node);
            if user.removed {
                return Err(Error::consistency(
                    format!("{src} used by removed node"),
                    ctx.descs([id, u.node]),
                ));
            }
            let driver =
                user.inputs.get(u.idx as usize).and_then(|i| i.driver);
            if driver != Some(src) {
                return Err(Error::consistency(
                    format!(
                        "{u} is listed as user of {src} but driven by \
                         {driver:?}"
                    ),
                    ctx.descs([id, u.node]),
                ));
            }
        }
    }
    Ok(())
}

/// Port counts required by the node kind.
fn check_node_shape(ctx: &NetlistCtx, id: NodeId) -> HlsResult<()> {
    let node = ctx.node(id);
    if node.op() == Some(OpKind::Mux)
        && (node.inputs.len() % 2 != 1 || node.outputs.len() != 1)
    {
        return Err(Error::consistency(
            format!(
                "mux needs an odd input count and one output, has {} \
                 inputs and {} outputs",
                node.inputs.len(),
                node.outputs.len()
            ),
            vec![ctx.desc(id)],
        ));
    }
    if let Some(r) = &node.realization {
        if !r.fits(node.inputs.len(), node.outputs.len()) {
            return Err(Error::consistency(
                "realization does not match the port count",
                vec![ctx.desc(id)],
            ));
        }
    }
    if let Some(s) = &node.sched {
        if s.inputs.len() != node.inputs.len()
            || s.outputs.len() != node.outputs.len()
        {
            return Err(Error::consistency(
                "schedule does not match the port count",
                vec![ctx.desc(id)],
            ));
        }
    }
    let Some(agg) = node.aggregate() else {
        return Ok(());
    };
    if agg.port_in.len() != node.inputs.len()
        || agg.port_out.len() != node.outputs.len()
    {
        return Err(Error::consistency(
            format!(
                "aggregate has {}/{} ports but {}/{} proxies",
                node.inputs.len(),
                node.outputs.len(),
                agg.port_in.len(),
                agg.port_out.len()
            ),
            vec![ctx.desc(id)],
        ));
    }
    for (i, proxy) in agg.port_in.iter().enumerate() {
        let outer = ctx.in_time(InPort::new(id, i as u32));
        let inner = ctx.out_time(OutPort::new(*proxy, 0));
        if outer.is_some() && inner.is_some() && outer != inner {
            return Err(Error::consistency(
                format!(
                    "input proxy time {inner:?} differs from port time \
                     {outer:?}"
                ),
                ctx.descs([id, *proxy]),
            ));
        }
    }
    for (o, proxy) in agg.port_out.iter().enumerate() {
        let outer = ctx.out_time(OutPort::new(id, o as u32));
        let inner = ctx.in_time(InPort::new(*proxy, 0));
        if outer.is_some() && inner.is_some() && outer != inner {
            return Err(Error::consistency(
                format!(
                    "output proxy time {inner:?} differs from port time \
                     {outer:?}"
                ),
                ctx.descs([id, *proxy]),
            ));
        }
    }
    Ok(())
}

fn check_causality(ctx: &NetlistCtx, id: NodeId) -> HlsResult<()> {
    for dst in ctx.inputs_of(id) {
        let Some(src) = ctx.driver(dst) else {
            continue;
        };
        let times = (ctx.in_time(dst), ctx.out_time(src));
        if let (Some(t_in), Some(t_out)) = times {
            if t_in < t_out {
                return Err(Error::consistency(
                    format!(
                        "{dst} scheduled at {t_in} before its driver {src} \
                         at {t_out}"
                    ),
                    ctx.descs([src.node, id]),
                ));
            }
        }
    }
    Ok(())
}

/// The dependency graph of one scope has no cycle.
pub fn check_acyclic(ctx: &NetlistCtx, scope: Parent) -> HlsResult<()> {
    let g = ScopeGraph::from_scope(ctx, scope);
    for scc in g.sccs() {
        let self_loop =
            scc.len() == 1 && ctx.drivers_of(scc[0]).contains(&scc[0]);
        if scc.len() > 1 || self_loop {
            return Err(Error::cycle(ctx.descs(g.cycle_through(scc[0]))));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Builder, HlsType};
    use hlsnet_utils::ErrorKind;

    #[test]
    fn detects_cycles() {
        let mut ctx = NetlistCtx::new("t", 1000);
        let mut b = Builder::new(&mut ctx);
        let c = b.add_const(1, HlsType::BIT);
        let a = b.add_op(OpKind::And, HlsType::BIT, &[c, c]);
        let n = b.add_op(OpKind::Not, HlsType::BIT, &[a]);
        ctx.reconnect(InPort::new(a.node, 1), n);
        let err = check_netlist(&ctx, CheckOptions::default()).unwrap_err();
        let ErrorKind::Cycle { path } = err.kind() else {
            panic!("expected a cycle, got {err}");
        };
        assert_eq!(path.first(), path.last());
        assert_eq!(path.len(), 3);
    }

    #[test]
    fn detects_one_sided_edges() {
        let mut ctx = NetlistCtx::new("t", 1000);
        let mut b = Builder::new(&mut ctx);
        let c = b.add_const(1, HlsType::BIT);
        let n = b.add_op(OpKind::Not, HlsType::BIT, &[c]);
        assert!(check_netlist(&ctx, CheckOptions::default()).is_ok());
        ctx.node_mut(c.node).outputs[0].users.clear();
        let err = check_netlist(&ctx, CheckOptions::default()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Consistency { .. }));
        assert!(err.to_string().contains(&n.node.raw().to_string()));
    }

    #[test]
    fn detects_malformed_mux() {
        let mut ctx = NetlistCtx::new("t", 1000);
        let mut b = Builder::new(&mut ctx);
        let c = b.add_const(1, HlsType::BIT);
        let m = b.add_op(OpKind::Mux, HlsType::BIT, &[c, c, c]);
        let i = ctx.add_input(m.node);
        ctx.connect(c, i);
        assert!(check_netlist(&ctx, CheckOptions::default()).is_err());
    }
}
