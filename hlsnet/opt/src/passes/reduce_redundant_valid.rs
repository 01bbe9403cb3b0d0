use super::value_propagation::add_const;
use super::{simplify, trace_source};
use crate::traversal::{Named, Pass};
use hlsnet_ir::{HlsType, InPort, NetlistCtx, NodeId, OpKind, OutPort};
use hlsnet_utils::{Error, HlsResult};

/// Removes the valid flag of backedge channel reads whose write is guarded
/// by the same flag.
///
/// A channel write with `extra_cond = read.valid` (or an `And` of it) and
/// `skip_when = !read.valid` (or an `And` of it) is performed exactly when
/// the read was valid, so the channel always holds a value after the first
/// write. The valid flags of the read are then constant: 1 if the channel
/// has a reset value, 0 otherwise.
#[derive(Default)]
pub struct ReduceRedundantValid;

impl Named for ReduceRedundantValid {
    fn name() -> &'static str {
        "reduce-redundant-valid"
    }

    fn description() -> &'static str {
        "replace valid flags of self guarded channel reads by constants"
    }
}

/// Operands of `src` if it is an `And`, `src` itself otherwise. Sources
/// are traced through aggregate boundaries.
fn and_operands(ctx: &NetlistCtx, src: OutPort) -> Vec<OutPort> {
    let src = trace_source(ctx, src);
    if ctx.node(src.node).op() != Some(OpKind::And) {
        return vec![src];
    }
    ctx.inputs_of(src.node)
        .filter_map(|i| ctx.driver(i))
        .map(|d| trace_source(ctx, d))
        .collect()
}

fn role_driver(
    ctx: &NetlistCtx,
    node: NodeId,
    role: Option<u32>,
) -> Option<OutPort> {
    ctx.driver(InPort::new(node, role?))
}

impl ReduceRedundantValid {
    /// The write is guarded by `valid` and skipped on its negation.
    fn is_guarded_by(
        ctx: &NetlistCtx,
        write: NodeId,
        valid: OutPort,
    ) -> HlsResult<bool> {
        let Some(ports) = ctx.node(write).io_ports() else {
            return Ok(false);
        };
        let (Some(cond), Some(skip)) = (
            role_driver(ctx, write, ports.extra_cond),
            role_driver(ctx, write, ports.skip_when),
        ) else {
            return Ok(false);
        };
        if !and_operands(ctx, cond).iter().all(|s| *s == valid) {
            return Ok(false);
        }

        let mut negations: Vec<NodeId> = Vec::new();
        for s in and_operands(ctx, skip) {
            let negates = ctx.node(s.node).op() == Some(OpKind::Not)
                && ctx
                    .driver(InPort::new(s.node, 0))
                    .is_some_and(|d| trace_source(ctx, d) == valid);
            if !negates {
                return Ok(false);
            }
            if !negations.contains(&s.node) {
                negations.push(s.node);
            }
        }
        if negations.len() > 1 {
            return Err(Error::consistency(
                "several negations of one valid flag survived \
                 simplification",
                ctx.descs(negations),
            ));
        }
        Ok(true)
    }

    /// Replace the valid flags of `read` by `value`.
    fn replace_valid(ctx: &mut NetlistCtx, read: NodeId, value: u64) {
        let Some(ports) = ctx.node(read).io_ports().cloned() else {
            return;
        };
        let parent = ctx.parent(read);
        for o in [ports.valid, ports.valid_nb].into_iter().flatten() {
            let out = OutPort::new(read, o);
            if ctx.users(out).is_empty() {
                continue;
            }
            let t = ctx.out_time(out);
            let c = add_const(ctx, parent, value, HlsType::BIT, t);
            ctx.replace_all_uses(out, c);
        }
    }
}

impl Pass for ReduceRedundantValid {
    fn run(&mut self, ctx: &mut NetlistCtx) -> HlsResult<()> {
        simplify(ctx)?;
        let channels: Vec<_> = ctx
            .channels
            .iter()
            .filter_map(|(_, ch)| Some((ch.read?, ch.write?, ch.init)))
            .collect();
        let mut changed = false;
        for (read, write, init) in channels {
            if ctx.is_removed(read) || ctx.is_removed(write) {
                continue;
            }
            let Some(valid) = ctx.node(read).io_ports().and_then(|p| p.valid)
            else {
                continue;
            };
            if !Self::is_guarded_by(ctx, write, OutPort::new(read, valid))? {
                continue;
            }
            let value = u64::from(init.is_some());
            ctx.tracer.log(|| format!("{read}: valid is constant {value}"));
            Self::replace_valid(ctx, read, value);
            changed = true;
        }
        if changed {
            simplify(ctx)?;
        }
        Ok(())
    }
}
