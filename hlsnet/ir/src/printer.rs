//! Implements a formatter for the in-memory representation of the netlist.
//! The printed output is meant for debugging, it cannot be parsed back.
use crate::{NetlistCtx, NodeId, NodeKind, Parent};
use itertools::Itertools;
use std::io;

/// Printer for the netlist.
pub struct Printer;

impl Printer {
    /// Format the whole netlist.
    pub fn write_netlist<F: io::Write>(
        ctx: &NetlistCtx,
        f: &mut F,
    ) -> io::Result<()> {
        writeln!(
            f,
            "netlist {} clk_period={} resolution={}ps {{",
            ctx.name, ctx.clk_period, ctx.resolution_ps
        )?;
        Self::write_scope(ctx, Parent::Netlist, 1, f)?;
        writeln!(f, "}}")
    }

    pub fn netlist_to_string(ctx: &NetlistCtx) -> String {
        let mut buf = Vec::new();
        // Writing into a Vec<u8> cannot fail.
        let _ = Self::write_netlist(ctx, &mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn write_scope<F: io::Write>(
        ctx: &NetlistCtx,
        scope: Parent,
        indent: usize,
        f: &mut F,
    ) -> io::Result<()> {
        for id in ctx.scope_nodes(scope) {
            Self::write_node(ctx, id, indent, f)?;
        }
        Ok(())
    }

    /// Format a single node. Aggregates are followed by their content.
    pub fn write_node<F: io::Write>(
        ctx: &NetlistCtx,
        id: NodeId,
        indent: usize,
        f: &mut F,
    ) -> io::Result<()> {
        let node = ctx.node(id);
        write!(f, "{}{} = {}", " ".repeat(indent * 2), id, ctx.repr(id))?;
        match &node.kind {
            NodeKind::Const(v) => write!(f, "({v})")?,
            NodeKind::Read(io) | NodeKind::Write(io) => {
                write!(f, "<{}", io.interface)?;
                if !io.blocking {
                    write!(f, ", nb")?;
                }
                write!(f, ">")?;
            }
            _ => (),
        }
        let ins = node
            .inputs
            .iter()
            .map(|i| match i.driver {
                Some(d) => d.to_string(),
                None => "_".to_string(),
            })
            .join(", ");
        let outs = node.outputs.iter().map(|o| o.ty.to_string()).join(", ");
        write!(f, " [{ins}] -> [{outs}]")?;
        if let Some(s) = &node.sched {
            write!(
                f,
                " @{} in({}) out({})",
                s.zero,
                s.inputs.iter().join(", "),
                s.outputs.iter().join(", ")
            )?;
        }
        if node.aggregate().is_some() {
            writeln!(f, " {{")?;
            Self::write_scope(ctx, Parent::Aggregate(id), indent + 1, f)?;
            writeln!(f, "{}}}", " ".repeat(indent * 2))
        } else {
            writeln!(f)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Builder, HlsType, OpKind};

    #[test]
    fn prints_nodes_and_edges() {
        let mut ctx = NetlistCtx::new("top", 1000);
        let mut b = Builder::new(&mut ctx);
        let c = b.add_const(1, HlsType::BIT);
        b.add_op(OpKind::Not, HlsType::BIT, &[c]);
        let out = Printer::netlist_to_string(&ctx);
        assert_eq!(
            out,
            "netlist top clk_period=1000 resolution=10ps {\n  \
             n0 = const(1) [] -> [b1]\n  \
             n1 = not [n0.o0] -> [b1]\n\
             }\n"
        );
    }
}
