//! Loader of JSON netlist descriptions.
//!
//! A description lists backedge channels, nodes and an optional
//! architecture partition:
//! ```json
//! {
//!   "name": "acc",
//!   "clk_period_ns": 5.0,
//!   "channels": [{ "name": "sum", "width": 8, "init": 0 }],
//!   "nodes": [
//!     { "name": "x", "kind": "read", "interface": "x", "width": 8 },
//!     { "name": "s", "kind": "channel_read", "channel": "sum" },
//!     { "name": "n", "kind": "op", "op": "add", "width": 8,
//!       "inputs": ["s", "x"] },
//!     { "name": "w", "kind": "channel_write", "channel": "sum",
//!       "data": "n" },
//!     { "name": "o", "kind": "write", "interface": "o", "data": "n" }
//!   ]
//! }
//! ```
//! Nodes refer to outputs of nodes listed before them. A reference is a
//! node name, optionally followed by `.` and an output index or one of the
//! roles `data`, `valid`, `valid_nb`, `ordering` and `busy`. A bare name
//! refers to the data output of I/O nodes and to output 0 otherwise.
use hlsnet_ir::{
    ArchPartition, Builder, ChannelId, FsmPartition, HlsType, IoOptions,
    LoopStatus, NetlistCtx, NodeId, NodeKind, OpKind, OutPort,
    PipelinePartition,
};
use hlsnet_utils::{Error, HlsResult, time};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Clock period used when neither the input nor the command line sets one.
pub const DEFAULT_CLK_PERIOD_NS: f64 = 10.0;

/// Settings of the loader which are not part of the description.
#[derive(Clone, Debug)]
pub struct FrontendConf {
    /// Overrides the clock period of the description.
    pub clk_period_ns: Option<f64>,
    pub resolution_ps: u64,
}

impl Default for FrontendConf {
    fn default() -> Self {
        Self {
            clk_period_ns: None,
            resolution_ps: time::DEFAULT_RESOLUTION_PS,
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct NetlistDesc {
    pub name: String,
    #[serde(default)]
    pub clk_period_ns: Option<f64>,
    #[serde(default)]
    pub channels: Vec<ChannelDesc>,
    pub nodes: Vec<NodeEntry>,
    /// Extra ordering edges, `[from, to]` by node name.
    #[serde(default)]
    pub ordering: Vec<(String, String)>,
    #[serde(default)]
    pub partition: Option<PartitionDesc>,
}

#[derive(Deserialize, Debug)]
pub struct ChannelDesc {
    pub name: String,
    pub width: u32,
    #[serde(default)]
    pub init: Option<u64>,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Const,
    Op,
    Read,
    Write,
    ChannelRead,
    ChannelWrite,
    ExplicitSync,
    LoopStatus,
}

/// One node. Which fields are required depends on the kind.
#[derive(Deserialize, Debug)]
pub struct NodeEntry {
    pub name: String,
    pub kind: EntryKind,
    #[serde(default)]
    pub op: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub value: Option<u64>,
    #[serde(default)]
    pub interface: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub data: Option<String>,
    /// Read whose data an explicit sync node passes through.
    #[serde(default)]
    pub read: Option<String>,
    #[serde(default = "default_blocking")]
    pub blocking: bool,
    #[serde(default)]
    pub extra_cond: Option<String>,
    #[serde(default)]
    pub skip_when: Option<String>,
    #[serde(default)]
    pub enter: Vec<String>,
    #[serde(default)]
    pub reenter: Vec<String>,
    #[serde(default)]
    pub exit: Vec<String>,
}

fn default_blocking() -> bool {
    true
}

#[derive(Deserialize, Debug, Default)]
pub struct PartitionDesc {
    #[serde(default)]
    pub pipelines: Vec<ElementDesc>,
    #[serde(default)]
    pub fsms: Vec<ElementDesc>,
}

/// A pipeline (sets are stages) or an FSM (sets are states).
#[derive(Deserialize, Debug)]
pub struct ElementDesc {
    pub name: String,
    pub sets: Vec<Vec<String>>,
}

/// Read and build the netlist in `path`.
pub fn load_netlist(path: &Path, conf: &FrontendConf) -> HlsResult<NetlistCtx> {
    let src = std::fs::read_to_string(path).map_err(|e| {
        Error::misc(format!("Failed to read {}: {e}", path.display()))
    })?;
    parse_netlist(&src, conf)
}

/// Build the netlist described by the JSON text `src`.
pub fn parse_netlist(src: &str, conf: &FrontendConf) -> HlsResult<NetlistCtx> {
    let desc: NetlistDesc =
        serde_json::from_str(src).map_err(|e| Error::parse(e.to_string()))?;
    NetlistLoader::build(desc, conf)
}

fn missing(entry: &NodeEntry, field: &str) -> Error {
    Error::parse(format!(
        "{:?} node `{}' needs `{field}'",
        entry.kind, entry.name
    ))
}

struct NetlistLoader<'a> {
    b: Builder<'a>,
    names: HashMap<String, NodeId>,
    channels: HashMap<String, ChannelId>,
}

impl NetlistLoader<'_> {
    fn build(desc: NetlistDesc, conf: &FrontendConf) -> HlsResult<NetlistCtx> {
        let ns = conf
            .clk_period_ns
            .or(desc.clk_period_ns)
            .unwrap_or(DEFAULT_CLK_PERIOD_NS);
        let clk_period = time::normalize_ns(ns, conf.resolution_ps);
        if clk_period <= 0 {
            return Err(Error::parse(format!(
                "clock period of {ns}ns is below the resolution"
            )));
        }
        let mut ctx = NetlistCtx::new(desc.name, clk_period);
        ctx.resolution_ps = conf.resolution_ps;

        let mut loader = NetlistLoader {
            b: Builder::new(&mut ctx),
            names: HashMap::new(),
            channels: HashMap::new(),
        };
        for ch in &desc.channels {
            let ty = HlsType::Bits(ch.width);
            let id = loader.b.add_channel(&ch.name, ty, ch.init);
            if loader.channels.insert(ch.name.clone(), id).is_some() {
                return Err(Error::parse(format!(
                    "channel `{}' defined twice",
                    ch.name
                )));
            }
        }
        for entry in &desc.nodes {
            let id = loader.add_entry(entry)?;
            loader.b.ctx.set_name(id, entry.name.as_str());
            if loader.names.insert(entry.name.clone(), id).is_some() {
                return Err(Error::parse(format!(
                    "node `{}' defined twice",
                    entry.name
                )));
            }
        }
        for (from, to) in &desc.ordering {
            let (from, to) = (loader.node(from)?, loader.node(to)?);
            if loader.b.ctx.node(from).ordering_out().is_none() {
                return Err(Error::parse(format!(
                    "`{}' has no ordering output",
                    loader.b.ctx.repr(from)
                )));
            }
            loader.b.add_ordering(from, to);
        }
        let partition = desc
            .partition
            .map(|p| loader.partition(p))
            .transpose()?;

        ctx.partition = partition;
        log::debug!(
            "{}: {} nodes, {} channels, clock period {clk_period}",
            ctx.name,
            ctx.top.len(),
            desc.channels.len()
        );
        Ok(ctx)
    }

    fn node(&self, name: &str) -> HlsResult<NodeId> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| Error::parse(format!("unknown node `{name}'")))
    }

    /// Resolve a `name[.port]` reference.
    fn port(&self, reference: &str) -> HlsResult<OutPort> {
        let (name, port) = match reference.split_once('.') {
            Some((name, port)) => (name, Some(port)),
            None => (reference, None),
        };
        let id = self.node(name)?;
        let node = self.b.ctx.node(id);
        let roles = node.io_ports();
        let idx = match port {
            None | Some("data") => {
                roles.and_then(|r| r.data_out).or(Some(0))
            }
            Some("valid") => roles.and_then(|r| r.valid),
            Some("valid_nb") => roles.and_then(|r| r.valid_nb),
            Some("ordering") => node.ordering_out(),
            Some("busy") => match node.kind {
                NodeKind::LoopStatus(_) => Some(LoopStatus::BUSY_OUT),
                _ => None,
            },
            Some(other) => other.parse::<u32>().ok(),
        };
        match idx {
            Some(i) if (i as usize) < node.outputs.len() => {
                Ok(OutPort::new(id, i))
            }
            _ => Err(Error::parse(format!(
                "`{reference}' does not name an output"
            ))),
        }
    }

    fn ports(&self, references: &[String]) -> HlsResult<Vec<OutPort>> {
        references.iter().map(|r| self.port(r)).collect()
    }

    fn io_options(&self, entry: &NodeEntry) -> HlsResult<IoOptions> {
        let mut opts = IoOptions::named(&entry.name);
        opts.blocking = entry.blocking;
        if let Some(c) = &entry.extra_cond {
            opts = opts.extra_cond(self.port(c)?);
        }
        if let Some(s) = &entry.skip_when {
            opts = opts.skip_when(self.port(s)?);
        }
        Ok(opts)
    }

    /// Referenced data input of `entry`, if any.
    fn data(&self, entry: &NodeEntry) -> HlsResult<Option<OutPort>> {
        entry.data.as_deref().map(|d| self.port(d)).transpose()
    }

    fn channel(&self, entry: &NodeEntry) -> HlsResult<ChannelId> {
        let name = entry
            .channel
            .as_ref()
            .ok_or_else(|| missing(entry, "channel"))?;
        self.channels
            .get(name)
            .copied()
            .ok_or_else(|| Error::parse(format!("unknown channel `{name}'")))
    }

    fn add_entry(&mut self, entry: &NodeEntry) -> HlsResult<NodeId> {
        let ty = || {
            entry
                .width
                .map(HlsType::Bits)
                .ok_or_else(|| missing(entry, "width"))
        };
        let interface = || {
            entry
                .interface
                .clone()
                .ok_or_else(|| missing(entry, "interface"))
        };

        let id = match entry.kind {
            EntryKind::Const => {
                let value =
                    entry.value.ok_or_else(|| missing(entry, "value"))?;
                self.b.add_const(value, ty()?).node
            }
            EntryKind::Op => {
                let name =
                    entry.op.as_ref().ok_or_else(|| missing(entry, "op"))?;
                let op = OpKind::from_name(name).ok_or_else(|| {
                    Error::parse(format!("unknown operator `{name}'"))
                })?;
                let operands = self.ports(&entry.inputs)?;
                if op == OpKind::Mux && operands.len() % 2 != 1 {
                    return Err(Error::parse(format!(
                        "mux `{}' needs an odd number of inputs",
                        entry.name
                    )));
                }
                self.b.add_op(op, ty()?, &operands).node
            }
            EntryKind::Read => {
                let ty = entry.width.map_or(HlsType::Void, HlsType::Bits);
                let opts = self.io_options(entry)?;
                self.b.add_read(interface()?, ty, opts).node
            }
            EntryKind::Write => {
                let data = self.data(entry)?;
                let opts = self.io_options(entry)?;
                self.b.add_write(interface()?, data, opts).node
            }
            EntryKind::ChannelRead => {
                let ch = self.channel(entry)?;
                let opts = self.io_options(entry)?;
                self.b.add_channel_read(ch, opts).node
            }
            EntryKind::ChannelWrite => {
                let ch = self.channel(entry)?;
                let data = self.data(entry)?;
                let opts = self.io_options(entry)?;
                self.b.add_channel_write(ch, data, opts).node
            }
            EntryKind::ExplicitSync => {
                let data =
                    self.data(entry)?.ok_or_else(|| missing(entry, "data"))?;
                let read =
                    entry.read.as_deref().map(|r| self.node(r)).transpose()?;
                let opts = self.io_options(entry)?;
                self.b.add_explicit_sync(data, read, opts).0
            }
            EntryKind::LoopStatus => {
                let enter = self.ports(&entry.enter)?;
                let reenter = self.ports(&entry.reenter)?;
                let exit = self.ports(&entry.exit)?;
                let name = Some(entry.name.clone());
                self.b.add_loop_status(name, &enter, &reenter, &exit).0
            }
        };
        Ok(id)
    }

    fn node_sets(&self, sets: &[Vec<String>]) -> HlsResult<Vec<Vec<NodeId>>> {
        sets.iter()
            .map(|set| set.iter().map(|n| self.node(n)).collect())
            .collect()
    }

    fn partition(&self, desc: PartitionDesc) -> HlsResult<ArchPartition> {
        let pipelines = desc
            .pipelines
            .into_iter()
            .map(|p| {
                Ok(PipelinePartition {
                    stages: self.node_sets(&p.sets)?,
                    name: p.name,
                })
            })
            .collect::<HlsResult<_>>()?;
        let fsms = desc
            .fsms
            .into_iter()
            .map(|f| {
                Ok(FsmPartition {
                    states: self.node_sets(&f.sets)?,
                    name: f.name,
                })
            })
            .collect::<HlsResult<_>>()?;
        Ok(ArchPartition { pipelines, fsms })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACC: &str = r#"{
        "name": "acc",
        "clk_period_ns": 5.0,
        "channels": [{ "name": "sum", "width": 8, "init": 0 }],
        "nodes": [
            { "name": "x", "kind": "read", "interface": "x", "width": 8 },
            { "name": "s", "kind": "channel_read", "channel": "sum" },
            { "name": "n", "kind": "op", "op": "add", "width": 8,
              "inputs": ["s", "x.data"] },
            { "name": "w", "kind": "channel_write", "channel": "sum",
              "data": "n", "extra_cond": "x.valid" },
            { "name": "o", "kind": "write", "interface": "o", "data": "n" }
        ],
        "ordering": [["w", "o"]]
    }"#;

    #[test]
    fn description_is_built() {
        let ctx = parse_netlist(ACC, &FrontendConf::default()).unwrap();
        assert_eq!(ctx.clk_period, 500);
        assert_eq!(ctx.top.len(), 5);
        let n = ctx.find_by_name("n").unwrap();
        assert_eq!(ctx.node(n).op(), Some(OpKind::Add));
        let o = ctx.find_by_name("o").unwrap();
        // Data and the ordering edge.
        assert_eq!(ctx.node(o).inputs.len(), 2);
    }

    #[test]
    fn command_line_overrides_the_clock() {
        let conf = FrontendConf {
            clk_period_ns: Some(2.0),
            ..Default::default()
        };
        let ctx = parse_netlist(ACC, &conf).unwrap();
        assert_eq!(ctx.clk_period, 200);
    }

    #[test]
    fn unknown_reference_is_reported() {
        let src = r#"{
            "name": "bad",
            "nodes": [
                { "name": "o", "kind": "write", "interface": "o",
                  "data": "nope" }
            ]
        }"#;
        let err = parse_netlist(src, &FrontendConf::default()).unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn role_must_exist() {
        let src = r#"{
            "name": "bad",
            "nodes": [
                { "name": "c", "kind": "const", "value": 1, "width": 1 },
                { "name": "o", "kind": "write", "interface": "o",
                  "data": "c.valid" }
            ]
        }"#;
        assert!(parse_netlist(src, &FrontendConf::default()).is_err());
    }
}
