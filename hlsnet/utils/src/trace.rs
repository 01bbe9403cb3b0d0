//! Scoped trace sink used by the passes to report their decisions.

/// Log target used for every trace line.
pub const TRACE_TARGET: &str = "hlsnet::trace";

/// Hierarchical trace sink.
///
/// A disabled tracer never formats its messages. An enabled tracer forwards
/// one indented line per decision to the `log` facade and, when capturing,
/// keeps the lines so that tests can inspect them.
#[derive(Debug, Default, Clone)]
pub struct Tracer {
    enabled: bool,
    capture: bool,
    depth: usize,
    lines: Vec<String>,
}

impl Tracer {
    /// A tracer which forwards to the `log` facade.
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Default::default()
        }
    }

    /// A tracer which also records every line.
    pub fn capturing() -> Self {
        Self {
            enabled: true,
            capture: true,
            ..Default::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Emit one line at the current scope depth.
    pub fn log<F, S>(&mut self, msg: F)
    where
        F: FnOnce() -> S,
        S: AsRef<str>,
    {
        if !self.enabled {
            return;
        }
        let line = format!("{}{}", "  ".repeat(self.depth), msg().as_ref());
        log::trace!(target: TRACE_TARGET, "{line}");
        if self.capture {
            self.lines.push(line);
        }
    }

    /// Open a named scope, closed by [Tracer::leave]. Lines emitted inside
    /// are indented one level deeper than the scope header.
    pub fn enter(&mut self, name: &str) {
        self.log(|| name);
        self.depth += 1;
    }

    pub fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Lines recorded so far by a capturing tracer.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Drop recorded lines.
    pub fn take_lines(&mut self) -> Vec<String> {
        std::mem::take(&mut self.lines)
    }
}
