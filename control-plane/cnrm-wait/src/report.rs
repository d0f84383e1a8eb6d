use std::io::{self, Write};
use std::time::Duration;

use cnrm_models::ResourceRef;
use tracing::warn;

use crate::error::WaitError;

/// ANSI escapes used for progress lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Palette {
    pub kind: &'static str,
    pub name: &'static str,
    pub reason: &'static str,
    pub reset: &'static str,
}

impl Palette {
    pub const ANSI: Palette = Palette {
        kind: "\x1b[34m",
        name: "\x1b[37m",
        reason: "\x1b[31m",
        reset: "\x1b[0m",
    };

    pub const PLAIN: Palette = Palette {
        kind: "",
        name: "",
        reason: "",
        reset: "",
    };

    pub fn for_color(color: bool) -> Self {
        if color { Self::ANSI } else { Self::PLAIN }
    }
}

/// Writes one line per readiness transition: `[kind] name reason`.
pub struct ProgressPrinter {
    out: Box<dyn Write + Send>,
    palette: Palette,
}

impl ProgressPrinter {
    pub fn new(out: Box<dyn Write + Send>, palette: Palette) -> Self {
        Self { out, palette }
    }

    pub fn stdout(color: bool) -> Self {
        Self::new(Box::new(io::stdout()), Palette::for_color(color))
    }

    /// Discards everything.
    pub fn sink() -> Self {
        Self::new(Box::new(io::sink()), Palette::PLAIN)
    }

    pub fn progress(&mut self, resource: &ResourceRef, reason: &str) {
        let p = self.palette;
        let res = writeln!(
            self.out,
            "{}[{}]{} {}{}{} {}{}{}",
            p.kind,
            resource.kind,
            p.reset,
            p.name,
            resource.name,
            p.reset,
            p.reason,
            reason,
            p.reset,
        )
        .and_then(|_| self.out.flush());
        if let Err(e) = res {
            warn!(error = %e, "failed to write progress line");
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceFailure {
    pub group: String,
    pub resource: ResourceRef,
    pub error: WaitError,
}

/// Outcome of one wait, consumed once after every watcher has finished.
#[derive(Debug, Clone, PartialEq)]
pub struct WaitReport {
    pub total: usize,
    pub remaining: usize,
    pub healthy: Vec<ResourceRef>,
    pub failures: Vec<ResourceFailure>,
    pub elapsed: Duration,
}

impl WaitReport {
    pub fn is_success(&self) -> bool {
        self.remaining == 0 && self.failures.is_empty()
    }

    /// One `name: message` line per failure.
    pub fn write_failures<W: Write>(&self, mut out: W) -> io::Result<()> {
        for f in &self.failures {
            writeln!(out, "{}: {}", f.resource.name, f.error)?;
        }
        Ok(())
    }
}
