//! Logging hooks and non-fatal event counters.
//!
//! The core never writes to stdout or stderr on its own. A frontend that
//! wants visibility installs a [`LogSink`] once per process; until then
//! the logging macros skip their formatting work entirely.

use std::fmt::Arguments;
use std::sync::OnceLock;

/// Severity of a core log record. The core only distinguishes routine
/// chatter from conditions a frontend probably wants surfaced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Trace,
    Warn,
}

/// Destination for log records produced inside the core.
pub trait LogSink: Send + Sync + 'static {
    fn log(&self, level: Level, component: &'static str, message: Arguments<'_>);
}

static SINK: OnceLock<Box<dyn LogSink>> = OnceLock::new();

/// Install the process-wide sink. A sink can only be installed once; a
/// second attempt hands the rejected sink back to the caller.
pub fn install_log_sink(sink: Box<dyn LogSink>) -> Result<(), Box<dyn LogSink>> {
    SINK.set(sink)
}

/// Cheap guard the logging macros check before building format arguments.
pub fn log_sink_installed() -> bool {
    SINK.get().is_some()
}

pub(crate) fn dispatch(level: Level, component: &'static str, message: Arguments<'_>) {
    if let Some(sink) = SINK.get() {
        sink.log(level, component, message);
    }
}

/// Tallies of non-fatal bus events. These never stop emulation; the bus
/// counts them so a frontend or test can inspect how often a ROM strays
/// off the implemented map.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counters {
    /// Writes into the 0x0000-0x7FFF ROM region, silently dropped.
    pub rom_writes_ignored: u64,
    /// Reads from external RAM or other unmapped space, served as 0xFF.
    pub open_bus_reads: u64,
    /// Writes to unimplemented or read-only I/O registers.
    pub unhandled_io_writes: u64,
}
