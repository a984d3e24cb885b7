//! The session context and its collaborator interfaces.
//!
//! The historic editor kept this state in process-wide globals (current
//! type, device offset, last command line, change flags). Here it is one
//! explicit structure, created after a device is opened and passed to the
//! dispatcher and every handler.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::gate::SafetyGate;
use crate::history::NavigationHistory;
use crate::types::TypeId;

/// Write-only text sink for status and command output. The engine never
/// reads from it.
pub trait RenderSink {
    fn line(&mut self, text: &str);

    /// Explicit repaint hook; a plain-stdout sink has nothing to do.
    fn refresh(&mut self) {}
}

/// The device collaborator: a current byte offset plus synchronous reads
/// and writes. Offsets are `u64` throughout; the historic 2 GiB cap of the
/// original offset representation is a documented non-goal, not enforced.
/// Callers of `write_at` must pass the safety gate first.
pub trait MetaDevice {
    fn offset(&self) -> u64;
    fn set_offset(&mut self, offset: u64);
    fn mounted(&self) -> bool;
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()>;
    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()>;
}

/// A sink that collects lines in memory. Used by tests and by quiet script
/// runs.
#[derive(Default)]
pub struct MemorySink {
    pub lines: Vec<String>,
}

impl RenderSink for MemorySink {
    fn line(&mut self, text: &str) {
        self.lines.push(text.to_string());
    }
}

pub struct Session {
    pub sink: Box<dyn RenderSink>,
    pub device: Option<Box<dyn MetaDevice>>,
    /// The active structure kind, or `None` when no device is open.
    pub active: Option<TypeId>,
    /// Bytes of the structure currently being viewed.
    pub buffer: Vec<u8>,
    pub history: NavigationHistory,
    pub gate: SafetyGate,
    /// One-slot command cache: a bare Enter re-runs this line.
    pub last_command: String,
    /// Set asynchronously by the resize signal handler, consumed at the top
    /// of each loop iteration.
    pub redraw_pending: Arc<AtomicBool>,
}

impl Session {
    pub fn new(sink: Box<dyn RenderSink>, history_capacity: usize) -> Self {
        Self {
            sink,
            device: None,
            active: None,
            buffer: Vec::new(),
            history: NavigationHistory::new(history_capacity),
            gate: SafetyGate::new(),
            last_command: String::new(),
            redraw_pending: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Apply the one-slot cache: an empty input re-runs the last command;
    /// anything else becomes the new cache content. The returned line is
    /// what must be recorded (cache + external history) and dispatched.
    pub fn resolve_command_line(&mut self, raw: &str) -> String {
        let line = if raw.is_empty() {
            self.last_command.clone()
        } else {
            raw.to_string()
        };
        self.last_command = line.clone();
        line
    }

    /// Consume a pending redraw request, if any.
    pub fn take_redraw_request(&self) -> bool {
        self.redraw_pending.swap(false, Ordering::Relaxed)
    }

    /// Current device offset, 0 when no device is open.
    pub fn offset(&self) -> u64 {
        self.device.as_ref().map_or(0, |d| d.offset())
    }

    pub fn report(&mut self, text: &str) {
        self.sink.line(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_reuses_the_last_command() {
        let mut session = Session::new(Box::<MemorySink>::default(), 4);
        assert_eq!(session.resolve_command_line("show"), "show");
        assert_eq!(session.resolve_command_line(""), "show");
        assert_eq!(session.resolve_command_line("next"), "next");
        assert_eq!(session.last_command, "next");
    }

    #[test]
    fn empty_input_with_empty_cache_stays_empty() {
        let mut session = Session::new(Box::<MemorySink>::default(), 4);
        assert_eq!(session.resolve_command_line(""), "");
    }

    #[test]
    fn redraw_request_is_consumed_once() {
        let session = Session::new(Box::<MemorySink>::default(), 4);
        session.redraw_pending.store(true, Ordering::Relaxed);
        assert!(session.take_redraw_request());
        assert!(!session.take_redraw_request());
    }
}
