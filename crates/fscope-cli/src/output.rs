//! Plain-stdout render sink.

use std::io::Write;

use fscope_engine::RenderSink;

/// Writes status and command output to stdout, one line per call. `refresh`
/// just flushes; there is no windowing layer to repaint.
#[derive(Default)]
pub struct ConsoleSink;

impl RenderSink for ConsoleSink {
    fn line(&mut self, text: &str) {
        println!("{text}");
    }

    fn refresh(&mut self) {
        let _ = std::io::stdout().flush();
    }
}
