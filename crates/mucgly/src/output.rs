//! Output sinks and the output stack.
//!
//! An [`OutputSink`] is one output (a file or standard output) with a line
//! counter and a `blocked` flag; while a sink is blocked, bytes written to
//! it are silently dropped. Sinks are stacked in an [`OutputStack`] and all
//! writes go to the top sink, so pushing a sink fully diverts the stream
//! until it is closed again.

use crate::error::{Error, Result};
use std::io::Write;

/// Name given to the standard-output sink.
pub const STDOUT_NAME: &str = "<STDOUT>";

/// One output stream.
pub struct OutputSink {
    name: String,
    writer: Box<dyn Write>,
    lineno: usize,
    blocked: bool,
}

impl OutputSink {
    pub fn new<N: Into<String>>(name: N, writer: Box<dyn Write>) -> OutputSink {
        OutputSink {
            name: name.into(),
            writer,
            lineno: 0,
            blocked: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of newlines written so far, 0-based.
    pub fn line(&self) -> usize {
        self.lineno
    }

    pub fn blocked(&self) -> bool {
        self.blocked
    }

    pub fn set_blocked(&mut self, blocked: bool) {
        self.blocked = blocked;
    }

    /// Write one byte unless the sink is blocked.
    pub fn write_byte(&mut self, byte: u8, flush: bool) -> Result<()> {
        if self.blocked {
            return Ok(());
        }
        if byte == b'\n' {
            self.lineno += 1;
        }
        self.writer
            .write_all(&[byte])
            .map_err(|err| Error::fatal(None, format!("write error on \"{}\": {err}", self.name)))?;
        if flush {
            self.writer.flush().map_err(|err| {
                Error::fatal(None, format!("write error on \"{}\": {err}", self.name))
            })?;
        }
        Ok(())
    }
}

impl Drop for OutputSink {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

/// LIFO stack of output sinks; writes go to the top sink only.
pub struct OutputStack {
    sinks: Vec<OutputSink>,
}

impl OutputStack {
    pub fn new(initial: OutputSink) -> OutputStack {
        OutputStack {
            sinks: vec![initial],
        }
    }

    pub fn push(&mut self, sink: OutputSink) {
        self.sinks.push(sink);
    }

    /// Pop the top sink, flushing and closing it.
    pub fn pop(&mut self) -> Option<OutputSink> {
        self.sinks.pop()
    }

    pub fn top(&self) -> Option<&OutputSink> {
        self.sinks.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut OutputSink> {
        self.sinks.last_mut()
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}
