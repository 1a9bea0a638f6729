//! Input sources and the input stack.
//!
//! An [`InputSource`] is one logical input (a file or standard input) read
//! one byte at a time. Each source tracks its line and column, owns its own
//! [`HookConfig`] and carries a push-back buffer used as a stack: bytes the
//! parser has read but not consumed are pushed back and re-read later. This
//! gives the parser unlimited lookahead while keeping position tracking
//! exact.
//!
//! Sources are stacked in an [`InputStack`]; the parser always reads from
//! the top. `:include` and the script host's `pushinput` push new sources,
//! and exhausted sources are popped automatically.

use crate::error::{Error, Location, Result};
use crate::hook::{HookConfig, HookPair};
use std::io;

/// Name given to the standard-input source.
pub const STDIN_NAME: &str = "<STDIN>";

/// One logical input with position tracking and a push-back buffer.
pub struct InputSource {
    name: String,
    reader: Box<dyn io::BufRead>,
    // Used as a stack: the last byte is the next byte to read.
    pushback: Vec<u8>,
    lineno: usize,
    column: usize,
    old_column: usize,
    macro_mark: Option<(usize, usize)>,
    eat_tail: bool,
    pub cfg: HookConfig,
    curhook: Vec<HookPair>,
}

impl InputSource {
    pub fn new<N: Into<String>>(
        name: N,
        reader: Box<dyn io::BufRead>,
        cfg: HookConfig,
    ) -> InputSource {
        InputSource {
            name: name.into(),
            reader,
            pushback: Vec::new(),
            lineno: 0,
            column: 0,
            old_column: 0,
            macro_mark: None,
            eat_tail: false,
            cfg,
            curhook: Vec::new(),
        }
    }

    /// Create a source reading from an in-memory byte string.
    pub fn from_bytes<N: Into<String>, C: Into<Vec<u8>>>(
        name: N,
        contents: C,
        cfg: HookConfig,
    ) -> InputSource {
        InputSource::new(name, Box::new(io::Cursor::new(contents.into())), cfg)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current line, 0-based.
    pub fn line(&self) -> usize {
        self.lineno
    }

    /// Current column, 0-based.
    pub fn column(&self) -> usize {
        self.column
    }

    /// Read one byte, from the push-back buffer if it is non-empty.
    ///
    /// Returns `None` at end of source; the source stays usable so that
    /// push-back after end of source remains legal.
    pub fn get(&mut self) -> Result<Option<u8>> {
        loop {
            let byte = match self.pushback.pop() {
                Some(byte) => Some(byte),
                None => self.read_raw()?,
            };
            if let Some(byte) = byte {
                if byte == b'\n' {
                    self.old_column = self.column;
                    self.lineno += 1;
                    self.column = 0;
                } else {
                    self.column += 1;
                }
            }
            if self.eat_tail {
                self.eat_tail = false;
                if byte.is_some() {
                    continue;
                }
            }
            return Ok(byte);
        }
    }

    /// Push back the byte just returned by [`get`](InputSource::get).
    ///
    /// The position returns to its pre-`get` value, including across a
    /// newline.
    pub fn put_back(&mut self, byte: u8) {
        if byte == b'\n' {
            self.lineno = self.lineno.saturating_sub(1);
            self.column = self.old_column;
            self.old_column = 0;
        } else {
            self.column = self.column.saturating_sub(1);
        }
        self.pushback.push(byte);
    }

    /// Record the current position as the start of a macro.
    pub fn mark_macro(&mut self) {
        self.macro_mark = Some((self.lineno, self.column));
    }

    pub fn unmark_macro(&mut self) {
        self.macro_mark = None;
    }

    /// Position used in diagnostics: the macro start while inside a macro,
    /// the current position otherwise.
    pub fn location(&self) -> Location {
        let (line, column) = self.macro_mark.unwrap_or((self.lineno, self.column));
        Location {
            file: self.name.clone(),
            line,
            column,
        }
    }

    /// Arrange for the next byte read from this source to be discarded.
    pub fn set_eat_tail(&mut self, value: bool) {
        self.eat_tail = value;
    }

    pub fn push_curhook(&mut self, pair: HookPair) {
        self.curhook.push(pair);
    }

    pub fn pop_curhook(&mut self) -> Option<HookPair> {
        self.curhook.pop()
    }

    /// The pair whose end hook closes the innermost open macro.
    pub fn curhook_top(&self) -> Option<&HookPair> {
        self.curhook.last()
    }

    pub fn curhook_depth(&self) -> usize {
        self.curhook.len()
    }

    fn read_raw(&mut self) -> Result<Option<u8>> {
        let next = self.reader.fill_buf().map(|buf| buf.first().copied());
        match next {
            Ok(None) => Ok(None),
            Ok(Some(byte)) => {
                self.reader.consume(1);
                Ok(Some(byte))
            }
            Err(err) => Err(Error::fatal(
                Some(self.location()),
                format!("read error on \"{}\": {err}", self.name),
            )),
        }
    }
}

/// LIFO stack of input sources; the last element is the active source.
#[derive(Default)]
pub struct InputStack {
    sources: Vec<InputSource>,
}

impl InputStack {
    pub fn new() -> InputStack {
        Default::default()
    }

    pub fn push(&mut self, source: InputSource) {
        self.sources.push(source);
    }

    /// Pop the top source, closing its handle.
    pub fn pop(&mut self) -> Option<InputSource> {
        self.sources.pop()
    }

    pub fn top(&self) -> Option<&InputSource> {
        self.sources.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut InputSource> {
        self.sources.last_mut()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Read one byte from the top source only.
    ///
    /// Returns `None` at end of the top source without popping it, so that
    /// push-back remains legal.
    pub fn get(&mut self) -> Result<Option<u8>> {
        match self.sources.last_mut() {
            Some(top) => top.get(),
            None => Ok(None),
        }
    }

    /// Read one byte, popping exhausted sources.
    ///
    /// Returns `None` only when the stack is empty.
    pub fn get_one(&mut self) -> Result<Option<u8>> {
        while let Some(top) = self.sources.last_mut() {
            if let Some(byte) = top.get()? {
                return Ok(Some(byte));
            }
            self.sources.pop();
        }
        Ok(None)
    }

    /// Push back one byte onto the top source.
    pub fn put_back(&mut self, byte: u8) {
        if let Some(top) = self.sources.last_mut() {
            top.put_back(byte);
        }
    }

    /// Read up to `n` bytes from the top source into `out`.
    ///
    /// Stops early at end of source; `out` may come back shorter than `n`.
    pub fn get_n(&mut self, n: usize, out: &mut Vec<u8>) -> Result<()> {
        out.clear();
        for _ in 0..n {
            match self.get()? {
                Some(byte) => out.push(byte),
                None => break,
            }
        }
        Ok(())
    }

    /// Push back a byte string so that its first byte is the next byte read.
    pub fn put_back_n(&mut self, bytes: &[u8]) {
        for &byte in bytes.iter().rev() {
            self.put_back(byte);
        }
    }
}
