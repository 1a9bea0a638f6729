//! The parser: the central state machine of the preprocessor.
//!
//! The parser reads bytes from the top of an input stack. Outside a macro,
//! bytes pass through to the top output sink. A byte that could start a
//! delimiter (first-byte screen) triggers delimiter probes in a fixed
//! priority: escape, suspension, hook-end, hook-begin. A matched hook-begin
//! enters a macro: bytes now accumulate in the macro buffer until the
//! matching hook-end, at which point the body is dispatched as a directive
//! or handed to the script host.
//!
//! ## Probing and push-back
//!
//! A probe reads up to `|delimiter|` bytes from the top source and compares
//! them; bytes of a failed probe are pushed back in full, so the input
//! position only ever advances over consumed text. Because delimiters can
//! be reconfigured per source and mid-file, probes always read the current
//! top source's configuration.
//!
//! ## Deferred topology changes
//!
//! `:include` and the host's `pushinput`/`closeinput` callbacks must not
//! change the input stack while the parser is still consuming the macro
//! that triggered them. They set the `post_push`/`post_pop` flags instead,
//! and the parser applies them once dispatch of the current macro is done.

use crate::dispatch;
use crate::error::{warn, Error, Location, Result};
use crate::hook::{HookConfig, HookKind, HookPair};
use crate::input::{InputSource, InputStack, STDIN_NAME};
use crate::output::{OutputSink, OutputStack, STDOUT_NAME};
use crate::script::ScriptHost;
use mucgly_common::FileSystem;
use std::path::Path;

/// Everything the parser mutates: the input and output stacks, the macro
/// counters, the scratch buffers and the deferred flags.
///
/// The public methods of this type are the callback surface available to
/// the script host during evaluation.
pub struct ParseState {
    pub(crate) inputs: InputStack,
    pub(crate) outputs: OutputStack,
    pub(crate) in_macro: usize,
    pub(crate) suspension: usize,
    pub(crate) preview_buf: Vec<u8>,
    pub(crate) macro_buf: Vec<u8>,
    pub(crate) match_buf: Vec<u8>,
    pub(crate) flush: bool,
    pub(crate) post_push: bool,
    pub(crate) post_pop: bool,
    pending_inputs: Vec<InputSource>,
    default_cfg: HookConfig,
    file_system: Box<dyn FileSystem>,
}

impl ParseState {
    /// Create a new parse state writing to the provided output file, or to
    /// standard output if no file is given.
    pub fn new(file_system: Box<dyn FileSystem>, output: Option<&Path>) -> Result<ParseState> {
        let sink = ParseState::open_sink(&*file_system, output, None)?;
        Ok(ParseState {
            inputs: InputStack::new(),
            outputs: OutputStack::new(sink),
            in_macro: 0,
            suspension: 0,
            preview_buf: Vec::new(),
            macro_buf: Vec::new(),
            match_buf: Vec::new(),
            flush: false,
            post_push: false,
            post_pop: false,
            pending_inputs: Vec::new(),
            default_cfg: HookConfig::default(),
            file_system,
        })
    }

    /// Flush the output sink after every written byte.
    pub fn set_flush(&mut self, flush: bool) {
        self.flush = flush;
    }

    /// The configuration template inherited by sources pushed onto an empty
    /// input stack.
    pub fn default_cfg_mut(&mut self) -> &mut HookConfig {
        &mut self.default_cfg
    }

    /// Push an input source immediately (the initial file of a run).
    ///
    /// `None` reads standard input. The new source inherits the hook
    /// configuration of the current top source, or the default template if
    /// the stack is empty.
    pub fn push_input_now(&mut self, path: Option<&Path>) -> Result<()> {
        let source = self.open_source(path)?;
        self.inputs.push(source);
        Ok(())
    }

    /// Push an input source once the current macro finishes (`:include`,
    /// `pushinput`).
    ///
    /// The file is opened and configured immediately; activation is
    /// deferred to the end of the macro being dispatched. Multiple pushes
    /// within one macro are read in push order.
    pub fn push_input(&mut self, path: &Path) -> Result<()> {
        let source = self.open_source(Some(path))?;
        self.pending_inputs.push(source);
        self.post_push = true;
        Ok(())
    }

    /// Pop the current input source once the current macro finishes.
    pub fn close_input(&mut self) {
        self.post_pop = true;
    }

    /// Push a new output sink; all writes divert to it until it is closed.
    pub fn push_output(&mut self, path: &Path) -> Result<()> {
        let sink = ParseState::open_sink(&*self.file_system, Some(path), self.current_location())?;
        self.outputs.push(sink);
        Ok(())
    }

    /// Close the top output sink.
    ///
    /// The outermost sink cannot be closed; attempting to warns and is
    /// otherwise ignored.
    pub fn close_output(&mut self) {
        if self.outputs.len() <= 1 {
            warn(
                self.current_location(),
                "cannot close the outermost output",
            );
            return;
        }
        self.outputs.pop();
    }

    /// Block the top output sink: written bytes are silently dropped.
    pub fn block(&mut self) {
        if let Some(top) = self.outputs.top_mut() {
            top.set_blocked(true);
        }
    }

    /// Unblock the top output sink.
    pub fn unblock(&mut self) {
        if let Some(top) = self.outputs.top_mut() {
            top.set_blocked(false);
        }
    }

    /// Write one byte to the top output sink.
    pub fn write_byte(&mut self, byte: u8) -> Result<()> {
        match self.outputs.top_mut() {
            Some(top) => top.write_byte(byte, self.flush),
            None => Ok(()),
        }
    }

    /// Write a byte string to the top output sink.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        for &byte in bytes {
            self.write_byte(byte)?;
        }
        Ok(())
    }

    /// Write a byte string followed by a newline.
    pub fn puts(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_bytes(bytes)?;
        self.write_byte(b'\n')
    }

    /// The current single-mode begin hook.
    pub fn hookbeg(&self) -> Option<&[u8]> {
        self.inputs.top().map(|top| top.cfg.hook().beg.as_slice())
    }

    /// The current single-mode end hook.
    pub fn hookend(&self) -> Option<&[u8]> {
        self.inputs.top().map(|top| top.cfg.hook().end.as_slice())
    }

    /// The current escape.
    pub fn hookesc(&self) -> Option<&[u8]> {
        self.inputs.top().map(|top| top.cfg.esc())
    }

    /// Replace one delimiter on the current top source.
    pub fn set_hook(&mut self, kind: HookKind, value: &[u8]) -> Result<()> {
        let location = self.current_location();
        match self.inputs.top_mut() {
            Some(top) => top.cfg.set_hook(kind, value).map_err(|err| err.at(location)),
            None => Err(Error::error(location, "no input source")),
        }
    }

    /// Set or clear the eater on the current top source.
    pub fn set_eater(&mut self, value: Option<&[u8]>) -> Result<()> {
        let location = self.current_location();
        match self.inputs.top_mut() {
            Some(top) => {
                top.cfg.set_eater(value);
                Ok(())
            }
            None => Err(Error::error(location, "no input source")),
        }
    }

    /// Add a multi-hook pair on the current top source.
    pub fn add_multihook(&mut self, beg: &[u8], end: &[u8], susp: Option<&[u8]>) -> Result<()> {
        let location = self.current_location();
        match self.inputs.top_mut() {
            Some(top) => top
                .cfg
                .add_multi(beg, end, susp)
                .map_err(|err| err.at(location)),
            None => Err(Error::error(location, "no input source")),
        }
    }

    /// Name of the current input source.
    pub fn input_file_name(&self) -> Option<&str> {
        self.inputs.top().map(|top| top.name())
    }

    /// Line number in the current input source, 1-based.
    pub fn input_line_number(&self) -> Option<usize> {
        self.inputs.top().map(|top| top.line() + 1)
    }

    /// Name of the current output sink.
    pub fn output_file_name(&self) -> Option<&str> {
        self.outputs.top().map(|top| top.name())
    }

    /// Line number in the current output sink, 1-based.
    pub fn output_line_number(&self) -> Option<usize> {
        self.outputs.top().map(|top| top.line() + 1)
    }

    /// Position used for diagnostics raised now: the macro start while a
    /// macro is open, otherwise the current read position.
    pub fn current_location(&self) -> Option<Location> {
        self.inputs.top().map(|top| top.location())
    }

    /// The pair that opened the innermost macro on the current source.
    pub(crate) fn current_hook_pair(&self) -> Option<HookPair> {
        self.inputs.top().and_then(|top| top.curhook_top().cloned())
    }

    // Activate sources queued by push_input, first-pushed read first.
    pub(crate) fn activate_pending(&mut self) {
        for source in self.pending_inputs.drain(..).rev() {
            self.inputs.push(source);
        }
    }

    fn open_source(&self, path: Option<&Path>) -> Result<InputSource> {
        let cfg = match self.inputs.top() {
            Some(top) => top.cfg.clone(),
            None => self.default_cfg.clone(),
        };
        match path {
            None => Ok(InputSource::new(
                STDIN_NAME,
                Box::new(std::io::stdin().lock()),
                cfg,
            )),
            Some(path) => match self.file_system.open_input(path) {
                Ok(reader) => Ok(InputSource::new(path.display().to_string(), reader, cfg)),
                Err(_) => Err(Error::fatal(
                    self.current_location(),
                    format!("can't open \"{}\"", path.display()),
                )),
            },
        }
    }

    fn open_sink(
        file_system: &dyn FileSystem,
        path: Option<&Path>,
        location: Option<Location>,
    ) -> Result<OutputSink> {
        match path {
            None => Ok(OutputSink::new(
                STDOUT_NAME,
                Box::new(std::io::stdout()),
            )),
            Some(path) => match file_system.create_output(path) {
                Ok(writer) => Ok(OutputSink::new(path.display().to_string(), writer)),
                Err(_) => Err(Error::fatal(
                    location,
                    format!("can't open \"{}\"", path.display()),
                )),
            },
        }
    }
}

enum Flow {
    Continue,
    Break,
}

// Which delimiter a probe compares against.
enum Probe {
    Esc,
    Eater,
    End,
    Susp,
}

// Bytes of the pair that opened the innermost macro.
enum Part {
    Beg,
    End,
    Susp,
}

/// Drives a [`ParseState`] and a [`ScriptHost`] over input files.
pub struct Parser<H> {
    ps: ParseState,
    host: H,
}

impl<H: ScriptHost> Parser<H> {
    pub fn new(ps: ParseState, host: H) -> Parser<H> {
        Parser { ps, host }
    }

    pub fn state(&self) -> &ParseState {
        &self.ps
    }

    pub fn state_mut(&mut self) -> &mut ParseState {
        &mut self.ps
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Evaluate a script fragment in the host outside of any input file.
    pub fn eval_startup(&mut self, source: &str) -> Result<()> {
        self.host
            .run(source, &mut self.ps)
            .map_err(|err| dispatch::script_error(&self.ps, err))
    }

    /// Load a script file in the host outside of any input file.
    pub fn load_startup(&mut self, path: &str) -> Result<()> {
        self.host
            .load(path, &mut self.ps)
            .map_err(|err| dispatch::script_error(&self.ps, err))
    }

    /// Process one input file (or standard input), optionally diverting the
    /// output to a new sink for the duration.
    pub fn process_file(&mut self, input: Option<&Path>, output: Option<&Path>) -> Result<()> {
        self.ps.push_input_now(input)?;
        if let Some(path) = output {
            self.ps.push_output(path)?;
        }
        let result = self.run();
        if output.is_some() {
            self.ps.close_output();
        }
        result
    }

    // The main loop (one iteration per input byte).
    fn run(&mut self) -> Result<()> {
        loop {
            let byte = self.ps.inputs.get_one()?;
            let Some(c) = byte else {
                if let Flow::Break = self.non_hook(None)? {
                    break;
                }
                continue;
            };
            let screened = self
                .ps
                .inputs
                .top()
                .map_or(false, |top| top.cfg.is_first_byte(c));
            if !screened {
                if let Flow::Break = self.non_hook(Some(c))? {
                    break;
                }
                continue;
            }
            self.ps.inputs.put_back(c);
            if self.check_probe(Probe::Esc)? {
                if let Flow::Break = self.handle_escape()? {
                    break;
                }
            } else if self.ps.in_macro > 0 && self.check_probe(Probe::Susp)? {
                self.ps.suspension += 1;
                self.collect_current(Part::Susp);
            } else if self.ps.in_macro > 0 && self.check_probe(Probe::End)? {
                // hook-end has priority over hook-begin inside a macro
                if self.ps.suspension == 0 {
                    if let Flow::Break = self.hook_end_seq()? {
                        break;
                    }
                } else {
                    self.ps.suspension -= 1;
                    self.collect_current(Part::End);
                }
            } else if self.check_hookbeg()? {
                if self.ps.in_macro > 0 {
                    // nested macro: the consumed begin hook passes through
                    self.ps.in_macro += 1;
                    self.out_current(Part::Beg)?;
                } else {
                    self.enter_macro();
                }
            } else {
                let byte = self.ps.inputs.get_one()?;
                if let Flow::Break = self.non_hook(byte)? {
                    break;
                }
            }
        }
        Ok(())
    }

    fn non_hook(&mut self, byte: Option<u8>) -> Result<Flow> {
        if self.ps.in_macro > 0 {
            let Some(byte) = byte else {
                return Err(Error::fatal(
                    self.ps.current_location(),
                    "end of input within macro",
                ));
            };
            self.ps.macro_buf.push(byte);
            Ok(Flow::Continue)
        } else {
            match byte {
                None => Ok(Flow::Break),
                Some(byte) => {
                    self.ps.write_byte(byte)?;
                    Ok(Flow::Continue)
                }
            }
        }
    }

    fn enter_macro(&mut self) {
        self.ps.in_macro += 1;
        if let Some(top) = self.ps.inputs.top_mut() {
            top.mark_macro();
        }
        self.ps.macro_buf.clear();
    }

    fn hook_end_seq(&mut self) -> Result<Flow> {
        self.ps.in_macro = match self.ps.in_macro.checked_sub(1) {
            Some(depth) => depth,
            None => {
                return Err(Error::fatal(
                    self.ps.current_location(),
                    "internal error in macro state",
                ))
            }
        };
        if self.ps.in_macro > 0 {
            // nested macro: the consumed end hook passes through
            self.out_current(Part::End)?;
            if let Some(top) = self.ps.inputs.top_mut() {
                top.pop_curhook();
            }
            return Ok(Flow::Continue);
        }
        let outcome = dispatch::dispatch(&mut self.ps, &mut self.host)?;
        if let Some(top) = self.ps.inputs.top_mut() {
            top.unmark_macro();
            top.pop_curhook();
        }
        if self.ps.post_push {
            self.ps.post_push = false;
            self.ps.activate_pending();
        }
        if self.ps.post_pop {
            self.ps.post_pop = false;
            self.ps.inputs.pop();
        }
        match outcome {
            dispatch::Outcome::Exit => Ok(Flow::Break),
            dispatch::Outcome::Continue => Ok(Flow::Continue),
        }
    }

    fn handle_escape(&mut self) -> Result<Flow> {
        if self.ps.in_macro > 0 {
            let Some(c) = self.ps.inputs.get_one()? else {
                return Err(Error::fatal(
                    self.ps.current_location(),
                    "end of input within macro",
                ));
            };
            let esc_eq_end = self
                .ps
                .inputs
                .top()
                .map_or(false, |top| top.cfg.esc_eq_end());
            if (c == b' ' || c == b'\n') && esc_eq_end {
                // whitespace after an escape that doubles as the end hook
                return self.hook_end_seq();
            }
            if self.eater_starts_with(c) {
                self.ps.inputs.put_back(c);
                if self.check_probe(Probe::Eater)? {
                    // the eater takes the byte that follows it
                    self.ps.inputs.get_one()?;
                } else {
                    self.ps.macro_buf.push(c);
                }
            } else {
                self.ps.macro_buf.push(c);
            }
            Ok(Flow::Continue)
        } else {
            let Some(c) = self.ps.inputs.get_one()? else {
                return Ok(Flow::Break);
            };
            if self.eater_starts_with(c) {
                self.ps.inputs.put_back(c);
                if self.check_probe(Probe::Eater)? {
                    self.ps.inputs.get_one()?;
                } else {
                    self.ps.write_byte(c)?;
                }
                return Ok(Flow::Continue);
            }
            match c {
                // an escape eats following whitespace
                b'\n' | b' ' => Ok(Flow::Continue),
                _ => {
                    let (esc_eq_beg, single_byte_esc) = match self.ps.inputs.top() {
                        Some(top) => (
                            top.cfg.esc_eq_beg(),
                            (top.cfg.esc().len() == 1).then(|| top.cfg.esc()[0]),
                        ),
                        None => (false, None),
                    };
                    if esc_eq_beg {
                        if single_byte_esc == Some(c) {
                            // escaped escape
                            self.ps.write_byte(c)?;
                        } else {
                            // the escape doubles as the begin hook
                            self.ps.inputs.put_back(c);
                            let pair = self.ps.inputs.top().map(|top| top.cfg.hook().clone());
                            if let (Some(pair), Some(top)) = (pair, self.ps.inputs.top_mut()) {
                                top.push_curhook(pair);
                            }
                            self.enter_macro();
                        }
                    } else {
                        self.ps.write_byte(c)?;
                    }
                    Ok(Flow::Continue)
                }
            }
        }
    }

    fn eater_starts_with(&self, byte: u8) -> bool {
        self.ps
            .inputs
            .top()
            .and_then(|top| top.cfg.eater())
            .map_or(false, |eater| eater[0] == byte)
    }

    // Load the probed delimiter into the match buffer. Returns false when
    // there is nothing to probe (no source, no eater, no open hook, ...).
    fn load_match(&mut self, probe: Probe) -> bool {
        self.ps.match_buf.clear();
        let Some(top) = self.ps.inputs.top() else {
            return false;
        };
        let needle: &[u8] = match probe {
            Probe::Esc => top.cfg.esc(),
            Probe::Eater => match top.cfg.eater() {
                Some(eater) => eater,
                None => return false,
            },
            Probe::End => match top.curhook_top() {
                Some(pair) => &pair.end,
                None => return false,
            },
            Probe::Susp => match top.curhook_top().and_then(|pair| pair.susp.as_deref()) {
                Some(susp) => susp,
                None => return false,
            },
        };
        self.ps.match_buf.extend_from_slice(needle);
        true
    }

    fn check_probe(&mut self, probe: Probe) -> Result<bool> {
        if !self.load_match(probe) {
            return Ok(false);
        }
        self.check(true)
    }

    // Compare the upcoming input against the match buffer, consuming the
    // bytes on a successful match when erase is set. An immediate end of
    // source pops the top source and reports no match.
    fn check(&mut self, erase: bool) -> Result<bool> {
        let n = self.ps.match_buf.len();
        self.ps.inputs.get_n(n, &mut self.ps.preview_buf)?;
        if self.ps.preview_buf.is_empty() {
            self.ps.inputs.pop();
            return Ok(false);
        }
        let matched = self.ps.preview_buf == self.ps.match_buf;
        if !matched || !erase {
            self.ps.inputs.put_back_n(&self.ps.preview_buf);
        }
        Ok(matched)
    }

    fn check_hookbeg(&mut self) -> Result<bool> {
        let multi = match self.ps.inputs.top() {
            Some(top) => top.cfg.multi().is_some(),
            None => return Ok(false),
        };
        if multi {
            // first match by list order wins
            let mut i = 0;
            loop {
                let pair = match self
                    .ps
                    .inputs
                    .top()
                    .and_then(|top| top.cfg.multi().and_then(|pairs| pairs.get(i).cloned()))
                {
                    Some(pair) => pair,
                    None => return Ok(false),
                };
                self.ps.match_buf.clear();
                self.ps.match_buf.extend_from_slice(&pair.beg);
                if self.check(true)? {
                    if let Some(top) = self.ps.inputs.top_mut() {
                        top.push_curhook(pair);
                    }
                    return Ok(true);
                }
                i += 1;
            }
        } else {
            let pair = match self.ps.inputs.top() {
                Some(top) => top.cfg.hook().clone(),
                None => return Ok(false),
            };
            self.ps.match_buf.clear();
            self.ps.match_buf.extend_from_slice(&pair.beg);
            if self.check(true)? {
                if let Some(top) = self.ps.inputs.top_mut() {
                    top.push_curhook(pair);
                }
                return Ok(true);
            }
            Ok(false)
        }
    }

    fn collect_current(&mut self, part: Part) {
        let bytes = match self.part_bytes(part) {
            Some(bytes) => bytes,
            None => return,
        };
        self.ps.macro_buf.extend_from_slice(&bytes);
    }

    fn out_current(&mut self, part: Part) -> Result<()> {
        let bytes = match self.part_bytes(part) {
            Some(bytes) => bytes,
            None => return Ok(()),
        };
        self.ps.write_bytes(&bytes)
    }

    fn part_bytes(&self, part: Part) -> Option<Vec<u8>> {
        let pair = self.ps.inputs.top().and_then(|top| top.curhook_top())?;
        match part {
            Part::Beg => Some(pair.beg.clone()),
            Part::End => Some(pair.end.clone()),
            Part::Susp => pair.susp.clone(),
        }
    }
}
