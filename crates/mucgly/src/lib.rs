//! # mucgly core
//!
//! mucgly is a streaming text preprocessor: it copies input text to output
//! while expanding *macros*, regions delimited by a configurable pair of
//! hooks (by default `-<` and `>-`). A macro body is either an internal
//! directive (reconfiguring the preprocessor: delimiters, includes, output
//! blocking) or a fragment of an embedded scripting language whose
//! evaluation can write into the output stream, redirect I/O and push
//! further input sources.
//!
//! ```text
//! Hello -<.1+2>- world    =>    Hello 3 world
//! ```
//!
//! This crate contains the engine: the hook configuration ([`hook`]), the
//! push-backable input stack ([`input`]), the output stack ([`output`]),
//! the central state machine ([`parse`]) and the script-host contract
//! ([`script`]). The concrete script interpreter and the command-line
//! driver live in sibling crates.
//!
//! Every hook is reconfigurable per input source and mid-file, so lexing is
//! strictly just-in-time: no byte is classified before the bytes preceding
//! it have been fully processed. Input is treated as bytes throughout; only
//! the newline byte is special, for position tracking.

mod dispatch;
pub mod error;
pub mod hook;
pub mod input;
pub mod output;
pub mod parse;
pub mod script;

pub use error::{Error, Result};
pub use parse::{ParseState, Parser};
pub use script::{ScriptError, ScriptHost};
