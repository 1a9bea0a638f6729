//! The embedded script host contract.
//!
//! The preprocessor does not interpret macro bodies itself: bodies that are
//! not internal directives are handed to a [`ScriptHost`]. During
//! evaluation the host is given mutable access to the [`ParseState`], whose
//! public methods form the callback surface: writing to the current output,
//! querying and mutating hooks, pushing and popping inputs and outputs, and
//! querying positions.
//!
//! A concrete host lives outside this crate (the bundled one is the
//! `mucgly-script` interpreter); the parser only relies on this trait.

use crate::error::Error;
use crate::parse::ParseState;

/// Failure reported by a [`ScriptHost`].
#[derive(Debug)]
pub enum ScriptError {
    /// The host failed to evaluate the fragment. The string is the host's
    /// rendering of the exception and becomes the diagnostic message.
    Script(String),
    /// A parser callback invoked during evaluation failed; the diagnostic
    /// propagates unchanged.
    Callback(Box<Error>),
}

impl From<Box<Error>> for ScriptError {
    fn from(err: Box<Error>) -> ScriptError {
        ScriptError::Callback(err)
    }
}

/// A script interpreter embedded in the preprocessor.
///
/// Evaluation is synchronous and may re-enter the parser through the
/// `ParseState` callback surface, but never through the parser's main loop.
pub trait ScriptHost {
    /// Evaluate `source` and return the stringified result.
    fn eval(&mut self, source: &str, ps: &mut ParseState) -> Result<String, ScriptError>;

    /// Evaluate `source` for its side effects, discarding the result.
    fn run(&mut self, source: &str, ps: &mut ParseState) -> Result<(), ScriptError>;

    /// Load and run the script file at `path` (the `:source` directive).
    fn load(&mut self, path: &str, ps: &mut ParseState) -> Result<(), ScriptError>;
}
