//! Macro-body dispatch: internal directives and script hand-off.
//!
//! When a macro closes, its collected body is dispatched on its first byte:
//!
//! | Prefix | Meaning |
//! |---|---|
//! | `:` | internal directive |
//! | `.` | script expression; the stringified result is written out |
//! | `/` | comment |
//! | `#` | deferred: re-emit the body between the current hooks with one `#` stripped |
//! | other | script statement; the result is discarded |
//!
//! A body starting with `+` first arranges for the byte following the macro
//! to be swallowed; the remainder is then dispatched as above.
//!
//! Directive keywords are matched by prefix, and the argument is everything
//! after the keyword plus one separator byte. All directive mutations apply
//! to the current top input source.

use crate::error::{Error, Result};
use crate::hook::HookKind;
use crate::parse::ParseState;
use crate::script::{ScriptError, ScriptHost};
use std::path::Path;

/// What the parser should do after a macro body has been dispatched.
pub(crate) enum Outcome {
    Continue,
    Exit,
}

pub(crate) fn dispatch<H: ScriptHost>(ps: &mut ParseState, host: &mut H) -> Result<Outcome> {
    let body = std::mem::take(&mut ps.macro_buf);
    let mut start = 0;
    if body.first() == Some(&b'+') {
        // swallow the byte following the macro
        if let Some(top) = ps.inputs.top_mut() {
            top.set_eat_tail(true);
        }
        start = 1;
    }
    let result = run_body(ps, host, &body[start..]);
    ps.macro_buf = body;
    result
}

fn run_body<H: ScriptHost>(ps: &mut ParseState, host: &mut H, body: &[u8]) -> Result<Outcome> {
    match body.first() {
        Some(b':') => directive(ps, host, body),
        Some(b'.') => {
            let source = String::from_utf8_lossy(&body[1..]).into_owned();
            let value = host
                .eval(&source, ps)
                .map_err(|err| script_error(ps, err))?;
            ps.write_bytes(value.as_bytes())?;
            Ok(Outcome::Continue)
        }
        Some(b'/') => Ok(Outcome::Continue),
        Some(b'#') => {
            let (beg, end) = match ps.current_hook_pair() {
                Some(pair) => (pair.beg, pair.end),
                None => (Vec::new(), Vec::new()),
            };
            ps.write_bytes(&beg)?;
            ps.write_bytes(&body[1..])?;
            ps.write_bytes(&end)?;
            Ok(Outcome::Continue)
        }
        _ => {
            let source = String::from_utf8_lossy(body).into_owned();
            host.run(&source, ps).map_err(|err| script_error(ps, err))?;
            Ok(Outcome::Continue)
        }
    }
}

fn directive<H: ScriptHost>(ps: &mut ParseState, host: &mut H, body: &[u8]) -> Result<Outcome> {
    if let Some(arg) = arg_after(body, b":hookbeg") {
        ps.set_hook(HookKind::Beg, arg)?;
    } else if let Some(arg) = arg_after(body, b":hookend") {
        ps.set_hook(HookKind::End, arg)?;
    } else if let Some(arg) = arg_after(body, b":hookesc") {
        ps.set_hook(HookKind::Esc, arg)?;
    } else if let Some(arg) = arg_after(body, b":eater") {
        ps.set_eater(if arg.is_empty() { None } else { Some(arg) })?;
    } else if let Some(arg) = arg_after(body, b":hookall") {
        ps.set_hook(HookKind::Beg, arg)?;
        ps.set_hook(HookKind::End, arg)?;
        ps.set_hook(HookKind::Esc, arg)?;
    } else if let Some(arg) = arg_after(body, b":hook") {
        let mut pieces = arg.splitn(2, |&byte| byte == b' ');
        let first = pieces.next().unwrap_or(&[]);
        match pieces.next() {
            Some(second) => {
                ps.set_hook(HookKind::Beg, first)?;
                ps.set_hook(HookKind::End, second)?;
            }
            None => {
                ps.set_hook(HookKind::Beg, first)?;
                ps.set_hook(HookKind::End, first)?;
            }
        }
    } else if let Some(arg) = arg_after(body, b":include") {
        let path = String::from_utf8_lossy(arg).into_owned();
        ps.push_input(Path::new(&path))?;
    } else if let Some(arg) = arg_after(body, b":source") {
        let path = String::from_utf8_lossy(arg).into_owned();
        host.load(&path, ps).map_err(|err| script_error(ps, err))?;
    } else if arg_after(body, b":block").is_some() {
        ps.block();
    } else if arg_after(body, b":unblock").is_some() {
        ps.unblock();
    } else if arg_after(body, b":comment").is_some() {
        // no effect
    } else if arg_after(body, b":exit").is_some() {
        return Ok(Outcome::Exit);
    } else {
        return Err(Error::error(
            ps.current_location(),
            format!(
                "unknown internal command: \"{}\"",
                String::from_utf8_lossy(&body[1..])
            ),
        ));
    }
    Ok(Outcome::Continue)
}

// Match a directive keyword by prefix; the argument starts after the
// keyword plus one separator byte.
fn arg_after<'a>(body: &'a [u8], keyword: &[u8]) -> Option<&'a [u8]> {
    if body.starts_with(keyword) {
        Some(body.get(keyword.len() + 1..).unwrap_or(&[]))
    } else {
        None
    }
}

/// Convert a host failure into a diagnostic at the current location.
pub(crate) fn script_error(ps: &ParseState, err: ScriptError) -> Box<Error> {
    match err {
        ScriptError::Callback(err) => err,
        ScriptError::Script(message) => Error::error(ps.current_location(), message),
    }
}
