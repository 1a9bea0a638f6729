//! # mucgly-script
//!
//! The bundled script host for the mucgly preprocessor.
//!
//! Macro bodies that are not internal directives are evaluated by an
//! embedded interpreter. This crate provides a deliberately small one: a
//! statement/expression language over nil, 64-bit integers, strings and
//! lists, with persistent variables and a set of built-in functions that
//! form the preprocessor's callback surface.
//!
//! ```text
//! -<.1+2>-                          writes 3
//! -<x = "world">-Hello -<.x>-      assigns, then writes world
//! -<sethook("[", "]")>-[.2*21]     reconfigures the hooks, writes 42
//! ```
//!
//! ## Built-in functions
//!
//! Output: `write(x)`, `puts(x)`. Hook queries: `hookbeg()`, `hookend()`,
//! `hookesc()`. Hook mutations: `sethook(beg, end)`, `sethookbeg(s)`,
//! `sethookend(s)`, `sethookesc(s)`, `seteater(s_or_nil)`,
//! `multihook(...)`. Stream control: `pushinput(path)`, `closeinput()`,
//! `pushoutput(path)`, `closeoutput()`, `block()`, `unblock()`. Position
//! queries: `ifilename()`, `ilinenumber()`, `ofilename()`,
//! `olinenumber()`.
//!
//! `multihook` accepts a flat even-length list of strings (pairs), a single
//! list of such strings, or a sequence of 2- or 3-element lists where the
//! third element is the suspension marker.
//!
//! An expression macro (`.` prefix) writes a string result verbatim and
//! any other value in its `inspect` rendering, so `-<.[1, "a"]>-` writes
//! `[1, "a"]`.

mod lexer;

use lexer::Token;
use mucgly::hook::HookKind;
use mucgly::parse::ParseState;
use mucgly::script::{ScriptError, ScriptHost};
use mucgly_common::{FileSystem, RealFileSystem};
use std::collections::HashMap;
use std::path::Path;

/// A value in the script language.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Nil,
    Int(i64),
    Str(String),
    List(Vec<Value>),
}

impl Value {
    /// Developer-facing rendering, with strings quoted.
    pub fn inspect(&self) -> String {
        match self {
            Value::Nil => "nil".into(),
            Value::Int(value) => value.to_string(),
            Value::Str(value) => format!("{value:?}"),
            Value::List(items) => {
                let items: Vec<String> = items.iter().map(Value::inspect).collect();
                format!("[{}]", items.join(", "))
            }
        }
    }

    /// Rendering used when a value is written to the output stream: strings
    /// pass through verbatim, everything else uses [`inspect`](Value::inspect).
    pub fn display_string(&self) -> String {
        match self {
            Value::Str(value) => value.clone(),
            other => other.inspect(),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Int(_) => "integer",
            Value::Str(_) => "string",
            Value::List(_) => "list",
        }
    }
}

/// The bundled script interpreter.
///
/// Variables assigned in one evaluation remain visible in later ones, for
/// the life of the interpreter; the command-line driver keeps one
/// interpreter across all input files.
pub struct Interpreter {
    vars: HashMap<String, Value>,
    file_system: Box<dyn FileSystem>,
}

impl Default for Interpreter {
    fn default() -> Interpreter {
        Interpreter::new()
    }
}

impl Interpreter {
    pub fn new() -> Interpreter {
        Interpreter::with_file_system(Box::new(RealFileSystem))
    }

    /// Create an interpreter that loads script files (`:source`) through
    /// the provided file system.
    pub fn with_file_system(file_system: Box<dyn FileSystem>) -> Interpreter {
        Interpreter {
            vars: HashMap::new(),
            file_system,
        }
    }

    /// Evaluate a program and return the value of its last statement.
    pub fn eval_value(&mut self, source: &str, ps: &mut ParseState) -> Result<Value, ScriptError> {
        let tokens = lexer::lex(source).map_err(ScriptError::Script)?;
        let mut eval = Eval {
            tokens: &tokens,
            pos: 0,
            vars: &mut self.vars,
            ps,
        };
        eval.program()
    }
}

impl ScriptHost for Interpreter {
    fn eval(&mut self, source: &str, ps: &mut ParseState) -> Result<String, ScriptError> {
        Ok(self.eval_value(source, ps)?.display_string())
    }

    fn run(&mut self, source: &str, ps: &mut ParseState) -> Result<(), ScriptError> {
        self.eval_value(source, ps)?;
        Ok(())
    }

    fn load(&mut self, path: &str, ps: &mut ParseState) -> Result<(), ScriptError> {
        let source = match self.file_system.read_to_string(Path::new(path)) {
            Ok(source) => source,
            // unreadable script files are skipped
            Err(_) => return Ok(()),
        };
        self.eval_value(&source, ps)?;
        Ok(())
    }
}

fn script<M: Into<String>>(message: M) -> ScriptError {
    ScriptError::Script(message.into())
}

// Recursive-descent evaluator; no syntax tree is built.
struct Eval<'a> {
    tokens: &'a [Token],
    pos: usize,
    vars: &'a mut HashMap<String, Value>,
    ps: &'a mut ParseState,
}

impl Eval<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn program(&mut self) -> Result<Value, ScriptError> {
        let mut last = Value::Nil;
        loop {
            while self.peek() == Some(&Token::Separator) {
                self.advance();
            }
            if self.peek().is_none() {
                break;
            }
            last = self.statement()?;
            match self.peek() {
                None => break,
                Some(Token::Separator) => self.advance(),
                Some(token) => return Err(script(format!("unexpected token {token:?}"))),
            }
        }
        Ok(last)
    }

    fn statement(&mut self) -> Result<Value, ScriptError> {
        if let (Some(Token::Ident(name)), Some(Token::Equal)) =
            (self.peek(), self.tokens.get(self.pos + 1))
        {
            let name = name.clone();
            self.advance();
            self.advance();
            let value = self.expr()?;
            self.vars.insert(name, value.clone());
            return Ok(value);
        }
        self.expr()
    }

    fn expr(&mut self) -> Result<Value, ScriptError> {
        let mut value = self.term()?;
        loop {
            let add = match self.peek() {
                Some(Token::Plus) => true,
                Some(Token::Minus) => false,
                _ => break,
            };
            self.advance();
            let rhs = self.term()?;
            value = if add {
                match (value, rhs) {
                    (Value::Int(a), Value::Int(b)) => Value::Int(
                        a.checked_add(b).ok_or_else(|| script("integer overflow"))?,
                    ),
                    (Value::Str(a), Value::Str(b)) => Value::Str(a + &b),
                    (Value::List(mut a), Value::List(b)) => {
                        a.extend(b);
                        Value::List(a)
                    }
                    (a, b) => {
                        return Err(script(format!(
                            "cannot add {} and {}",
                            a.type_name(),
                            b.type_name()
                        )))
                    }
                }
            } else {
                match (value, rhs) {
                    (Value::Int(a), Value::Int(b)) => Value::Int(
                        a.checked_sub(b).ok_or_else(|| script("integer overflow"))?,
                    ),
                    (a, b) => {
                        return Err(script(format!(
                            "cannot subtract {} from {}",
                            b.type_name(),
                            a.type_name()
                        )))
                    }
                }
            };
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<Value, ScriptError> {
        let mut value = self.factor()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => Token::Star,
                Some(Token::Slash) => Token::Slash,
                Some(Token::Percent) => Token::Percent,
                _ => break,
            };
            self.advance();
            let rhs = self.factor()?;
            let (a, b) = match (value, rhs) {
                (Value::Int(a), Value::Int(b)) => (a, b),
                (a, b) => {
                    return Err(script(format!(
                        "cannot multiply or divide {} and {}",
                        a.type_name(),
                        b.type_name()
                    )))
                }
            };
            value = match op {
                Token::Star => {
                    Value::Int(a.checked_mul(b).ok_or_else(|| script("integer overflow"))?)
                }
                Token::Slash => Value::Int(a.checked_div(b).ok_or_else(|| script("divided by 0"))?),
                _ => Value::Int(a.checked_rem(b).ok_or_else(|| script("divided by 0"))?),
            };
        }
        Ok(value)
    }

    fn factor(&mut self) -> Result<Value, ScriptError> {
        let token = match self.peek() {
            Some(token) => token.clone(),
            None => return Err(script("unexpected end of input")),
        };
        match token {
            Token::Int(value) => {
                self.advance();
                Ok(Value::Int(value))
            }
            Token::Str(value) => {
                self.advance();
                Ok(Value::Str(value))
            }
            Token::Minus => {
                self.advance();
                match self.factor()? {
                    Value::Int(value) => Ok(Value::Int(-value)),
                    other => Err(script(format!("cannot negate {}", other.type_name()))),
                }
            }
            Token::ParenOpen => {
                self.advance();
                let value = self.expr()?;
                match self.peek() {
                    Some(Token::ParenClose) => {
                        self.advance();
                        Ok(value)
                    }
                    _ => Err(script("expected `)`")),
                }
            }
            Token::SquareOpen => {
                self.advance();
                let items = self.arguments(Token::SquareClose)?;
                Ok(Value::List(items))
            }
            Token::Ident(name) => {
                self.advance();
                if self.peek() == Some(&Token::ParenOpen) {
                    self.advance();
                    let args = self.arguments(Token::ParenClose)?;
                    return self.call(&name, args);
                }
                if name == "nil" {
                    return Ok(Value::Nil);
                }
                match self.vars.get(&name) {
                    Some(value) => Ok(value.clone()),
                    None => Err(script(format!("undefined variable `{name}`"))),
                }
            }
            token => Err(script(format!("unexpected token {token:?}"))),
        }
    }

    fn arguments(&mut self, close: Token) -> Result<Vec<Value>, ScriptError> {
        let mut args = Vec::new();
        if self.peek() == Some(&close) {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            match self.peek() {
                Some(Token::Comma) => self.advance(),
                Some(token) if *token == close => {
                    self.advance();
                    return Ok(args);
                }
                _ => return Err(script("expected `,` or a closing bracket")),
            }
        }
    }

    fn call(&mut self, name: &str, mut args: Vec<Value>) -> Result<Value, ScriptError> {
        match name {
            "write" => {
                let value = one_arg(name, &mut args)?;
                self.ps.write_bytes(value.display_string().as_bytes())?;
                Ok(Value::Nil)
            }
            "puts" => {
                let value = one_arg(name, &mut args)?;
                self.ps.puts(value.display_string().as_bytes())?;
                Ok(Value::Nil)
            }
            "hookbeg" => self.hook_query(name, &args, ParseState::hookbeg),
            "hookend" => self.hook_query(name, &args, ParseState::hookend),
            "hookesc" => self.hook_query(name, &args, ParseState::hookesc),
            "sethook" => {
                if args.len() != 2 {
                    return Err(script("sethook expects 2 arguments"));
                }
                let end = string_arg(name, args.pop().unwrap_or(Value::Nil))?;
                let beg = string_arg(name, args.pop().unwrap_or(Value::Nil))?;
                self.ps.set_hook(HookKind::Beg, beg.as_bytes())?;
                self.ps.set_hook(HookKind::End, end.as_bytes())?;
                Ok(Value::Nil)
            }
            "sethookbeg" => self.set_hook(name, HookKind::Beg, &mut args),
            "sethookend" => self.set_hook(name, HookKind::End, &mut args),
            "sethookesc" => self.set_hook(name, HookKind::Esc, &mut args),
            "seteater" => match one_arg(name, &mut args)? {
                Value::Nil => {
                    self.ps.set_eater(None)?;
                    Ok(Value::Nil)
                }
                Value::Str(value) => {
                    self.ps.set_eater(Some(value.as_bytes()))?;
                    Ok(Value::Nil)
                }
                _ => Err(script("eater must be a string or nil")),
            },
            "multihook" => self.multihook(args),
            "pushinput" => {
                let path = string_arg(name, one_arg(name, &mut args)?)?;
                self.ps.push_input(Path::new(&path))?;
                Ok(Value::Nil)
            }
            "closeinput" => {
                no_args(name, &args)?;
                self.ps.close_input();
                Ok(Value::Nil)
            }
            "pushoutput" => {
                let path = string_arg(name, one_arg(name, &mut args)?)?;
                self.ps.push_output(Path::new(&path))?;
                Ok(Value::Nil)
            }
            "closeoutput" => {
                no_args(name, &args)?;
                self.ps.close_output();
                Ok(Value::Nil)
            }
            "block" => {
                no_args(name, &args)?;
                self.ps.block();
                Ok(Value::Nil)
            }
            "unblock" => {
                no_args(name, &args)?;
                self.ps.unblock();
                Ok(Value::Nil)
            }
            "ifilename" => {
                no_args(name, &args)?;
                match self.ps.input_file_name() {
                    Some(file_name) => Ok(Value::Str(file_name.into())),
                    None => Err(script("no input source")),
                }
            }
            "ilinenumber" => {
                no_args(name, &args)?;
                match self.ps.input_line_number() {
                    Some(line) => Ok(Value::Int(line as i64)),
                    None => Err(script("no input source")),
                }
            }
            "ofilename" => {
                no_args(name, &args)?;
                match self.ps.output_file_name() {
                    Some(file_name) => Ok(Value::Str(file_name.into())),
                    None => Err(script("no output sink")),
                }
            }
            "olinenumber" => {
                no_args(name, &args)?;
                match self.ps.output_line_number() {
                    Some(line) => Ok(Value::Int(line as i64)),
                    None => Err(script("no output sink")),
                }
            }
            _ => Err(script(format!("undefined function `{name}`"))),
        }
    }

    fn hook_query(
        &mut self,
        name: &str,
        args: &[Value],
        get: fn(&ParseState) -> Option<&[u8]>,
    ) -> Result<Value, ScriptError> {
        no_args(name, args)?;
        match get(self.ps) {
            Some(bytes) => Ok(Value::Str(String::from_utf8_lossy(bytes).into_owned())),
            None => Err(script("no input source")),
        }
    }

    fn set_hook(
        &mut self,
        name: &str,
        kind: HookKind,
        args: &mut Vec<Value>,
    ) -> Result<Value, ScriptError> {
        let value = string_arg(name, one_arg(name, args)?)?;
        self.ps.set_hook(kind, value.as_bytes())?;
        Ok(Value::Nil)
    }

    fn multihook(&mut self, args: Vec<Value>) -> Result<Value, ScriptError> {
        let all_strings = !args.is_empty() && args.iter().all(|v| matches!(v, Value::Str(_)));
        if all_strings {
            // flat list of begin/end pairs
            if args.len() % 2 != 0 {
                return Err(script("hookbeg/hookend pairs expected for multihook"));
            }
            for pair in args.chunks(2) {
                if let (Value::Str(beg), Value::Str(end)) = (&pair[0], &pair[1]) {
                    self.ps.add_multihook(beg.as_bytes(), end.as_bytes(), None)?;
                }
            }
            return Ok(Value::Nil);
        }
        if args.len() == 1 {
            // one list of begin/end pairs
            if let Value::List(items) = &args[0] {
                if items.len() % 2 == 0 && items.iter().all(|v| matches!(v, Value::Str(_))) {
                    for pair in items.chunks(2) {
                        if let (Value::Str(beg), Value::Str(end)) = (&pair[0], &pair[1]) {
                            self.ps.add_multihook(beg.as_bytes(), end.as_bytes(), None)?;
                        }
                    }
                    return Ok(Value::Nil);
                }
            }
        }
        // 2- or 3-element sublists, the third element being the suspension
        for arg in &args {
            let items = match arg {
                Value::List(items) => items,
                _ => {
                    return Err(script(
                        "array argument must hold hookbeg/hookend pairs or triplets including suspension",
                    ))
                }
            };
            match items.as_slice() {
                [Value::Str(beg), Value::Str(end)] => {
                    self.ps.add_multihook(beg.as_bytes(), end.as_bytes(), None)?;
                }
                [Value::Str(beg), Value::Str(end), Value::Str(susp)] => {
                    self.ps
                        .add_multihook(beg.as_bytes(), end.as_bytes(), Some(susp.as_bytes()))?;
                }
                _ => {
                    return Err(script(
                        "array argument must hold hookbeg/hookend pairs or triplets including suspension",
                    ))
                }
            }
        }
        Ok(Value::Nil)
    }
}

fn one_arg(name: &str, args: &mut Vec<Value>) -> Result<Value, ScriptError> {
    if args.len() != 1 {
        return Err(script(format!("{name} expects 1 argument")));
    }
    Ok(args.remove(0))
}

fn no_args(name: &str, args: &[Value]) -> Result<(), ScriptError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(script(format!("{name} expects no arguments")))
    }
}

fn string_arg(name: &str, value: Value) -> Result<String, ScriptError> {
    match value {
        Value::Str(value) => Ok(value),
        other => Err(script(format!(
            "{name} expects a string, got {}",
            other.type_name()
        ))),
    }
}
