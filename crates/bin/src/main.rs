use clap::Parser;
use mucgly::hook::HookKind;
use mucgly::parse::ParseState;
use mucgly_common::RealFileSystem;
use mucgly_script::Interpreter;
use std::path::PathBuf;

/// mucgly: a streaming text preprocessor with embedded scripting
///
/// Copies input to output while expanding macros, regions between a
/// configurable pair of hooks (by default `-<` and `>-`). A macro body is
/// an internal directive (`:hookbeg`, `:include`, `:block`, ...) or a
/// script fragment; `-<.1+2>-` writes `3`.
#[derive(Parser)]
#[command(name = "mucgly")]
struct Opts {
    /// Input files, processed in order; standard input if none are given
    inputs: Vec<PathBuf>,

    /// Output file (standard output if absent)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Default hook-begin delimiter
    #[arg(long)]
    hookbeg: Option<String>,

    /// Default hook-end delimiter
    #[arg(long)]
    hookend: Option<String>,

    /// Default escape
    #[arg(long)]
    hookesc: Option<String>,

    /// Default eater
    #[arg(long)]
    eater: Option<String>,

    /// Flush the output after every byte
    #[arg(short, long)]
    flush: bool,

    /// Evaluate a script fragment before processing (repeatable)
    #[arg(short, long)]
    eval: Vec<String>,

    /// Load a script file before processing (repeatable)
    #[arg(short, long)]
    load: Vec<PathBuf>,
}

fn main() {
    let opts = Opts::parse();
    if let Err(err) = run(opts) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run(opts: Opts) -> Result<(), anyhow::Error> {
    let mut ps = ParseState::new(Box::new(RealFileSystem), opts.output.as_deref())?;
    ps.set_flush(opts.flush);
    {
        let cfg = ps.default_cfg_mut();
        if let Some(value) = &opts.hookbeg {
            cfg.set_hook(HookKind::Beg, value.as_bytes())?;
        }
        if let Some(value) = &opts.hookend {
            cfg.set_hook(HookKind::End, value.as_bytes())?;
        }
        if let Some(value) = &opts.hookesc {
            cfg.set_hook(HookKind::Esc, value.as_bytes())?;
        }
        if let Some(value) = &opts.eater {
            cfg.set_eater(Some(value.as_bytes()));
        }
    }

    let mut parser = mucgly::Parser::new(ps, Interpreter::new());
    for path in &opts.load {
        parser.load_startup(&path.to_string_lossy())?;
    }
    for source in &opts.eval {
        parser.eval_startup(source)?;
    }

    if opts.inputs.is_empty() {
        parser.process_file(None, None)?;
    } else {
        for input in &opts.inputs {
            parser.process_file(Some(input), None)?;
        }
    }
    Ok(())
}
