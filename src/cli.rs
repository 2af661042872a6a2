//! CLI module containing the main entry point logic.

use crate::args::ParsedArguments;
use crate::config::{self, Settings};
use crate::interpreter::Interpreter;
use crate::{executor, fatal_error, repl, translate};
use clap::{CommandFactory, FromArgMatches, Parser as ClapParser};
use env_logger::Env;
use std::io::{self, IsTerminal, Read};

const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// CLI arguments for lpipe.
#[derive(ClapParser)]
#[command(name = "lpipe")]
#[command(version = PKG_VERSION)]
#[command(
    about = "Compose Lua one-liners over piped input, or explore it interactively",
    long_about = None
)]
// Value fields are read in command-line order through `ParsedArguments`.
#[allow(dead_code)]
struct Cli {
    /// Print the value of a Lua expression (repeatable)
    #[arg(short, long, value_name = "EXPR", num_args = 1..)]
    print: Vec<String>,

    /// Print a template with {expr} placeholders, e.g. 'lines: {#stdin}' (repeatable)
    #[arg(short, long, value_name = "TEMPLATE", num_args = 1..)]
    fprint: Vec<String>,

    /// Run a block of Lua code, or read it from a /dev/fd path: -c <(cat script.lua)
    #[arg(short, long, value_name = "CODE")]
    code: Option<String>,

    /// Apply a one-argument function to each input line and write its truthy results
    #[arg(short, long, value_name = "FUNC")]
    lambda: Option<String>,

    /// Enable debug logging (overrides LPIPE_LOG)
    #[arg(short, long)]
    debug: bool,
}

pub(crate) fn command() -> clap::Command {
    Cli::command()
}

/// Main CLI logic.
pub fn run_cli() {
    let matches = command().get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());
    init_logging(cli.debug);

    let parsed = ParsedArguments::from_matches(&matches);
    let settings = Settings::from_env();

    let interpreter = Interpreter::new()
        .unwrap_or_else(|e| fatal_error(&format!("Error: cannot start Lua: {e}")));

    if io::stdin().is_terminal() {
        log::debug!("stdin is a terminal; no input bound");
    } else {
        let lines = read_input()
            .unwrap_or_else(|e| fatal_error(&format!("Error: cannot read stdin: {e}")));
        log::debug!("read {} line(s) from stdin", lines.len());
        if let Err(e) = interpreter.bind_input(&lines) {
            fatal_error(&format!("Error: {e}"));
        }
    }

    let fragments = translate::fragments(&parsed, &interpreter)
        .unwrap_or_else(|e| fatal_error(&format!("Error: {e}")));

    if fragments.is_empty() {
        log::debug!("no code flags; starting REPL");
        repl::run_repl(interpreter, settings);
        return;
    }

    if let Err(e) = executor::run_batch(&interpreter, &fragments) {
        fatal_error(&format!("Execution error: {e}"));
    }
}

fn init_logging(debug: bool) {
    let mut builder = env_logger::Builder::from_env(Env::default().filter_or(config::LOG_ENV, "warn"));
    if debug {
        builder.filter_module("lpipe", log::LevelFilter::Debug);
    }
    builder.format_timestamp(None).init();
}

/// Read all of stdin in one go. Bytes are kept as read; Lua strings are
/// not required to be UTF-8.
fn read_input() -> io::Result<Vec<Vec<u8>>> {
    let mut bytes = Vec::new();
    io::stdin().lock().read_to_end(&mut bytes)?;
    Ok(split_lines(&bytes))
}

/// Split into lines, each keeping its terminator.
fn split_lines(bytes: &[u8]) -> Vec<Vec<u8>> {
    bytes
        .split_inclusive(|byte| *byte == b'\n')
        .map(<[u8]>::to_vec)
        .collect()
}
