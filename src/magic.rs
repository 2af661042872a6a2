//! `%`-prefixed magic commands typed at the REPL prompt.
//!
//! A magic line is tokenized with shell quoting rules and parsed by its own
//! clap command, so `%export -h` prints usage like any other CLI.

use crate::config::Settings;
use crate::export::{self, ExportError, ExportFormat, ExportReport, ExportRequest};
use crate::history::{IndexSelector, SessionHistory};
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::error::Error as _;
use std::path::PathBuf;
use thiserror::Error;

pub const MAGIC_PREFIX: char = '%';

#[derive(Parser, Debug)]
#[command(
    name = "%",
    no_binary_name = true,
    disable_help_subcommand = true,
    disable_version_flag = true
)]
#[command(about = "Magic commands available at the lpipe prompt")]
struct MagicLine {
    #[command(subcommand)]
    command: MagicCommand,
}

#[derive(Subcommand, Debug)]
enum MagicCommand {
    /// Save history entries as an executable wrapper or a Lua script
    Export(ExportArgs),
    /// List the statements recorded in this session
    History,
    /// Show the available magic commands
    Help,
}

#[derive(Args, Debug)]
struct ExportArgs {
    /// Destination file
    path: PathBuf,

    /// History entries to export: N or N-M (inclusive)
    #[arg(value_name = "INDEX")]
    indices: Vec<IndexSelector>,

    /// Write a plain Lua script instead of an executable wrapper
    #[arg(short = 'p', long = "as-lua", visible_alias = "as-script")]
    as_lua: bool,

    /// Shell command whose output is piped into the exported code
    #[arg(
        short = 'i',
        long = "input-command",
        value_name = "CMD",
        conflicts_with = "as_lua"
    )]
    input_command: Option<String>,

    /// Replace the destination if it exists
    #[arg(short, long)]
    overwrite: bool,

    /// Export the whole history
    #[arg(short, long)]
    all: bool,
}

#[derive(Debug, Error)]
pub enum MagicError {
    #[error("cannot parse magic command: {0}")]
    Tokenize(#[from] shell_words::ParseError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

impl MagicError {
    /// Mistakes in the command line itself, reported without a trace.
    #[must_use]
    pub fn is_usage(&self) -> bool {
        match self {
            MagicError::Tokenize(_) => true,
            MagicError::Export(e) => e.is_usage(),
        }
    }
}

/// What [`MagicDispatcher::dispatch`] did with a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Not a magic command; evaluate it as code.
    NotMagic,
    /// Consumed, whether or not the command succeeded.
    Handled,
}

#[derive(Debug)]
pub struct MagicDispatcher {
    settings: Settings,
}

impl MagicDispatcher {
    #[must_use]
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    #[must_use]
    pub fn is_magic(line: &str) -> bool {
        line.trim_start().starts_with(MAGIC_PREFIX)
    }

    /// Run `line` if it is a magic command. Failures are reported on stderr
    /// and never reach the caller.
    pub fn dispatch(&self, line: &str, history: &SessionHistory) -> Dispatch {
        let Some(rest) = line.trim_start().strip_prefix(MAGIC_PREFIX) else {
            return Dispatch::NotMagic;
        };

        if let Err(e) = self.run(rest, history) {
            report(&e);
        }
        Dispatch::Handled
    }

    fn run(&self, command_line: &str, history: &SessionHistory) -> Result<(), MagicError> {
        let tokens = shell_words::split(command_line)?;
        log::debug!("magic command: {tokens:?}");

        let parsed = match MagicLine::try_parse_from(tokens) {
            Ok(parsed) => parsed,
            Err(e) => {
                // Usage errors and `-h` output both land here.
                if let Err(io_err) = e.print() {
                    log::warn!("cannot print magic usage: {io_err}");
                }
                return Ok(());
            }
        };

        match parsed.command {
            MagicCommand::Export(args) => {
                let report = self.export(args, history)?;
                println!("{report}");
            }
            MagicCommand::History => print!("{}", render_history(history)),
            MagicCommand::Help => println!("{}", MagicLine::command().render_long_help()),
        }
        Ok(())
    }

    fn export(&self, args: ExportArgs, history: &SessionHistory) -> Result<ExportReport, MagicError> {
        let selection = export::build_selection(args.all, args.indices)?;
        let format = if args.as_lua {
            ExportFormat::Script
        } else {
            ExportFormat::Wrapper {
                upstream: args
                    .input_command
                    .filter(|command| !command.trim().is_empty()),
            }
        };

        let request = ExportRequest {
            destination: args.path,
            selection,
            format,
            overwrite: args.overwrite,
        };
        Ok(export::export(&request, history, &self.settings)?)
    }
}

/// One numbered entry per statement; continuation lines are indented.
fn render_history(history: &SessionHistory) -> String {
    if history.is_empty() {
        return "(history is empty)\n".to_string();
    }

    let mut out = String::new();
    for (index, entry) in history.all().iter().enumerate() {
        let label = format!("[{index}] ");
        let mut lines = entry.source().lines();
        out.push_str(&label);
        out.push_str(lines.next().unwrap_or_default());
        out.push('\n');
        for line in lines {
            out.push_str(&" ".repeat(label.len()));
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

fn report(error: &MagicError) {
    eprintln!("Error: {error}");
    if error.is_usage() {
        return;
    }

    eprintln!("{error:?}");
    let mut source = error.source();
    while let Some(cause) = source {
        eprintln!("  caused by: {cause}");
        source = cause.source();
    }
}
