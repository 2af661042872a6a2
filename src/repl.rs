//! Interactive REPL over the shared Lua state.
//!
//! Lines are read with rustyline from the controlling terminal, so the
//! session still works after stdin has been consumed as pipe input.
//! Statements that evaluate without error are appended to the session
//! history, which `%export` turns into scripts.

use crate::config::Settings;
use crate::history::{HistoryEntry, SessionHistory};
use crate::interpreter::{EvalError, Interpreter};
use crate::magic::{Dispatch, MagicDispatcher};
use rustyline::DefaultEditor;
use rustyline::config::{Behavior, Config};
use rustyline::error::ReadlineError;
use std::io::{self, Write};
use std::sync::atomic::Ordering;

const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shown while a multi-line statement is still open.
const CONTINUATION_PROMPT: &str = "...> ";

/// Result of one complete REPL input.
#[derive(Debug, PartialEq, Eq)]
pub enum Processed {
    /// Consumed by a magic command.
    Magic,
    /// Evaluated; holds the display form of a non-nil value.
    Value(Option<String>),
}

/// Interpreter, history and magic commands for one interactive session.
pub struct Session {
    interpreter: Interpreter,
    history: SessionHistory,
    dispatcher: MagicDispatcher,
}

impl Session {
    #[must_use]
    pub fn new(interpreter: Interpreter, settings: Settings) -> Self {
        Self {
            interpreter,
            history: SessionHistory::new(),
            dispatcher: MagicDispatcher::new(settings),
        }
    }

    #[must_use]
    pub fn history(&self) -> &SessionHistory {
        &self.history
    }

    /// Primary prompt, numbered with the index the next statement will get.
    #[must_use]
    pub fn prompt(&self) -> String {
        format!("lpipe[{}]> ", self.history.len())
    }

    /// True when `buffer` opens a block that is not closed yet.
    #[must_use]
    pub fn needs_more_input(&self, buffer: &str) -> bool {
        !MagicDispatcher::is_magic(buffer) && self.interpreter.is_incomplete(buffer)
    }

    /// Handle one complete input: magic commands first, then evaluation.
    ///
    /// # Errors
    ///
    /// Returns the evaluation error; failed input is not recorded.
    pub fn process(&mut self, input: &str) -> Result<Processed, EvalError> {
        if self.dispatcher.dispatch(input, &self.history) == Dispatch::Handled {
            return Ok(Processed::Magic);
        }

        let eval = self.interpreter.eval_interactive(input)?;
        self.history.append(HistoryEntry::new(input, eval.form));
        Ok(Processed::Value(eval.value))
    }

    fn run_input(&mut self, input: &str) {
        match self.process(input) {
            Ok(Processed::Value(Some(value))) => println!("{value}"),
            Ok(Processed::Value(None) | Processed::Magic) => {}
            Err(e) => eprintln!("Error: {e}"),
        }
        if let Err(e) = io::stdout().flush() {
            log::warn!("cannot flush stdout: {e}");
        }
    }
}

/// Start an interactive session. Returns when the user exits.
pub fn run_repl(interpreter: Interpreter, settings: Settings) {
    println!("lpipe {} ({})", PKG_VERSION, interpreter.version());
    println!("Type %help for magic commands, 'exit' or Ctrl+D to quit\n");

    let handle = interpreter.interrupt_handle();
    if let Err(e) = ctrlc::set_handler(move || handle.store(true, Ordering::Relaxed)) {
        log::warn!("cannot install Ctrl-C handler: {e}");
    }

    let config = Config::builder()
        .behavior(Behavior::PreferTerm)
        .auto_add_history(true)
        .build();
    let mut editor = match DefaultEditor::with_config(config) {
        Ok(editor) => editor,
        Err(e) => crate::fatal_error(&format!("Error: cannot open terminal: {e}")),
    };

    let mut session = Session::new(interpreter, settings);
    let mut buffer = String::new();

    loop {
        let prompt = if buffer.is_empty() {
            session.prompt()
        } else {
            CONTINUATION_PROMPT.to_string()
        };

        match editor.readline(&prompt) {
            Ok(line) => {
                if buffer.is_empty() {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    if trimmed == "exit" || trimmed == "quit" {
                        break;
                    }
                } else {
                    buffer.push('\n');
                }
                buffer.push_str(&line);

                if session.needs_more_input(&buffer) {
                    continue;
                }
                let input = std::mem::take(&mut buffer);
                session.run_input(&input);
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl-C at the prompt drops the pending statement
                buffer.clear();
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Error reading input: {e}");
                break;
            }
        }
    }

    log::debug!("session ended with {} history entries", session.history().len());
    println!("Goodbye!");
}
