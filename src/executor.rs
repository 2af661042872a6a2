//! Batch mode: run translated fragments once against the piped input.

use crate::interpreter::{EvalError, Interpreter};
use crate::translate::Fragment;
use std::io::{self, IsTerminal, Write};

/// Run `fragments` in order, stopping at the first failure.
///
/// A write to a closed downstream pipe (`lpipe ... | head -1`) ends the run
/// quietly when stdout is not a terminal.
///
/// # Errors
///
/// Returns the first evaluation error that is not a swallowed broken pipe.
pub fn run_batch(interpreter: &Interpreter, fragments: &[Fragment]) -> Result<(), EvalError> {
    let stdout_is_terminal = io::stdout().is_terminal();

    for (index, fragment) in fragments.iter().enumerate() {
        log::debug!("running fragment {index}: {fragment}");
        if let Err(e) = interpreter.exec(fragment.source()) {
            if swallow(&e, stdout_is_terminal) {
                log::debug!("downstream closed the pipe; stopping");
                return Ok(());
            }
            return Err(e);
        }
    }

    if let Err(e) = io::stdout().flush() {
        if e.kind() == io::ErrorKind::BrokenPipe && !stdout_is_terminal {
            return Ok(());
        }
        return Err(EvalError::Lua(mlua::Error::external(e)));
    }
    Ok(())
}

fn swallow(error: &EvalError, stdout_is_terminal: bool) -> bool {
    error.is_broken_pipe() && !stdout_is_terminal
}
