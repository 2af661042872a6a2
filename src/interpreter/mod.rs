//! Embedded Lua evaluator.
//!
//! Every fragment, REPL statement and `--lambda` function runs inside one
//! `Interpreter`, so names bound by earlier code stay visible to later code.
//! Output from `print` and `io.write` goes through Rust's stdout (see
//! [`output`]) and long-running code can be interrupted from a signal handler.

mod interpolate;
mod output;

use mlua::{Function, HookTriggers, Lua, LuaOptions, StdLib, Table, Value, VmState};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

pub use interpolate::HELPER as INTERPOLATE_HELPER;

/// Global holding the piped input lines, each with its line terminator.
pub const INPUT_BINDING: &str = "stdin";

/// How often the interrupt flag is polled (every N VM instructions).
const INTERRUPT_HOOK_INTERVAL: u32 = 10_000;

/// Flag set from a signal handler to stop the running evaluation.
pub type InterruptHandle = Arc<AtomicBool>;

/// Failure raised while evaluating user code.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("{}", format_lua_error(.0))]
    Lua(#[from] mlua::Error),
    #[error("interrupted")]
    Interrupted,
}

impl EvalError {
    /// True when the failure was a write to a closed downstream pipe.
    #[must_use]
    pub fn is_broken_pipe(&self) -> bool {
        match self {
            Self::Lua(error) => output::is_broken_pipe(error),
            Self::Interrupted => false,
        }
    }
}

/// How a REPL input was run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceForm {
    /// Valid as a Lua statement and run as one.
    #[default]
    Statement,
    /// Only valid as an expression (`x + 1`); run as `return (input)`.
    Expression,
}

/// Outcome of [`Interpreter::eval_interactive`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    /// Display form of a non-nil result.
    pub value: Option<String>,
    pub form: SourceForm,
}

/// The Lua state shared by a whole `lpipe` process.
pub struct Interpreter {
    lua: Lua,
    getinfo: Function,
    interrupted: InterruptHandle,
}

impl Interpreter {
    /// Create a Lua state with the standard libraries (including `debug`, as
    /// the standalone `lua` has), the stdout-backed `print`/`io.write` and the
    /// interpolation helper.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the globals cannot be installed.
    pub fn new() -> Result<Self, EvalError> {
        // SAFETY: `debug` is the only unsafe library loaded. User code gets the
        // same access it has under the standalone interpreter.
        let lua =
            unsafe { Lua::unsafe_new_with(StdLib::ALL_SAFE | StdLib::DEBUG, LuaOptions::new()) };
        let getinfo: Function = lua.globals().get::<Table>("debug")?.get("getinfo")?;
        output::install(&lua)?;
        interpolate::install(&lua)?;

        let interrupted: InterruptHandle = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&interrupted);
        lua.set_hook(
            HookTriggers::new().every_nth_instruction(INTERRUPT_HOOK_INTERVAL),
            move |_lua, _debug| {
                if flag.load(Ordering::Relaxed) {
                    return Err(mlua::Error::RuntimeError("interrupted".to_string()));
                }
                Ok(VmState::Continue)
            },
        );

        Ok(Self {
            lua,
            getinfo,
            interrupted,
        })
    }

    /// Handle to hand to a Ctrl-C handler.
    #[must_use]
    pub fn interrupt_handle(&self) -> InterruptHandle {
        Arc::clone(&self.interrupted)
    }

    /// Lua version string (`_VERSION`).
    #[must_use]
    pub fn version(&self) -> String {
        self.lua
            .globals()
            .get::<String>("_VERSION")
            .unwrap_or_else(|_| "Lua".to_string())
    }

    /// Bind the piped input lines as the `stdin` global. Lines are raw bytes;
    /// Lua strings need not be UTF-8.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the table cannot be created.
    pub fn bind_input<L: AsRef<[u8]>>(&self, lines: &[L]) -> Result<(), EvalError> {
        let strings = lines
            .iter()
            .map(|line| self.lua.create_string(line))
            .collect::<mlua::Result<Vec<_>>>()?;
        let table = self.lua.create_sequence_from(strings)?;
        self.lua.globals().set(INPUT_BINDING, table)?;
        Ok(())
    }

    /// Run a chunk as statements.
    ///
    /// # Errors
    ///
    /// Returns `Err` on syntax errors, runtime errors and interruption.
    pub fn exec(&self, source: &str) -> Result<(), EvalError> {
        self.interrupted.store(false, Ordering::Relaxed);
        let result = self.lua.load(source).set_name("=fragment").exec();
        self.finish(result)
    }

    /// Evaluate one REPL statement.
    ///
    /// The input is tried as an expression first (`return (input)`) so typing
    /// `1 + 1` echoes `2`. The returned [`SourceForm`] says whether the input
    /// also stands alone as a statement (calls do, `1 + 1` does not).
    ///
    /// # Errors
    ///
    /// Returns `Err` on syntax errors, runtime errors and interruption.
    pub fn eval_interactive(&self, source: &str) -> Result<Evaluation, EvalError> {
        self.interrupted.store(false, Ordering::Relaxed);

        let as_expr = format!("return ({source})");
        let expression = self.lua.load(as_expr.as_str()).set_name("=repl").into_function();
        let (result, form) = match expression {
            Ok(function) => {
                let form = if self.lua.load(source).into_function().is_ok() {
                    SourceForm::Statement
                } else {
                    SourceForm::Expression
                };
                (function.call::<Value>(()), form)
            }
            Err(_) => {
                let result = self.lua.load(source).set_name("=repl").exec();
                (result.map(|()| Value::Nil), SourceForm::Statement)
            }
        };

        let value = match self.finish(result)? {
            Value::Nil => None,
            value => Some(self.display(value)?),
        };
        Ok(Evaluation { value, form })
    }

    /// True when `source` is the unfinished start of a statement, so the REPL
    /// should keep reading lines.
    #[must_use]
    pub fn is_incomplete(&self, source: &str) -> bool {
        let as_expr = format!("return ({source})");
        if self.lua.load(as_expr.as_str()).into_function().is_ok() {
            return false;
        }
        matches!(
            self.lua.load(source).into_function(),
            Err(mlua::Error::SyntaxError {
                incomplete_input: true,
                ..
            })
        )
    }

    /// Evaluate `source` and report whether it yields a function.
    ///
    /// Returns `Ok(None)` for non-callable values and `Ok(Some(n))` with the
    /// function's `nparams` from `debug.getinfo` (`...` is not counted).
    ///
    /// # Errors
    ///
    /// Returns `Err` when evaluating `source` fails.
    pub fn inspect_callable(&self, source: &str) -> Result<Option<usize>, EvalError> {
        self.interrupted.store(false, Ordering::Relaxed);
        let chunk = format!("return ({})", source.trim());
        let result = self
            .lua
            .load(chunk.as_str())
            .set_name("=lambda")
            .eval::<Value>();

        match self.finish(result)? {
            Value::Function(function) => {
                let info: Table = self.getinfo.call((function, "u"))?;
                Ok(Some(info.get::<usize>("nparams")?))
            }
            _ => Ok(None),
        }
    }

    fn display(&self, value: Value) -> Result<String, EvalError> {
        let tostring: Function = self.lua.globals().get("tostring")?;
        Ok(tostring.call::<String>(value)?)
    }

    fn finish<T>(&self, result: mlua::Result<T>) -> Result<T, EvalError> {
        let interrupted = self.interrupted.swap(false, Ordering::Relaxed);
        match result {
            Ok(value) => Ok(value),
            Err(_) if interrupted => Err(EvalError::Interrupted),
            Err(e) => Err(EvalError::Lua(e)),
        }
    }
}

/// Format a Lua error for display.
fn format_lua_error(error: &mlua::Error) -> String {
    match error {
        mlua::Error::SyntaxError { message, .. } => message.clone(),
        mlua::Error::RuntimeError(msg) => msg.clone(),
        mlua::Error::CallbackError { cause, .. } | mlua::Error::WithContext { cause, .. } => {
            format_lua_error(cause)
        }
        _ => error.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_exec_keeps_globals_between_chunks() {
        let interp = Interpreter::new().unwrap();
        interp.exec("total = 40").unwrap();
        interp.exec("total = total + 2").unwrap();
        assert_eq!(interp.eval_interactive("total").unwrap().value, Some("42".to_string()));
    }

    #[test]
    fn test_eval_interactive_expression_echo() {
        let interp = Interpreter::new().unwrap();
        assert_eq!(interp.eval_interactive("1 + 1").unwrap().value, Some("2".to_string()));
        assert_eq!(
            interp.eval_interactive("'a' .. 'b'").unwrap().value,
            Some("ab".to_string())
        );
    }

    #[test]
    fn test_eval_interactive_statement_has_no_echo() {
        let interp = Interpreter::new().unwrap();
        assert_eq!(interp.eval_interactive("x = 3").unwrap().value, None);
        assert_eq!(interp.eval_interactive("nil").unwrap().value, None);
    }

    #[test]
    fn test_eval_interactive_runtime_error() {
        let interp = Interpreter::new().unwrap();
        let err = interp.eval_interactive("error('boom')").unwrap_err();
        assert!(err.to_string().contains("boom"));
        assert!(!err.is_broken_pipe());
    }

    #[test]
    fn test_bind_input_keeps_terminators() {
        let interp = Interpreter::new().unwrap();
        interp
            .bind_input(&["a\n".to_string(), "b\n".to_string()])
            .unwrap();
        assert_eq!(interp.eval_interactive("#stdin").unwrap().value, Some("2".to_string()));
        assert_eq!(
            interp.eval_interactive("stdin[2]").unwrap().value,
            Some("b\n".to_string())
        );
    }

    #[test]
    fn test_is_incomplete() {
        let interp = Interpreter::new().unwrap();
        assert!(interp.is_incomplete("for i = 1, 3 do"));
        assert!(interp.is_incomplete("function f(x)"));
        assert!(!interp.is_incomplete("x = 1"));
        assert!(!interp.is_incomplete("1 +"));
    }

    #[test]
    fn test_inspect_callable_arity() {
        let interp = Interpreter::new().unwrap();
        assert_eq!(
            interp.inspect_callable("function(line) return line end").unwrap(),
            Some(1)
        );
        assert_eq!(interp.inspect_callable("function() end").unwrap(), Some(0));
        assert_eq!(interp.inspect_callable("function(a, b) end").unwrap(), Some(2));
        assert_eq!(interp.inspect_callable("function(a, ...) end").unwrap(), Some(1));
        assert_eq!(interp.inspect_callable("42").unwrap(), None);
        assert!(interp.inspect_callable("function(").is_err());
    }

    #[test]
    fn test_interrupt_stops_running_code() {
        let interp = Interpreter::new().unwrap();
        let handle = interp.interrupt_handle();
        let setter = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            handle.store(true, Ordering::Relaxed);
        });

        let err = interp.exec("while true do end").unwrap_err();
        setter.join().unwrap();
        assert!(matches!(err, EvalError::Interrupted));

        // The state is still usable afterwards.
        interp.exec("after = 1").unwrap();
    }

    #[test]
    fn test_inspect_callable_ignores_comments_in_parameter_list() {
        let interp = Interpreter::new().unwrap();
        assert_eq!(
            interp
                .inspect_callable("function(--[[a, b]] line) return line end")
                .unwrap(),
            Some(1)
        );
        assert_eq!(interp.inspect_callable("function(...) end").unwrap(), Some(0));
    }

    #[test]
    fn test_eval_interactive_reports_source_form() {
        let interp = Interpreter::new().unwrap();
        let eval = interp.eval_interactive("x = 20").unwrap();
        assert_eq!(eval.form, SourceForm::Statement);

        let eval = interp.eval_interactive("x + 1").unwrap();
        assert_eq!(eval.form, SourceForm::Expression);
        assert_eq!(eval.value, Some("21".to_string()));

        let eval = interp.eval_interactive("tostring(x)").unwrap();
        assert_eq!(eval.form, SourceForm::Statement);
    }

    #[test]
    fn test_bind_input_accepts_non_utf8_bytes() {
        let interp = Interpreter::new().unwrap();
        interp.bind_input(&[vec![0xE9, b'\n']]).unwrap();
        assert_eq!(interp.eval_interactive("#stdin[1]").unwrap().value, Some("2".to_string()));
    }
}
