//! Stdout-backed `print` and `io.write`.
//!
//! Lua's own versions write through C stdio, which buffers separately from
//! Rust's stdout and silently drops `EPIPE`. These replacements share Rust's
//! handle, so output stays ordered with the REPL echo and a closed downstream
//! pipe comes back as an `io::Error` inside the evaluation error.

use mlua::{Function, Lua, MultiValue, Table, Value};
use std::io::{self, Write};

pub(super) fn install(lua: &Lua) -> mlua::Result<()> {
    let print = lua.create_function(|lua, args: MultiValue| {
        let tostring: Function = lua.globals().get("tostring")?;
        let mut line = String::new();
        for (i, value) in args.into_iter().enumerate() {
            if i > 0 {
                line.push('\t');
            }
            line.push_str(&tostring.call::<String>(value)?);
        }
        line.push('\n');
        write_stdout(line.as_bytes())
    })?;
    lua.globals().set("print", print)?;

    let write = lua.create_function(|lua, args: MultiValue| {
        let tostring: Function = lua.globals().get("tostring")?;
        for value in args {
            match value {
                Value::String(s) => write_stdout(&s.as_bytes())?,
                Value::Integer(_) | Value::Number(_) => {
                    write_stdout(tostring.call::<String>(value)?.as_bytes())?;
                }
                other => {
                    return Err(mlua::Error::RuntimeError(format!(
                        "bad argument to 'write' (string expected, got {})",
                        other.type_name()
                    )));
                }
            }
        }
        let io: Table = lua.globals().get("io")?;
        io.get::<Value>("stdout")
    })?;
    let io: Table = lua.globals().get("io")?;
    io.set("write", write)?;

    Ok(())
}

fn write_stdout(bytes: &[u8]) -> mlua::Result<()> {
    io::stdout()
        .lock()
        .write_all(bytes)
        .map_err(mlua::Error::external)
}

/// Walk the wrapped causes of a Lua error looking for `EPIPE`.
pub(super) fn is_broken_pipe(error: &mlua::Error) -> bool {
    match error {
        mlua::Error::CallbackError { cause, .. } | mlua::Error::WithContext { cause, .. } => {
            is_broken_pipe(cause)
        }
        mlua::Error::ExternalError(inner) => inner
            .downcast_ref::<io::Error>()
            .is_some_and(|e| e.kind() == io::ErrorKind::BrokenPipe),
        _ => false,
    }
}
