//! `{expr}` substitution used by `--fprint` fragments.
//!
//! Expressions are evaluated against the session globals and rendered with
//! `tostring`. `{{` and `}}` produce literal braces.

use mlua::{Function, Lua, Value};
use std::iter::Peekable;
use std::str::Chars;

/// Global name of the helper.
pub const HELPER: &str = "__interpolate";

pub(super) fn install(lua: &Lua) -> mlua::Result<()> {
    let helper = lua.create_function(|lua, template: String| interpolate(lua, &template))?;
    lua.globals().set(HELPER, helper)
}

fn interpolate(lua: &Lua, template: &str) -> mlua::Result<String> {
    let tostring: Function = lua.globals().get("tostring")?;
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let expr = take_expression(&mut chars)?;
                let chunk = format!("return {expr}");
                let value = lua
                    .load(chunk.as_str())
                    .set_name("=interpolation")
                    .eval::<Value>()?;
                out.push_str(&tostring.call::<String>(value)?);
            }
            '}' => {
                return Err(mlua::Error::RuntimeError(
                    "single '}' is not allowed in a template".to_string(),
                ));
            }
            _ => out.push(ch),
        }
    }

    Ok(out)
}

/// Consume characters up to the `}` closing the current placeholder.
/// Nested braces (table constructors) are kept balanced.
fn take_expression(chars: &mut Peekable<Chars<'_>>) -> mlua::Result<String> {
    let mut expr = String::new();
    let mut depth = 0usize;

    for ch in chars.by_ref() {
        match ch {
            '}' if depth == 0 => {
                if expr.trim().is_empty() {
                    return Err(mlua::Error::RuntimeError(
                        "empty expression in template".to_string(),
                    ));
                }
                return Ok(expr);
            }
            '{' => depth += 1,
            '}' => depth -= 1,
            _ => {}
        }
        expr.push(ch);
    }

    Err(mlua::Error::RuntimeError(
        "unterminated '{' in template".to_string(),
    ))
}
