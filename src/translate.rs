//! Translation of command-line flags into Lua fragments.
//!
//! Every recognized flag value becomes zero or more [`Fragment`]s. Values are
//! validated here, before any input is processed; the CLI treats a
//! [`UsageError`] as fatal.

use crate::args::{FlagKind, FlagValue, ParsedArguments};
use crate::interpreter::{EvalError, INPUT_BINDING, INTERPOLATE_HELPER, Interpreter};
use regex::Regex;
use std::fmt;
use std::fs;
use std::io;
use std::sync::LazyLock;
use thiserror::Error;

/// Paths produced by process substitution, e.g. `-c <(cat script.lua)`.
static FD_PATH_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/(dev|proc/self)/fd/[0-9]+$").expect("fd path regex pattern is valid")
});

/// Keyword every `--lambda` value must start with.
const LAMBDA_KEYWORD: &str = "function";

/// One runnable unit of Lua source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment(String);

impl Fragment {
    #[must_use]
    pub fn source(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Invalid flag value.
#[derive(Debug, Error)]
pub enum UsageError {
    #[error("invalid --fprint template {0:?}: single quotes must be escaped as \\'")]
    UnbalancedQuote(String),
    #[error(
        "--lambda expects an anonymous function such as 'function(line) return line end', got {0:?}"
    )]
    NotALambda(String),
    #[error("--lambda function must take exactly one argument, but it takes {0}")]
    LambdaArity(usize),
    #[error(transparent)]
    LambdaEval(#[from] EvalError),
    #[error("cannot read --code from {path}: {source}")]
    CodePath {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Translate all flags, in the order they were supplied.
///
/// # Errors
///
/// Returns the first [`UsageError`] encountered.
pub fn fragments(
    parsed: &ParsedArguments,
    interpreter: &Interpreter,
) -> Result<Vec<Fragment>, UsageError> {
    let mut out = Vec::new();
    for (flag, value) in parsed.ordered() {
        out.extend(translate_one(flag, value, interpreter)?);
    }
    log::debug!("translated {} flag(s) into {} fragment(s)", parsed.assignments().len(), out.len());
    Ok(out)
}

/// Translate every value of one flag.
///
/// # Errors
///
/// Returns the first [`UsageError`] encountered.
pub fn translate(
    flag: FlagKind,
    value: &FlagValue,
    interpreter: &Interpreter,
) -> Result<Vec<Fragment>, UsageError> {
    let mut out = Vec::new();
    for item in value.iter() {
        out.extend(translate_one(flag, item, interpreter)?);
    }
    Ok(out)
}

/// Translate a single flag value.
///
/// # Errors
///
/// Returns a [`UsageError`] when the value fails the flag's validation.
pub fn translate_one(
    flag: FlagKind,
    value: &str,
    interpreter: &Interpreter,
) -> Result<Vec<Fragment>, UsageError> {
    match flag {
        FlagKind::Print => Ok(vec![Fragment(format!("print({value})"))]),
        FlagKind::Interpolate => {
            if !quotes_balanced(value) {
                return Err(UsageError::UnbalancedQuote(value.to_string()));
            }
            let literal = escape_line_breaks(value);
            Ok(vec![Fragment(format!("print({INTERPOLATE_HELPER}('{literal}'))"))])
        }
        FlagKind::Lambda => lambda_fragment(value, interpreter).map(|f| vec![f]),
        FlagKind::Code => code_fragment(value).map(|f| f.into_iter().collect()),
    }
}

/// Short Lua strings cannot hold a raw line break unless it is escaped.
fn escape_line_breaks(template: &str) -> String {
    let mut out = String::with_capacity(template.len());
    let mut escaped = false;
    for ch in template.chars() {
        match ch {
            '\n' if !escaped => out.push_str("\\n"),
            '\r' if !escaped => out.push_str("\\r"),
            _ => out.push(ch),
        }
        escaped = ch == '\\' && !escaped;
    }
    out
}

/// A template is embedded in a single-quoted Lua string, so a bare `'` would
/// end it early. A backslash always escapes the next character.
fn quotes_balanced(template: &str) -> bool {
    let mut chars = template.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                if chars.next().is_none() {
                    return false;
                }
            }
            '\'' => return false,
            _ => {}
        }
    }
    true
}

fn starts_with_keyword(source: &str) -> bool {
    source.strip_prefix(LAMBDA_KEYWORD).is_some_and(|rest| {
        !rest
            .chars()
            .next()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
    })
}

fn lambda_fragment(source: &str, interpreter: &Interpreter) -> Result<Fragment, UsageError> {
    let trimmed = source.trim();
    if !starts_with_keyword(trimmed) {
        return Err(UsageError::NotALambda(source.to_string()));
    }

    match interpreter.inspect_callable(trimmed)? {
        None => Err(UsageError::NotALambda(source.to_string())),
        Some(1) => Ok(Fragment(format!(
            "local __lambda = ({trimmed})\n\
             for _, __line in ipairs({INPUT_BINDING} or {{}}) do\n\
             \x20   local __out = __lambda(__line)\n\
             \x20   if __out then\n\
             \x20       io.write(tostring(__out))\n\
             \x20   end\n\
             end"
        ))),
        Some(arity) => Err(UsageError::LambdaArity(arity)),
    }
}

fn code_fragment(value: &str) -> Result<Option<Fragment>, UsageError> {
    let source = if FD_PATH_REGEX.is_match(value) {
        fs::read_to_string(value).map_err(|source| UsageError::CodePath {
            path: value.to_string(),
            source,
        })?
    } else {
        value.to_string()
    };

    if source.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(Fragment(source)))
}
