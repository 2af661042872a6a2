//! Export of session history.
//!
//! Selected history entries are joined with blank lines and written either
//! as a plain Lua script or as an executable bash wrapper that runs the code
//! with a standalone `lua`, optionally fed by an upstream shell command.

use crate::config::Settings;
use crate::history::{HistoryError, IndexSelector, Selection, SessionHistory};
use crate::interpreter::INPUT_BINDING;
use regex::Regex;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

/// Rebuilds the `stdin` global for code running outside `lpipe`.
pub const STDIN_PREAMBLE: &str =
    "stdin = {}\nfor line in io.stdin:lines(\"L\") do stdin[#stdin + 1] = line end\n";

/// A reference to the bare `stdin` global (not `io.stdin` or a field).
static INPUT_REF_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(^|[^.:\w]){INPUT_BINDING}\b"))
        .expect("input reference regex pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportFormat {
    /// The joined statements, runnable with `lua <file>`.
    Script,
    /// A bash script embedding the code; `upstream` output is piped into it.
    Wrapper { upstream: Option<String> },
}

impl ExportFormat {
    fn label(&self) -> &'static str {
        match self {
            ExportFormat::Script => "script",
            ExportFormat::Wrapper { .. } => "executable",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub destination: PathBuf,
    pub selection: Selection,
    pub format: ExportFormat,
    pub overwrite: bool,
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("{} already exists (use --overwrite to replace it)", .0.display())]
    Exists(PathBuf),
    #[error("--all cannot be combined with explicit indices")]
    Conflict,
    #[error("nothing to export: give history indices or --all")]
    Empty,
    #[error(transparent)]
    Selection(#[from] HistoryError),
    #[error("failed to write {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ExportError {
    /// Errors caused by the request itself rather than the filesystem.
    #[must_use]
    pub fn is_usage(&self) -> bool {
        !matches!(self, ExportError::Io { .. })
    }
}

/// Outcome of a successful export.
#[derive(Debug, Clone)]
pub struct ExportReport {
    pub path: PathBuf,
    pub entries: usize,
    pub format: ExportFormat,
}

impl fmt::Display for ExportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Exported {} statement(s) to {} ({})",
            self.entries,
            self.path.display(),
            self.format.label()
        )
    }
}

/// Combine `--all` and explicit indices into a selection.
///
/// # Errors
///
/// `Conflict` when both are given, `Empty` when neither is.
pub fn build_selection(all: bool, indices: Vec<IndexSelector>) -> Result<Selection, ExportError> {
    match (all, indices.is_empty()) {
        (true, false) => Err(ExportError::Conflict),
        (true, true) => Ok(Selection::All),
        (false, false) => Ok(Selection::Indices(indices)),
        (false, true) => Err(ExportError::Empty),
    }
}

/// Write the selected history entries to `request.destination`.
///
/// Bare expressions are written as statements that print their value (see
/// [`crate::history::HistoryEntry::as_statement`]). Nothing is written unless every check
/// passes.
///
/// # Errors
///
/// Returns `Exists` when the destination exists and `overwrite` is false,
/// `Selection` for an unknown index and `Io` when writing fails.
pub fn export(
    request: &ExportRequest,
    history: &SessionHistory,
    settings: &Settings,
) -> Result<ExportReport, ExportError> {
    let path = &request.destination;
    if path.exists() && !request.overwrite {
        return Err(ExportError::Exists(path.clone()));
    }

    let entries = history.select(&request.selection)?;
    let body = entries
        .iter()
        .map(|entry| entry.as_statement())
        .collect::<Vec<_>>()
        .join("\n\n");
    log::debug!(
        "exporting {} entr{} to {} as {}",
        entries.len(),
        if entries.len() == 1 { "y" } else { "ies" },
        path.display(),
        request.format.label()
    );

    let io_error = |source| ExportError::Io {
        path: path.clone(),
        source,
    };
    match &request.format {
        ExportFormat::Script => fs::write(path, &body).map_err(io_error)?,
        ExportFormat::Wrapper { upstream } => {
            let script = render_wrapper(&body, upstream.as_deref(), &settings.lua_program);
            fs::write(path, script).map_err(io_error)?;
            make_executable(path).map_err(io_error)?;
        }
    }

    Ok(ExportReport {
        path: path.clone(),
        entries: entries.len(),
        format: request.format.clone(),
    })
}

/// True when `code` reads the `stdin` global.
#[must_use]
pub fn references_input(code: &str) -> bool {
    INPUT_REF_REGEX.is_match(code)
}

/// Build the bash wrapper around `body`.
#[must_use]
pub fn render_wrapper(body: &str, upstream: Option<&str>, lua_program: &str) -> String {
    let code = if references_input(body) {
        format!("{STDIN_PREAMBLE}{body}")
    } else {
        body.to_string()
    };

    let program = shell_words::quote(lua_program);
    let invocation = match upstream {
        Some(command) => format!("{command} | {program} -e \"$CODE\""),
        None => format!("{program} -e \"$CODE\""),
    };

    format!(
        "#!/usr/bin/env bash\n\
         set -euo pipefail\n\
         trap 'exit' INT TERM ERR EXIT\n\
         \n\
         CODE={}\n\
         \n\
         {invocation}\n",
        shell_words::quote(&code)
    )
}

/// Add owner read/write/execute to the file's current mode.
#[cfg(unix)]
fn make_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_mode(permissions.mode() | 0o700);
    fs::set_permissions(path, permissions)
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}
