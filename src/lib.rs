//! # lpipe
//!
//! An interactive Lua shell that sits at the end of a pipe.
//!
//! Command-line flags are translated, in the order given, into Lua fragments
//! run against the piped input. With no flags, a REPL starts instead; its
//! successfully evaluated statements can be exported as a Lua script or an
//! executable bash wrapper.

pub mod args;
pub mod cli;
pub mod config;
pub mod executor;
pub mod export;
pub mod history;
pub mod interpreter;
pub mod magic;
pub mod repl;
pub mod translate;

/// Print an error message and exit with code 1.
pub fn fatal_error(message: &str) -> ! {
    eprintln!("{message}");
    std::process::exit(1);
}
