//! # lpipe
//!
//! Compose Lua one-liners over piped input, or explore it interactively.
//!
//! ## Usage
//!
//! - Print expressions: `seq 3 | lpipe -p '#stdin' -p 'stdin[1]'`
//! - Interpolate: `ls | lpipe -f '{#stdin} entries'`
//! - Filter lines: `cat log | lpipe -l 'function(l) return l:find("ERR") and l end'`
//! - Run a script: `lpipe -c <(cat transform.lua) < data.txt`
//! - Interactive shell: `lpipe` (or `cat data.txt | lpipe`), then `%export` to save
//!
//! See README.md for more details and examples.

fn main() {
    lpipe::cli::run_cli();
}
