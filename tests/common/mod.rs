//! Common test helpers shared across integration tests

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(dead_code)] // Not all helpers are used by every test file

use std::env;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

/// Package version for testing --version flag
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Helper to get the compiled binary path
pub fn get_binary_path() -> PathBuf {
    let mut path = env::current_exe().unwrap();
    path.pop(); // Remove test executable name

    // Integration tests live in 'deps'
    if path.ends_with("deps") {
        path.pop();
    }

    path.push("lpipe");

    if !path.exists() {
        let build_output = Command::new("cargo")
            .args(["build", "--bin", "lpipe"])
            .output()
            .expect("Failed to build binary");

        assert!(
            build_output.status.success(),
            "Failed to build lpipe binary: {}",
            String::from_utf8_lossy(&build_output.stderr)
        );
    }

    path
}

/// Helper to create a temporary directory for tests
pub fn create_temp_dir() -> tempfile::TempDir {
    tempfile::TempDir::new().unwrap()
}

/// Helper to create a Command with a clean logging environment
pub fn test_command() -> Command {
    let mut cmd = Command::new(get_binary_path());
    cmd.env_remove("LPIPE_LOG");
    cmd
}

/// Run lpipe with `args`, feeding `input` on stdin
pub fn run_with_input(args: &[&str], input: impl AsRef<[u8]>) -> Output {
    let mut child = test_command()
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn lpipe");

    // lpipe may exit before reading everything (e.g. `--help`)
    let _ = child.stdin.take().unwrap().write_all(input.as_ref());
    child.wait_with_output().expect("Failed to wait for lpipe")
}

/// Helper to check if bash is available on the system
pub fn is_bash_available() -> bool {
    which::which("bash").is_ok()
}

/// Helper to find a standalone Lua 5.3+ interpreter (5.1 lacks `lines("L")`)
pub fn lua_program() -> Option<String> {
    ["lua5.4", "lua"]
        .into_iter()
        .filter(|program| which::which(program).is_ok())
        .find(|program| {
            Command::new(program).arg("-v").output().is_ok_and(|out| {
                let banner = format!(
                    "{}{}",
                    String::from_utf8_lossy(&out.stdout),
                    String::from_utf8_lossy(&out.stderr)
                );
                banner.contains("Lua 5.4") || banner.contains("Lua 5.3")
            })
        })
        .map(str::to_string)
}
