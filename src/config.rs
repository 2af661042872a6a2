//! Settings read from the environment.

/// Overrides the interpreter invoked by exported wrapper scripts.
pub const LUA_PROGRAM_ENV: &str = "LPIPE_LUA";

/// `env_logger` filter for diagnostics.
pub const LOG_ENV: &str = "LPIPE_LOG";

/// Standalone interpreters tried, in order, when `LPIPE_LUA` is unset.
const LUA_CANDIDATES: [&str; 2] = ["lua5.4", "lua"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Program that runs exported wrapper scripts (`<program> -e "$CODE"`).
    pub lua_program: String,
}

impl Settings {
    /// Build settings from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        let lua_program = std::env::var(LUA_PROGRAM_ENV)
            .ok()
            .filter(|program| !program.trim().is_empty())
            .unwrap_or_else(get_lua_executable);
        log::debug!("exported wrappers will run '{lua_program}'");
        Self { lua_program }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            lua_program: "lua".to_string(),
        }
    }
}

/// Get the Lua executable (prefers an explicitly versioned 5.4 binary).
fn get_lua_executable() -> String {
    LUA_CANDIDATES
        .iter()
        .find(|candidate| which::which(candidate).is_ok())
        .map_or_else(|| "lua".to_string(), ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_program() {
        assert_eq!(Settings::default().lua_program, "lua");
    }

    #[test]
    fn test_lua_executable_is_a_candidate() {
        assert!(LUA_CANDIDATES.contains(&get_lua_executable().as_str()));
    }
}
