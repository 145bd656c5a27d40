// Project-wide constants
//
// Centralised here so port numbers and other magic values have one
// source of truth. Import via `use crate::config::constants::*;`.

/// Default bind address for the HTTP server (localhost only).
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// Config file location, relative to the home directory.
pub const CONFIG_RELATIVE_PATH: &str = ".ideaforge/config.toml";

/// Default output cap for a single model call.
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 2048;

/// HTTP timeout for a single model call, in seconds.
///
/// Generation of five long ideas can take well over a minute on slower models.
pub const PROVIDER_TIMEOUT_SECS: u64 = 120;

/// Sustained run submissions per second, per client IP.
pub const DEFAULT_RATE_LIMIT_RPS: u32 = 1;

/// Submission burst size, per client IP.
pub const DEFAULT_RATE_LIMIT_BURST: u32 = 5;

/// Default built-in persona.
pub const DEFAULT_PERSONA: &str = "constructive";
