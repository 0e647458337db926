//! # Runtime Configuration Module
//!
//! Environment variable-based configuration for the engine's runtime behavior:
//! spec file location, listen address, coroutine stack size, and whether the
//! Sync Pipeline runs on startup.
//!
//! ## Environment Variables
//!
//! - `OUROBOROS_SPEC_PATH` — path to the file spec. Default: `openapi.yaml`.
//! - `OUROBOROS_ADDR` — HTTP listen address. Default: `0.0.0.0:8080`.
//! - `OUROBOROS_STACK_SIZE` — coroutine stack size in bytes, decimal or `0x`-hex.
//!   Default: `0x4000` (16 KB).
//! - `OUROBOROS_SYNC_ON_START` — run the Sync Pipeline before serving. Default: `true`.
//!
//! ```rust
//! use ouroboros_core::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! println!("Stack size: {} bytes", config.stack_size);
//! ```

use std::env;

/// Runtime configuration loaded from environment variables.
///
/// Load this at startup using [`RuntimeConfig::from_env()`].
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Path to the on-disk OpenAPI file spec.
    pub spec_path: String,
    /// Address the HTTP server binds to.
    pub addr: String,
    /// Stack size for coroutines in bytes (default: 16 KB / 0x4000).
    pub stack_size: usize,
    /// Whether to run the Sync Pipeline before accepting requests.
    pub sync_on_start: bool,
}

impl RuntimeConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let spec_path =
            env::var("OUROBOROS_SPEC_PATH").unwrap_or_else(|_| "openapi.yaml".to_string());
        let addr = env::var("OUROBOROS_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let stack_size = match env::var("OUROBOROS_STACK_SIZE") {
            Ok(val) => {
                if let Some(hex) = val.strip_prefix("0x") {
                    usize::from_str_radix(hex, 16).unwrap_or(0x4000)
                } else {
                    val.parse().unwrap_or(0x4000)
                }
            }
            Err(_) => 0x4000,
        };
        let sync_on_start = match env::var("OUROBOROS_SYNC_ON_START") {
            Ok(val) => !matches!(val.to_ascii_lowercase().as_str(), "0" | "false" | "no"),
            Err(_) => true,
        };
        RuntimeConfig {
            spec_path,
            addr,
            stack_size,
            sync_on_start,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_env() {
        // SAFETY: test-only mutation of process env, single-threaded test.
        unsafe {
            env::remove_var("OUROBOROS_SPEC_PATH");
            env::remove_var("OUROBOROS_ADDR");
            env::remove_var("OUROBOROS_STACK_SIZE");
            env::remove_var("OUROBOROS_SYNC_ON_START");
        }
        let cfg = RuntimeConfig::from_env();
        assert_eq!(cfg.spec_path, "openapi.yaml");
        assert_eq!(cfg.addr, "0.0.0.0:8080");
        assert_eq!(cfg.stack_size, 0x4000);
        assert!(cfg.sync_on_start);
    }

    #[test]
    fn parses_hex_stack_size() {
        unsafe {
            env::set_var("OUROBOROS_STACK_SIZE", "0x8000");
        }
        let cfg = RuntimeConfig::from_env();
        assert_eq!(cfg.stack_size, 0x8000);
        unsafe {
            env::remove_var("OUROBOROS_STACK_SIZE");
        }
    }
}
