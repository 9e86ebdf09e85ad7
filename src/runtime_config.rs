//! # Runtime Configuration Module
//!
//! Environment variable-based configuration for the binding pipeline's runtime
//! behavior.
//!
//! ## Environment Variables
//!
//! ### `BRRTB_STACK_SIZE`
//!
//! Stack size for endpoint coroutines. Accepts values in:
//! - Decimal: `65536` (64 KB)
//! - Hexadecimal: `0x10000` (64 KB)
//!
//! Default: `0x10000` (64 KB). Resolvers and handlers run on the endpoint coroutine,
//! so deep dependency graphs need a larger stack.
//!
//! ### `BRRTB_VALIDATION_STATUS`
//!
//! Status code used for "unprocessable input" replies. Default: `422`.
//!
//! ### `BRRTB_MAX_BODY_BYTES`
//!
//! Largest request body the binder will decode; larger bodies fail with a
//! `RANGE_ERROR` at `body`. Decimal or `0x` hex. Default: 10 MiB.
//!
//! ## Usage
//!
//! ```rust
//! use brrtbind::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! println!("Stack size: {} bytes", config.stack_size);
//! ```
//!
//! Invalid values fall back to the defaults with a warning.

use crate::binder::DEFAULT_MAX_BODY_BYTES;
use std::env;
use tracing::warn;

pub const DEFAULT_STACK_SIZE: usize = 0x10000;
pub const DEFAULT_VALIDATION_STATUS: u16 = 422;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Stack size for endpoint coroutines in bytes (default: 64 KB / 0x10000)
    pub stack_size: usize,
    /// Status of validation failure replies (default: 422)
    pub validation_status: u16,
    /// Body size limit in bytes (default: 10 MiB)
    pub max_body_bytes: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            stack_size: DEFAULT_STACK_SIZE,
            validation_status: DEFAULT_VALIDATION_STATUS,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

fn parse_size(val: &str) -> Option<usize> {
    let val = val.trim();
    match val.strip_prefix("0x").or_else(|| val.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => val.parse().ok(),
    }
}

fn size_from_env(key: &str, default: usize) -> usize {
    match env::var(key) {
        Ok(val) => parse_size(&val).unwrap_or_else(|| {
            warn!(key, value = %val, default, "Invalid size, using default");
            default
        }),
        Err(_) => default,
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let stack_size = size_from_env("BRRTB_STACK_SIZE", DEFAULT_STACK_SIZE);
        let max_body_bytes = size_from_env("BRRTB_MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES);
        let validation_status = match env::var("BRRTB_VALIDATION_STATUS") {
            Ok(val) => match val.trim().parse::<u16>() {
                Ok(code) if (400..=599).contains(&code) => code,
                _ => {
                    warn!(value = %val, "BRRTB_VALIDATION_STATUS must be a 4xx or 5xx code, using 422");
                    DEFAULT_VALIDATION_STATUS
                }
            },
            Err(_) => DEFAULT_VALIDATION_STATUS,
        };
        RuntimeConfig {
            stack_size,
            validation_status,
            max_body_bytes,
        }
    }
}
