//! API key resolution for the generation and embedding backends

use taskloop_core::{Result, TaskloopError};
use std::env;

/// Read an API key from the named environment variable
///
/// Empty values count as missing.
pub fn get_api_key(env_var: &str) -> Result<String> {
    match env::var(env_var) {
        Ok(key) if !key.trim().is_empty() => {
            tracing::debug!("Using API key from {}", env_var);
            Ok(key)
        }
        _ => Err(TaskloopError::Auth(format!(
            "No API key found. Set {}=<key> in the environment",
            env_var
        ))),
    }
}
