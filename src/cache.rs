//! Cache key derivation for the host runner's transform cache.
//!
//! Jest has called `getCacheKey` with two different signatures over time. The
//! trailing arguments are decoded once into [`CacheKeyArgs`]; nothing past this
//! boundary sees the raw argument list.

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{Result, TransformError};

/// Bumped whenever the fingerprint layout changes, invalidating every old key.
pub const CACHE_EPOCH: &str = "lwc-jest-transformer/v2";

/// Environment variable folded into every key.
pub const ENVIRONMENT_VARIABLE: &str = "NODE_ENV";

const FIELD_DELIMITER: [u8; 1] = [0];

/// Trailing arguments of a `getCacheKey` call.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheKeyArgs {
    /// `(sourceText, sourcePath, { configString, ... })`, Jest 27 and later.
    Options { config_string: String, transform_config: Value },
    /// `(sourceText, sourcePath, configString, transformConfig)`, Jest 26.
    Positional { config_string: String, transform_config: Value },
}

impl CacheKeyArgs {
    /// Decodes the arguments that follow `sourceText` and `sourcePath`.
    pub fn from_values(rest: &[Value]) -> Result<Self> {
        match rest {
            [options] => {
                let config_string = options
                    .get("configString")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        TransformError::InvalidArgument("options.configString must be a string".to_string())
                    })?;
                Ok(CacheKeyArgs::Options {
                    config_string: config_string.to_string(),
                    transform_config: options.clone(),
                })
            }
            [config_string, transform_config] => {
                let config_string = config_string.as_str().ok_or_else(|| {
                    TransformError::InvalidArgument("configString must be a string".to_string())
                })?;
                Ok(CacheKeyArgs::Positional {
                    config_string: config_string.to_string(),
                    transform_config: transform_config.clone(),
                })
            }
            _ => Err(TransformError::UnexpectedArguments { count: rest.len() }),
        }
    }

    pub fn config_string(&self) -> &str {
        match self {
            CacheKeyArgs::Options { config_string, .. } | CacheKeyArgs::Positional { config_string, .. } => {
                config_string
            }
        }
    }
}

/// Everything a fingerprint depends on.
#[derive(Debug, Clone, Copy)]
pub struct CacheKeyInput<'a> {
    pub source_text: &'a str,
    pub source_path: &'a str,
    pub config_string: &'a str,
    pub environment: &'a str,
    pub compiler_version: &'a str,
}

/// SHA-256 over the serialized config string, the epoch, then each input field
/// followed by a NUL delimiter. Rendered as lowercase hex.
pub fn derive_key(input: &CacheKeyInput<'_>) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_string(input.config_string)?.as_bytes());
    hasher.update(CACHE_EPOCH.as_bytes());
    hasher.update(FIELD_DELIMITER);
    for field in [
        input.source_text,
        input.source_path,
        input.config_string,
        input.environment,
        input.compiler_version,
    ] {
        hasher.update(field.as_bytes());
        hasher.update(FIELD_DELIMITER);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// `NODE_ENV` as the host process sees it right now; unset reads as `undefined`.
pub fn current_environment() -> String {
    std::env::var(ENVIRONMENT_VARIABLE).unwrap_or_else(|_| "undefined".to_string())
}
