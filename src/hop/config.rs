//! Configuration resolution for hop chains.
//!
//! Every setting is resolved with a three-tier priority system:
//!
//! 1. **Parameter** - Explicitly provided value, e.g. from the chain file (highest priority)
//! 2. **Environment Variable** - Value from environment variable
//! 3. **Default** - Built-in default value (lowest priority)
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `HOPCHAIN_CONNECT_TIMEOUT` | 30s | Per-hop connect timeout in seconds |
//! | `HOPCHAIN_COMMAND_TIMEOUT` | 180s | Command execution timeout in seconds |
//! | `HOPCHAIN_HOP_DELAY_MS` | 1000ms | Pause before each hop after the first |
//! | `HOPCHAIN_MAX_RETRIES` | 3 | Retry attempts for transient connect failures per hop |
//! | `HOPCHAIN_RETRY_DELAY_MS` | 1000ms | Initial retry delay in milliseconds |
//! | `HOPCHAIN_COMPRESSION` | true | Enable zlib compression |
//! | `HOPCHAIN_CONFIG` | `hopchain.json` | Chain file read by the binary |

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::hop::types::HopSpec;

/// Default per-hop connection timeout in seconds
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default command execution timeout in seconds
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 180;

/// Default pause between hops in milliseconds
pub const DEFAULT_HOP_DELAY_MS: u64 = 1000;

/// Default maximum retry attempts for one hop
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default retry delay in milliseconds
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// Maximum retry delay cap
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Default chain file read by the binary
pub const DEFAULT_CONFIG_PATH: &str = "hopchain.json";

/// Default file the binary writes command results to
pub const DEFAULT_OUTPUT_PATH: &str = "remote_results.txt";

pub const CONNECT_TIMEOUT_ENV_VAR: &str = "HOPCHAIN_CONNECT_TIMEOUT";
pub const COMMAND_TIMEOUT_ENV_VAR: &str = "HOPCHAIN_COMMAND_TIMEOUT";
pub const HOP_DELAY_MS_ENV_VAR: &str = "HOPCHAIN_HOP_DELAY_MS";
pub const MAX_RETRIES_ENV_VAR: &str = "HOPCHAIN_MAX_RETRIES";
pub const RETRY_DELAY_MS_ENV_VAR: &str = "HOPCHAIN_RETRY_DELAY_MS";
pub const COMPRESSION_ENV_VAR: &str = "HOPCHAIN_COMPRESSION";
pub const CONFIG_PATH_ENV_VAR: &str = "HOPCHAIN_CONFIG";

/// Resolve a numeric setting with priority: parameter -> env var -> default.
///
/// Unparseable environment values are ignored.
fn resolve_number<T: std::str::FromStr>(param: Option<T>, env_var: &str, default: T) -> T {
    // Priority 1: Use parameter if provided
    if let Some(value) = param {
        return value;
    }

    // Priority 2: Use environment variable if set
    if let Ok(raw) = env::var(env_var)
        && let Ok(value) = raw.trim().parse::<T>()
    {
        return value;
    }

    // Priority 3: Default value
    default
}

/// Resolve a timeout in seconds. Zero would expire every operation, so a zero parameter
/// falls through to the env var and a zero env var to the default.
fn resolve_timeout_secs(timeout_secs: Option<u64>, env_var: &str, default: u64) -> Duration {
    let secs = resolve_number(timeout_secs.filter(|secs| *secs > 0), env_var, default);
    Duration::from_secs(if secs == 0 { default } else { secs })
}

/// Resolve the per-hop connect timeout.
pub fn resolve_connect_timeout(timeout_secs: Option<u64>) -> Duration {
    resolve_timeout_secs(
        timeout_secs,
        CONNECT_TIMEOUT_ENV_VAR,
        DEFAULT_CONNECT_TIMEOUT_SECS,
    )
}

/// Resolve the command execution timeout.
pub fn resolve_command_timeout(timeout_secs: Option<u64>) -> Duration {
    resolve_timeout_secs(
        timeout_secs,
        COMMAND_TIMEOUT_ENV_VAR,
        DEFAULT_COMMAND_TIMEOUT_SECS,
    )
}

/// Resolve the pause inserted before every hop after the first.
pub fn resolve_hop_delay(delay_ms: Option<u64>) -> Duration {
    Duration::from_millis(resolve_number(
        delay_ms,
        HOP_DELAY_MS_ENV_VAR,
        DEFAULT_HOP_DELAY_MS,
    ))
}

pub fn resolve_max_retries(max_retries: Option<u32>) -> u32 {
    resolve_number(max_retries, MAX_RETRIES_ENV_VAR, DEFAULT_MAX_RETRIES)
}

pub fn resolve_retry_delay(delay_ms: Option<u64>) -> Duration {
    Duration::from_millis(resolve_number(
        delay_ms,
        RETRY_DELAY_MS_ENV_VAR,
        DEFAULT_RETRY_DELAY_MS,
    ))
}

/// Resolve the compression setting with priority: parameter -> env var -> default (true)
pub fn resolve_compression(compress: Option<bool>) -> bool {
    if let Some(compress) = compress {
        return compress;
    }

    if let Ok(env_compress) = env::var(COMPRESSION_ENV_VAR) {
        return env_compress.eq_ignore_ascii_case("true") || env_compress == "1";
    }

    true
}

/// Resolve the chain file path: CLI argument -> env var -> default.
pub fn resolve_config_path(arg: Option<String>) -> PathBuf {
    arg.or_else(|| env::var(CONFIG_PATH_ENV_VAR).ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Timing and retry settings for establishing a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainOptions {
    /// Upper bound for one hop attempt (channel open, handshake and authentication).
    pub connect_timeout: Duration,
    /// Pause before every hop after the first. Zero disables pacing.
    pub hop_delay: Duration,
    /// Retries for transient connect failures of a single hop.
    pub max_retries: u32,
    /// Initial backoff delay between retries.
    pub retry_delay: Duration,
}

impl ChainOptions {
    /// Options built from environment variables and defaults.
    pub fn from_env() -> Self {
        Self {
            connect_timeout: resolve_connect_timeout(None),
            hop_delay: resolve_hop_delay(None),
            max_retries: resolve_max_retries(None),
            retry_delay: resolve_retry_delay(None),
        }
    }

    /// No pacing and no retries; useful when the transports are local.
    pub fn immediate(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            hop_delay: Duration::ZERO,
            max_retries: 0,
            retry_delay: Duration::from_millis(1),
        }
    }
}

impl Default for ChainOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            hop_delay: Duration::from_millis(DEFAULT_HOP_DELAY_MS),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
        }
    }
}

/// The chain file read by the `hopchain` binary.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainFile {
    pub hops: Vec<HopSpec>,
    #[serde(default)]
    pub commands: Vec<String>,
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,
    #[serde(default)]
    pub command_timeout_secs: Option<u64>,
    #[serde(default)]
    pub hop_delay_ms: Option<u64>,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub retry_delay_ms: Option<u64>,
    #[serde(default)]
    pub compress: Option<bool>,
}

impl ChainFile {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Chain options with file values taking priority over the environment.
    pub fn chain_options(&self) -> ChainOptions {
        ChainOptions {
            connect_timeout: resolve_connect_timeout(self.connect_timeout_secs),
            hop_delay: resolve_hop_delay(self.hop_delay_ms),
            max_retries: resolve_max_retries(self.max_retries),
            retry_delay: resolve_retry_delay(self.retry_delay_ms),
        }
    }

    pub fn command_timeout(&self) -> Duration {
        resolve_command_timeout(self.command_timeout_secs)
    }

    pub fn compression(&self) -> bool {
        resolve_compression(self.compress)
    }

    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_PATH))
    }
}
