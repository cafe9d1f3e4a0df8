// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON configuration files for the client and its embedded trace server

use nim_core::OpeningState;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::game_channel::{LoopOptions, RetryPolicy};

pub const DEFAULT_CLIENT_CONFIG: &str = "config/client_config.json";
pub const DEFAULT_TRACING_SERVER_CONFIG: &str = "config/tracing_server_config.json";

/// Errors while loading a configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Client settings, read from `config/client_config.json` by default
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ClientConfig {
    /// Local address the UDP socket binds to
    pub client_address: String,
    /// Address of the remote Nim peer
    pub nim_server_address: String,
    /// Trace server that receives game events
    pub tracing_server_address: String,
    /// Shared secret presented to the trace server (base64 in JSON)
    #[serde(default, with = "base64_bytes")]
    pub secret: Vec<u8>,
    /// Name this client records events under
    pub tracing_identity: String,
    #[serde(default = "default_receive_timeout_ms")]
    pub receive_timeout_ms: u64,
    /// Consecutive lost turns tolerated before giving up; unbounded if absent
    #[serde(default)]
    pub max_lost_turns: Option<u32>,
    #[serde(default)]
    pub opening_state: OpeningState,
    /// Discard peer moves that fail validation instead of adopting them
    #[serde(default)]
    pub strict_validation: bool,
}

fn default_receive_timeout_ms() -> u64 {
    1000
}

impl ClientConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            receive_timeout: Duration::from_millis(self.receive_timeout_ms),
            max_lost_turns: self.max_lost_turns,
        }
    }

    pub fn loop_options(&self) -> LoopOptions {
        LoopOptions {
            retry: self.retry_policy(),
            opening: self.opening_state,
            strict_validation: self.strict_validation,
        }
    }
}

/// Embedded trace server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TracingServerConfig {
    /// Address the trace listener binds to
    pub server_bind: String,
    /// Secret clients must present in their hello
    #[serde(default, with = "base64_bytes")]
    pub secret: Vec<u8>,
    /// JSON-lines file receiving every accepted record
    pub output_file: PathBuf,
}

pub fn load_client_config(path: impl AsRef<Path>) -> Result<ClientConfig, ConfigError> {
    read_json(path.as_ref())
}

pub fn load_tracing_server_config(
    path: impl AsRef<Path>,
) -> Result<TracingServerConfig, ConfigError> {
    read_json(path.as_ref())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let value = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::debug!("Loaded config from {}", path.display());
    Ok(value)
}

/// Byte strings encoded as standard base64 text
pub(crate) mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = Option::<String>::deserialize(deserializer)?;
        match text {
            Some(text) => STANDARD.decode(text).map_err(serde::de::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}
