//! Configuration file handling

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::paths::config_path;
use super::{Error, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Node connection settings
    #[serde(default)]
    pub node: NodeConfig,

    /// External extrinsic signer
    #[serde(default)]
    pub signer: SignerConfig,

    /// Raw storage key layout of the node under test
    #[serde(default)]
    pub storage: StorageLayout,

    /// Gas allowances attached to submitted calls
    #[serde(default)]
    pub gas: GasConfig,

    /// Storage polling settings
    #[serde(default)]
    pub polling: PollConfig,

    /// Message queue traversal settings
    #[serde(default)]
    pub queue: QueueConfig,

    /// Runner behaviour
    #[serde(default)]
    pub runner: RunnerConfig,

    /// Client binding generation
    #[serde(default)]
    pub bindings: BindingsConfig,
}

/// Node connection settings
#[derive(Debug, Deserialize, Clone)]
pub struct NodeConfig {
    /// JSON-RPC HTTP endpoint
    #[serde(default = "default_node_url")]
    pub url: String,

    /// Timeout for a single RPC request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            url: default_node_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_node_url() -> String {
    "http://127.0.0.1:9933".to_string()
}
fn default_request_timeout() -> u64 {
    30
}

/// External signer command
///
/// The command reads a JSON sign request on stdin and prints the
/// hex-encoded signed extrinsic on stdout.
#[derive(Debug, Deserialize, Clone)]
pub struct SignerConfig {
    /// Path or name of the signer executable
    #[serde(default = "default_signer_program")]
    pub program: PathBuf,

    /// Additional arguments (e.g. `["--suri", "//Alice"]`)
    #[serde(default = "default_signer_args")]
    pub args: Vec<String>,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            program: default_signer_program(),
            args: default_signer_args(),
        }
    }
}

fn default_signer_program() -> PathBuf {
    PathBuf::from("gear-signer")
}
fn default_signer_args() -> Vec<String> {
    vec!["--suri".to_string(), "//Alice".to_string()]
}

/// Raw storage keys used by the node
///
/// Keys starting with `0x` are hex-decoded, anything else is used as its
/// UTF-8 bytes.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageLayout {
    /// Prefix wiped before every fixture
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Key holding the id of the first queued message
    #[serde(default = "default_queue_head")]
    pub queue_head: String,

    /// Prefix of queue node keys; the node key is this prefix followed by the message id
    #[serde(default = "default_queue_node_prefix")]
    pub queue_node_prefix: String,

    /// Dequeue limit counter
    #[serde(default = "default_dequeue_limit")]
    pub dequeue_limit: String,

    /// Messages processed counter
    #[serde(default = "default_messages_processed")]
    pub messages_processed: String,

    /// Shared memory snapshot
    #[serde(default = "default_shared_memory")]
    pub shared_memory: String,

    /// `Sudo::Key`
    #[serde(default = "default_sudo_key")]
    pub sudo_key: String,
}

impl Default for StorageLayout {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            queue_head: default_queue_head(),
            queue_node_prefix: default_queue_node_prefix(),
            dequeue_limit: default_dequeue_limit(),
            messages_processed: default_messages_processed(),
            shared_memory: default_shared_memory(),
            sudo_key: default_sudo_key(),
        }
    }
}

fn default_prefix() -> String {
    "g::".to_string()
}
fn default_queue_head() -> String {
    "g::msg::head".to_string()
}
fn default_queue_node_prefix() -> String {
    "g::msg::".to_string()
}
fn default_dequeue_limit() -> String {
    "g::msg::limit".to_string()
}
fn default_messages_processed() -> String {
    "g::msg::processed".to_string()
}
fn default_shared_memory() -> String {
    "g::memory".to_string()
}
fn default_sudo_key() -> String {
    "0x5c0d1176a568c1f92944340dbfed9e9c530ebca703c85910e7164cb7d1c9e47b".to_string()
}

/// Decode a configured storage key into raw bytes
pub fn raw_key(key: &str) -> Result<Vec<u8>> {
    match key.strip_prefix("0x") {
        Some(hex_part) => hex::decode(hex_part).map_err(|e| Error::invalid_hex("storage key", e)),
        None => Ok(key.as_bytes().to_vec()),
    }
}

impl StorageLayout {
    pub fn prefix_key(&self) -> Result<Vec<u8>> {
        raw_key(&self.prefix)
    }

    pub fn queue_head_key(&self) -> Result<Vec<u8>> {
        raw_key(&self.queue_head)
    }

    /// Key of the queue node holding message `id`
    pub fn queue_node_key(&self, id: &[u8]) -> Result<Vec<u8>> {
        let mut key = raw_key(&self.queue_node_prefix)?;
        key.extend_from_slice(id);
        Ok(key)
    }

    pub fn dequeue_limit_key(&self) -> Result<Vec<u8>> {
        raw_key(&self.dequeue_limit)
    }

    pub fn messages_processed_key(&self) -> Result<Vec<u8>> {
        raw_key(&self.messages_processed)
    }

    pub fn shared_memory_key(&self) -> Result<Vec<u8>> {
        raw_key(&self.shared_memory)
    }

    pub fn sudo_key_key(&self) -> Result<Vec<u8>> {
        raw_key(&self.sudo_key)
    }
}

/// Gas allowances
#[derive(Debug, Deserialize, Clone)]
pub struct GasConfig {
    /// Gas limit for program deployment
    #[serde(default = "default_gas_limit")]
    pub deploy_gas_limit: u64,

    /// Gas limit for each sent message
    #[serde(default = "default_gas_limit")]
    pub message_gas_limit: u64,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            deploy_gas_limit: default_gas_limit(),
            message_gas_limit: default_gas_limit(),
        }
    }
}

fn default_gas_limit() -> u64 {
    1_000_000_000
}

/// Storage polling settings
#[derive(Debug, Deserialize, Clone)]
pub struct PollConfig {
    /// Delay between polling attempts
    #[serde(default = "default_poll_interval")]
    pub interval_ms: u64,

    /// Give up after this many attempts (unbounded when unset)
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval(),
            max_attempts: None,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

fn default_poll_interval() -> u64 {
    100
}

/// Message queue traversal settings
#[derive(Debug, Deserialize, Clone)]
pub struct QueueConfig {
    /// Maximum number of queue nodes read in one walk
    #[serde(default = "default_queue_max_len")]
    pub max_len: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_len: default_queue_max_len(),
        }
    }
}

fn default_queue_max_len() -> usize {
    10_000
}

/// Runner behaviour
#[derive(Debug, Deserialize, Clone)]
pub struct RunnerConfig {
    /// Stop the whole run at the first failing fixture
    #[serde(default = "default_true")]
    pub fail_fast: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self { fail_fast: true }
    }
}

fn default_true() -> bool {
    true
}

/// Client binding generation settings
#[derive(Debug, Deserialize, Clone)]
pub struct BindingsConfig {
    /// Node container image
    #[serde(default = "default_image")]
    pub image: String,

    /// Name given to the temporary container
    #[serde(default = "default_container_name")]
    pub container_name: String,

    /// RPC port published by the container
    #[serde(default = "default_bindings_port")]
    pub port: u16,

    /// Command line passed to the container
    #[serde(default = "default_node_args")]
    pub node_args: Vec<String>,

    /// Log text preceding the node version
    #[serde(default = "default_version_marker")]
    pub version_marker: String,

    /// How long to wait for the version line
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_secs: u64,

    /// Code generator command; `{url}` is replaced with the node RPC URL
    #[serde(default = "default_codegen")]
    pub codegen: Vec<String>,

    /// Formatter reading source on stdin and writing it to stdout
    #[serde(default = "default_formatter")]
    pub formatter: Vec<String>,

    /// Generated file location
    #[serde(default = "default_bindings_output")]
    pub output: PathBuf,
}

impl Default for BindingsConfig {
    fn default() -> Self {
        Self {
            image: default_image(),
            container_name: default_container_name(),
            port: default_bindings_port(),
            node_args: default_node_args(),
            version_marker: default_version_marker(),
            startup_timeout_secs: default_startup_timeout(),
            codegen: default_codegen(),
            formatter: default_formatter(),
            output: default_bindings_output(),
        }
    }
}

fn default_image() -> String {
    "ghcr.io/gear-tech/node:latest".to_string()
}
fn default_container_name() -> String {
    "gear-fixtures-bindings".to_string()
}
fn default_bindings_port() -> u16 {
    9944
}
fn default_node_args() -> Vec<String> {
    ["gear", "--dev", "--rpc-external", "--rpc-cors=all"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_version_marker() -> String {
    "version".to_string()
}
fn default_startup_timeout() -> u64 {
    120
}
fn default_codegen() -> Vec<String> {
    ["subxt", "codegen", "--url", "{url}"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_formatter() -> Vec<String> {
    ["rustfmt", "--edition", "2021", "--emit", "stdout"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_bindings_output() -> PathBuf {
    PathBuf::from("api/src/generated.rs")
}

impl Config {
    /// Load configuration from `path`, or from the default config file
    ///
    /// Returns default configuration if no file exists. An explicit path
    /// that does not exist is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => {
                if !p.exists() {
                    return Err(Error::Config(format!(
                        "Config file '{}' does not exist",
                        p.display()
                    )));
                }
                p.to_path_buf()
            }
            None => match config_path() {
                Some(p) if p.exists() => p,
                _ => return Ok(Self::default()),
            },
        };

        let content = std::fs::read_to_string(&path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_file() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.node.url, "http://127.0.0.1:9933");
        assert_eq!(config.polling.interval_ms, 100);
        assert_eq!(config.polling.max_attempts, None);
        assert_eq!(config.queue.max_len, 10_000);
        assert!(config.runner.fail_fast);
        assert_eq!(config.bindings.port, 9944);
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = Config::parse(
            r#"
            [node]
            url = "http://node:9933"

            [polling]
            max_attempts = 50

            [storage]
            prefix = "0x673a3a"
            "#,
        )
        .unwrap();
        assert_eq!(config.node.url, "http://node:9933");
        assert_eq!(config.node.request_timeout_secs, 30);
        assert_eq!(config.polling.max_attempts, Some(50));
        assert_eq!(config.polling.interval_ms, 100);
        assert_eq!(config.storage.prefix_key().unwrap(), b"g::".to_vec());
        assert_eq!(config.storage.queue_head_key().unwrap(), b"g::msg::head".to_vec());
    }

    #[test]
    fn test_raw_key_hex_and_text() {
        assert_eq!(raw_key("0x0102").unwrap(), vec![1, 2]);
        assert_eq!(raw_key("g::").unwrap(), b"g::".to_vec());
        assert!(raw_key("0xzz").is_err());
    }

    #[test]
    fn test_queue_node_key_appends_id() {
        let layout = StorageLayout::default();
        let key = layout.queue_node_key(&[0xaa, 0xbb]).unwrap();
        assert_eq!(key, [b"g::msg::".as_slice(), &[0xaa, 0xbb]].concat());
    }

    #[test]
    fn test_invalid_toml_is_config_parse_error() {
        let err = Config::parse("[node\nurl = 1").unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));
    }

    #[test]
    fn test_missing_explicit_path_is_error() {
        let err = Config::load(Some(Path::new("/nonexistent/gear-fixtures.toml"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
