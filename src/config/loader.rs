// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::Deserialize;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::consts::{
    DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_ENCLAVE_CID, DEFAULT_ENCLAVE_PORT, DEFAULT_FUEL_LEVEL,
    DEFAULT_RELAY_LISTEN, DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_WAT_COMPILER, MAX_FUEL_LEVEL,
    MIN_FUEL_LEVEL,
};
use crate::errors::ConfigError;
use crate::protocol::DEFAULT_MAX_MESSAGE_BYTES;

/// Top-level configuration shared by the relay and the enclave executor.
///
/// Every section is optional; an empty file yields the defaults, which match
/// a parent instance talking to enclave CID 16 on port 8080.
///
/// # Example
/// ```yaml
/// max_message_bytes: 16777216
/// relay:
///   listen: "0.0.0.0:8081"
///   enclave: { transport: vsock, cid: 16, port: 8080 }
///   connect_timeout_ms: 5000
///   request_timeout_ms: 60000
/// executor:
///   listen: { transport: vsock, port: 8080 }
///   max_concurrency: 8
///   fuel: 100000000
///   compiler: { kind: external, program: wat2wasm }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            relay: RelayConfig::default(),
            executor: ExecutorConfig::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_message_bytes == 0 {
            return Err(ConfigError::Invalid("max_message_bytes must be positive".into()));
        }
        if self.relay.connect_timeout_ms == 0 || self.relay.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid("relay timeouts must be positive".into()));
        }
        if self.executor.max_concurrency == Some(0) {
            return Err(ConfigError::Invalid("executor.max_concurrency must be positive".into()));
        }
        Ok(())
    }
}

/// Where a listener binds or a connector dials.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "transport", rename_all = "snake_case")]
pub enum Endpoint {
    Tcp {
        address: String,
    },
    /// `cid` may be omitted when listening (any local CID).
    Vsock {
        cid: Option<u32>,
        port: u32,
    },
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            Endpoint::Tcp { address } => write!(f, "tcp://{}", address),
            Endpoint::Vsock { cid: Some(cid), port } => write!(f, "vsock://{}:{}", cid, port),
            Endpoint::Vsock { cid: None, port } => write!(f, "vsock://*:{}", port),
        }
    }
}

/// Client-facing relay settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    #[serde(default = "default_relay_listen")]
    pub listen: String,
    #[serde(default = "default_enclave_endpoint")]
    pub enclave: Endpoint,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen: default_relay_listen(),
            enclave: default_enclave_endpoint(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl RelayConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Enclave-side executor settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutorConfig {
    #[serde(default = "default_executor_listen")]
    pub listen: Endpoint,
    /// Requests run concurrently per connection; defaults to available parallelism.
    pub max_concurrency: Option<usize>,
    /// Fuel per call, clamped to [`MIN_FUEL_LEVEL`, `MAX_FUEL_LEVEL`].
    pub fuel: Option<u64>,
    #[serde(default)]
    pub compiler: CompilerConfig,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            listen: default_executor_listen(),
            max_concurrency: None,
            fuel: None,
            compiler: CompilerConfig::default(),
        }
    }
}

impl ExecutorConfig {
    pub fn fuel_level(&self) -> u64 {
        let requested = self.fuel.unwrap_or(DEFAULT_FUEL_LEVEL);
        let clamped = requested.clamp(MIN_FUEL_LEVEL, MAX_FUEL_LEVEL);
        if clamped != requested {
            tracing::warn!(
                "Configured fuel {} out of bounds, using {}",
                requested,
                clamped
            );
        }
        clamped
    }

    pub fn concurrency(&self) -> usize {
        self.max_concurrency.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        })
    }
}

/// Which WAT compiler the Compile Bridge uses.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompilerConfig {
    /// An installed `wat2wasm`-compatible program.
    External {
        #[serde(default = "default_compiler_program")]
        program: PathBuf,
        /// Extra arguments placed before the input path.
        #[serde(default)]
        args: Vec<String>,
        /// Directory for scratch files; the system temp dir when absent.
        #[serde(default)]
        scratch_dir: Option<PathBuf>,
    },
    /// The in-process `wat` crate.
    Builtin,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig::External {
            program: default_compiler_program(),
            args: Vec::new(),
            scratch_dir: None,
        }
    }
}

fn default_max_message_bytes() -> usize {
    DEFAULT_MAX_MESSAGE_BYTES
}

fn default_relay_listen() -> String {
    DEFAULT_RELAY_LISTEN.to_string()
}

fn default_enclave_endpoint() -> Endpoint {
    Endpoint::Vsock {
        cid: Some(DEFAULT_ENCLAVE_CID),
        port: DEFAULT_ENCLAVE_PORT,
    }
}

fn default_executor_listen() -> Endpoint {
    Endpoint::Vsock {
        cid: None,
        port: DEFAULT_ENCLAVE_PORT,
    }
}

fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

fn default_compiler_program() -> PathBuf {
    PathBuf::from(DEFAULT_WAT_COMPILER)
}

/// Load and validate a config from a YAML file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path)?;
    let cfg: Config = if content.trim().is_empty() {
        Config::default()
    } else {
        serde_yaml::from_str(&content)?
    };
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
max_message_bytes: 1024
relay:
  listen: "127.0.0.1:9000"
  enclave: { transport: tcp, address: "127.0.0.1:9001" }
  connect_timeout_ms: 100
  request_timeout_ms: 200
executor:
  listen: { transport: tcp, address: "127.0.0.1:9001" }
  max_concurrency: 2
  fuel: 5000000
  compiler:
    kind: external
    program: /usr/local/bin/wat2wasm
    args: ["--enable-all"]
    scratch_dir: /var/tmp
"#;

        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.max_message_bytes, 1024);
        assert_eq!(
            cfg.relay.enclave,
            Endpoint::Tcp {
                address: "127.0.0.1:9001".to_string()
            }
        );
        assert_eq!(cfg.relay.request_timeout(), Duration::from_millis(200));
        assert_eq!(cfg.executor.concurrency(), 2);
        assert_eq!(cfg.executor.fuel_level(), 5_000_000);
        assert_eq!(
            cfg.executor.compiler,
            CompilerConfig::External {
                program: PathBuf::from("/usr/local/bin/wat2wasm"),
                args: vec!["--enable-all".to_string()],
                scratch_dir: Some(PathBuf::from("/var/tmp")),
            }
        );
    }

    #[test]
    fn test_defaults_match_enclave_layout() {
        let cfg: Config = serde_yaml::from_str("relay: {}\n").unwrap();
        assert_eq!(cfg.relay.listen, "0.0.0.0:8081");
        assert_eq!(
            cfg.relay.enclave,
            Endpoint::Vsock {
                cid: Some(16),
                port: 8080
            }
        );
        assert_eq!(cfg.executor.listen.to_string(), "vsock://*:8080");
        assert_eq!(cfg.executor.fuel_level(), DEFAULT_FUEL_LEVEL);
        assert!(matches!(cfg.executor.compiler, CompilerConfig::External { .. }));
    }

    #[test]
    fn test_builtin_compiler_selection() {
        let cfg: Config = serde_yaml::from_str("executor:\n  compiler: { kind: builtin }\n").unwrap();
        assert_eq!(cfg.executor.compiler, CompilerConfig::Builtin);
    }

    #[test]
    fn test_fuel_is_clamped() {
        let cfg: Config = serde_yaml::from_str("executor:\n  fuel: 1000000000000\n").unwrap();
        assert_eq!(cfg.executor.fuel_level(), MAX_FUEL_LEVEL);
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        assert!(serde_yaml::from_str::<Config>("relay:\n  lisen: x\n").is_err());
    }

    #[test]
    fn test_load_config_validates() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "executor:\n  max_concurrency: 0").unwrap();
        let error = load_config(file.path()).unwrap_err();
        assert!(matches!(error, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_load_empty_file_gives_defaults() {
        let file = NamedTempFile::new().unwrap();
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.max_message_bytes, DEFAULT_MAX_MESSAGE_BYTES);
    }

    #[test]
    fn test_bundled_demo_configs_load() {
        let demos = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos");

        let local = load_config(demos.join("local.yaml")).unwrap();
        assert_eq!(local.executor.compiler, CompilerConfig::Builtin);
        assert_eq!(local.relay.enclave, local.executor.listen);

        let enclave = load_config(demos.join("enclave.yaml")).unwrap();
        assert_eq!(enclave.executor.concurrency(), 8);
        assert_eq!(enclave.relay.connect_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            load_config("/nonexistent/enclave.yaml"),
            Err(ConfigError::Io(_))
        ));
    }
}
