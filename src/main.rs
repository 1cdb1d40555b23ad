// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use wasm_enclave::config::{load_config, Config, Endpoint};
use wasm_enclave::enclave::Pipeline;
use wasm_enclave::observability::init_tracing;
use wasm_enclave::protocol::ExecutionRequest;
use wasm_enclave::relay::{EnclaveLink, RelayClient};
use wasm_enclave::server::{serve, ConnectionMode};
use wasm_enclave::transport;

/// YAML mapping of secret name to value, read by the client.
const SECRETS_FILE_VAR: &str = "ENCLAVE_SECRETS_FILE";

fn usage(program: &str) {
    eprintln!("Usage: {} executor [config.yaml]", program);
    eprintln!("       {} relay [config.yaml]", program);
    eprintln!(
        "       {} client <relay-addr> <file.wat|inline-wat|base64> <function> [args...]",
        program
    );
    eprintln!("Example: {} client 127.0.0.1:8081 demos/square.wat square 7", program);
    eprintln!("Secrets for the client are read from ${} when set.", SECRETS_FILE_VAR);
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("wasm-enclave");

    match args.get(1).map(String::as_str) {
        Some("executor") => run_executor(load(args.get(2))?).await,
        Some("relay") => run_relay(load(args.get(2))?).await,
        Some("client") => run_client(&args[2..]).await,
        _ => {
            usage(program);
            std::process::exit(2);
        }
    }
}

fn load(path: Option<&String>) -> Result<Config> {
    match path {
        Some(path) => {
            load_config(path).with_context(|| format!("failed to load config from {}", path))
        }
        None => Ok(Config::default()),
    }
}

async fn run_executor(config: Config) -> Result<()> {
    let pipeline = Pipeline::from_config(&config.executor)?;
    let acceptor = transport::bind(&config.executor.listen).await?;
    let mode = ConnectionMode::Concurrent {
        max_in_flight: config.executor.concurrency(),
    };

    run_until_interrupted(serve(
        "executor",
        acceptor,
        Arc::new(pipeline),
        mode,
        config.max_message_bytes,
    ))
    .await
}

async fn run_relay(config: Config) -> Result<()> {
    let connector = transport::connector_for(&config.relay.enclave)?;
    let link = Arc::new(EnclaveLink::from_config(
        connector,
        &config.relay,
        config.max_message_bytes,
    ));
    link.warm_up().await;

    let listen = Endpoint::Tcp {
        address: config.relay.listen.clone(),
    };
    let acceptor = transport::bind(&listen).await?;

    run_until_interrupted(serve(
        "relay",
        acceptor,
        link,
        ConnectionMode::Sequential,
        config.max_message_bytes,
    ))
    .await
}

async fn run_until_interrupted(server: impl Future<Output = ()>) -> Result<()> {
    tokio::select! {
        _ = server => Ok(()),
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!("Interrupted, shutting down");
            Ok(())
        }
    }
}

async fn run_client(args: &[String]) -> Result<()> {
    let [address, code, function, rest @ ..] = args else {
        bail!("client needs <relay-addr> <code> <function> [args...]");
    };

    let code = if Path::new(code).is_file() {
        fs::read_to_string(code).with_context(|| format!("failed to read {}", code))?
    } else {
        code.clone()
    };
    let call_args = rest
        .iter()
        .map(|arg| {
            arg.parse::<i32>()
                .with_context(|| format!("argument '{}' is not an i32", arg))
        })
        .collect::<Result<Vec<i32>>>()?;
    let secrets = match env::var(SECRETS_FILE_VAR) {
        Ok(path) => load_secrets(&path)?,
        Err(_) => HashMap::new(),
    };

    let mut client = RelayClient::connect(address)
        .await
        .with_context(|| format!("failed to connect to relay at {}", address))?;
    let request = ExecutionRequest::new(code, function.as_str(), call_args).with_secrets(secrets);
    let response = client.execute(request).await?;

    match response.outcome() {
        Ok(value) => {
            println!("{}", value);
            Ok(())
        }
        Err(error) => bail!("{}", error),
    }
}

/// Scalars of any YAML type are accepted and passed on as text.
fn load_secrets(path: &str) -> Result<HashMap<String, String>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read secrets from {}", path))?;
    let raw: HashMap<String, serde_yaml::Value> = serde_yaml::from_str(&content)?;

    raw.into_iter()
        .map(|(name, value)| {
            let text = match value {
                serde_yaml::Value::String(s) => s,
                serde_yaml::Value::Number(n) => n.to_string(),
                serde_yaml::Value::Bool(b) => b.to_string(),
                other => bail!("secret '{}' must be a scalar, got {:?}", name, other),
            };
            Ok((name, text))
        })
        .collect()
}
