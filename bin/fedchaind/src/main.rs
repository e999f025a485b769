//! The federated sidechain node daemon.

use std::{fs, path::Path};

use clap::Parser;
use config::Config;
use fedchain_common::{logging, logging::LoggerConfig};
use fedchain_node_core::Node;
use fedchain_params::Params;
use rand::{rngs::StdRng, SeedableRng};
use rpc_server::NodeRpc;
use secp256k1::SecretKey;
use serde::de::DeserializeOwned;
use tokio::runtime;
use tracing::{info, trace};

mod args;
mod config;
mod constants;
mod rpc_server;

fn main() {
    logging::init(LoggerConfig::with_base_name("fedchaind"));

    let cli = args::Cli::parse();
    info!(params = %cli.params.display(), config = %cli.config.display(), "starting node");

    let params = parse_toml::<Params>(cli.params);
    let config = parse_toml::<Config>(cli.config);

    let signing_key = parse_signing_key(&config.signing_key);
    let node = Node::new(
        params,
        config.signer_idx,
        signing_key,
        StdRng::from_entropy(),
    )
    .expect("node construction must succeed with valid params and key");

    let runtime = runtime::Builder::new_multi_thread()
        .worker_threads(config.num_threads.unwrap_or(constants::DEFAULT_THREAD_COUNT))
        .enable_all()
        .build()
        .expect("must be able to create runtime");

    let rpc_impl = NodeRpc::new(node);
    runtime
        .block_on(rpc_server::start_rpc(&rpc_impl, &config.rpc_addr))
        .expect("rpc server must start");

    info!("node shutdown complete");
}

/// Parses the hex-encoded signing key from the config.
///
/// # Panics
///
/// If the hex is malformed or not a valid secret key.
fn parse_signing_key(hex_key: &str) -> SecretKey {
    let bytes = hex::decode(hex_key).expect("signing key must be valid hex");
    SecretKey::from_slice(&bytes).expect("signing key must be a valid secret key")
}

/// Reads and parses a TOML file from the given path into the given type `T`.
///
/// # Panics
///
/// 1. If the file is not readable.
/// 2. If the contents of the file cannot be deserialized into the given type `T`.
fn parse_toml<T>(path: impl AsRef<Path>) -> T
where
    T: std::fmt::Debug + DeserializeOwned,
{
    fs::read_to_string(path)
        .map(|p| {
            trace!(?p, "read file");

            let parsed = toml::from_str::<T>(&p).expect("must be able to parse");
            trace!(?parsed, "parsed toml");

            parsed
        })
        .expect("must be able to read file")
}
