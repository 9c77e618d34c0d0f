use std::{path::PathBuf, sync::Arc, time::Duration};

use alloy_primitives::Address;
use alloy_provider::ProviderBuilder;
use alloy_transport_ws::WsConnect;
use clap::Parser;
use eyre::WrapErr;
use tracing::info;
use url::Url;
use zkoracle_cli_runner::CliContext;

use crate::{
    config::{ConfigError, PartialConfig, ValidatorConfig},
    confirmation::ConfirmationPolicy,
    dispatcher::RpcMessenger,
    handler::RequestHandler,
    observer::ContractObserver,
    watcher::{RequestWatcher, WatchError},
};

#[derive(Debug, Parser)]
pub struct ValidateCommand {
    #[arg(
        long,
        value_name = "FILE",
        env = "ZKORACLE_CONFIG",
        help = "JSON file with validator settings. Command line flags take precedence."
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        value_name = "URL",
        env = "ZKORACLE_ETH_URL",
        help = "Websocket endpoint of the Ethereum node. [default: ws://127.0.0.1:8545/]"
    )]
    eth_url: Option<Url>,

    #[arg(
        long,
        value_name = "ADDRESS",
        env = "ZKORACLE_CONTRACT",
        help = "Address of the oracle contract."
    )]
    contract: Option<Address>,

    #[clap(flatten)]
    key: KeyArgs,

    #[arg(
        long,
        value_name = "BLOCKS",
        env = "ZKORACLE_CONFIRMATIONS",
        help = "Blocks that must be built on top of a requested block before it is signed. \
                [default: 5]"
    )]
    confirmations: Option<u64>,

    #[arg(
        long,
        value_name = "DURATION",
        env = "ZKORACLE_RPC_TIMEOUT",
        value_parser = humantime::parse_duration,
        help = "Timeout for delivering a vote to the aggregator. [default: 10s]"
    )]
    rpc_timeout: Option<Duration>,

    #[arg(
        long,
        value_name = "N",
        env = "ZKORACLE_MAX_IN_FLIGHT",
        help = "Maximum number of requests handled at once. [default: 64]"
    )]
    max_in_flight: Option<usize>,
}

#[derive(Debug, Parser)]
struct KeyArgs {
    #[arg(
        long,
        value_name = "HEX",
        env = "ZKORACLE_PRIVATE_KEY",
        hide_env_values = true,
        conflicts_with = "keystore",
        help = "The validator's secp256k1 private key."
    )]
    private_key: Option<String>,

    #[arg(
        long,
        value_name = "PATH",
        env = "ZKORACLE_KEYSTORE",
        help = "Path to an encrypted keystore holding the validator's key."
    )]
    keystore: Option<PathBuf>,

    #[arg(
        long,
        value_name = "PASSWORD",
        env = "ZKORACLE_KEYSTORE_PASSWORD",
        hide_env_values = true,
        conflicts_with = "password_file",
        help = "The password that will be used to unlock the keystore."
    )]
    password: Option<String>,

    #[arg(
        long,
        value_name = "FILE",
        env = "ZKORACLE_KEYSTORE_PASSWORD_FILE",
        help = "File containing the keystore password."
    )]
    password_file: Option<PathBuf>,
}

impl ValidateCommand {
    /// Command line and environment settings, layered over the config file if one is given.
    fn resolve_config(&self) -> Result<ValidatorConfig, ConfigError> {
        let file = match &self.config {
            Some(path) => PartialConfig::load(path)?,
            None => PartialConfig::default(),
        };

        let cli = PartialConfig {
            eth_url: self.eth_url.clone(),
            contract: self.contract,
            private_key: self.key.private_key.clone(),
            keystore: self.key.keystore.clone(),
            password: self.key.password.clone(),
            password_file: self.key.password_file.clone(),
            confirmations: self.confirmations,
            rpc_timeout: self.rpc_timeout,
            max_in_flight: self.max_in_flight,
        };

        cli.merge(file).resolve()
    }

    pub async fn execute(self, ctx: CliContext) -> eyre::Result<()> {
        let config = self.resolve_config()?;
        let signer = config.key.load()?;

        info!(
            version = %zkoracle_version::version_with_platform(),
            eth_url = %config.eth_url,
            contract = %config.contract,
            validator = %signer.address(),
            confirmations = config.confirmations,
            "Starting validator"
        );

        let provider = tokio::select! {
            _ = ctx.cancel.cancelled() => return Ok(()),
            provider = ProviderBuilder::new().on_ws(WsConnect::new(config.eth_url.as_str())) => {
                provider.wrap_err_with(|| format!("failed to connect to {}", config.eth_url))?
            }
        };

        let observer = Arc::new(ContractObserver::new(provider, config.contract));
        let handler = Arc::new(RequestHandler::new(
            observer.clone(),
            signer,
            RpcMessenger::new(config.rpc_timeout),
            ConfirmationPolicy::new(config.confirmations),
        ));
        let watcher = RequestWatcher::new(observer, handler, config.max_in_flight);

        match watcher.watch(ctx.cancel).await {
            WatchError::Cancelled => {
                info!("Validator stopped");
                Ok(())
            }
            err => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use alloy_primitives::address;
    use tempfile::NamedTempFile;

    use super::*;
    use crate::config::KeySource;

    const DEV_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn parse(args: &[&str]) -> ValidateCommand {
        ValidateCommand::try_parse_from(std::iter::once(&"validate").chain(args)).unwrap()
    }

    #[test]
    fn flags_override_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "contract": "0x5FbDB2315678afecb367f032d93F642f64180aa3",
                "privateKey": "{DEV_KEY}",
                "confirmations": 12,
                "rpcTimeout": "30s"
            }}"#
        )
        .unwrap();

        let config = parse(&[
            "--config",
            file.path().to_str().unwrap(),
            "--confirmations",
            "3",
            "--max-in-flight",
            "4",
        ])
        .resolve_config()
        .unwrap();

        assert_eq!(
            config.contract,
            address!("5FbDB2315678afecb367f032d93F642f64180aa3")
        );
        assert_eq!(config.key, KeySource::PrivateKey(DEV_KEY.to_string()));
        assert_eq!(config.confirmations, 3);
        assert_eq!(config.rpc_timeout, Duration::from_secs(30));
        assert_eq!(config.max_in_flight, 4);
    }

    #[test]
    fn flags_without_config_file() {
        let config = parse(&[
            "--contract",
            "0x5FbDB2315678afecb367f032d93F642f64180aa3",
            "--keystore",
            "/keys/validator.json",
            "--password",
            "hunter2",
            "--eth-url",
            "ws://node.internal:8546",
            "--rpc-timeout",
            "500ms",
        ])
        .resolve_config()
        .unwrap();

        assert_eq!(config.eth_url.as_str(), "ws://node.internal:8546/");
        assert_eq!(config.rpc_timeout, Duration::from_millis(500));
        assert!(matches!(config.key, KeySource::Keystore { .. }));
    }

    #[test]
    fn private_key_flag_replaces_keystore_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "contract": "0x5FbDB2315678afecb367f032d93F642f64180aa3",
                "keystore": "/keys/validator.json",
                "password": "hunter2"
            }}"#
        )
        .unwrap();

        let config = parse(&[
            "--config",
            file.path().to_str().unwrap(),
            "--private-key",
            DEV_KEY,
        ])
        .resolve_config()
        .unwrap();

        assert_eq!(config.key, KeySource::PrivateKey(DEV_KEY.to_string()));
    }

    #[test]
    fn private_key_conflicts_with_keystore() {
        let parsed = ValidateCommand::try_parse_from([
            "validate",
            "--private-key",
            DEV_KEY,
            "--keystore",
            "/keys/validator.json",
        ]);

        assert!(parsed.is_err());
    }
}
