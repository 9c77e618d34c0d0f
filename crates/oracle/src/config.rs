//! Validator configuration.
//!
//! Every setting may come from the command line, the environment or a JSON file. Layers are
//! merged with [`PartialConfig::merge`] and turned into a [`ValidatorConfig`] by
//! [`PartialConfig::resolve`].

use std::{
    fmt, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use alloy_primitives::Address;
use serde::{Deserialize, Deserializer};
use url::Url;
use zkoracle_primitives::consts::DEFAULT_CONFIRMATIONS;

use crate::{
    dispatcher::DEFAULT_RPC_TIMEOUT,
    signer::{LocalKeySigner, SignError},
    watcher::DEFAULT_MAX_IN_FLIGHT,
};

pub const DEFAULT_ETH_URL: &str = "ws://127.0.0.1:8545/";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no oracle contract address configured")]
    MissingContract,

    #[error("no signing key configured, pass a private key or a keystore")]
    MissingKey,

    #[error("both a private key and a keystore are configured")]
    ConflictingKeys,

    #[error("keystore {0:?} needs a password or a password file")]
    MissingPassword(PathBuf),

    #[error("invalid `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// One layer of configuration. Unset fields fall through to the next layer.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PartialConfig {
    pub eth_url: Option<Url>,
    pub contract: Option<Address>,
    pub private_key: Option<String>,
    pub keystore: Option<PathBuf>,
    pub password: Option<String>,
    pub password_file: Option<PathBuf>,
    pub confirmations: Option<u64>,
    #[serde(default, deserialize_with = "deserialize_duration")]
    pub rpc_timeout: Option<Duration>,
    pub max_in_flight: Option<usize>,
}

impl PartialConfig {
    /// Reads a configuration layer from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Fills every unset field of `self` from `lower`.
    ///
    /// The signing key is taken as a whole: if `self` names a private key or a keystore,
    /// the key settings of `lower` are ignored. A password given without a key still
    /// unlocks a keystore named by `lower`.
    pub fn merge(self, lower: PartialConfig) -> Self {
        let (private_key, keystore, password, password_file) =
            if self.private_key.is_some() || self.keystore.is_some() {
                (
                    self.private_key,
                    self.keystore,
                    self.password,
                    self.password_file,
                )
            } else {
                (
                    lower.private_key,
                    lower.keystore,
                    self.password.or(lower.password),
                    self.password_file.or(lower.password_file),
                )
            };

        Self {
            eth_url: self.eth_url.or(lower.eth_url),
            contract: self.contract.or(lower.contract),
            private_key,
            keystore,
            password,
            password_file,
            confirmations: self.confirmations.or(lower.confirmations),
            rpc_timeout: self.rpc_timeout.or(lower.rpc_timeout),
            max_in_flight: self.max_in_flight.or(lower.max_in_flight),
        }
    }

    /// Applies defaults and checks that the configuration is complete.
    pub fn resolve(self) -> Result<ValidatorConfig, ConfigError> {
        let eth_url = match self.eth_url {
            Some(url) => url,
            None => Url::parse(DEFAULT_ETH_URL).map_err(|_| ConfigError::Invalid {
                field: "ethUrl",
                reason: "default endpoint is not a valid url",
            })?,
        };

        let contract = self.contract.ok_or(ConfigError::MissingContract)?;

        let key = match (self.private_key, self.keystore) {
            (Some(_), Some(_)) => return Err(ConfigError::ConflictingKeys),
            (Some(private_key), None) => KeySource::PrivateKey(private_key),
            (None, Some(path)) => {
                let password = match (self.password, self.password_file) {
                    (Some(password), _) => password,
                    (None, Some(password_file)) => read_password(&password_file)?,
                    (None, None) => return Err(ConfigError::MissingPassword(path)),
                };
                KeySource::Keystore { path, password }
            }
            (None, None) => return Err(ConfigError::MissingKey),
        };

        let max_in_flight = self.max_in_flight.unwrap_or(DEFAULT_MAX_IN_FLIGHT);
        if max_in_flight == 0 {
            return Err(ConfigError::Invalid {
                field: "maxInFlight",
                reason: "must be at least 1",
            });
        }

        Ok(ValidatorConfig {
            eth_url,
            contract,
            key,
            confirmations: self.confirmations.unwrap_or(DEFAULT_CONFIRMATIONS),
            rpc_timeout: self.rpc_timeout.unwrap_or(DEFAULT_RPC_TIMEOUT),
            max_in_flight,
        })
    }
}

/// Complete validator configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorConfig {
    pub eth_url: Url,
    pub contract: Address,
    pub key: KeySource,
    pub confirmations: u64,
    pub rpc_timeout: Duration,
    pub max_in_flight: usize,
}

/// Where the validator's signing key comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum KeySource {
    PrivateKey(String),
    Keystore { path: PathBuf, password: String },
}

impl KeySource {
    pub fn load(&self) -> Result<LocalKeySigner, SignError> {
        match self {
            KeySource::PrivateKey(private_key) => LocalKeySigner::from_hex(private_key),
            KeySource::Keystore { path, password } => {
                LocalKeySigner::from_keystore(path, password)
            }
        }
    }
}

impl fmt::Debug for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySource::PrivateKey(_) => f.write_str("PrivateKey(<redacted>)"),
            KeySource::Keystore { path, .. } => f
                .debug_struct("Keystore")
                .field("path", path)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

fn read_password(path: &Path) -> Result<String, ConfigError> {
    let password = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(password.trim_end_matches(['\r', '\n']).to_string())
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|value| humantime::parse_duration(&value).map_err(serde::de::Error::custom))
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::{io::Write, str::FromStr};

    use alloy_primitives::address;
    use tempfile::NamedTempFile;

    use super::*;

    const CONTRACT: Address = address!("5FbDB2315678afecb367f032d93F642f64180aa3");
    const DEV_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn write_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn minimal() -> PartialConfig {
        PartialConfig {
            contract: Some(CONTRACT),
            private_key: Some(DEV_KEY.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn loads_file_layer() {
        let file = write_file(
            r#"{
                "ethUrl": "ws://node.internal:8546",
                "contract": "0x5FbDB2315678afecb367f032d93F642f64180aa3",
                "keystore": "/keys/validator.json",
                "passwordFile": "/keys/password",
                "confirmations": 12,
                "rpcTimeout": "2s 500ms",
                "maxInFlight": 8
            }"#,
        );

        let layer = PartialConfig::load(file.path()).unwrap();

        assert_eq!(
            layer,
            PartialConfig {
                eth_url: Some(Url::parse("ws://node.internal:8546").unwrap()),
                contract: Some(CONTRACT),
                private_key: None,
                keystore: Some(PathBuf::from("/keys/validator.json")),
                password: None,
                password_file: Some(PathBuf::from("/keys/password")),
                confirmations: Some(12),
                rpc_timeout: Some(Duration::from_millis(2_500)),
                max_in_flight: Some(8),
            }
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let file = write_file(r#"{ "confirmation": 3 }"#);

        assert!(matches!(
            PartialConfig::load(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn missing_file() {
        assert!(matches!(
            PartialConfig::load(Path::new("/nonexistent/zkoracle.json")),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn defaults_apply_to_unset_fields() {
        let config = minimal().resolve().unwrap();

        assert_eq!(config.eth_url, Url::parse(DEFAULT_ETH_URL).unwrap());
        assert_eq!(config.confirmations, 5);
        assert_eq!(config.rpc_timeout, Duration::from_secs(10));
        assert_eq!(config.max_in_flight, 64);
        assert_eq!(config.key, KeySource::PrivateKey(DEV_KEY.to_string()));
    }

    #[test]
    fn upper_layer_wins() {
        let file = PartialConfig {
            confirmations: Some(12),
            max_in_flight: Some(8),
            ..minimal()
        };
        let cli = PartialConfig {
            confirmations: Some(3),
            ..Default::default()
        };

        let config = cli.merge(file).resolve().unwrap();

        assert_eq!(config.confirmations, 3);
        assert_eq!(config.max_in_flight, 8);
        assert_eq!(config.contract, CONTRACT);
    }

    #[test]
    fn upper_layer_key_replaces_lower_keystore() {
        let file = PartialConfig {
            private_key: None,
            keystore: Some(PathBuf::from("/keys/validator.json")),
            password: Some("hunter2".to_string()),
            ..minimal()
        };
        let cli = PartialConfig {
            private_key: Some(DEV_KEY.to_string()),
            ..Default::default()
        };

        let config = cli.merge(file).resolve().unwrap();

        assert_eq!(config.key, KeySource::PrivateKey(DEV_KEY.to_string()));
    }

    #[test]
    fn upper_layer_keystore_replaces_lower_private_key() {
        let cli = PartialConfig {
            keystore: Some(PathBuf::from("/keys/validator.json")),
            password: Some("hunter2".to_string()),
            ..Default::default()
        };

        let config = cli.merge(minimal()).resolve().unwrap();

        assert_eq!(
            config.key,
            KeySource::Keystore {
                path: PathBuf::from("/keys/validator.json"),
                password: "hunter2".to_string(),
            }
        );
    }

    #[test]
    fn upper_layer_password_unlocks_lower_keystore() {
        let file = PartialConfig {
            private_key: None,
            keystore: Some(PathBuf::from("/keys/validator.json")),
            password: Some("stale".to_string()),
            ..minimal()
        };
        let cli = PartialConfig {
            password: Some("hunter2".to_string()),
            ..Default::default()
        };

        assert_eq!(
            cli.merge(file).resolve().unwrap().key,
            KeySource::Keystore {
                path: PathBuf::from("/keys/validator.json"),
                password: "hunter2".to_string(),
            }
        );
    }

    #[test]
    fn contract_is_required() {
        let config = PartialConfig {
            contract: None,
            ..minimal()
        };

        assert!(matches!(config.resolve(), Err(ConfigError::MissingContract)));
    }

    #[test]
    fn key_material_is_required() {
        let config = PartialConfig {
            private_key: None,
            ..minimal()
        };

        assert!(matches!(config.resolve(), Err(ConfigError::MissingKey)));
    }

    #[test]
    fn private_key_and_keystore_conflict() {
        let config = PartialConfig {
            keystore: Some(PathBuf::from("/keys/validator.json")),
            password: Some("hunter2".to_string()),
            ..minimal()
        };

        assert!(matches!(config.resolve(), Err(ConfigError::ConflictingKeys)));
    }

    #[test]
    fn keystore_password_from_file() {
        let password_file = write_file("hunter2\n");
        let config = PartialConfig {
            private_key: None,
            keystore: Some(PathBuf::from("/keys/validator.json")),
            password_file: Some(password_file.path().to_path_buf()),
            ..minimal()
        };

        assert_eq!(
            config.resolve().unwrap().key,
            KeySource::Keystore {
                path: PathBuf::from("/keys/validator.json"),
                password: "hunter2".to_string(),
            }
        );
    }

    #[test]
    fn keystore_without_password() {
        let config = PartialConfig {
            private_key: None,
            keystore: Some(PathBuf::from("/keys/validator.json")),
            ..minimal()
        };

        assert!(matches!(
            config.resolve(),
            Err(ConfigError::MissingPassword(_))
        ));
    }

    #[test]
    fn zero_in_flight_is_invalid() {
        let config = PartialConfig {
            max_in_flight: Some(0),
            ..minimal()
        };

        assert!(matches!(
            config.resolve(),
            Err(ConfigError::Invalid {
                field: "maxInFlight",
                ..
            })
        ));
    }

    #[test]
    fn key_material_is_redacted() {
        let private = format!("{:?}", KeySource::PrivateKey(DEV_KEY.to_string()));
        let keystore = format!(
            "{:?}",
            KeySource::Keystore {
                path: PathBuf::from_str("/keys/validator.json").unwrap(),
                password: "hunter2".to_string(),
            }
        );

        assert!(!private.contains(DEV_KEY));
        assert!(!keystore.contains("hunter2"));
        assert!(keystore.contains("validator.json"));
    }

    #[test]
    fn loads_configured_private_key() {
        let signer = minimal().resolve().unwrap().key.load().unwrap();

        assert_eq!(
            signer.address(),
            address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266")
        );
    }
}
