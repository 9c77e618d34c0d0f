use std::fmt::Display;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{aliases::AggregatorIndex, consts::DEFAULT_AGGREGATOR_SCHEME};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EndpointError {
    #[error("aggregator {0} has no registered address")]
    Empty(AggregatorIndex),

    #[error("aggregator {index} has a malformed address {address:?}: {reason}")]
    Malformed {
        index: AggregatorIndex,
        address: String,
        reason: String,
    },
}

/// Where the current aggregator can be reached, as registered in the oracle contract.
///
/// Resolved anew for every request since the aggregator role rotates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatorEndpoint {
    pub index: AggregatorIndex,
    pub address: String,
}

impl AggregatorEndpoint {
    pub fn new(index: AggregatorIndex, address: impl Into<String>) -> Self {
        Self {
            index,
            address: address.into(),
        }
    }

    /// Returns the URL votes are sent to.
    ///
    /// Addresses are usually registered as `host:port`, in which case `http` is assumed.
    /// Only `http` and `https` URLs with a host are accepted.
    pub fn url(&self) -> Result<Url, EndpointError> {
        let address = self.address.trim();
        if address.is_empty() {
            return Err(EndpointError::Empty(self.index));
        }

        let candidate = if address.contains("://") {
            address.to_string()
        } else {
            format!("{DEFAULT_AGGREGATOR_SCHEME}://{address}")
        };

        let url = Url::parse(&candidate).map_err(|e| self.malformed(e.to_string()))?;

        match url.scheme() {
            "http" | "https" => {}
            scheme => return Err(self.malformed(format!("unsupported scheme `{scheme}`"))),
        }

        match url.host_str() {
            Some(host) if !host.is_empty() => Ok(url),
            _ => Err(self.malformed("missing host".to_string())),
        }
    }

    fn malformed(&self, reason: String) -> EndpointError {
        EndpointError::Malformed {
            index: self.index,
            address: self.address.clone(),
            reason,
        }
    }
}

impl Display for AggregatorEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "aggregator {} at {}", self.index, self.address)
    }
}
