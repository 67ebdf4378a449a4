//! Transport session negotiation.
//!
//! Secrets never cross the bus outside a session. The client offers its
//! algorithms one at a time, most preferred first; the service either opens a
//! session with that algorithm or answers `NotSupported`, in which case the
//! next one is tried. Any other fault ends negotiation.

use std::fmt;
use std::str::FromStr;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::bridge::cancellable;
use crate::bus::{faults, interfaces, take_args, Bus, ObjectPath, Value};
use crate::crypto::{DhKeypair, SessionKey};
use crate::error::{Result, SecretError};

/// Transport algorithms understood by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// Diffie-Hellman key agreement, AES-128-CBC payloads.
    DhAes,
    /// No encryption.
    Plain,
}

impl Algorithm {
    /// Protocol name of the algorithm.
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::DhAes => secretbus_core::config::ALGORITHM_DH_AES,
            Algorithm::Plain => secretbus_core::config::ALGORITHM_PLAIN,
        }
    }

    /// Default preference order.
    pub fn preferred() -> Vec<Algorithm> {
        vec![Algorithm::DhAes, Algorithm::Plain]
    }

    /// Parse a configured preference list.
    pub fn parse_list(names: &[String]) -> Result<Vec<Algorithm>> {
        let algorithms = names
            .iter()
            .map(|n| n.parse())
            .collect::<Result<Vec<Algorithm>>>()?;
        if algorithms.is_empty() {
            return Err(SecretError::Usage(
                "at least one session algorithm is required".to_string(),
            ));
        }
        Ok(algorithms)
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = SecretError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            secretbus_core::config::ALGORITHM_DH_AES => Ok(Algorithm::DhAes),
            secretbus_core::config::ALGORITHM_PLAIN => Ok(Algorithm::Plain),
            other => Err(SecretError::Usage(format!(
                "unsupported session algorithm: {other}"
            ))),
        }
    }
}

/// A negotiated transport session.
pub struct Session {
    path: ObjectPath,
    algorithm: Algorithm,
    key: Option<SessionKey>,
}

impl Session {
    /// Assemble a session from negotiated parts.
    ///
    /// `key` must be present exactly when the algorithm encrypts.
    pub fn new(path: ObjectPath, algorithm: Algorithm, key: Option<SessionKey>) -> Result<Self> {
        match (algorithm, key.is_some()) {
            (Algorithm::DhAes, false) => Err(SecretError::Negotiation(
                "encrypted session without key material".to_string(),
            )),
            (Algorithm::Plain, true) => Err(SecretError::Negotiation(
                "plain session cannot carry a key".to_string(),
            )),
            _ => Ok(Self {
                path,
                algorithm,
                key,
            }),
        }
    }

    /// Object path of the session on the service side.
    pub fn path(&self) -> &ObjectPath {
        &self.path
    }

    /// Negotiated algorithm.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub(crate) fn key(&self) -> Option<&SessionKey> {
        self.key.as_ref()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("path", &self.path)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Open a session with the first algorithm the service accepts.
pub async fn negotiate(
    bus: &dyn Bus,
    destination: &str,
    service_path: &ObjectPath,
    algorithms: &[Algorithm],
    cancel: &CancellationToken,
) -> Result<Session> {
    let mut rejected = Vec::new();

    for &algorithm in algorithms {
        debug!(%algorithm, "offering session algorithm");

        let keypair = match algorithm {
            Algorithm::DhAes => Some(DhKeypair::generate()),
            Algorithm::Plain => None,
        };
        let input = match &keypair {
            Some(kp) => Value::variant(Value::Bytes(kp.public_bytes().to_vec())),
            None => Value::variant(Value::Str(String::new())),
        };

        let reply = cancellable(
            cancel,
            bus.call(
                destination,
                service_path,
                interfaces::SERVICE,
                "OpenSession",
                vec![Value::Str(algorithm.name().to_string()), input],
            ),
        )
        .await?;

        let [output, path] = match reply {
            Ok(body) => take_args::<2>(body)?,
            Err(err) if err.fault_name() == Some(faults::NOT_SUPPORTED) => {
                debug!(%algorithm, "service rejected session algorithm");
                rejected.push(algorithm.name());
                continue;
            }
            Err(err) => return Err(err.into()),
        };
        let path = path.into_path()?;

        let key = match keypair {
            Some(kp) => {
                let peer = output.into_bytes()?;
                Some(kp.derive_key(&peer)?)
            }
            None => None,
        };

        info!(%path, %algorithm, "opened secret transport session");
        return Session::new(path, algorithm, key);
    }

    Err(SecretError::Negotiation(format!(
        "service rejected every offered algorithm: {}",
        rejected.join(", ")
    )))
}
