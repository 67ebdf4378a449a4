//! Message bus abstraction.
//!
//! The transport itself lives outside this crate. Anything that can perform
//! request/response method calls and deliver signals implements [`Bus`]; the
//! rest of the client is written against this trait only.

mod value;

pub use value::{take_args, ObjectPath, Value};

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

/// Interface names of the secret service protocol.
pub mod interfaces {
    pub const SERVICE: &str = "org.freedesktop.Secret.Service";
    pub const COLLECTION: &str = "org.freedesktop.Secret.Collection";
    pub const ITEM: &str = "org.freedesktop.Secret.Item";
    pub const PROMPT: &str = "org.freedesktop.Secret.Prompt";
    pub const PROPERTIES: &str = "org.freedesktop.DBus.Properties";
}

/// Well-known fault names.
pub mod faults {
    pub const NOT_SUPPORTED: &str = "org.freedesktop.DBus.Error.NotSupported";
    pub const INVALID_ARGS: &str = "org.freedesktop.DBus.Error.InvalidArgs";
    pub const UNKNOWN_OBJECT: &str = "org.freedesktop.DBus.Error.UnknownObject";
    pub const IS_LOCKED: &str = "org.freedesktop.Secret.Error.IsLocked";
}

/// Errors reported by the transport.
#[derive(Debug, Clone, Error)]
pub enum BusError {
    /// The bus or the destination could not be reached.
    #[error("bus disconnected: {0}")]
    Disconnected(String),

    /// A reply or signal did not have the expected shape.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// The remote side answered with an error.
    #[error("{name}: {message}")]
    Fault { name: String, message: String },
}

impl BusError {
    /// Create a fault error.
    pub fn fault(name: impl Into<String>, message: impl Into<String>) -> Self {
        BusError::Fault {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Fault name, if the remote side reported one.
    pub fn fault_name(&self) -> Option<&str> {
        match self {
            BusError::Fault { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// Identifier of a signal subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// A live signal subscription: every matching signal's arguments arrive on
/// `signals` until [`Bus::unsubscribe`] is called.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub signals: mpsc::UnboundedReceiver<Vec<Value>>,
}

/// Request/response and signal primitives consumed from the transport.
#[async_trait]
pub trait Bus: Send + Sync {
    /// Identity of this bus connection; used to key the service registry.
    fn address(&self) -> &str;

    /// Resolve a well-known name to its current owner.
    async fn resolve_name(&self, name: &str) -> Result<String, BusError>;

    /// Call `interface.method` on `path` at `destination`.
    async fn call(
        &self,
        destination: &str,
        path: &ObjectPath,
        interface: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, BusError>;

    /// Subscribe to `interface.member` signals emitted by `path`.
    fn subscribe(
        &self,
        destination: &str,
        path: &ObjectPath,
        interface: &str,
        member: &str,
    ) -> Result<Subscription, BusError>;

    /// Drop a subscription. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);
}

/// A subscription that unsubscribes itself when dropped.
pub struct SignalGuard {
    bus: Arc<dyn Bus>,
    id: SubscriptionId,
    signals: mpsc::UnboundedReceiver<Vec<Value>>,
}

impl SignalGuard {
    /// Subscribe and wrap the result.
    pub fn subscribe(
        bus: Arc<dyn Bus>,
        destination: &str,
        path: &ObjectPath,
        interface: &str,
        member: &str,
    ) -> Result<Self, BusError> {
        let Subscription { id, signals } = bus.subscribe(destination, path, interface, member)?;
        debug!(%path, member, id = id.0, "subscribed to signal");
        Ok(Self { bus, id, signals })
    }

    /// Wait for the next signal. `None` once the transport closes the stream.
    pub async fn next(&mut self) -> Option<Vec<Value>> {
        self.signals.recv().await
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        debug!(id = self.id.0, "unsubscribing from signal");
        self.bus.unsubscribe(self.id);
    }
}
