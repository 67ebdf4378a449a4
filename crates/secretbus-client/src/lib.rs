//! # secretbus-client
//!
//! Client for the freedesktop secret service protocol.
//!
//! - **Proxies**: [`Service`], [`Collection`] and [`Item`], deduplicated per
//!   remote object
//! - **Sessions**: Transport encryption negotiated once per service
//! - **Prompts**: Operations that need user confirmation run to completion
//!   or are dismissed on cancellation
//! - **Search**: Typed attributes validated against a [`Schema`]
//!
//! Every operation is an `async fn` taking an optional
//! [`CancellationToken`](tokio_util::sync::CancellationToken). Blocking
//! `*_sync` forms and [`bridge::spawn_notify`] cover callers that are not
//! async.
//!
//! The bus transport is supplied by the caller through the [`Bus`] trait.

pub mod attributes;
pub mod bridge;
pub mod bus;
pub mod cache;
pub mod collection;
pub mod crypto;
pub mod error;
pub mod item;
pub mod prompt;
pub mod query;
pub mod secret_codec;
pub mod service;
pub mod session;

mod blocking;

// Re-exports for convenience
pub use attributes::{AttributeType, AttributeValue, Attributes, Schema};
pub use bus::{Bus, BusError, ObjectPath, Value};
pub use collection::Collection;
pub use error::{Result, SecretError};
pub use item::Item;
pub use prompt::{PromptOutcome, PromptState};
pub use query::{Partition, SearchPaths, SearchResults};
pub use secretbus_core::{Config, SecretValue};
pub use service::{SecretObject, Service, ServiceFlags};
pub use session::Algorithm;
pub use tokio_util::sync::CancellationToken;
