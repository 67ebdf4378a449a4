//! Shared helpers for the integration tests.
//!
//! Every test talks to its own [`MockService`], so tests never share
//! registry entries or service state.

use std::sync::{Arc, Once};

use secretbus_client::{AttributeType, Attributes, Bus, Config, Schema, Service, ServiceFlags};
use secretbus_core::env;
use secretbus_mock::MockService;
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Route client logs to the test harness. Filter with `SECRETBUS_LOG` or
/// `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = env::get_var(env::vars::SECRETBUS_LOG)
            .map(EnvFilter::new)
            .unwrap_or_else(|| {
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
            });
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// A fresh mock and the same mock as a [`Bus`].
pub fn mock() -> (Arc<MockService>, Arc<dyn Bus>) {
    init_tracing();
    let mock = Arc::new(MockService::new());
    let bus: Arc<dyn Bus> = mock.clone();
    (mock, bus)
}

/// The shared service on a fresh mock, with default configuration.
pub async fn service(flags: ServiceFlags) -> (Arc<MockService>, Service) {
    let (mock, bus) = mock();
    let service = Service::get_with_config(bus, Config::default(), flags, None)
        .await
        .expect("service connects to the mock");
    (mock, service)
}

/// Schema of the fixture items.
pub fn mock_schema() -> Schema {
    Schema::new(
        "org.mock.Schema",
        [
            ("number", AttributeType::Integer),
            ("string", AttributeType::String),
            ("even", AttributeType::Boolean),
        ],
    )
}

pub fn attrs_string(value: &str) -> Attributes {
    Attributes::new().with("string", value)
}
