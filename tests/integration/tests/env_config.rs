//! `Service::get` reading its configuration from the environment.
//!
//! Kept in its own binary: the test sets process environment variables.

use std::env;
use std::fs;

use secretbus_client::{Algorithm, Service, ServiceFlags};
use secretbus_core::env::vars;
use secretbus_integration_tests::mock;
use tempfile::TempDir;

#[tokio::test]
async fn test_get_loads_config_from_environment() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("secretbus.json5");
    fs::write(
        &path,
        r#"{
            session: { algorithms: ["plain"] },
            prompt: { window_id: "x11:1" },
        }"#,
    )
    .unwrap();

    env::set_var(vars::SECRETBUS_CONFIG, &path);
    env::set_var(vars::SECRETBUS_PROMPT_WINDOW, "wayland:abc");

    let (mock, bus) = mock();
    let service = Service::get(bus, ServiceFlags::OPEN_SESSION, None)
        .await
        .unwrap();

    assert_eq!(service.session_algorithm(), Some(Algorithm::Plain));
    assert_eq!(mock.call_count("OpenSession"), 1);
    // Environment overrides win over the file.
    assert_eq!(service.config().prompt.window_id, "wayland:abc");

    env::remove_var(vars::SECRETBUS_CONFIG);
    env::remove_var(vars::SECRETBUS_PROMPT_WINDOW);
}
