//! Configuration files feeding service construction.

use std::fs;

use secretbus_client::{Algorithm, Config, SecretError, Service, ServiceFlags};
use secretbus_core::ConfigError;
use secretbus_integration_tests::mock;
use tempfile::TempDir;

#[tokio::test]
async fn test_config_file_selects_algorithm() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("secretbus.json5");
    fs::write(
        &path,
        r#"{
            // Plain transport only.
            session: { algorithms: ["plain"] },
            prompt: { window_id: "x11:1234" },
        }"#,
    )
    .unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.prompt.window_id, "x11:1234");

    let (mock, bus) = mock();
    let service = Service::get_with_config(bus, config, ServiceFlags::OPEN_SESSION, None)
        .await
        .unwrap();
    assert_eq!(service.session_algorithm(), Some(Algorithm::Plain));
    assert_eq!(mock.call_count("OpenSession"), 1);
    assert_eq!(service.config().prompt.window_id, "x11:1234");
}

#[tokio::test]
async fn test_saved_config_round_trips_into_service() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("secretbus.json5");

    let mut config = Config::default();
    config.collection.default_alias = "session".to_string();
    config.save(&path).unwrap();

    let (_mock, bus) = mock();
    let service = Service::new(bus, Config::load(&path).unwrap(), ServiceFlags::NONE, None)
        .await
        .unwrap();
    assert_eq!(
        service.config().default_collection_path(),
        "/org/freedesktop/secrets/aliases/session"
    );
}

#[tokio::test]
async fn test_unknown_algorithm_is_usage_error() {
    let (_mock, bus) = mock();
    let config = Config::parse(r#"{ session: { algorithms: ["rot13"] } }"#).unwrap();

    let err = Service::new(bus, config, ServiceFlags::NONE, None)
        .await
        .unwrap_err();
    assert!(matches!(err, SecretError::Usage(_)));
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let (_mock, bus) = mock();
    let config = Config::parse(r#"{ service: { object_path: "relative" } }"#).unwrap();

    let err = Service::new(bus, config, ServiceFlags::NONE, None)
        .await
        .unwrap_err();
    assert!(matches!(err, SecretError::Config(ConfigError::Validation(_))));
}
