//! Service lifecycle: sharing, capabilities and session negotiation.

use std::sync::Arc;

use secretbus_client::{
    Algorithm, Bus, Collection, Config, Item, SecretError, SecretObject, Service, ServiceFlags,
};
use secretbus_core::config::ConfigBuilder;
use secretbus_integration_tests::{init_tracing, mock, service};
use secretbus_mock::{collection_path, item_path, MockService};

#[tokio::test]
async fn test_get_shares_instance_per_bus() {
    let (_mock, bus) = mock();

    let a = Service::get_with_config(bus.clone(), Config::default(), ServiceFlags::NONE, None)
        .await
        .unwrap();
    let b = Service::get_with_config(bus.clone(), Config::default(), ServiceFlags::NONE, None)
        .await
        .unwrap();
    assert!(a.ptr_eq(&b));

    let (_other_mock, other_bus) = mock();
    let c = Service::get_with_config(other_bus, Config::default(), ServiceFlags::NONE, None)
        .await
        .unwrap();
    assert!(!a.ptr_eq(&c));
}

#[tokio::test]
async fn test_released_instance_is_rebuilt() {
    let (_mock, bus) = mock();

    let first = Service::get_with_config(
        bus.clone(),
        Config::default(),
        ServiceFlags::OPEN_SESSION,
        None,
    )
    .await
    .unwrap();
    assert!(first.flags().contains(ServiceFlags::OPEN_SESSION));
    drop(first);

    // A fresh instance starts without a session.
    let second = Service::get_with_config(bus, Config::default(), ServiceFlags::NONE, None)
        .await
        .unwrap();
    assert!(second.flags().is_empty());
}

#[tokio::test]
async fn test_concurrent_get_builds_once() {
    let (_mock, bus) = mock();

    let (a, b) = tokio::join!(
        Service::get_with_config(bus.clone(), Config::default(), ServiceFlags::NONE, None),
        Service::get_with_config(bus.clone(), Config::default(), ServiceFlags::NONE, None),
    );
    assert!(a.unwrap().ptr_eq(&b.unwrap()));
}

#[tokio::test]
async fn test_new_is_never_shared() {
    let (_mock, bus) = mock();

    let shared = Service::get_with_config(bus.clone(), Config::default(), ServiceFlags::NONE, None)
        .await
        .unwrap();
    let private = Service::new(bus.clone(), Config::default(), ServiceFlags::NONE, None)
        .await
        .unwrap();
    assert!(!shared.ptr_eq(&private));

    let again = Service::get_with_config(bus, Config::default(), ServiceFlags::NONE, None)
        .await
        .unwrap();
    assert!(shared.ptr_eq(&again));
}

#[tokio::test]
async fn test_flags_accumulate_across_gets() {
    let (_mock, bus) = mock();

    let service = Service::get_with_config(bus.clone(), Config::default(), ServiceFlags::NONE, None)
        .await
        .unwrap();
    assert!(service.flags().is_empty());
    assert!(service.session_path().is_none());

    let with_session = Service::get_with_config(
        bus.clone(),
        Config::default(),
        ServiceFlags::OPEN_SESSION,
        None,
    )
    .await
    .unwrap();
    assert!(with_session.ptr_eq(&service));
    assert!(service.flags().contains(ServiceFlags::OPEN_SESSION));

    Service::get_with_config(bus, Config::default(), ServiceFlags::LOAD_COLLECTIONS, None)
        .await
        .unwrap();
    assert!(service
        .flags()
        .contains(ServiceFlags::OPEN_SESSION | ServiceFlags::LOAD_COLLECTIONS));
}

#[tokio::test]
async fn test_session_negotiated_once() {
    let (mock, service) = service(ServiceFlags::NONE).await;

    let (a, b) = tokio::join!(service.ensure_session(None), service.ensure_session(None));
    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(mock.call_count("OpenSession"), 1);

    service.ensure(ServiceFlags::OPEN_SESSION, None).await.unwrap();
    assert_eq!(mock.call_count("OpenSession"), 1);
    assert_eq!(service.session_algorithm(), Some(Algorithm::DhAes));
}

#[tokio::test]
async fn test_falls_back_to_plain_session() {
    init_tracing();
    let mock = Arc::new(MockService::plain_only());
    let bus: Arc<dyn Bus> = mock.clone();

    let service = Service::get_with_config(bus, Config::default(), ServiceFlags::OPEN_SESSION, None)
        .await
        .unwrap();
    assert_eq!(service.session_algorithm(), Some(Algorithm::Plain));
    assert_eq!(mock.call_count("OpenSession"), 2);

    let secret = service
        .get_secret_for_path(&item_path("english", "item_one"), None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(secret.get(), b"111");
}

#[tokio::test]
async fn test_no_common_algorithm() {
    init_tracing();
    let bus: Arc<dyn Bus> = Arc::new(MockService::plain_only());
    let config = ConfigBuilder::new()
        .algorithms(["dh-ietf1024-sha256-aes128-cbc-pkcs7"])
        .build();

    let err = Service::get_with_config(bus, config, ServiceFlags::OPEN_SESSION, None)
        .await
        .unwrap_err();
    assert!(matches!(err, SecretError::Negotiation(_)));
}

#[tokio::test]
async fn test_load_collections() {
    let (_mock, service) = service(ServiceFlags::LOAD_COLLECTIONS).await;

    let collections = service.collections(None).await.unwrap();
    assert_eq!(collections.len(), 6);

    let english = collections
        .iter()
        .find(|c| c.object_path() == &collection_path("english"))
        .unwrap();
    assert_eq!(english.label(None).await.unwrap(), "Collection One");
    assert!(!english.locked(None).await.unwrap());
    assert_eq!(english.items(None).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_collection_proxies_are_shared() {
    let (_mock, service) = service(ServiceFlags::NONE).await;

    let a = Collection::new(&service, collection_path("english"), None)
        .await
        .unwrap();
    let b = Collection::new(&service, collection_path("english"), None)
        .await
        .unwrap();
    assert!(a.ptr_eq(&b));
    assert!(a.service().ptr_eq(&service));

    a.set_label("Renamed", None).await.unwrap();
    assert_eq!(b.label(None).await.unwrap(), "Renamed");
}

#[tokio::test]
async fn test_missing_object_fails_proxy_construction() {
    let (_mock, service) = service(ServiceFlags::NONE).await;

    let err = Item::new(&service, item_path("english", "nope"), None)
        .await
        .unwrap_err();
    assert_eq!(
        err.remote_name(),
        Some("org.freedesktop.DBus.Error.UnknownObject")
    );
}

#[tokio::test]
async fn test_unowned_bus_name() {
    let (_mock, bus) = mock();
    let config = ConfigBuilder::new().bus_name("org.example.Missing").build();

    let err = Service::get_with_config(bus, config, ServiceFlags::NONE, None)
        .await
        .unwrap_err();
    assert_eq!(
        err.remote_name(),
        Some("org.freedesktop.DBus.Error.NameHasNoOwner")
    );
}

#[tokio::test]
async fn test_disconnected_bus() {
    let (mock, bus) = mock();
    mock.disconnect();

    let err = Service::get_with_config(bus, Config::default(), ServiceFlags::NONE, None)
        .await
        .unwrap_err();
    assert!(matches!(err, SecretError::Transport(_)));
}
