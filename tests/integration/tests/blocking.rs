//! Blocking and callback forms, driven from plain threads.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use secretbus_client::bridge::{block_on, spawn_notify};
use secretbus_client::{
    CancellationToken, Collection, Config, Item, Partition, SecretError, Service, ServiceFlags,
};
use secretbus_integration_tests::{attrs_string, mock, mock_schema};
use secretbus_mock::{collection_path, item_path, PromptBehavior};
use tokio::sync::oneshot;

#[test]
fn test_sync_operations() {
    let (mock, bus) = mock();
    let service =
        Service::get_with_config_sync(bus, Config::default(), ServiceFlags::OPEN_SESSION).unwrap();
    let schema = mock_schema();

    let secret = service
        .lookup_sync(&schema, &attrs_string("two"))
        .unwrap()
        .unwrap();
    assert_eq!(secret.get(), b"222");

    let found = service
        .search_paths_sync(&attrs_string("two"), Partition::BOTH)
        .unwrap();
    assert_eq!(found.unlocked, vec![item_path("english", "item_two")]);

    let collection = Collection::new_sync(&service, collection_path("lock_one")).unwrap();
    assert_eq!(service.lock_sync(&[collection.clone()]).unwrap(), vec![collection.clone()]);
    assert!(collection.locked_sync().unwrap());

    let item = Item::new_sync(&service, item_path("to_delete", "item")).unwrap();
    assert!(item.delete_sync().unwrap());
    assert!(!mock.exists(&item_path("to_delete", "item")));
}

#[tokio::test]
async fn test_sync_form_inside_runtime_is_refused() {
    let (_mock, bus) = mock();
    let err = Service::get_with_config_sync(bus, Config::default(), ServiceFlags::NONE).unwrap_err();
    assert!(matches!(err, SecretError::Usage(_)));
}

#[test]
fn test_spawn_notify_outside_runtime() {
    let (_mock, bus) = mock();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let (tx, rx) = oneshot::channel();

    spawn_notify(
        None,
        move |cancel| async move {
            let service =
                Service::get_with_config(bus, Config::default(), ServiceFlags::NONE, Some(&cancel))
                    .await?;
            service
                .lookup(&mock_schema(), &attrs_string("three"), Some(&cancel))
                .await
        },
        move |result| {
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(result);
        },
    );

    let secret = block_on(rx).unwrap().unwrap().unwrap().unwrap();
    assert_eq!(secret.get(), b"3333");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_spawn_notify_reports_cancellation() {
    let (mock, bus) = mock();
    mock.set_prompt_behavior(PromptBehavior::Ignore);
    let service = Service::get_with_config(bus, Config::default(), ServiceFlags::NONE, None)
        .await
        .unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let (tx, rx) = oneshot::channel();
    let cancel = CancellationToken::new();

    spawn_notify(
        Some(&cancel),
        move |cancel| async move {
            service
                .delete_path(&item_path("to_delete", "confirm"), Some(&cancel))
                .await
        },
        move |result| {
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(result);
        },
    );

    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();

    let result = rx.await.unwrap();
    assert!(matches!(result, Err(SecretError::Cancelled)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(mock.dismissed_prompts().len(), 1);
}
