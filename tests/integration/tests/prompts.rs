//! Deleting and locking, with and without confirmation prompts.

use std::time::Duration;

use secretbus_client::{
    Attributes, CancellationToken, Collection, Item, SecretError, SecretObject, SecretValue,
    ServiceFlags,
};
use secretbus_integration_tests::{mock_schema, service};
use secretbus_mock::{collection_path, item_path, PromptBehavior};

#[tokio::test]
async fn test_delete_without_prompt() {
    let (mock, service) = service(ServiceFlags::NONE).await;
    let path = item_path("to_delete", "item");

    assert!(service.delete_path(&path, None).await.unwrap());
    assert!(!mock.exists(&path));
    assert_eq!(mock.call_count("Prompt"), 0);
}

#[tokio::test]
async fn test_delete_with_prompt() {
    let (mock, service) = service(ServiceFlags::NONE).await;
    let item = Item::new(&service, item_path("to_delete", "confirm"), None)
        .await
        .unwrap();

    assert!(item.delete(None).await.unwrap());
    assert!(!mock.exists(item.object_path()));
    assert_eq!(mock.call_count("Prompt"), 1);
    assert_eq!(mock.subscription_count(), 0);
}

#[tokio::test]
async fn test_dismissed_delete_keeps_item() {
    let (mock, service) = service(ServiceFlags::NONE).await;
    mock.set_prompt_behavior(PromptBehavior::Dismiss);
    let path = item_path("to_delete", "confirm");

    assert!(!service.delete_path(&path, None).await.unwrap());
    assert!(mock.exists(&path));
}

#[tokio::test]
async fn test_collection_delete_with_prompt() {
    let (mock, service) = service(ServiceFlags::NONE).await;
    let collection = Collection::new(&service, collection_path("lock_prompt"), None)
        .await
        .unwrap();

    assert!(collection.delete(None).await.unwrap());
    assert!(!mock.exists(&collection_path("lock_prompt")));
}

#[tokio::test]
async fn test_store_through_prompt() {
    let (mock, service) = service(ServiceFlags::NONE).await;
    let schema = mock_schema();
    let attrs = Attributes::new().with("string", "prompted");
    let collection = collection_path("lock_prompt");

    let path = service
        .store(&schema, &attrs, Some(&collection), "Prompted", &SecretValue::text("p4ss"), None)
        .await
        .unwrap()
        .unwrap();
    assert!(path.as_str().starts_with(&format!("{collection}/")));
    assert_eq!(mock.secret_of(&path), Some(b"p4ss".to_vec()));
    assert_eq!(mock.call_count("Prompt"), 1);

    // Replacing goes through a second prompt and keeps the path.
    let replaced = service
        .store(&schema, &attrs, Some(&collection), "Prompted", &SecretValue::text("n3w"), None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(replaced, path);
    assert_eq!(mock.secret_of(&path), Some(b"n3w".to_vec()));
}

#[tokio::test]
async fn test_create_item_through_prompt() {
    let (_mock, service) = service(ServiceFlags::NONE).await;
    let collection = Collection::new(&service, collection_path("lock_prompt"), None)
        .await
        .unwrap();

    let item = collection
        .create_item(
            &mock_schema(),
            &Attributes::new().with("number", 7),
            "Seven",
            &SecretValue::text("7777"),
            None,
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(item.label(None).await.unwrap(), "Seven");
    assert_eq!(item.get_secret(None).await.unwrap().get(), b"7777");
    assert_eq!(collection.items(None).await.unwrap(), vec![item]);
}

#[tokio::test]
async fn test_dismissed_store_creates_nothing() {
    let (mock, service) = service(ServiceFlags::NONE).await;
    mock.set_prompt_behavior(PromptBehavior::Dismiss);
    let collection = Collection::new(&service, collection_path("lock_prompt"), None)
        .await
        .unwrap();

    let stored = service
        .store(
            &mock_schema(),
            &Attributes::new().with("string", "declined"),
            Some(collection.object_path()),
            "Declined",
            &SecretValue::text("x"),
            None,
        )
        .await
        .unwrap();
    assert!(stored.is_none());

    let created = collection
        .create_item(
            &mock_schema(),
            &Attributes::new().with("number", 8),
            "Eight",
            &SecretValue::text("8"),
            None,
        )
        .await
        .unwrap();
    assert!(created.is_none());
    assert!(collection.items(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_lock_and_unlock_paths() {
    let (mock, service) = service(ServiceFlags::NONE).await;
    let path = collection_path("lock_one");

    let locked = service
        .lock_paths(std::slice::from_ref(&path), None)
        .await
        .unwrap();
    assert_eq!(locked, vec![path.clone()]);
    assert_eq!(mock.is_locked(&path), Some(true));

    let unlocked = service
        .unlock_paths(std::slice::from_ref(&path), None)
        .await
        .unwrap();
    assert_eq!(unlocked, vec![path.clone()]);
    assert_eq!(mock.is_locked(&path), Some(false));
    assert_eq!(mock.call_count("Prompt"), 0);
}

#[tokio::test]
async fn test_lock_objects_through_prompt() {
    let (mock, service) = service(ServiceFlags::NONE).await;
    let collection = Collection::new(&service, collection_path("lock_prompt"), None)
        .await
        .unwrap();

    let locked = service
        .lock(std::slice::from_ref(&collection), None)
        .await
        .unwrap();
    assert_eq!(locked, vec![collection.clone()]);
    assert!(collection.locked(None).await.unwrap());

    let unlocked = service
        .unlock(std::slice::from_ref(&collection), None)
        .await
        .unwrap();
    assert_eq!(unlocked, vec![collection.clone()]);
    assert!(!collection.locked(None).await.unwrap());
    assert_eq!(mock.call_count("Prompt"), 2);
}

#[tokio::test]
async fn test_lock_mixes_direct_and_prompted() {
    let (_mock, service) = service(ServiceFlags::NONE).await;
    let paths = [collection_path("lock_one"), collection_path("lock_prompt")];

    let mut locked = service.lock_paths(&paths, None).await.unwrap();
    locked.sort();
    assert_eq!(locked, paths.to_vec());
}

#[tokio::test]
async fn test_dismissed_unlock_reports_nothing() {
    let (mock, service) = service(ServiceFlags::NONE).await;
    let path = collection_path("lock_prompt");

    service
        .lock_paths(std::slice::from_ref(&path), None)
        .await
        .unwrap();
    mock.set_prompt_behavior(PromptBehavior::Dismiss);

    let unlocked = service
        .unlock_paths(std::slice::from_ref(&path), None)
        .await
        .unwrap();
    assert!(unlocked.is_empty());
    assert_eq!(mock.is_locked(&path), Some(true));
}

#[tokio::test]
async fn test_cancel_pending_prompt() {
    let (mock, service) = service(ServiceFlags::NONE).await;
    mock.set_prompt_behavior(PromptBehavior::Ignore);
    let path = item_path("to_delete", "confirm");

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = service.delete_path(&path, Some(&cancel)).await.unwrap_err();
    assert!(matches!(err, SecretError::Cancelled));
    assert!(err.is_cancelled());

    assert_eq!(mock.dismissed_prompts().len(), 1);
    assert_eq!(mock.subscription_count(), 0);
    assert!(mock.exists(&path));
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let (mock, service) = service(ServiceFlags::NONE).await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = service
        .delete_path(&item_path("to_delete", "item"), Some(&cancel))
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    assert!(mock.exists(&item_path("to_delete", "item")));
}
