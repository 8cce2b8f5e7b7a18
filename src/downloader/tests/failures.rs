use super::*;

#[tokio::test]
async fn test_missing_url_fails_with_resolution_error() {
    let h = create_test_manager();
    h.resolver.set_missing("A");
    let mut rx = h.manager.subscribe();

    h.manager.request_download(item("A"), None).await.unwrap();
    let update = wait_for_status(&mut rx, "A", Status::Error).await;

    let info = update.error_info.unwrap();
    assert_eq!(info.kind, ErrorKind::ResolutionFailed);
    assert!(update.status_text.unwrap().starts_with("Failed: "));
    assert_eq!(h.transport.calls(), 0);

    // Error records stay resumable
    let task = h.manager.get_task(&TaskId::from("A")).await.unwrap();
    assert!(task.status.is_resumable());
}

#[tokio::test]
async fn test_resolver_error_is_captured() {
    let h = create_test_manager();
    h.resolver.set_failing("A");
    let mut rx = h.manager.subscribe();

    h.manager.request_download(item("A"), None).await.unwrap();
    let update = wait_for_status(&mut rx, "A", Status::Error).await;

    let info = update.error_info.unwrap();
    assert_eq!(info.kind, ErrorKind::ResolutionFailed);
    assert!(info.message.contains("source rejected A"));
}

#[tokio::test]
async fn test_transport_failure_keeps_partial_file_by_default() {
    let h = create_test_manager();
    h.transport
        .fail_url(MockResolver::url_for("A", Quality::High));
    let mut rx = h.manager.subscribe();

    h.manager.request_download(item("A"), None).await.unwrap();
    let update = wait_for_status(&mut rx, "A", Status::Error).await;

    let info = update.error_info.unwrap();
    assert_eq!(info.kind, ErrorKind::TransportError);
    assert!(info.message.contains("500"));

    let destination = h.path_of("Song A - Artist.mp3");
    assert!(!destination.exists());
    let staging = filename::staging_path(&destination);
    assert_eq!(
        std::fs::metadata(&staging).unwrap().len(),
        CHUNK_SIZE as u64
    );
}

#[tokio::test]
async fn test_transport_failure_deletes_partial_file_when_configured() {
    let h = create_test_manager_with(
        |c| c.partial_files = PartialFileAction::Delete,
        MockTransport::new(),
        Arc::new(NoLyrics),
    );
    h.transport
        .fail_url(MockResolver::url_for("A", Quality::High));
    let mut rx = h.manager.subscribe();

    h.manager.request_download(item("A"), None).await.unwrap();
    wait_for_status(&mut rx, "A", Status::Error).await;

    let staging = filename::staging_path(&h.path_of("Song A - Artist.mp3"));
    // Removal happens right after the Error event
    tokio::time::timeout(EVENT_TIMEOUT, async {
        while staging.exists() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_failure_does_not_block_other_tasks() {
    let h = create_test_manager_with(
        |c| c.max_concurrent_downloads = 1,
        MockTransport::new(),
        Arc::new(NoLyrics),
    );
    h.resolver.set_missing("A");
    let mut rx = h.manager.subscribe();

    h.manager.request_download(item("A"), None).await.unwrap();
    h.manager.request_download(item("B"), None).await.unwrap();

    let events = collect_until(&mut rx, |e| {
        matches!(e, Event::Update(u) if u.id == TaskId::from("B") && u.status == Status::Completed)
    })
    .await;
    let statuses = final_statuses(&events);
    assert_eq!(statuses[&TaskId::from("A")], Status::Error);
    assert_eq!(statuses[&TaskId::from("B")], Status::Completed);
}
