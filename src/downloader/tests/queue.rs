use super::*;

#[tokio::test]
async fn test_promote_moves_task_to_front() {
    let (transport, gate) = MockTransport::new().gated();
    let h = create_test_manager_with(
        |c| c.max_concurrent_downloads = 1,
        transport,
        Arc::new(NoLyrics),
    );
    let mut rx = h.manager.subscribe();

    h.manager.request_download(item("A"), None).await.unwrap();
    wait_for_status(&mut rx, "A", Status::Downloading).await;
    for id in ["B", "C", "D"] {
        h.manager.request_download(item(id), None).await.unwrap();
    }

    assert!(h.manager.promote(&TaskId::from("D")).await);
    assert_eq!(
        h.manager.queued_ids().await,
        vec![TaskId::from("D"), TaskId::from("B"), TaskId::from("C")]
    );

    // Running and unknown tasks cannot be promoted
    assert!(!h.manager.promote(&TaskId::from("A")).await);
    assert!(!h.manager.promote(&TaskId::from("Z")).await);

    gate.add_permits(4);
    wait_for_status(&mut rx, "C", Status::Completed).await;

    let expected: Vec<String> = ["A", "D", "B", "C"]
        .into_iter()
        .map(|id| MockResolver::url_for(id, Quality::High))
        .collect();
    assert_eq!(h.transport.urls(), expected);
}

#[tokio::test]
async fn test_queue_stats_counts_each_state() {
    let (transport, gate) = MockTransport::new().gated();
    let h = create_test_manager_with(
        |c| c.max_concurrent_downloads = 1,
        transport,
        Arc::new(NoLyrics),
    );
    h.resolver.set_missing("D");
    let mut rx = h.manager.subscribe();

    h.manager.request_download(item("D"), None).await.unwrap();
    wait_for_status(&mut rx, "D", Status::Error).await;

    h.manager.request_download(item("A"), None).await.unwrap();
    wait_for_status(&mut rx, "A", Status::Downloading).await;
    h.manager.request_download(item("B"), None).await.unwrap();
    h.manager.request_download(item("C"), None).await.unwrap();
    h.manager.pause_download(&TaskId::from("C")).await;

    let stats = h.manager.queue_stats().await;
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.downloading, 1);
    assert_eq!(stats.paused, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.max_concurrent, 1);

    let listed: Vec<TaskId> = h
        .manager
        .list_tasks()
        .await
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(
        listed,
        vec![
            TaskId::from("D"),
            TaskId::from("A"),
            TaskId::from("B"),
            TaskId::from("C")
        ]
    );
    assert_eq!(h.manager.list_active().await.len(), 2);

    gate.add_permits(2);
    wait_for_status(&mut rx, "B", Status::Completed).await;
}
