//! Queue processor behaviour: dedup, ordering, failure isolation, pause

mod common;

use anilib_core::events::{PauseReason, RegistryEvent};
use anilib_core::handlers::GetReleaseGroup;
use anilib_core::queue::{
    CommandPayload, CommandStore, CommandType, HandlerRegistry, QueueName, USER_PRIORITY,
};
use anilib_test_utils::{
    FailingHandler, RecordingHandler, ScriptedUdp, TestStack, file_command, group_command,
};
use common::{drain_events, wait_until};
use std::sync::Arc;
use std::time::Duration;

fn idle_stack() -> TestStack {
    TestStack::new(ScriptedUdp::registry(|line| format!("598 UNKNOWN COMMAND {line}")))
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_submissions_store_one_command() {
    let stack = idle_stack();
    let recorder = Arc::new(RecordingHandler::new());
    let mut handlers = HandlerRegistry::new();
    handlers.register(CommandType::GetReleaseGroup, recorder.clone());
    let (queue, store) = stack.memory_queue(handlers);

    let attempts = (0..10).map(|_| queue.submit(group_command(7, 5)));
    let accepted = futures::future::join_all(attempts)
        .await
        .into_iter()
        .filter(|result| matches!(result, Ok(true)))
        .count();

    assert_eq!(accepted, 1);
    assert_eq!(store.count(None).await.unwrap(), 1);

    queue.start();
    assert!(wait_until(Duration::from_secs(5), || recorder.count() == 1).await);
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(recorder.count(), 1);
    assert_eq!(recorder.identities(), vec!["GetReleaseGroup_7"]);

    // Once the work is done the same identity may be queued again
    assert!(queue.submit(group_command(7, 5)).await.unwrap());
    queue.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test(start_paused = true)]
async fn test_commands_run_in_priority_then_insertion_order() {
    let stack = idle_stack();
    let recorder = Arc::new(RecordingHandler::new());
    let mut handlers = HandlerRegistry::new();
    handlers.register(CommandType::GetReleaseGroup, recorder.clone());
    let (queue, _store) = stack.memory_queue(handlers);

    for (gid, priority) in [(1, 9), (2, 3), (3, 7), (4, 3)] {
        assert!(queue.submit(group_command(gid, priority)).await.unwrap());
    }

    queue.start();
    assert!(wait_until(Duration::from_secs(5), || recorder.count() == 4).await);

    assert_eq!(recorder.priorities(), vec![3, 3, 7, 9]);
    assert_eq!(
        recorder.identities(),
        vec![
            "GetReleaseGroup_2",
            "GetReleaseGroup_4",
            "GetReleaseGroup_3",
            "GetReleaseGroup_1",
        ]
    );
    queue.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test(start_paused = true)]
async fn test_user_priority_jumps_the_queue() {
    let stack = idle_stack();
    let recorder = Arc::new(RecordingHandler::new());
    let mut handlers = HandlerRegistry::new();
    handlers.register(CommandType::GetReleaseGroup, recorder.clone());
    let (queue, _store) = stack.memory_queue(handlers);

    queue.submit(group_command(1, 5)).await.unwrap();
    let urgent = GetReleaseGroup { gid: 2 }
        .into_command()
        .unwrap()
        .user_initiated();
    assert_eq!(urgent.priority, USER_PRIORITY);
    queue.submit(urgent).await.unwrap();

    queue.start();
    assert!(wait_until(Duration::from_secs(5), || recorder.count() == 2).await);
    assert_eq!(
        recorder.identities(),
        vec!["GetReleaseGroup_2", "GetReleaseGroup_1"]
    );
    queue.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test(start_paused = true)]
async fn test_failing_command_is_dropped_and_queue_continues() {
    let stack = idle_stack();
    let failing = Arc::new(FailingHandler::new());
    let recorder = Arc::new(RecordingHandler::new());
    let mut handlers = HandlerRegistry::new();
    handlers.register(CommandType::GetReleaseGroup, failing.clone());
    handlers.register(CommandType::GetFile, recorder.clone());
    let (queue, store) = stack.memory_queue(handlers);
    let mut events = stack.events.subscribe();

    let poison = group_command(13, 1);
    let poison_id = poison.identity.clone();
    queue.submit(poison).await.unwrap();
    queue.submit(file_command(1024, "abc123").with_priority(5)).await.unwrap();

    queue.start();
    assert!(wait_until(Duration::from_secs(5), || recorder.count() == 1).await);

    assert_eq!(failing.calls(), 1);
    assert!(!store.contains(&poison_id).await.unwrap());
    assert_eq!(store.count(None).await.unwrap(), 0);

    let failures: Vec<_> = drain_events(&mut events)
        .into_iter()
        .filter_map(|event| match event {
            RegistryEvent::CommandFailed {
                identity, queue, ..
            } => Some((identity, queue)),
            _ => None,
        })
        .collect();
    assert_eq!(failures, vec![(poison_id, "general".to_string())]);
    queue.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test(start_paused = true)]
async fn test_panicking_handler_is_isolated() {
    let stack = idle_stack();
    let panicking = Arc::new(FailingHandler::panicking());
    let recorder = Arc::new(RecordingHandler::new());
    let mut handlers = HandlerRegistry::new();
    handlers.register(CommandType::GetReleaseGroup, panicking.clone());
    handlers.register(CommandType::GetFile, recorder.clone());
    let (queue, store) = stack.memory_queue(handlers);

    queue.submit(group_command(13, 1)).await.unwrap();
    queue.submit(file_command(1024, "abc123")).await.unwrap();

    queue.start();
    assert!(wait_until(Duration::from_secs(5), || recorder.count() == 1).await);
    assert_eq!(panicking.calls(), 1);
    assert_eq!(store.count(None).await.unwrap(), 0);
    queue.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test(start_paused = true)]
async fn test_missing_handler_fails_command() {
    let stack = idle_stack();
    let (queue, store) = stack.memory_queue(HandlerRegistry::new());
    let mut events = stack.events.subscribe();

    queue.submit(group_command(5, 5)).await.unwrap();
    queue.start();

    assert!(
        wait_until(Duration::from_secs(5), || {
            drain_events(&mut events)
                .iter()
                .any(|e| matches!(e, RegistryEvent::CommandFailed { .. }))
        })
        .await
    );
    assert_eq!(store.count(None).await.unwrap(), 0);
    queue.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test(start_paused = true)]
async fn test_manual_pause_holds_work_until_resume() {
    let stack = idle_stack();
    let recorder = Arc::new(RecordingHandler::new());
    let mut handlers = HandlerRegistry::new();
    handlers.register(CommandType::GetReleaseGroup, recorder.clone());
    let (queue, _store) = stack.memory_queue(handlers);

    queue.pause(QueueName::General);
    queue.start();
    queue.submit(group_command(1, 5)).await.unwrap();

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(recorder.count(), 0);

    let status = queue.status().await.unwrap();
    let general = status
        .iter()
        .find(|s| s.queue == QueueName::General)
        .unwrap();
    assert_eq!(general.paused, Some(PauseReason::Manual));
    assert_eq!(general.pending, 1);

    queue.resume(QueueName::General);
    assert!(wait_until(Duration::from_secs(5), || recorder.count() == 1).await);
    queue.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test(start_paused = true)]
async fn test_queues_run_independently() {
    let stack = idle_stack();
    let slow = Arc::new(RecordingHandler::with_delay(Duration::from_secs(60)));
    let fast = Arc::new(RecordingHandler::new());
    let mut handlers = HandlerRegistry::new();
    handlers.register(CommandType::GetReleaseGroup, slow.clone());
    handlers.register(CommandType::DownloadImage, fast.clone());
    let (queue, _store) = stack.memory_queue(handlers);

    queue.submit(group_command(1, 5)).await.unwrap();
    let image = anilib_core::handlers::DownloadImage::new("http://img/1.jpg", "/tmp/1.jpg")
        .into_command()
        .unwrap();
    assert_eq!(image.queue, QueueName::Images);
    queue.submit(image).await.unwrap();

    queue.start();
    assert!(wait_until(Duration::from_secs(5), || fast.count() == 1).await);
    assert_eq!(slow.count(), 0);

    assert!(wait_until(Duration::from_secs(120), || slow.count() == 1).await);
    queue.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test(start_paused = true)]
async fn test_chained_commands_are_processed() {
    let stack = idle_stack();
    let recorder = Arc::new(RecordingHandler::new());
    let mut handlers = HandlerRegistry::new();
    handlers.register_fn(CommandType::GetFile, |_command, ctx| async move {
        ctx.submit(GetReleaseGroup { gid: 99 }.into_command()?)
            .await
            .map(|_| ())
    });
    handlers.register(CommandType::GetReleaseGroup, recorder.clone());
    let (queue, _store) = stack.memory_queue(handlers);

    queue.submit(file_command(10, "feed")).await.unwrap();
    queue.start();

    assert!(wait_until(Duration::from_secs(10), || recorder.count() == 1).await);
    assert_eq!(recorder.identities(), vec!["GetReleaseGroup_99"]);
    queue.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_leaves_unfinished_work_pending() {
    let stack = idle_stack();
    let slow = Arc::new(RecordingHandler::with_delay(Duration::from_secs(3600)));
    let mut handlers = HandlerRegistry::new();
    handlers.register(CommandType::GetReleaseGroup, slow.clone());
    let (queue, store) = stack.memory_queue(handlers);

    queue.submit(group_command(1, 5)).await.unwrap();
    queue.start();
    tokio::time::sleep(Duration::from_secs(1)).await;

    queue.shutdown(Duration::from_secs(5)).await;

    assert_eq!(slow.count(), 0);
    assert_eq!(store.count(Some(QueueName::General)).await.unwrap(), 1);
}
