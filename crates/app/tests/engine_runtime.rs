use std::time::Duration;

use futures::StreamExt;
use threadline::chat::{self, ChatEngine, StoreEvent};
use threadline::settings::EngineSettings;
use threadline_storage::{DeliveryStatus, MessageStatus, ThreadId};

fn seeded_engine() -> ChatEngine {
    let mut engine = ChatEngine::new(EngineSettings::default().with_seed(42));
    engine.seed_demo().unwrap();
    engine
}

#[tokio::test(start_paused = true)]
async fn send_reaches_read_through_the_actor() {
    let (handle, worker) = chat::spawn(seeded_engine());
    let kim = ThreadId::from("kim");
    let mut threads = handle.subscribe_threads().await.unwrap();

    let message_id = handle
        .send_message(kim.clone(), "Hello")
        .await
        .unwrap()
        .unwrap();
    let thread = threads
        .borrow_and_update()
        .iter()
        .find(|thread| thread.id == kim)
        .cloned()
        .unwrap();
    assert_eq!(thread.last_message_status, Some(MessageStatus::Sending));

    tokio::time::sleep(Duration::from_secs(4)).await;
    let messages = handle.messages_for_thread(kim.clone()).await.unwrap();
    let sent = messages.last().unwrap();
    assert_eq!(sent.id, message_id);
    assert_eq!(sent.delivery_status, Some(DeliveryStatus::Read));

    let status = threads
        .borrow()
        .iter()
        .find(|thread| thread.id == kim)
        .and_then(|thread| thread.last_message_status);
    assert_eq!(status, Some(MessageStatus::Read));

    handle.shutdown().unwrap();
    worker.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn simulation_streams_inbound_traffic() {
    let (handle, worker) = chat::spawn(seeded_engine());
    let events = chat::into_stream(handle.subscribe_events().await.unwrap());
    assert!(handle.start_simulation().await.unwrap());

    let mut scrolls = Box::pin(events.filter(|event| {
        futures::future::ready(matches!(event, StoreEvent::ScrollToMessage { .. }))
    }));
    let scroll = tokio::time::timeout(Duration::from_secs(16), scrolls.next())
        .await
        .unwrap()
        .unwrap();
    let thread_id = scroll.thread_id().cloned().unwrap();
    assert_ne!(thread_id, ThreadId::from("note-to-self"));

    let threads = handle.threads().await.unwrap();
    let target = threads.iter().find(|thread| thread.id == thread_id).unwrap();
    assert!(target.has_unread_messages);
    assert!(handle.mark_as_read(thread_id.clone()).await.unwrap());
    assert!(!handle.mark_as_read(thread_id).await.unwrap());

    assert!(handle.stop_simulation().await.unwrap());
    handle.shutdown().unwrap();
    let engine = worker.await.unwrap();
    assert!(!engine.simulation_running());
    assert_eq!(engine.pending_timers(), 0);
}

#[tokio::test(start_paused = true)]
async fn archived_thread_closes_its_message_channel() {
    let (handle, worker) = chat::spawn(seeded_engine());
    let kim = ThreadId::from("kim");
    let mut messages = handle.subscribe_messages(kim.clone()).await.unwrap();
    assert!(!messages.borrow_and_update().is_empty());

    assert!(handle.archive_thread(kim.clone()).await.unwrap());
    assert!(messages.borrow().is_empty());
    assert!(messages.has_changed().is_err());
    assert!(handle.messages_for_thread(kim).await.unwrap().is_empty());

    drop(handle);
    worker.await.unwrap();
}
