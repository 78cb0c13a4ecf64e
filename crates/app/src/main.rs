use futures::StreamExt;
use threadline::chat::{self, ChatEngine, StoreEvent};
use threadline::settings::SettingsStore;
use tracing_subscriber::EnvFilter;

/// Headless demo: seeds mock threads, runs the simulation, and logs every store event
/// until Ctrl-C.
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings_store = SettingsStore::load();
    let mut engine = ChatEngine::new((*settings_store.settings()).clone());
    if let Err(err) = engine.seed_demo() {
        tracing::error!("Failed to seed demo threads: {}", err);
        return;
    }

    let (handle, worker) = chat::spawn(engine);
    let events = match handle.subscribe_events().await {
        Ok(events) => events,
        Err(err) => {
            tracing::error!("Failed to subscribe to store events: {}", err);
            return;
        }
    };

    let logger = tokio::spawn(chat::into_stream(events).for_each(|event| async move {
        match &event {
            StoreEvent::ThreadsChanged { threads } => {
                let unread = threads
                    .iter()
                    .filter(|thread| thread.has_unread_messages)
                    .count();
                let typing = threads
                    .iter()
                    .find(|thread| thread.is_typing)
                    .map(|thread| thread.display_name.clone());
                tracing::info!(threads = threads.len(), unread, ?typing, "thread list changed");
            }
            StoreEvent::MessagesChanged { thread_id, messages } => {
                if let Some(last) = messages.last() {
                    tracing::info!(
                        %thread_id,
                        author = last.author_display_name.as_deref().unwrap_or("you"),
                        body = last.body_text.as_deref().unwrap_or("[photo]"),
                        status = ?last.delivery_status,
                        "conversation changed"
                    );
                }
            }
            StoreEvent::ScrollToMessage {
                thread_id,
                message_id,
            } => {
                tracing::debug!(%thread_id, %message_id, "scroll to message");
            }
            StoreEvent::ThreadRemoved { thread_id } => {
                tracing::info!(%thread_id, "thread removed");
            }
        }
    }));

    if let Err(err) = handle.start_simulation().await {
        tracing::error!("Failed to start simulation: {}", err);
    }

    let first_chat = handle.threads().await.ok().and_then(|threads| {
        threads
            .into_iter()
            .find(|thread| !thread.is_note_to_self && !thread.is_blocked)
    });
    if let Some(thread) = first_chat {
        match handle.send_message(thread.id.clone(), "Hello").await {
            Ok(Some(message_id)) => {
                tracing::info!(thread = %thread.display_name, %message_id, "sent greeting")
            }
            Ok(None) => {
                tracing::warn!(thread = %thread.display_name, "greeting target disappeared")
            }
            Err(err) => tracing::error!("Failed to send greeting: {}", err),
        }
    }

    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {}", err);
    }

    let _ = handle.stop_simulation().await;
    if let Err(err) = handle.shutdown() {
        tracing::warn!("Engine already stopped: {}", err);
    }
    drop(handle);

    match worker.await {
        Ok(engine) => tracing::info!(
            threads = engine.threads().len(),
            elapsed = ?engine.now(),
            "engine stopped"
        ),
        Err(err) => tracing::error!("Engine task failed: {}", err),
    }
    logger.abort();
}
