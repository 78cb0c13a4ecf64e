use std::time::Duration;

use snafu::{OptionExt, Snafu};
use threadline_storage::{MessageId, MessageRecord, ThreadId, ThreadRecord};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::engine::ChatEngine;
use super::events::StoreEvent;
use super::notify::{MessagesReceiver, ThreadsReceiver};

type Job = Box<dyn FnOnce(&mut ChatEngine) + Send>;

enum Command {
    Run(Job),
    Shutdown,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum RuntimeError {
    #[snafu(display("chat engine is no longer running during {stage}"))]
    EngineStopped { stage: &'static str },
}

/// Cloneable handle to the engine actor. Every call is serialized with timer firings.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl EngineHandle {
    /// Runs `job` on the actor and returns its result.
    pub async fn call<R, F>(&self, job: F) -> Result<R, RuntimeError>
    where
        R: Send + 'static,
        F: FnOnce(&mut ChatEngine) -> R + Send + 'static,
    {
        let (reply, response) = oneshot::channel();
        let job: Job = Box::new(move |engine| {
            let _ = reply.send(job(engine));
        });
        self.commands
            .send(Command::Run(job))
            .ok()
            .context(EngineStoppedSnafu {
                stage: "engine-call-send",
            })?;
        response.await.ok().context(EngineStoppedSnafu {
            stage: "engine-call-reply",
        })
    }

    pub async fn threads(&self) -> Result<Vec<ThreadRecord>, RuntimeError> {
        self.call(|engine| engine.threads()).await
    }

    pub async fn messages_for_thread(
        &self,
        thread_id: ThreadId,
    ) -> Result<Vec<MessageRecord>, RuntimeError> {
        self.call(move |engine| engine.messages_for_thread(&thread_id))
            .await
    }

    pub async fn send_message(
        &self,
        thread_id: ThreadId,
        text: impl Into<String>,
    ) -> Result<Option<MessageId>, RuntimeError> {
        let text = text.into();
        self.call(move |engine| engine.send_message(&thread_id, text))
            .await
    }

    pub async fn mark_as_read(&self, thread_id: ThreadId) -> Result<bool, RuntimeError> {
        self.call(move |engine| engine.mark_as_read(&thread_id))
            .await
    }

    pub async fn archive_thread(&self, thread_id: ThreadId) -> Result<bool, RuntimeError> {
        self.call(move |engine| engine.archive_thread(&thread_id))
            .await
    }

    pub async fn start_simulation(&self) -> Result<bool, RuntimeError> {
        self.call(ChatEngine::start_simulation).await
    }

    pub async fn stop_simulation(&self) -> Result<bool, RuntimeError> {
        self.call(ChatEngine::stop_simulation).await
    }

    pub async fn subscribe_events(&self) -> Result<broadcast::Receiver<StoreEvent>, RuntimeError> {
        self.call(|engine| engine.subscribe_events()).await
    }

    pub async fn subscribe_threads(&self) -> Result<ThreadsReceiver, RuntimeError> {
        self.call(|engine| engine.subscribe_threads()).await
    }

    pub async fn subscribe_messages(
        &self,
        thread_id: ThreadId,
    ) -> Result<MessagesReceiver, RuntimeError> {
        self.call(move |engine| engine.subscribe_messages(&thread_id))
            .await
    }

    /// Asks the actor to exit after the commands already queued.
    pub fn shutdown(&self) -> Result<(), RuntimeError> {
        self.commands
            .send(Command::Shutdown)
            .ok()
            .context(EngineStoppedSnafu {
                stage: "engine-shutdown",
            })
    }
}

/// Moves `engine` onto its own task. The task ends on `shutdown` or when every handle
/// is dropped, and hands the engine back.
pub fn spawn(engine: ChatEngine) -> (EngineHandle, JoinHandle<ChatEngine>) {
    let (commands, receiver) = mpsc::unbounded_channel();
    let worker = tokio::spawn(run(engine, receiver));
    (EngineHandle { commands }, worker)
}

async fn run(mut engine: ChatEngine, mut commands: mpsc::UnboundedReceiver<Command>) -> ChatEngine {
    // Virtual time zero is pinned to the instant the engine's clock already shows.
    let started = Instant::now();
    let origin = started.checked_sub(engine.now()).unwrap_or(started);
    tracing::debug!("chat engine actor started");

    loop {
        let deadline = engine.next_deadline();
        let timer = async {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(origin + deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            command = commands.recv() => {
                engine.run_until(elapsed_since(origin));
                match command {
                    Some(Command::Run(job)) => job(&mut engine),
                    Some(Command::Shutdown) | None => break,
                }
            }
            () = timer => {
                engine.run_until(elapsed_since(origin));
            }
        }
    }

    tracing::debug!(at = ?engine.now(), "chat engine actor stopped");
    engine
}

fn elapsed_since(origin: Instant) -> Duration {
    Instant::now().saturating_duration_since(origin)
}
