//! Tokio host for the coordinator.
//!
//! The coordinator is single-threaded state, so it lives on one task that
//! drains an unbounded inbox: command requests (each with a oneshot reply),
//! engine events and fired timers. Timers are spawned sleeps that post back
//! into the same inbox through a weak sender, so the loop ends once every
//! [`CoordinatorHandle`] is gone. A cancelled timer task exits right away.

use crate::coordinator::{Coordinator, CoordinatorSettings};
use crate::engine::SpeechEngine;
use crate::messenger::Messenger;
use crate::protocol::{Command, EngineEvent, Reply, TabId};
use crate::scheduler::{Scheduler, TimerId, TimerTask};
use anyhow::{Context, anyhow};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

#[derive(Debug)]
pub enum Inbound {
    Request {
        origin: Option<TabId>,
        command: Command,
        reply: oneshot::Sender<Reply>,
    },
    Engine(EngineEvent),
    Timer {
        id: TimerId,
        task: TimerTask,
    },
    Shutdown,
}

/// Cloneable front door to a running coordinator task.
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::UnboundedSender<Inbound>,
}

impl CoordinatorHandle {
    /// Enqueue a command and return the receiver for its reply. Commands are
    /// applied in the order they were submitted.
    pub fn submit(
        &self,
        origin: Option<TabId>,
        command: Command,
    ) -> anyhow::Result<oneshot::Receiver<Reply>> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Inbound::Request {
                origin,
                command,
                reply,
            })
            .map_err(|_| anyhow!("coordinator loop has stopped"))?;
        Ok(rx)
    }

    pub async fn request(&self, origin: Option<TabId>, command: Command) -> anyhow::Result<Reply> {
        let rx = self.submit(origin, command)?;
        rx.await.context("coordinator dropped the request")
    }

    pub fn engine_event(&self, event: EngineEvent) -> anyhow::Result<()> {
        self.tx
            .send(Inbound::Engine(event))
            .map_err(|_| anyhow!("coordinator loop has stopped"))
    }

    /// Ask the loop to exit after draining what is already queued.
    pub fn shutdown(&self) {
        if self.tx.send(Inbound::Shutdown).is_err() {
            debug!("Coordinator loop already stopped");
        }
    }
}

/// [`Scheduler`] backed by tokio timers.
pub struct TokioScheduler {
    tx: mpsc::WeakUnboundedSender<Inbound>,
    next_id: u64,
    live: Arc<Mutex<HashMap<TimerId, CancellationToken>>>,
}

impl TokioScheduler {
    fn new(tx: mpsc::WeakUnboundedSender<Inbound>) -> Self {
        Self {
            tx,
            next_id: 0,
            live: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&mut self, delay: Duration, task: TimerTask) -> TimerId {
        self.next_id = self.next_id.wrapping_add(1);
        let id = TimerId(self.next_id);
        let token = CancellationToken::new();
        if let Ok(mut live) = self.live.lock() {
            live.insert(id, token.clone());
        }

        let tx = self.tx.clone();
        let live = Arc::clone(&self.live);
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = token.cancelled() => {
                    trace!(timer = %id, "Timer cancelled");
                    return;
                }
            }
            if let Ok(mut live) = live.lock() {
                live.remove(&id);
            }
            match tx.upgrade() {
                Some(tx) if tx.send(Inbound::Timer { id, task }).is_ok() => {}
                _ => trace!(timer = %id, "Coordinator gone; dropping timer"),
            }
        });
        id
    }

    fn cancel(&mut self, id: TimerId) {
        let token = self.live.lock().ok().and_then(|mut live| live.remove(&id));
        if let Some(token) = token {
            token.cancel();
        }
    }
}

/// Start a coordinator on its own task.
pub fn spawn_coordinator<E, M>(
    settings: CoordinatorSettings,
    engine: Option<E>,
    messenger: M,
) -> (CoordinatorHandle, JoinHandle<()>)
where
    E: SpeechEngine + Send + 'static,
    M: Messenger + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let scheduler = TokioScheduler::new(tx.downgrade());
    let coordinator = Coordinator::new(settings, engine, messenger, scheduler);
    let task = tokio::spawn(run_loop(coordinator, rx));
    (CoordinatorHandle { tx }, task)
}

async fn run_loop<E, M>(
    mut coordinator: Coordinator<E, M, TokioScheduler>,
    mut rx: mpsc::UnboundedReceiver<Inbound>,
) where
    E: SpeechEngine,
    M: Messenger,
{
    debug!("Coordinator loop started");
    while let Some(inbound) = rx.recv().await {
        match inbound {
            Inbound::Request {
                origin,
                command,
                reply,
            } => {
                let action = command.action();
                let response = coordinator.handle(origin, command);
                if reply.send(response).is_err() {
                    debug!(action, "Requester went away before the reply");
                }
            }
            Inbound::Engine(event) => coordinator.on_engine_event(event),
            Inbound::Timer { id, task } => coordinator.on_timer(id, task),
            Inbound::Shutdown => {
                info!("Coordinator loop shutting down");
                return;
            }
        }
    }
    info!("All coordinator handles dropped; loop exiting");
}
