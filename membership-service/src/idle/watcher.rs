use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::monitor::{ActivityKind, ExpiryCause, IdleEvent, IdleMonitor, IdleState};
use crate::config::IdleConfig;

const COMMAND_BUFFER: usize = 64;

/// Ends the session once the monitor expires.
#[async_trait]
pub trait SessionTerminator: Send + Sync {
    async fn terminate(&self, cause: ExpiryCause);
}

#[derive(Debug, Clone, Copy)]
enum Command {
    Activity(ActivityKind),
    Extend,
    Logout,
}

/// Background task that drives an [`IdleMonitor`] from the tokio clock.
pub struct IdleWatcher;

impl IdleWatcher {
    pub fn spawn(config: IdleConfig, terminator: Arc<dyn SessionTerminator>) -> IdleHandle {
        let (commands, rx) = mpsc::channel(COMMAND_BUFFER);
        let (state_tx, state) = watch::channel(IdleState::Active);
        let monitor = IdleMonitor::new(config, Instant::now());

        let task = tokio::spawn(run(monitor, rx, state_tx, terminator));

        IdleHandle {
            commands,
            state,
            task,
        }
    }
}

async fn run(
    mut monitor: IdleMonitor,
    mut commands: mpsc::Receiver<Command>,
    state: watch::Sender<IdleState>,
    terminator: Arc<dyn SessionTerminator>,
) {
    while let Some(deadline) = monitor.next_deadline() {
        let event = tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Activity(kind)) => monitor.record_activity(kind, Instant::now()),
                Some(Command::Extend) => monitor.extend(Instant::now()),
                Some(Command::Logout) => monitor.logout(),
                None => break,
            },
            _ = tokio::time::sleep_until(deadline) => monitor.poll(Instant::now()),
        };

        let Some(event) = event else { continue };
        state.send_replace(monitor.state());

        match event {
            IdleEvent::WarningStarted { countdown_secs } => {
                tracing::info!(countdown_secs, "Idle warning shown");
            }
            IdleEvent::Extended => {
                tracing::debug!("Idle countdown cancelled");
            }
            IdleEvent::Expired(cause) => {
                tracing::info!(cause = ?cause, "Session ended by idle monitor");
                terminator.terminate(cause).await;
            }
        }
    }
}

/// Owner of a running watcher. Dropping it stops the task.
pub struct IdleHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<IdleState>,
    task: JoinHandle<()>,
}

impl IdleHandle {
    pub fn state(&self) -> IdleState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<IdleState> {
        self.state.clone()
    }

    /// Seconds left in the warning countdown, rounded up.
    ///
    /// The published state carries the absolute deadline, so this agrees
    /// with the monitor for the same `now`.
    pub fn countdown_secs(&self) -> Option<u64> {
        self.countdown_secs_at(Instant::now())
    }

    pub fn countdown_secs_at(&self, now: Instant) -> Option<u64> {
        self.state().countdown_secs(now)
    }

    /// High-frequency input; dropped when the queue is full.
    pub fn record_activity(&self, kind: ActivityKind) {
        let _ = self.commands.try_send(Command::Activity(kind));
    }

    pub async fn extend(&self) {
        let _ = self.commands.send(Command::Extend).await;
    }

    /// Ends the session now. Calling it after expiry does nothing.
    pub async fn logout(&self) {
        let _ = self.commands.send(Command::Logout).await;
    }

    /// Resolves once the monitor has expired.
    pub async fn expired(&self) -> ExpiryCause {
        let mut rx = self.state.clone();
        loop {
            if let IdleState::Expired(cause) = *rx.borrow_and_update() {
                return cause;
            }
            if rx.changed().await.is_err() {
                // Task is gone; report its last published state.
                return match *rx.borrow() {
                    IdleState::Expired(cause) => cause,
                    _ => ExpiryCause::Manual,
                };
            }
        }
    }
}

impl Drop for IdleHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
