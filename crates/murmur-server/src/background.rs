//! Background tasks for the murmur server.
//!
//! Includes:
//! - Leaving voice channels that only the assistant is left in.

use crate::AppState;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};

/// Periodic auto-leave task with an explicit shutdown handle.
pub struct PresenceWatcher {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl PresenceWatcher {
    /// Starts checking every `period` whether any session's voice channel
    /// has emptied out.
    pub fn spawn(state: AppState, period: Duration) -> Self {
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        tracing::info!(period_ms = period.as_millis() as u64, "starting presence watcher");

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        reconcile(&state).await;
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::info!("presence watcher stopped");
        });

        Self { shutdown, handle }
    }

    /// Stops the task and waits for it. Leaves already spawned by the
    /// watcher keep running.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            tracing::error!("presence watcher join error: {}", e);
        }
    }
}

/// Runs one watcher tick.
///
/// Scans a snapshot of the registry without holding any lock. For every
/// ready session whose voice channel holds nobody but the assistant, spawns
/// a silent leave; the leave waits on the session's synthesis lock, the
/// scan does not. Returns the spawned leaves.
pub async fn reconcile(state: &AppState) -> Vec<JoinHandle<()>> {
    let assistant = state.adapter.assistant_id();
    let mut leaves = Vec::new();

    for session in state.registry.snapshot() {
        if session.is_closed() || !state.adapter.is_ready(session.connection()) {
            continue;
        }

        let channel = &session.connection().channel_id;
        let occupants = match state.adapter.current_occupants(channel).await {
            Ok(occupants) => occupants,
            Err(e) => {
                tracing::warn!(
                    guild_id = %session.guild_id(),
                    channel_id = %channel,
                    "failed to query voice occupants: {}",
                    e
                );
                continue;
            }
        };

        if occupants.iter().any(|user| *user != assistant) {
            continue;
        }
        if !session.try_begin_auto_leave() {
            continue;
        }

        tracing::info!(
            guild_id = %session.guild_id(),
            session_id = %session.id(),
            "voice channel is empty, leaving"
        );

        let state = state.clone();
        leaves.push(tokio::spawn(async move {
            if let Err(e) = state.leave(&session).await {
                tracing::warn!(
                    guild_id = %session.guild_id(),
                    "automatic leave failed, will retry: {}",
                    e
                );
            }
            session.end_auto_leave();
        }));
    }

    leaves
}
