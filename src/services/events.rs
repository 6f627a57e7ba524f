use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::models::{InstallEvent, ProgressEvent, ProgressPhase};

/// Receives lifecycle and progress events. Implementations must return immediately.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: InstallEvent);

    fn progress(&self, event: ProgressEvent) {
        match event.phase {
            ProgressPhase::OnlinePatch => self.emit(InstallEvent::OnlinePatchProgress(event)),
            ProgressPhase::PwrDownload | ProgressPhase::Patching => {
                self.emit(InstallEvent::Progress(event))
            }
        }
    }
}

/// Forwards events over an unbounded channel so a slow UI never stalls a transfer.
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<InstallEvent>,
}

impl ChannelSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<InstallEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: InstallEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("event receiver dropped");
        }
    }
}

/// Keeps every event in memory; used by hosts that render after the fact and by tests.
#[derive(Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<InstallEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<InstallEvent> {
        self.lock().clone()
    }

    pub fn progress_for(&self, phase: ProgressPhase) -> Vec<ProgressEvent> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                InstallEvent::Progress(progress) | InstallEvent::OnlinePatchProgress(progress)
                    if progress.phase == phase =>
                {
                    Some(progress.clone())
                }
                _ => None,
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<InstallEvent>> {
        match self.events.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: InstallEvent) {
        self.lock().push(event);
    }
}

/// Process-wide "current activity" broadcast (rich presence and similar).
///
/// Hosts own `connect`/`disconnect`; the orchestrator only touches `set_state` and `clear`
/// at install start and finish.
pub trait PresenceChannel: Send + Sync {
    fn connect(&self) {}
    fn set_state(&self, details: &str, state: &str);
    fn clear(&self);
    fn disconnect(&self) {}
}

#[derive(Clone, Copy, Default)]
pub struct NoopPresence;

impl PresenceChannel for NoopPresence {
    fn set_state(&self, _details: &str, _state: &str) {}
    fn clear(&self) {}
}
