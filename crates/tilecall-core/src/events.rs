use std::sync::{Arc, PoisonError, RwLock};

/// Events emitted by the core to native UI listeners.
///
/// Each event follows a state change; listeners re-render from
/// [`crate::CallController::view`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEvent {
    StatusChanged(SessionStatus),
    VideoTrackAdded(VideoTrackEntry),
    VideoTrackRemoved(String), // track SID
    AudioEnabledChanged(bool),
    VideoEnabledChanged(bool),
}

/// Which part of the call screen is live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl SessionStatus {
    /// Allowed moves: Disconnected -> Connecting -> Connected -> Disconnected,
    /// plus Connecting -> Disconnected when the attempt fails.
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        matches!(
            (self, next),
            (Self::Disconnected, Self::Connecting)
                | (Self::Connecting, Self::Connected)
                | (Self::Connecting, Self::Disconnected)
                | (Self::Connected, Self::Disconnected)
        )
    }
}

/// A remote video tile: the owning participant and the track it renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoTrackEntry {
    pub participant_sid: String,
    pub video_track_sid: String,
}

/// Trait for receiving events from the core.
/// Implementations must be Send + Sync (called from tokio tasks).
pub trait CallEventListener: Send + Sync {
    fn on_event(&self, event: CallEvent);
}

/// Internal event emitter that dispatches to registered listeners.
#[derive(Clone, Default)]
pub struct EventEmitter {
    listeners: Arc<RwLock<Vec<Arc<dyn CallEventListener>>>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&self, listener: Arc<dyn CallEventListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    pub fn emit(&self, event: CallEvent) {
        let listeners = self.listeners.read().unwrap_or_else(PoisonError::into_inner);
        for listener in listeners.iter() {
            listener.on_event(event.clone());
        }
    }
}
