use crate::errors::CallError;
use crate::events::{SessionStatus, VideoTrackEntry};
use crate::tracks::TrackRegistry;

/// Last confirmed state of the local microphone and camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalMedia {
    pub audio_enabled: bool,
    pub video_enabled: bool,
}

impl Default for LocalMedia {
    fn default() -> Self {
        Self {
            audio_enabled: true,
            video_enabled: true,
        }
    }
}

impl LocalMedia {
    /// Apply the SDK-reported audio state. Returns true if the flag changed.
    pub fn confirm_audio(&mut self, actual: bool) -> bool {
        let changed = self.audio_enabled != actual;
        self.audio_enabled = actual;
        changed
    }

    /// Apply the SDK-reported video state. Returns true if the flag changed.
    pub fn confirm_video(&mut self, actual: bool) -> bool {
        let changed = self.video_enabled != actual;
        self.video_enabled = actual;
        changed
    }
}

/// Result of tearing the session down to `Disconnected`.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Teardown {
    pub status_changed: bool,
    pub cleared: Vec<VideoTrackEntry>,
}

/// All state behind the call screen.
///
/// Owned by the controller; every mutation goes through these methods.
#[derive(Debug, Clone, Default)]
pub struct CallSession {
    status: SessionStatus,
    token: String,
    tracks: TrackRegistry,
    media: LocalMedia,
}

impl CallSession {
    pub fn new(media: LocalMedia) -> Self {
        Self {
            media,
            ..Self::default()
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = token.into();
    }

    pub fn tracks(&self) -> &TrackRegistry {
        &self.tracks
    }

    pub fn media(&self) -> LocalMedia {
        self.media
    }

    pub fn media_mut(&mut self) -> &mut LocalMedia {
        &mut self.media
    }

    /// Disconnected -> Connecting. Any other starting status is rejected.
    pub fn begin_connect(&mut self) -> Result<(), CallError> {
        self.transition(SessionStatus::Connecting)
    }

    /// Connecting -> Connected. A stale callback in any other status is ignored.
    pub fn room_connected(&mut self) -> bool {
        self.transition(SessionStatus::Connected).is_ok()
    }

    /// Any status -> Disconnected. No track is live once the room is gone,
    /// so the registry is emptied as well.
    pub fn room_ended(&mut self) -> Teardown {
        let status_changed = self.status != SessionStatus::Disconnected;
        self.status = SessionStatus::Disconnected;
        Teardown {
            status_changed,
            cleared: self.tracks.clear(),
        }
    }

    /// Returns the entry when it is new or differs from what was stored.
    pub fn add_video_track(&mut self, entry: VideoTrackEntry) -> Option<VideoTrackEntry> {
        if self.status == SessionStatus::Disconnected {
            return None;
        }
        match self.tracks.upsert(entry.clone()) {
            Some(previous) if previous == entry => None,
            _ => Some(entry),
        }
    }

    pub fn remove_video_track(&mut self, track_sid: &str) -> Option<VideoTrackEntry> {
        self.tracks.remove(track_sid)
    }

    fn transition(&mut self, next: SessionStatus) -> Result<(), CallError> {
        if !self.status.can_transition_to(next) {
            return Err(CallError::InvalidState(format!(
                "cannot move from {:?} to {next:?}",
                self.status
            )));
        }
        self.status = next;
        Ok(())
    }
}
