use crate::events::{SessionStatus, VideoTrackEntry};
use crate::session::CallSession;

/// Render model for the call screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallScreenView {
    /// Token field and connect button.
    TokenEntry { token: String },
    /// Controls and the local tile; remote tiles only once connected.
    Call {
        show_remote_grid: bool,
        remote_tiles: Vec<VideoTrackEntry>,
        mute_label: String,
        local_video_enabled: bool,
    },
}

impl CallScreenView {
    pub fn from_session(session: &CallSession) -> Self {
        let media = session.media();
        match session.status() {
            SessionStatus::Disconnected => Self::TokenEntry {
                token: session.token().to_string(),
            },
            status => {
                let show_remote_grid = status == SessionStatus::Connected;
                Self::Call {
                    show_remote_grid,
                    remote_tiles: if show_remote_grid {
                        session.tracks().entries()
                    } else {
                        Vec::new()
                    },
                    mute_label: mute_label(media.audio_enabled).to_string(),
                    local_video_enabled: media.video_enabled,
                }
            }
        }
    }
}

fn mute_label(audio_enabled: bool) -> &'static str {
    if audio_enabled { "Mute" } else { "Unmute" }
}
