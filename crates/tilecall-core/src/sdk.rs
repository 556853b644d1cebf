//! Seam between the call screen and the video SDK that does the real work.
//!
//! Outbound calls return immediately. Results come back later, either as
//! an [`SdkEvent`] on the registered channel or through a [`Confirmation`].

use tokio::sync::{mpsc, oneshot};

/// Channel the SDK delivers its callbacks on.
pub type SdkEventSender = mpsc::UnboundedSender<SdkEvent>;
pub type SdkEventReceiver = mpsc::UnboundedReceiver<SdkEvent>;

/// Resolves to the enabled state the SDK actually applied.
pub type Confirmation = oneshot::Receiver<bool>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantRef {
    pub sid: String,
    pub identity: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackRef {
    pub sid: String,
    pub name: String,
}

/// Callbacks from the SDK, in the order it delivers them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SdkEvent {
    RoomConnected {
        room_name: String,
        error: Option<String>,
    },
    RoomDisconnected {
        room_name: String,
        error: Option<String>,
    },
    RoomFailedToConnect {
        error: String,
    },
    ParticipantAddedVideoTrack {
        participant: ParticipantRef,
        track: TrackRef,
    },
    ParticipantRemovedVideoTrack {
        participant: ParticipantRef,
        track: TrackRef,
    },
}

/// Capabilities the call screen needs from a video SDK.
pub trait VideoSdk: Send + Sync {
    /// Install the channel callbacks are delivered on. Replaces any previous one.
    fn register_callbacks(&self, sink: SdkEventSender);

    fn connect(&self, access_token: &str);

    fn disconnect(&self);

    fn set_local_audio_enabled(&self, enabled: bool) -> Confirmation;

    fn set_local_video_enabled(&self, enabled: bool) -> Confirmation;

    fn flip_camera(&self);
}
