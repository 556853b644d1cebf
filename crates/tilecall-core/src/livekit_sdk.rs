use std::fmt::Debug;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use livekit::prelude::{RemoteParticipant, Room, RoomEvent, RoomOptions};
use livekit::track::{TrackKind as LkTrackKind, TrackSource as LkTrackSource};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

use crate::controls::MediaControls;
use crate::errors::CallError;
use crate::sdk::{Confirmation, ParticipantRef, SdkEvent, SdkEventSender, TrackRef, VideoSdk};
use crate::session::LocalMedia;

/// Which physical camera the host capture pipeline should use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CameraFacing {
    #[default]
    Front,
    Back,
}

impl CameraFacing {
    pub fn flipped(self) -> Self {
        match self {
            Self::Front => Self::Back,
            Self::Back => Self::Front,
        }
    }
}

/// Native camera capture, implemented by the platform shell.
///
/// LiveKit only carries frames; switching the physical camera happens on
/// the capture side.
pub trait CameraControl: Send + Sync {
    fn switch_camera(&self, facing: CameraFacing);
}

/// Shared slot for the controller's callback channel.
#[derive(Clone, Default)]
struct CallbackSink(Arc<StdMutex<Option<SdkEventSender>>>);

impl CallbackSink {
    fn set(&self, sender: SdkEventSender) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Some(sender);
    }

    fn emit(&self, event: SdkEvent) {
        let sink = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        match sink.as_ref() {
            Some(sender) => {
                if sender.send(event).is_err() {
                    tracing::debug!("callback receiver gone, dropping sdk event");
                }
            }
            None => tracing::warn!("no callbacks registered, dropping {event:?}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrackChange {
    Subscribed,
    Unsubscribed,
}

/// Callback for a remote track (un)subscription; only video tracks count.
fn video_track_event(
    change: TrackChange,
    kind: LkTrackKind,
    participant: ParticipantRef,
    track: TrackRef,
) -> Option<SdkEvent> {
    if kind != LkTrackKind::Video {
        return None;
    }
    Some(match change {
        TrackChange::Subscribed => SdkEvent::ParticipantAddedVideoTrack { participant, track },
        TrackChange::Unsubscribed => SdkEvent::ParticipantRemovedVideoTrack { participant, track },
    })
}

/// Error reported with `RoomDisconnected`. A disconnect the client asked for
/// is not an error.
fn disconnect_error(reason: impl Debug) -> Option<String> {
    let reason = format!("{reason:?}");
    (reason != "ClientInitiated").then_some(reason)
}

/// [`VideoSdk`] backed by a LiveKit room.
///
/// Every outbound call spawns onto the ambient tokio runtime and returns at
/// once; outcomes are reported through the registered callback channel.
pub struct LiveKitSdk {
    server_url: String,
    camera: Arc<dyn CameraControl>,
    facing: StdMutex<CameraFacing>,
    controls: MediaControls,
    sink: CallbackSink,
    room: Arc<Mutex<Option<Arc<Room>>>>,
    session_task: StdMutex<Option<JoinHandle<()>>>,
}

impl LiveKitSdk {
    /// `media` is what the local tracks start as once published.
    pub fn new(
        server_url: &str,
        camera: Arc<dyn CameraControl>,
        media: LocalMedia,
    ) -> Result<Self, CallError> {
        Ok(Self {
            server_url: validate_server_url(server_url)?,
            camera,
            facing: StdMutex::new(CameraFacing::default()),
            controls: MediaControls::new(media),
            sink: CallbackSink::default(),
            room: Arc::new(Mutex::new(None)),
            session_task: StdMutex::new(None),
        })
    }

    /// Local tracks; native capture pushes frames through these.
    pub fn controls(&self) -> &MediaControls {
        &self.controls
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub fn camera_facing(&self) -> CameraFacing {
        *self.facing.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn participant_ref(participant: &RemoteParticipant) -> ParticipantRef {
        ParticipantRef {
            sid: participant.sid().to_string(),
            identity: participant.identity().to_string(),
        }
    }

    fn track_ref(sid: impl ToString, name: String) -> TrackRef {
        TrackRef {
            sid: sid.to_string(),
            name,
        }
    }

    fn replace_session_task(&self, task: JoinHandle<()>) {
        let previous = self
            .session_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    fn confirm(&self, source: LkTrackSource, enabled: bool) -> Confirmation {
        let (tx, rx) = oneshot::channel();
        let room = self.room.clone();
        let controls = self.controls.clone();
        tokio::spawn(async move {
            let room = room.lock().await.clone();
            let actual = controls.set_enabled(room.as_deref(), source, enabled);
            tracing::info!("{source:?} enabled: {actual}");
            if tx.send(actual).is_err() {
                tracing::debug!("{source:?} confirmation receiver gone");
            }
        });
        rx
    }

    async fn run_session(
        server_url: String,
        token: String,
        sink: CallbackSink,
        room_slot: Arc<Mutex<Option<Arc<Room>>>>,
        controls: MediaControls,
    ) {
        let mut options = RoomOptions::default();
        options.auto_subscribe = true;

        let (room, events) = match Room::connect(&server_url, &token, options).await {
            Ok(connected) => connected,
            Err(e) => {
                sink.emit(SdkEvent::RoomFailedToConnect { error: e.to_string() });
                return;
            }
        };

        let room = Arc::new(room);
        let room_name = room.name();
        *room_slot.lock().await = Some(room.clone());
        controls.publish(&room).await;
        sink.emit(SdkEvent::RoomConnected {
            room_name: room_name.clone(),
            error: None,
        });

        Self::event_loop(events, room_name, sink, room_slot, controls).await;
    }

    async fn event_loop(
        mut events: mpsc::UnboundedReceiver<RoomEvent>,
        room_name: String,
        sink: CallbackSink,
        room_slot: Arc<Mutex<Option<Arc<Room>>>>,
        controls: MediaControls,
    ) {
        while let Some(event) = events.recv().await {
            match event {
                RoomEvent::TrackSubscribed { track, publication, participant } => {
                    if let Some(event) = video_track_event(
                        TrackChange::Subscribed,
                        publication.kind(),
                        Self::participant_ref(&participant),
                        Self::track_ref(track.sid(), publication.name()),
                    ) {
                        sink.emit(event);
                    }
                }

                RoomEvent::TrackUnsubscribed { track, publication, participant } => {
                    if let Some(event) = video_track_event(
                        TrackChange::Unsubscribed,
                        publication.kind(),
                        Self::participant_ref(&participant),
                        Self::track_ref(track.sid(), publication.name()),
                    ) {
                        sink.emit(event);
                    }
                }

                RoomEvent::Reconnecting => tracing::info!("room {room_name} reconnecting"),
                RoomEvent::Reconnected => tracing::info!("room {room_name} reconnected"),

                RoomEvent::Disconnected { reason } => {
                    *room_slot.lock().await = None;
                    controls.clear();
                    sink.emit(SdkEvent::RoomDisconnected {
                        room_name: room_name.clone(),
                        error: disconnect_error(reason),
                    });
                    break;
                }

                _ => tracing::trace!("unhandled room event: {event:?}"),
            }
        }

        tracing::info!("room event loop ended");
    }
}

impl VideoSdk for LiveKitSdk {
    fn register_callbacks(&self, sink: SdkEventSender) {
        self.sink.set(sink);
    }

    fn connect(&self, access_token: &str) {
        let task = tokio::spawn(Self::run_session(
            self.server_url.clone(),
            access_token.to_string(),
            self.sink.clone(),
            self.room.clone(),
            self.controls.clone(),
        ));
        self.replace_session_task(task);
    }

    fn disconnect(&self) {
        // Stop the session task first so a close-triggered `Disconnected`
        // does not report the same teardown twice.
        let task = self
            .session_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
        }

        let sink = self.sink.clone();
        let room_slot = self.room.clone();
        let controls = self.controls.clone();

        tokio::spawn(async move {
            let room = room_slot.lock().await.take();
            controls.clear();
            let (room_name, error) = match room {
                Some(room) => {
                    let room_name = room.name();
                    let error = room.close().await.err().map(|e| e.to_string());
                    (room_name, error)
                }
                None => (String::new(), None),
            };
            sink.emit(SdkEvent::RoomDisconnected { room_name, error });
        });
    }

    fn set_local_audio_enabled(&self, enabled: bool) -> Confirmation {
        self.confirm(LkTrackSource::Microphone, enabled)
    }

    fn set_local_video_enabled(&self, enabled: bool) -> Confirmation {
        self.confirm(LkTrackSource::Camera, enabled)
    }

    fn flip_camera(&self) {
        let facing = {
            let mut facing = self.facing.lock().unwrap_or_else(PoisonError::into_inner);
            *facing = facing.flipped();
            *facing
        };
        tracing::info!("camera facing: {facing:?}");
        self.camera.switch_camera(facing);
    }
}

fn validate_server_url(server_url: &str) -> Result<String, CallError> {
    let parsed = url::Url::parse(server_url)
        .map_err(|e| CallError::InvalidUrl(format!("{server_url}: {e}")))?;
    match parsed.scheme() {
        "ws" | "wss" | "http" | "https" if parsed.host_str().is_some() => Ok(server_url.to_string()),
        scheme => Err(CallError::InvalidUrl(format!(
            "unsupported server url scheme {scheme:?} in {server_url}"
        ))),
    }
}
