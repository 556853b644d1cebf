use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

use crate::errors::CallError;
use crate::events::{CallEvent, CallEventListener, EventEmitter, SessionStatus, VideoTrackEntry};
use crate::sdk::{SdkEvent, SdkEventReceiver, VideoSdk};
use crate::session::{CallSession, LocalMedia, Teardown};
use crate::view::CallScreenView;

/// Mediates between the call screen's user input and the video SDK.
///
/// User actions call out to the SDK and return without waiting for the
/// outcome. SDK callbacks are drained by a single task in delivery order
/// and applied to the shared [`CallSession`].
///
/// Listener events are emitted while the session lock is held, so they
/// reach listeners in the same order as the state changes they describe.
/// Listeners must not call back into the controller from `on_event`.
#[derive(Clone)]
pub struct CallController {
    sdk: Arc<dyn VideoSdk>,
    session: Arc<Mutex<CallSession>>,
    emitter: EventEmitter,
}

impl CallController {
    /// Register for SDK callbacks and start the loop that applies them.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(sdk: Arc<dyn VideoSdk>, media: LocalMedia) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        sdk.register_callbacks(tx);

        let session = Arc::new(Mutex::new(CallSession::new(media)));
        let emitter = EventEmitter::new();

        tokio::spawn(Self::event_loop(rx, session.clone(), emitter.clone()));

        Self {
            sdk,
            session,
            emitter,
        }
    }

    /// Register a listener for call screen events.
    pub fn add_listener(&self, listener: Arc<dyn CallEventListener>) {
        self.emitter.add_listener(listener);
    }

    pub async fn status(&self) -> SessionStatus {
        self.session.lock().await.status()
    }

    pub async fn token(&self) -> String {
        self.session.lock().await.token().to_string()
    }

    /// Store the contents of the token text field.
    pub async fn set_token(&self, token: &str) {
        self.session.lock().await.set_token(token);
    }

    pub async fn video_tracks(&self) -> Vec<VideoTrackEntry> {
        self.session.lock().await.tracks().entries()
    }

    pub async fn is_audio_enabled(&self) -> bool {
        self.session.lock().await.media().audio_enabled
    }

    pub async fn is_video_enabled(&self) -> bool {
        self.session.lock().await.media().video_enabled
    }

    /// What the screen should currently show.
    pub async fn view(&self) -> CallScreenView {
        CallScreenView::from_session(&*self.session.lock().await)
    }

    /// Hand the token to the SDK and move to `Connecting`.
    ///
    /// The token is not validated here; the SDK reports a bad one through
    /// `RoomFailedToConnect`.
    pub async fn connect(&self, token: &str) -> Result<(), CallError> {
        let mut session = self.session.lock().await;
        session.set_token(token);
        session.begin_connect()?;

        if token.is_empty() {
            tracing::warn!("connecting with an empty access token");
        }
        self.sdk.connect(token);

        tracing::info!("connect requested");
        self.emitter.emit(CallEvent::StatusChanged(SessionStatus::Connecting));
        drop(session);
        Ok(())
    }

    /// Ask the SDK to leave the room.
    ///
    /// Status stays as it is until the SDK confirms with `RoomDisconnected`.
    pub fn end_call(&self) {
        tracing::info!("end call requested");
        self.sdk.disconnect();
    }

    /// Request the opposite of the current microphone state and adopt
    /// whatever the SDK confirms. Confirmations apply in arrival order.
    pub async fn toggle_microphone(&self) -> Result<bool, CallError> {
        let requested = !self.is_audio_enabled().await;
        tracing::info!("microphone toggle requested: enabled={requested}");

        let actual = self
            .sdk
            .set_local_audio_enabled(requested)
            .await
            .map_err(|_| CallError::Sdk("audio confirmation dropped".into()))?;

        let mut session = self.session.lock().await;
        let changed = session.media_mut().confirm_audio(actual);
        tracing::info!("microphone enabled: {actual}");
        if changed {
            self.emitter.emit(CallEvent::AudioEnabledChanged(actual));
        }
        drop(session);
        Ok(actual)
    }

    /// Camera counterpart of [`Self::toggle_microphone`].
    pub async fn toggle_camera(&self) -> Result<bool, CallError> {
        let requested = !self.is_video_enabled().await;
        tracing::info!("camera toggle requested: enabled={requested}");

        let actual = self
            .sdk
            .set_local_video_enabled(requested)
            .await
            .map_err(|_| CallError::Sdk("video confirmation dropped".into()))?;

        let mut session = self.session.lock().await;
        let changed = session.media_mut().confirm_video(actual);
        tracing::info!("camera enabled: {actual}");
        if changed {
            self.emitter.emit(CallEvent::VideoEnabledChanged(actual));
        }
        drop(session);
        Ok(actual)
    }

    /// Camera facing belongs to the SDK; nothing changes locally.
    pub fn flip_camera(&self) {
        tracing::debug!("flip camera requested");
        self.sdk.flip_camera();
    }

    /// Apply one SDK callback. The event loop calls this for every event it
    /// receives; it is public so hosts that pump callbacks themselves can too.
    pub async fn handle_sdk_event(&self, event: SdkEvent) {
        Self::apply(&self.session, &self.emitter, event).await;
    }

    async fn event_loop(
        mut events: SdkEventReceiver,
        session: Arc<Mutex<CallSession>>,
        emitter: EventEmitter,
    ) {
        while let Some(event) = events.recv().await {
            Self::apply(&session, &emitter, event).await;
        }
        tracing::info!("sdk callback loop ended");
    }

    async fn apply(session: &Mutex<CallSession>, emitter: &EventEmitter, event: SdkEvent) {
        let mut session = session.lock().await;
        let events = match event {
            SdkEvent::RoomConnected { room_name, error } => {
                if let Some(error) = error {
                    tracing::warn!("room connected with error: {error}");
                }
                if session.room_connected() {
                    tracing::info!("room connected: {room_name}");
                    vec![CallEvent::StatusChanged(SessionStatus::Connected)]
                } else {
                    tracing::warn!(
                        "ignoring room connected for {room_name} while {:?}",
                        session.status()
                    );
                    Vec::new()
                }
            }

            SdkEvent::RoomDisconnected { room_name, error } => {
                match error {
                    Some(error) => tracing::warn!("room {room_name} disconnected: {error}"),
                    None => tracing::info!("room disconnected: {room_name}"),
                }
                Self::teardown_events(session.room_ended())
            }

            SdkEvent::RoomFailedToConnect { error } => {
                tracing::warn!("room failed to connect: {error}");
                Self::teardown_events(session.room_ended())
            }

            SdkEvent::ParticipantAddedVideoTrack { participant, track } => {
                tracing::debug!(
                    "video track added: participant={} track={}",
                    participant.sid,
                    track.sid
                );
                let entry = VideoTrackEntry {
                    participant_sid: participant.sid,
                    video_track_sid: track.sid,
                };
                session
                    .add_video_track(entry)
                    .map(CallEvent::VideoTrackAdded)
                    .into_iter()
                    .collect()
            }

            SdkEvent::ParticipantRemovedVideoTrack { participant, track } => {
                tracing::debug!(
                    "video track removed: participant={} track={}",
                    participant.sid,
                    track.sid
                );
                session
                    .remove_video_track(&track.sid)
                    .map(|entry| CallEvent::VideoTrackRemoved(entry.video_track_sid))
                    .into_iter()
                    .collect()
            }
        };

        for event in events {
            emitter.emit(event);
        }
    }

    fn teardown_events(teardown: Teardown) -> Vec<CallEvent> {
        let mut events: Vec<_> = teardown
            .cleared
            .into_iter()
            .map(|entry| CallEvent::VideoTrackRemoved(entry.video_track_sid))
            .collect();
        if teardown.status_changed {
            events.push(CallEvent::StatusChanged(SessionStatus::Disconnected));
        }
        events
    }
}
