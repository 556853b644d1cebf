//! Test doubles shared by the unit tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;

use crate::events::{CallEvent, CallEventListener};
use crate::sdk::{Confirmation, SdkEvent, SdkEventSender, VideoSdk};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SdkCall {
    Connect(String),
    Disconnect,
    SetAudio(bool),
    SetVideo(bool),
    FlipCamera,
}

/// Records every outbound call and holds enablement confirmations until the
/// test releases them, in whatever order it likes.
#[derive(Default)]
pub struct RecordingSdk {
    auto_confirm: bool,
    reject_connect: bool,
    calls: Mutex<Vec<SdkCall>>,
    sink: Mutex<Option<SdkEventSender>>,
    audio_pending: Mutex<Vec<Option<oneshot::Sender<bool>>>>,
    video_pending: Mutex<Vec<Option<oneshot::Sender<bool>>>>,
}

impl RecordingSdk {
    /// Confirms every enablement request with the requested value.
    pub fn auto_confirming() -> Self {
        Self {
            auto_confirm: true,
            ..Self::default()
        }
    }

    /// Reports `RoomFailedToConnect` from inside `connect`, before it returns.
    pub fn rejecting_connect() -> Self {
        Self {
            reject_connect: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<SdkCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn emit(&self, event: SdkEvent) {
        let sink = self.sink.lock().unwrap();
        sink.as_ref().expect("callbacks not registered").send(event).unwrap();
    }

    pub fn audio_requests(&self) -> usize {
        self.audio_pending.lock().unwrap().len()
    }

    pub fn video_requests(&self) -> usize {
        self.video_pending.lock().unwrap().len()
    }

    pub fn confirm_audio(&self, request: usize, actual: bool) {
        let sender = self.audio_pending.lock().unwrap()[request].take().unwrap();
        sender.send(actual).unwrap();
    }

    pub fn confirm_video(&self, request: usize, actual: bool) {
        let sender = self.video_pending.lock().unwrap()[request].take().unwrap();
        sender.send(actual).unwrap();
    }

    /// Drop a pending audio confirmation without answering it.
    pub fn drop_audio(&self, request: usize) {
        self.audio_pending.lock().unwrap()[request].take();
    }

    fn hold(
        &self,
        pending: &Mutex<Vec<Option<oneshot::Sender<bool>>>>,
        enabled: bool,
    ) -> Confirmation {
        let (tx, rx) = oneshot::channel();
        if self.auto_confirm {
            tx.send(enabled).unwrap();
        } else {
            pending.lock().unwrap().push(Some(tx));
        }
        rx
    }
}

impl VideoSdk for RecordingSdk {
    fn register_callbacks(&self, sink: SdkEventSender) {
        *self.sink.lock().unwrap() = Some(sink);
    }

    fn connect(&self, access_token: &str) {
        self.calls.lock().unwrap().push(SdkCall::Connect(access_token.to_string()));
        if self.reject_connect {
            self.emit(SdkEvent::RoomFailedToConnect {
                error: "token rejected".to_string(),
            });
        }
    }

    fn disconnect(&self) {
        self.calls.lock().unwrap().push(SdkCall::Disconnect);
    }

    fn set_local_audio_enabled(&self, enabled: bool) -> Confirmation {
        self.calls.lock().unwrap().push(SdkCall::SetAudio(enabled));
        self.hold(&self.audio_pending, enabled)
    }

    fn set_local_video_enabled(&self, enabled: bool) -> Confirmation {
        self.calls.lock().unwrap().push(SdkCall::SetVideo(enabled));
        self.hold(&self.video_pending, enabled)
    }

    fn flip_camera(&self) {
        self.calls.lock().unwrap().push(SdkCall::FlipCamera);
    }
}

#[derive(Default)]
pub struct EventCapture {
    events: Mutex<Vec<CallEvent>>,
}

impl EventCapture {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<CallEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl CallEventListener for EventCapture {
    fn on_event(&self, event: CallEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Yield to other tasks on the test runtime until `cond` holds.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    let reached = tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::task::yield_now().await;
        }
    })
    .await;
    assert!(reached.is_ok(), "condition not reached");
}
