//! UniFFI bindings for tilecall-core.
//!
//! Provides a CallClient object that wraps the call screen controller,
//! the LiveKit-backed SDK and the settings store into a single FFI-safe
//! interface.

use std::sync::Arc;
use tilecall_core::{
    self, CallEvent as CoreCallEvent, CallScreenView as CoreCallScreenView,
    CameraFacing as CoreCameraFacing, SessionStatus as CoreSessionStatus,
    VideoTrackEntry as CoreVideoTrackEntry,
};

uniffi::include_scaffolding!("tilecall");

// ── Android WebRTC initialization ────────────────────────────────────
//
// Must be called from Kotlin AFTER System.loadLibrary, before connect().
// webrtc::InitAndroid needs a valid JNI class loader context, which is
// NOT available inside JNI_OnLoad.

#[cfg(target_os = "android")]
#[unsafe(no_mangle)]
pub extern "C" fn Java_io_tilecall_mobile_TilecallApplication_nativeInitWebrtc(
    env: *mut std::ffi::c_void,
    _class: *mut std::ffi::c_void,
) {
    platform_log("TILECALL FFI: nativeInitWebrtc called");
    let env = match unsafe { jni::JNIEnv::from_raw(env as *mut jni::sys::JNIEnv) } {
        Ok(env) => env,
        Err(e) => {
            platform_log(&format!("TILECALL FFI: invalid JNIEnv: {e}"));
            return;
        }
    };
    let jvm = match env.get_java_vm() {
        Ok(jvm) => jvm,
        Err(e) => {
            platform_log(&format!("TILECALL FFI: no JavaVM: {e}"));
            return;
        }
    };

    libwebrtc::android::initialize_android(&jvm);

    // Prevent Drop from calling DestroyJavaVM
    std::mem::forget(jvm);
    platform_log("TILECALL FFI: WebRTC initialized");
}

// ── Platform log helper ──────────────────────────────────────────────

/// Write a message to logcat on Android, syslog on iOS, or stderr elsewhere.
/// Usable before `init_logging` has run.
fn platform_log(msg: &str) {
    #[cfg(target_os = "android")]
    {
        use std::ffi::CString;
        unsafe extern "C" {
            fn __android_log_write(prio: i32, tag: *const std::ffi::c_char, text: *const std::ffi::c_char) -> i32;
        }
        let text = CString::new(msg).unwrap_or_else(|_| c"(invalid utf8)".to_owned());
        unsafe { __android_log_write(4 /* INFO */, c"TILECALL_FFI".as_ptr(), text.as_ptr()); }
    }
    #[cfg(target_os = "ios")]
    {
        use std::ffi::CString;
        unsafe extern "C" {
            fn syslog(priority: i32, message: *const std::ffi::c_char, ...);
        }
        let text = CString::new(msg).unwrap_or_else(|_| c"(invalid utf8)".to_owned());
        unsafe { syslog(6 /* LOG_INFO */, c"%s".as_ptr(), text.as_ptr()); }
    }
    #[cfg(not(any(target_os = "android", target_os = "ios")))]
    eprintln!("{msg}");
}

// ── Namespace functions ──────────────────────────────────────────────

/// Initialize tracing/logging. Call once from the host before using CallClient.
/// On Android, stderr goes to logcat for debuggable builds.
fn init_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tilecall_core=debug,tilecall_ffi=debug"));
        if tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .try_init()
            .is_err()
        {
            platform_log("TILECALL FFI: a global tracing subscriber is already set");
        }
    });
}

// ── FFI-safe type conversions ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Disconnected,
    Connecting,
    Connected,
}

impl From<CoreSessionStatus> for SessionStatus {
    fn from(s: CoreSessionStatus) -> Self {
        match s {
            CoreSessionStatus::Disconnected => Self::Disconnected,
            CoreSessionStatus::Connecting => Self::Connecting,
            CoreSessionStatus::Connected => Self::Connected,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraFacing {
    Front,
    Back,
}

impl From<CoreCameraFacing> for CameraFacing {
    fn from(f: CoreCameraFacing) -> Self {
        match f {
            CoreCameraFacing::Front => Self::Front,
            CoreCameraFacing::Back => Self::Back,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoTrackEntry {
    pub participant_sid: String,
    pub video_track_sid: String,
}

impl From<CoreVideoTrackEntry> for VideoTrackEntry {
    fn from(t: CoreVideoTrackEntry) -> Self {
        Self {
            participant_sid: t.participant_sid,
            video_track_sid: t.video_track_sid,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEvent {
    StatusChanged { status: SessionStatus },
    VideoTrackAdded { entry: VideoTrackEntry },
    VideoTrackRemoved { track_sid: String },
    AudioEnabledChanged { enabled: bool },
    VideoEnabledChanged { enabled: bool },
}

impl From<CoreCallEvent> for CallEvent {
    fn from(e: CoreCallEvent) -> Self {
        match e {
            CoreCallEvent::StatusChanged(s) => Self::StatusChanged { status: s.into() },
            CoreCallEvent::VideoTrackAdded(t) => Self::VideoTrackAdded { entry: t.into() },
            CoreCallEvent::VideoTrackRemoved(sid) => Self::VideoTrackRemoved { track_sid: sid },
            CoreCallEvent::AudioEnabledChanged(enabled) => Self::AudioEnabledChanged { enabled },
            CoreCallEvent::VideoEnabledChanged(enabled) => Self::VideoEnabledChanged { enabled },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallScreenView {
    TokenEntry {
        token: String,
    },
    Call {
        show_remote_grid: bool,
        remote_tiles: Vec<VideoTrackEntry>,
        mute_label: String,
        local_video_enabled: bool,
    },
}

impl From<CoreCallScreenView> for CallScreenView {
    fn from(v: CoreCallScreenView) -> Self {
        match v {
            CoreCallScreenView::TokenEntry { token } => Self::TokenEntry { token },
            CoreCallScreenView::Call {
                show_remote_grid,
                remote_tiles,
                mute_label,
                local_video_enabled,
            } => Self::Call {
                show_remote_grid,
                remote_tiles: remote_tiles.into_iter().map(VideoTrackEntry::from).collect(),
                mute_label,
                local_video_enabled,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_url: Option<String>,
    pub audio_enabled_on_join: bool,
    pub video_enabled_on_join: bool,
}

impl From<tilecall_core::Settings> for Settings {
    fn from(s: tilecall_core::Settings) -> Self {
        Self {
            server_url: s.server_url,
            audio_enabled_on_join: s.audio_enabled_on_join,
            video_enabled_on_join: s.video_enabled_on_join,
        }
    }
}

// ── Error conversion ──────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("SDK error: {msg}")]
    Sdk { msg: String },
    #[error("Invalid state: {msg}")]
    InvalidState { msg: String },
    #[error("Invalid URL: {msg}")]
    InvalidUrl { msg: String },
    #[error("Invalid frame: {msg}")]
    InvalidFrame { msg: String },
}

impl From<tilecall_core::CallError> for CallError {
    fn from(e: tilecall_core::CallError) -> Self {
        tracing::error!("CallError: {e}");
        match e {
            tilecall_core::CallError::Sdk(msg) => Self::Sdk { msg },
            tilecall_core::CallError::InvalidState(msg) => Self::InvalidState { msg },
            tilecall_core::CallError::InvalidUrl(msg) => Self::InvalidUrl { msg },
            tilecall_core::CallError::InvalidFrame(msg) => Self::InvalidFrame { msg },
        }
    }
}

// ── Callback interfaces ───────────────────────────────────────────────

pub trait CallEventListener: Send + Sync {
    fn on_event(&self, event: CallEvent);
}

pub trait CameraControl: Send + Sync {
    fn switch_camera(&self, facing: CameraFacing);
}

// ── Bridges: FFI callback → core trait ────────────────────────────────

struct BridgeListener {
    ffi_listener: Arc<dyn CallEventListener>,
}

impl tilecall_core::CallEventListener for BridgeListener {
    fn on_event(&self, event: CoreCallEvent) {
        self.ffi_listener.on_event(event.into());
    }
}

struct BridgeCamera {
    ffi_camera: Arc<dyn CameraControl>,
}

impl tilecall_core::CameraControl for BridgeCamera {
    fn switch_camera(&self, facing: CoreCameraFacing) {
        self.ffi_camera.switch_camera(facing.into());
    }
}

// ── CallClient: main FFI object ───────────────────────────────────────

pub struct CallClient {
    controller: tilecall_core::CallController,
    sdk: Arc<tilecall_core::LiveKitSdk>,
    settings: tilecall_core::SettingsStore,
    rt: tokio::runtime::Runtime,
}

impl CallClient {
    /// `server_url` overrides and replaces the persisted one; without either
    /// the client cannot be built.
    pub fn new(
        data_dir: String,
        server_url: Option<String>,
        camera: Box<dyn CameraControl>,
    ) -> Result<Self, CallError> {
        platform_log("TILECALL FFI: CallClient::new() called");
        let rt = tokio::runtime::Runtime::new()
            .map_err(|e| CallError::Sdk { msg: format!("failed to create tokio runtime: {e}") })?;

        let settings = tilecall_core::SettingsStore::new(&data_dir);
        let url = server_url
            .clone()
            .or_else(|| settings.get().server_url)
            .ok_or_else(|| CallError::InvalidUrl { msg: "no server url configured".into() })?;

        let camera = Arc::new(BridgeCamera {
            ffi_camera: Arc::from(camera),
        });
        let media = settings.get().initial_media();
        let sdk = Arc::new(tilecall_core::LiveKitSdk::new(&url, camera, media)?);
        if server_url.is_some() {
            settings.set_server_url(Some(url));
        }

        let controller = {
            let _guard = rt.enter();
            tilecall_core::CallController::new(sdk.clone(), media)
        };

        platform_log("TILECALL FFI: CallClient::new() completed");
        Ok(Self {
            controller,
            sdk,
            settings,
            rt,
        })
    }

    pub fn set_token(&self, token: String) {
        self.rt.block_on(self.controller.set_token(&token));
    }

    pub fn token(&self) -> String {
        self.rt.block_on(self.controller.token())
    }

    pub fn connect(&self, token: String) -> Result<(), CallError> {
        platform_log("TILECALL FFI: connect() entered");
        self.rt
            .block_on(self.controller.connect(&token))
            .map_err(CallError::from)
    }

    pub fn end_call(&self) {
        let _guard = self.rt.enter();
        self.controller.end_call();
    }

    /// Returns at once; the confirmed state arrives as `AudioEnabledChanged`.
    pub fn toggle_microphone(&self) {
        let controller = self.controller.clone();
        self.rt.spawn(async move {
            if let Err(e) = controller.toggle_microphone().await {
                tracing::warn!("microphone toggle failed: {e}");
            }
        });
    }

    /// Returns at once; the confirmed state arrives as `VideoEnabledChanged`.
    pub fn toggle_camera(&self) {
        let controller = self.controller.clone();
        self.rt.spawn(async move {
            if let Err(e) = controller.toggle_camera().await {
                tracing::warn!("camera toggle failed: {e}");
            }
        });
    }

    pub fn flip_camera(&self) {
        self.controller.flip_camera();
    }

    /// Interleaved 16-bit PCM from the host microphone.
    pub fn push_audio_frame(
        &self,
        samples: Vec<i16>,
        sample_rate: u32,
        num_channels: u32,
    ) -> Result<(), CallError> {
        self.rt
            .block_on(self.sdk.controls().push_audio_frame(&samples, sample_rate, num_channels))
            .map_err(CallError::from)
    }

    /// One tightly packed I420 frame from the host camera.
    pub fn push_video_frame(
        &self,
        width: u32,
        height: u32,
        y: Vec<u8>,
        u: Vec<u8>,
        v: Vec<u8>,
    ) -> Result<(), CallError> {
        self.sdk
            .controls()
            .push_video_frame(width, height, &y, &u, &v)
            .map_err(CallError::from)
    }

    pub fn status(&self) -> SessionStatus {
        self.rt.block_on(self.controller.status()).into()
    }

    pub fn video_tracks(&self) -> Vec<VideoTrackEntry> {
        self.rt
            .block_on(self.controller.video_tracks())
            .into_iter()
            .map(VideoTrackEntry::from)
            .collect()
    }

    pub fn is_audio_enabled(&self) -> bool {
        self.rt.block_on(self.controller.is_audio_enabled())
    }

    pub fn is_video_enabled(&self) -> bool {
        self.rt.block_on(self.controller.is_video_enabled())
    }

    pub fn view(&self) -> CallScreenView {
        self.rt.block_on(self.controller.view()).into()
    }

    pub fn add_listener(&self, listener: Box<dyn CallEventListener>) {
        let bridge = Arc::new(BridgeListener {
            ffi_listener: Arc::from(listener),
        });
        self.controller.add_listener(bridge);
    }

    pub fn get_settings(&self) -> Settings {
        self.settings.get().into()
    }

    pub fn set_audio_enabled_on_join(&self, enabled: bool) {
        self.settings.set_audio_enabled_on_join(enabled);
    }

    pub fn set_video_enabled_on_join(&self, enabled: bool) {
        self.settings.set_video_enabled_on_join(enabled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingCamera {
        switches: Arc<Mutex<Vec<CameraFacing>>>,
    }

    impl CameraControl for RecordingCamera {
        fn switch_camera(&self, facing: CameraFacing) {
            self.switches.lock().unwrap().push(facing);
        }
    }

    fn client(dir: &tempfile::TempDir, url: Option<&str>) -> Result<CallClient, CallError> {
        CallClient::new(
            dir.path().to_str().unwrap().to_string(),
            url.map(str::to_string),
            Box::new(RecordingCamera::default()),
        )
    }

    #[test]
    fn core_events_convert() {
        let event: CallEvent = CoreCallEvent::VideoTrackAdded(CoreVideoTrackEntry {
            participant_sid: "PA1".into(),
            video_track_sid: "T1".into(),
        })
        .into();
        assert_eq!(
            event,
            CallEvent::VideoTrackAdded {
                entry: VideoTrackEntry {
                    participant_sid: "PA1".into(),
                    video_track_sid: "T1".into(),
                }
            }
        );

        let event: CallEvent = CoreCallEvent::StatusChanged(CoreSessionStatus::Connecting).into();
        assert_eq!(event, CallEvent::StatusChanged { status: SessionStatus::Connecting });
    }

    #[test]
    fn core_errors_convert() {
        let err: CallError = tilecall_core::CallError::InvalidState("busy".into()).into();
        assert!(matches!(err, CallError::InvalidState { msg } if msg == "busy"));
    }

    #[test]
    fn new_client_requires_server_url() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(client(&dir, None), Err(CallError::InvalidUrl { .. })));
        assert!(matches!(
            client(&dir, Some("ftp://example.org")),
            Err(CallError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn new_client_persists_server_url_and_starts_on_token_entry() {
        let dir = tempfile::tempdir().unwrap();
        {
            let client = client(&dir, Some("wss://video.example.org")).unwrap();
            assert_eq!(client.status(), SessionStatus::Disconnected);
            client.set_token("tok".into());
            assert_eq!(client.view(), CallScreenView::TokenEntry { token: "tok".into() });
        }

        let client = client(&dir, None).unwrap();
        assert_eq!(
            client.get_settings().server_url.as_deref(),
            Some("wss://video.example.org")
        );
        assert_eq!(client.token(), "");
    }

    #[test]
    fn join_settings_seed_local_media() {
        let dir = tempfile::tempdir().unwrap();
        {
            let client = client(&dir, Some("wss://video.example.org")).unwrap();
            client.set_audio_enabled_on_join(false);
        }
        let client = client(&dir, None).unwrap();
        assert!(!client.is_audio_enabled());
        assert!(client.is_video_enabled());
    }

    #[test]
    fn join_settings_seed_published_tracks() {
        let dir = tempfile::tempdir().unwrap();
        {
            let client = client(&dir, Some("wss://video.example.org")).unwrap();
            client.set_video_enabled_on_join(false);
        }
        let client = client(&dir, None).unwrap();
        assert!(!client.sdk.controls().wanted().video_enabled);
        assert!(client.sdk.controls().wanted().audio_enabled);
    }

    #[test]
    fn frames_pushed_before_join_are_accepted_and_checked() {
        let dir = tempfile::tempdir().unwrap();
        let client = client(&dir, Some("wss://video.example.org")).unwrap();

        assert!(client.push_audio_frame(vec![0; 480], 48_000, 1).is_ok());
        assert!(client
            .push_video_frame(2, 2, vec![0; 4], vec![0; 1], vec![0; 1])
            .is_ok());
        assert!(matches!(
            client.push_video_frame(2, 2, vec![0; 3], vec![0; 1], vec![0; 1]),
            Err(CallError::InvalidFrame { .. })
        ));
        assert!(matches!(
            client.push_audio_frame(vec![0; 3], 48_000, 2),
            Err(CallError::InvalidFrame { .. })
        ));
    }

    #[test]
    fn flip_camera_reaches_host_camera() {
        let dir = tempfile::tempdir().unwrap();
        let camera = RecordingCamera::default();
        let switches = camera.switches.clone();
        let client = CallClient::new(
            dir.path().to_str().unwrap().to_string(),
            Some("wss://video.example.org".into()),
            Box::new(camera),
        )
        .unwrap();

        client.flip_camera();
        assert_eq!(*switches.lock().unwrap(), vec![CameraFacing::Back]);
    }
}
