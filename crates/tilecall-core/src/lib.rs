//! Call screen core logic.
//!
//! Pure Rust crate holding the call screen state and the seam to the
//! video SDK. Consumed by native UI shells via UniFFI bindings.

pub mod controller;
pub mod controls;
pub mod errors;
pub mod events;
pub mod livekit_sdk;
pub mod sdk;
pub mod session;
pub mod settings;
pub mod tracks;
pub mod view;

#[cfg(test)]
mod testing;

pub use controller::CallController;
pub use controls::MediaControls;
pub use errors::CallError;
pub use events::{CallEvent, CallEventListener, SessionStatus, VideoTrackEntry};
pub use livekit_sdk::{CameraControl, CameraFacing, LiveKitSdk};
pub use sdk::{Confirmation, ParticipantRef, SdkEvent, SdkEventSender, TrackRef, VideoSdk};
pub use session::{CallSession, LocalMedia};
pub use settings::{Settings, SettingsStore};
pub use tracks::TrackRegistry;
pub use view::CallScreenView;
