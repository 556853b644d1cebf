use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use livekit::options::TrackPublishOptions;
use livekit::prelude::*;
use livekit::track::TrackSource as LkTrackSource;
use livekit::webrtc::audio_source::native::NativeAudioSource;
use livekit::webrtc::prelude::*;
use livekit::webrtc::video_source::native::NativeVideoSource;

use crate::errors::CallError;
use crate::session::LocalMedia;

const AUDIO_SAMPLE_RATE: u32 = 48_000;
const AUDIO_CHANNELS: u32 = 1;
const AUDIO_QUEUE_SIZE_MS: u32 = 100;

const VIDEO_WIDTH: u32 = 1280;
const VIDEO_HEIGHT: u32 = 720;

/// Local microphone and camera tracks.
///
/// Both tracks are published as soon as the room is joined, muted when the
/// user asked for them off. Native shells capture media themselves and push
/// frames into the sources created here.
#[derive(Clone)]
pub struct MediaControls {
    wanted: Arc<StdMutex<LocalMedia>>,
    audio_source: Arc<StdMutex<Option<NativeAudioSource>>>,
    video_source: Arc<StdMutex<Option<NativeVideoSource>>>,
}

impl MediaControls {
    pub fn new(media: LocalMedia) -> Self {
        Self {
            wanted: Arc::new(StdMutex::new(media)),
            audio_source: Arc::new(StdMutex::new(None)),
            video_source: Arc::new(StdMutex::new(None)),
        }
    }

    /// Enablement last requested by the user, applied on publish.
    pub fn wanted(&self) -> LocalMedia {
        *self.wanted.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn has_audio_source(&self) -> bool {
        self.audio_source.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    pub fn has_video_source(&self) -> bool {
        self.video_source.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Publish microphone and camera, then mute whichever the user turned off.
    pub async fn publish(&self, room: &Room) {
        let wanted = self.wanted();

        match self.publish_microphone(room).await {
            Ok(publication) if !wanted.audio_enabled => publication.mute(),
            Ok(_) => {}
            Err(e) => tracing::warn!("{e}"),
        }
        match self.publish_camera(room).await {
            Ok(publication) if !wanted.video_enabled => publication.mute(),
            Ok(_) => {}
            Err(e) => tracing::warn!("{e}"),
        }
    }

    /// Publish a microphone track fed by a [`NativeAudioSource`].
    pub async fn publish_microphone(&self, room: &Room) -> Result<LocalTrackPublication, CallError> {
        let source = NativeAudioSource::new(
            AudioSourceOptions {
                echo_cancellation: true,
                noise_suppression: true,
                auto_gain_control: true,
            },
            AUDIO_SAMPLE_RATE,
            AUDIO_CHANNELS,
            AUDIO_QUEUE_SIZE_MS,
        );

        let track = LocalAudioTrack::create_audio_track(
            "microphone",
            RtcAudioSource::Native(source.clone()),
        );

        let publication = room
            .local_participant()
            .publish_track(
                LocalTrack::Audio(track),
                TrackPublishOptions {
                    source: LkTrackSource::Microphone,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| CallError::Sdk(format!("publish audio: {e}")))?;

        *self.audio_source.lock().unwrap_or_else(PoisonError::into_inner) = Some(source);
        tracing::info!("microphone track published");
        Ok(publication)
    }

    /// Publish a camera track fed by a [`NativeVideoSource`].
    pub async fn publish_camera(&self, room: &Room) -> Result<LocalTrackPublication, CallError> {
        let source = NativeVideoSource::new(
            VideoResolution {
                width: VIDEO_WIDTH,
                height: VIDEO_HEIGHT,
            },
            false,
        );

        let track = LocalVideoTrack::create_video_track(
            "camera",
            RtcVideoSource::Native(source.clone()),
        );

        let publication = room
            .local_participant()
            .publish_track(
                LocalTrack::Video(track),
                TrackPublishOptions {
                    source: LkTrackSource::Camera,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| CallError::Sdk(format!("publish video: {e}")))?;

        *self.video_source.lock().unwrap_or_else(PoisonError::into_inner) = Some(source);
        tracing::info!("camera track published");
        Ok(publication)
    }

    /// Record the request, then mute or unmute the published track for
    /// `source`. Returns the state the track is actually in.
    ///
    /// Without a room the request is only recorded and confirmed as is; it
    /// takes effect when the tracks are published.
    pub fn set_enabled(&self, room: Option<&Room>, source: LkTrackSource, enabled: bool) -> bool {
        {
            let mut wanted = self.wanted.lock().unwrap_or_else(PoisonError::into_inner);
            match source {
                LkTrackSource::Microphone => wanted.audio_enabled = enabled,
                LkTrackSource::Camera => wanted.video_enabled = enabled,
                _ => {}
            }
        }

        let Some(room) = room else {
            return enabled;
        };

        let local = room.local_participant();
        for (_, publication) in local.track_publications() {
            if publication.source() == source {
                if enabled {
                    publication.unmute();
                } else {
                    publication.mute();
                }
                return !publication.is_muted();
            }
        }

        tracing::warn!("no {source:?} track published");
        false
    }

    /// Forget the sources of a room that is gone.
    pub fn clear(&self) {
        self.audio_source.lock().unwrap_or_else(PoisonError::into_inner).take();
        self.video_source.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    /// Feed interleaved 16-bit PCM from native capture into the microphone
    /// track. Frames pushed before the track is published are dropped.
    pub async fn push_audio_frame(
        &self,
        samples: &[i16],
        sample_rate: u32,
        num_channels: u32,
    ) -> Result<(), CallError> {
        let samples_per_channel = samples_per_channel(samples.len(), num_channels)?;
        let Some(source) = self
            .audio_source
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        else {
            tracing::trace!("no microphone source, dropping audio frame");
            return Ok(());
        };

        let frame = AudioFrame {
            data: samples.into(),
            sample_rate,
            num_channels,
            samples_per_channel,
        };
        source
            .capture_frame(&frame)
            .await
            .map_err(|e| CallError::Sdk(format!("capture audio frame: {e}")))
    }

    /// Feed one tightly packed I420 frame from native capture into the
    /// camera track. Frames pushed before the track is published are dropped.
    pub fn push_video_frame(
        &self,
        width: u32,
        height: u32,
        y: &[u8],
        u: &[u8],
        v: &[u8],
    ) -> Result<(), CallError> {
        check_i420_planes(width, height, y.len(), u.len(), v.len())?;
        let Some(source) = self
            .video_source
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        else {
            tracing::trace!("no camera source, dropping video frame");
            return Ok(());
        };

        let mut i420 = I420Buffer::new(width, height);
        let strides = i420.strides();
        let (y_dst, u_dst, v_dst) = i420.data_mut();
        let w = width as usize;
        let h = height as usize;
        let (chroma_w, chroma_h) = chroma_size(w, h);

        for row in 0..h {
            let dst = row * strides.0 as usize;
            y_dst[dst..dst + w].copy_from_slice(&y[row * w..(row + 1) * w]);
        }
        for row in 0..chroma_h {
            let src = row * chroma_w..(row + 1) * chroma_w;
            let dst = row * strides.1 as usize;
            u_dst[dst..dst + chroma_w].copy_from_slice(&u[src.clone()]);
            let dst = row * strides.2 as usize;
            v_dst[dst..dst + chroma_w].copy_from_slice(&v[src]);
        }

        let frame = VideoFrame {
            rotation: VideoRotation::VideoRotation0,
            timestamp_us: 0,
            buffer: i420,
        };
        source.capture_frame(&frame);
        Ok(())
    }
}

fn chroma_size(width: usize, height: usize) -> (usize, usize) {
    (width.div_ceil(2), height.div_ceil(2))
}

fn samples_per_channel(len: usize, num_channels: u32) -> Result<u32, CallError> {
    if num_channels == 0 || len % num_channels as usize != 0 {
        return Err(CallError::InvalidFrame(format!(
            "{len} samples do not split into {num_channels} channels"
        )));
    }
    u32::try_from(len / num_channels as usize)
        .map_err(|_| CallError::InvalidFrame(format!("audio frame too long: {len} samples")))
}

fn check_i420_planes(
    width: u32,
    height: u32,
    y_len: usize,
    u_len: usize,
    v_len: usize,
) -> Result<(), CallError> {
    if width == 0 || height == 0 {
        return Err(CallError::InvalidFrame(format!("empty frame {width}x{height}")));
    }
    let (w, h) = (width as usize, height as usize);
    let (chroma_w, chroma_h) = chroma_size(w, h);
    let luma = w * h;
    let chroma = chroma_w * chroma_h;
    if y_len < luma || u_len < chroma || v_len < chroma {
        return Err(CallError::InvalidFrame(format!(
            "{width}x{height} needs planes of {luma}/{chroma}/{chroma} bytes, got {y_len}/{u_len}/{v_len}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_split_evenly_across_channels() {
        assert_eq!(samples_per_channel(960, 2).unwrap(), 480);
        assert_eq!(samples_per_channel(480, 1).unwrap(), 480);
        assert_eq!(samples_per_channel(0, 1).unwrap(), 0);
        assert!(matches!(samples_per_channel(961, 2), Err(CallError::InvalidFrame(_))));
        assert!(matches!(samples_per_channel(480, 0), Err(CallError::InvalidFrame(_))));
    }

    #[test]
    fn i420_planes_are_sized_from_dimensions() {
        assert!(check_i420_planes(4, 2, 8, 2, 2).is_ok());
        // Odd sizes round the chroma planes up.
        assert!(check_i420_planes(3, 3, 9, 4, 4).is_ok());
        assert!(check_i420_planes(3, 3, 9, 1, 4).is_err());
        assert!(check_i420_planes(4, 2, 7, 2, 2).is_err());
        assert!(check_i420_planes(0, 2, 0, 0, 0).is_err());
    }

    #[test]
    fn request_without_room_is_recorded_and_confirmed() {
        let controls = MediaControls::new(LocalMedia::default());

        assert!(!controls.set_enabled(None, LkTrackSource::Microphone, false));
        assert!(controls.set_enabled(None, LkTrackSource::Camera, true));
        assert!(!controls.set_enabled(None, LkTrackSource::Camera, false));

        assert_eq!(
            controls.wanted(),
            LocalMedia {
                audio_enabled: false,
                video_enabled: false,
            }
        );
    }

    #[test]
    fn initial_media_is_what_gets_published() {
        let media = LocalMedia {
            audio_enabled: false,
            video_enabled: true,
        };
        assert_eq!(MediaControls::new(media).wanted(), media);
    }

    #[tokio::test]
    async fn frames_before_publish_are_dropped() {
        let controls = MediaControls::new(LocalMedia::default());
        assert!(!controls.has_audio_source());
        assert!(!controls.has_video_source());

        controls.push_audio_frame(&[0; 480], 48_000, 1).await.unwrap();
        controls
            .push_video_frame(4, 2, &[0; 8], &[0; 2], &[0; 2])
            .unwrap();
    }

    #[tokio::test]
    async fn malformed_frames_are_rejected() {
        let controls = MediaControls::new(LocalMedia::default());
        assert!(matches!(
            controls.push_audio_frame(&[0; 3], 48_000, 2).await,
            Err(CallError::InvalidFrame(_))
        ));
        assert!(matches!(
            controls.push_video_frame(4, 2, &[0; 8], &[0; 1], &[0; 2]),
            Err(CallError::InvalidFrame(_))
        ));
    }
}
