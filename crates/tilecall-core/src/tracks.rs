use std::collections::HashMap;

use crate::events::VideoTrackEntry;

/// Remote video tiles currently on screen, keyed by track SID.
///
/// Updated by the controller from SDK track callbacks. Read by native UI layers.
#[derive(Debug, Clone, Default)]
pub struct TrackRegistry {
    tracks: HashMap<String, VideoTrackEntry>,
}

impl TrackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `entry.video_track_sid`.
    /// Returns the entry it replaced, if any.
    pub fn upsert(&mut self, entry: VideoTrackEntry) -> Option<VideoTrackEntry> {
        self.tracks.insert(entry.video_track_sid.clone(), entry)
    }

    /// Removing an unknown SID is a no-op.
    pub fn remove(&mut self, track_sid: &str) -> Option<VideoTrackEntry> {
        self.tracks.remove(track_sid)
    }

    pub fn get(&self, track_sid: &str) -> Option<&VideoTrackEntry> {
        self.tracks.get(track_sid)
    }

    pub fn contains(&self, track_sid: &str) -> bool {
        self.tracks.contains_key(track_sid)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Entries sorted by track SID so tiles keep a stable order across renders.
    pub fn entries(&self) -> Vec<VideoTrackEntry> {
        let mut entries: Vec<_> = self.tracks.values().cloned().collect();
        entries.sort_by(|a, b| a.video_track_sid.cmp(&b.video_track_sid));
        entries
    }

    pub fn track_sids(&self) -> Vec<String> {
        let mut sids: Vec<_> = self.tracks.keys().cloned().collect();
        sids.sort();
        sids
    }

    /// Drop every entry, returning what was removed.
    pub fn clear(&mut self) -> Vec<VideoTrackEntry> {
        let mut cleared: Vec<_> = self.tracks.drain().map(|(_, entry)| entry).collect();
        cleared.sort_by(|a, b| a.video_track_sid.cmp(&b.video_track_sid));
        cleared
    }
}
