use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::session::LocalMedia;

/// Persisted preferences. The access token is deliberately absent.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub server_url: Option<String>,
    #[serde(default = "default_true")]
    pub audio_enabled_on_join: bool,
    #[serde(default = "default_true")]
    pub video_enabled_on_join: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: None,
            audio_enabled_on_join: true,
            video_enabled_on_join: true,
        }
    }
}

impl Settings {
    /// Initial local media toggles for a new call screen.
    pub fn initial_media(&self) -> LocalMedia {
        LocalMedia {
            audio_enabled: self.audio_enabled_on_join,
            video_enabled: self.video_enabled_on_join,
        }
    }
}

pub struct SettingsStore {
    settings: Mutex<Settings>,
    file_path: PathBuf,
}

impl SettingsStore {
    pub fn new(data_dir: &str) -> Self {
        let file_path = PathBuf::from(data_dir).join("settings.json");
        let settings = Self::load(&file_path);
        Self {
            settings: Mutex::new(settings),
            file_path,
        }
    }

    pub fn get(&self) -> Settings {
        self.lock().clone()
    }

    pub fn set_server_url(&self, url: Option<String>) {
        self.lock().server_url = url;
        self.save();
    }

    pub fn set_audio_enabled_on_join(&self, enabled: bool) {
        self.lock().audio_enabled_on_join = enabled;
        self.save();
    }

    pub fn set_video_enabled_on_join(&self, enabled: bool) {
        self.lock().video_enabled_on_join = enabled;
        self.save();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Settings> {
        self.settings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn save(&self) {
        let settings = self.get();
        if let Some(parent) = self.file_path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!("cannot create settings dir {}: {e}", parent.display());
                return;
            }
        }
        match serde_json::to_string_pretty(&settings) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&self.file_path, json) {
                    tracing::warn!("cannot write settings: {e}");
                }
            }
            Err(e) => tracing::warn!("cannot serialize settings: {e}"),
        }
    }

    fn load(path: &Path) -> Settings {
        match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("ignoring unreadable settings file: {e}");
                Settings::default()
            }),
            Err(_) => Settings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    #[test]
    fn test_default_settings() {
        let s = Settings::default();
        assert_eq!(s.server_url, None);
        assert!(s.audio_enabled_on_join);
        assert!(s.video_enabled_on_join);
        assert_eq!(s.initial_media(), LocalMedia::default());
    }

    #[test]
    fn test_new_creates_defaults_when_no_file() {
        let dir = temp_dir();
        let store = SettingsStore::new(dir.path().to_str().unwrap());
        assert_eq!(store.get(), Settings::default());
    }

    #[test]
    fn test_set_server_url_persists() {
        let dir = temp_dir();
        let path = dir.path().to_str().unwrap();
        {
            let store = SettingsStore::new(path);
            store.set_server_url(Some("wss://video.example.org".to_string()));
        }
        let store = SettingsStore::new(path);
        assert_eq!(
            store.get().server_url.as_deref(),
            Some("wss://video.example.org")
        );
    }

    #[test]
    fn test_join_toggles_persist_and_seed_media() {
        let dir = temp_dir();
        let path = dir.path().to_str().unwrap();
        {
            let store = SettingsStore::new(path);
            store.set_audio_enabled_on_join(false);
            store.set_video_enabled_on_join(false);
        }
        let s = SettingsStore::new(path).get();
        assert_eq!(
            s.initial_media(),
            LocalMedia {
                audio_enabled: false,
                video_enabled: false,
            }
        );
    }

    #[test]
    fn test_corrupt_file_falls_back_to_defaults() {
        let dir = temp_dir();
        fs::write(dir.path().join("settings.json"), "not json!!!").unwrap();
        let store = SettingsStore::new(dir.path().to_str().unwrap());
        assert_eq!(store.get(), Settings::default());
    }

    #[test]
    fn test_partial_json_uses_serde_defaults() {
        let dir = temp_dir();
        fs::write(dir.path().join("settings.json"), r#"{"server_url":"wss://eve.example"}"#)
            .unwrap();
        let s = SettingsStore::new(dir.path().to_str().unwrap()).get();
        assert_eq!(s.server_url.as_deref(), Some("wss://eve.example"));
        assert!(s.audio_enabled_on_join);
        assert!(s.video_enabled_on_join);
    }

    #[test]
    fn test_unknown_fields_from_older_files_are_ignored() {
        let dir = temp_dir();
        fs::write(
            dir.path().join("settings.json"),
            r#"{"display_name":"Eve","audio_enabled_on_join":false}"#,
        )
        .unwrap();
        let store = SettingsStore::new(dir.path().to_str().unwrap());
        assert!(!store.get().audio_enabled_on_join);

        store.set_video_enabled_on_join(false);
        let written = fs::read_to_string(dir.path().join("settings.json")).unwrap();
        assert!(!written.contains("display_name"));
    }

    #[test]
    fn test_token_is_never_written() {
        let dir = temp_dir();
        let store = SettingsStore::new(dir.path().to_str().unwrap());
        store.set_server_url(Some("wss://bob.example".to_string()));
        let written = fs::read_to_string(dir.path().join("settings.json")).unwrap();
        assert!(!written.contains("token"));
    }
}
