//! TOML configuration file support for `RemuxerConfig`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::RemuxerConfig;
use crate::error::{RemuxError, Result};

/// On-disk shape of a `RemuxerConfig`. Kept as its own type (rather than
/// deriving `Serialize`/`Deserialize` straight onto `RemuxerConfig`) so the
/// file format can gain optional fields/defaults independently of the
/// in-memory struct, the same separation the teacher keeps between
/// `ConfigFile` and `ServerConfig`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemuxerConfigFile {
    pub force_key_frame_on_discontinuity: Option<bool>,
    pub stretch_short_video_track: Option<bool>,
    pub max_buffer_hole: Option<f32>,
    pub max_audio_frames_drift: Option<u32>,
}

impl RemuxerConfigFile {
    /// Load a configuration file from disk.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| RemuxError::Config(e.to_string()))
    }

    /// Serialize the default configuration to a TOML string.
    pub fn default_toml() -> String {
        let file = RemuxerConfigFile::from(RemuxerConfig::default());
        toml::to_string_pretty(&file).expect("RemuxerConfigFile always serializes")
    }

    pub fn into_config(self) -> RemuxerConfig {
        let defaults = RemuxerConfig::default();
        RemuxerConfig {
            force_key_frame_on_discontinuity: self
                .force_key_frame_on_discontinuity
                .unwrap_or(defaults.force_key_frame_on_discontinuity),
            stretch_short_video_track: self
                .stretch_short_video_track
                .unwrap_or(defaults.stretch_short_video_track),
            max_buffer_hole: self.max_buffer_hole.unwrap_or(defaults.max_buffer_hole),
            max_audio_frames_drift: self
                .max_audio_frames_drift
                .unwrap_or(defaults.max_audio_frames_drift),
        }
    }
}

impl From<RemuxerConfig> for RemuxerConfigFile {
    fn from(cfg: RemuxerConfig) -> Self {
        Self {
            force_key_frame_on_discontinuity: Some(cfg.force_key_frame_on_discontinuity),
            stretch_short_video_track: Some(cfg.stretch_short_video_track),
            max_buffer_hole: Some(cfg.max_buffer_hole),
            max_audio_frames_drift: Some(cfg.max_audio_frames_drift),
        }
    }
}
