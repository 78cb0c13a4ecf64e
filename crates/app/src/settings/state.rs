use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

pub const DEFAULT_SELF_ID: &str = "me";
pub const DEFAULT_SELF_DISPLAY_NAME: &str = "You";
pub const SETTINGS_DIRECTORY_NAME: &str = "threadline";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const SETTINGS_ENV_PREFIX: &str = "THREADLINE_";

/// Inclusive range of simulated time units, sampled uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitRange {
    pub min: f64,
    pub max: f64,
}

impl UnitRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    fn normalized(self) -> Self {
        let min = sanitize_units(self.min);
        let max = sanitize_units(self.max);
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }
}

/// Everything the engine needs to know up front. Passed explicitly at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    #[serde(default = "default_self_id")]
    pub self_id: String,
    #[serde(default = "default_self_display_name")]
    pub self_display_name: String,
    /// Length of one simulated time unit.
    #[serde(default = "default_time_unit_ms")]
    pub time_unit_ms: u64,
    #[serde(default = "default_delivered_after_units")]
    pub delivered_after_units: f64,
    #[serde(default = "default_read_after_units")]
    pub read_after_units: f64,
    #[serde(default = "default_inbound_interval_units")]
    pub inbound_interval_units: UnitRange,
    #[serde(default = "default_typing_duration_units")]
    pub typing_duration_units: UnitRange,
    #[serde(default = "default_typing_rearm_units")]
    pub typing_rearm_units: UnitRange,
    /// Share of synthetic inbound messages that carry an image instead of text.
    #[serde(default = "default_image_message_ratio")]
    pub image_message_ratio: f64,
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
    #[serde(default)]
    pub rng_seed: Option<u64>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            self_id: default_self_id(),
            self_display_name: default_self_display_name(),
            time_unit_ms: default_time_unit_ms(),
            delivered_after_units: default_delivered_after_units(),
            read_after_units: default_read_after_units(),
            inbound_interval_units: default_inbound_interval_units(),
            typing_duration_units: default_typing_duration_units(),
            typing_rearm_units: default_typing_rearm_units(),
            image_message_ratio: default_image_message_ratio(),
            event_buffer: default_event_buffer(),
            rng_seed: None,
        }
    }
}

impl EngineSettings {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    pub fn normalized(mut self) -> Self {
        self.self_id = if self.self_id.trim().is_empty() {
            default_self_id()
        } else {
            self.self_id.trim().to_string()
        };
        self.self_display_name = if self.self_display_name.trim().is_empty() {
            default_self_display_name()
        } else {
            self.self_display_name.trim().to_string()
        };
        if self.time_unit_ms == 0 {
            self.time_unit_ms = default_time_unit_ms();
        }
        self.delivered_after_units = sanitize_units(self.delivered_after_units);
        self.read_after_units = sanitize_units(self.read_after_units);
        self.inbound_interval_units = self.inbound_interval_units.normalized();
        self.typing_duration_units = self.typing_duration_units.normalized();
        self.typing_rearm_units = self.typing_rearm_units.normalized();
        self.image_message_ratio = if self.image_message_ratio.is_finite() {
            self.image_message_ratio.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.event_buffer = self.event_buffer.max(1);
        self
    }

    /// Converts simulated units to wall-clock time.
    pub fn units(&self, units: f64) -> Duration {
        Duration::from_millis(self.time_unit_ms).mul_f64(sanitize_units(units))
    }

    pub fn delivered_after(&self) -> Duration {
        self.units(self.delivered_after_units)
    }

    pub fn read_after(&self) -> Duration {
        self.units(self.read_after_units)
    }
}

pub struct SettingsStore {
    settings: Arc<ArcSwap<EngineSettings>>,
    config_path: PathBuf,
}

impl SettingsStore {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".threadline"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    pub fn new(config_path: PathBuf) -> Self {
        let settings = Self::load_from_disk(&config_path);
        Self {
            settings: Arc::new(ArcSwap::from_pointee(settings)),
            config_path,
        }
    }

    pub fn load() -> Self {
        Self::new(Self::default_config_path())
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn settings(&self) -> Arc<EngineSettings> {
        self.settings.load_full()
    }

    pub fn update(&self, settings: EngineSettings) -> Result<(), SettingsError> {
        let normalized_settings = settings.normalized();
        self.persist(&normalized_settings)?;
        self.settings.store(Arc::new(normalized_settings));
        Ok(())
    }

    /// Layers defaults, the JSON file (when present) and `THREADLINE_*` variables.
    pub fn extract(path: &Path) -> Result<EngineSettings, SettingsError> {
        let mut figment = Figment::from(Serialized::defaults(EngineSettings::default()));
        if path.exists() {
            figment = figment.merge(Json::file(path));
        }
        figment
            .merge(Env::prefixed(SETTINGS_ENV_PREFIX).split("__"))
            .extract::<EngineSettings>()
            .map(EngineSettings::normalized)
            .map_err(Box::new)
            .context(ExtractSnafu {
                stage: "extract-settings",
                path: path.to_path_buf(),
            })
    }

    fn load_from_disk(path: &Path) -> EngineSettings {
        if !path.exists() {
            tracing::info!("settings file not found at {:?}, using defaults", path);
        }

        match Self::extract(path) {
            Ok(settings) => settings,
            Err(error) => {
                tracing::warn!("{error}. using defaults");
                EngineSettings::default()
            }
        }
    }

    fn persist(&self, settings: &EngineSettings) -> Result<(), SettingsError> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).context(CreateDirSnafu {
                stage: "create-settings-directory",
                path: parent.to_path_buf(),
            })?;
        }

        let content = serde_json::to_string_pretty(settings).context(SerializeConfigSnafu {
            stage: "serialize-settings-json",
        })?;

        let temp_path = self.config_path.with_extension("json.tmp");
        std::fs::write(&temp_path, content).context(WriteFileSnafu {
            stage: "write-temporary-settings-file",
            path: temp_path.clone(),
        })?;

        std::fs::rename(&temp_path, &self.config_path).context(RenameTempFileSnafu {
            stage: "rename-temporary-settings-file",
            from: temp_path,
            to: self.config_path.clone(),
        })?;

        tracing::info!("saved settings to {:?}", self.config_path);
        Ok(())
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("failed to read settings from {path:?} on `{stage}`: {source}"))]
    Extract {
        stage: &'static str,
        path: PathBuf,
        source: Box<figment::Error>,
    },
    #[snafu(display("failed to create settings directory at {path:?} on `{stage}`: {source}"))]
    CreateDir {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to serialize settings on `{stage}`: {source}"))]
    SerializeConfig {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("failed to write settings file at {path:?} on `{stage}`: {source}"))]
    WriteFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display(
        "failed to replace settings file from {from:?} to {to:?} on `{stage}`: {source}"
    ))]
    RenameTempFile {
        stage: &'static str,
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

fn sanitize_units(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

fn default_self_id() -> String {
    DEFAULT_SELF_ID.to_string()
}

fn default_self_display_name() -> String {
    DEFAULT_SELF_DISPLAY_NAME.to_string()
}

fn default_time_unit_ms() -> u64 {
    1_000
}

fn default_delivered_after_units() -> f64 {
    1.0
}

fn default_read_after_units() -> f64 {
    2.0
}

fn default_inbound_interval_units() -> UnitRange {
    UnitRange::new(8.0, 15.0)
}

fn default_typing_duration_units() -> UnitRange {
    UnitRange::new(2.0, 4.0)
}

fn default_typing_rearm_units() -> UnitRange {
    UnitRange::new(5.0, 12.0)
}

fn default_image_message_ratio() -> f64 {
    0.1
}

fn default_event_buffer() -> usize {
    256
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "threadline-settings-{name}-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn normalized_repairs_ranges_and_units() {
        let settings = EngineSettings {
            self_id: "  ".to_string(),
            time_unit_ms: 0,
            delivered_after_units: f64::NAN,
            inbound_interval_units: UnitRange::new(15.0, 8.0),
            image_message_ratio: 3.0,
            event_buffer: 0,
            ..EngineSettings::default()
        }
        .normalized();

        assert_eq!(settings.self_id, DEFAULT_SELF_ID);
        assert_eq!(settings.time_unit_ms, 1_000);
        assert_eq!(settings.delivered_after_units, 0.0);
        assert_eq!(settings.inbound_interval_units, UnitRange::new(8.0, 15.0));
        assert_eq!(settings.image_message_ratio, 1.0);
        assert_eq!(settings.event_buffer, 1);
    }

    #[test]
    fn units_scale_with_time_unit() {
        let settings = EngineSettings {
            time_unit_ms: 250,
            ..EngineSettings::default()
        };
        assert_eq!(settings.units(4.0), Duration::from_secs(1));
        assert_eq!(settings.delivered_after(), Duration::from_millis(250));
        assert_eq!(settings.read_after(), Duration::from_millis(500));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = scratch_dir("missing");
        let store = SettingsStore::new(dir.join(SETTINGS_FILE_NAME));
        assert_eq!(
            store.settings().inbound_interval_units,
            UnitRange::new(8.0, 15.0)
        );
    }

    #[test]
    fn partial_file_is_layered_over_defaults() {
        let dir = scratch_dir("partial");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(SETTINGS_FILE_NAME);
        std::fs::write(&path, r#"{ "time_unit_ms": 10, "rng_seed": 7 }"#).unwrap();

        let settings = SettingsStore::extract(&path).unwrap();
        assert_eq!(settings.time_unit_ms, 10);
        assert_eq!(settings.rng_seed, Some(7));
        assert_eq!(settings.self_display_name, DEFAULT_SELF_DISPLAY_NAME);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn update_persists_and_swaps() {
        let dir = scratch_dir("update");
        let path = dir.join(SETTINGS_FILE_NAME);
        let store = SettingsStore::new(path.clone());

        store
            .update(EngineSettings::default().with_seed(42))
            .unwrap();
        assert_eq!(store.settings().rng_seed, Some(42));
        assert_eq!(SettingsStore::extract(&path).unwrap().rng_seed, Some(42));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
