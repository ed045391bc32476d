//! Runtime configuration for all subsystems.
//!
//! Every knob carries a sensible default so the binary starts from an empty
//! environment; an optional JSON file named by `FLAPGUARD_CONFIG` overrides
//! the defaults, and credentials are always taken from the environment
//! (`BOT_TOKEN`, `GROUP_ID`, `PREY_API_KEY`, `FLAP_BASE_URL`).

use crate::flap_control::trigger_position::TriggerPosition;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

pub const CONFIG_PATH_ENV: &str = "FLAPGUARD_CONFIG";
pub const BOT_TOKEN_ENV: &str = "BOT_TOKEN";
pub const GROUP_ID_ENV: &str = "GROUP_ID";
pub const PREY_API_KEY_ENV: &str = "PREY_API_KEY";
pub const FLAP_BASE_URL_ENV: &str = "FLAP_BASE_URL";

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub camera: CameraConfig,
    pub detector: DetectorConfig,
    pub tracker: TrackerConfig,
    pub pipeline: PipelineConfig,
    pub dispatcher: DispatcherConfig,
    pub flap: FlapConfig,
    pub prey_api: PreyApiConfig,
    pub notify: NotifyConfig,
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Capture resolution as (width, height).
    pub resolution: (u32, u32),
    pub fps: u32,
    pub warmup_time_s: f64,
    pub vflip: bool,
    pub hflip: bool,
    pub sensor_mode: u32,
    /// Frame directory for the replay backend.
    pub frames_dir: PathBuf,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            resolution: (640, 360),
            fps: 30,
            warmup_time_s: 2.0,
            vflip: true,
            hflip: true,
            sensor_mode: 1,
            frames_dir: PathBuf::from("frames"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub model_path: PathBuf,
    /// Model input size as (height, width).
    pub image_size: (u32, u32),
    pub class_thresholds: HashMap<String, f32>,
    pub iou_threshold: f32,
    /// Ordered list; detection labels index into it.
    pub classes_of_interest: Vec<String>,
    /// Minimum bbox area in px^2, filters sensor noise.
    pub min_detection_area: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/yolo11n_384_640.onnx"),
            image_size: (384, 640),
            class_thresholds: HashMap::from([
                ("cat".to_string(), 0.45),
                ("person".to_string(), 0.75),
            ]),
            iou_threshold: 0.02,
            classes_of_interest: vec!["cat".to_string(), "person".to_string()],
            min_detection_area: 1.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub detection_time_window_s: f64,
    pub detection_iou_threshold: f32,
    /// Probability of persisting an annotated frame per update.
    pub save_frequency: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            detection_time_window_s: 15.0,
            detection_iou_threshold: 0.0,
            save_frequency: 0.2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub trigger_class: String,
    pub prey_detection_enabled: bool,
    pub save_images: bool,
    /// Extra captures admitted straight to the dispatcher after a trigger.
    pub detection_followup_frames: u32,
    /// Notify on every expired track, not only prey decisions.
    pub notify_detections: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            trigger_class: "cat".to_string(),
            prey_detection_enabled: true,
            save_images: true,
            detection_followup_frames: 20,
            notify_detections: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Consumer idle timeout; a batch closes after this much queue silence.
    pub reset_time_window_s: f64,
    /// Crop target as (width, height); `None` passes frames through.
    pub image_size: Option<(u32, u32)>,
    pub queue_capacity: usize,
    pub concurrency: usize,
    pub ssim_threshold: f64,
    pub allowed_trigger_positions: Vec<TriggerPosition>,
    /// Emit an orientation-debug notification on right->middle transitions.
    pub require_middle_after_right: bool,
    pub pause_during_lock: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            reset_time_window_s: 5.0,
            image_size: Some((384, 384)),
            queue_capacity: 50,
            concurrency: 10,
            ssim_threshold: 0.9,
            allowed_trigger_positions: vec![
                TriggerPosition::Left,
                TriggerPosition::Middle,
                TriggerPosition::Right,
            ],
            require_middle_after_right: false,
            pause_during_lock: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FlapBackend {
    Local,
    #[default]
    Remote,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FlapConfig {
    pub backend: FlapBackend,
    pub lock_time_s: f64,
    pub base_url: String,
}

impl Default for FlapConfig {
    fn default() -> Self {
        Self {
            backend: FlapBackend::Remote,
            lock_time_s: 300.0,
            base_url: "http://localhost:8088".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PreyApiConfig {
    pub api_url: String,
    pub api_key: Option<String>,
}

impl Default for PreyApiConfig {
    fn default() -> Self {
        Self {
            api_url: "https://prey-detection.example.workers.dev".to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub enabled: bool,
    pub bot_base_url: String,
    pub token: Option<String>,
    pub chat_id: Option<i64>,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bot_base_url: "https://api.telegram.org".to_string(),
            token: None,
            chat_id: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub root_dir: PathBuf,
    pub detection_images_dir: PathBuf,
    pub prey_images_dir: PathBuf,
    pub prey_detector_images_dir: PathBuf,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("runtime"),
            detection_images_dir: PathBuf::from("runtime/detection_images"),
            prey_images_dir: PathBuf::from("runtime/prey_images"),
            prey_detector_images_dir: PathBuf::from("runtime/prey_detector_images"),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    BadValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config file unreadable: {e}"),
            ConfigError::Parse(e) => write!(f, "config file malformed: {e}"),
            ConfigError::BadValue(msg) => write!(f, "bad config value: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Loads the configuration: defaults, then the optional JSON file,
    /// then environment credential overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match env::var(CONFIG_PATH_ENV) {
            Ok(path) => {
                let raw = std::fs::read_to_string(&path).map_err(ConfigError::Io)?;
                serde_json::from_str::<Config>(&raw).map_err(ConfigError::Parse)?
            }
            Err(_) => Config::default(),
        };

        if let Ok(url) = env::var(FLAP_BASE_URL_ENV) {
            config.flap.base_url = url;
        }
        if let Ok(key) = env::var(PREY_API_KEY_ENV) {
            config.prey_api.api_key = Some(key);
        }
        if let Ok(token) = env::var(BOT_TOKEN_ENV) {
            config.notify.token = Some(token);
        }
        if let Ok(chat) = env::var(GROUP_ID_ENV) {
            let id = chat
                .parse::<i64>()
                .map_err(|_| ConfigError::BadValue(format!("{GROUP_ID_ENV} is not an integer")))?;
            config.notify.chat_id = Some(id);
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (class, threshold) in &self.detector.class_thresholds {
            if !(0.0..=1.0).contains(threshold) {
                return Err(ConfigError::BadValue(format!(
                    "threshold for class {class} must be within [0, 1]"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.detector.iou_threshold) {
            return Err(ConfigError::BadValue("detector.iou_threshold must be within [0, 1]".into()));
        }
        if !(0.0..=1.0).contains(&self.tracker.save_frequency) {
            return Err(ConfigError::BadValue("tracker.save_frequency must be within [0, 1]".into()));
        }
        if self.camera.resolution.0 == 0 || self.camera.resolution.1 == 0 {
            return Err(ConfigError::BadValue("camera.resolution must be positive".into()));
        }
        if self.dispatcher.queue_capacity == 0 || self.dispatcher.concurrency == 0 {
            return Err(ConfigError::BadValue(
                "dispatcher.queue_capacity and dispatcher.concurrency must be positive".into(),
            ));
        }
        Ok(())
    }
}
