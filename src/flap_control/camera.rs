use crate::config::CameraConfig;
use crate::flap_control::common::imaging::{self, ImagingError};
use crate::{info, log, warn};
use chrono::{DateTime, Utc};
use image::RgbImage;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// One captured frame. Owned by a single pipeline iteration; whatever
/// crosses into the dispatcher does so as an encoded JPEG buffer.
#[derive(Debug, Clone)]
pub struct Frame {
    id: u64,
    captured: DateTime<Utc>,
    pixels: RgbImage,
}

impl Frame {
    pub fn new(id: u64, captured: DateTime<Utc>, pixels: RgbImage) -> Self {
        Self { id, captured, pixels }
    }

    pub fn id(&self) -> u64 { self.id }
    pub fn captured(&self) -> DateTime<Utc> { self.captured }
    pub fn pixels(&self) -> &RgbImage { &self.pixels }
    pub fn width(&self) -> u32 { self.pixels.width() }
    pub fn height(&self) -> u32 { self.pixels.height() }
}

#[derive(Debug)]
pub enum CameraError {
    NotReady,
    CaptureFailed(String),
    EncodeFailed(ImagingError),
}

impl std::fmt::Display for CameraError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraError::NotReady => write!(f, "camera not warmed up"),
            CameraError::CaptureFailed(msg) => write!(f, "capture failed: {msg}"),
            CameraError::EncodeFailed(e) => write!(f, "capture encode failed: {e}"),
        }
    }
}

impl std::error::Error for CameraError {}

/// Capability interface over the physical camera. Captures block until the
/// next frame is due; `warmup` must precede the first capture.
pub trait FrameSource: Send {
    fn warmup(&mut self, duration: Duration);
    fn capture(&mut self) -> Result<Frame, CameraError>;

    fn capture_jpeg(&mut self, quality: u8) -> Result<Vec<u8>, CameraError> {
        let frame = self.capture()?;
        imaging::encode_jpeg(frame.pixels(), quality).map_err(CameraError::EncodeFailed)
    }
}

/// Frame source backed by an image directory, cycled at the configured
/// frame rate. Stands in for the sensor on development machines and in
/// long-running soak tests; hardware backends implement [`FrameSource`]
/// out of tree.
pub struct ReplayCamera {
    config: CameraConfig,
    files: Vec<PathBuf>,
    cursor: usize,
    next_id: u64,
    frame_interval: Duration,
    last_capture: Option<Instant>,
    warmed_up: bool,
}

impl ReplayCamera {
    pub fn new(config: CameraConfig) -> Result<Self, CameraError> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(&config.frames_dir)
            .map_err(|e| {
                CameraError::CaptureFailed(format!(
                    "frame directory {} unreadable: {e}",
                    config.frames_dir.display()
                ))
            })?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                matches!(
                    path.extension().and_then(|e| e.to_str()),
                    Some("jpg" | "jpeg" | "png")
                )
            })
            .collect();
        files.sort();
        if files.is_empty() {
            return Err(CameraError::CaptureFailed(format!(
                "no frames found in {}",
                config.frames_dir.display()
            )));
        }
        info!("Replay camera serving {} frames from {}", files.len(), config.frames_dir.display());
        let frame_interval = Duration::from_secs(1) / config.fps.max(1);
        Ok(Self {
            config,
            files,
            cursor: 0,
            next_id: 0,
            frame_interval,
            last_capture: None,
            warmed_up: false,
        })
    }

    fn load_next(&mut self) -> Result<RgbImage, CameraError> {
        let path = &self.files[self.cursor];
        self.cursor = (self.cursor + 1) % self.files.len();
        let raw = std::fs::read(path)
            .map_err(|e| CameraError::CaptureFailed(format!("{}: {e}", path.display())))?;
        let mut img = imaging::decode_jpeg(&raw)
            .map_err(|e| CameraError::CaptureFailed(format!("{}: {e}", path.display())))?;
        let (width, height) = self.config.resolution;
        if img.dimensions() != (width, height) {
            img = image::imageops::resize(&img, width, height, image::imageops::FilterType::Triangle);
        }
        if self.config.hflip {
            img = image::imageops::flip_horizontal(&img);
        }
        if self.config.vflip {
            img = image::imageops::flip_vertical(&img);
        }
        Ok(img)
    }
}

impl FrameSource for ReplayCamera {
    fn warmup(&mut self, duration: Duration) {
        log!("Camera warming up for {:.1}s", duration.as_secs_f64());
        std::thread::sleep(duration);
        self.warmed_up = true;
        info!("Camera warm-up complete");
    }

    fn capture(&mut self) -> Result<Frame, CameraError> {
        if !self.warmed_up {
            return Err(CameraError::NotReady);
        }
        // Pace captures so the sequence plays back at the configured fps.
        if let Some(last) = self.last_capture {
            let elapsed = last.elapsed();
            if elapsed < self.frame_interval {
                std::thread::sleep(self.frame_interval - elapsed);
            }
        }
        self.last_capture = Some(Instant::now());

        let pixels = match self.load_next() {
            Ok(pixels) => pixels,
            Err(e) => {
                warn!("Replay frame skipped: {e}");
                return Err(e);
            }
        };
        let id = self.next_id;
        self.next_id += 1;
        Ok(Frame::new(id, Utc::now(), pixels))
    }
}
