use crate::config::DetectorConfig;
use crate::flap_control::camera::Frame;
use crate::flap_control::common::bbox::BBox;
use crate::{error, info, log};
use image::RgbImage;
use ndarray::{Array, Array4};
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;

/// The 80 COCO classes in model output order.
pub const COCO_CLASS_NAMES: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat",
    "dog", "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack",
    "umbrella", "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball",
    "kite", "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket",
    "bottle", "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple",
    "sandwich", "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake",
    "chair", "couch", "potted plant", "bed", "dining table", "toilet", "tv", "laptop",
    "mouse", "remote", "keyboard", "cell phone", "microwave", "oven", "toaster", "sink",
    "refrigerator", "book", "clock", "vase", "scissors", "teddy bear", "hair drier",
    "toothbrush",
];

/// One detection; `label` indexes into the configured classes of interest.
#[derive(Debug, Clone)]
pub struct Detection {
    pub label: usize,
    pub prob: f32,
    pub rect: BBox,
}

#[derive(Debug)]
pub enum DetectorError {
    ModelLoad(String),
    Inference(String),
    UnknownClass(String),
    MissingThreshold(String),
}

impl std::fmt::Display for DetectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectorError::ModelLoad(msg) => write!(f, "model load failed: {msg}"),
            DetectorError::Inference(msg) => write!(f, "inference failed: {msg}"),
            DetectorError::UnknownClass(name) => write!(f, "class {name:?} is not a COCO class"),
            DetectorError::MissingThreshold(name) => {
                write!(f, "no confidence threshold configured for class {name:?}")
            }
        }
    }
}

impl std::error::Error for DetectorError {}

/// Raw model output: `features x anchors` column-major, features being
/// `(cx, cy, w, h, class scores...)`.
pub struct RawPrediction {
    pub features: usize,
    pub anchors: usize,
    pub data: Vec<f32>,
}

impl RawPrediction {
    fn at(&self, feature: usize, anchor: usize) -> f32 {
        self.data[feature * self.anchors + anchor]
    }
}

/// Capability interface over the forward pass; tests substitute fakes.
pub trait InferenceBackend: Send {
    fn infer(&mut self, input: &Array4<f32>) -> Result<RawPrediction, DetectorError>;
}

/// ONNX Runtime backend for exported YOLO models.
pub struct OrtBackend {
    session: Session,
}

impl OrtBackend {
    pub fn load<P: AsRef<Path>>(model_path: P) -> Result<Self, DetectorError> {
        info!("Loading detector model from {:?}", model_path.as_ref());
        let session = Session::builder()
            .map_err(|e| DetectorError::ModelLoad(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e| DetectorError::ModelLoad(e.to_string()))?;
        info!("Detector model loaded");
        Ok(Self { session })
    }
}

impl InferenceBackend for OrtBackend {
    fn infer(&mut self, input: &Array4<f32>) -> Result<RawPrediction, DetectorError> {
        let tensor = TensorRef::from_array_view(input.view())
            .map_err(|e| DetectorError::Inference(e.to_string()))?;
        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .map_err(|e| DetectorError::Inference(e.to_string()))?;
        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::Inference(e.to_string()))?;

        let dims = shape.as_ref();
        if dims.len() != 3 {
            return Err(DetectorError::Inference(format!(
                "expected 3-D output tensor, got {}-D",
                dims.len()
            )));
        }
        Ok(RawPrediction {
            features: dims[1] as usize,
            anchors: dims[2] as usize,
            data: data.to_vec(),
        })
    }
}

/// YOLO wrapper: preprocessing, class projection, per-class thresholds,
/// minimum-area filter and NMS. Deterministic for a given frame.
pub struct ObjectDetector {
    backend: Box<dyn InferenceBackend>,
    /// Model input size as (height, width).
    input_size: (u32, u32),
    class_names: Vec<String>,
    coco_ids: Vec<usize>,
    thresholds: Vec<f32>,
    iou_threshold: f32,
    min_detection_area: f32,
}

impl ObjectDetector {
    pub fn new(
        backend: Box<dyn InferenceBackend>,
        config: &DetectorConfig,
    ) -> Result<Self, DetectorError> {
        let mut coco_ids = Vec::with_capacity(config.classes_of_interest.len());
        let mut thresholds = Vec::with_capacity(config.classes_of_interest.len());
        for name in &config.classes_of_interest {
            let coco_id = COCO_CLASS_NAMES
                .iter()
                .position(|candidate| candidate == name)
                .ok_or_else(|| DetectorError::UnknownClass(name.clone()))?;
            let threshold = config
                .class_thresholds
                .get(name)
                .copied()
                .ok_or_else(|| DetectorError::MissingThreshold(name.clone()))?;
            coco_ids.push(coco_id);
            thresholds.push(threshold);
        }
        info!(
            "Detection parameters: class_thresholds={:?}, iou_threshold={}",
            config.class_thresholds, config.iou_threshold
        );
        Ok(Self {
            backend,
            input_size: config.image_size,
            class_names: config.classes_of_interest.clone(),
            coco_ids,
            thresholds,
            iou_threshold: config.iou_threshold,
            min_detection_area: config.min_detection_area,
        })
    }

    pub fn class_name(&self, label: usize) -> &str {
        self.class_names.get(label).map_or("unknown", String::as_str)
    }

    pub fn class_id(&self, class_name: &str) -> Option<usize> {
        self.class_names.iter().position(|name| name == class_name)
    }

    /// Runs detection on a frame. Inference failures are logged and yield an
    /// empty list so the pipeline keeps iterating.
    pub fn detect(&mut self, frame: &Frame) -> Vec<Detection> {
        let input = self.preprocess(frame.pixels());
        let prediction = match self.backend.infer(&input) {
            Ok(prediction) => prediction,
            Err(e) => {
                error!("Detector inference failed: {e}");
                return Vec::new();
            }
        };
        self.postprocess(&prediction, frame.width(), frame.height())
    }

    fn preprocess(&self, image: &RgbImage) -> Array4<f32> {
        let (model_h, model_w) = self.input_size;
        let resized =
            image::imageops::resize(image, model_w, model_h, image::imageops::FilterType::Triangle);

        let mut input = Array::zeros((1, 3, model_h as usize, model_w as usize));
        for y in 0..model_h as usize {
            for x in 0..model_w as usize {
                let pixel = resized.get_pixel(x as u32, y as u32);
                input[[0, 0, y, x]] = f32::from(pixel[0]) / 255.0;
                input[[0, 1, y, x]] = f32::from(pixel[1]) / 255.0;
                input[[0, 2, y, x]] = f32::from(pixel[2]) / 255.0;
            }
        }
        input
    }

    fn postprocess(
        &self,
        prediction: &RawPrediction,
        frame_w: u32,
        frame_h: u32,
    ) -> Vec<Detection> {
        if prediction.features < 4 {
            error!("Detector output has {} features, expected at least 4", prediction.features);
            return Vec::new();
        }

        let mut candidates: Vec<Detection> = Vec::new();
        let mut confident = 0usize;
        let mut max_area = 0.0f32;
        for anchor in 0..prediction.anchors {
            // Argmax over the projected classes of interest.
            let mut best_label = 0usize;
            let mut best_score = f32::MIN;
            for (label, coco_id) in self.coco_ids.iter().enumerate() {
                let feature = 4 + coco_id;
                if feature >= prediction.features {
                    continue;
                }
                let score = prediction.at(feature, anchor);
                if score > best_score {
                    best_score = score;
                    best_label = label;
                }
            }
            if best_score <= self.thresholds[best_label] {
                continue;
            }
            confident += 1;

            let w = prediction.at(2, anchor);
            let h = prediction.at(3, anchor);
            max_area = max_area.max(w * h);
            if w * h <= self.min_detection_area {
                continue;
            }
            let rect = BBox::from_center(prediction.at(0, anchor), prediction.at(1, anchor), w, h);
            candidates.push(Detection { label: best_label, prob: best_score, rect });
        }

        if candidates.is_empty() {
            if confident > 0 {
                log!("All detections filtered out by minimum area threshold: {max_area}");
            }
            return Vec::new();
        }

        let mut picked = Self::non_max_suppression(candidates, self.iou_threshold);

        // Model-input coordinates back into frame coordinates.
        let (model_h, model_w) = self.input_size;
        let sx = frame_w as f32 / model_w as f32;
        let sy = frame_h as f32 / model_h as f32;
        for detection in &mut picked {
            detection.rect = detection.rect.scaled(sx, sy);
        }
        picked
    }

    fn non_max_suppression(mut candidates: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
        candidates.sort_by(|a, b| b.prob.partial_cmp(&a.prob).unwrap_or(std::cmp::Ordering::Equal));
        let mut picked: Vec<Detection> = Vec::new();
        for candidate in candidates {
            if picked.iter().all(|kept| kept.rect.iou(&candidate.rect) <= iou_threshold) {
                picked.push(candidate);
            }
        }
        picked
    }
}
