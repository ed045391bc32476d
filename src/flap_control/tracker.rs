use crate::config::TrackerConfig;
use crate::flap_control::camera::Frame;
use crate::flap_control::common::annotate;
use crate::flap_control::common::imaging;
use crate::flap_control::object_detector::Detection;
use crate::{error, event, info, log};
use chrono::{DateTime, Utc};
use image::RgbImage;
use rand::Rng;
use std::path::PathBuf;

/// A track that went quiet for longer than the detection time window,
/// reported with the best frame seen over its lifetime.
#[derive(Debug, Clone)]
pub struct ExpiredTrack {
    pub label: usize,
    pub best_confidence: f32,
    pub best_jpeg: Vec<u8>,
}

/// One object currently being tracked across consecutive frames.
struct TrackedObject {
    label: usize,
    first_seen: DateTime<Utc>,
    last_seen: DateTime<Utc>,
    best_confidence: f32,
    best_image: RgbImage,
    last_detection: Detection,
    detection_count: u32,
}

impl TrackedObject {
    fn new(detection: Detection, timestamp: DateTime<Utc>, annotated: RgbImage) -> Self {
        Self {
            label: detection.label,
            first_seen: timestamp,
            last_seen: timestamp,
            best_confidence: detection.prob,
            best_image: annotated,
            last_detection: detection,
            detection_count: 1,
        }
    }

    /// `best_*` only ever moves towards higher confidence.
    fn update(&mut self, detection: Detection, timestamp: DateTime<Utc>, annotated: &RgbImage) {
        self.last_seen = timestamp;
        self.detection_count += 1;
        if detection.prob >= self.best_confidence {
            self.best_confidence = detection.prob;
            self.best_image = annotated.clone();
        }
        self.last_detection = detection;
    }
}

/// Groups consecutive detections of the same class into tracks and reports
/// each track once it expires, so one visit produces one notification
/// rather than one per frame.
pub struct DetectionTracker {
    config: TrackerConfig,
    class_names: Vec<String>,
    tracked_objects: Vec<(String, TrackedObject)>,
    next_id: u64,
    run_id: uuid::Uuid,
    save_images: bool,
    images_dir: PathBuf,
}

impl DetectionTracker {
    pub fn new(
        config: TrackerConfig,
        class_names: Vec<String>,
        save_images: bool,
        images_dir: PathBuf,
    ) -> Self {
        let run_id = uuid::Uuid::new_v4();
        event!("Tracker run id {run_id}");
        Self {
            config,
            class_names,
            tracked_objects: Vec::new(),
            next_id: 0,
            run_id,
            save_images,
            images_dir,
        }
    }

    pub fn tracked_count(&self) -> usize {
        self.tracked_objects.len()
    }

    /// Feeds one frame's detections and returns the tracks that expired.
    pub fn update(
        &mut self,
        detections: &[Detection],
        frame: &Frame,
        timestamp: DateTime<Utc>,
    ) -> Vec<ExpiredTrack> {
        let expired = self.expire_old_tracks(timestamp);
        if !expired.is_empty() {
            info!("Found {} expired tracks to process", expired.len());
        }

        if !detections.is_empty() {
            event!("Processing {} new detections", detections.len());
            let annotated = self.draw_detections(frame.pixels(), detections);
            for detection in detections {
                match self.find_matching_track(detection) {
                    Some(index) => {
                        let (key, tracked) = &mut self.tracked_objects[index];
                        tracked.update(detection.clone(), timestamp, &annotated);
                        event!(
                            "Updated track {key} with detection confidence {:.3}",
                            detection.prob
                        );
                        let key = key.clone();
                        if self.save_images {
                            self.save_track_image(&key, frame.pixels(), timestamp);
                        }
                    }
                    None => {
                        let key = self.generate_track_key(detection.label);
                        info!("Created new track {key} with confidence {:.3}", detection.prob);
                        self.tracked_objects.push((
                            key.clone(),
                            TrackedObject::new(detection.clone(), timestamp, annotated.clone()),
                        ));
                        if self.save_images {
                            self.save_track_image(&key, frame.pixels(), timestamp);
                        }
                    }
                }
            }
        }

        expired
            .into_iter()
            .filter_map(|tracked| {
                match imaging::encode_jpeg(&tracked.best_image, 90) {
                    Ok(best_jpeg) => Some(ExpiredTrack {
                        label: tracked.label,
                        best_confidence: tracked.best_confidence,
                        best_jpeg,
                    }),
                    Err(e) => {
                        error!("Failed to encode best frame of an expired track: {e}");
                        None
                    }
                }
            })
            .collect()
    }

    /// First track of the same class whose last box overlaps enough, in
    /// insertion order.
    fn find_matching_track(&self, detection: &Detection) -> Option<usize> {
        self.tracked_objects.iter().position(|(_, tracked)| {
            tracked.label == detection.label
                && tracked.last_detection.rect.iou(&detection.rect)
                    >= self.config.detection_iou_threshold
        })
    }

    fn expire_old_tracks(&mut self, now: DateTime<Utc>) -> Vec<TrackedObject> {
        let window = self.config.detection_time_window_s;
        let mut expired = Vec::new();
        let mut index = 0;
        while index < self.tracked_objects.len() {
            let quiet_for = (now - self.tracked_objects[index].1.last_seen).num_milliseconds() as f64 / 1000.0;
            if quiet_for > window {
                let (key, tracked) = self.tracked_objects.remove(index);
                log!(
                    "Track {key} expired after {} detections (best confidence {:.3})",
                    tracked.detection_count,
                    tracked.best_confidence
                );
                expired.push(tracked);
            } else {
                index += 1;
            }
        }
        expired
    }

    fn generate_track_key(&mut self, label: usize) -> String {
        let class_name = self
            .class_names
            .get(label)
            .cloned()
            .unwrap_or_else(|| format!("class_{label}"));
        let id = self.next_id;
        self.next_id += 1;
        format!("{class_name}_{id}")
    }

    fn draw_detections(&self, image: &RgbImage, detections: &[Detection]) -> RgbImage {
        let mut annotated = image.clone();
        for detection in detections {
            annotate::draw_rect(&mut annotated, &detection.rect, annotate::GREEN);
            let caption = format!(
                "{} {:.0}%",
                self.class_names.get(detection.label).map_or("unknown", String::as_str),
                detection.prob * 100.0
            );
            let label_y = (detection.rect.y as u32).saturating_sub(10);
            annotate::draw_label(&mut annotated, &caption, detection.rect.x.max(0.0) as u32, label_y, 1, annotate::GREEN);
        }
        annotated
    }

    fn save_track_image(&self, key: &str, image: &RgbImage, timestamp: DateTime<Utc>) {
        if rand::rng().random::<f64>() > self.config.save_frequency {
            return;
        }
        let directory = self.images_dir.join(format!("{}_{key}", self.run_id));
        let filename = directory.join(format!("{}.jpg", timestamp.format("%Y-%m-%d_%H-%M-%S-%3f")));
        let result = std::fs::create_dir_all(&directory)
            .map_err(|e| e.to_string())
            .and_then(|()| imaging::encode_jpeg(image, 90).map_err(|e| e.to_string()))
            .and_then(|jpeg| std::fs::write(&filename, jpeg).map_err(|e| e.to_string()));
        match result {
            Ok(()) => event!("Saved track image {}", filename.display()),
            Err(e) => error!("Failed to save image for track {key}: {e}"),
        }
    }
}
