use crate::bot_communication::bot_messenger::BotMessenger;
use crate::config::Config;
use crate::flap_control::camera::FrameSource;
use crate::flap_control::object_detector::ObjectDetector;
use crate::flap_control::prey_dispatcher::PreyDispatcher;
use crate::flap_control::tracker::DetectionTracker;
use crate::flap_control::trigger_position::TriggerPosition;
use crate::{error, event, info, log};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Owns the capture/detection OS thread. The detector is synchronous and
/// CPU-bound, so it lives away from the cooperative runtime; admitted
/// frames and notifications cross over through bounded channels.
pub struct Supervisor;

impl Supervisor {
    pub fn start(
        config: Arc<Config>,
        camera: Box<dyn FrameSource>,
        detector: ObjectDetector,
        tracker: DetectionTracker,
        dispatcher: Arc<PreyDispatcher>,
        messenger: Arc<BotMessenger>,
        trigger_label: usize,
        cancel_token: CancellationToken,
    ) -> std::thread::JoinHandle<()> {
        std::thread::Builder::new()
            .name("capture-loop".to_string())
            .spawn(move || {
                Self::run_capture_loop(
                    &config,
                    camera,
                    detector,
                    tracker,
                    &dispatcher,
                    &messenger,
                    trigger_label,
                    &cancel_token,
                );
            })
            .expect("capture thread failed to spawn")
    }

    #[allow(clippy::too_many_arguments)]
    fn run_capture_loop(
        config: &Config,
        mut camera: Box<dyn FrameSource>,
        mut detector: ObjectDetector,
        mut tracker: DetectionTracker,
        dispatcher: &Arc<PreyDispatcher>,
        messenger: &Arc<BotMessenger>,
        trigger_label: usize,
        cancel_token: &CancellationToken,
    ) {
        camera.warmup(Duration::from_secs_f64(config.camera.warmup_time_s));
        info!("=== Starting main detection loop ===");

        while !cancel_token.is_cancelled() {
            let frame = match camera.capture() {
                Ok(frame) => frame,
                Err(e) => {
                    error!("Error capturing frame: {e}");
                    continue;
                }
            };
            let timestamp = Utc::now();
            event!("Captured frame {} at {}", frame.id(), timestamp.format("%H:%M:%S%.3f"));

            let detections = detector.detect(&frame);

            // Bucket the first trigger-class detection by bbox center.
            let trigger_position = detections
                .iter()
                .find(|detection| detection.label == trigger_label)
                .map(|detection| {
                    TriggerPosition::from_center_x(detection.rect.center_x(), frame.width())
                });

            if detections.is_empty() {
                event!("No objects detected");
            } else {
                info!(
                    "Found {} objects at {} (trigger position: {trigger_position:?})",
                    detections.len(),
                    timestamp.format("%H:%M:%S%.3f")
                );
            }

            let expired = tracker.update(&detections, &frame, timestamp);
            dispatcher.admit(trigger_position, &frame);

            // Follow-up burst: denser classifier input without detector cost.
            if let Some(position) = trigger_position {
                let followups = config.pipeline.detection_followup_frames;
                if followups > 0 {
                    log!(
                        "Trigger object at {position}, collecting next {followups} frames for \
                         prey analysis"
                    );
                    for _ in 0..followups {
                        match camera.capture() {
                            Ok(followup_frame) => dispatcher.admit(Some(position), &followup_frame),
                            Err(e) => error!("Error capturing follow-up frame: {e}"),
                        }
                    }
                }
            }

            for track in expired {
                let class_name = detector.class_name(track.label).to_string();
                info!(
                    "Expired detection: {class_name} (confidence: {:.3})",
                    track.best_confidence
                );
                if config.pipeline.notify_detections {
                    let message = format!(
                        "{} detected at {}",
                        capitalize(&class_name),
                        timestamp.format("%Y-%m-%d %H:%M:%S")
                    );
                    messenger.notify(&message, Some(track.best_jpeg));
                }
            }
        }
        info!("Capture loop stopped");
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
