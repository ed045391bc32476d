use crate::bot_communication::bot_messenger::{BotMessenger, NotifySink};
use crate::config::DispatcherConfig;
use crate::flap_control::camera::Frame;
use crate::flap_control::common::bbox::BBox;
use crate::flap_control::detection_result::DetectionResult;
use crate::flap_control::episode::{DecisionEngine, EpisodeState};
use crate::flap_control::flap_controller::{
    DetectionPauser, FlapCommander, FlapController, RecentExitGate,
};
use crate::flap_control::object_detector::{
    Detection, InferenceBackend, ObjectDetector, RawPrediction,
};
use crate::flap_control::prey_classifier::PreyClassify;
use crate::flap_control::prey_dispatcher::{EnqueuedImage, PreyDispatcher};
use crate::flap_control::tracker::DetectionTracker;
use crate::flap_control::trigger_position::TriggerPosition;
use crate::http_handler::HTTPError;
use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use image::{Rgb, RgbImage};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::runtime::Handle;

// ---------------------------------------------------------------- fakes --

struct FakeClassifier {
    delay: Duration,
    script: StdMutex<VecDeque<DetectionResult>>,
    some_calls: AtomicUsize,
    none_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeClassifier {
    fn new(delay: Duration, script: Vec<DetectionResult>) -> Arc<Self> {
        Arc::new(Self {
            delay,
            script: StdMutex::new(script.into()),
            some_calls: AtomicUsize::new(0),
            none_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    fn total_calls(&self) -> usize {
        self.some_calls.load(Ordering::SeqCst) + self.none_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PreyClassify for FakeClassifier {
    async fn classify(&self, item: Option<EnqueuedImage>) -> DetectionResult {
        if item.is_none() {
            self.none_calls.fetch_add(1, Ordering::SeqCst);
            return DetectionResult::negative();
        }
        self.some_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.script.lock().unwrap().pop_front().unwrap_or_else(DetectionResult::negative)
    }
}

#[derive(Default)]
struct FakeCommander {
    engage_calls: AtomicUsize,
    release_calls: AtomicUsize,
}

#[async_trait]
impl FlapCommander for FakeCommander {
    async fn engage_lock(&self, _reason: &str) -> String {
        self.engage_calls.fetch_add(1, Ordering::SeqCst);
        "Cat flap LOCKED".to_string()
    }

    async fn release_no_prey(&self) -> String {
        self.release_calls.fetch_add(1, Ordering::SeqCst);
        "Cat flap unlocked".to_string()
    }
}

#[derive(Default)]
struct RecorderSink {
    delivered: StdMutex<Vec<(String, bool)>>,
}

impl RecorderSink {
    fn messages(&self) -> Vec<(String, bool)> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotifySink for RecorderSink {
    async fn deliver(&self, text: &str, jpeg: Option<&[u8]>) -> Result<(), HTTPError> {
        self.delivered.lock().unwrap().push((text.to_string(), jpeg.is_some()));
        Ok(())
    }
}

#[derive(Default)]
struct FakeGate {
    recent: AtomicBool,
}

impl RecentExitGate for FakeGate {
    fn recently_exited(&self) -> bool {
        self.recent.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct FakePauser {
    paused: AtomicBool,
}

impl DetectionPauser for FakePauser {
    fn should_pause(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    fn pause_reason(&self) -> String {
        "paused by test".to_string()
    }
}

// -------------------------------------------------------------- helpers --

struct Harness {
    dispatcher: Arc<PreyDispatcher>,
    engine: Arc<DecisionEngine>,
    episode: Arc<StdMutex<EpisodeState>>,
    classifier: Arc<FakeClassifier>,
    commander: Arc<FakeCommander>,
    sink: Arc<RecorderSink>,
    gate: Arc<FakeGate>,
    pauser: Arc<FakePauser>,
}

fn test_dispatcher_config() -> DispatcherConfig {
    DispatcherConfig {
        reset_time_window_s: 30.0,
        image_size: None,
        queue_capacity: 50,
        concurrency: 10,
        // Above the SSIM ceiling: nothing is ever skipped unless a test
        // lowers it.
        ssim_threshold: 1.1,
        allowed_trigger_positions: vec![
            TriggerPosition::Left,
            TriggerPosition::Middle,
            TriggerPosition::Right,
        ],
        require_middle_after_right: false,
        pause_during_lock: true,
    }
}

fn harness(config: DispatcherConfig, classifier: Arc<FakeClassifier>) -> Harness {
    let sink = Arc::new(RecorderSink::default());
    let messenger = Arc::new(BotMessenger::start(Arc::clone(&sink) as Arc<dyn NotifySink>));
    let commander = Arc::new(FakeCommander::default());
    let gate = Arc::new(FakeGate::default());
    let pauser = Arc::new(FakePauser::default());
    let episode = Arc::new(StdMutex::new(EpisodeState::default()));
    let engine = Arc::new(DecisionEngine::new(
        Arc::clone(&episode),
        Arc::clone(&commander) as Arc<dyn FlapCommander>,
        Arc::clone(&messenger),
    ));
    let dispatcher = PreyDispatcher::new(
        config,
        true,
        false,
        Arc::clone(&episode),
        Arc::clone(&classifier) as Arc<dyn PreyClassify>,
        Arc::clone(&engine),
        Arc::clone(&gate) as Arc<dyn RecentExitGate>,
        Arc::clone(&pauser) as Arc<dyn DetectionPauser>,
        messenger,
        Handle::current(),
        std::env::temp_dir().join("flapguard-tests"),
    );
    Harness { dispatcher, engine, episode, classifier, commander, sink, gate, pauser }
}

fn frame(seed: u32) -> Frame {
    let pixels = RgbImage::from_fn(64, 48, |x, y| {
        if (x / (4 + seed % 5) + y / 4 + seed) % 2 == 0 {
            Rgb([210, 180, 140])
        } else {
            Rgb([20, 40, 60])
        }
    });
    Frame::new(u64::from(seed), Utc::now(), pixels)
}

async fn wait_until(description: &str, condition: impl Fn() -> bool) {
    for _ in 0..250 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for: {description}");
}

/// Closes the current batch via the shutdown sentinel and waits for the
/// consumer to finish processing it.
async fn close_batch(harness: &Harness) {
    harness.dispatcher.send_shutdown();
    wait_until("consumer to finish its batch", || !harness.dispatcher.consumer_running()).await;
}

// ------------------------------------------------------- decision engine --

#[tokio::test]
async fn test_negative_only_path_unlocks_once() {
    let harness = harness(test_dispatcher_config(), FakeClassifier::new(Duration::ZERO, vec![]));

    // Two single-frame batches from two distinct positions.
    harness.dispatcher.admit(Some(TriggerPosition::Left), &frame(1));
    close_batch(&harness).await;
    assert_eq!(harness.episode.lock().unwrap().negative_batches(), 1);
    assert_eq!(harness.commander.release_calls.load(Ordering::SeqCst), 0);

    harness.dispatcher.admit(Some(TriggerPosition::Right), &frame(2));
    close_batch(&harness).await;

    wait_until("release to be issued", || {
        harness.commander.release_calls.load(Ordering::SeqCst) == 1
    })
    .await;

    let episode = harness.episode.lock().unwrap();
    assert_eq!(episode.negative_batches(), 0, "counter resets after the unlock decision");
    assert!(episode.positions_seen().is_empty(), "positions clear after the unlock decision");
    drop(episode);

    wait_until("unlock notification", || !harness.sink.messages().is_empty()).await;
    let messages = harness.sink.messages();
    assert_eq!(messages.len(), 1);
    assert!(
        messages[0].0.ends_with("Positions in this episode: left, right"),
        "unexpected caption: {}",
        messages[0].0
    );
    assert!(messages[0].1, "unlock notification carries an image");
}

#[tokio::test]
async fn test_insufficient_positions_never_unlock() {
    let harness = harness(test_dispatcher_config(), FakeClassifier::new(Duration::ZERO, vec![]));

    for batch in 0..3u32 {
        harness.dispatcher.admit(Some(TriggerPosition::Middle), &frame(batch));
        close_batch(&harness).await;
    }

    assert_eq!(harness.episode.lock().unwrap().negative_batches(), 3);
    assert_eq!(harness.commander.release_calls.load(Ordering::SeqCst), 0);
    assert!(harness.sink.messages().is_empty(), "no unlock notification may be sent");
}

#[tokio::test]
async fn test_positive_interrupts_negative_streak() {
    let script = vec![
        DetectionResult::negative(),
        DetectionResult::positive("CAT WITH PREY DETECTED!".to_string(), vec![1, 2, 3]),
    ];
    let harness = harness(test_dispatcher_config(), FakeClassifier::new(Duration::ZERO, script));

    harness.dispatcher.admit(Some(TriggerPosition::Left), &frame(1));
    close_batch(&harness).await;
    assert_eq!(harness.episode.lock().unwrap().negative_batches(), 1);

    harness.dispatcher.admit(Some(TriggerPosition::Right), &frame(2));
    close_batch(&harness).await;

    wait_until("positive notification", || !harness.sink.messages().is_empty()).await;
    let episode = harness.episode.lock().unwrap();
    assert_eq!(episode.negative_batches(), 0, "positive batch resets the counter");
    assert!(episode.positions_seen().is_empty());
    drop(episode);

    assert_eq!(
        harness.commander.release_calls.load(Ordering::SeqCst),
        0,
        "a batch with a positive must never unlock"
    );
    let messages = harness.sink.messages();
    assert!(messages[0].0.contains("CAT WITH PREY DETECTED"));
    assert!(messages[0].1);
}

#[tokio::test]
async fn test_empty_batch_does_not_count() {
    let harness = harness(test_dispatcher_config(), FakeClassifier::new(Duration::ZERO, vec![]));

    harness.dispatcher.ensure_consumer();
    harness.dispatcher.send_shutdown();
    wait_until("empty batch to close", || !harness.dispatcher.consumer_running()).await;

    assert_eq!(harness.episode.lock().unwrap().negative_batches(), 0);
    assert_eq!(harness.commander.release_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_error_results_count_as_negative() {
    let harness = harness(test_dispatcher_config(), FakeClassifier::new(Duration::ZERO, vec![]));

    harness
        .engine
        .on_batch(vec![DetectionResult::error("boom".to_string(), Some(vec![9]))])
        .await;
    assert_eq!(harness.episode.lock().unwrap().negative_batches(), 1);
    assert_eq!(harness.commander.release_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unlock_prefers_first_batch_image_then_fallback() {
    let harness = harness(test_dispatcher_config(), FakeClassifier::new(Duration::ZERO, vec![]));
    {
        let mut episode = harness.episode.lock().unwrap();
        episode.record_admission(TriggerPosition::Left, b"fallback");
        episode.record_admission(TriggerPosition::Right, b"fallback");
    }

    harness.engine.on_batch(vec![DetectionResult::negative()]).await;
    harness.engine.on_batch(vec![DetectionResult::negative()]).await;

    wait_until("unlock notification", || !harness.sink.messages().is_empty()).await;
    assert_eq!(harness.commander.release_calls.load(Ordering::SeqCst), 1);
    let messages = harness.sink.messages();
    // Negative-only batches carry no images, so the enqueued fallback is
    // attached.
    assert!(messages[0].1);
}

// ------------------------------------------------------------ dispatcher --

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrency_cap_and_decline_accounting() {
    let mut config = test_dispatcher_config();
    config.concurrency = 2;
    let classifier = FakeClassifier::new(Duration::from_millis(150), vec![]);
    let harness = harness(config, Arc::clone(&classifier));

    for seed in 0..10 {
        harness.dispatcher.admit(Some(TriggerPosition::Left), &frame(seed));
    }
    close_batch(&harness).await;

    assert_eq!(classifier.total_calls(), 10, "every admitted item yields exactly one result");
    assert!(
        classifier.max_in_flight.load(Ordering::SeqCst) <= 2,
        "concurrency cap violated: {}",
        classifier.max_in_flight.load(Ordering::SeqCst)
    );
    assert!(
        classifier.none_calls.load(Ordering::SeqCst) > 0,
        "overflow items must be declined through the null-input path"
    );
    assert!(classifier.some_calls.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn test_full_mailbox_drops_without_blocking() {
    let mut config = test_dispatcher_config();
    config.queue_capacity = 2;
    let classifier = FakeClassifier::new(Duration::ZERO, vec![]);
    let harness = harness(config, Arc::clone(&classifier));

    // The consumer task cannot run between these synchronous admits, so
    // the third frame hits a full mailbox and is dropped.
    harness.dispatcher.admit(Some(TriggerPosition::Left), &frame(1));
    harness.dispatcher.admit(Some(TriggerPosition::Middle), &frame(2));
    harness.dispatcher.admit(Some(TriggerPosition::Right), &frame(3));

    // The dropped frame still contributed to the episode positions.
    assert_eq!(harness.episode.lock().unwrap().positions_seen().len(), 3);

    // Let the consumer drain the mailbox before the sentinel goes in,
    // otherwise it would hit the same full queue.
    wait_until("mailbox to drain", || classifier.total_calls() == 2).await;
    close_batch(&harness).await;
    assert_eq!(classifier.total_calls(), 2);
}

#[tokio::test]
async fn test_ssim_filter_skips_near_duplicates() {
    let mut config = test_dispatcher_config();
    config.ssim_threshold = 0.9;
    let classifier = FakeClassifier::new(Duration::ZERO, vec![]);
    let harness = harness(config, Arc::clone(&classifier));

    let same = frame(7);
    harness.dispatcher.admit(Some(TriggerPosition::Left), &same);
    harness.dispatcher.admit(Some(TriggerPosition::Left), &same);
    close_batch(&harness).await;

    assert_eq!(classifier.total_calls(), 1, "the duplicate frame must be skipped");
}

#[tokio::test]
async fn test_recent_exit_suppresses_and_resets_episode() {
    let harness = harness(test_dispatcher_config(), FakeClassifier::new(Duration::ZERO, vec![]));
    {
        let mut episode = harness.episode.lock().unwrap();
        episode.record_admission(TriggerPosition::Left, b"img");
        episode.note_trigger_position(TriggerPosition::Left);
    }
    harness.gate.recent.store(true, Ordering::SeqCst);

    harness.dispatcher.admit(Some(TriggerPosition::Middle), &frame(1));

    let episode = harness.episode.lock().unwrap();
    assert!(episode.positions_seen().is_empty(), "fresh flap event clears the episode");
    assert_eq!(episode.negative_batches(), 0);
    assert_eq!(episode.last_trigger_position(), None);
    drop(episode);
    assert!(!harness.dispatcher.consumer_running(), "no consumer may start while suppressed");
    assert_eq!(harness.classifier.total_calls(), 0);
}

#[tokio::test]
async fn test_disallowed_position_is_not_admitted() {
    let mut config = test_dispatcher_config();
    config.allowed_trigger_positions = vec![TriggerPosition::Middle];
    let classifier = FakeClassifier::new(Duration::ZERO, vec![]);
    let harness = harness(config, Arc::clone(&classifier));

    harness.dispatcher.admit(Some(TriggerPosition::Left), &frame(1));
    assert!(!harness.dispatcher.consumer_running());

    harness.dispatcher.admit(Some(TriggerPosition::Middle), &frame(2));
    close_batch(&harness).await;
    assert_eq!(classifier.total_calls(), 1);
}

#[tokio::test]
async fn test_pauser_blocks_admission() {
    let harness = harness(test_dispatcher_config(), FakeClassifier::new(Duration::ZERO, vec![]));
    harness.pauser.paused.store(true, Ordering::SeqCst);

    harness.dispatcher.admit(Some(TriggerPosition::Middle), &frame(1));
    assert!(!harness.dispatcher.consumer_running());
    assert!(harness.episode.lock().unwrap().positions_seen().is_empty());
}

#[tokio::test]
async fn test_sentinel_then_admission_starts_fresh_batch() {
    let harness = harness(test_dispatcher_config(), FakeClassifier::new(Duration::ZERO, vec![]));

    harness.dispatcher.admit(Some(TriggerPosition::Left), &frame(1));
    close_batch(&harness).await;
    assert_eq!(harness.episode.lock().unwrap().negative_batches(), 1);

    // A new admission after the sentinel gets its own consumer and batch.
    harness.dispatcher.admit(Some(TriggerPosition::Left), &frame(2));
    assert!(harness.dispatcher.consumer_running());
    close_batch(&harness).await;
    assert_eq!(harness.episode.lock().unwrap().negative_batches(), 2);
}

// -------------------------------------------------------- flap controller --

#[tokio::test]
async fn test_lock_is_idempotent() {
    let controller = FlapController::new(Duration::from_secs(300));
    assert!(controller.lock("prey detected").await);
    assert!(!controller.lock("second attempt").await, "locking twice must be a no-op");
    assert!(controller.is_locked());
    assert!(controller.remaining_lock_time() > 299.0);

    assert!(controller.unlock("manual").await);
    assert!(!controller.is_locked());
    assert!(!controller.auto_unlock_pending(), "manual unlock cancels the auto task");
    assert_eq!(controller.remaining_lock_time(), 0.0);

    assert!(!controller.unlock("again").await, "unlocking an open flap reports false");
}

#[tokio::test]
async fn test_auto_unlock_fires() {
    let controller = FlapController::new(Duration::from_secs(1));
    assert!(controller.lock("short test lock").await);
    assert!(controller.is_locked());
    assert!(controller.auto_unlock_pending());

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(!controller.is_locked(), "flap must auto-unlock within 1.5s");
    assert!(!controller.auto_unlock_pending());
}

#[tokio::test]
async fn test_relock_replaces_auto_unlock_task() {
    let controller = FlapController::new(Duration::from_millis(400));
    assert!(controller.lock("first").await);
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(!controller.is_locked());

    // A second cycle gets a fresh timer.
    assert!(controller.lock("second").await);
    assert!(controller.is_locked());
    assert!(controller.unlock("cleanup").await);
}

// ---------------------------------------------------------------- tracker --

fn detection(label: usize, prob: f32, x: f32) -> Detection {
    Detection { label, prob, rect: BBox::new(x, 10.0, 30.0, 30.0) }
}

fn tracker_for_test(iou_threshold: f32, window_s: f64) -> DetectionTracker {
    let config = crate::config::TrackerConfig {
        detection_time_window_s: window_s,
        detection_iou_threshold: iou_threshold,
        save_frequency: 0.0,
    };
    DetectionTracker::new(
        config,
        vec!["cat".to_string(), "person".to_string()],
        false,
        std::env::temp_dir().join("flapguard-tests"),
    )
}

#[test]
fn test_tracker_best_confidence_is_monotone() {
    let mut tracker = tracker_for_test(0.5, 10.0);
    let t0 = Utc::now();

    tracker.update(&[detection(0, 0.5, 10.0)], &frame(1), t0);
    tracker.update(&[detection(0, 0.9, 12.0)], &frame(2), t0 + TimeDelta::seconds(1));
    tracker.update(&[detection(0, 0.7, 11.0)], &frame(3), t0 + TimeDelta::seconds(2));
    assert_eq!(tracker.tracked_count(), 1);

    let expired = tracker.update(&[], &frame(4), t0 + TimeDelta::seconds(60));
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].label, 0);
    assert!((expired[0].best_confidence - 0.9).abs() < 1e-6, "best confidence never decreases");
    assert!(!expired[0].best_jpeg.is_empty());
    assert_eq!(tracker.tracked_count(), 0);
}

#[test]
fn test_tracker_separates_classes_and_disjoint_boxes() {
    let mut tracker = tracker_for_test(0.5, 10.0);
    let t0 = Utc::now();

    // Same spot, different class; far away, same class.
    tracker.update(
        &[detection(0, 0.6, 10.0), detection(1, 0.8, 10.0)],
        &frame(1),
        t0,
    );
    tracker.update(&[detection(0, 0.6, 300.0)], &frame(2), t0 + TimeDelta::seconds(1));
    assert_eq!(tracker.tracked_count(), 3);
}

#[test]
fn test_tracker_matches_first_in_insertion_order() {
    let mut tracker = tracker_for_test(0.1, 10.0);
    let t0 = Utc::now();

    tracker.update(&[detection(0, 0.5, 10.0)], &frame(1), t0);
    tracker.update(&[detection(0, 0.6, 11.0)], &frame(2), t0 + TimeDelta::seconds(1));
    // Overlapping update joins the existing track instead of minting one.
    assert_eq!(tracker.tracked_count(), 1);
}

#[test]
fn test_tracker_best_image_follows_best_confidence() {
    let mut tracker = tracker_for_test(0.5, 10.0);
    let t0 = Utc::now();

    let dark = Frame::new(1, t0, RgbImage::from_pixel(64, 48, Rgb([10, 10, 10])));
    let bright = Frame::new(2, t0, RgbImage::from_pixel(64, 48, Rgb([240, 240, 240])));

    tracker.update(&[detection(0, 0.5, 10.0)], &dark, t0);
    tracker.update(&[detection(0, 0.9, 11.0)], &bright, t0 + TimeDelta::seconds(1));

    let expired = tracker.update(&[], &dark, t0 + TimeDelta::seconds(60));
    let best = crate::flap_control::common::imaging::decode_jpeg(&expired[0].best_jpeg).unwrap();
    // Away from the annotation overlay the best frame is the bright one.
    assert!(best.get_pixel(60, 45)[0] > 200);
}

// ----------------------------------------------------------- detector/nms --

struct FakeBackend {
    features: usize,
    anchors: usize,
    data: Vec<f32>,
}

impl FakeBackend {
    /// Builds a `features x anchors` column-major prediction from rows of
    /// `(cx, cy, w, h, coco_class_id, score)`.
    fn from_rows(rows: &[(f32, f32, f32, f32, usize, f32)]) -> Self {
        let features = 84;
        let anchors = rows.len();
        let mut data = vec![0.0; features * anchors];
        for (anchor, row) in rows.iter().enumerate() {
            data[anchor] = row.0;
            data[anchors + anchor] = row.1;
            data[2 * anchors + anchor] = row.2;
            data[3 * anchors + anchor] = row.3;
            data[(4 + row.4) * anchors + anchor] = row.5;
        }
        Self { features, anchors, data }
    }
}

impl InferenceBackend for FakeBackend {
    fn infer(
        &mut self,
        _input: &ndarray::Array4<f32>,
    ) -> Result<RawPrediction, crate::flap_control::object_detector::DetectorError> {
        Ok(RawPrediction {
            features: self.features,
            anchors: self.anchors,
            data: self.data.clone(),
        })
    }
}

fn detector_with(
    rows: &[(f32, f32, f32, f32, usize, f32)],
    min_area: f32,
    iou_threshold: f32,
) -> ObjectDetector {
    let config = crate::config::DetectorConfig {
        min_detection_area: min_area,
        iou_threshold,
        ..crate::config::DetectorConfig::default()
    };
    ObjectDetector::new(Box::new(FakeBackend::from_rows(rows)), &config).unwrap()
}

#[test]
fn test_detector_thresholds_and_nms() {
    // COCO id 15 is "cat": one confident box, one duplicate, one below the
    // class threshold.
    let rows = [
        (100.0, 100.0, 40.0, 40.0, 15, 0.9),
        (102.0, 101.0, 40.0, 40.0, 15, 0.8),
        (300.0, 100.0, 40.0, 40.0, 15, 0.1),
    ];
    let mut detector = detector_with(&rows, 1.0, 0.5);

    let test_frame = Frame::new(0, Utc::now(), RgbImage::new(640, 384));
    let detections = detector.detect(&test_frame);
    assert_eq!(detections.len(), 1, "NMS must suppress the duplicate");
    assert_eq!(detections[0].label, 0);
    assert!((detections[0].prob - 0.9).abs() < 1e-6);
    assert_eq!(detector.class_name(detections[0].label), "cat");
    // Frame matches the model input size here, so coordinates map 1:1.
    assert!((detections[0].rect.center_x() - 100.0).abs() < 1e-3);
}

#[test]
fn test_detector_min_area_filter() {
    let rows = [(100.0, 100.0, 40.0, 40.0, 15, 0.9)];
    let mut detector = detector_with(&rows, 2000.0, 0.5);

    let test_frame = Frame::new(0, Utc::now(), RgbImage::new(640, 384));
    assert!(detector.detect(&test_frame).is_empty(), "1600 px^2 is below the 2000 px^2 floor");
}

#[test]
fn test_detector_scales_boxes_to_frame_coords() {
    let rows = [(320.0, 192.0, 64.0, 64.0, 15, 0.9)];
    let mut detector = detector_with(&rows, 1.0, 0.5);

    // Frame is half the model width and height.
    let test_frame = Frame::new(0, Utc::now(), RgbImage::new(320, 192));
    let detections = detector.detect(&test_frame);
    assert_eq!(detections.len(), 1);
    assert!((detections[0].rect.center_x() - 160.0).abs() < 1e-3);
    assert!((detections[0].rect.w - 32.0).abs() < 1e-3);
}

// ------------------------------------------------------- trigger position --

#[test]
fn test_trigger_position_bucketing() {
    assert_eq!(TriggerPosition::from_center_x(0.0, 640), TriggerPosition::Left);
    assert_eq!(TriggerPosition::from_center_x(106.0, 640), TriggerPosition::Left);
    assert_eq!(TriggerPosition::from_center_x(320.0, 640), TriggerPosition::Middle);
    assert_eq!(TriggerPosition::from_center_x(600.0, 640), TriggerPosition::Right);
    // The boundaries belong to the middle bucket.
    let third = 640.0 / 3.0;
    assert_eq!(TriggerPosition::from_center_x(third, 640), TriggerPosition::Middle);
    assert_eq!(TriggerPosition::from_center_x(2.0 * third, 640), TriggerPosition::Middle);
}

#[test]
fn test_trigger_position_ordering_matches_caption_order() {
    use itertools::Itertools;
    let mut positions = std::collections::BTreeSet::new();
    positions.insert(TriggerPosition::Right);
    positions.insert(TriggerPosition::Left);
    assert_eq!(positions.iter().join(", "), "left, right");
}
