use crate::bot_communication::bot_messenger::BotMessenger;
use crate::config::DispatcherConfig;
use crate::flap_control::camera::Frame;
use crate::flap_control::common::{annotate, imaging, ssim};
use crate::flap_control::detection_result::DetectionResult;
use crate::flap_control::episode::{DecisionEngine, EpisodeState};
use crate::flap_control::flap_controller::{DetectionPauser, RecentExitGate};
use crate::flap_control::prey_classifier::PreyClassify;
use crate::flap_control::trigger_position::TriggerPosition;
use crate::{error, event, info, log, warn};
use chrono::{DateTime, Utc};
use image::RgbImage;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, Semaphore, mpsc};
use tokio::task::{JoinHandle, JoinSet};

const ADMISSION_JPEG_QUALITY: u8 = 90;

/// One admitted frame on its way to the classifier.
#[derive(Debug, Clone)]
pub struct EnqueuedImage {
    pub jpeg: Vec<u8>,
    pub position: TriggerPosition,
    pub enqueued: DateTime<Utc>,
}

enum MailItem {
    Image(EnqueuedImage),
    /// Graceful-shutdown sentinel, equivalent to an idle timeout.
    Shutdown,
}

/// Everything one consumer lifetime needs, cloned out of the dispatcher so
/// the batch task owns its world.
struct BatchContext {
    mailbox_rx: Arc<Mutex<mpsc::Receiver<MailItem>>>,
    classifier: Arc<dyn PreyClassify>,
    engine: Arc<DecisionEngine>,
    concurrency: usize,
    idle_timeout: Duration,
}

/// Fans admitted frames out to the prey classifier under a concurrency
/// cap and hands each completed batch to the decision engine.
///
/// The mailbox is bounded and admission is `try_send`, so a full queue can
/// never stall the capture thread. The consumer is started lazily on
/// admission and dies after `reset_time_window_s + 1` seconds of queue
/// silence; its lifetime delimits one batch.
pub struct PreyDispatcher {
    config: DispatcherConfig,
    prey_detection_enabled: bool,
    save_images: bool,
    idle_timeout: Duration,
    mailbox_tx: mpsc::Sender<MailItem>,
    mailbox_rx: Arc<Mutex<mpsc::Receiver<MailItem>>>,
    consumer: StdMutex<Option<JoinHandle<()>>>,
    /// Owned exclusively by the admission path.
    previous_admitted: StdMutex<Option<RgbImage>>,
    episode: Arc<StdMutex<EpisodeState>>,
    classifier: Arc<dyn PreyClassify>,
    engine: Arc<DecisionEngine>,
    gate: Arc<dyn RecentExitGate>,
    pauser: Arc<dyn DetectionPauser>,
    messenger: Arc<BotMessenger>,
    handle: Handle,
    run_id: uuid::Uuid,
    next_image_id: AtomicU64,
    images_dir: PathBuf,
}

impl PreyDispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: DispatcherConfig,
        prey_detection_enabled: bool,
        save_images: bool,
        episode: Arc<StdMutex<EpisodeState>>,
        classifier: Arc<dyn PreyClassify>,
        engine: Arc<DecisionEngine>,
        gate: Arc<dyn RecentExitGate>,
        pauser: Arc<dyn DetectionPauser>,
        messenger: Arc<BotMessenger>,
        handle: Handle,
        images_dir: PathBuf,
    ) -> Arc<Self> {
        let (mailbox_tx, mailbox_rx) = mpsc::channel(config.queue_capacity);
        let idle_timeout = Duration::from_secs_f64(config.reset_time_window_s + 1.0);
        let run_id = uuid::Uuid::new_v4();
        event!("Prey dispatcher run id {run_id}");
        Arc::new(Self {
            config,
            prey_detection_enabled,
            save_images,
            idle_timeout,
            mailbox_tx,
            mailbox_rx: Arc::new(Mutex::new(mailbox_rx)),
            consumer: StdMutex::new(None),
            previous_admitted: StdMutex::new(None),
            episode,
            classifier,
            engine,
            gate,
            pauser,
            messenger,
            handle,
            run_id,
            next_image_id: AtomicU64::new(0),
            images_dir,
        })
    }

    /// Admission path, called from the capture thread for every pipeline
    /// iteration (and for follow-up frames). Applies the gates in order:
    /// pauser, recent exit, allowed positions, SSIM near-duplicate filter;
    /// then crops, encodes and enqueues without blocking.
    pub fn admit(&self, position: Option<TriggerPosition>, frame: &Frame) {
        if self.config.pause_during_lock && self.pauser.should_pause() {
            if position.is_some() {
                info!("Prey detection paused: {}", self.pauser.pause_reason());
            }
            return;
        }

        let prev_position = {
            let mut episode = self.episode.lock().unwrap();
            let prev = episode.last_trigger_position();
            if let Some(position) = position {
                episode.note_trigger_position(position);
            }
            prev
        };

        if !self.prey_detection_enabled {
            event!("Prey detection is disabled");
            return;
        }
        let Some(position) = position else {
            return;
        };

        if self.gate.recently_exited() {
            // Fresh flap event: the episode restarts from scratch.
            self.episode.lock().unwrap().reset_for_flap_event();
            return;
        }

        if !self.config.allowed_trigger_positions.contains(&position) {
            info!(
                "Skipping prey detection for trigger position {position} (allowed: {:?})",
                self.config.allowed_trigger_positions
            );
            return;
        }

        self.ensure_consumer();

        {
            let mut previous = self.previous_admitted.lock().unwrap();
            if let Some(previous_img) = previous.as_ref() {
                let score = ssim::ssim(previous_img, frame.pixels());
                if score > self.config.ssim_threshold {
                    log!("Skipping frame based on ssim ({score:.3})");
                    return;
                }
            }
            *previous = Some(frame.pixels().clone());
        }

        let cropped = match self.config.image_size {
            Some((crop_width, target_height)) => {
                if target_height < frame.height() {
                    error!(
                        "Frame height {} exceeds dispatcher target height {target_height}",
                        frame.height()
                    );
                    return;
                }
                let cropped = imaging::crop_to_width(frame.pixels(), position, crop_width);
                event!(
                    "Frame cropped from {}x{} to {}x{} (position: {position})",
                    frame.width(),
                    frame.height(),
                    cropped.width(),
                    cropped.height()
                );
                cropped
            }
            None => frame.pixels().clone(),
        };
        let jpeg = match imaging::encode_jpeg(&cropped, ADMISSION_JPEG_QUALITY) {
            Ok(jpeg) => jpeg,
            Err(e) => {
                error!("Failed to encode frame for prey analysis: {e}");
                return;
            }
        };

        self.episode.lock().unwrap().record_admission(position, &jpeg);

        if self.config.require_middle_after_right
            && position == TriggerPosition::Middle
            && prev_position == Some(TriggerPosition::Right)
        {
            self.send_orientation_debug(&cropped);
        }

        let item = EnqueuedImage { jpeg, position, enqueued: Utc::now() };
        let jpeg_len = item.jpeg.len();
        match self.mailbox_tx.try_send(MailItem::Image(item)) {
            Ok(()) => info!("Image added to prey analysis queue ({jpeg_len} bytes)"),
            Err(TrySendError::Full(_)) => {
                warn!("Prey analysis queue full - dropping frame");
                return;
            }
            Err(TrySendError::Closed(_)) => {
                error!("Prey analysis queue closed - dropping frame");
                return;
            }
        }

        if self.save_images {
            self.save_detector_image(&cropped);
        }
    }

    /// Injects the graceful-shutdown sentinel; the running consumer closes
    /// its batch as if it had idle-timed out.
    pub fn send_shutdown(&self) {
        if self.mailbox_tx.try_send(MailItem::Shutdown).is_err() {
            warn!("Could not enqueue shutdown sentinel");
        }
    }

    pub fn consumer_running(&self) -> bool {
        self.consumer.lock().unwrap().as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Starts a consumer task unless one is already alive.
    pub(crate) fn ensure_consumer(&self) {
        let mut consumer = self.consumer.lock().unwrap();
        let running = consumer.as_ref().is_some_and(|task| !task.is_finished());
        if !running {
            let context = BatchContext {
                mailbox_rx: Arc::clone(&self.mailbox_rx),
                classifier: Arc::clone(&self.classifier),
                engine: Arc::clone(&self.engine),
                concurrency: self.config.concurrency,
                idle_timeout: self.idle_timeout,
            };
            *consumer = Some(self.handle.spawn(consume_batch(context)));
            info!("Scheduled new prey-analysis consumer on the main runtime");
        }
    }

    fn send_orientation_debug(&self, cropped: &RgbImage) {
        let mut debug_image = cropped.clone();
        annotate::draw_label(&mut debug_image, "right->middle", 10, 10, 2, annotate::BLUE);
        match imaging::encode_jpeg(&debug_image, ADMISSION_JPEG_QUALITY) {
            Ok(jpeg) => {
                self.messenger.notify("Orientation debug: right->middle frame", Some(jpeg));
                log!("Sent orientation debug frame (right->middle)");
            }
            Err(e) => error!("Failed to encode orientation debug frame: {e}"),
        }
    }

    fn save_detector_image(&self, image: &RgbImage) {
        let directory = self.images_dir.join(self.run_id.to_string());
        let image_id = self.next_image_id.fetch_add(1, Ordering::Relaxed);
        let filename = directory.join(format!(
            "{}_id{image_id}.jpg",
            Utc::now().format("%Y-%m-%d_%H-%M-%S-%3f")
        ));
        let result = std::fs::create_dir_all(&directory)
            .map_err(|e| e.to_string())
            .and_then(|()| {
                imaging::encode_jpeg(image, ADMISSION_JPEG_QUALITY).map_err(|e| e.to_string())
            })
            .and_then(|jpeg| std::fs::write(&filename, jpeg).map_err(|e| e.to_string()));
        match result {
            Ok(()) => event!("Saved prey analysis image {}", filename.display()),
            Err(e) => error!("Failed to save prey analysis image: {e}"),
        }
    }
}

/// One consumer lifetime is one batch: pull items until the queue goes
/// quiet (or a sentinel arrives), fan out under the semaphore, then hand
/// everything collected to the decision engine. A permit that is not
/// immediately available turns the call into a `None`-input
/// classification, so every admitted item yields exactly one result.
async fn consume_batch(context: BatchContext) {
    let semaphore = Arc::new(Semaphore::new(context.concurrency));
    let mut tasks: JoinSet<DetectionResult> = JoinSet::new();
    {
        let mut rx = context.mailbox_rx.lock().await;
        loop {
            match tokio::time::timeout(context.idle_timeout, rx.recv()).await {
                Ok(Some(MailItem::Image(item))) => {
                    let classifier = Arc::clone(&context.classifier);
                    let semaphore = Arc::clone(&semaphore);
                    let concurrency = context.concurrency;
                    tasks.spawn(async move {
                        match semaphore.try_acquire_owned() {
                            Ok(_permit) => classifier.classify(Some(item)).await,
                            Err(_) => {
                                warn!(
                                    "Declining request - max concurrent limit ({concurrency}) \
                                     reached"
                                );
                                classifier.classify(None).await
                            }
                        }
                    });
                }
                Ok(Some(MailItem::Shutdown)) => {
                    warn!("Received shutdown signal, stopping consumer");
                    break;
                }
                Ok(None) => {
                    warn!("Prey analysis mailbox closed, stopping consumer");
                    break;
                }
                Err(_) => {
                    info!(
                        "Consumer timeout after {:.1}s of inactivity, shutting down",
                        context.idle_timeout.as_secs_f64()
                    );
                    break;
                }
            }
        }
    }

    // Outstanding classifier tasks run to completion before the batch is
    // decided; results land in completion order.
    let mut results = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(e) => error!("Classifier task failed: {e}"),
        }
    }
    context.engine.on_batch(results).await;
}
