use crate::bot_communication::bot_messenger::BotMessenger;
use crate::flap_control::common::{annotate, imaging};
use crate::flap_control::detection_result::DetectionResult;
use crate::flap_control::flap_controller::FlapCommander;
use crate::flap_control::trigger_position::TriggerPosition;
use crate::{error, info, log};
use itertools::Itertools;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex as StdMutex};

/// State of one detection episode: from the first admitted trigger frame
/// after a flap/unlock event until the next episode-resetting event
/// (positive decision, fresh flap, unlock). Shared between the admission
/// path on the capture thread and the decision engine; all resets happen
/// under the one mutex, so they are atomic.
#[derive(Default)]
pub struct EpisodeState {
    consecutive_negative_only_batches: u32,
    trigger_positions_seen: BTreeSet<TriggerPosition>,
    last_enqueued_jpeg: Option<Vec<u8>>,
    first_middle_jpeg: Option<Vec<u8>>,
    last_trigger_position: Option<TriggerPosition>,
}

impl EpisodeState {
    pub fn negative_batches(&self) -> u32 {
        self.consecutive_negative_only_batches
    }

    pub fn positions_seen(&self) -> &BTreeSet<TriggerPosition> {
        &self.trigger_positions_seen
    }

    pub fn last_trigger_position(&self) -> Option<TriggerPosition> {
        self.last_trigger_position
    }

    /// Records an admission: the position joins the episode set and the
    /// encoded frame becomes the notification fallback image.
    pub fn record_admission(&mut self, position: TriggerPosition, jpeg: &[u8]) {
        self.trigger_positions_seen.insert(position);
        self.last_enqueued_jpeg = Some(jpeg.to_vec());
        if position == TriggerPosition::Middle && self.first_middle_jpeg.is_none() {
            self.first_middle_jpeg = Some(jpeg.to_vec());
        }
    }

    pub fn note_trigger_position(&mut self, position: TriggerPosition) {
        self.last_trigger_position = Some(position);
    }

    /// Fresh flap event: counter, positions, cached frames and orientation
    /// state all go.
    pub fn reset_for_flap_event(&mut self) {
        self.consecutive_negative_only_batches = 0;
        self.trigger_positions_seen.clear();
        self.first_middle_jpeg = None;
        self.last_trigger_position = None;
    }

    fn reset_for_positive(&mut self) {
        self.consecutive_negative_only_batches = 0;
        self.trigger_positions_seen.clear();
        self.first_middle_jpeg = None;
    }
}

/// Aggregates classifier batches into lock/keep/unlock decisions.
pub struct DecisionEngine {
    episode: Arc<StdMutex<EpisodeState>>,
    commander: Arc<dyn FlapCommander>,
    messenger: Arc<BotMessenger>,
}

impl DecisionEngine {
    pub const MIN_RESULTS_PER_BATCH: usize = 1;
    pub const REQUIRED_NEGATIVE_ONLY_BATCHES: u32 = 2;
    pub const REQUIRED_DISTINCT_POSITIONS: usize = 2;

    pub fn new(
        episode: Arc<StdMutex<EpisodeState>>,
        commander: Arc<dyn FlapCommander>,
        messenger: Arc<BotMessenger>,
    ) -> Self {
        Self { episode, commander, messenger }
    }

    /// Consumes one batch of classifier results. Never propagates errors;
    /// a failed step is logged and the pipeline keeps running.
    pub async fn on_batch(&self, results: Vec<DetectionResult>) {
        info!("Processing {} detection results", results.len());

        let first_positive = results.iter().find(|result| result.is_positive());
        if let Some(DetectionResult::Positive { message, jpeg }) = first_positive {
            info!(
                "Positive prey detection found in batch - resetting consecutive \
                 negative-only batch counter"
            );
            self.episode.lock().unwrap().reset_for_positive();
            // The lock itself was already engaged by the classifier.
            self.messenger.notify(message, Some(jpeg.clone()));
            return;
        }

        if results.len() < Self::MIN_RESULTS_PER_BATCH {
            log!("Batch carried no valid results - not counting it towards unlock");
            return;
        }

        let decision = {
            let mut episode = self.episode.lock().unwrap();
            episode.consecutive_negative_only_batches += 1;
            info!(
                "No positive detections in batch - consecutive_negative_only_batches={}/{}",
                episode.consecutive_negative_only_batches,
                Self::REQUIRED_NEGATIVE_ONLY_BATCHES
            );

            if episode.consecutive_negative_only_batches < Self::REQUIRED_NEGATIVE_ONLY_BATCHES {
                log!("Keeping current flap state (waiting for more negative-only batches)");
                None
            } else if episode.trigger_positions_seen.len() < Self::REQUIRED_DISTINCT_POSITIONS {
                info!(
                    "Reached required negative-only batches but only saw positions {:?} - \
                     keeping flap state",
                    episode.trigger_positions_seen
                );
                None
            } else {
                episode.consecutive_negative_only_batches = 0;
                let positions = episode.trigger_positions_seen.iter().join(", ");
                // Earliest batch image wins, the last enqueued frame is the
                // fallback when every task was an overflow or error result.
                let image = results
                    .iter()
                    .find_map(|result| result.jpeg().map(<[u8]>::to_vec))
                    .or_else(|| episode.last_enqueued_jpeg.clone());
                Some((positions, image))
            }
        };

        let Some((positions, image)) = decision else {
            return;
        };
        info!(
            "Reached required number of consecutive negative-only batches with positions \
             {positions} - unlocking flap"
        );

        let unlock_message = self.commander.release_no_prey().await;
        let caption = format!("{unlock_message}\nPositions in this episode: {positions}");
        let image = image.map(|jpeg| overlay_positions(jpeg, &positions));
        self.messenger.notify(&caption, image);

        self.episode.lock().unwrap().trigger_positions_seen.clear();
    }
}

/// Draws the episode's position set onto the notification image. Returns
/// the original bytes when decoding or re-encoding fails.
fn overlay_positions(jpeg: Vec<u8>, positions: &str) -> Vec<u8> {
    let mut img = match imaging::decode_jpeg(&jpeg) {
        Ok(img) => img,
        Err(e) => {
            error!("Failed to overlay positions on unlock image: {e}");
            return jpeg;
        }
    };
    annotate::draw_label(&mut img, &format!("Positions: {positions}"), 10, 10, 2, annotate::GREEN);
    match imaging::encode_jpeg(&img, 90) {
        Ok(encoded) => encoded,
        Err(e) => {
            error!("Failed to re-encode unlock image: {e}");
            jpeg
        }
    }
}
