use crate::flap_control::detection_result::DetectionResult;
use crate::flap_control::flap_controller::FlapCommander;
use crate::flap_control::prey_dispatcher::EnqueuedImage;
use crate::http_handler::http_client::HTTPClient;
use crate::http_handler::http_request::classify_image_post::ClassifyImageRequest;
use crate::http_handler::http_request::request_common::JSONBodyHTTPRequestType;
use crate::{error, event, info, warn};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Classification capability the dispatcher fans out to. By contract a
/// `None` input (concurrency-cap decline) returns a plain negative, which
/// keeps the batch length equal to the item count.
#[async_trait]
pub trait PreyClassify: Send + Sync {
    async fn classify(&self, item: Option<EnqueuedImage>) -> DetectionResult;
}

/// Production classifier: posts the JPEG to the remote prey-detection API
/// and, on a positive verdict, engages the flap lock before returning so
/// the interdiction never waits on batch bookkeeping.
pub struct ApiPreyClassifier {
    client: HTTPClient,
    api_key: String,
    commander: Arc<dyn FlapCommander>,
    prey_images_dir: PathBuf,
    request_counter: AtomicU64,
}

impl ApiPreyClassifier {
    const MAX_ATTEMPTS: u32 = 3;

    pub fn new(
        api_url: &str,
        api_key: String,
        commander: Arc<dyn FlapCommander>,
        prey_images_dir: PathBuf,
    ) -> Self {
        Self {
            client: HTTPClient::new(api_url),
            api_key,
            commander,
            prey_images_dir,
            request_counter: AtomicU64::new(0),
        }
    }

    /// Up to three attempts with no backoff; only transient network
    /// failures are retried.
    async fn request_verdict(&self, jpeg: &[u8]) -> Result<bool, String> {
        let request = ClassifyImageRequest::new(jpeg, &self.api_key);
        let mut attempt = 1;
        loop {
            info!("Making request to the prey-detection API (attempt {attempt})");
            match request.send_request(&self.client).await {
                Ok(response) => {
                    let count = self.request_counter.fetch_add(1, Ordering::Relaxed) + 1;
                    event!("Prey-detection API request counter: {count}");
                    info!("API response: detected={}", response.detected());
                    return Ok(response.detected());
                }
                Err(e) if e.is_transient() && attempt < Self::MAX_ATTEMPTS => {
                    warn!("Prey-detection API attempt {attempt} failed transiently: {e}");
                    attempt += 1;
                }
                Err(e) => return Err(e.to_string()),
            }
        }
    }

    fn persist_prey_image(&self, jpeg: &[u8]) {
        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S_%6f");
        let path = self.prey_images_dir.join(format!("prey_{timestamp}.jpg"));
        let result = std::fs::create_dir_all(&self.prey_images_dir)
            .and_then(|()| std::fs::write(&path, jpeg));
        match result {
            Ok(()) => info!("Persisted prey image at {}", path.display()),
            Err(e) => error!("Failed to persist prey image: {e}"),
        }
    }
}

#[async_trait]
impl PreyClassify for ApiPreyClassifier {
    async fn classify(&self, item: Option<EnqueuedImage>) -> DetectionResult {
        let Some(item) = item else {
            return DetectionResult::negative();
        };
        match self.request_verdict(&item.jpeg).await {
            Ok(true) => {
                let lock_status = self.commander.engage_lock("prey detected").await;
                self.persist_prey_image(&item.jpeg);
                let message = format!("CAT WITH PREY DETECTED!\n{lock_status}");
                DetectionResult::positive(message, item.jpeg)
            }
            Ok(false) => DetectionResult::negative(),
            Err(e) => {
                error!("Error classifying image: {e}");
                DetectionResult::error(format!("Error classifying image: {e}"), Some(item.jpeg))
            }
        }
    }
}
