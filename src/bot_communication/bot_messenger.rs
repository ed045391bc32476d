use crate::http_handler::HTTPError;
use crate::http_handler::http_client::HTTPClient;
use crate::http_handler::http_request::request_common::{
    JSONBodyHTTPRequestType, MultipartBodyHTTPRequestType,
};
use crate::http_handler::http_request::send_message_post::SendMessageRequest;
use crate::http_handler::http_request::send_photo_post::SendPhotoRequest;
use crate::{error, event, info, warn};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// One outbound alert, optionally carrying a JPEG payload.
#[derive(Debug, Clone)]
pub struct Notification {
    pub text: String,
    pub jpeg: Option<Vec<u8>>,
}

/// Delivery capability behind the messenger; tests substitute a recorder.
#[async_trait]
pub trait NotifySink: Send + Sync {
    async fn deliver(&self, text: &str, jpeg: Option<&[u8]>) -> Result<(), HTTPError>;
}

/// Outbound sink backed by a chat-bot HTTP API (`sendMessage` /
/// `sendPhoto` on a token-scoped base URL).
pub struct BotApiSink {
    client: HTTPClient,
    chat_id: i64,
}

impl BotApiSink {
    pub fn new(base_url: &str, token: &str, chat_id: i64) -> Self {
        Self { client: HTTPClient::new(&format!("{base_url}/bot{token}")), chat_id }
    }
}

#[async_trait]
impl NotifySink for BotApiSink {
    async fn deliver(&self, text: &str, jpeg: Option<&[u8]>) -> Result<(), HTTPError> {
        let response = match jpeg {
            Some(jpeg) => {
                SendPhotoRequest::new(self.chat_id, text, jpeg.to_vec())
                    .send_request(&self.client)
                    .await?
            }
            None => SendMessageRequest::new(self.chat_id, text).send_request(&self.client).await?,
        };
        if response.ok() {
            Ok(())
        } else {
            Err(HTTPError::HTTPResponseError(
                crate::http_handler::http_response::response_common::ResponseError::BadRequest(
                    "bot API rejected the message".to_string(),
                ),
            ))
        }
    }
}

/// Sink used when notifications are disabled; alerts end up in the log.
pub struct LogOnlySink;

#[async_trait]
impl NotifySink for LogOnlySink {
    async fn deliver(&self, text: &str, jpeg: Option<&[u8]>) -> Result<(), HTTPError> {
        info!("Notification (muted): {text} (with_image={})", jpeg.is_some());
        Ok(())
    }
}

/// Thread-safe notification fan-in: producers (capture thread included)
/// hand alerts to a bounded channel, a drain task delivers them through
/// the sink with a bounded retry loop.
pub struct BotMessenger {
    tx: mpsc::Sender<Notification>,
}

impl BotMessenger {
    const CHANNEL_CAPACITY: usize = 32;
    const MAX_DELIVERY_ATTEMPTS: u32 = 3;

    pub fn start(sink: std::sync::Arc<dyn NotifySink>) -> Self {
        let (tx, mut rx) = mpsc::channel::<Notification>(Self::CHANNEL_CAPACITY);
        tokio::spawn(async move {
            while let Some(notification) = rx.recv().await {
                Self::deliver_with_retry(&*sink, &notification).await;
            }
        });
        Self { tx }
    }

    /// Queues an alert without blocking the caller. A full channel drops
    /// the alert with a warning; notifications are best-effort.
    pub fn notify(&self, text: &str, jpeg: Option<Vec<u8>>) {
        let notification = Notification { text: text.to_string(), jpeg };
        if let Err(e) = self.tx.try_send(notification) {
            warn!("Notification dropped, channel congested: {e}");
        }
    }

    async fn deliver_with_retry(sink: &dyn NotifySink, notification: &Notification) {
        for attempt in 1..=Self::MAX_DELIVERY_ATTEMPTS {
            match sink.deliver(&notification.text, notification.jpeg.as_deref()).await {
                Ok(()) => {
                    event!("Notification delivered: {}", notification.text);
                    return;
                }
                Err(e) if e.is_transient() && attempt < Self::MAX_DELIVERY_ATTEMPTS => {
                    warn!("Notification attempt {attempt} failed transiently: {e}");
                }
                Err(e) => {
                    error!("Notification given up: {e}");
                    return;
                }
            }
        }
    }
}
