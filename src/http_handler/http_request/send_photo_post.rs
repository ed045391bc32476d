use super::request_common::{
    HTTPRequestMethod, HTTPRequestType, MultipartBodyHTTPRequestType, RequestError,
};
use crate::http_handler::http_response::bot_message::BotMessageResponse;

#[derive(Debug)]
pub struct SendPhotoRequest {
    chat_id: i64,
    caption: String,
    jpeg: Vec<u8>,
}

impl SendPhotoRequest {
    pub fn new(chat_id: i64, caption: &str, jpeg: Vec<u8>) -> Self {
        Self { chat_id, caption: caption.to_string(), jpeg }
    }
}

impl MultipartBodyHTTPRequestType for SendPhotoRequest {
    async fn body(&self) -> Result<reqwest::multipart::Form, RequestError> {
        let photo_part = reqwest::multipart::Part::bytes(self.jpeg.clone())
            .file_name("detection.jpg")
            .mime_str("image/jpeg")
            .map_err(|e| RequestError::InvalidBody(e.to_string()))?;
        Ok(reqwest::multipart::Form::new()
            .text("chat_id", self.chat_id.to_string())
            .text("caption", self.caption.clone())
            .part("photo", photo_part))
    }
}

impl HTTPRequestType for SendPhotoRequest {
    type Response = BotMessageResponse;
    fn endpoint(&self) -> &'static str {
        "/sendPhoto"
    }
    fn request_method(&self) -> HTTPRequestMethod {
        HTTPRequestMethod::Post
    }
}
