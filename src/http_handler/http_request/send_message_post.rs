use super::request_common::{HTTPRequestMethod, HTTPRequestType, JSONBodyHTTPRequestType};
use crate::http_handler::http_response::bot_message::BotMessageResponse;

#[derive(serde::Serialize, Debug)]
pub struct SendMessageBody {
    chat_id: i64,
    text: String,
}

#[derive(Debug)]
pub struct SendMessageRequest {
    body: SendMessageBody,
}

impl SendMessageRequest {
    pub fn new(chat_id: i64, text: &str) -> Self {
        Self { body: SendMessageBody { chat_id, text: text.to_string() } }
    }
}

impl JSONBodyHTTPRequestType for SendMessageRequest {
    type Body = SendMessageBody;
    fn body(&self) -> &Self::Body {
        &self.body
    }
}

impl HTTPRequestType for SendMessageRequest {
    type Response = BotMessageResponse;
    fn endpoint(&self) -> &'static str {
        "/sendMessage"
    }
    fn request_method(&self) -> HTTPRequestMethod {
        HTTPRequestMethod::Post
    }
}
