use super::request_common::{HTTPRequestMethod, HTTPRequestType, NoBodyHTTPRequestType};
use crate::http_handler::FlapMode;
use crate::http_handler::http_response::flap_mode::FlapModeResponse;

#[derive(Debug)]
pub struct FlapModeRequest {
    endpoint: String,
}

impl FlapModeRequest {
    pub fn new(mode: FlapMode) -> Self {
        Self { endpoint: format!("/mode/{mode}") }
    }
}

impl NoBodyHTTPRequestType for FlapModeRequest {}

impl HTTPRequestType for FlapModeRequest {
    type Response = FlapModeResponse;
    fn endpoint(&self) -> &str {
        &self.endpoint
    }
    fn request_method(&self) -> HTTPRequestMethod {
        HTTPRequestMethod::Get
    }
}
