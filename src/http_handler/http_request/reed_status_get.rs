use super::request_common::{HTTPRequestMethod, HTTPRequestType, NoBodyHTTPRequestType};
use crate::http_handler::http_response::reed_status::ReedStatusResponse;

#[derive(Debug)]
pub struct ReedStatusRequest {}

impl NoBodyHTTPRequestType for ReedStatusRequest {}

impl HTTPRequestType for ReedStatusRequest {
    type Response = ReedStatusResponse;
    fn endpoint(&self) -> &'static str {
        "/reed/status"
    }
    fn request_method(&self) -> HTTPRequestMethod {
        HTTPRequestMethod::Get
    }
}
