use super::request_common::{HTTPRequestMethod, HTTPRequestType, NoBodyHTTPRequestType};
use crate::http_handler::http_response::reed_last::ReedLastResponse;

#[derive(Debug)]
pub struct ReedLastRequest {}

impl NoBodyHTTPRequestType for ReedLastRequest {}

impl HTTPRequestType for ReedLastRequest {
    type Response = ReedLastResponse;
    fn endpoint(&self) -> &'static str {
        "/logs/reed/last"
    }
    fn request_method(&self) -> HTTPRequestMethod {
        HTTPRequestMethod::Get
    }
}
