use super::request_common::{HTTPRequestMethod, HTTPRequestType, NoBodyHTTPRequestType};
use crate::http_handler::http_response::flap_status::FlapStatusResponse;

#[derive(Debug)]
pub struct FlapStatusRequest {}

impl NoBodyHTTPRequestType for FlapStatusRequest {}

impl HTTPRequestType for FlapStatusRequest {
    type Response = FlapStatusResponse;
    fn endpoint(&self) -> &'static str {
        "/status"
    }
    fn request_method(&self) -> HTTPRequestMethod {
        HTTPRequestMethod::Get
    }
}
