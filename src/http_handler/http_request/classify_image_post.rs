use super::request_common::{HTTPRequestMethod, HTTPRequestType, JSONBodyHTTPRequestType};
use crate::http_handler::http_response::classify_image::ClassifyImageResponse;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};

#[derive(serde::Serialize, Debug)]
pub struct ClassifyImageBody {
    image_base64: String,
}

/// POST of one base64-encoded JPEG to the prey-classifier endpoint.
#[derive(Debug)]
pub struct ClassifyImageRequest {
    body: ClassifyImageBody,
    bearer: String,
}

impl ClassifyImageRequest {
    pub fn new(jpeg: &[u8], api_key: &str) -> Self {
        Self {
            body: ClassifyImageBody { image_base64: BASE64.encode(jpeg) },
            bearer: format!("Bearer {api_key}"),
        }
    }
}

impl JSONBodyHTTPRequestType for ClassifyImageRequest {
    type Body = ClassifyImageBody;
    fn body(&self) -> &Self::Body {
        &self.body
    }
}

impl HTTPRequestType for ClassifyImageRequest {
    type Response = ClassifyImageResponse;
    fn endpoint(&self) -> &str {
        ""
    }
    fn request_method(&self) -> HTTPRequestMethod {
        HTTPRequestMethod::Post
    }
    fn header_params(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&self.bearer) {
            headers.insert(AUTHORIZATION, value);
        }
        headers
    }
}
