use super::response_common::{HTTPResponseType, JSONBodyHTTPResponseType, ResponseError};

#[derive(serde::Deserialize, Debug)]
pub struct ClassifyImageResponse {
    #[serde(default)]
    detected: bool,
}

impl ClassifyImageResponse {
    pub fn detected(&self) -> bool {
        self.detected
    }
}

impl JSONBodyHTTPResponseType for ClassifyImageResponse {}

impl HTTPResponseType for ClassifyImageResponse {
    type ParsedResponseType = Self;

    async fn read_response(
        response: reqwest::Response,
    ) -> Result<Self::ParsedResponseType, ResponseError> {
        let response = Self::unwrap_return_code(response).await?;
        Self::parse_json_body(response).await
    }
}
