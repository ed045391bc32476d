use super::response_common::{HTTPResponseType, JSONBodyHTTPResponseType, ResponseError};

#[derive(serde::Deserialize, Debug)]
pub struct ReedLastResponse {
    /// Formatted as `YYYY-MM-DD HH:MM:SS`; absent when no flap event was
    /// logged yet.
    timestamp: Option<String>,
}

impl ReedLastResponse {
    pub fn timestamp(&self) -> Option<&str> {
        self.timestamp.as_deref()
    }
}

impl JSONBodyHTTPResponseType for ReedLastResponse {}

impl HTTPResponseType for ReedLastResponse {
    type ParsedResponseType = Self;

    async fn read_response(
        response: reqwest::Response,
    ) -> Result<Self::ParsedResponseType, ResponseError> {
        let response = Self::unwrap_return_code(response).await?;
        Self::parse_json_body(response).await
    }
}
