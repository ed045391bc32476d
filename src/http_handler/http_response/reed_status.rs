use super::response_common::{HTTPResponseType, JSONBodyHTTPResponseType, ResponseError};
use crate::http_handler::ReedState;

#[derive(serde::Deserialize, Debug)]
pub struct ReedStatusResponse {
    reed_status: ReedState,
}

impl ReedStatusResponse {
    pub fn reed_status(&self) -> ReedState {
        self.reed_status
    }
}

impl JSONBodyHTTPResponseType for ReedStatusResponse {}

impl HTTPResponseType for ReedStatusResponse {
    type ParsedResponseType = Self;

    async fn read_response(
        response: reqwest::Response,
    ) -> Result<Self::ParsedResponseType, ResponseError> {
        let response = Self::unwrap_return_code(response).await?;
        Self::parse_json_body(response).await
    }
}
