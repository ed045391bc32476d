use super::response_common::{HTTPResponseType, JSONBodyHTTPResponseType, ResponseError};

/// Shared acknowledgement shape of the bot API send endpoints.
#[derive(serde::Deserialize, Debug)]
pub struct BotMessageResponse {
    ok: bool,
}

impl BotMessageResponse {
    pub fn ok(&self) -> bool {
        self.ok
    }
}

impl JSONBodyHTTPResponseType for BotMessageResponse {}

impl HTTPResponseType for BotMessageResponse {
    type ParsedResponseType = Self;

    async fn read_response(
        response: reqwest::Response,
    ) -> Result<Self::ParsedResponseType, ResponseError> {
        let response = Self::unwrap_return_code(response).await?;
        Self::parse_json_body(response).await
    }
}
