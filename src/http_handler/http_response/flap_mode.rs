use super::response_common::{HTTPResponseType, PlainTextHTTPResponseType, ResponseError};

#[derive(Debug)]
pub struct FlapModeResponse;

impl PlainTextHTTPResponseType for FlapModeResponse {}

impl HTTPResponseType for FlapModeResponse {
    type ParsedResponseType = String;

    async fn read_response(
        response: reqwest::Response,
    ) -> Result<Self::ParsedResponseType, ResponseError> {
        let response = Self::unwrap_return_code(response).await?;
        Self::parse_text_body(response).await
    }
}
