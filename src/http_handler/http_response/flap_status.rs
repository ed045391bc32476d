use super::response_common::{HTTPResponseType, PlainTextHTTPResponseType, ResponseError};

#[derive(Debug)]
pub struct FlapStatusResponse;

impl PlainTextHTTPResponseType for FlapStatusResponse {}

impl HTTPResponseType for FlapStatusResponse {
    type ParsedResponseType = String;

    async fn read_response(
        response: reqwest::Response,
    ) -> Result<Self::ParsedResponseType, ResponseError> {
        let response = Self::unwrap_return_code(response).await?;
        Self::parse_text_body(response).await
    }
}
