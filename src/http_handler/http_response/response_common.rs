use crate::http_handler::HTTPError;

pub(crate) trait JSONBodyHTTPResponseType: HTTPResponseType {
    async fn parse_json_body(
        response: reqwest::Response,
    ) -> Result<Self::ParsedResponseType, ResponseError>
    where
        Self::ParsedResponseType: for<'de> serde::Deserialize<'de>,
    {
        Ok(response.json::<Self::ParsedResponseType>().await?)
    }
}

/// Endpoints that answer with a bare text body (the actuator daemon does).
pub(crate) trait PlainTextHTTPResponseType: HTTPResponseType {
    async fn parse_text_body(response: reqwest::Response) -> Result<String, ResponseError> {
        Ok(response.text().await?)
    }
}

pub(crate) trait HTTPResponseType {
    type ParsedResponseType;

    async fn read_response(
        response: reqwest::Response,
    ) -> Result<Self::ParsedResponseType, ResponseError>;

    async fn from_response(
        response: Result<reqwest::Response, reqwest::Error>,
    ) -> Result<Self::ParsedResponseType, HTTPError> {
        let response = response.map_err(ResponseError::from)?;
        Ok(Self::read_response(response).await?)
    }

    async fn unwrap_return_code(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ResponseError> {
        if response.status().is_success() {
            Ok(response)
        } else if response.status().is_server_error() {
            Err(ResponseError::InternalServerError)
        } else if response.status().is_client_error() {
            Err(ResponseError::BadRequest(response.status().to_string()))
        } else {
            Err(ResponseError::UnknownError)
        }
    }
}

#[derive(Debug)]
pub enum ResponseError {
    InternalServerError,
    BadRequest(String),
    Malformed(String),
    NoConnection,
    Timeout,
    UnknownError,
}

impl std::fmt::Display for ResponseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseError::InternalServerError => write!(f, "internal server error"),
            ResponseError::BadRequest(msg) => write!(f, "bad request: {msg}"),
            ResponseError::Malformed(msg) => write!(f, "malformed response: {msg}"),
            ResponseError::NoConnection => write!(f, "no connection"),
            ResponseError::Timeout => write!(f, "timeout"),
            ResponseError::UnknownError => write!(f, "unknown error"),
        }
    }
}

impl std::error::Error for ResponseError {}

impl From<reqwest::Error> for ResponseError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            ResponseError::Timeout
        } else if value.is_connect() {
            ResponseError::NoConnection
        } else if value.is_decode() {
            ResponseError::Malformed(value.to_string())
        } else if value.is_request() || value.is_redirect() {
            ResponseError::BadRequest(value.to_string())
        } else {
            ResponseError::UnknownError
        }
    }
}
