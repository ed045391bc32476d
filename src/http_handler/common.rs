use super::http_request::request_common::RequestError;
use super::http_response::response_common::ResponseError;
use strum_macros::Display;

/// Traffic-light mode of the flap actuator daemon.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum FlapMode {
    #[strum(serialize = "red")]
    Red,
    #[strum(serialize = "yellow")]
    Yellow,
    #[strum(serialize = "green")]
    Green,
}

/// Reed-sensor contact state as reported by the actuator daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
pub enum ReedState {
    #[serde(rename = "OPEN")]
    Open,
    #[serde(rename = "CLOSED")]
    Closed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug)]
pub enum HTTPError {
    HTTPRequestError(RequestError),
    HTTPResponseError(ResponseError),
}

impl std::fmt::Display for HTTPError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HTTPError::HTTPRequestError(e) => write!(f, "{e}"),
            HTTPError::HTTPResponseError(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for HTTPError {}

impl HTTPError {
    /// Transient errors are worth an immediate retry at the call site.
    pub fn is_transient(&self) -> bool {
        match self {
            HTTPError::HTTPResponseError(e) => {
                matches!(e, ResponseError::Timeout | ResponseError::NoConnection)
            }
            HTTPError::HTTPRequestError(_) => false,
        }
    }
}

impl From<RequestError> for HTTPError {
    fn from(value: RequestError) -> Self {
        HTTPError::HTTPRequestError(value)
    }
}

impl From<ResponseError> for HTTPError {
    fn from(value: ResponseError) -> Self {
        HTTPError::HTTPResponseError(value)
    }
}
