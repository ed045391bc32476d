use crate::http_handler::HTTPError;
use crate::http_handler::http_client::HTTPClient;
use crate::http_handler::http_response::response_common::HTTPResponseType;
use reqwest::header::HeaderMap;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
pub enum HTTPRequestMethod {
    Get,
    Post,
    Put,
    Delete,
}

#[derive(Debug)]
pub enum RequestError {
    /// A request body part could not be assembled.
    InvalidBody(String),
    /// The request never left the client.
    FailedDispatch(reqwest::Error),
}

impl std::fmt::Display for RequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestError::InvalidBody(msg) => write!(f, "invalid request body: {msg}"),
            RequestError::FailedDispatch(e) => write!(f, "request dispatch failed: {e}"),
        }
    }
}

impl std::error::Error for RequestError {}

impl From<reqwest::Error> for RequestError {
    fn from(value: reqwest::Error) -> Self {
        RequestError::FailedDispatch(value)
    }
}

pub(crate) trait HTTPRequestType {
    type Response: HTTPResponseType;
    fn endpoint(&self) -> &str;
    fn request_method(&self) -> HTTPRequestMethod;
    fn query_params(&self) -> HashMap<&str, String> {
        HashMap::new()
    }
    fn header_params(&self) -> HeaderMap {
        HeaderMap::new()
    }

    fn build_request(&self, client: &HTTPClient) -> reqwest::RequestBuilder {
        let url = format!("{}{}", client.url(), self.endpoint());
        let builder = match self.request_method() {
            HTTPRequestMethod::Get => client.client().get(url),
            HTTPRequestMethod::Post => client.client().post(url),
            HTTPRequestMethod::Put => client.client().put(url),
            HTTPRequestMethod::Delete => client.client().delete(url),
        };
        builder.query(&self.query_params()).headers(self.header_params())
    }
}

pub(crate) trait NoBodyHTTPRequestType: HTTPRequestType {
    async fn send_request(
        &self,
        client: &HTTPClient,
    ) -> Result<<Self::Response as HTTPResponseType>::ParsedResponseType, HTTPError> {
        let response = self.build_request(client).send().await;
        Self::Response::from_response(response).await
    }
}

pub(crate) trait JSONBodyHTTPRequestType: HTTPRequestType {
    type Body: serde::Serialize;
    fn body(&self) -> &Self::Body;

    async fn send_request(
        &self,
        client: &HTTPClient,
    ) -> Result<<Self::Response as HTTPResponseType>::ParsedResponseType, HTTPError> {
        let response = self.build_request(client).json(self.body()).send().await;
        Self::Response::from_response(response).await
    }
}

pub(crate) trait MultipartBodyHTTPRequestType: HTTPRequestType {
    async fn body(&self) -> Result<reqwest::multipart::Form, RequestError>;

    async fn send_request(
        &self,
        client: &HTTPClient,
    ) -> Result<<Self::Response as HTTPResponseType>::ParsedResponseType, HTTPError> {
        let form = self.body().await?;
        let response = self.build_request(client).multipart(form).send().await;
        Self::Response::from_response(response).await
    }
}
