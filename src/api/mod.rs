//! Backend API client.
//!
//! Owns transport details only: URL building, bearer authentication, status
//! mapping and JSON decoding of the keyed response envelopes.

use reqwest::{header, Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::{ApiFailure, ErrorBody};

/// HTTP client bound to one backend base URL.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Build a client for `base_url` (no trailing slash expected).
    pub fn new(base_url: &str) -> Result<Self, reqwest::Error> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str, token: Option<&str>) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// GET a JSON payload.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        token: Option<&str>,
    ) -> Result<T, ApiFailure> {
        let response = execute(self.request(Method::GET, path, token)).await?;
        decode(response).await
    }

    /// POST a JSON body and decode the JSON answer.
    pub async fn post<B, T>(&self, path: &str, token: Option<&str>, body: &B) -> Result<T, ApiFailure>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = execute(self.request(Method::POST, path, token).json(body)).await?;
        decode(response).await
    }

    /// PUT a JSON body and decode the JSON answer.
    pub async fn put<B, T>(&self, path: &str, token: Option<&str>, body: &B) -> Result<T, ApiFailure>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = execute(self.request(Method::PUT, path, token).json(body)).await?;
        decode(response).await
    }

    /// Send a request whose answer body is ignored.
    pub async fn send_unit<B>(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<&B>,
    ) -> Result<(), ApiFailure>
    where
        B: Serialize + ?Sized,
    {
        let mut builder = self.request(method, path, token);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        execute(builder).await?;
        Ok(())
    }

    /// GET a binary document such as an invoice PDF.
    pub async fn get_bytes(
        &self,
        path: &str,
        token: Option<&str>,
        accept: &str,
    ) -> Result<Vec<u8>, ApiFailure> {
        let builder = self
            .request(Method::GET, path, token)
            .header(header::ACCEPT, accept);
        let response = execute(builder).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

async fn execute(builder: RequestBuilder) -> Result<Response, ApiFailure> {
    let response = builder.send().await.map_err(|e| {
        tracing::warn!("Request failed before a response: {}", e);
        ApiFailure::Transport(e.to_string())
    })?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    // Error bodies are best effort; an unreadable one still carries the status.
    let body = match response.text().await {
        Ok(text) => serde_json::from_str::<ErrorBody>(&text).unwrap_or_default(),
        Err(_) => ErrorBody::default(),
    };
    tracing::debug!("Backend answered {} ({:?})", status, body.code);
    Err(ApiFailure::Status { status, body })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiFailure> {
    let text = response.text().await?;
    Ok(serde_json::from_str(&text)?)
}
