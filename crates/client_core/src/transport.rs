//! HTTP binding for the generation and print endpoints.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use shared::{
    error::{ApiError, ErrorCode},
    protocol::{GenerateRequest, GenerateResponse, HealthResponse, PrintRequest},
};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{GenerationClient, PrintClient};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("{operation} failed with status {status}: {detail}")]
    Status {
        operation: &'static str,
        status: u16,
        code: ErrorCode,
        detail: String,
    },
    #[error("generation response did not include an image url")]
    EmptyImageUrl,
    #[error("invalid image url '{0}'")]
    InvalidImageUrl(String),
}

/// Client for the studio backend; one base endpoint serves both generation and printing.
#[derive(Debug, Clone)]
pub struct HttpStudioClient {
    http: Client,
    base_url: Url,
}

impl HttpStudioClient {
    pub fn new(endpoint: &str) -> Result<Self> {
        Self::with_timeout(endpoint, None)
    }

    pub fn with_timeout(endpoint: &str, timeout: Option<Duration>) -> Result<Self> {
        let base_url = parse_endpoint(endpoint)?;
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("failed to build http client")?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("failed to build url for '{path}'"))
    }

    /// Makes backend-relative image paths (`/static/x.png`) absolute.
    pub fn resolve_image_url(&self, raw: &str) -> Result<String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(TransportError::EmptyImageUrl.into());
        }
        match Url::parse(raw) {
            Ok(absolute) => Ok(absolute.to_string()),
            Err(url::ParseError::RelativeUrlWithoutBase) => self
                .base_url
                .join(raw)
                .map(|joined| joined.to_string())
                .map_err(|_| TransportError::InvalidImageUrl(raw.to_string()).into()),
            Err(_) => Err(TransportError::InvalidImageUrl(raw.to_string()).into()),
        }
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        let res = self.http.get(self.endpoint("health")?).send().await?;
        let res = ensure_success("health", res).await?;
        Ok(res.json().await?)
    }
}

#[async_trait]
impl GenerationClient for HttpStudioClient {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse> {
        debug!(style = request.style.as_str(), "generate: sending prompt");
        let res = self
            .http
            .post(self.endpoint("generate")?)
            .json(&request)
            .send()
            .await?;
        let res = ensure_success("generate", res).await?;
        let mut body: GenerateResponse = res.json().await?;
        body.image_url = self.resolve_image_url(&body.image_url)?;
        info!(image_url = %body.image_url, "generate: image ready");
        Ok(body)
    }
}

#[async_trait]
impl PrintClient for HttpStudioClient {
    async fn submit_print(&self, request: PrintRequest) -> Result<()> {
        let res = self
            .http
            .post(self.endpoint("print")?)
            .json(&request)
            .send()
            .await?;
        ensure_success("print", res).await?;
        info!(image = %request.image_reference, "print: job accepted");
        Ok(())
    }
}

async fn ensure_success(operation: &'static str, res: Response) -> Result<Response> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res.text().await.unwrap_or_default();
    let api_error = ApiError::from_response(status.as_u16(), &body);
    Err(TransportError::Status {
        operation,
        status: status.as_u16(),
        code: api_error.code,
        detail: api_error.message,
    }
    .into())
}

fn parse_endpoint(endpoint: &str) -> Result<Url> {
    let invalid = |reason: String| TransportError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason,
    };

    let mut url = Url::parse(endpoint.trim()).map_err(|err| invalid(err.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())).into());
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
