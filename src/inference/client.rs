//! HTTP transport for OpenAI-compatible chat-completion endpoints.
//!
//! Holds two `reqwest` clients: one with the short request timeout for unary
//! calls, model listing and connection tests, one with the long streaming
//! timeout. Endpoint and generation settings arrive per call; the transport
//! itself carries no per-endpoint state.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client as HttpClient;
use tokio::sync::mpsc::UnboundedSender;

use super::errors::InferenceError;
use super::request::{build_headers, build_outbound, models_url};
use super::response::{parse_completion_response, parse_models_response};
use super::streaming::parse_sse_stream;
use super::transport::{TokenEvent, Transport};
use super::types::{GenerationRequest, GenerationResponse};
use crate::endpoints::Endpoint;

// ─── Timeouts ────────────────────────────────────────────────────────────────

/// Network timeouts for one transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// TCP connect.
    pub connect: Duration,
    /// Whole request, for unary calls and model listing.
    pub request: Duration,
    /// Whole request, for streaming calls. Reasoning models can deliberate
    /// for minutes before the first token.
    pub stream: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            request: Duration::from_secs(120),
            stream: Duration::from_secs(600),
        }
    }
}

// ─── HttpTransport ───────────────────────────────────────────────────────────

/// [`Transport`] over HTTP(S) via `reqwest`.
pub struct HttpTransport {
    /// Client for unary requests.
    http: HttpClient,
    /// Client for streaming requests.
    http_stream: HttpClient,
    timeouts: Timeouts,
}

impl HttpTransport {
    pub fn new(timeouts: Timeouts) -> Result<Self, InferenceError> {
        let build = |timeout: Duration| {
            HttpClient::builder()
                .connect_timeout(timeouts.connect)
                .timeout(timeout)
                .build()
                .map_err(|e| InferenceError::ConnectionFailed {
                    endpoint: String::new(),
                    reason: format!("failed to build HTTP client: {e}"),
                })
        };

        Ok(Self {
            http: build(timeouts.request)?,
            http_stream: build(timeouts.stream)?,
            timeouts,
        })
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    /// Turn a non-success response into an error carrying the body text.
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, InferenceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(status = status.as_u16(), "endpoint returned error status");
        Err(InferenceError::from_status(status.as_u16(), body))
    }

    async fn get_models(&self, endpoint: &Endpoint) -> Result<Vec<String>, InferenceError> {
        let url = models_url(endpoint);
        let response = self
            .http
            .get(&url)
            .headers(build_headers(endpoint)?)
            .send()
            .await
            .map_err(|e| {
                InferenceError::from_send_error(&url, &e, self.timeouts.request.as_secs())
            })?;
        let response = Self::check_status(response).await?;

        let body = response.text().await.map_err(|e| InferenceError::ParseError {
            reason: format!("failed to read response body: {e}"),
        })?;
        parse_models_response(&body)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn unary_call(
        &self,
        endpoint: &Endpoint,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, InferenceError> {
        let outbound = build_outbound(endpoint, request, false)?;

        tracing::info!(
            url = %outbound.url,
            model = %outbound.body.model,
            provider = outbound.provider.map(|p| p.as_str()).unwrap_or("none"),
            message_count = outbound.body.messages.len(),
            mapped = ?outbound.mapped_fields,
            stream = false,
            "LLM request"
        );

        let response = self
            .http
            .post(&outbound.url)
            .headers(outbound.headers)
            .json(&outbound.body)
            .send()
            .await
            .map_err(|e| {
                InferenceError::from_send_error(&outbound.url, &e, self.timeouts.request.as_secs())
            })?;
        let response = Self::check_status(response).await?;

        let body = response.text().await.map_err(|e| InferenceError::ParseError {
            reason: format!("failed to read response body: {e}"),
        })?;
        let parsed = parse_completion_response(&body, outbound.provider)?;

        tracing::info!(
            finish_reason = %parsed.finish_reason,
            content_len = parsed.content.len(),
            has_reasoning = parsed.reasoning_content.is_some() || parsed.thinking_blocks.is_some(),
            "LLM response"
        );
        Ok(parsed)
    }

    async fn streaming_call(
        &self,
        endpoint: &Endpoint,
        request: &GenerationRequest,
        events: UnboundedSender<TokenEvent>,
    ) -> Result<String, InferenceError> {
        let outbound = build_outbound(endpoint, request, true)?;

        tracing::info!(
            url = %outbound.url,
            model = %outbound.body.model,
            provider = outbound.provider.map(|p| p.as_str()).unwrap_or("none"),
            message_count = outbound.body.messages.len(),
            mapped = ?outbound.mapped_fields,
            stream = true,
            "LLM request"
        );

        let response = self
            .http_stream
            .post(&outbound.url)
            .headers(outbound.headers)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&outbound.body)
            .send()
            .await
            .map_err(|e| {
                InferenceError::from_send_error(&outbound.url, &e, self.timeouts.stream.as_secs())
            })?;
        let response = Self::check_status(response).await?;

        let stream = parse_sse_stream(response);
        futures::pin_mut!(stream);

        let mut full_content = String::new();
        let mut token_count = 0usize;
        let mut finish_reason: Option<String> = None;

        while let Some(item) = stream.next().await {
            let chunk = match item {
                Ok(chunk) => chunk,
                Err(e) => {
                    tracing::warn!(tokens = token_count, error = %e, "stream aborted");
                    return Err(e);
                }
            };

            // A closed receiver means the consumer went away; the answer is
            // still accumulated and returned.
            if let Some(reasoning) = chunk.reasoning {
                let _ = events.send(TokenEvent::reasoning(reasoning));
            }
            if let Some(token) = chunk.token {
                full_content.push_str(&token);
                token_count += 1;
                let _ = events.send(TokenEvent::token(token));
            }
            if chunk.finish_reason.is_some() {
                finish_reason = chunk.finish_reason;
            }
        }

        tracing::info!(
            tokens = token_count,
            content_len = full_content.len(),
            finish_reason = finish_reason.as_deref().unwrap_or("none"),
            "stream complete"
        );
        Ok(full_content)
    }

    async fn fetch_available_models(
        &self,
        endpoint: &Endpoint,
    ) -> Result<Vec<String>, InferenceError> {
        let models = self.get_models(endpoint).await?;
        tracing::info!(endpoint = %endpoint.name, count = models.len(), "fetched models");
        Ok(models)
    }

    async fn test_connection(&self, endpoint: &Endpoint) -> Result<String, InferenceError> {
        let start = Instant::now();
        self.get_models(endpoint).await?;
        let elapsed_ms = start.elapsed().as_millis();
        tracing::info!(endpoint = %endpoint.name, elapsed_ms = elapsed_ms as u64, "connection test passed");
        Ok(format!("Connection successful! Response time: {elapsed_ms}ms"))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
