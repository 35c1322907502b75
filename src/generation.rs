//! Generation controller: the state the display layer renders.
//!
//! Runs one invocation at a time against a [`Transport`]. While a request is
//! in flight every other request is refused with [`GenerationError::Busy`];
//! together with the per-call event channel this means events from two
//! requests can never mix.
//!
//! The exposed view is: the accumulated response text (append-only within a
//! session), the metrics of the last completed session (TTFT is visible as
//! soon as the first content token arrives), the current error (hidden once
//! older than the dismiss window) and the busy flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::mpsc;

use crate::endpoints::Endpoint;
use crate::history::{HistoryEntry, HistoryStore};
use crate::inference::types::Role;
use crate::inference::{GenerationRequest, GenerationResponse, InferenceError, TokenEvent, Transport};
use crate::telemetry::{unary_metrics, PerformanceMetrics, StreamSession};

#[derive(Debug, Error)]
pub enum GenerationError {
    /// Another request is still in flight.
    #[error("a request is already in progress")]
    Busy,

    #[error(transparent)]
    Inference(#[from] InferenceError),
}

/// Result of a successful invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutcome {
    pub text: String,
    pub metrics: PerformanceMetrics,
    /// The full unary response; `None` for streamed calls.
    pub response: Option<GenerationResponse>,
}

/// Point-in-time copy of everything the display layer shows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GenerationView {
    pub text: String,
    pub reasoning: String,
    pub metrics: Option<PerformanceMetrics>,
    pub live_ttft_ms: Option<f64>,
    pub error: Option<String>,
    pub busy: bool,
    pub response: Option<GenerationResponse>,
}

#[derive(Debug)]
struct SurfacedError {
    message: String,
    raised_at: Instant,
}

#[derive(Debug, Default)]
struct ViewState {
    text: String,
    reasoning: String,
    metrics: Option<PerformanceMetrics>,
    live_ttft_ms: Option<f64>,
    error: Option<SurfacedError>,
    response: Option<GenerationResponse>,
}

impl ViewState {
    fn reset(&mut self) {
        *self = ViewState::default();
    }
}

/// Clears the busy flag when the invocation ends, however it ends.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ─── Controller ──────────────────────────────────────────────────────────────

pub struct GenerationController {
    transport: Arc<dyn Transport>,
    state: Mutex<ViewState>,
    busy: AtomicBool,
    error_dismiss: Duration,
    history: Option<(Arc<Mutex<HistoryStore>>, usize)>,
}

impl GenerationController {
    pub fn new(transport: Arc<dyn Transport>, error_dismiss: Duration) -> Self {
        Self {
            transport,
            state: Mutex::new(ViewState::default()),
            busy: AtomicBool::new(false),
            error_dismiss,
            history: None,
        }
    }

    /// Record every completed invocation, keeping the newest `limit`.
    pub fn with_history(mut self, store: Arc<Mutex<HistoryStore>>, limit: usize) -> Self {
        self.history = Some((store, limit));
        self
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    fn state(&self) -> MutexGuard<'_, ViewState> {
        // A panic while holding the lock leaves plain data behind; keep going.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ─── Produced interface ──────────────────────────────────────────────

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn response_text(&self) -> String {
        self.state().text.clone()
    }

    pub fn metrics(&self) -> Option<PerformanceMetrics> {
        self.state().metrics
    }

    /// The current error, if raised less than the dismiss window ago.
    pub fn error(&self) -> Option<String> {
        self.error_at(Instant::now())
    }

    /// [`error`](Self::error) evaluated at `now`.
    pub fn error_at(&self, now: Instant) -> Option<String> {
        let state = self.state();
        state
            .error
            .as_ref()
            .filter(|e| now.saturating_duration_since(e.raised_at) < self.error_dismiss)
            .map(|e| e.message.clone())
    }

    pub fn snapshot(&self) -> GenerationView {
        let error = self.error();
        let state = self.state();
        GenerationView {
            text: state.text.clone(),
            reasoning: state.reasoning.clone(),
            metrics: state.metrics,
            live_ttft_ms: state.live_ttft_ms,
            error,
            busy: self.is_busy(),
            response: state.response.clone(),
        }
    }

    pub fn dismiss_error(&self) {
        self.state().error = None;
    }

    /// Reset text, metrics and error. Does not stop an in-flight call.
    pub fn clear_response(&self) {
        self.state().reset();
    }

    // ─── Invocation ──────────────────────────────────────────────────────

    /// Run one request, streamed or unary per `request.stream`.
    pub async fn run(
        &self,
        endpoint: &Endpoint,
        request: GenerationRequest,
    ) -> Result<GenerationOutcome, GenerationError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!(model = %request.model, "request refused: another request is in flight");
            return Err(GenerationError::Busy);
        }
        let _busy = BusyGuard(&self.busy);

        self.state().reset();

        let result = if request.stream {
            self.run_streaming(endpoint, &request).await
        } else {
            self.run_unary(endpoint, &request).await
        };

        match &result {
            Ok(outcome) => self.record_history(endpoint, &request, outcome).await,
            Err(e) => {
                tracing::warn!(model = %request.model, error = %e, "generation failed");
                self.state().error = Some(SurfacedError {
                    message: e.to_string(),
                    raised_at: Instant::now(),
                });
            }
        }

        result.map_err(GenerationError::from)
    }

    async fn run_streaming(
        &self,
        endpoint: &Endpoint,
        request: &GenerationRequest,
    ) -> Result<GenerationOutcome, InferenceError> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut session = StreamSession::dispatch(Instant::now());

        let call = self.transport.streaming_call(endpoint, request, tx);
        let consume = async {
            // Ends once the call settles and drops the sender.
            while let Some(event) = rx.recv().await {
                match event {
                    TokenEvent::Token { text, at } => {
                        session.record_token(&text, at);
                        let mut state = self.state();
                        state.text.push_str(&text);
                        if state.live_ttft_ms.is_none() {
                            state.live_ttft_ms = session.ttft_ms();
                        }
                    }
                    TokenEvent::Reasoning { text, .. } => {
                        session.record_reasoning(&text);
                        self.state().reasoning.push_str(&text);
                    }
                }
            }
        };

        let (result, ()) = tokio::join!(call, consume);
        let settled_at = Instant::now();

        match result {
            Ok(_) => {
                let done = session.complete(settled_at);
                self.state().metrics = Some(done.metrics);
                tracing::info!(
                    tokens = done.metrics.total_tokens,
                    ttft_ms = done.metrics.ttft_ms,
                    total_latency_ms = done.metrics.total_latency_ms,
                    "stream session completed"
                );
                Ok(GenerationOutcome {
                    text: done.text,
                    metrics: done.metrics,
                    response: None,
                })
            }
            Err(e) => {
                // Partial text stays in the view.
                let partial = session.fail();
                tracing::debug!(partial_len = partial.len(), "stream session failed");
                Err(e)
            }
        }
    }

    async fn run_unary(
        &self,
        endpoint: &Endpoint,
        request: &GenerationRequest,
    ) -> Result<GenerationOutcome, InferenceError> {
        let dispatched_at = Instant::now();
        let response = self.transport.unary_call(endpoint, request).await?;
        let metrics = unary_metrics(dispatched_at, Instant::now(), response.usage.as_ref());

        {
            let mut state = self.state();
            state.text = response.content.clone();
            state.reasoning = response.reasoning_content.clone().unwrap_or_default();
            state.metrics = Some(metrics);
            state.live_ttft_ms = Some(metrics.ttft_ms);
            state.response = Some(response.clone());
        }

        Ok(GenerationOutcome {
            text: response.content.clone(),
            metrics,
            response: Some(response),
        })
    }

    /// Write the entry on the blocking pool; SQLite calls must not stall the runtime.
    async fn record_history(
        &self,
        endpoint: &Endpoint,
        request: &GenerationRequest,
        outcome: &GenerationOutcome,
    ) {
        let Some((store, limit)) = &self.history else {
            return;
        };
        let prompt = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let entry = HistoryEntry::new(
            endpoint.name.clone(),
            request.model.clone(),
            prompt,
            outcome.text.clone(),
            outcome.metrics,
            request.stream,
        );

        let store = Arc::clone(store);
        let limit = *limit;
        let written = tokio::task::spawn_blocking(move || {
            let store = store.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            store.record(&entry).and_then(|()| store.prune(limit))
        })
        .await;

        match written {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "failed to record history entry"),
            Err(e) => tracing::warn!(error = %e, "history writer task failed"),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::types::{Message, UsageMetrics};
    use async_trait::async_trait;
    use tokio::sync::mpsc::UnboundedSender;
    use tokio::sync::Notify;

    /// Replays a fixed token script, then settles with `failure` if set.
    struct ScriptedTransport {
        tokens: Vec<&'static str>,
        reasoning: Vec<&'static str>,
        failure: Option<fn() -> InferenceError>,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedTransport {
        fn tokens(tokens: Vec<&'static str>) -> Self {
            Self {
                tokens,
                reasoning: Vec::new(),
                failure: None,
                gate: None,
            }
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn unary_call(
            &self,
            _endpoint: &Endpoint,
            request: &GenerationRequest,
        ) -> Result<GenerationResponse, InferenceError> {
            if let Some(failure) = self.failure {
                return Err(failure());
            }
            Ok(GenerationResponse {
                content: self.tokens.concat(),
                usage: Some(UsageMetrics {
                    prompt_tokens: 4,
                    completion_tokens: 7,
                    total_tokens: 11,
                    reasoning_tokens: None,
                }),
                finish_reason: "stop".to_string(),
                reasoning_content: None,
                thinking_blocks: None,
                reasoning_provider: crate::inference::detect_provider(&request.model),
            })
        }

        async fn streaming_call(
            &self,
            _endpoint: &Endpoint,
            _request: &GenerationRequest,
            events: UnboundedSender<TokenEvent>,
        ) -> Result<String, InferenceError> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            for r in &self.reasoning {
                let _ = events.send(TokenEvent::reasoning(*r));
            }
            for t in &self.tokens {
                let _ = events.send(TokenEvent::token(*t));
            }
            match self.failure {
                Some(failure) => Err(failure()),
                None => Ok(self.tokens.concat()),
            }
        }

        async fn fetch_available_models(
            &self,
            _endpoint: &Endpoint,
        ) -> Result<Vec<String>, InferenceError> {
            Ok(Vec::new())
        }

        async fn test_connection(&self, _endpoint: &Endpoint) -> Result<String, InferenceError> {
            Ok("ok".to_string())
        }
    }

    fn endpoint() -> Endpoint {
        let mut ep = Endpoint::new("Local", "http://localhost:8000/v1", "gpt-4");
        ep.id = "ep".to_string();
        ep
    }

    fn request(stream: bool) -> GenerationRequest {
        GenerationRequest::new("gpt-4", vec![Message::system("s"), Message::user("hello")])
            .with_stream(stream)
    }

    fn controller(transport: ScriptedTransport) -> GenerationController {
        GenerationController::new(Arc::new(transport), Duration::from_secs(5))
    }

    fn stream_error() -> InferenceError {
        InferenceError::StreamError {
            reason: "connection reset".to_string(),
        }
    }

    #[tokio::test]
    async fn test_streaming_accumulates_text_and_metrics() {
        let ctl = controller(ScriptedTransport::tokens(vec!["", "Hello", " world"]));
        let outcome = ctl.run(&endpoint(), request(true)).await.unwrap();

        assert_eq!(outcome.text, "Hello world");
        assert_eq!(outcome.metrics.total_tokens, 3);
        assert!(outcome.metrics.avg_tpot_ms.is_some());
        assert!(outcome.response.is_none());

        let view = ctl.snapshot();
        assert_eq!(view.text, "Hello world");
        assert_eq!(view.metrics, Some(outcome.metrics));
        assert!(view.live_ttft_ms.is_some());
        assert!(view.error.is_none());
        assert!(!view.busy);
    }

    #[tokio::test]
    async fn test_streaming_reasoning_kept_apart() {
        let mut transport = ScriptedTransport::tokens(vec!["42"]);
        transport.reasoning = vec!["let me ", "think"];
        let ctl = controller(transport);
        let outcome = ctl.run(&endpoint(), request(true)).await.unwrap();

        assert_eq!(outcome.text, "42");
        assert_eq!(outcome.metrics.total_tokens, 1);
        assert_eq!(ctl.snapshot().reasoning, "let me think");
    }

    #[tokio::test]
    async fn test_stream_failure_keeps_partial_text() {
        let mut transport = ScriptedTransport::tokens(vec!["partial", " output"]);
        transport.failure = Some(stream_error);
        let ctl = controller(transport);

        let err = ctl.run(&endpoint(), request(true)).await.unwrap_err();
        assert!(matches!(err, GenerationError::Inference(InferenceError::StreamError { .. })));

        let view = ctl.snapshot();
        assert_eq!(view.text, "partial output");
        assert!(view.metrics.is_none());
        assert_eq!(view.error.as_deref(), Some("stream error: connection reset"));
        assert!(!view.busy);
    }

    #[tokio::test]
    async fn test_unary_metrics_use_reported_tokens() {
        let ctl = controller(ScriptedTransport::tokens(vec!["Hi", "!"]));
        let outcome = ctl.run(&endpoint(), request(false)).await.unwrap();

        assert_eq!(outcome.text, "Hi!");
        assert_eq!(outcome.metrics.total_tokens, 7);
        assert_eq!(outcome.metrics.ttft_ms, outcome.metrics.total_latency_ms);
        assert!(outcome.metrics.tokens_per_second.is_none());
        assert!(outcome.response.is_some());
        assert_eq!(ctl.response_text(), "Hi!");
    }

    #[tokio::test]
    async fn test_error_auto_dismiss_and_manual_dismiss() {
        let mut transport = ScriptedTransport::tokens(vec![]);
        transport.failure = Some(|| InferenceError::HttpError {
            status: 500,
            body: "boom".to_string(),
        });
        let ctl = controller(transport);
        ctl.run(&endpoint(), request(false)).await.unwrap_err();

        assert_eq!(ctl.error().as_deref(), Some("HTTP 500: boom"));
        let later = Instant::now() + Duration::from_secs(6);
        assert!(ctl.error_at(later).is_none());

        ctl.dismiss_error();
        assert!(ctl.error().is_none());
    }

    #[tokio::test]
    async fn test_clear_response_resets_view() {
        let ctl = controller(ScriptedTransport::tokens(vec!["a"]));
        ctl.run(&endpoint(), request(true)).await.unwrap();
        ctl.clear_response();
        let view = ctl.snapshot();
        assert!(view.text.is_empty());
        assert!(view.metrics.is_none());
        assert!(view.live_ttft_ms.is_none());
    }

    #[tokio::test]
    async fn test_next_invocation_overwrites_previous() {
        let ctl = controller(ScriptedTransport::tokens(vec!["same"]));
        ctl.run(&endpoint(), request(true)).await.unwrap();
        ctl.run(&endpoint(), request(true)).await.unwrap();
        assert_eq!(ctl.response_text(), "same");
    }

    #[tokio::test]
    async fn test_second_request_refused_while_busy() {
        let gate = Arc::new(Notify::new());
        let mut transport = ScriptedTransport::tokens(vec!["done"]);
        transport.gate = Some(gate.clone());
        let ctl = Arc::new(controller(transport));

        let first = {
            let ctl = ctl.clone();
            tokio::spawn(async move { ctl.run(&endpoint(), request(true)).await })
        };
        while !ctl.is_busy() {
            tokio::task::yield_now().await;
        }

        let err = ctl.run(&endpoint(), request(true)).await.unwrap_err();
        assert!(matches!(err, GenerationError::Busy));

        gate.notify_one();
        let outcome = first.await.unwrap().unwrap();
        assert_eq!(outcome.text, "done");
        assert!(!ctl.is_busy());
    }

    #[tokio::test]
    async fn test_history_recorded_on_success_only() {
        let store = Arc::new(Mutex::new(HistoryStore::open(":memory:").unwrap()));
        let ctl = controller(ScriptedTransport::tokens(vec!["answer"])).with_history(store.clone(), 10);
        ctl.run(&endpoint(), request(true)).await.unwrap();

        let mut failing = ScriptedTransport::tokens(vec!["x"]);
        failing.failure = Some(stream_error);
        let failing_ctl = controller(failing).with_history(store.clone(), 10);
        failing_ctl.run(&endpoint(), request(true)).await.unwrap_err();

        let entries = store.lock().unwrap().list(10).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].prompt, "hello");
        assert_eq!(entries[0].response, "answer");
        assert_eq!(entries[0].endpoint_name, "Local");
        assert!(entries[0].stream);
    }

    #[tokio::test]
    async fn test_history_pruned_to_limit() {
        let store = Arc::new(Mutex::new(HistoryStore::open(":memory:").unwrap()));
        let ctl = controller(ScriptedTransport::tokens(vec!["a"])).with_history(store.clone(), 2);
        for _ in 0..4 {
            ctl.run(&endpoint(), request(true)).await.unwrap();
        }
        assert_eq!(store.lock().unwrap().count().unwrap(), 2);
    }
}
