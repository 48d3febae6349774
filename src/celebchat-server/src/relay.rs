//! Streaming chat relay.
//!
//! `POST /chat/{persona_id}/stream` validates the request, commits to a
//! chunked `text/plain` response and hands the rest of the work to a task
//! that resolves the model, builds the prompt, starts the generation and
//! forwards every text fragment to the client as soon as it arrives.
//!
//! Once the response head has been returned the status can no longer change:
//! failures from then on end the body early and are only visible in the logs.

use std::convert::Infallible;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Form, Router,
    body::{Body, Bytes},
    extract::{FromRequest, Path, Query, Request, State},
    http::{StatusCode, header},
    response::Response,
    routing::post,
};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{Instrument, debug, error, info, info_span, trace, warn};

use crate::auth::Identity;
use crate::catalog;
use crate::error::AppError;
use crate::middleware::RequestId;
use crate::ndjson::{LineBuffer, parse_event};
use crate::persona::Persona;
use crate::prompt::{PREVIEW_CHARS, PromptParts, build_prompt, preview};
use crate::state::AppState;

/// Fragments buffered between the relay task and the response body.
const CHANNEL_CAPACITY: usize = 32;

type Chunk = Result<Bytes, Infallible>;

/// Create chat streaming routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/chat/{persona_id}/stream", post(stream_chat))
}

/// Query flags of the stream endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct StreamParams {
    #[serde(default)]
    pub debug: Option<String>,
}

impl StreamParams {
    fn debug_requested(&self) -> bool {
        self.debug.as_deref() == Some("1")
    }
}

#[derive(Debug, Default, Deserialize)]
struct MessageBody {
    #[serde(default)]
    message: Option<String>,
}

/// Read the `message` field from a JSON or URL-encoded body.
///
/// Any body that cannot be read counts as a missing message.
async fn read_message(request: Request, limit: usize) -> Option<String> {
    let is_form = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

    let body = if is_form {
        Form::<MessageBody>::from_request(request, &())
            .await
            .map(|Form(body)| body)
            .ok()?
    } else {
        let bytes = axum::body::to_bytes(request.into_body(), limit).await.ok()?;
        serde_json::from_slice::<MessageBody>(&bytes).ok()?
    };

    body.message
}

/// Stream a persona's answer as plain text.
async fn stream_chat(
    State(state): State<Arc<AppState>>,
    Path(persona_id): Path<String>,
    Query(params): Query<StreamParams>,
    request: Request,
) -> Response {
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .cloned()
        .unwrap_or_else(RequestId::generate);
    let user = request
        .extensions()
        .get::<Identity>()
        .map(|identity| identity.user_id.clone());

    let Some(persona) = state.personas.get(&persona_id).copied() else {
        return AppError::NotFound("Persona".into()).into_plain_response();
    };

    let message = match read_message(request, state.config.max_body_size).await {
        Some(message) if !message.trim().is_empty() => message,
        _ => {
            return AppError::BadRequest("message: must be a non-empty string".into())
                .into_plain_response();
        }
    };

    let (tx, rx) = mpsc::channel::<Chunk>(CHANNEL_CAPACITY);
    let response = match streaming_response(rx) {
        Ok(response) => response,
        Err(e) => return e.into_plain_response(),
    };

    let span = info_span!(
        "chat_stream",
        request_id = %request_id,
        persona = persona.id,
        user = user.as_deref().unwrap_or("anonymous"),
    );
    let job = RelayJob {
        state,
        persona,
        message,
        debug: params.debug_requested(),
    };
    tokio::spawn(job.run(tx).instrument(span));

    response
}

/// Response head for a streamed plain-text answer.
fn streaming_response(rx: mpsc::Receiver<Chunk>) -> Result<Response, AppError> {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header(header::TRANSFER_ENCODING, "chunked")
        .header(header::CACHE_CONTROL, "no-cache, no-transform")
        .header("X-Accel-Buffering", "no")
        .body(Body::from_stream(ReceiverStream::new(rx)))
        .map_err(|e| AppError::Internal(format!("Failed to build stream response: {e}")))
}

/// Work done after the response head has been committed.
struct RelayJob {
    state: Arc<AppState>,
    persona: Persona,
    message: String,
    debug: bool,
}

impl RelayJob {
    async fn run(self, tx: mpsc::Sender<Chunk>) {
        let started = Instant::now();

        tokio::select! {
            _ = tx.closed() => {
                info!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Client disconnected, generation abandoned"
                );
            }
            outcome = self.drive(&tx) => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                match outcome {
                    Ok(RelayOutcome::Completed(stats)) => info!(
                        elapsed_ms,
                        fragments = stats.fragments,
                        bytes = stats.bytes,
                        malformed = stats.malformed,
                        saw_done = stats.saw_done,
                        "Response fully streamed"
                    ),
                    Ok(RelayOutcome::ClientGone(stats)) => info!(
                        elapsed_ms,
                        fragments = stats.fragments,
                        malformed = stats.malformed,
                        "Client disconnected mid-stream"
                    ),
                    Ok(RelayOutcome::UpstreamFailed { stats, error }) => error!(
                        elapsed_ms,
                        fragments = stats.fragments,
                        malformed = stats.malformed,
                        "Generation stream broke: {}",
                        error
                    ),
                    Err(e) => error!(elapsed_ms, "Streaming failed: {}", e),
                }
            }
        }
        // Dropping `tx` ends the response body.
    }

    async fn drive(&self, tx: &mpsc::Sender<Chunk>) -> Result<RelayOutcome, AppError> {
        let state = &self.state;
        let default_model = state.default_model();

        let available = state.backend.list_models().await;
        let model = catalog::resolve_models(&state.personas, &available, default_model)
            .remove(self.persona.id)
            .unwrap_or_else(|| default_model.to_string());

        let prompt = build_prompt(&self.persona, &self.message);
        if self.debug || state.config.debug_prompts {
            log_prompt(&self.persona, &model, &self.message, &prompt);
        }

        let upstream = state.backend.generate(&model, &prompt.text).await?;
        debug!(model = %model, "Relaying generation");

        Ok(relay_ndjson(upstream, tx).await)
    }
}

fn log_prompt(persona: &Persona, model: &str, message: &str, prompt: &PromptParts) {
    info!(persona = persona.display_name, model, "Prompt debug");
    for (label, text) in prompt_sections(message, prompt) {
        info!("{label}:\n{text}");
    }
}

/// Debug view of a request: every populated part, shortened for the log.
fn prompt_sections(message: &str, prompt: &PromptParts) -> Vec<(&'static str, String)> {
    let parts = [
        ("MESSAGE", Some(message)),
        ("SYSTEM", prompt.system.as_deref()),
        ("PERSONA", prompt.persona.as_deref()),
        ("GUARDRAILS", prompt.guardrails.as_deref()),
        ("PROMPT", Some(prompt.text.as_str())),
    ];
    parts
        .into_iter()
        .filter_map(|(label, part)| Some((label, preview(part?, PREVIEW_CHARS))))
        .collect()
}

/// Counters for one relayed stream.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    /// Fragments written to the client.
    pub fragments: usize,
    /// Bytes written to the client.
    pub bytes: usize,
    /// Lines that were not valid JSON.
    pub malformed: usize,
    /// Whether a record with `done: true` was seen.
    pub saw_done: bool,
}

/// How a relayed stream ended.
#[derive(Debug)]
pub enum RelayOutcome {
    /// Upstream ended normally.
    Completed(RelayStats),
    /// The client stopped reading.
    ClientGone(RelayStats),
    /// Upstream failed after the stream had started.
    UpstreamFailed { stats: RelayStats, error: String },
}

/// Forward the text fragments of an NDJSON generation stream to `tx`.
///
/// Fragments are sent in upstream order, one channel message each. Malformed
/// lines are logged and skipped. The `done` flag does not end the relay; the
/// end of the upstream stream does.
pub async fn relay_ndjson<S, E>(mut upstream: S, tx: &mpsc::Sender<Chunk>) -> RelayOutcome
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Display,
{
    let mut lines = LineBuffer::new();
    let mut stats = RelayStats::default();

    while let Some(chunk) = upstream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                return RelayOutcome::UpstreamFailed {
                    stats,
                    error: e.to_string(),
                };
            }
        };

        for line in lines.push(&chunk) {
            if !forward_line(&line, tx, &mut stats).await {
                return RelayOutcome::ClientGone(stats);
            }
        }
    }

    if lines.pending_len() > 0 {
        debug!(
            bytes = lines.pending_len(),
            "Upstream ended without a trailing newline"
        );
    }
    if let Some(line) = lines.finish()
        && !forward_line(&line, tx, &mut stats).await
    {
        return RelayOutcome::ClientGone(stats);
    }

    RelayOutcome::Completed(stats)
}

/// Returns `false` once the client is gone.
async fn forward_line(line: &str, tx: &mpsc::Sender<Chunk>, stats: &mut RelayStats) -> bool {
    let event = match parse_event(line) {
        Ok(event) => event,
        Err(e) => {
            stats.malformed += 1;
            warn!(line = %line, error = %e, "Skipping line that is not valid JSON");
            return true;
        }
    };

    if let Some(error) = event.error_message() {
        warn!("Backend reported an error: {}", error);
    }
    stats.saw_done |= event.is_done();

    let Some(fragment) = event.fragment() else {
        return true;
    };

    trace!(fragment, "fragment");
    stats.fragments += 1;
    stats.bytes += fragment.len();
    tx.send(Ok(Bytes::copy_from_slice(fragment.as_bytes())))
        .await
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use celebchat_ollama::ByteStream;
    use futures::stream;
    use pretty_assertions::assert_eq;
    use tokio::sync::Notify;

    use crate::backend::ModelBackend;
    use crate::config::ServerConfig;
    use crate::persona::PersonaRegistry;

    fn chunks(parts: &[&'static str]) -> impl Stream<Item = Result<Bytes, String>> + Unpin {
        stream::iter(
            parts
                .iter()
                .copied()
                .map(|p| Ok(Bytes::from_static(p.as_bytes())))
                .collect::<Vec<_>>(),
        )
    }

    async fn collect(mut rx: mpsc::Receiver<Chunk>) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(Ok(bytes)) = rx.recv().await {
            out.push(String::from_utf8(bytes.to_vec()).unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_fragments_in_order() {
        let (tx, rx) = mpsc::channel(8);
        let upstream = chunks(&[
            "{\"response\":\"A\",\"done\":false}\n",
            "{\"response\":\"B\",\"done\":false}\n{\"response\":\"\",\"done\":true}\n",
        ]);

        let outcome = relay_ndjson(upstream, &tx).await;
        drop(tx);

        let RelayOutcome::Completed(stats) = outcome else {
            panic!("unexpected outcome: {outcome:?}");
        };
        assert_eq!(stats.fragments, 2);
        assert_eq!(stats.bytes, 2);
        assert!(stats.saw_done);
        assert_eq!(collect(rx).await, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_unexpected_field_types_do_not_drop_text() {
        let (tx, rx) = mpsc::channel(8);
        let upstream = chunks(&[
            "{\"response\":\"A\",\"model\":7}\n",
            "{\"response\":\"B\",\"error\":{\"code\":1}}\n{\"response\":\"C\"}\n",
        ]);

        let outcome = relay_ndjson(upstream, &tx).await;
        drop(tx);

        let RelayOutcome::Completed(stats) = outcome else {
            panic!("unexpected outcome: {outcome:?}");
        };
        assert_eq!(stats.fragments, 3);
        assert_eq!(stats.malformed, 0);
        assert_eq!(collect(rx).await.concat(), "ABC");
    }

    #[tokio::test]
    async fn test_malformed_line_skipped() {
        let (tx, rx) = mpsc::channel(8);
        let upstream = chunks(&["NOT JSON\n{\"response\":\"ok\"}\n"]);

        let outcome = relay_ndjson(upstream, &tx).await;
        drop(tx);

        let RelayOutcome::Completed(stats) = outcome else {
            panic!("unexpected outcome: {outcome:?}");
        };
        assert_eq!(stats.malformed, 1);
        assert_eq!(collect(rx).await, vec!["ok"]);
    }

    #[tokio::test]
    async fn test_line_split_between_chunks() {
        let (tx, rx) = mpsc::channel(8);
        let upstream = chunks(&["{\"resp", "onse\":\"Hola\"}\n{\"response\":", "\" mundo\"}"]);

        relay_ndjson(upstream, &tx).await;
        drop(tx);

        assert_eq!(collect(rx).await.concat(), "Hola mundo");
    }

    #[tokio::test]
    async fn test_empty_upstream() {
        let (tx, rx) = mpsc::channel(8);
        let outcome = relay_ndjson(chunks(&[]), &tx).await;
        drop(tx);

        assert!(matches!(outcome, RelayOutcome::Completed(stats) if stats.fragments == 0));
        assert!(collect(rx).await.is_empty());
    }

    #[tokio::test]
    async fn test_done_without_text_and_error_field() {
        let (tx, rx) = mpsc::channel(8);
        let upstream = chunks(&["{\"error\":\"model not found\"}\n{\"done\":true}\n"]);

        let outcome = relay_ndjson(upstream, &tx).await;
        drop(tx);

        assert!(matches!(outcome, RelayOutcome::Completed(stats) if stats.saw_done));
        assert!(collect(rx).await.is_empty());
    }

    #[tokio::test]
    async fn test_client_gone() {
        let (tx, rx) = mpsc::channel(8);
        drop(rx);

        let outcome = relay_ndjson(chunks(&["{\"response\":\"A\"}\n"]), &tx).await;
        assert!(matches!(outcome, RelayOutcome::ClientGone(_)));
    }

    #[tokio::test]
    async fn test_upstream_failure_keeps_sent_fragments() {
        let (tx, rx) = mpsc::channel(8);
        let upstream = stream::iter(vec![
            Ok(Bytes::from_static(b"{\"response\":\"A\"}\n")),
            Err("connection reset".to_string()),
        ]);

        let outcome = relay_ndjson(upstream, &tx).await;
        drop(tx);

        match outcome {
            RelayOutcome::UpstreamFailed { stats, error } => {
                assert_eq!(stats.fragments, 1);
                assert_eq!(error, "connection reset");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(collect(rx).await, vec!["A"]);
    }

    #[test]
    fn test_prompt_sections_are_shortened() {
        let message = "x".repeat(PREVIEW_CHARS + 500);
        let prompt = PromptParts {
            text: "short prompt".to_string(),
            guardrails: Some("be kind".to_string()),
            ..Default::default()
        };

        let sections = prompt_sections(&message, &prompt);

        let labels: Vec<_> = sections.iter().map(|(label, _)| *label).collect();
        assert_eq!(labels, vec!["MESSAGE", "GUARDRAILS", "PROMPT"]);
        assert!(sections[0].1.ends_with("\n...[500 more chars]"));
        assert_eq!(sections[2].1, "short prompt");
    }

    #[test]
    fn test_debug_flag() {
        assert!(StreamParams { debug: Some("1".into()) }.debug_requested());
        assert!(!StreamParams { debug: Some("true".into()) }.debug_requested());
        assert!(!StreamParams::default().debug_requested());
    }

    /// Backend whose generation never produces data. Reports when the
    /// generation starts and when its stream is dropped.
    struct StalledBackend {
        started: Arc<Notify>,
        released: Arc<AtomicBool>,
    }

    struct ReleaseGuard(Arc<AtomicBool>);

    impl Drop for ReleaseGuard {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl ModelBackend for StalledBackend {
        async fn fetch_models(&self) -> celebchat_ollama::Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn list_models(&self) -> Vec<String> {
            Vec::new()
        }

        async fn generate(
            &self,
            _model: &str,
            _prompt: &str,
        ) -> celebchat_ollama::Result<ByteStream> {
            self.started.notify_one();
            let guard = ReleaseGuard(Arc::clone(&self.released));
            let never = stream::pending::<celebchat_ollama::Result<Bytes>>().map(move |item| {
                let _keep = &guard;
                item
            });
            Ok(Box::pin(never))
        }

        fn describe(&self) -> String {
            "stalled".to_string()
        }
    }

    #[tokio::test]
    async fn test_client_disconnect_stops_relay_task() {
        let started = Arc::new(Notify::new());
        let released = Arc::new(AtomicBool::new(false));
        let backend = StalledBackend {
            started: Arc::clone(&started),
            released: Arc::clone(&released),
        };
        let state = AppState::with_backend(ServerConfig::default(), Arc::new(backend));
        let job = RelayJob {
            state: Arc::new(state),
            persona: *PersonaRegistry::builtin().get("einstein").unwrap(),
            message: "hi".to_string(),
            debug: false,
        };

        let (tx, rx) = mpsc::channel(8);
        let task = tokio::spawn(job.run(tx));

        started.notified().await;
        assert!(!task.is_finished());
        drop(rx);

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("relay task kept running after the client left")
            .unwrap();
        assert!(released.load(Ordering::SeqCst));
    }
}
