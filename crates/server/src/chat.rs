//! Chat routes over the shared orchestrator.
//!
//! - `GET  /chat`        - chat page (HTML)
//! - `POST /chat`        - one blocking turn, `{user_input, reset}` -> `{reply}`
//! - `GET  /stream-chat` - one streaming turn as server-sent events, closed by `[DONE]`
//! - `GET  /stream-test` - fixed event sequence for checking SSE plumbing

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Html,
    },
    routing::get,
    Json, Router,
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tera::{Context, Tera};
use tracing::{info, warn};

use crate::bootstrap::SharedRuntime;

pub const DONE_SENTINEL: &str = "[DONE]";
const TEST_CHUNK_INTERVAL: Duration = Duration::from_millis(500);
const TEST_CHUNK_COUNT: usize = 6;

#[derive(Clone)]
pub struct ChatState {
    runtime: SharedRuntime,
    templates: Arc<Tera>,
    model: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub user_input: String,
    #[serde(default)]
    pub reset: bool,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct ChatResponse {
    pub reply: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct StreamQuery {
    #[serde(default)]
    pub user_input: String,
    #[serde(default)]
    pub reset: Option<String>,
}

impl StreamQuery {
    fn reset_requested(&self) -> bool {
        self.reset.as_deref().is_some_and(|value| value.trim().eq_ignore_ascii_case("true"))
    }
}

fn init_templates() -> Arc<Tera> {
    let mut tera = Tera::default();
    if let Err(error) =
        tera.add_raw_template("chat.html", include_str!("../../../templates/chat/index.html"))
    {
        warn!(
            event_name = "server.chat.template_error",
            error = %error,
            "chat page template failed to load"
        );
    }
    Arc::new(tera)
}

pub fn router(runtime: SharedRuntime, model: &str) -> Router {
    Router::new()
        .route("/chat", get(chat_page).post(chat_reply))
        .route("/stream-chat", get(stream_chat))
        .route("/stream-test", get(stream_test))
        .with_state(ChatState { runtime, templates: init_templates(), model: model.to_string() })
}

async fn chat_page(
    State(state): State<ChatState>,
) -> Result<Html<String>, (StatusCode, Html<String>)> {
    let mut context = Context::new();
    context.insert("title", "opsdesk assistant");
    context.insert("model", &state.model);
    context.insert("chat_path", "/chat");
    context.insert("stream_path", "/stream-chat");

    let html = state.templates.render("chat.html", &context).map_err(|error| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html(format!("<h1>Template Error</h1><pre>{error:?}</pre>")),
        )
    })?;

    Ok(Html(html))
}

/// A malformed body is answered in the reply field, like any other failed turn.
async fn chat_reply(
    State(state): State<ChatState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Json<ChatResponse> {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!(
                event_name = "server.chat.rejected",
                error = %rejection.body_text(),
                "chat request body could not be decoded"
            );
            return Json(ChatResponse { reply: format!("[Error: {}]", rejection.body_text()) });
        }
    };

    info!(
        event_name = "server.chat.turn",
        reset = request.reset,
        input_chars = request.user_input.chars().count(),
        "blocking chat turn"
    );
    let reply = state.runtime.lock().await.submit(&request.user_input, request.reset).await;
    Json(ChatResponse { reply })
}

/// The orchestrator lock is held until the last fragment has been sent.
async fn stream_chat(
    State(state): State<ChatState>,
    Query(query): Query<StreamQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let reset = query.reset_requested();
    info!(
        event_name = "server.chat.stream_turn",
        reset,
        input_chars = query.user_input.chars().count(),
        "streaming chat turn"
    );

    let runtime = state.runtime.clone();
    let stream = async_stream::stream! {
        let mut runtime = runtime.lock_owned().await;
        {
            let mut fragments = runtime.submit_streaming(&query.user_input, reset);
            while let Some(fragment) = fragments.next().await {
                yield Ok::<Event, Infallible>(Event::default().data(fragment));
            }
        }
        yield Ok(Event::default().data(DONE_SENTINEL));
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn stream_test() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = test_events(TEST_CHUNK_INTERVAL)
        .map(|data| Ok::<Event, Infallible>(Event::default().data(data)));
    Sse::new(events)
}

fn test_events(interval: Duration) -> impl Stream<Item = String> {
    async_stream::stream! {
        yield "[TEST START]".to_string();
        for index in 0..TEST_CHUNK_COUNT {
            yield format!("test-chunk-{index}");
            tokio::time::sleep(interval).await;
        }
        yield "[TEST END]".to_string();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        extract::State,
        http::{header, Request, StatusCode},
        response::Html,
        Json,
    };
    use futures::StreamExt;
    use opsdesk_agent::llm::{
        ChatRequest as ModelRequest, EventStream, GatewayError, LlmClient, Reply, StreamEvent,
    };
    use opsdesk_agent::{AgentRuntime, Role, RuntimeSettings, ToolRegistry};
    use tera::Tera;
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    use super::{chat_page, chat_reply, router, test_events, ChatRequest, ChatState, StreamQuery};
    use crate::bootstrap::SharedRuntime;

    /// Echoes the latest user turn.
    struct Parrot;

    impl Parrot {
        fn answer(request: &ModelRequest<'_>) -> String {
            let last = request.turns.last().map(|turn| turn.content()).unwrap_or_default();
            format!("echo: {last}")
        }
    }

    #[async_trait]
    impl LlmClient for Parrot {
        async fn complete(&self, request: ModelRequest<'_>) -> Result<Reply, GatewayError> {
            Ok(Reply::Text(Self::answer(&request)))
        }

        async fn complete_streaming(
            &self,
            request: ModelRequest<'_>,
        ) -> Result<EventStream, GatewayError> {
            let answer = Self::answer(&request);
            let (head, tail) = answer.split_at(answer.len() / 2);
            let events = vec![
                Ok(StreamEvent::Text(head.to_string())),
                Ok(StreamEvent::Text(tail.to_string())),
                Ok(StreamEvent::End),
            ];
            Ok(Box::pin(futures::stream::iter(events)))
        }
    }

    fn shared_runtime() -> SharedRuntime {
        Arc::new(Mutex::new(AgentRuntime::new(
            Arc::new(Parrot),
            Arc::new(ToolRegistry::default()),
            RuntimeSettings::default(),
        )))
    }

    fn state(runtime: SharedRuntime) -> State<ChatState> {
        let mut tera = Tera::default();
        tera.add_raw_template("chat.html", "<html><body>{{ title }} / {{ model }}</body></html>")
            .ok();
        State(ChatState { runtime, templates: Arc::new(tera), model: "stub-model".to_string() })
    }

    #[tokio::test]
    async fn chat_page_renders_the_model_name() {
        let Html(html) = chat_page(state(shared_runtime())).await.expect("page renders");

        assert_eq!(html, "<html><body>opsdesk assistant / stub-model</body></html>");
    }

    #[tokio::test]
    async fn blocking_turn_returns_the_reply_and_records_history() {
        let runtime = shared_runtime();

        let Json(response) = chat_reply(
            state(runtime.clone()),
            Ok(Json(ChatRequest { user_input: "hello".to_string(), reset: false })),
        )
        .await;

        assert_eq!(response.reply, "echo: hello");
        let runtime = runtime.lock().await;
        let roles: Vec<Role> =
            runtime.conversation().turns().iter().map(|turn| turn.role()).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
    }

    #[tokio::test]
    async fn malformed_body_is_answered_in_the_reply_field() {
        let app = router(shared_runtime(), "stub-model");

        let response = app
            .oneshot(
                Request::post("/chat")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{not json"))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let payload: serde_json::Value = serde_json::from_slice(&body).expect("json");
        let reply = payload["reply"].as_str().expect("reply field");
        assert!(reply.starts_with("[Error: "), "{reply}");
    }

    #[tokio::test]
    async fn stream_chat_sends_fragments_then_done() {
        let runtime = shared_runtime();
        let app = router(runtime.clone(), "stub-model");

        let response = app
            .oneshot(
                Request::get("/stream-chat?user_input=hi%20there&reset=true")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).and_then(|value| value.to_str().ok()),
            Some("text/event-stream")
        );
        let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let text = String::from_utf8(body.to_vec()).expect("utf8");
        let data: Vec<&str> = text
            .lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .map(|value| value.strip_prefix(' ').unwrap_or(value))
            .collect();
        assert_eq!(data.concat(), "echo: hi there[DONE]");
        assert_eq!(data.last(), Some(&"[DONE]"));

        let runtime = runtime.lock().await;
        assert_eq!(
            runtime.conversation().last().map(|turn| turn.content()),
            Some("echo: hi there")
        );
    }

    #[test]
    fn reset_flag_accepts_only_true() {
        let query = |reset: Option<&str>| StreamQuery {
            user_input: String::new(),
            reset: reset.map(str::to_string),
        };

        assert!(query(Some("true")).reset_requested());
        assert!(query(Some("TRUE")).reset_requested());
        assert!(!query(Some("false")).reset_requested());
        assert!(!query(Some("1")).reset_requested());
        assert!(!query(None).reset_requested());
    }

    #[tokio::test]
    async fn test_stream_emits_the_fixed_sequence() {
        let events: Vec<String> = test_events(Duration::ZERO).collect().await;

        assert_eq!(events.first().map(String::as_str), Some("[TEST START]"));
        assert_eq!(events.last().map(String::as_str), Some("[TEST END]"));
        assert_eq!(events.len(), 8);
        let chunks: Vec<String> = (0..6).map(|index| format!("test-chunk-{index}")).collect();
        assert_eq!(events[1..7], chunks[..]);
    }
}
