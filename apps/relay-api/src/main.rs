use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use async_stream::stream;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::Html;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use futures_util::{Stream, StreamExt};
use relay_events::SseFrame;
use relay_kernel::{Relay, RelayBuilder, RelayConfig};
use relay_protocol::{
    ChatTurnContext, ConversationId, RelayError, ResponseId, TaskId, TaskInput, TaskRecord,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

mod openapi;

use crate::openapi::{openapi_spec, scalar_docs_html};

#[derive(Debug, Parser)]
#[command(name = "relay-api")]
#[command(about = "Real-time event relay for an agent runtime")]
struct Cli {
    #[arg(long, env = "RELAY_LISTEN", default_value = "127.0.0.1:8000")]
    listen: SocketAddr,
    /// Allowed CORS origins. Empty means permissive, for development only.
    #[arg(long = "allow-origin", env = "RELAY_ALLOW_ORIGINS", value_delimiter = ',')]
    allow_origins: Vec<String>,
    #[arg(long, default_value_t = 256)]
    subscriber_capacity: usize,
    #[arg(long, default_value_t = 1024)]
    task_capacity: usize,
    #[arg(long, default_value_t = 15)]
    keep_alive_secs: u64,
    /// Pause between demo runtime steps, to make streaming visible.
    #[arg(long, default_value_t = 0)]
    step_delay_ms: u64,
}

impl Cli {
    fn relay_config(&self) -> RelayConfig {
        RelayConfig::default()
            .subscriber_capacity(self.subscriber_capacity)
            .task_capacity(self.task_capacity)
            .keep_alive(Duration::from_secs(self.keep_alive_secs.max(1)))
            .step_delay(Duration::from_millis(self.step_delay_ms))
    }
}

#[derive(Clone)]
struct AppState {
    relay: Relay,
}

/// Body of `POST /`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest {
    items: String,
    #[serde(default)]
    previous_response_id: Option<ResponseId>,
    #[serde(default)]
    conversation_id: Option<ConversationId>,
}

#[derive(Debug, Serialize)]
struct CreateTaskResponse {
    task_id: TaskId,
}

#[derive(Debug, Deserialize, Default)]
struct EventFeedQuery {
    task_id: Option<String>,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn internal(error: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: error.to_string(),
        }
    }
}

impl From<RelayError> for ApiError {
    fn from(error: RelayError) -> Self {
        match error {
            RelayError::InvalidRequest(_) => Self::bad_request(error.to_string()),
            RelayError::TaskNotFound(_) => Self::not_found(error.to_string()),
            RelayError::BusClosed => Self {
                status: StatusCode::SERVICE_UNAVAILABLE,
                message: error.to_string(),
            },
            other => Self::internal(other),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();
    let relay = RelayBuilder::new(cli.relay_config()).build();
    let app = router(
        AppState {
            relay: relay.clone(),
        },
        cors_layer(&cli.allow_origins),
    );

    let listener = tokio::net::TcpListener::bind(cli.listen).await?;
    info!(listen = %cli.listen, origins = cli.allow_origins.len(), "relay-api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // end standing feeds so graceful shutdown can complete
            relay.shutdown();
        })
        .await?;

    Ok(())
}

fn router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/", post(chat))
        .route("/healthz", get(healthz))
        .route("/openapi.json", get(openapi_json))
        .route("/docs", get(docs))
        .route("/docs/", get(docs))
        .route("/tasks", post(create_task).get(list_tasks))
        .route("/tasks/{task_id}", get(get_task))
        .route("/events", get(stream_task_events))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        warn!("no allowed origins configured, CORS is permissive (development only)");
        return CorsLayer::permissive();
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins(origins)))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE])
}

fn allowed_origins(origins: &[String]) -> Vec<HeaderValue> {
    origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(error) => {
                warn!(%origin, %error, "ignoring invalid CORS origin");
                None
            }
        })
        .collect()
}

async fn healthz(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "relay-api",
        "subscribers": state.relay.subscriber_count(),
        "tasks": state.relay.tasks().len(),
    }))
}

async fn openapi_json() -> Json<serde_json::Value> {
    Json(openapi_spec())
}

async fn docs() -> Html<String> {
    Html(scalar_docs_html("/openapi.json"))
}

async fn chat(
    State(state): State<AppState>,
    request: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let Json(request) = request?;
    let context = ChatTurnContext::new(request.conversation_id, request.previous_response_id);
    let frames = state.relay.chat(request.items, context)?;
    let stream = frames.map(|frame| Ok::<_, Infallible>(as_sse_event(frame)));
    Ok(Sse::new(stream).keep_alive(keep_alive(state.relay.config())))
}

async fn create_task(
    State(state): State<AppState>,
    request: Result<Json<TaskInput>, JsonRejection>,
) -> ApiResult<Json<CreateTaskResponse>> {
    let Json(input) = request?;
    let task_id = state.relay.create_task(input)?;
    Ok(Json(CreateTaskResponse { task_id }))
}

async fn list_tasks(State(state): State<AppState>) -> Json<Vec<TaskRecord>> {
    Json(state.relay.tasks())
}

async fn get_task(
    Path(task_id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<Json<TaskRecord>> {
    Ok(Json(state.relay.task(&TaskId::from(task_id))?))
}

async fn stream_task_events(
    Query(query): Query<EventFeedQuery>,
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let filter = query.task_id.map(TaskId::from);
    let mut subscription = state.relay.subscribe();
    debug!(subscriber = %subscription.id(), filter = ?filter, "task feed subscriber connected");

    let stream = stream! {
        while let Some(notification) = subscription.recv().await {
            if filter.as_ref().is_some_and(|task_id| !notification.concerns(task_id)) {
                continue;
            }
            match SseFrame::from_notification(&notification) {
                Ok(frame) => yield Ok(as_sse_event(frame)),
                Err(error) => warn!(%error, "dropping unencodable task notification"),
            }
        }
        debug!(subscriber = %subscription.id(), "task feed closed");
    };

    Sse::new(stream).keep_alive(keep_alive(state.relay.config()))
}

fn as_sse_event(frame: SseFrame) -> Event {
    Event::default().event(frame.event).data(frame.data)
}

fn keep_alive(config: &RelayConfig) -> KeepAlive {
    KeepAlive::new().interval(config.keep_alive).text("keep-alive")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    {
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(error) => {
                    tracing::error!(%error, "failed to install SIGTERM handler");
                }
            }
        };

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use axum::http::header::{
        ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_REQUEST_METHOD, ORIGIN,
    };
    use relay_events::{SseDecoder, keep_alive_comment};
    use relay_protocol::{TaskNotification, TaskStatus};
    use tokio::time::timeout;
    use tower::ServiceExt;

    fn app() -> Router {
        let relay = RelayBuilder::new(RelayConfig::default()).build();
        router(AppState { relay }, CorsLayer::permissive())
    }

    fn post_json(uri: &str, body: &str) -> Result<Request<Body>> {
        Ok(Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_owned()))?)
    }

    fn get_request(uri: &str) -> Result<Request<Body>> {
        Ok(Request::builder().uri(uri).body(Body::empty())?)
    }

    async fn json_body(response: Response) -> Result<serde_json::Value> {
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Reads the feed until `stop` matches, or fails after five seconds.
    async fn read_feed(
        response: Response,
        mut stop: impl FnMut(&TaskNotification) -> bool,
    ) -> Result<Vec<TaskNotification>> {
        let mut chunks = response.into_body().into_data_stream();
        let mut decoder = SseDecoder::new();
        let mut seen = Vec::new();
        let read = async {
            while let Some(chunk) = chunks.next().await {
                for frame in decoder.push(&chunk?) {
                    let notification = frame.to_notification()?;
                    let finished = stop(&notification);
                    seen.push(notification);
                    if finished {
                        return Ok::<_, anyhow::Error>(());
                    }
                }
            }
            Ok(())
        };
        timeout(Duration::from_secs(5), read).await??;
        Ok(seen)
    }

    #[tokio::test]
    async fn healthz_reports_ok() -> Result<()> {
        let response = app().oneshot(get_request("/healthz")?).await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await?;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["tasks"], 0);
        Ok(())
    }

    #[tokio::test]
    async fn chat_streams_frames_then_done() -> Result<()> {
        let response = app()
            .oneshot(post_json("/", r#"{"items":"weather in Lima","conversationId":"c-9","previousResponseId":"r-1"}"#)?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
            Some("text/event-stream")
        );

        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(&bytes);
        let names: Vec<&str> = frames.iter().map(|f| f.event.as_str()).collect();

        assert_eq!(names.last(), Some(&"done"));
        assert_eq!(names.iter().filter(|name| **name == "done").count(), 1);
        assert!(!names.contains(&"conversation-established"));
        assert!(names.contains(&"tool-result"));

        let completed = frames
            .iter()
            .find(|f| f.event == "turn-completed")
            .map(SseFrame::to_envelope)
            .transpose()?;
        assert_eq!(
            completed.as_ref().and_then(|e| e.get_str("conversation_id")),
            Some("c-9")
        );
        Ok(())
    }

    #[tokio::test]
    async fn malformed_requests_are_rejected() -> Result<()> {
        let app = app();
        for (uri, body) in [("/", "{}"), ("/tasks", r#"{"input":"x"}"#), ("/tasks", r#"{"items":" "}"#)] {
            let response = app.clone().oneshot(post_json(uri, body)?).await?;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri} {body}");
            assert!(json_body(response).await?["error"].is_string());
        }

        let response = app.oneshot(get_request("/tasks")?).await?;
        assert_eq!(json_body(response).await?, json!([]));
        Ok(())
    }

    #[tokio::test]
    async fn task_is_created_and_queryable() -> Result<()> {
        let app = app();
        let response = app
            .clone()
            .oneshot(post_json("/tasks", r#"{"items":"list pending orders"}"#)?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await?, json!({ "task_id": "t-1" }));

        let record = json_body(app.clone().oneshot(get_request("/tasks/t-1")?).await?).await?;
        assert_eq!(record["task_id"], "t-1");
        assert_eq!(record["input"]["items"], "list pending orders");

        let listed = json_body(app.clone().oneshot(get_request("/tasks")?).await?).await?;
        assert_eq!(listed.as_array().map(Vec::len), Some(1));

        let missing = app.oneshot(get_request("/tasks/t-99")?).await?;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn event_feed_reports_task_lifecycle() -> Result<()> {
        let app = app();
        let feed = app.clone().oneshot(get_request("/events")?).await?;
        assert_eq!(feed.status(), StatusCode::OK);

        app.oneshot(post_json("/tasks", r#"{"items":"list pending orders"}"#)?)
            .await?;

        let seen = read_feed(feed, TaskNotification::is_terminal).await?;
        let task_id = TaskId::from("t-1");
        assert_eq!(seen.first(), Some(&TaskNotification::created(task_id.clone())));
        assert_eq!(seen.last(), Some(&TaskNotification::done(task_id)));
        assert!(seen[1..seen.len() - 1]
            .iter()
            .all(|n| n.status() == Some(TaskStatus::Running)));
        Ok(())
    }

    #[tokio::test]
    async fn event_feed_filters_by_task() -> Result<()> {
        let app = app();
        let feed = app.clone().oneshot(get_request("/events?task_id=t-2")?).await?;

        for _ in 0..2 {
            app.clone()
                .oneshot(post_json("/tasks", r#"{"items":"check the weather"}"#)?)
                .await?;
        }

        let watched = TaskId::from("t-2");
        let seen = read_feed(feed, |n| n.is_terminal()).await?;
        assert!(seen.iter().all(|n| n.concerns(&watched)));
        assert!(seen.iter().any(|n| n.task_id() == &TaskId::from("t-1")));
        assert_eq!(seen.last().map(TaskNotification::task_id), Some(&watched));
        Ok(())
    }

    #[tokio::test]
    async fn every_frame_reaches_the_wire_with_a_data_line() -> Result<()> {
        let frames = futures_util::stream::iter([SseFrame::done(), SseFrame::new("odd\nkind", "{}")])
            .map(|frame| Ok::<_, Infallible>(as_sse_event(frame)));
        let bytes = to_bytes(Sse::new(frames).into_response().into_body(), usize::MAX).await?;

        let decoded = SseDecoder::new().push(&bytes);
        assert_eq!(decoded, vec![SseFrame::done(), SseFrame::new("odd_kind", "{}")]);
        Ok(())
    }

    fn preflight(origin: &str) -> Result<Request<Body>> {
        Ok(Request::builder()
            .method(Method::OPTIONS)
            .uri("/tasks")
            .header(ORIGIN, origin)
            .header(ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())?)
    }

    #[tokio::test]
    async fn configured_origins_restrict_cors() -> Result<()> {
        let relay = RelayBuilder::default().build();
        let cors = cors_layer(&["https://app.example".to_owned(), "bad\norigin".to_owned()]);
        let app = router(AppState { relay }, cors);

        let allowed = app.clone().oneshot(preflight("https://app.example")?).await?;
        assert_eq!(
            allowed
                .headers()
                .get(ACCESS_CONTROL_ALLOW_ORIGIN)
                .and_then(|v| v.to_str().ok()),
            Some("https://app.example")
        );

        let denied = app.oneshot(preflight("https://other.example")?).await?;
        assert!(denied.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
        Ok(())
    }

    #[test]
    fn invalid_origins_are_skipped() {
        let origins = allowed_origins(&["bad\norigin".to_owned(), "https://app.example".to_owned()]);
        assert_eq!(origins, vec![HeaderValue::from_static("https://app.example")]);
    }

    #[test]
    fn keep_alive_text_matches_comment_frame() {
        assert_eq!(keep_alive_comment(), ": keep-alive\n\n");
    }
}
