//! HTTP server setup and webhook handlers.
//!
//! # Responsibilities
//! - Create the Axum router with the two webhook routes
//! - Wire up middleware (tracing, request timeout)
//! - Verify signatures before anything reaches the coordinator
//! - Always answer a parsed message with 200 + XML: WeChat redelivers
//!   on any other status, and a legible reply beats a redelivery loop

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::answer::{AnswerStore, Coordinator};
use crate::config::schema::WECHAT_REPLY_DEADLINE_SECS;
use crate::config::BridgeConfig;
use crate::observability::metrics;
use crate::ragflow::{RagflowClient, RagflowError, SessionRegistry};
use crate::wechat::{commands, message, signature};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<BridgeConfig>,
    pub store: Arc<AnswerStore>,
    pub sessions: Arc<SessionRegistry>,
    pub coordinator: Coordinator,
}

/// HTTP server for the bridge.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new server with the given configuration, wiring up the
    /// backend client, session registry, answer store and coordinator.
    pub fn new(config: BridgeConfig) -> Result<Self, RagflowError> {
        let client = Arc::new(RagflowClient::new(
            &config.ragflow,
            config.retry.policy(),
            Duration::from_secs(config.timeouts.request_secs),
        )?);
        let sessions = Arc::new(SessionRegistry::new(client.clone(), config.retry.policy()));
        let store = Arc::new(AnswerStore::new(&config.cache));
        let coordinator = Coordinator::new(client, sessions.clone(), store.clone(), &config);

        let state = AppState {
            config: Arc::new(config),
            store,
            sessions,
            coordinator,
        };

        Ok(Self {
            router: Self::build_router(state),
        })
    }

    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/wechat", get(handshake_handler).post(message_handler))
            .with_state(state)
            // The platform gives up after its own deadline anyway.
            .layer(TimeoutLayer::new(Duration::from_secs(
                WECHAT_REPLY_DEADLINE_SECS,
            )))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Signature parameters WeChat appends to every webhook call.
#[derive(Debug, Deserialize)]
pub struct SignatureParams {
    #[serde(default)]
    signature: String,
    #[serde(default)]
    timestamp: String,
    #[serde(default)]
    nonce: String,
    #[serde(default)]
    echostr: String,
}

impl SignatureParams {
    fn verify(&self, token: &str) -> bool {
        signature::verify(token, &self.timestamp, &self.nonce, &self.signature)
    }
}

/// GET handshake: prove ownership of the endpoint by echoing `echostr`.
async fn handshake_handler(
    State(state): State<AppState>,
    Query(params): Query<SignatureParams>,
) -> Response {
    if params.verify(&state.config.wechat.token) {
        (StatusCode::OK, params.echostr).into_response()
    } else {
        tracing::warn!("handshake signature verification failed");
        metrics::record_message("rejected");
        (StatusCode::FORBIDDEN, "signature verification failed").into_response()
    }
}

/// POST: one user message per request, answered within the platform
/// deadline with either the real answer, a cached state, or the notice.
async fn message_handler(
    State(state): State<AppState>,
    Query(params): Query<SignatureParams>,
    body: String,
) -> Response {
    if !params.verify(&state.config.wechat.token) {
        tracing::warn!("message signature verification failed");
        metrics::record_message("rejected");
        return (StatusCode::FORBIDDEN, "signature verification failed").into_response();
    }

    let msg = match message::parse_message(&body) {
        Ok(msg) => msg,
        Err(error) => {
            tracing::warn!(%error, "unparseable message body");
            metrics::record_message("unparseable");
            return xml_reply("", "", "Sorry, your message could not be parsed.");
        }
    };

    let user_id = msg.from_user_name.clone();
    let message_id = msg.delivery_id();
    tracing::info!(
        user_id,
        message_id,
        msg_type = %msg.msg_type,
        "message received"
    );

    if msg.msg_type != "text" {
        return reply_to(&msg, "I can only answer text messages for now.");
    }

    let text = msg.content.trim();
    if commands::is_command(text) {
        metrics::record_message("command");
        let content = commands::dispatch(&state.store, &state.sessions, &user_id, text);
        return reply_to(&msg, &content);
    }

    let content = state
        .coordinator
        .handle_question(&message_id, &user_id, text)
        .await;
    reply_to(&msg, &content)
}

/// Render the passive reply for an inbound message (users swapped).
fn reply_to(msg: &message::IncomingMessage, content: &str) -> Response {
    xml_reply(&msg.from_user_name, &msg.to_user_name, content)
}

fn xml_reply(to_user: &str, from_user: &str, content: &str) -> Response {
    (
        [(header::CONTENT_TYPE, "text/xml; charset=utf-8")],
        message::render_reply(to_user, from_user, content),
    )
        .into_response()
}
