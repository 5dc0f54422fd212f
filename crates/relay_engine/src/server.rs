use std::future::Future;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, Query, Request, State};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use relay_core::{reduce, ReceivedMessage, TerminalRule};
use relay_logging::{relay_debug, relay_error, relay_info, relay_warn};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;

use crate::session::{
    expired_cookies, login_url, session_cookies, session_from_cookie_header, AuthSettings, Session,
};
use crate::store::MessageStore;

pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared state handed to every relay handler.
#[derive(Clone)]
pub struct RelayState {
    pub store: Arc<dyn MessageStore>,
    pub terminal_rule: TerminalRule,
    pub max_body_bytes: usize,
    pub auth: Option<Arc<AuthSettings>>,
}

impl RelayState {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self {
            store,
            terminal_rule: TerminalRule::default(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            auth: None,
        }
    }

    pub fn with_terminal_rule(mut self, rule: TerminalRule) -> Self {
        self.terminal_rule = rule;
        self
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    pub fn with_auth(mut self, auth: AuthSettings) -> Self {
        self.auth = Some(Arc::new(auth));
        self
    }
}

pub fn build_router(state: RelayState) -> Router {
    Router::new()
        .route("/healthz", get(healthz_handler))
        .route(
            "/webhook/:account_id",
            get(list_handler)
                .post(append_handler)
                .delete(clear_handler),
        )
        .route("/webhook/:account_id/status", get(status_handler))
        .route("/auth/login", get(login_handler))
        .route("/auth/callback", get(callback_handler))
        .route("/auth/signout", post(signout_handler))
        .route("/:account_id/dashboard", get(dashboard_handler))
        .layer(middleware::from_fn(log_request))
        .layer(DefaultBodyLimit::max(state.max_body_bytes))
        .with_state(state)
}

/// Serves the relay on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: RelayState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        relay_info!("relay listening on {}", addr);
    }
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let response = next.run(request).await;
    relay_debug!("{} {} -> {}", method, path, response.status().as_u16());
    response
}

fn success() -> Response {
    (StatusCode::OK, Json(json!({ "success": true }))).into_response()
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal server error" })),
    )
        .into_response()
}

async fn healthz_handler() -> Response {
    (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response()
}

async fn append_handler(
    State(state): State<RelayState>,
    Path(account_id): Path<String>,
    body: Bytes,
) -> Response {
    let message = match ReceivedMessage::parse(&body) {
        Ok(message) => message,
        Err(err) => {
            relay_warn!("rejected webhook for account {}: {}", account_id, err);
            return internal_error();
        }
    };
    let phase = message.message().phase();
    match state.store.append(&account_id, message).await {
        Ok(stored) => {
            relay_debug!(
                "stored {} message for account {} phase={:?} at {}",
                stored.message.kind(),
                account_id,
                phase,
                stored.timestamp
            );
            success()
        }
        Err(err) => {
            relay_error!("failed to store webhook for account {}: {}", account_id, err);
            internal_error()
        }
    }
}

async fn list_handler(State(state): State<RelayState>, Path(account_id): Path<String>) -> Response {
    match state.store.list(&account_id).await {
        Ok(messages) => (StatusCode::OK, Json(messages)).into_response(),
        Err(err) => {
            relay_error!("failed to list webhooks for account {}: {}", account_id, err);
            internal_error()
        }
    }
}

async fn clear_handler(State(state): State<RelayState>, Path(account_id): Path<String>) -> Response {
    match state.store.clear(&account_id).await {
        Ok(()) => {
            relay_info!("cleared webhook buffer for account {}", account_id);
            success()
        }
        Err(err) => {
            relay_error!("failed to clear webhooks for account {}: {}", account_id, err);
            internal_error()
        }
    }
}

async fn status_handler(
    State(state): State<RelayState>,
    Path(account_id): Path<String>,
) -> Response {
    match state.store.list(&account_id).await {
        Ok(messages) => {
            let processing = reduce(&messages, state.terminal_rule);
            (StatusCode::OK, Json(processing)).into_response()
        }
        Err(err) => {
            relay_error!("failed to derive status for account {}: {}", account_id, err);
            internal_error()
        }
    }
}

async fn login_handler(State(state): State<RelayState>) -> Response {
    let Some(auth) = state.auth.as_deref() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    match login_url(auth) {
        Ok(url) => Redirect::to(url.as_str()).into_response(),
        Err(err) => {
            relay_error!("invalid authorization server url: {}", err);
            internal_error()
        }
    }
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    access_token: Option<String>,
    account_id: Option<String>,
}

async fn callback_handler(Query(params): Query<CallbackParams>) -> Response {
    let session = match (params.access_token, params.account_id) {
        (Some(token), Some(account_id)) => Session::new(token, account_id),
        _ => None,
    };
    let Some(session) = session else {
        relay_warn!("auth callback without a usable token/account pair");
        return Redirect::to("/").into_response();
    };
    let [token_cookie, account_cookie] = session_cookies(&session);
    relay_info!("session established for account {}", session.account_id);
    (
        AppendHeaders([(SET_COOKIE, token_cookie), (SET_COOKIE, account_cookie)]),
        Redirect::to(&session.dashboard_path()),
    )
        .into_response()
}

async fn signout_handler() -> Response {
    let [token_cookie, account_cookie] = expired_cookies();
    (
        AppendHeaders([(SET_COOKIE, token_cookie), (SET_COOKIE, account_cookie)]),
        Redirect::to("/"),
    )
        .into_response()
}

/// Processing status for the signed-in account; anyone else is sent to sign in.
async fn dashboard_handler(
    State(state): State<RelayState>,
    Path(account_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let session = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(session_from_cookie_header);
    match session {
        Some(session) if session.account_id == account_id => {}
        _ => {
            relay_debug!("no session for dashboard of account {}", account_id);
            return Redirect::to("/auth/login").into_response();
        }
    }
    match state.store.list(&account_id).await {
        Ok(messages) => {
            let processing = reduce(&messages, state.terminal_rule);
            (
                StatusCode::OK,
                Json(json!({ "accountId": account_id, "processing": processing })),
            )
                .into_response()
        }
        Err(err) => {
            relay_error!("failed to load dashboard for account {}: {}", account_id, err);
            internal_error()
        }
    }
}
