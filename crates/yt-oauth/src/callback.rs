use crate::{OAuthConfig, OAuthError, OAuthToken, TokenCache, exchange_code};
use axum::{
    Router,
    extract::{RawQuery, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

type Outcome = Result<OAuthToken, OAuthError>;

/// Transient loopback listener for the OAuth redirect.
///
/// It serves a single callback: the handler posts its outcome to a one-slot
/// channel and the supervising task shuts the server down gracefully once
/// that outcome arrives, so the browser always receives the page first.
pub struct CallbackServer {
    listener: TcpListener,
    path: String,
}

struct CallbackState {
    config: OAuthConfig,
    verifier: String,
    cache: TokenCache,
    http: reqwest::Client,
    done: Mutex<Option<oneshot::Sender<Outcome>>>,
}

impl CallbackState {
    fn finish(&self, outcome: Outcome) {
        if let Ok(mut slot) = self.done.lock() {
            if let Some(tx) = slot.take() {
                let _ = tx.send(outcome);
            }
        }
    }
}

impl CallbackServer {
    /// Bind to the port embedded in `redirect_uri` on the loopback interface.
    pub async fn bind(redirect_uri: &str) -> Result<Self, OAuthError> {
        let invalid = |reason: &str| OAuthError::InvalidRedirectUri {
            uri: redirect_uri.to_string(),
            reason: reason.to_string(),
        };

        let url = url::Url::parse(redirect_uri).map_err(|e| invalid(&e.to_string()))?;
        if url.host_str().is_none() {
            return Err(invalid("missing host"));
        }
        let port = url
            .port_or_known_default()
            .ok_or_else(|| invalid("missing port"))?;

        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .map_err(|e| {
                OAuthError::Authorization(format!("can't listen on port {}: {}", port, e))
            })?;

        Ok(Self {
            listener,
            path: url.path().to_string(),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until the first callback has been handled and return its outcome.
    pub async fn wait_for_token(
        self,
        config: OAuthConfig,
        verifier: String,
        cache: TokenCache,
    ) -> Result<OAuthToken, OAuthError> {
        let Self { listener, path } = self;
        let (done_tx, done_rx) = oneshot::channel::<Outcome>();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let state = Arc::new(CallbackState {
            config,
            verifier,
            cache,
            http: reqwest::Client::new(),
            done: Mutex::new(Some(done_tx)),
        });

        let app = Router::new()
            .route(&path, get(handle_callback))
            .with_state(state);

        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = stop_rx.await;
                })
                .await
        });

        let outcome = done_rx
            .await
            .unwrap_or_else(|_| Err(OAuthError::Authorization("callback server stopped".into())));

        // Consuming the sender makes this the only shutdown request.
        let _ = stop_tx.send(());
        match server.await {
            Ok(Ok(())) => tracing::debug!("callback server closed"),
            Ok(Err(e)) => tracing::warn!("callback server error: {}", e),
            Err(e) => tracing::warn!("callback server task failed: {}", e),
        }

        outcome
    }
}

async fn handle_callback(
    State(state): State<Arc<CallbackState>>,
    RawQuery(query): RawQuery,
) -> Response {
    let mut code = None;
    let mut error = None;
    for (key, value) in url::form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
        match &*key {
            "code" if !value.is_empty() => code = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    let (outcome, response) = match (code, error) {
        (_, Some(error)) => {
            tracing::error!("authorization denied: {}", error);
            (
                Err(OAuthError::Authorization(format!("consent denied: {}", error))),
                error_page(StatusCode::BAD_REQUEST, "Error: authorization was denied"),
            )
        }
        (None, None) => {
            tracing::error!("url param 'code' is missing");
            (
                Err(OAuthError::Authorization(
                    "callback is missing the 'code' parameter".into(),
                )),
                error_page(
                    StatusCode::BAD_REQUEST,
                    "Error: could not find 'code' URL parameter",
                ),
            )
        }
        (Some(code), None) => {
            match exchange_code(&state.http, &state.config, &code, &state.verifier).await {
                Ok(token) => match state.cache.save(&token) {
                    Ok(()) => (Ok(token), success_page()),
                    Err(e) => {
                        tracing::error!("could not store access token: {}", e);
                        (
                            Err(e),
                            error_page(
                                StatusCode::INTERNAL_SERVER_ERROR,
                                "Error: could not store access token",
                            ),
                        )
                    }
                },
                Err(e) => {
                    tracing::error!("could not get access token: {}", e);
                    (
                        Err(e),
                        error_page(
                            StatusCode::BAD_GATEWAY,
                            "Error: could not retrieve access token",
                        ),
                    )
                }
            }
        }
    };

    state.finish(outcome);
    response
}

fn error_page(status: StatusCode, message: &str) -> Response {
    (
        status,
        Html(format!(
            "<html><body><h1>Authorization Failed</h1><p>{}</p>\
            <p>You can close this window.</p></body></html>",
            message
        )),
    )
        .into_response()
}

fn success_page() -> Response {
    Html(
        "<html><body><h1>Login successful!</h1>\
        <h2>You can close this window and return to the yt CLI</h2></body></html>",
    )
    .into_response()
}
