//! In-process stand-in for the commentThreads endpoint that records every request.
#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub video_id: String,
    pub max_results: String,
    pub page_token: Option<String>,
    pub key: Option<String>,
}

enum FakePage {
    Comments {
        items: Vec<(String, String)>,
        next: Option<String>,
    },
    Status(u16),
}

/// Pages are keyed by the page token that requests them ("" for the first page).
#[derive(Default)]
pub struct FakeApi {
    pages: HashMap<String, FakePage>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, token: &str, items: Vec<(String, String)>, next: Option<&str>) -> Self {
        self.pages.insert(
            token.to_string(),
            FakePage::Comments {
                items,
                next: next.map(str::to_string),
            },
        );
        self
    }

    pub fn failing_page(mut self, token: &str, status: u16) -> Self {
        self.pages.insert(token.to_string(), FakePage::Status(status));
        self
    }

    /// Serve on a random loopback port, returning the base URL.
    pub async fn serve(self) -> (String, Arc<FakeApi>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let api = Arc::new(self);

        let app = Router::new()
            .route("/youtube/v3/commentThreads", get(comment_threads))
            .with_state(api.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}", addr), api)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn comment_threads(
    State(api): State<Arc<FakeApi>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    api.requests.lock().unwrap().push(RecordedRequest {
        video_id: params.get("videoId").cloned().unwrap_or_default(),
        max_results: params.get("maxResults").cloned().unwrap_or_default(),
        page_token: params.get("pageToken").cloned(),
        key: params.get("key").cloned(),
    });

    let token = params.get("pageToken").cloned().unwrap_or_default();
    match api.pages.get(&token) {
        Some(FakePage::Comments { items, next }) => {
            let items: Vec<_> = items
                .iter()
                .map(|(author, text)| {
                    json!({
                        "kind": "youtube#commentThread",
                        "snippet": {
                            "topLevelComment": {
                                "snippet": {
                                    "authorDisplayName": author,
                                    "textOriginal": text,
                                }
                            }
                        }
                    })
                })
                .collect();
            Json(json!({ "items": items, "nextPageToken": next })).into_response()
        }
        Some(FakePage::Status(status)) => {
            let status = StatusCode::from_u16(*status).unwrap();
            (
                status,
                Json(json!({ "error": { "code": status.as_u16(), "message": "backend error" } })),
            )
                .into_response()
        }
        None => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": { "code": 400, "message": "invalid page token" } })),
        )
            .into_response(),
    }
}

/// `count` comments by distinct authors, numbered from `start`.
pub fn numbered(start: usize, count: usize) -> Vec<(String, String)> {
    (start..start + count)
        .map(|i| (format!("user-{}", i), format!("comment #{}", i)))
        .collect()
}

pub fn by(authors: &[&str]) -> Vec<(String, String)> {
    authors
        .iter()
        .enumerate()
        .map(|(i, author)| (author.to_string(), format!("{} says hi ({})", author, i)))
        .collect()
}
