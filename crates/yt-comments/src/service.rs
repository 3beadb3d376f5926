use crate::{Error, Sampler, extract_video_id};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::ops::ControlFlow;
use yt_oauth::SharedOAuthManager;

/// Default REST API address
pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com";

/// Largest `maxResults` accepted by commentThreads.list
pub const MAX_PAGE_SIZE: u32 = 100;

/// A top-level comment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub author_display_name: String,
    pub text_original: String,
}

/// How requests are authenticated
#[derive(Clone)]
pub enum CredentialSource {
    /// API key sent as the `key` query parameter
    StaticKey(String),
    /// OAuth bearer token, refreshed on use when expired
    TokenProvider(SharedOAuthManager),
}

impl fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::StaticKey(_) => f.write_str("StaticKey(..)"),
            CredentialSource::TokenProvider(_) => f.write_str("TokenProvider(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub credential: Option<CredentialSource>,
    pub base_url: String,
}

impl ServiceConfig {
    pub fn new(credential: CredentialSource) -> Self {
        Self {
            credential: Some(credential),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentThreadListResponse {
    #[serde(default)]
    next_page_token: Option<String>,
    #[serde(default)]
    items: Vec<CommentThread>,
}

#[derive(Deserialize)]
struct CommentThread {
    snippet: CommentThreadSnippet,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentThreadSnippet {
    top_level_comment: TopLevelComment,
}

#[derive(Deserialize)]
struct TopLevelComment {
    snippet: CommentSnippet,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentSnippet {
    #[serde(default)]
    author_display_name: String,
    #[serde(default)]
    text_original: String,
}

struct Page {
    comments: Vec<Comment>,
    next_page_token: Option<String>,
}

/// Per-page sink driving [`YouTubeService::paginate`].
trait PageAccumulator {
    fn next_page_size(&self) -> u32;

    /// Take one page; `Break` stops before the cursor runs out.
    fn accept(&mut self, comments: Vec<Comment>) -> ControlFlow<()>;
}

/// Keeps the first `limit` comments in delivery order.
struct Bounded {
    limit: usize,
    comments: Vec<Comment>,
}

impl PageAccumulator for Bounded {
    fn next_page_size(&self) -> u32 {
        let remaining = self.limit.saturating_sub(self.comments.len());
        remaining.min(MAX_PAGE_SIZE as usize) as u32
    }

    fn accept(&mut self, comments: Vec<Comment>) -> ControlFlow<()> {
        self.comments.extend(comments);
        if self.comments.len() >= self.limit {
            // The API may hand back more than was asked for
            self.comments.truncate(self.limit);
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }
}

/// Author names, first occurrence wins.
#[derive(Default)]
struct DistinctAuthors {
    seen: HashSet<String>,
    names: Vec<String>,
}

impl PageAccumulator for DistinctAuthors {
    fn next_page_size(&self) -> u32 {
        MAX_PAGE_SIZE
    }

    fn accept(&mut self, comments: Vec<Comment>) -> ControlFlow<()> {
        for comment in comments {
            if !self.seen.contains(&comment.author_display_name) {
                self.seen.insert(comment.author_display_name.clone());
                self.names.push(comment.author_display_name);
            }
        }
        ControlFlow::Continue(())
    }
}

/// Handle on the YouTube Data API, bound to one credential source.
pub struct YouTubeService {
    http: reqwest::Client,
    credential: CredentialSource,
    base_url: String,
}

impl YouTubeService {
    pub fn new(config: ServiceConfig) -> Result<Self, Error> {
        let credential = match config.credential {
            None => return Err(Error::InvalidInput("missing credential source".into())),
            Some(CredentialSource::StaticKey(key)) if key.trim().is_empty() => {
                return Err(Error::InvalidInput("API key is empty".into()));
            }
            Some(credential) => credential,
        };

        Ok(Self {
            http: reqwest::Client::new(),
            credential,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Up to `count` comments of the video behind `video_url`.
    pub async fn list_comments(
        &self,
        video_url: &str,
        count: usize,
    ) -> Result<Vec<Comment>, Error> {
        let video_id = extract_video_id(video_url)?;
        self.fetch_comments(&video_id, count).await
    }

    /// Draw `winners` distinct commenters of the video behind `video_url`.
    /// Each commenter counts once regardless of how often they commented.
    pub async fn random_commenters(
        &self,
        video_url: &str,
        winners: usize,
        sampler: &mut Sampler,
    ) -> Result<Vec<String>, Error> {
        let video_id = extract_video_id(video_url)?;
        let commenters = self.fetch_distinct_commenters(&video_id).await?;
        tracing::debug!("{} distinct commenters", commenters.len());
        Ok(sampler.pick(&commenters, winners))
    }

    /// At most `max_count` top-level comments, in page delivery order.
    pub async fn fetch_comments(
        &self,
        video_id: &str,
        max_count: usize,
    ) -> Result<Vec<Comment>, Error> {
        if max_count == 0 {
            return Ok(Vec::new());
        }

        let mut bounded = Bounded {
            limit: max_count,
            comments: Vec::with_capacity(max_count.min(MAX_PAGE_SIZE as usize)),
        };
        self.paginate(video_id, &mut bounded).await?;
        Ok(bounded.comments)
    }

    /// Every distinct author name across all pages, in first-seen order.
    pub async fn fetch_distinct_commenters(&self, video_id: &str) -> Result<Vec<String>, Error> {
        let mut authors = DistinctAuthors::default();
        self.paginate(video_id, &mut authors).await?;
        Ok(authors.names)
    }

    /// Follow the page cursor until the accumulator stops or the API runs out.
    /// The first failed page aborts the walk.
    async fn paginate<A: PageAccumulator>(
        &self,
        video_id: &str,
        accumulator: &mut A,
    ) -> Result<(), Error> {
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = self
                .fetch_page(video_id, accumulator.next_page_size(), cursor.as_deref())
                .await?;
            pages += 1;

            if accumulator.accept(page.comments).is_break() {
                break;
            }
            match page.next_page_token {
                Some(token) => cursor = Some(token),
                None => break,
            }
        }

        tracing::debug!("fetched {} page(s) for video {}", pages, video_id);
        Ok(())
    }

    async fn fetch_page(
        &self,
        video_id: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<Page, Error> {
        tracing::debug!(
            "requesting {} comments for {} (page token: {:?})",
            page_size,
            video_id,
            page_token
        );

        let page_size = page_size.to_string();
        let mut request = self
            .http
            .get(format!("{}/youtube/v3/commentThreads", self.base_url))
            .query(&[
                ("part", "snippet"),
                ("videoId", video_id),
                ("maxResults", page_size.as_str()),
                ("textFormat", "plainText"),
            ]);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        request = match &self.credential {
            CredentialSource::StaticKey(key) => request.query(&[("key", key.as_str())]),
            CredentialSource::TokenProvider(provider) => {
                let access_token = provider.lock().await.access_token().await?;
                request.bearer_auth(access_token)
            }
        };

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::from_status(
                status,
                &body,
                &format!("video '{}'", video_id),
            ));
        }

        let list: CommentThreadListResponse = response.json().await?;

        Ok(Page {
            comments: list
                .items
                .into_iter()
                .map(|thread| {
                    let snippet = thread.snippet.top_level_comment.snippet;
                    Comment {
                        author_display_name: snippet.author_display_name,
                        text_original: snippet.text_original,
                    }
                })
                .collect(),
            next_page_token: list.next_page_token.filter(|token| !token.is_empty()),
        })
    }
}
