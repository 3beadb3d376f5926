//! Comment aggregation and winner selection on top of the YouTube Data API v3.
//!
//! [`YouTubeService`] walks the `commentThreads.list` cursor either up to a
//! requested count or to the end (collecting distinct commenters), and
//! [`Sampler`] draws winners from the result.

mod error;
mod sampler;
mod service;
mod video;

pub use error::Error;
pub use sampler::Sampler;
pub use service::{
    Comment, CredentialSource, DEFAULT_BASE_URL, MAX_PAGE_SIZE, ServiceConfig, YouTubeService,
};
pub use video::{WATCH_HOST, extract_video_id};
