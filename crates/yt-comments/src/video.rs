use crate::Error;
use url::Url;

/// Host of the canonical watch page
pub const WATCH_HOST: &str = "www.youtube.com";

/// Extract the `v` parameter from a `https://www.youtube.com/watch?v=<id>` URL.
pub fn extract_video_id(video_url: &str) -> Result<String, Error> {
    let url = Url::parse(video_url)
        .map_err(|e| Error::InvalidInput(format!("'{}' is not a valid URL: {}", video_url, e)))?;

    if url.host_str() != Some(WATCH_HOST) {
        return Err(Error::InvalidInput(format!(
            "youtube url was not in correct format, expected https://{}/watch?v=<id>",
            WATCH_HOST
        )));
    }

    url.query_pairs()
        .find(|(key, _)| key == "v")
        .map(|(_, value)| value.into_owned())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| Error::InvalidInput(format!("'{}' has no video id", video_url)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_v_parameter() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=BIk1zUy8ehU&ab_channel=LexFridman")
                .unwrap(),
            "BIk1zUy8ehU"
        );
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?ab_channel=Katherout&v=oYBGPVwNK2c")
                .unwrap(),
            "oYBGPVwNK2c"
        );
    }

    #[test]
    fn rejects_other_shapes() {
        for url in [
            "https://youtu.be/BIk1zUy8ehU",
            "https://youtube.com/watch?v=BIk1zUy8ehU",
            "https://www.example.com/watch?v=BIk1zUy8ehU",
            "www.youtube.com/watch?v=BIk1zUy8ehU",
            "https://www.youtube.com/watch",
            "https://www.youtube.com/watch?v=",
            "not a url",
            "",
        ] {
            assert!(
                matches!(extract_video_id(url), Err(Error::InvalidInput(_))),
                "{} should be rejected",
                url
            );
        }
    }
}
