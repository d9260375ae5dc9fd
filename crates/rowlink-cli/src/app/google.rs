//! Google Custom Search as a [`LookupClient`].
//!
//! One `GET https://www.googleapis.com/customsearch/v1` per lookup, scoped to
//! image results. The pipeline owns the per-call deadline, so requests here
//! carry only a connect timeout; an in-flight request is aborted when the
//! task future is dropped.

use anyhow::Context;
use core::time::Duration;
use reqwest::StatusCode;
use rowlink::{LookupClient, SearchHit, SearchOptions};
use serde::Deserialize;

const ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Longest response-body excerpt carried in a status error.
const ERROR_BODY_LIMIT: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum GoogleError {
    #[error("Search request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Search request rejected (status={status}): {body}")]
    Status { status: StatusCode, body: String },
}

pub struct GoogleSearchClient {
    http: reqwest::Client,
    api_key: String,
    engine_id: String,
}

impl GoogleSearchClient {
    pub fn new(api_key: &str, engine_id: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            api_key: api_key.to_string(),
            engine_id: engine_id.to_string(),
        })
    }

    fn params<'a>(&'a self, key: &'a str, options: &SearchOptions) -> Vec<(&'static str, &'a str)> {
        let mut params = vec![
            ("key", self.api_key.as_str()),
            ("cx", self.engine_id.as_str()),
            ("q", key),
            ("searchType", "image"),
        ];
        if let Some(image_type) = options.image_type.as_param() {
            params.push(("imgType", image_type));
        }
        if let Some(image_size) = options.image_size.as_param() {
            params.push(("imgSize", image_size));
        }
        params
    }
}

/// Clips `body` to at most [`ERROR_BODY_LIMIT`] bytes, on a character
/// boundary, marking the cut with `...`.
fn excerpt(mut body: String) -> String {
    if body.len() > ERROR_BODY_LIMIT {
        let mut end = ERROR_BODY_LIMIT;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
        body.push_str("...");
    }
    body
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    /// Absent entirely when the query matched nothing.
    #[serde(default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    link: String,
}

impl LookupClient for GoogleSearchClient {
    type Error = GoogleError;

    async fn search(
        &self,
        key: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchHit>, GoogleError> {
        let response = self
            .http
            .get(ENDPOINT)
            .query(&self.params(key, options))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = excerpt(response.text().await.unwrap_or_default());
            return Err(GoogleError::Status { status, body });
        }

        let parsed: SearchResponse = response.json().await?;
        Ok(parsed
            .items
            .into_iter()
            .map(|item| SearchHit::new(item.link))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowlink::{ImageSize, ImageType};

    fn client() -> GoogleSearchClient {
        GoogleSearchClient::new("secret", "engine").unwrap()
    }

    #[test]
    fn scopes_every_request_to_image_search() {
        let client = client();
        let params = client.params("tabby cat", &SearchOptions::default());
        assert_eq!(
            params,
            vec![
                ("key", "secret"),
                ("cx", "engine"),
                ("q", "tabby cat"),
                ("searchType", "image"),
            ]
        );
    }

    #[test]
    fn configured_filters_become_query_parameters() {
        let options = SearchOptions {
            image_type: ImageType::Photo,
            image_size: ImageSize::Xxlarge,
        };
        let client = client();
        let params = client.params("cat", &options);
        assert!(params.contains(&("imgType", "photo")));
        assert!(params.contains(&("imgSize", "xxlarge")));
    }

    #[test]
    fn undefined_filters_are_omitted() {
        let client = client();
        let params = client.params("cat", &SearchOptions::default());
        assert!(!params.iter().any(|(name, _)| *name == "imgType"));
        assert!(!params.iter().any(|(name, _)| *name == "imgSize"));
    }

    #[test]
    fn a_response_without_items_is_zero_results() {
        let parsed: SearchResponse =
            serde_json::from_str(r#"{"kind": "customsearch#search"}"#).unwrap();
        assert!(parsed.items.is_empty());
    }

    #[test]
    fn extracts_item_links_in_order() {
        let parsed: SearchResponse = serde_json::from_str(
            r#"{
                "items": [
                    {"link": "https://img.example/cat.png", "title": "a cat"},
                    {"link": "https://img.example/cat2.png"}
                ]
            }"#,
        )
        .unwrap();
        let links: Vec<_> = parsed.items.iter().map(|item| item.link.as_str()).collect();
        assert_eq!(
            links,
            vec!["https://img.example/cat.png", "https://img.example/cat2.png"]
        );
    }

    #[test]
    fn status_error_bodies_are_clipped() {
        assert_eq!(excerpt("quota exceeded".to_string()), "quota exceeded");

        let clipped = excerpt("x".repeat(4 * 1024));
        assert_eq!(clipped.len(), ERROR_BODY_LIMIT + 3);
        assert!(clipped.ends_with("..."));

        // A limit falling inside a multi-byte character backs off to the
        // previous boundary instead of panicking.
        let clipped = excerpt("€".repeat(100));
        assert!(clipped.ends_with("..."));
        assert!(clipped.len() <= ERROR_BODY_LIMIT + 3);
    }
}
