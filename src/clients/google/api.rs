//! Wire types and request plumbing for the Blogger v3 REST API.

use chrono::{DateTime, Utc};
use quill_common::rest;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::{Error, Result};

pub const API_BASE: &str = "https://www.googleapis.com/blogger/v3";
/// Hard cap the service enforces on list page sizes.
pub const MAX_RESULTS_PER_REQUEST: usize = 500;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogList {
    #[serde(default)]
    pub items: Vec<Blog>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blog {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostList {
    #[serde(default)]
    pub items: Vec<Post>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageList {
    #[serde(default)]
    pub items: Vec<Page>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Shape of the blog's `/feeds/posts/summary?alt=json` feed, which is the
/// only place the v3 surface exposes the label vocabulary.
#[derive(Debug, Deserialize)]
pub struct CategoryFeedResponse {
    #[serde(default)]
    pub feed: Option<CategoryFeed>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CategoryFeed {
    #[serde(default)]
    pub category: Vec<CategoryTerm>,
}

#[derive(Debug, Deserialize)]
pub struct CategoryTerm {
    pub term: String,
}

/// Executes one authenticated JSON request. Non-success statuses map into
/// the shared taxonomy; the caller decides whether a 403 warrants a token
/// refresh and retry.
pub async fn send_json(
    access_token: &str,
    request: RequestBuilder,
    operation: &str,
) -> Result<Response> {
    let response = request.bearer_auth(access_token).send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(rest::status_error(operation, status, &body));
    }
    Ok(response)
}

pub async fn get_json<T: DeserializeOwned>(
    http: &Client,
    access_token: &str,
    url: &str,
    query: &[(&str, String)],
) -> Result<T> {
    let operation = format!("GET {}", url);
    debug!("{} {:?}", operation, query);
    let request = http.request(Method::GET, url).query(query);
    let response = send_json(access_token, request, &operation).await?;
    parse_json(response, &operation).await
}

pub async fn send_body<B: Serialize, T: DeserializeOwned>(
    http: &Client,
    access_token: &str,
    method: Method,
    url: &str,
    query: &[(&str, String)],
    body: &B,
) -> Result<T> {
    let operation = format!("{} {}", method, url);
    debug!("{} {:?}", operation, query);
    let request = http.request(method, url).query(query).json(body);
    let response = send_json(access_token, request, &operation).await?;
    parse_json(response, &operation).await
}

pub async fn delete(http: &Client, access_token: &str, url: &str) -> Result<()> {
    let operation = format!("DELETE {}", url);
    let request = http.request(Method::DELETE, url);
    send_json(access_token, request, &operation).await?;
    Ok(())
}

async fn parse_json<T: DeserializeOwned>(response: Response, operation: &str) -> Result<T> {
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| {
        Error::invalid_response(operation, format!("malformed JSON response: {}", e), body)
    })
}

/// Whether an error is the access-denied shape worth one token refresh.
pub fn is_stale_token_error(error: &Error) -> bool {
    matches!(error, Error::Authentication { code, .. } if code == "403" || code == "401")
}

/// Whether an error is a transient conflict worth retrying as-is.
pub fn is_conflict_error(error: &Error) -> bool {
    matches!(error, Error::Provider { code, .. } if code == StatusCode::CONFLICT.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_lists_deserialize() {
        let list: PostList = serde_json::from_str(
            r#"{
                "items": [
                    {"id": "1", "title": "A", "content": "<p>a</p>",
                     "published": "2020-01-01T00:00:00Z", "labels": ["x","y"],
                     "status": "LIVE", "url": "http://example.com/a"}
                ],
                "nextPageToken": "tok"
            }"#,
        )
        .unwrap();
        assert_eq!(list.items.len(), 1);
        assert_eq!(list.items[0].labels.as_ref().unwrap().len(), 2);
        assert_eq!(list.next_page_token.as_deref(), Some("tok"));
    }

    #[test]
    fn missing_items_default_to_empty() {
        let list: PostList = serde_json::from_str("{}").unwrap();
        assert!(list.items.is_empty());
        assert!(list.next_page_token.is_none());
    }

    #[test]
    fn category_feed_terms_parse() {
        let feed: CategoryFeedResponse = serde_json::from_str(
            r#"{"feed": {"category": [{"term": "rust"}, {"term": "blog"}]}}"#,
        )
        .unwrap();
        let categories = feed.feed.unwrap().category;
        let terms: Vec<&str> = categories.iter().map(|c| c.term.as_str()).collect();
        assert_eq!(terms, ["rust", "blog"]);
    }

    #[test]
    fn new_posts_serialize_without_empty_ids() {
        let post = Post {
            title: "T".to_string(),
            content: "C".to_string(),
            ..Post::default()
        };
        let json = serde_json::to_string(&post).unwrap();
        assert!(!json.contains("\"id\""));
        assert!(!json.contains("\"status\""));
    }
}
