//! REST-ful XML requests: fetch and send `xmltree` documents, keeping track
//! of the final URL after redirects and of the concurrency-related response
//! headers (ETag, Location, Content-Location).

use reqwest::header::{CONTENT_LOCATION, CONTENT_TYPE, ETAG, IF_MATCH, LOCATION};
use reqwest::{Client, Method, StatusCode};
use tracing::debug;
use xmltree::Element;

use crate::error::{Error, Result};
use crate::request::{follow_redirects, RequestFilter};
use crate::xmlutil;

/// Outcome of an XML REST request.
pub struct XmlResponse {
    /// URL the final (post-redirect) request was made against.
    pub url: String,
    pub status: StatusCode,
    pub etag: Option<String>,
    pub location: Option<String>,
    pub content_location: Option<String>,
    /// Parsed body, when there was a non-blank one.
    pub document: Option<Element>,
}

/// GET with optional query parameters. Parameters with an empty value are
/// dropped along with their name.
pub async fn get(
    client: &Client,
    filter: &RequestFilter,
    url: &str,
    parameters: &[(&str, &str)],
) -> Result<XmlResponse> {
    simple_request(client, filter, Method::GET, url, parameters).await
}

pub async fn delete(
    client: &Client,
    filter: &RequestFilter,
    url: &str,
    etag: Option<&str>,
) -> Result<XmlResponse> {
    let etag = etag.map(|e| e.to_string());
    let response = follow_redirects(url, |current| {
        let mut request = client.request(Method::DELETE, current);
        if let Some(ref etag) = etag {
            request = request.header(IF_MATCH, etag);
        }
        Ok(filter(request))
    })
    .await?;
    read_response("DELETE", response).await
}

/// POST an XML document.
pub async fn post(
    client: &Client,
    filter: &RequestFilter,
    url: &str,
    content_type: &str,
    document: &Element,
) -> Result<XmlResponse> {
    send(client, filter, Method::POST, url, None, content_type, document).await
}

/// PUT an XML document, optionally guarded by an `If-match` precondition.
pub async fn put(
    client: &Client,
    filter: &RequestFilter,
    url: &str,
    etag: Option<&str>,
    content_type: &str,
    document: &Element,
) -> Result<XmlResponse> {
    send(client, filter, Method::PUT, url, etag, content_type, document).await
}

async fn simple_request(
    client: &Client,
    filter: &RequestFilter,
    method: Method,
    url: &str,
    parameters: &[(&str, &str)],
) -> Result<XmlResponse> {
    let full_url = append_parameters(url, parameters);
    let operation = format!("{} {}", method, full_url);
    let response = follow_redirects(&full_url, |current| {
        Ok(filter(client.request(method.clone(), current)))
    })
    .await?;
    read_response(&operation, response).await
}

async fn send(
    client: &Client,
    filter: &RequestFilter,
    method: Method,
    url: &str,
    etag: Option<&str>,
    content_type: &str,
    document: &Element,
) -> Result<XmlResponse> {
    let body = xmlutil::to_xml_string(document)?;
    debug!("XML request to {}:\n{}", url, body);
    let operation = format!("{} {}", method, url);
    let etag = etag.map(|e| e.to_string());
    let response = follow_redirects(url, |current| {
        let mut request = client
            .request(method.clone(), current)
            .header(CONTENT_TYPE, content_type)
            .body(body.clone());
        if let Some(ref etag) = etag {
            request = request.header(IF_MATCH, etag);
        }
        Ok(filter(request))
    })
    .await?;
    read_response(&operation, response).await
}

async fn read_response(operation: &str, response: reqwest::Response) -> Result<XmlResponse> {
    let status = response.status();
    let final_url = response.url().to_string();
    let header = |name| {
        response
            .headers()
            .get(name)
            .and_then(|v: &reqwest::header::HeaderValue| v.to_str().ok())
            .map(str::to_string)
    };
    let etag = header(ETAG);
    let location = header(LOCATION);
    let content_location = header(CONTENT_LOCATION);
    let body = response.text().await?;
    if !status.is_success() {
        return Err(status_error(operation, status, &body));
    }
    let document = if body.trim().is_empty() {
        None
    } else {
        Some(Element::parse(body.as_bytes()).map_err(|e| {
            Error::invalid_response(operation, format!("malformed XML document: {}", e), body)
        })?)
    };
    Ok(XmlResponse {
        url: final_url,
        status,
        etag,
        location,
        content_location,
        document,
    })
}

/// Maps a non-success HTTP status to the error taxonomy: 401/403 are
/// authentication failures, anything else is a provider fault carrying the
/// status code.
pub fn status_error(operation: &str, status: StatusCode, body: &str) -> Error {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::authentication(
            status.as_str(),
            status.canonical_reason().unwrap_or("access denied"),
        ),
        _ => {
            let excerpt: String = body.chars().take(512).collect();
            Error::Provider {
                code: status.as_str().to_string(),
                message: format!(
                    "{} during {}: {}",
                    status.canonical_reason().unwrap_or("request failed"),
                    operation,
                    excerpt.trim()
                )
                .trim()
                .to_string(),
            }
        }
    }
}

fn append_parameters(url: &str, parameters: &[(&str, &str)]) -> String {
    let query: Vec<String> = parameters
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(name, value)| {
            format!(
                "{}={}",
                name,
                url::form_urlencoded::byte_serialize(value.as_bytes()).collect::<String>()
            )
        })
        .collect();
    if query.is_empty() {
        return url.to_string();
    }
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}{}", url, separator, query.join("&"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_parameter_values_are_dropped() {
        let url = append_parameters("http://example.com/atom", &[("svc", "post"), ("id", "")]);
        assert_eq!(url, "http://example.com/atom?svc=post");
    }

    #[test]
    fn parameters_append_to_existing_query() {
        let url = append_parameters("http://example.com/atom?alt=json", &[("id", "100")]);
        assert_eq!(url, "http://example.com/atom?alt=json&id=100");
    }

    #[test]
    fn status_errors_map_to_taxonomy() {
        match status_error("GET x", StatusCode::UNAUTHORIZED, "") {
            Error::Authentication { code, .. } => assert_eq!(code, "401"),
            other => panic!("unexpected error: {:?}", other),
        }
        match status_error("GET x", StatusCode::INTERNAL_SERVER_ERROR, "boom") {
            Error::Provider { code, message } => {
                assert_eq!(code, "500");
                assert!(message.contains("boom"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
