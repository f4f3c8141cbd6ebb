use std::sync::Arc;

use reqwest::header::LOCATION;
use reqwest::{Client, RequestBuilder, Response};
use tracing::debug;

use crate::error::{Error, Result};

/// Decorates an outgoing request, typically with authentication headers.
pub type RequestFilter = Arc<dyn Fn(RequestBuilder) -> RequestBuilder + Send + Sync>;

pub fn no_op_filter() -> RequestFilter {
    Arc::new(|r| r)
}

const MAX_REDIRECTS: usize = 50;

/// Builds the shared HTTP client. Automatic redirects are disabled so that
/// [`follow_redirects`] can re-issue the original request (method, body and
/// headers included) at each hop.
pub fn build_client() -> Result<Client> {
    Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(Error::from)
}

/// Outcome of one request in a redirect chase.
enum Hop<T> {
    Done(T),
    Redirect(Option<String>),
}

/// The redirect loop itself, driven by a `send` callback so the hop
/// accounting does not depend on a live socket. A redirect without a
/// Location header, or more than 50 hops, is an invalid server response.
async fn drive_redirects<T, F, Fut>(initial_url: &str, mut send: F) -> Result<T>
where
    F: FnMut(String) -> Fut,
    Fut: std::future::Future<Output = Result<Hop<T>>>,
{
    let mut url = initial_url.to_string();
    for _ in 0..MAX_REDIRECTS {
        match send(url.clone()).await? {
            Hop::Done(response) => return Ok(response),
            Hop::Redirect(location) => {
                let location = location.filter(|v| !v.is_empty()).ok_or_else(|| {
                    Error::invalid_response(
                        initial_url,
                        "An invalid redirect was returned (Location header was expected but not found)",
                        "",
                    )
                })?;
                let next = merge_urls(&url, &location)?;
                debug!("redirected from {} to {}", url, next);
                url = next;
            }
        }
    }
    Err(Error::invalid_response(
        initial_url,
        "Allowed number of redirects (50) was exceeded",
        "",
    ))
}

/// Issues the request built by `factory`, chasing up to 50 redirects by
/// rebuilding the request against each Location.
pub async fn follow_redirects<F>(initial_url: &str, mut factory: F) -> Result<Response>
where
    F: FnMut(&str) -> Result<RequestBuilder>,
{
    drive_redirects(initial_url, |url| {
        let request = factory(&url);
        async move {
            let response = request?.send().await?;
            if !response.status().is_redirection() {
                return Ok(Hop::Done(response));
            }
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            Ok(Hop::Redirect(location))
        }
    })
    .await
}

/// Resolves a Location target against the URL it redirected from. When the
/// old URL carried a query string and the new one does not, the old query is
/// kept, since some services drop it when rewriting the path.
pub fn merge_urls(old_url: &str, new_url: &str) -> Result<String> {
    let base = url::Url::parse(old_url)?;
    let target = base.join(new_url)?;
    if target.query().is_none() {
        if let Some(query) = base.query() {
            let mut merged = target;
            merged.set_query(Some(query));
            return Ok(merged.to_string());
        }
    }
    Ok(target.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_old_query_when_new_has_none() {
        let merged = merge_urls(
            "http://example.com/atom?svc=post&id=100",
            "http://example.com/atom2",
        )
        .unwrap();
        assert_eq!(merged, "http://example.com/atom2?svc=post&id=100");
    }

    #[test]
    fn merge_prefers_new_query() {
        let merged = merge_urls(
            "http://example.com/atom?svc=post",
            "http://example.com/atom2?svc=page",
        )
        .unwrap();
        assert_eq!(merged, "http://example.com/atom2?svc=page");
    }

    #[test]
    fn merge_resolves_relative_locations() {
        let merged = merge_urls("http://example.com/a/b", "/c").unwrap();
        assert_eq!(merged, "http://example.com/c");
    }

    #[tokio::test]
    async fn redirect_chases_stop_after_fifty_hops() {
        let mut hops = 0;
        let result: Result<()> = drive_redirects("http://example.com/start", |_| {
            hops += 1;
            async { Ok(Hop::Redirect(Some("/again".to_string()))) }
        })
        .await;
        assert!(matches!(result, Err(Error::InvalidServerResponse { .. })));
        assert_eq!(hops, 50);
    }

    #[tokio::test]
    async fn redirects_without_a_location_fail() {
        let result: Result<()> = drive_redirects("http://example.com/start", |_| async {
            Ok(Hop::Redirect(None))
        })
        .await;
        assert!(matches!(result, Err(Error::InvalidServerResponse { .. })));
    }

    #[tokio::test]
    async fn redirect_targets_resolve_against_the_previous_hop() {
        let mut urls = Vec::new();
        let result = drive_redirects("http://example.com/a/start", |url| {
            urls.push(url);
            let hop = if urls.len() == 1 {
                Hop::Redirect(Some("next".to_string()))
            } else {
                Hop::Done(())
            };
            async move { Ok(hop) }
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(urls, ["http://example.com/a/start", "http://example.com/a/next"]);
    }
}
