//! Service detection: maps a homepage URL to a provider, client type,
//! endpoint and blog id. The cascade tries the cheapest, most reliable
//! signals first and records every failure instead of aborting, so a
//! partially broken homepage still yields the best available answer.

use quill_common::request::{self, follow_redirects};
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use crate::blogs::BlogInfo;
use crate::clients::{create_client, ClientType};
use crate::credentials::CredentialsAccessor;
use crate::providers::{ProviderCatalog, ProviderDescriptor};
use crate::{Error, Result};

pub mod homepage;
pub mod rsd;

use homepage::HeadInfo;

/// What detection concluded. `blog_id` can be empty when the service was
/// identified but the account's blog could not be narrowed down yet.
#[derive(Clone, Debug)]
pub struct DetectedService {
    pub provider_id: Option<String>,
    pub client_type: ClientType,
    pub post_api_url: String,
    pub blog_id: String,
    pub blog_name: String,
    pub homepage_url: String,
}

/// One recorded failure: a stable message id plus its parameters, kept
/// separate so front ends can localize.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DetectionError {
    pub message_id: &'static str,
    pub params: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct DetectionReport {
    pub errors: Vec<DetectionError>,
    /// Set when any failure looked like rejected credentials, so callers
    /// can re-prompt instead of blaming the blog.
    pub authentication_error: bool,
}

impl DetectionReport {
    fn record(&mut self, message_id: &'static str, params: Vec<String>) {
        debug!("detection: {} {:?}", message_id, params);
        self.errors.push(DetectionError { message_id, params });
    }

    fn record_error(&mut self, error: &Error) {
        if let Error::Authentication { .. } = error {
            self.authentication_error = true;
            self.record("authentication_failed", vec![error.to_string()]);
        } else {
            self.record("detection_step_failed", vec![error.to_string()]);
        }
    }
}

const BLOGGER_SUFFIXES: &[&str] = &[
    "/index.html",
    "/",
    "/index.htm",
    "/index.php",
    "/default.htm",
    "/default.html",
];

/// Canonical form for comparing Blogger homepage URLs: whitespace
/// trimmed, at most one well-known index suffix stripped, case folded.
pub fn normalize_blogger_homepage_url(url: &str) -> String {
    let trimmed = url.trim();
    let lower = trimmed.to_ascii_lowercase();
    for suffix in BLOGGER_SUFFIXES {
        if lower.len() > suffix.len() && lower.ends_with(suffix) {
            return trimmed[..trimmed.len() - suffix.len()].to_ascii_uppercase();
        }
    }
    trimmed.to_ascii_uppercase()
}

fn normalize_homepage_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_ascii_uppercase()
}

/// Blogger blogs are recognizable without talking to the API.
pub fn looks_like_blogger(homepage_url: &str, generator: Option<&str>) -> bool {
    if let Ok(url) = Url::parse(homepage_url) {
        if let Some(host) = url.host_str() {
            let host = host.to_ascii_lowercase();
            if host.ends_with(".blogspot.com") || host == "www.blogger.com" {
                return true;
            }
        }
    }
    generator
        .map(|g| g.to_ascii_lowercase().contains("blogger"))
        .unwrap_or(false)
}

/// Picks the account's blog out of a service's blog list: the one whose
/// homepage matches, or the only one there is.
fn select_blog<'a>(
    blogs: &'a [BlogInfo],
    homepage_url: &str,
    normalize: fn(&str) -> String,
) -> Option<&'a BlogInfo> {
    let wanted = normalize(homepage_url);
    blogs
        .iter()
        .find(|b| !b.homepage_url.is_empty() && normalize(&b.homepage_url) == wanted)
        .or_else(|| if blogs.len() == 1 { blogs.first() } else { None })
}

pub struct BlogServiceDetector {
    http: Client,
    catalog: ProviderCatalog,
    credentials: CredentialsAccessor,
    homepage_url: String,
}

impl BlogServiceDetector {
    pub fn new(
        catalog: ProviderCatalog,
        credentials: CredentialsAccessor,
        homepage_url: &str,
    ) -> Result<BlogServiceDetector> {
        Ok(BlogServiceDetector {
            http: request::build_client()?,
            catalog,
            credentials,
            homepage_url: homepage_url.to_string(),
        })
    }

    /// Runs the whole cascade. Failures along the way end up in the
    /// report; only a fully exhausted cascade returns `None`.
    pub async fn detect(&self) -> (Option<DetectedService>, DetectionReport) {
        let mut report = DetectionReport::default();
        let service = self.run(&mut report).await;
        (service, report)
    }

    async fn run(&self, report: &mut DetectionReport) -> Option<DetectedService> {
        let (final_url, html) = match self.fetch(&self.homepage_url).await {
            Ok(page) => page,
            Err(e) => {
                report.record_error(&e);
                report.record(
                    "homepage_unreachable",
                    vec![self.homepage_url.clone()],
                );
                // no homepage, but URL-pattern matching can still work
                (self.homepage_url.clone(), String::new())
            }
        };
        let head = homepage::scan_head(&html);

        match self.try_atom_service_link(&head, &final_url, true).await {
            Ok(Some(service)) => return Some(service),
            Ok(None) => {}
            Err(e) => report.record_error(&e),
        }

        if looks_like_blogger(&final_url, head.generator()) {
            return Some(self.blogger_service(&final_url, report).await);
        }

        match self.try_rsd(&head, &final_url).await {
            Ok(Some(service)) => return Some(service),
            Ok(None) => {}
            Err(e) => report.record_error(&e),
        }

        let provider = self
            .catalog
            .find_by_homepage_url(&final_url)
            .or_else(|| self.catalog.find_by_homepage_content(&html));
        if let Some(provider) = provider {
            return Some(self.provider_service(provider, &final_url, report).await);
        }

        match self.try_atom_service_link(&head, &final_url, false).await {
            Ok(Some(service)) => return Some(service),
            Ok(None) => {}
            Err(e) => report.record_error(&e),
        }

        report.record("no_service_detected", vec![final_url]);
        None
    }

    async fn fetch(&self, url: &str) -> Result<(String, String)> {
        let response = follow_redirects(url, |current| Ok(self.http.get(current))).await?;
        let status = response.status();
        let final_url = response.url().to_string();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(quill_common::rest::status_error(
                &format!("GET {}", url),
                status,
                &body,
            ));
        }
        Ok((final_url, body))
    }

    async fn try_atom_service_link(
        &self,
        head: &HeadInfo,
        homepage_url: &str,
        require_service_rel: bool,
    ) -> Result<Option<DetectedService>> {
        let link = match head.atom_service_links(require_service_rel).first() {
            Some(link) => (*link).clone(),
            None => return Ok(None),
        };
        let endpoint = request::merge_urls(homepage_url, &link.href)?;
        debug!("trying AtomPub service document at {}", endpoint);
        let client = create_client(ClientType::Atom, &endpoint, self.credentials.clone())?;
        let blogs = client.get_users_blogs().await?;
        let blog = select_blog(&blogs, homepage_url, normalize_homepage_url);
        Ok(Some(DetectedService {
            provider_id: None,
            client_type: ClientType::Atom,
            post_api_url: endpoint,
            blog_id: blog.map(|b| b.id.clone()).unwrap_or_default(),
            blog_name: blog.map(|b| b.name.clone()).unwrap_or_default(),
            homepage_url: blog
                .map(|b| b.homepage_url.clone())
                .filter(|h| !h.is_empty())
                .unwrap_or_else(|| homepage_url.to_string()),
        }))
    }

    /// Blogger identification is certain at this point; narrowing down the
    /// blog needs the API and may fail without invalidating the result.
    async fn blogger_service(
        &self,
        homepage_url: &str,
        report: &mut DetectionReport,
    ) -> DetectedService {
        let mut service = DetectedService {
            provider_id: Some("google-blogger".to_string()),
            client_type: ClientType::GoogleBloggerV3,
            post_api_url: crate::clients::google::api::API_BASE.to_string(),
            blog_id: String::new(),
            blog_name: String::new(),
            homepage_url: homepage_url.to_string(),
        };
        let narrowed: Result<()> = async {
            let client = create_client(
                ClientType::GoogleBloggerV3,
                &service.post_api_url,
                self.credentials.clone(),
            )?;
            let blogs = client.get_users_blogs().await?;
            if let Some(blog) =
                select_blog(&blogs, homepage_url, normalize_blogger_homepage_url)
            {
                service.blog_id = blog.id.clone();
                service.blog_name = blog.name.clone();
            } else {
                warn!("no Blogger blog matched {}", homepage_url);
            }
            Ok(())
        }
        .await;
        if let Err(e) = narrowed {
            report.record_error(&e);
        }
        service
    }

    async fn try_rsd(
        &self,
        head: &HeadInfo,
        homepage_url: &str,
    ) -> Result<Option<DetectedService>> {
        let edit_uri = match head.edit_uri() {
            Some(href) => request::merge_urls(homepage_url, href)?,
            None => return Ok(None),
        };
        debug!("fetching RSD from {}", edit_uri);
        let (_, body) = self.fetch(&edit_uri).await?;
        let rsd = rsd::parse(&edit_uri, &body)?;

        let provider = self
            .catalog
            .find_by_rsd_engine_link(&rsd.engine_link)
            .or_else(|| self.catalog.find_by_rsd_engine_name(&rsd.engine_name));
        let homepage = if rsd.homepage_link.is_empty() {
            homepage_url.to_string()
        } else {
            rsd.homepage_link.clone()
        };
        if let Some(provider) = provider {
            // prefer the endpoint the blog itself advertises over the
            // provider's template when the protocols line up
            let (post_api_url, blog_id) = match (provider.client_type, rsd.adhoc_api()) {
                (ClientType::Blogger, Some(api)) => (api.api_link.clone(), api.blog_id.clone()),
                _ => (
                    provider.resolve_post_api_url(&self.credentials.username()),
                    String::new(),
                ),
            };
            return Ok(Some(DetectedService {
                provider_id: Some(provider.id.clone()),
                client_type: provider.client_type,
                post_api_url,
                blog_id,
                blog_name: String::new(),
                homepage_url: homepage,
            }));
        }
        Ok(rsd.adhoc_api().map(|api| DetectedService {
            provider_id: None,
            client_type: ClientType::Blogger,
            post_api_url: api.api_link.clone(),
            blog_id: api.blog_id.clone(),
            blog_name: String::new(),
            homepage_url: homepage,
        }))
    }

    /// A provider matched on URL or page content: resolve its endpoint
    /// template and, when possible, narrow the blog through the account's
    /// blog list.
    async fn provider_service(
        &self,
        provider: &ProviderDescriptor,
        homepage_url: &str,
        report: &mut DetectionReport,
    ) -> DetectedService {
        let post_api_url = provider.resolve_post_api_url(&self.credentials.username());
        let mut service = DetectedService {
            provider_id: Some(provider.id.clone()),
            client_type: provider.client_type,
            post_api_url: post_api_url.clone(),
            blog_id: String::new(),
            blog_name: String::new(),
            homepage_url: homepage_url.to_string(),
        };
        if !ProviderDescriptor::url_is_resolved(&post_api_url) {
            report.record("endpoint_unresolved", vec![post_api_url]);
            return service;
        }
        let narrowed: Result<()> = async {
            let client = create_client(
                provider.client_type,
                &service.post_api_url,
                self.credentials.clone(),
            )?;
            let blogs = client.get_users_blogs().await?;
            if let Some(blog) = select_blog(&blogs, homepage_url, normalize_homepage_url) {
                service.blog_id = blog.id.clone();
                service.blog_name = blog.name.clone();
            }
            Ok(())
        }
        .await;
        if let Err(e) = narrowed {
            report.record_error(&e);
        }
        service
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blogger_homepage_urls_normalize() {
        assert_eq!(
            normalize_blogger_homepage_url(" http://ann.blogspot.com/index.html "),
            "HTTP://ANN.BLOGSPOT.COM"
        );
        assert_eq!(
            normalize_blogger_homepage_url("http://ann.blogspot.com/"),
            "HTTP://ANN.BLOGSPOT.COM"
        );
        // only one suffix is stripped
        assert_eq!(
            normalize_blogger_homepage_url("http://ann.blogspot.com/blog/index.php"),
            "HTTP://ANN.BLOGSPOT.COM/BLOG"
        );
        assert_eq!(
            normalize_blogger_homepage_url("http://ann.blogspot.com/posts"),
            "HTTP://ANN.BLOGSPOT.COM/POSTS"
        );
    }

    #[test]
    fn blogger_heuristics_use_host_and_generator() {
        assert!(looks_like_blogger("http://ann.blogspot.com/", None));
        assert!(looks_like_blogger(
            "http://example.com/",
            Some("Blogger 7.0")
        ));
        assert!(!looks_like_blogger("http://example.com/", Some("WordPress")));
        assert!(!looks_like_blogger("http://example.com/", None));
    }

    #[test]
    fn blog_selection_matches_homepage_then_singleton() {
        let blogs = vec![
            BlogInfo::new("1", "One", "http://one.example.com/"),
            BlogInfo::new("2", "Two", "http://two.example.com"),
        ];
        assert_eq!(
            select_blog(&blogs, "http://two.example.com/", normalize_homepage_url)
                .map(|b| b.id.as_str()),
            Some("2")
        );
        assert!(select_blog(&blogs, "http://three.example.com/", normalize_homepage_url).is_none());
        let single = vec![BlogInfo::new("9", "Nine", "http://nine.example.com/")];
        assert_eq!(
            select_blog(&single, "http://other.example.com/", normalize_homepage_url)
                .map(|b| b.id.as_str()),
            Some("9")
        );
    }
}
