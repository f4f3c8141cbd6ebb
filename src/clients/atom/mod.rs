//! AtomPub (RFC 5023) client, with compatibility behavior for the Atom 0.3
//! endpoints that predate it.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quill_common::request::{self, RequestFilter};
use quill_common::rest;
use quill_common::xmlutil;
use reqwest::Client;
use tracing::{debug, warn};
use xmltree::Element;

use crate::blogs::BlogInfo;
use crate::categories::BlogPostCategory;
use crate::credentials::CredentialsAccessor;
use crate::options::BlogClientOptions;
use crate::posts::{BlogPost, EditPostResult, PostResult};
use crate::{Error, Result};

use super::{BlogClient, NewCategoryContext};

pub mod entry;
pub mod version;

pub use entry::AtomEntry;
pub use version::AtomProtocolVersion;

const ENTRY_CONTENT_TYPE: &str = "application/atom+xml;type=entry";

/// Decides whether a PUT that lost an edit race may overwrite the server
/// copy. The default declines, which surfaces as `OperationCancelled`.
pub type OverwriteConfirmer = Arc<dyn Fn() -> bool + Send + Sync>;

/// Maps a collection feed URL to an alternate to retry with when the first
/// fetch fails. Used for endpoints whose feed URL needs fixups.
pub type FeedUrlRewriter = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

pub struct AtomClient {
    http: Client,
    credentials: CredentialsAccessor,
    post_api_url: String,
    version: AtomProtocolVersion,
    options: RwLock<BlogClientOptions>,
    confirm_overwrite: OverwriteConfirmer,
    feed_url_rewriter: Option<FeedUrlRewriter>,
}

/// Percent-encodes a slug for use as an HTTP header value: non-ASCII bytes
/// and literal `%` become `%XX`, line breaks are dropped.
pub fn encode_slug(slug: &str) -> String {
    let mut out = String::with_capacity(slug.len());
    for byte in slug.bytes() {
        match byte {
            b'\r' | b'\n' => {}
            b'%' => out.push_str("%25"),
            b if b > 0x7F => out.push_str(&format!("%{:02X}", b)),
            b => out.push(b as char),
        }
    }
    out
}

/// Weak validators cannot be used as `If-match` preconditions; treat them
/// as absent.
pub fn strong_etag(etag: Option<&str>) -> Option<String> {
    etag.map(str::trim)
        .filter(|e| !e.is_empty() && !e.starts_with("W/"))
        .map(str::to_string)
}

struct Collection {
    href: String,
    title: String,
    accepts: Vec<String>,
    categories: Vec<Element>,
}

/// Chained `app:categories` documents are rare; the cap stops a pair of
/// documents that reference each other.
const MAX_CATEGORY_DOC_HOPS: usize = 16;

enum CategoriesStep {
    /// Follow the href to another categories document.
    Fetch(String),
    /// The categories are inline in this document.
    Inline,
    /// The href points back at the document being processed.
    SelfReference,
}

/// One step of categories-document resolution. An `href` is resolved
/// against the URL of the document that carries it.
fn categories_step(element: &Element, document_url: &str) -> CategoriesStep {
    match element.attributes.get("href") {
        None => CategoriesStep::Inline,
        Some(href) => {
            let resolved = url::Url::parse(document_url)
                .and_then(|base| base.join(href))
                .map(|url| url.to_string())
                .unwrap_or_else(|_| href.clone());
            if resolved == document_url {
                CategoriesStep::SelfReference
            } else {
                CategoriesStep::Fetch(resolved)
            }
        }
    }
}

/// A collection takes entries when it lists no accept types at all, or any
/// of the entry-compatible ones.
fn accepts_entries(accepts: &[String]) -> bool {
    if accepts.is_empty() {
        return true;
    }
    accepts.iter().any(|accept| {
        let normalized: String = accept
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        matches!(
            normalized.as_str(),
            "entry" | "*/*" | "application/*" | "application/atom+xml;type=entry"
        )
    })
}

fn parse_workspaces(
    service: &Element,
    version: AtomProtocolVersion,
) -> Vec<(String, Vec<Collection>)> {
    let atom_ns = version.atom_ns();
    let pub_ns = version.pub_ns();
    xmlutil::children(service, pub_ns, "workspace")
        .into_iter()
        .map(|workspace| {
            let title = xmlutil::child(workspace, atom_ns, "title")
                .map(xmlutil::text_content)
                .unwrap_or_default();
            let collections = xmlutil::children(workspace, pub_ns, "collection")
                .into_iter()
                .filter_map(|collection| {
                    let href = collection.attributes.get("href")?.clone();
                    Some(Collection {
                        href,
                        title: xmlutil::child(collection, atom_ns, "title")
                            .map(xmlutil::text_content)
                            .unwrap_or_default(),
                        accepts: xmlutil::children(collection, pub_ns, "accept")
                            .into_iter()
                            .map(xmlutil::text_content)
                            .collect(),
                        categories: xmlutil::children(collection, pub_ns, "categories")
                            .into_iter()
                            .cloned()
                            .collect(),
                    })
                })
                .collect();
            (title, collections)
        })
        .collect()
}

fn blog_name(workspace_title: &str, collection_title: &str) -> String {
    match (workspace_title.is_empty(), collection_title.is_empty()) {
        (false, false) if workspace_title != collection_title => {
            format!("{} - {}", workspace_title, collection_title)
        }
        (false, _) => workspace_title.to_string(),
        (true, _) => collection_title.to_string(),
    }
}

impl AtomClient {
    pub fn new(post_api_url: &str, credentials: CredentialsAccessor) -> Result<AtomClient> {
        let mut options = BlogClientOptions::default();
        options.supports_categories = true;
        options.supports_multiple_categories = true;
        options.supports_excerpt = true;
        options.supports_custom_date = true;
        options.supports_slug = true;
        options.supports_post_as_draft = true;
        Ok(AtomClient {
            http: request::build_client()?,
            credentials,
            post_api_url: post_api_url.to_string(),
            version: AtomProtocolVersion::V10,
            options: RwLock::new(options),
            confirm_overwrite: Arc::new(|| false),
            feed_url_rewriter: None,
        })
    }

    pub fn with_version(mut self, version: AtomProtocolVersion) -> AtomClient {
        self.version = version;
        self
    }

    pub fn set_overwrite_confirmer(&mut self, confirmer: OverwriteConfirmer) {
        self.confirm_overwrite = confirmer;
    }

    pub fn set_feed_url_rewriter(&mut self, rewriter: FeedUrlRewriter) {
        self.feed_url_rewriter = Some(rewriter);
    }

    fn category_scheme(&self) -> Option<String> {
        self.options().category_scheme
    }

    fn entry_from_element(&self, element: Element) -> AtomEntry {
        AtomEntry::from_element(self.version, self.category_scheme(), element)
    }

    fn entry_to_post(&self, element: Element) -> BlogPost {
        let entry = self.entry_from_element(element);
        let mut post = BlogPost::default();
        // the edit URI doubles as the post id in AtomPub
        post.id = entry.edit_uri().unwrap_or_else(|| entry.id());
        post.title = entry.title();
        post.contents = entry.content_html().unwrap_or_default();
        post.excerpt = entry.excerpt();
        post.permalink = entry.permalink().unwrap_or_default();
        post.date_published = entry.publish_date();
        post.categories = entry.categories();
        let element = entry.into_element();
        post.remote_entry = Some(element);
        post
    }

    fn populate_entry(
        &self,
        entry: &mut AtomEntry,
        post: &BlogPost,
        publish: bool,
        new_category_context: Option<&dyn NewCategoryContext>,
    ) {
        let options = self.options();
        if post.is_new() {
            entry.generate_id();
        }
        entry.set_title(&post.title);
        // a trailing space defeats over-aggressive whitespace trimming on
        // some services, and is invisible in rendered HTML
        entry.set_content_html(&format!("{} ", post.contents));
        if options.supports_excerpt && !post.excerpt.is_empty() {
            entry.set_excerpt(&post.excerpt);
        }
        if options.supports_custom_date {
            if let Some(date) = post.date_published_override {
                entry.set_publish_date(date);
            }
        }
        entry.clear_categories();
        for category in post.categories.iter().filter(|c| !c.is_none_category()) {
            entry.add_category(category);
        }
        for category in &post.new_categories {
            entry.add_category(category);
            if let Some(context) = new_category_context {
                context.new_category_added(category);
            }
        }
        entry.set_draft(!publish);
    }

    async fn fetch_service_document(&self) -> Result<Element> {
        let filter = self.request_filter();
        let response = rest::get(&self.http, &filter, &self.post_api_url, &[]).await?;
        response.document.ok_or_else(|| {
            Error::invalid_response(&self.post_api_url, "empty service document", "")
        })
    }

    /// The blog homepage is the alternate HTML link of the collection's
    /// feed. A failure here only costs the homepage URL.
    async fn collection_homepage(&self, collection_url: &str) -> String {
        let filter = self.request_filter();
        match rest::get(&self.http, &filter, collection_url, &[]).await {
            Ok(response) => response
                .document
                .as_ref()
                .and_then(|feed| self.alternate_link(feed))
                .unwrap_or_default(),
            Err(e) => {
                warn!("could not fetch collection feed {}: {}", collection_url, e);
                String::new()
            }
        }
    }

    fn alternate_link(&self, element: &Element) -> Option<String> {
        xmlutil::children(element, self.version.atom_ns(), "link")
            .into_iter()
            .filter(|link| link.attributes.get("rel").map(String::as_str) == Some("alternate"))
            .find(|link| {
                matches!(
                    link.attributes.get("type").map(String::as_str),
                    None | Some("text/html") | Some("application/xhtml+xml")
                )
            })
            .and_then(|link| link.attributes.get("href").cloned())
    }

    fn next_link(&self, feed: &Element) -> Option<String> {
        xmlutil::children(feed, self.version.atom_ns(), "link")
            .into_iter()
            .find(|link| link.attributes.get("rel").map(String::as_str) == Some("next"))
            .and_then(|link| link.attributes.get("href").cloned())
    }

    async fn fetch_feed(&self, url: &str) -> Result<Element> {
        let filter = self.request_filter();
        let response = rest::get(&self.http, &filter, url, &[]).await?;
        response
            .document
            .ok_or_else(|| Error::invalid_response(url, "empty feed document", ""))
    }

    /// ETag for a resource, via HEAD, falling back to GET for servers that
    /// reject HEAD.
    async fn fetch_etag(&self, url: &str) -> Result<Option<String>> {
        let filter = self.request_filter();
        let head = request::follow_redirects(url, |current| {
            Ok(filter(self.http.head(current)))
        })
        .await?;
        let status = head.status();
        if status.is_success() {
            let etag = head
                .headers()
                .get(reqwest::header::ETAG)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            return Ok(strong_etag(etag.as_deref()));
        }
        if status.as_u16() == 405 || status.as_u16() == 501 {
            let response = rest::get(&self.http, &filter, url, &[]).await?;
            return Ok(strong_etag(response.etag.as_deref()));
        }
        let body = head.text().await.unwrap_or_default();
        Err(rest::status_error(&format!("HEAD {}", url), status, &body))
    }

    async fn fetch_remote_post(&self, post_uri: &str) -> Result<(Element, Option<String>)> {
        let filter = self.request_filter();
        let response = rest::get(&self.http, &filter, post_uri, &[]).await?;
        let etag = strong_etag(response.etag.as_deref());
        let document = response
            .document
            .ok_or_else(|| Error::invalid_response(post_uri, "empty entry document", ""))?;
        Ok((document, etag))
    }

    fn collect_categories(
        &self,
        categories_element: &Element,
        inherited_scheme: Option<&str>,
        out: &mut Vec<BlogPostCategory>,
    ) {
        let doc_scheme = categories_element
            .attributes
            .get("scheme")
            .map(String::as_str)
            .or(inherited_scheme);
        let wanted = self.category_scheme();
        for category in
            xmlutil::children(categories_element, self.version.atom_ns(), "category")
        {
            let term = match category.attributes.get("term") {
                Some(term) => term.clone(),
                None => continue,
            };
            // a category without its own scheme inherits the document's
            let scheme = category
                .attributes
                .get("scheme")
                .map(String::as_str)
                .or(doc_scheme);
            let matches = match wanted.as_deref() {
                None => true,
                Some(w) => scheme.map(|s| s == w).unwrap_or(w.is_empty()),
            };
            if matches {
                let label = category.attributes.get("label").cloned().unwrap_or_default();
                out.push(BlogPostCategory::new(term, label));
            }
        }
    }

    /// Folds one feed page into `posts`. Returns false when pagination
    /// must stop: the window is full, or an entry id repeated, which
    /// means the server is serving the same page over and over.
    fn scan_feed_page(
        &self,
        feed: &Element,
        seen_ids: &mut HashSet<String>,
        posts: &mut Vec<BlogPost>,
        max_posts: usize,
        before: Option<DateTime<Utc>>,
    ) -> bool {
        for entry_element in xmlutil::children(feed, self.version.atom_ns(), "entry") {
            let entry_id = xmlutil::child(entry_element, self.version.atom_ns(), "id")
                .map(xmlutil::text_content)
                .unwrap_or_default();
            if !entry_id.is_empty() && !seen_ids.insert(entry_id.clone()) {
                debug!("entry {} seen twice, stopping pagination", entry_id);
                return false;
            }
            let post = self.entry_to_post(entry_element.clone());
            if let (Some(cutoff), Some(published)) = (before, post.date_published) {
                if published >= cutoff {
                    continue;
                }
            }
            posts.push(post);
            if posts.len() >= max_posts {
                return false;
            }
        }
        true
    }

    fn find_collection<'a>(
        workspaces: &'a [(String, Vec<Collection>)],
        blog_id: &str,
    ) -> Option<&'a Collection> {
        workspaces
            .iter()
            .flat_map(|(_, collections)| collections.iter())
            .find(|c| c.href == blog_id)
    }
}

#[async_trait]
impl BlogClient for AtomClient {
    fn protocol_name(&self) -> &'static str {
        "Atom"
    }

    fn options(&self) -> BlogClientOptions {
        self.options.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn override_options(&self, options: BlogClientOptions) {
        *self.options.write().unwrap_or_else(|e| e.into_inner()) = options;
    }

    fn is_secure(&self) -> bool {
        self.post_api_url.to_ascii_lowercase().starts_with("https:")
    }

    fn request_filter(&self) -> RequestFilter {
        let credentials = self.credentials.clone();
        Arc::new(move |request| {
            let snapshot = credentials.snapshot();
            if snapshot.username.is_empty() {
                request
            } else {
                request.basic_auth(&snapshot.username, Some(&snapshot.password))
            }
        })
    }

    async fn verify_credentials(&self) -> Result<()> {
        self.get_users_blogs().await.map(|_| ())
    }

    async fn get_users_blogs(&self) -> Result<Vec<BlogInfo>> {
        let document = self.fetch_service_document().await?;
        if document.name == "feed" {
            // a bare feed instead of a service document: one blog, whose
            // collection is the endpoint itself
            let title = xmlutil::child(&document, self.version.atom_ns(), "title")
                .map(xmlutil::text_content)
                .unwrap_or_default();
            let homepage = self.alternate_link(&document).unwrap_or_default();
            return Ok(vec![BlogInfo::new(&self.post_api_url, title, homepage)]);
        }
        let workspaces = parse_workspaces(&document, self.version);
        let mut blogs = Vec::new();
        for (workspace_title, collections) in &workspaces {
            for collection in collections {
                if !accepts_entries(&collection.accepts) {
                    continue;
                }
                let homepage = self.collection_homepage(&collection.href).await;
                blogs.push(BlogInfo::new(
                    &collection.href,
                    blog_name(workspace_title, &collection.title),
                    homepage,
                ));
            }
        }
        Ok(blogs)
    }

    async fn get_categories(&self, blog_id: &str) -> Result<Vec<BlogPostCategory>> {
        let document = self.fetch_service_document().await?;
        let workspaces = parse_workspaces(&document, self.version);
        let collection = match Self::find_collection(&workspaces, blog_id) {
            Some(collection) => collection,
            None => return Ok(Vec::new()),
        };
        let mut categories = Vec::new();
        for categories_element in &collection.categories {
            let mut element = categories_element.clone();
            let mut document_url = self.post_api_url.clone();
            for _ in 0..MAX_CATEGORY_DOC_HOPS {
                match categories_step(&element, &document_url) {
                    CategoriesStep::Inline => {
                        self.collect_categories(&element, None, &mut categories);
                        break;
                    }
                    CategoriesStep::SelfReference => {
                        debug!("categories document at {} references itself", document_url);
                        break;
                    }
                    CategoriesStep::Fetch(next) => {
                        element = self.fetch_feed(&next).await?;
                        document_url = next;
                    }
                }
            }
        }
        Ok(categories)
    }

    async fn get_recent_posts(
        &self,
        blog_id: &str,
        max_posts: usize,
        _include_categories: bool,
        before: Option<DateTime<Utc>>,
    ) -> Result<Vec<BlogPost>> {
        let mut url = blog_id.to_string();
        let mut seen_ids: HashSet<String> = HashSet::new();
        let mut posts = Vec::new();
        loop {
            let feed = match self.fetch_feed(&url).await {
                Ok(feed) => feed,
                Err(e) => {
                    let alternate = self
                        .feed_url_rewriter
                        .as_ref()
                        .and_then(|rewrite| rewrite(&url));
                    match alternate {
                        Some(alternate) if alternate != url => {
                            warn!("feed fetch failed ({}), retrying {}", e, alternate);
                            url = alternate;
                            self.fetch_feed(&url).await?
                        }
                        _ => return Err(e),
                    }
                }
            };
            if !self.scan_feed_page(&feed, &mut seen_ids, &mut posts, max_posts, before) {
                break;
            }
            match self.next_link(&feed) {
                Some(next) if next != url => url = next,
                _ => break,
            }
        }
        Ok(posts)
    }

    async fn new_post(
        &self,
        blog_id: &str,
        post: &BlogPost,
        new_category_context: Option<&dyn NewCategoryContext>,
        publish: bool,
    ) -> Result<PostResult> {
        let options = self.options();
        if !publish && !options.supports_post_as_draft {
            return Err(Error::PostAsDraftUnsupported);
        }
        let mut entry = AtomEntry::new(self.version, self.category_scheme());
        self.populate_entry(&mut entry, post, publish, new_category_context);

        let filter = self.request_filter();
        let filter: RequestFilter = if options.supports_slug && !post.slug.is_empty() {
            let slug = encode_slug(&post.slug);
            Arc::new(move |request| filter(request).header("Slug", slug.clone()))
        } else {
            filter
        };
        let response = rest::post(
            &self.http,
            &filter,
            blog_id,
            ENTRY_CONTENT_TYPE,
            entry.element(),
        )
        .await?;

        let location = response.location.clone().ok_or_else(|| {
            Error::invalid_response(
                format!("POST {}", blog_id),
                "The response to the POST request did not include a Location header.",
                "",
            )
        })?;
        // only trust the response body when the server says it is the
        // created resource
        let canonical = response.content_location.as_deref() == Some(location.as_str());
        let (element, etag) = match (&response.document, canonical) {
            (Some(document), true) => (
                document.clone(),
                strong_etag(response.etag.as_deref()),
            ),
            _ => self.fetch_remote_post(&location).await?,
        };

        let created = self.entry_from_element(element.clone());
        Ok(PostResult {
            post_id: created.edit_uri().unwrap_or(location),
            etag: etag.unwrap_or_default(),
            date_published: created.publish_date(),
            remote_entry: Some(element),
        })
    }

    async fn edit_post(
        &self,
        _blog_id: &str,
        post: &BlogPost,
        new_category_context: Option<&dyn NewCategoryContext>,
        publish: bool,
    ) -> Result<EditPostResult> {
        let options = self.options();
        if !publish && !options.supports_post_as_draft {
            return Err(Error::PostAsDraftUnsupported);
        }
        let element = match &post.remote_entry {
            Some(element) => element.clone(),
            None => self.fetch_remote_post(&post.id).await?.0,
        };
        let mut entry = self.entry_from_element(element);
        self.populate_entry(&mut entry, post, publish, new_category_context);

        let filter = self.request_filter();
        let etag = strong_etag(Some(post.etag.as_str()));
        let put = rest::put(
            &self.http,
            &filter,
            &post.id,
            etag.as_deref(),
            ENTRY_CONTENT_TYPE,
            entry.element(),
        )
        .await;
        match put {
            Ok(_) => {}
            Err(Error::Provider { ref code, .. }) if code == "412" && etag.is_some() => {
                // our ETag is stale: someone (or something) changed the
                // post since we fetched it
                let current = self.fetch_etag(&post.id).await?;
                if current == etag || !(self.confirm_overwrite)() {
                    return Err(Error::OperationCancelled);
                }
                rest::put(
                    &self.http,
                    &filter,
                    &post.id,
                    current.as_deref(),
                    ENTRY_CONTENT_TYPE,
                    entry.element(),
                )
                .await?;
            }
            Err(Error::Provider { code, .. }) if code == "404" => {
                return Err(Error::provider(
                    "404",
                    format!("The post with id {} does not exist on the server", post.id),
                ));
            }
            Err(e) => return Err(e),
        }

        let (element, etag) = self.fetch_remote_post(&post.id).await?;
        Ok(EditPostResult {
            etag: etag.unwrap_or_default(),
            remote_entry: Some(element),
        })
    }

    async fn get_post(&self, _blog_id: &str, post_id: &str) -> Result<BlogPost> {
        let (element, etag) = self.fetch_remote_post(post_id).await?;
        let mut post = self.entry_to_post(element);
        post.id = post_id.to_string();
        post.etag = etag.unwrap_or_default();
        Ok(post)
    }

    async fn delete_post(&self, _blog_id: &str, post_id: &str, _publish: bool) -> Result<()> {
        let filter = self.request_filter();
        match rest::delete(&self.http, &filter, post_id, Some("*")).await {
            Ok(_) => Ok(()),
            // already gone is as good as deleted
            Err(Error::Provider { ref code, .. }) if code == "404" || code == "410" => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_are_header_safe() {
        assert_eq!(encode_slug("plain-slug"), "plain-slug");
        assert_eq!(encode_slug("caf\u{e9}"), "caf%C3%A9");
        assert_eq!(encode_slug("50%"), "50%25");
        assert_eq!(encode_slug("line\r\nbreak"), "linebreak");
    }

    fn test_client() -> AtomClient {
        AtomClient::new(
            "http://example.com/atom/svc",
            CredentialsAccessor::new("ann", "hunter2"),
        )
        .unwrap()
    }

    #[test]
    fn repeated_entry_ids_stop_pagination() {
        let client = test_client();
        let feed = Element::parse(
            r#"<feed xmlns="http://www.w3.org/2005/Atom">
                <entry><id>tag:example.com,2020:a</id><title>A</title></entry>
                <entry><id>tag:example.com,2020:b</id><title>B</title></entry>
            </feed>"#
                .as_bytes(),
        )
        .unwrap();
        let mut seen = HashSet::new();
        let mut posts = Vec::new();
        assert!(client.scan_feed_page(&feed, &mut seen, &mut posts, 10, None));
        assert_eq!(posts.len(), 2);
        // the same page served again means the server is not paging
        assert!(!client.scan_feed_page(&feed, &mut seen, &mut posts, 10, None));
        assert_eq!(posts.len(), 2);
    }

    #[test]
    fn pagination_stops_when_the_window_fills() {
        let client = test_client();
        let feed = Element::parse(
            r#"<feed xmlns="http://www.w3.org/2005/Atom">
                <entry><id>tag:example.com,2020:a</id><title>A</title></entry>
                <entry><id>tag:example.com,2020:b</id><title>B</title></entry>
            </feed>"#
                .as_bytes(),
        )
        .unwrap();
        let mut seen = HashSet::new();
        let mut posts = Vec::new();
        assert!(!client.scan_feed_page(&feed, &mut seen, &mut posts, 1, None));
        assert_eq!(posts.len(), 1);
    }

    #[test]
    fn categories_hrefs_resolve_against_their_document() {
        let inline = Element::parse(r#"<categories/>"#.as_bytes()).unwrap();
        assert!(matches!(
            categories_step(&inline, "http://example.com/atom/svc"),
            CategoriesStep::Inline
        ));

        let relative = Element::parse(r#"<categories href="other/cats.xml"/>"#.as_bytes()).unwrap();
        match categories_step(&relative, "http://example.com/atom/svc") {
            CategoriesStep::Fetch(url) => {
                assert_eq!(url, "http://example.com/atom/other/cats.xml")
            }
            _ => panic!("expected a fetch"),
        }

        let circular =
            Element::parse(r#"<categories href="http://example.com/atom/svc"/>"#.as_bytes())
                .unwrap();
        assert!(matches!(
            categories_step(&circular, "http://example.com/atom/svc"),
            CategoriesStep::SelfReference
        ));
    }

    #[test]
    fn weak_etags_are_discarded() {
        assert_eq!(strong_etag(Some("\"abc\"")), Some("\"abc\"".to_string()));
        assert_eq!(strong_etag(Some("W/\"abc\"")), None);
        assert_eq!(strong_etag(Some("")), None);
        assert_eq!(strong_etag(None), None);
    }

    #[test]
    fn accept_filter_recognizes_entry_types() {
        assert!(accepts_entries(&[]));
        assert!(accepts_entries(&["entry".to_string()]));
        assert!(accepts_entries(&["*/*".to_string()]));
        assert!(accepts_entries(&[
            "application/atom+xml; type=entry".to_string()
        ]));
        assert!(!accepts_entries(&["image/png".to_string()]));
    }

    #[test]
    fn workspace_and_collection_titles_combine() {
        assert_eq!(blog_name("My Site", "Blog"), "My Site - Blog");
        assert_eq!(blog_name("", "Blog"), "Blog");
        assert_eq!(blog_name("My Site", ""), "My Site");
        assert_eq!(blog_name("Blog", "Blog"), "Blog");
    }

    #[test]
    fn service_documents_parse_into_collections() {
        let service = Element::parse(
            r#"<service xmlns="http://www.w3.org/2007/app" xmlns:atom="http://www.w3.org/2005/Atom">
                <workspace>
                    <atom:title>Main Site</atom:title>
                    <collection href="http://example.com/blog">
                        <atom:title>Entries</atom:title>
                        <accept>application/atom+xml;type=entry</accept>
                    </collection>
                    <collection href="http://example.com/media">
                        <atom:title>Pictures</atom:title>
                        <accept>image/png</accept>
                    </collection>
                </workspace>
            </service>"#
                .as_bytes(),
        )
        .unwrap();
        let workspaces = parse_workspaces(&service, AtomProtocolVersion::V10);
        assert_eq!(workspaces.len(), 1);
        let (title, collections) = &workspaces[0];
        assert_eq!(title, "Main Site");
        assert_eq!(collections.len(), 2);
        assert!(accepts_entries(&collections[0].accepts));
        assert!(!accepts_entries(&collections[1].accepts));
    }
}
