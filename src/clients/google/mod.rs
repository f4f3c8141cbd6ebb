//! Google Blogger v3 client: JSON REST for posts and pages, OAuth2 for
//! authentication, the Picasa-compatible media API for pictures.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quill_common::request::RequestFilter;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::authors::AuthorInfo;
use crate::blogs::BlogInfo;
use crate::categories::{BlogPostCategory, BlogPostKeyword};
use crate::credentials::CredentialsAccessor;
use crate::options::BlogClientOptions;
use crate::pages::PageInfo;
use crate::posts::{BlogPost, EditPostResult, PostResult};
use crate::{Error, Result};

use super::{BlogClient, FileUploadContext, NewCategoryContext};

pub mod api;
pub mod auth;
pub mod picasa;

use api::{Blog, BlogList, CategoryFeedResponse, Page, PageList, Post, PostList, API_BASE};
use auth::{ApiSecrets, AuthorizationFlow, GoogleAuth, StoredToken};
use picasa::PicasaService;

/// Blogger stores the label list as one comma-delimited string.
const LABEL_DELIMITER: char = ',';

pub struct GoogleBloggerClient {
    http: Client,
    auth: GoogleAuth,
    credentials: CredentialsAccessor,
    picasa: PicasaService,
    options: RwLock<BlogClientOptions>,
}

fn post_statuses(include_scheduled: bool) -> Vec<&'static str> {
    if include_scheduled {
        vec!["draft", "live", "scheduled"]
    } else {
        vec!["draft", "live"]
    }
}

fn labels_of(post: &BlogPost) -> Option<Vec<String>> {
    let mut labels: Vec<String> = post
        .categories
        .iter()
        .filter(|c| !c.is_none_category())
        .chain(post.new_categories.iter())
        .map(|c| c.name.clone())
        .collect();
    // keywords and categories are the same vocabulary on Blogger
    for keyword in split_labels(&post.keywords) {
        if !labels.contains(&keyword) {
            labels.push(keyword);
        }
    }
    if labels.is_empty() {
        None
    } else {
        Some(labels)
    }
}

fn wire_to_post(wire: Post) -> BlogPost {
    let mut post = BlogPost::default();
    post.id = wire.id;
    post.title = wire.title;
    post.contents = wire.content;
    post.permalink = wire.url;
    post.date_published = wire.published;
    post.categories = wire
        .labels
        .unwrap_or_default()
        .into_iter()
        .map(|label| BlogPostCategory::new(label, ""))
        .collect();
    post
}

fn post_to_wire(post: &BlogPost) -> Post {
    Post {
        id: post.id.clone(),
        title: post.title.clone(),
        content: post.contents.clone(),
        labels: labels_of(post),
        published: post.date_published_override.or(post.date_published),
        ..Post::default()
    }
}

fn wire_to_page(wire: Page) -> BlogPost {
    let mut post = BlogPost::default();
    post.id = wire.id;
    post.title = wire.title;
    post.contents = wire.content;
    post.permalink = wire.url;
    post.date_published = wire.published;
    post.is_page = true;
    post
}

fn page_to_wire(page: &BlogPost) -> Page {
    Page {
        id: page.id.clone(),
        title: page.title.clone(),
        content: page.contents.clone(),
        published: page.date_published_override.or(page.date_published),
        ..Page::default()
    }
}

/// Merges the per-status page lists into one newest-first window of
/// `max_items`, trusting `published` for the ordering.
fn merge_by_published(mut items: Vec<Post>, max_items: usize) -> Vec<Post> {
    items.sort_by(|a, b| b.published.cmp(&a.published));
    items.truncate(max_items);
    items
}

impl GoogleBloggerClient {
    pub fn new(
        credentials: CredentialsAccessor,
        secrets: ApiSecrets,
        flow: Option<Arc<dyn AuthorizationFlow>>,
    ) -> Result<GoogleBloggerClient> {
        let http = Client::builder().build()?;
        let mut options = BlogClientOptions::default();
        options.supports_categories = true;
        options.supports_multiple_categories = true;
        options.supports_new_categories = true;
        options.supports_custom_date = true;
        options.supports_extended_entries = true;
        options.supports_pages = true;
        options.supports_post_as_draft = true;
        options.supports_scheduled_posts = true;
        options.supports_paging = true;
        options.supports_file_upload = true;
        options.max_recent_posts = Some(api::MAX_RESULTS_PER_REQUEST);
        Ok(GoogleBloggerClient {
            auth: GoogleAuth::new(secrets, credentials.clone(), flow),
            picasa: PicasaService::new(http.clone()),
            http,
            credentials,
            options: RwLock::new(options),
        })
    }

    /// Runs a GET with one silent token-refresh retry when the service
    /// rejects the current token.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let token = self.auth.access_token().await?;
        match api::get_json(&self.http, &token, url, query).await {
            Err(ref e) if api::is_stale_token_error(e) => {
                self.auth.invalidate_access_token();
                let token = self.auth.access_token().await?;
                api::get_json(&self.http, &token, url, query).await
            }
            other => other,
        }
    }

    async fn send_body<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, String)],
        body: &B,
    ) -> Result<T> {
        let token = self.auth.access_token().await?;
        match api::send_body(&self.http, &token, method.clone(), url, query, body).await {
            Err(ref e) if api::is_stale_token_error(e) => {
                self.auth.invalidate_access_token();
                let token = self.auth.access_token().await?;
                api::send_body(&self.http, &token, method, url, query, body).await
            }
            other => other,
        }
    }

    async fn delete(&self, url: &str) -> Result<()> {
        let token = self.auth.access_token().await?;
        match api::delete(&self.http, &token, url).await {
            Err(ref e) if api::is_stale_token_error(e) => {
                self.auth.invalidate_access_token();
                let token = self.auth.access_token().await?;
                api::delete(&self.http, &token, url).await
            }
            other => other,
        }
    }

    async fn blog(&self, blog_id: &str) -> Result<Blog> {
        self.get_json(&format!("{}/blogs/{}", API_BASE, blog_id), &[])
            .await
    }

    async fn list_posts(
        &self,
        blog_id: &str,
        status: &str,
        page_token: Option<&str>,
        max_results: usize,
        before: Option<DateTime<Utc>>,
    ) -> Result<PostList> {
        let mut query: Vec<(&str, String)> = vec![
            ("status", status.to_string()),
            ("fetchBodies", "true".to_string()),
            ("orderBy", "published".to_string()),
            (
                "maxResults",
                max_results.min(api::MAX_RESULTS_PER_REQUEST).to_string(),
            ),
        ];
        if let Some(before) = before {
            query.push(("endDate", before.to_rfc3339()));
        }
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }
        self.get_json(&format!("{}/blogs/{}/posts", API_BASE, blog_id), &query)
            .await
    }

    async fn list_pages(&self, blog_id: &str, status: &str, fetch_bodies: bool) -> Result<PageList> {
        let query: Vec<(&str, String)> = vec![
            ("status", status.to_string()),
            ("fetchBodies", fetch_bodies.to_string()),
        ];
        self.get_json(&format!("{}/blogs/{}/pages", API_BASE, blog_id), &query)
            .await
    }

    fn notify_new_categories(
        &self,
        post: &BlogPost,
        new_category_context: Option<&dyn NewCategoryContext>,
    ) {
        if let Some(context) = new_category_context {
            for category in &post.new_categories {
                context.new_category_added(category);
            }
        }
    }
}

#[async_trait]
impl BlogClient for GoogleBloggerClient {
    fn protocol_name(&self) -> &'static str {
        "GoogleBloggerV3"
    }

    fn options(&self) -> BlogClientOptions {
        self.options.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn override_options(&self, options: BlogClientOptions) {
        *self.options.write().unwrap_or_else(|e| e.into_inner()) = options;
    }

    fn is_secure(&self) -> bool {
        true
    }

    fn request_filter(&self) -> RequestFilter {
        let credentials = self.credentials.clone();
        Arc::new(move |request| {
            let token = credentials
                .token()
                .and_then(|t| serde_json::from_str::<StoredToken>(&t).ok())
                .filter(StoredToken::is_fresh);
            match token {
                Some(token) => request.bearer_auth(token.access_token),
                None => request,
            }
        })
    }

    async fn verify_credentials(&self) -> Result<()> {
        self.auth.access_token().await?;
        Ok(())
    }

    async fn get_users_blogs(&self) -> Result<Vec<BlogInfo>> {
        let list: BlogList = self
            .get_json(&format!("{}/users/self/blogs", API_BASE), &[])
            .await?;
        Ok(list
            .items
            .into_iter()
            .map(|blog| BlogInfo::new(blog.id, blog.name, blog.url))
            .collect())
    }

    /// Labels, via the blog's legacy JSON summary feed; the v3 API itself
    /// has no label vocabulary endpoint.
    async fn get_categories(&self, blog_id: &str) -> Result<Vec<BlogPostCategory>> {
        let blog = self.blog(blog_id).await?;
        if blog.url.is_empty() {
            return Ok(Vec::new());
        }
        let feed_url = format!("{}/feeds/posts/summary", blog.url.trim_end_matches('/'));
        let response: CategoryFeedResponse = self
            .get_json(
                &feed_url,
                &[
                    ("alt", "json".to_string()),
                    ("max-results", "0".to_string()),
                ],
            )
            .await?;
        Ok(response
            .feed
            .unwrap_or_default()
            .category
            .into_iter()
            .map(|c| BlogPostCategory::new(c.term, ""))
            .collect())
    }

    /// Keywords fold into the label vocabulary on publish; there is no
    /// separate keyword list to offer.
    async fn get_keywords(&self, _blog_id: &str) -> Result<Vec<BlogPostKeyword>> {
        Ok(Vec::new())
    }

    async fn get_recent_posts(
        &self,
        blog_id: &str,
        max_posts: usize,
        _include_categories: bool,
        before: Option<DateTime<Utc>>,
    ) -> Result<Vec<BlogPost>> {
        struct Cursor {
            status: &'static str,
            page_token: Option<String>,
            exhausted: bool,
        }
        let mut cursors: Vec<Cursor> = post_statuses(self.options().supports_scheduled_posts)
            .into_iter()
            .map(|status| Cursor {
                status,
                page_token: None,
                exhausted: false,
            })
            .collect();
        let mut collected: Vec<Post> = Vec::new();
        loop {
            for cursor in cursors.iter_mut().filter(|c| !c.exhausted) {
                let list = self
                    .list_posts(
                        blog_id,
                        cursor.status,
                        cursor.page_token.as_deref(),
                        max_posts,
                        before,
                    )
                    .await?;
                if list.items.is_empty() || list.next_page_token.is_none() {
                    cursor.exhausted = true;
                }
                cursor.page_token = list.next_page_token;
                collected.extend(list.items);
            }
            if collected.len() >= max_posts || cursors.iter().all(|c| c.exhausted) {
                break;
            }
        }
        Ok(merge_by_published(collected, max_posts)
            .into_iter()
            .map(wire_to_post)
            .collect())
    }

    async fn new_post(
        &self,
        blog_id: &str,
        post: &BlogPost,
        new_category_context: Option<&dyn NewCategoryContext>,
        publish: bool,
    ) -> Result<PostResult> {
        let wire = post_to_wire(post);
        let created: Post = self
            .send_body(
                Method::POST,
                &format!("{}/blogs/{}/posts", API_BASE, blog_id),
                &[("isDraft", (!publish).to_string())],
                &wire,
            )
            .await?;
        self.notify_new_categories(post, new_category_context);
        Ok(PostResult {
            post_id: created.id,
            date_published: created.published,
            ..PostResult::default()
        })
    }

    async fn edit_post(
        &self,
        blog_id: &str,
        post: &BlogPost,
        new_category_context: Option<&dyn NewCategoryContext>,
        publish: bool,
    ) -> Result<EditPostResult> {
        let wire = post_to_wire(post);
        let _: Post = self
            .send_body(
                Method::PUT,
                &format!("{}/blogs/{}/posts/{}", API_BASE, blog_id, post.id),
                &[("publish", publish.to_string())],
                &wire,
            )
            .await?;
        self.notify_new_categories(post, new_category_context);
        Ok(EditPostResult::default())
    }

    async fn get_post(&self, blog_id: &str, post_id: &str) -> Result<BlogPost> {
        let wire: Post = self
            .get_json(
                &format!("{}/blogs/{}/posts/{}", API_BASE, blog_id, post_id),
                &[("view", "AUTHOR".to_string())],
            )
            .await?;
        Ok(wire_to_post(wire))
    }

    async fn delete_post(&self, blog_id: &str, post_id: &str, _publish: bool) -> Result<()> {
        self.delete(&format!("{}/blogs/{}/posts/{}", API_BASE, blog_id, post_id))
            .await
    }

    async fn get_page(&self, blog_id: &str, page_id: &str) -> Result<BlogPost> {
        let wire: Page = self
            .get_json(
                &format!("{}/blogs/{}/pages/{}", API_BASE, blog_id, page_id),
                &[("view", "AUTHOR".to_string())],
            )
            .await?;
        Ok(wire_to_page(wire))
    }

    async fn get_page_list(&self, blog_id: &str) -> Result<Vec<PageInfo>> {
        let mut pages = Vec::new();
        for status in &["draft", "live"] {
            let list = self.list_pages(blog_id, status, false).await?;
            pages.extend(list.items.into_iter().map(|page| {
                PageInfo::new(page.id, page.title, page.published, "")
            }));
        }
        pages.sort_by(|a, b| b.date_published.cmp(&a.date_published));
        Ok(pages)
    }

    async fn get_pages(&self, blog_id: &str, max_pages: usize) -> Result<Vec<BlogPost>> {
        let mut pages = Vec::new();
        for status in &["draft", "live"] {
            let list = self.list_pages(blog_id, status, true).await?;
            pages.extend(list.items);
        }
        pages.sort_by(|a, b| b.published.cmp(&a.published));
        pages.truncate(max_pages);
        Ok(pages.into_iter().map(wire_to_page).collect())
    }

    async fn new_page(
        &self,
        blog_id: &str,
        page: &BlogPost,
        publish: bool,
    ) -> Result<PostResult> {
        let wire = page_to_wire(page);
        let created: Page = self
            .send_body(
                Method::POST,
                &format!("{}/blogs/{}/pages", API_BASE, blog_id),
                &[("isDraft", (!publish).to_string())],
                &wire,
            )
            .await?;
        Ok(PostResult {
            post_id: created.id,
            date_published: created.published,
            ..PostResult::default()
        })
    }

    async fn edit_page(
        &self,
        blog_id: &str,
        page: &BlogPost,
        publish: bool,
    ) -> Result<EditPostResult> {
        let wire = page_to_wire(page);
        let _: Page = self
            .send_body(
                Method::PUT,
                &format!("{}/blogs/{}/pages/{}", API_BASE, blog_id, page.id),
                &[("publish", publish.to_string())],
                &wire,
            )
            .await?;
        Ok(EditPostResult::default())
    }

    async fn delete_page(&self, blog_id: &str, page_id: &str) -> Result<()> {
        self.delete(&format!("{}/blogs/{}/pages/{}", API_BASE, blog_id, page_id))
            .await
    }

    async fn get_authors(&self, _blog_id: &str) -> Result<Vec<AuthorInfo>> {
        Err(Error::MethodUnsupported("get_authors"))
    }

    async fn do_before_publish_upload(&self, upload: &dyn FileUploadContext) -> Result<String> {
        let options = self.options();
        let existing = upload.edit_media_url();
        let media = self
            .picasa
            .upload(
                &self.auth,
                &options.image_upload_album,
                upload.filename(),
                upload.contents(),
                existing.as_deref(),
            )
            .await?;
        if let Some(edit_media_url) = &media.edit_media_url {
            upload.record_edit_media_url(edit_media_url);
        }
        if !upload.force_direct_image_link() {
            return Ok(media.url);
        }
        // linked full-size images: prefer the s1600-h rendition when the
        // host serves it, otherwise cap resizing with imgmax
        if options.use_picasa_s1600h {
            if let Some(candidate) = picasa::s1600h_url(&media.url) {
                let reachable = self
                    .http
                    .head(&candidate)
                    .send()
                    .await
                    .map(|r| r.status().is_success())
                    .unwrap_or(false);
                if reachable {
                    return Ok(candidate);
                }
            }
        }
        Ok(picasa::imgmax_url(&media.url))
    }

    async fn do_after_publish_upload(&self, _upload: &dyn FileUploadContext) -> Result<()> {
        Ok(())
    }
}

/// Splits a stored keyword string on the Blogger label delimiter.
pub fn split_labels(keywords: &str) -> Vec<String> {
    keywords
        .split(LABEL_DELIMITER)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn post_at(id: &str, hour: u32) -> Post {
        Post {
            id: id.to_string(),
            published: Some(Utc.with_ymd_and_hms(2020, 1, 1, hour, 0, 0).unwrap()),
            ..Post::default()
        }
    }

    #[test]
    fn merged_statuses_keep_the_newest_posts() {
        // three drafts and two live posts, window of four
        let items = vec![
            post_at("d1", 1),
            post_at("d2", 5),
            post_at("d3", 9),
            post_at("l1", 3),
            post_at("l2", 7),
        ];
        let merged = merge_by_published(items, 4);
        let ids: Vec<&str> = merged.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["d3", "l2", "d2", "l1"]);
    }

    #[test]
    fn labels_skip_the_none_sentinel() {
        let mut post = BlogPost::default();
        post.categories = vec![
            BlogPostCategory::new("rust", ""),
            BlogPostCategory::none(),
        ];
        post.new_categories = vec![BlogPostCategory::new("blog", "")];
        assert_eq!(
            labels_of(&post),
            Some(vec!["rust".to_string(), "blog".to_string()])
        );
        post.categories.clear();
        post.new_categories.clear();
        assert_eq!(labels_of(&post), None);
    }

    #[test]
    fn keyword_strings_split_on_commas() {
        assert_eq!(split_labels("a, b,,c "), vec!["a", "b", "c"]);
        assert!(split_labels("").is_empty());
    }

    #[test]
    fn scheduled_status_follows_the_capability() {
        assert_eq!(post_statuses(true).len(), 3);
        assert_eq!(post_statuses(false), vec!["draft", "live"]);
    }

    #[tokio::test]
    async fn keywords_are_not_a_separate_vocabulary() {
        let client = GoogleBloggerClient::new(
            CredentialsAccessor::new("ann", ""),
            ApiSecrets::from_env(),
            None,
        )
        .unwrap();
        // the descriptor and the operation agree: labels are the only
        // vocabulary, so a keyword fetch succeeds with nothing in it
        assert!(!client.options().supports_keywords);
        assert!(client.get_keywords("1").await.unwrap().is_empty());
    }
}
