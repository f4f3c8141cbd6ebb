//! High-level facade binding one configured weblog account to its
//! protocol client: publish bookkeeping, permalink fixups, content
//! filters, and refreshing the cached vocabulary lists into settings.

use std::sync::Arc;

use regex::Regex;
use tracing::warn;
use url::Url;

use crate::authors::AuthorInfo;
use crate::categories::{BlogPostCategory, BlogPostKeyword};
use crate::clients::{BlogClient, NewCategoryContext};
use crate::options::BlogClientOptions;
use crate::pages::PageInfo;
use crate::posts::{BlogPost, PostResult};
use crate::{Error, Result};

/// Where the account's durable state lives. The backing store is the
/// embedder's concern.
pub trait BlogSettingsAccessor: Send + Sync {
    fn blog_id(&self) -> String;
    fn homepage_url(&self) -> String;
    fn set_last_publish_failed(&self, failed: bool);
    fn set_categories(&self, categories: Vec<BlogPostCategory>);
    fn set_keywords(&self, keywords: Vec<BlogPostKeyword>);
    fn set_authors(&self, authors: Vec<AuthorInfo>);
    fn set_pages(&self, pages: Vec<PageInfo>);
}

/// Transforms post HTML between its editable form and its published form.
/// Implementations live with the embedder; the facade only applies them
/// around the wire calls.
pub trait ContentFilter: Send + Sync {
    /// Wire form to editable form, applied after fetches.
    fn open(&self, html: &str) -> String;
    /// Editable form to wire form, applied before publishes.
    fn publish(&self, html: &str) -> String;
}

/// Whether a provider fault means "that post id does not exist", per the
/// patterns the provider configuration supplies.
pub fn is_invalid_post_id_error(options: &BlogClientOptions, error: &Error) -> bool {
    let (code, message) = match error {
        Error::Provider { code, message } => (code, message),
        _ => return false,
    };
    let matches = |pattern: &str, text: &str| {
        !pattern.is_empty()
            && Regex::new(pattern)
                .map(|re| re.is_match(text))
                .unwrap_or(false)
    };
    matches(&options.invalid_post_id_fault_code_pattern, code)
        || matches(&options.invalid_post_id_fault_string_pattern, message)
}

fn substitute_macros(template: &str, homepage: &str, blog_id: &str, post_id: &str) -> String {
    template
        .replace("{homepage}", homepage)
        .replace("{blog-id}", blog_id)
        .replace("{post-id}", post_id)
}

/// Gives a fetched post a usable permalink: relative links resolve
/// against the homepage, and services that return none get the
/// provider's permalink template.
fn resolve_permalink(homepage: &str, options: &BlogClientOptions, post: &mut BlogPost) {
    if post.permalink.is_empty() {
        if !options.permalink_format.is_empty() && !post.id.is_empty() {
            post.permalink = substitute_macros(&options.permalink_format, homepage, "", &post.id);
        }
        return;
    }
    if Url::parse(&post.permalink).is_err() {
        if let Ok(base) = Url::parse(homepage) {
            if let Ok(absolute) = base.join(&post.permalink) {
                post.permalink = absolute.to_string();
            }
        }
    }
}

pub struct Blog {
    settings: Arc<dyn BlogSettingsAccessor>,
    client: Arc<dyn BlogClient>,
    content_filter: Option<Arc<dyn ContentFilter>>,
}

impl Blog {
    pub fn new(settings: Arc<dyn BlogSettingsAccessor>, client: Arc<dyn BlogClient>) -> Blog {
        Blog {
            settings,
            client,
            content_filter: None,
        }
    }

    pub fn with_content_filter(mut self, filter: Arc<dyn ContentFilter>) -> Blog {
        self.content_filter = Some(filter);
        self
    }

    pub fn client(&self) -> &dyn BlogClient {
        self.client.as_ref()
    }

    fn filtered_for_publish(&self, post: &BlogPost) -> BlogPost {
        let mut post = post.clone();
        if let Some(filter) = &self.content_filter {
            post.contents = filter.publish(&post.contents);
        }
        post
    }

    fn open_fetched(&self, mut post: BlogPost) -> BlogPost {
        if let Some(filter) = &self.content_filter {
            post.contents = filter.open(&post.contents);
        }
        resolve_permalink(
            &self.settings.homepage_url(),
            &self.client.options(),
            &mut post,
        );
        post
    }

    pub async fn new_post(
        &self,
        post: &BlogPost,
        new_category_context: Option<&dyn NewCategoryContext>,
        publish: bool,
    ) -> Result<PostResult> {
        let wire_post = self.filtered_for_publish(post);
        let result = if post.is_page {
            self.client
                .new_page(&self.settings.blog_id(), &wire_post, publish)
                .await
        } else {
            self.client
                .new_post(
                    &self.settings.blog_id(),
                    &wire_post,
                    new_category_context,
                    publish,
                )
                .await
        };
        self.settings.set_last_publish_failed(result.is_err());
        result
    }

    /// Edits a post, republishing it as new when the service reports the
    /// id as unknown (the post was deleted out from under us).
    pub async fn edit_post(
        &self,
        post: &BlogPost,
        new_category_context: Option<&dyn NewCategoryContext>,
        publish: bool,
    ) -> Result<PostResult> {
        let wire_post = self.filtered_for_publish(post);
        let edited = if post.is_page {
            self.client
                .edit_page(&self.settings.blog_id(), &wire_post, publish)
                .await
        } else {
            self.client
                .edit_post(
                    &self.settings.blog_id(),
                    &wire_post,
                    new_category_context,
                    publish,
                )
                .await
        };
        match edited {
            Ok(result) => {
                self.settings.set_last_publish_failed(false);
                Ok(PostResult {
                    post_id: post.id.clone(),
                    etag: result.etag,
                    date_published: post.date_published,
                    remote_entry: result.remote_entry,
                })
            }
            Err(e) if is_invalid_post_id_error(&self.client.options(), &e) => {
                warn!("post id {} rejected ({}), publishing as new", post.id, e);
                self.new_post(post, new_category_context, publish).await
            }
            Err(e) => {
                self.settings.set_last_publish_failed(true);
                Err(e)
            }
        }
    }

    pub async fn get_post(&self, post_id: &str, is_page: bool) -> Result<BlogPost> {
        let post = if is_page {
            self.client.get_page(&self.settings.blog_id(), post_id).await?
        } else {
            self.client.get_post(&self.settings.blog_id(), post_id).await?
        };
        Ok(self.open_fetched(post))
    }

    pub async fn delete_post(&self, post_id: &str, is_page: bool, publish: bool) -> Result<()> {
        if is_page {
            self.client
                .delete_page(&self.settings.blog_id(), post_id)
                .await
        } else {
            self.client
                .delete_post(&self.settings.blog_id(), post_id, publish)
                .await
        }
    }

    pub async fn recent_posts(&self, max_posts: usize) -> Result<Vec<BlogPost>> {
        let max = self
            .client
            .options()
            .max_recent_posts
            .map(|cap| cap.min(max_posts))
            .unwrap_or(max_posts);
        let posts = self
            .client
            .get_recent_posts(&self.settings.blog_id(), max, true, None)
            .await?;
        Ok(posts.into_iter().map(|p| self.open_fetched(p)).collect())
    }

    pub async fn recent_pages(&self, max_pages: usize) -> Result<Vec<BlogPost>> {
        let mut pages = self
            .client
            .get_pages(&self.settings.blog_id(), max_pages)
            .await?;
        pages.truncate(max_pages);
        Ok(pages
            .into_iter()
            .map(|mut page| {
                page.is_page = true;
                self.open_fetched(page)
            })
            .collect())
    }

    pub async fn refresh_categories(&self) -> Result<Vec<BlogPostCategory>> {
        let categories = self
            .client
            .get_categories(&self.settings.blog_id())
            .await?;
        self.settings.set_categories(categories.clone());
        Ok(categories)
    }

    pub async fn refresh_keywords(&self) -> Result<Vec<BlogPostKeyword>> {
        let keywords = self.client.get_keywords(&self.settings.blog_id()).await?;
        self.settings.set_keywords(keywords.clone());
        Ok(keywords)
    }

    pub async fn refresh_authors(&self) -> Result<Vec<AuthorInfo>> {
        let authors = self.client.get_authors(&self.settings.blog_id()).await?;
        self.settings.set_authors(authors.clone());
        Ok(authors)
    }

    pub async fn refresh_page_list(&self) -> Result<Vec<PageInfo>> {
        let pages = self.client.get_page_list(&self.settings.blog_id()).await?;
        self.settings.set_pages(pages.clone());
        Ok(pages)
    }

    /// The service's web page for editing the given post, when the
    /// provider configuration knows its shape.
    pub fn post_editing_url(&self, post_id: &str) -> Option<String> {
        let template = self.client.options().post_editing_url;
        if template.is_empty() {
            return None;
        }
        Some(substitute_macros(
            &template,
            &self.settings.homepage_url(),
            &self.settings.blog_id(),
            post_id,
        ))
    }

    pub fn admin_url(&self) -> Option<String> {
        let template = self.client.options().admin_url;
        if template.is_empty() {
            return None;
        }
        Some(substitute_macros(
            &template,
            &self.settings.homepage_url(),
            &self.settings.blog_id(),
            "",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_post_id_faults_match_on_code_or_message() {
        let mut options = BlogClientOptions::default();
        options.invalid_post_id_fault_code_pattern = "^404$".to_string();
        options.invalid_post_id_fault_string_pattern = "(?i)no such post".to_string();

        let by_code = Error::provider("404", "gone");
        let by_message = Error::provider("500", "No such post here");
        let other = Error::provider("500", "database exploded");
        assert!(is_invalid_post_id_error(&options, &by_code));
        assert!(is_invalid_post_id_error(&options, &by_message));
        assert!(!is_invalid_post_id_error(&options, &other));
        assert!(!is_invalid_post_id_error(&options, &Error::OperationCancelled));

        let unconfigured = BlogClientOptions::default();
        assert!(!is_invalid_post_id_error(&unconfigured, &by_code));
    }

    #[test]
    fn relative_permalinks_resolve_against_the_homepage() {
        let mut post = BlogPost::default();
        post.permalink = "/2020/01/hello.html".to_string();
        resolve_permalink(
            "http://example.com/blog/",
            &BlogClientOptions::default(),
            &mut post,
        );
        assert_eq!(post.permalink, "http://example.com/2020/01/hello.html");
    }

    #[test]
    fn missing_permalinks_use_the_provider_template() {
        let mut options = BlogClientOptions::default();
        options.permalink_format = "{homepage}?p={post-id}".to_string();
        let mut post = BlogPost::default();
        post.id = "42".to_string();
        resolve_permalink("http://example.com/", &options, &mut post);
        assert_eq!(post.permalink, "http://example.com/?p=42");
    }

    #[test]
    fn absolute_permalinks_are_untouched() {
        let mut post = BlogPost::default();
        post.permalink = "http://other.example.com/x".to_string();
        resolve_permalink(
            "http://example.com/",
            &BlogClientOptions::default(),
            &mut post,
        );
        assert_eq!(post.permalink, "http://other.example.com/x");
    }

    #[test]
    fn editing_url_macros_substitute() {
        assert_eq!(
            substitute_macros(
                "{homepage}admin/{blog-id}/edit/{post-id}",
                "http://example.com/",
                "7",
                "42"
            ),
            "http://example.com/admin/7/edit/42"
        );
    }
}
