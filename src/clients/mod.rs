//! The uniform client contract and the concrete protocol clients behind it.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::authors::AuthorInfo;
use crate::blogs::BlogInfo;
use crate::categories::{BlogPostCategory, BlogPostKeyword};
use crate::credentials::CredentialsAccessor;
use crate::options::BlogClientOptions;
use crate::pages::PageInfo;
use crate::posts::{BlogPost, EditPostResult, PostResult};
use crate::{Error, Result};

pub mod atom;
pub mod blogger;
pub mod google;
pub mod livejournal;

pub use atom::AtomClient;
pub use blogger::BloggerClient;
pub use google::GoogleBloggerClient;
pub use livejournal::LiveJournalClient;

/// Which protocol client an account uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientType {
    Atom,
    Blogger,
    LiveJournal,
    GoogleBloggerV3,
}

impl FromStr for ClientType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<ClientType, String> {
        match s.to_ascii_lowercase().as_str() {
            "atom" | "atompub" => Ok(ClientType::Atom),
            "blogger" | "xmlrpc" => Ok(ClientType::Blogger),
            "livejournal" => Ok(ClientType::LiveJournal),
            "googlebloggerv3" | "google" => Ok(ClientType::GoogleBloggerV3),
            other => Err(format!("unknown client type: {}", other)),
        }
    }
}

/// Receives a callback for every category created on the service while a
/// post is being published, so pickers can refresh without a full reload.
pub trait NewCategoryContext: Send + Sync {
    fn new_category_added(&self, category: &BlogPostCategory);
}

/// A file queued for upload alongside a post.
pub trait FileUploadContext: Send + Sync {
    fn blog_id(&self) -> &str;
    fn filename(&self) -> &str;
    fn contents(&self) -> &[u8];
    /// Linked full-size images bypass service-side resizing when set.
    fn force_direct_image_link(&self) -> bool {
        false
    }
    /// Edit-media URL a previous upload of this file recorded, if the
    /// host keeps one. An upload with a recorded URL replaces the
    /// picture in place instead of creating a duplicate.
    fn edit_media_url(&self) -> Option<String> {
        None
    }
    /// Called after a successful upload so the host can record the
    /// edit-media URL for later replacements.
    fn record_edit_media_url(&self, _url: &str) {}
}

/// Contract every protocol client fulfills. Operations a protocol does not
/// offer keep the default body and report [`Error::MethodUnsupported`];
/// callers consult [`BlogClient::options`] before offering UI for them.
#[async_trait]
pub trait BlogClient: Send + Sync {
    fn protocol_name(&self) -> &'static str;

    /// A copy of the current capability descriptor.
    fn options(&self) -> BlogClientOptions;

    /// Replaces the whole capability descriptor, typically with values
    /// merged from a provider manifest.
    fn override_options(&self, options: BlogClientOptions);

    fn is_secure(&self) -> bool;

    async fn verify_credentials(&self) -> Result<()>;

    async fn get_users_blogs(&self) -> Result<Vec<BlogInfo>>;

    async fn get_categories(&self, blog_id: &str) -> Result<Vec<BlogPostCategory>>;

    async fn get_keywords(&self, _blog_id: &str) -> Result<Vec<BlogPostKeyword>> {
        Err(Error::MethodUnsupported("get_keywords"))
    }

    async fn suggest_categories(
        &self,
        _blog_id: &str,
        _partial: &str,
    ) -> Result<Vec<BlogPostCategory>> {
        Err(Error::MethodUnsupported("suggest_categories"))
    }

    async fn add_category(
        &self,
        _blog_id: &str,
        _category: &BlogPostCategory,
    ) -> Result<BlogPostCategory> {
        Err(Error::MethodUnsupported("add_category"))
    }

    /// The most recent posts, newest first. `before` excludes posts
    /// published at or after the cutoff.
    async fn get_recent_posts(
        &self,
        blog_id: &str,
        max_posts: usize,
        include_categories: bool,
        before: Option<DateTime<Utc>>,
    ) -> Result<Vec<BlogPost>>;

    async fn new_post(
        &self,
        blog_id: &str,
        post: &BlogPost,
        new_category_context: Option<&dyn NewCategoryContext>,
        publish: bool,
    ) -> Result<PostResult>;

    async fn edit_post(
        &self,
        blog_id: &str,
        post: &BlogPost,
        new_category_context: Option<&dyn NewCategoryContext>,
        publish: bool,
    ) -> Result<EditPostResult>;

    async fn get_post(&self, blog_id: &str, post_id: &str) -> Result<BlogPost>;

    async fn delete_post(&self, blog_id: &str, post_id: &str, publish: bool) -> Result<()>;

    async fn get_page(&self, _blog_id: &str, _page_id: &str) -> Result<BlogPost> {
        Err(Error::MethodUnsupported("get_page"))
    }

    async fn get_page_list(&self, _blog_id: &str) -> Result<Vec<PageInfo>> {
        Err(Error::MethodUnsupported("get_page_list"))
    }

    async fn get_pages(&self, _blog_id: &str, _max_pages: usize) -> Result<Vec<BlogPost>> {
        Err(Error::MethodUnsupported("get_pages"))
    }

    async fn new_page(
        &self,
        _blog_id: &str,
        _page: &BlogPost,
        _publish: bool,
    ) -> Result<PostResult> {
        Err(Error::MethodUnsupported("new_page"))
    }

    async fn edit_page(
        &self,
        _blog_id: &str,
        _page: &BlogPost,
        _publish: bool,
    ) -> Result<EditPostResult> {
        Err(Error::MethodUnsupported("edit_page"))
    }

    async fn delete_page(&self, _blog_id: &str, _page_id: &str) -> Result<()> {
        Err(Error::MethodUnsupported("delete_page"))
    }

    async fn get_authors(&self, _blog_id: &str) -> Result<Vec<AuthorInfo>> {
        Err(Error::MethodUnsupported("get_authors"))
    }

    /// Uploads a file before the post referencing it is published and
    /// returns the public URL to substitute into the post body.
    async fn do_before_publish_upload(
        &self,
        _upload: &dyn FileUploadContext,
    ) -> Result<String> {
        Err(Error::MethodUnsupported("do_before_publish_upload"))
    }

    /// Second upload phase for services that need the post to exist first.
    async fn do_after_publish_upload(&self, _upload: &dyn FileUploadContext) -> Result<()> {
        Err(Error::MethodUnsupported("do_after_publish_upload"))
    }

    /// Media endpoints a service exposes separately from its blogs.
    async fn get_image_endpoints(&self) -> Result<Vec<BlogInfo>> {
        Err(Error::MethodUnsupported("get_image_endpoints"))
    }

    /// Decorator applying this client's authentication to an arbitrary
    /// outgoing request, for callers fetching service resources directly.
    fn request_filter(&self) -> quill_common::request::RequestFilter {
        quill_common::request::no_op_filter()
    }

    /// Fetches an arbitrary service resource with this client's
    /// authentication applied, chasing redirects the usual bounded way.
    async fn send_authenticated_request(&self, url: &str) -> Result<reqwest::Response> {
        let http = quill_common::request::build_client()?;
        let filter = self.request_filter();
        quill_common::request::follow_redirects(url, |current| Ok(filter(http.get(current))))
            .await
    }
}

/// Builds the concrete client for an account. There is no global registry;
/// embedders that add protocols construct their clients directly.
pub fn create_client(
    client_type: ClientType,
    post_api_url: &str,
    credentials: CredentialsAccessor,
) -> Result<Arc<dyn BlogClient>> {
    Ok(match client_type {
        ClientType::Atom => Arc::new(AtomClient::new(post_api_url, credentials)?),
        ClientType::Blogger => Arc::new(BloggerClient::new(post_api_url, credentials)?),
        ClientType::LiveJournal => Arc::new(LiveJournalClient::new(post_api_url, credentials)?),
        ClientType::GoogleBloggerV3 => Arc::new(GoogleBloggerClient::new(
            credentials,
            google::auth::ApiSecrets::from_env(),
            None,
        )?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_types_parse_from_strings() {
        assert_eq!("atom".parse::<ClientType>(), Ok(ClientType::Atom));
        assert_eq!(
            "GoogleBloggerV3".parse::<ClientType>(),
            Ok(ClientType::GoogleBloggerV3)
        );
        assert!("gopher".parse::<ClientType>().is_err());
    }

    #[tokio::test]
    async fn image_endpoints_default_to_unsupported() {
        let client = create_client(
            ClientType::Atom,
            "http://example.com/atom",
            CredentialsAccessor::new("ann", "hunter2"),
        )
        .unwrap();
        assert!(matches!(
            client.get_image_endpoints().await,
            Err(Error::MethodUnsupported("get_image_endpoints"))
        ));
    }

    struct QueuedUpload;

    impl FileUploadContext for QueuedUpload {
        fn blog_id(&self) -> &str {
            "1"
        }
        fn filename(&self) -> &str {
            "photo.jpg"
        }
        fn contents(&self) -> &[u8] {
            &[]
        }
    }

    #[test]
    fn fresh_uploads_have_no_recorded_media_url() {
        let upload = QueuedUpload;
        assert!(upload.edit_media_url().is_none());
        // the default context keeps no state, so a record is a no-op
        upload.record_edit_media_url("http://example.com/media/1");
        assert!(upload.edit_media_url().is_none());
    }
}
