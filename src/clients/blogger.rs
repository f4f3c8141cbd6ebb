//! Client for the Blogger v1 XML-RPC API, which a number of services still
//! speak. The protocol has no title field, so the title travels inline in
//! the body inside a `<title>` wrapper. The wire core is shared with the
//! LiveJournal client, which swaps in its own fault mapping and body codec.

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use quill_common::request::{self, RequestFilter};
use quill_common::xmlrpc::{self, MethodResponse, Value, XmlRpcEndpoint};
use xmltree::Element;

use crate::blogs::BlogInfo;
use crate::categories::BlogPostCategory;
use crate::credentials::CredentialsAccessor;
use crate::options::BlogClientOptions;
use crate::posts::{BlogPost, EditPostResult, PostResult};
use crate::{Error, Result};

use super::{BlogClient, NewCategoryContext};

/// Application key sent as the first parameter of every `blogger.*` call.
/// Services stopped checking it long ago but still require its presence.
pub const APP_KEY: &str = "0123456789ABCDEF";

/// Translates a fault the service is known to use for bad credentials into
/// an authentication error; `None` falls through to a provider error.
pub type FaultMapper = fn(code: &str, message: &str) -> Option<Error>;

/// Encodes a post body for the wire and decodes it back. Protocol quirks
/// (title wrappers, cut tags, base64 transport) live here instead of in
/// subclass overrides.
pub struct PostBodyCodec {
    pub encode: fn(&BlogPost) -> Value,
    pub decode: fn(&str, &mut BlogPost),
}

pub fn format_post_body(title: &str, body: &str) -> String {
    if title.is_empty() {
        body.to_string()
    } else {
        format!("<title>{}</title>{}", title, body)
    }
}

/// Splits a `<title>` wrapper off the front of a fetched body. Leading
/// line breaks before and after the wrapper are noise.
pub fn extract_title(content: &str) -> (String, String) {
    let trimmed = content.trim_start_matches(|c| c == '\r' || c == '\n');
    let lower = trimmed.to_ascii_lowercase();
    if let Some(rest) = lower.strip_prefix("<title>") {
        if let Some(end) = rest.find("</title>") {
            let title = trimmed["<title>".len().."<title>".len() + end].to_string();
            let body = trimmed["<title>".len() + end + "</title>".len()..]
                .trim_start_matches(|c| c == '\r' || c == '\n')
                .to_string();
            return (title, body);
        }
    }
    (String::new(), trimmed.to_string())
}

fn default_encode(post: &BlogPost) -> Value {
    Value::string(format_post_body(&post.title, &post.contents))
}

fn default_decode(content: &str, post: &mut BlogPost) {
    let (title, body) = extract_title(content);
    post.title = title;
    post.contents = body;
}

pub(crate) struct BloggerCompatibleCore {
    endpoint: XmlRpcEndpoint,
    credentials: CredentialsAccessor,
    fault_mapper: FaultMapper,
    codec: PostBodyCodec,
}

impl BloggerCompatibleCore {
    pub(crate) fn new(
        url: &str,
        credentials: CredentialsAccessor,
        fault_mapper: FaultMapper,
        codec: PostBodyCodec,
    ) -> Result<BloggerCompatibleCore> {
        Ok(BloggerCompatibleCore {
            endpoint: XmlRpcEndpoint::new(url, request::build_client()?, request::no_op_filter()),
            credentials,
            fault_mapper,
            codec,
        })
    }

    pub(crate) fn url(&self) -> &str {
        self.endpoint.url()
    }

    pub(crate) fn credentials(&self) -> &CredentialsAccessor {
        &self.credentials
    }

    async fn call(&self, method: &str, parameters: &[Value]) -> Result<Element> {
        match self.endpoint.call(method, parameters).await? {
            MethodResponse::Success(value) => Ok(value),
            MethodResponse::Fault { code, message } => {
                Err((self.fault_mapper)(&code, &message)
                    .unwrap_or_else(|| Error::provider(code, message)))
            }
        }
    }

    fn auth_parameters(&self) -> (Value, Value) {
        let snapshot = self.credentials.snapshot();
        (
            Value::string(snapshot.username),
            Value::secret(snapshot.password),
        )
    }

    pub(crate) async fn users_blogs(&self) -> Result<Vec<BlogInfo>> {
        let (username, password) = self.auth_parameters();
        let value = self
            .call(
                "blogger.getUsersBlogs",
                &[Value::string(APP_KEY), username, password],
            )
            .await?;
        let mut blogs = Vec::new();
        for blog in xmlrpc::array_values(&value) {
            let member = |name: &str| {
                xmlrpc::struct_member(blog, name)
                    .map(xmlrpc::value_text)
                    .unwrap_or_default()
            };
            blogs.push(BlogInfo::new(
                member("blogid"),
                member("blogName"),
                member("url"),
            ));
        }
        Ok(blogs)
    }

    fn parse_post(&self, value: &Element) -> BlogPost {
        let member = |name: &str| {
            xmlrpc::struct_member(value, name)
                .map(xmlrpc::value_text)
                .unwrap_or_default()
        };
        let mut post = BlogPost::default();
        post.id = member("postid");
        (self.codec.decode)(&member("content"), &mut post);
        post.date_published = xmlrpc::struct_member(value, "dateCreated")
            .map(xmlrpc::value_text)
            .and_then(|text| xmlrpc::parse_datetime(&text))
            .map(|naive| Utc.from_utc_datetime(&naive));
        post
    }

    pub(crate) async fn recent_posts(
        &self,
        blog_id: &str,
        max_posts: usize,
        before: Option<DateTime<Utc>>,
    ) -> Result<Vec<BlogPost>> {
        let (username, password) = self.auth_parameters();
        let value = self
            .call(
                "blogger.getRecentPosts",
                &[
                    Value::string(APP_KEY),
                    Value::string(blog_id),
                    username,
                    password,
                    Value::Int(max_posts as i32),
                ],
            )
            .await?;
        let mut posts = Vec::new();
        for item in xmlrpc::array_values(&value) {
            let post = self.parse_post(item);
            if let (Some(cutoff), Some(published)) = (before, post.date_published) {
                if published >= cutoff {
                    continue;
                }
            }
            posts.push(post);
            if posts.len() >= max_posts {
                break;
            }
        }
        Ok(posts)
    }

    pub(crate) async fn post(&self, post_id: &str) -> Result<BlogPost> {
        let (username, password) = self.auth_parameters();
        let value = self
            .call(
                "blogger.getPost",
                &[
                    Value::string(APP_KEY),
                    Value::string(post_id),
                    username,
                    password,
                ],
            )
            .await?;
        Ok(self.parse_post(&value))
    }

    pub(crate) async fn new_post(
        &self,
        blog_id: &str,
        post: &BlogPost,
        publish: bool,
    ) -> Result<PostResult> {
        let (username, password) = self.auth_parameters();
        let value = self
            .call(
                "blogger.newPost",
                &[
                    Value::string(APP_KEY),
                    Value::string(blog_id),
                    username,
                    password,
                    (self.codec.encode)(post),
                    Value::Boolean(publish),
                ],
            )
            .await?;
        let post_id = xmlrpc::value_text(&value);
        if post_id.is_empty() {
            return Err(Error::invalid_response(
                "blogger.newPost",
                "service did not return a post id",
                "",
            ));
        }
        Ok(PostResult {
            post_id,
            ..PostResult::default()
        })
    }

    pub(crate) async fn edit_post(&self, post: &BlogPost, publish: bool) -> Result<EditPostResult> {
        let (username, password) = self.auth_parameters();
        self.call(
            "blogger.editPost",
            &[
                Value::string(APP_KEY),
                Value::string(&post.id),
                username,
                password,
                (self.codec.encode)(post),
                Value::Boolean(publish),
            ],
        )
        .await?;
        Ok(EditPostResult::default())
    }

    pub(crate) async fn delete_post(&self, post_id: &str, publish: bool) -> Result<()> {
        let (username, password) = self.auth_parameters();
        self.call(
            "blogger.deletePost",
            &[
                Value::string(APP_KEY),
                Value::string(post_id),
                username,
                password,
                Value::Boolean(publish),
            ],
        )
        .await?;
        Ok(())
    }
}

pub struct BloggerClient {
    core: BloggerCompatibleCore,
    options: RwLock<BlogClientOptions>,
}

impl BloggerClient {
    pub fn new(post_api_url: &str, credentials: CredentialsAccessor) -> Result<BloggerClient> {
        let mut options = BlogClientOptions::default();
        options.supports_post_as_draft = true;
        Ok(BloggerClient {
            core: BloggerCompatibleCore::new(
                post_api_url,
                credentials,
                |_, _| None,
                PostBodyCodec {
                    encode: default_encode,
                    decode: default_decode,
                },
            )?,
            options: RwLock::new(options),
        })
    }
}

#[async_trait]
impl BlogClient for BloggerClient {
    fn protocol_name(&self) -> &'static str {
        "Blogger"
    }

    fn options(&self) -> BlogClientOptions {
        self.options.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn override_options(&self, options: BlogClientOptions) {
        *self.options.write().unwrap_or_else(|e| e.into_inner()) = options;
    }

    fn is_secure(&self) -> bool {
        self.core.url().to_ascii_lowercase().starts_with("https:")
    }

    fn request_filter(&self) -> RequestFilter {
        request::no_op_filter()
    }

    async fn verify_credentials(&self) -> Result<()> {
        self.core.users_blogs().await.map(|_| ())
    }

    async fn get_users_blogs(&self) -> Result<Vec<BlogInfo>> {
        self.core.users_blogs().await
    }

    async fn get_categories(&self, _blog_id: &str) -> Result<Vec<BlogPostCategory>> {
        Err(Error::MethodUnsupported("get_categories"))
    }

    async fn get_recent_posts(
        &self,
        blog_id: &str,
        max_posts: usize,
        _include_categories: bool,
        before: Option<DateTime<Utc>>,
    ) -> Result<Vec<BlogPost>> {
        self.core.recent_posts(blog_id, max_posts, before).await
    }

    async fn new_post(
        &self,
        blog_id: &str,
        post: &BlogPost,
        _new_category_context: Option<&dyn NewCategoryContext>,
        publish: bool,
    ) -> Result<PostResult> {
        self.core.new_post(blog_id, post, publish).await
    }

    async fn edit_post(
        &self,
        _blog_id: &str,
        post: &BlogPost,
        _new_category_context: Option<&dyn NewCategoryContext>,
        publish: bool,
    ) -> Result<EditPostResult> {
        self.core.edit_post(post, publish).await
    }

    async fn get_post(&self, _blog_id: &str, post_id: &str) -> Result<BlogPost> {
        self.core.post(post_id).await
    }

    async fn delete_post(&self, _blog_id: &str, post_id: &str, publish: bool) -> Result<()> {
        self.core.delete_post(post_id, publish).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn titles_travel_inside_the_body() {
        assert_eq!(
            format_post_body("Hi", "<p>body</p>"),
            "<title>Hi</title><p>body</p>"
        );
        assert_eq!(format_post_body("", "<p>body</p>"), "<p>body</p>");
    }

    #[test]
    fn title_wrappers_are_extracted() {
        let (title, body) = extract_title("\r\n<title>Hi</title>\r\n<p>body</p>");
        assert_eq!(title, "Hi");
        assert_eq!(body, "<p>body</p>");

        let (title, body) = extract_title("<p>no title here</p>");
        assert_eq!(title, "");
        assert_eq!(body, "<p>no title here</p>");
    }

    #[test]
    fn default_codec_round_trips() {
        let mut post = BlogPost::default();
        post.title = "Hi".to_string();
        post.contents = "<p>body</p>".to_string();
        let encoded = default_encode(&post);
        let text = match encoded {
            Value::String { value, .. } => value,
            _ => panic!("expected a string value"),
        };
        let mut decoded = BlogPost::default();
        default_decode(&text, &mut decoded);
        assert_eq!(decoded.title, "Hi");
        assert_eq!(decoded.contents, "<p>body</p>");
    }
}
