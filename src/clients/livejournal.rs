//! LiveJournal client. Posting goes through LiveJournal's Blogger v1
//! XML-RPC compatibility endpoint; bodies travel base64-encoded with the
//! title wrapped inline and `<lj-cut>` marking the extended section. Images
//! go to the separate Fotobilder picture service, which authenticates with
//! an MD5 challenge-response.

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use openssl::hash::{hash, MessageDigest};
use quill_common::request::{self, RequestFilter};
use quill_common::xmlrpc::Value;
use quill_common::xmlutil;
use reqwest::Client;
use tracing::debug;
use xmltree::Element;

use crate::blogs::BlogInfo;
use crate::categories::BlogPostCategory;
use crate::credentials::CredentialsAccessor;
use crate::options::BlogClientOptions;
use crate::posts::{BlogPost, EditPostResult, PostResult};
use crate::{Error, Result};

use super::blogger::{
    extract_title, format_post_body, BloggerCompatibleCore, PostBodyCodec,
};
use super::{BlogClient, FileUploadContext, NewCategoryContext};

const LJ_CUT: &str = "<lj-cut>";
const FOTOBILDER_ENDPOINT: &str = "http://pics.livejournal.com/interface/simple";
/// Fotobilder security mask for "visible to everyone".
const PIC_SEC_PUBLIC: &str = "255";

fn lj_fault_mapper(code: &str, message: &str) -> Option<Error> {
    // 100: unknown user, 101: bad password; "SERVER" faults carry the
    // detail only in the message text
    if code == "100" || code == "101" {
        return Some(Error::authentication(code, message));
    }
    if code.eq_ignore_ascii_case("SERVER")
        && message.to_ascii_lowercase().starts_with("invalid login")
    {
        return Some(Error::authentication(code, message));
    }
    None
}

fn lj_encode(post: &BlogPost) -> Value {
    let mut body = format_post_body(&post.title, post.main_contents());
    if let Some(extended) = post.extended_contents() {
        body.push_str(LJ_CUT);
        body.push_str(extended);
    }
    // base64 transport sidesteps the service's charset guessing
    Value::Base64(body.into_bytes())
}

fn lj_decode(content: &str, post: &mut BlogPost) {
    let (title, body) = extract_title(content);
    post.title = title;
    match body.to_ascii_lowercase().find(LJ_CUT) {
        Some(at) => {
            let main = body[..at].to_string();
            let extended = body[at + LJ_CUT.len()..].to_string();
            post.set_split_contents(&main, &extended);
        }
        None => post.contents = body,
    }
}

pub struct LiveJournalClient {
    core: BloggerCompatibleCore,
    http: Client,
    options: RwLock<BlogClientOptions>,
}

impl LiveJournalClient {
    pub fn new(post_api_url: &str, credentials: CredentialsAccessor) -> Result<LiveJournalClient> {
        let mut options = BlogClientOptions::default();
        options.supports_file_upload = true;
        options.supports_extended_entries = true;
        Ok(LiveJournalClient {
            core: BloggerCompatibleCore::new(
                post_api_url,
                credentials,
                lj_fault_mapper,
                PostBodyCodec {
                    encode: lj_encode,
                    decode: lj_decode,
                },
            )?,
            http: request::build_client()?,
            options: RwLock::new(options),
        })
    }

    fn md5_hex(data: &[u8]) -> Result<String> {
        let digest = hash(MessageDigest::md5(), data)
            .map_err(|e| Error::Xml(format!("digest failure: {}", e)))?;
        Ok(hex::encode(digest))
    }

    /// The Fotobilder challenge-response: `crp:{challenge}:{md5(challenge
    /// + md5(password))}`.
    fn challenge_auth(challenge: &str, password: &str) -> Result<String> {
        let password_hash = Self::md5_hex(password.as_bytes())?;
        let response = Self::md5_hex(format!("{}{}", challenge, password_hash).as_bytes())?;
        Ok(format!("crp:{}:{}", challenge, response))
    }

    async fn fotobilder_call(
        &self,
        mode: &str,
        auth: Option<&str>,
        headers: &[(String, String)],
        body: Option<Vec<u8>>,
    ) -> Result<Element> {
        let username = self.core.credentials().username();
        let request = match &body {
            Some(bytes) => self.http.put(FOTOBILDER_ENDPOINT).body(bytes.clone()),
            None => self.http.get(FOTOBILDER_ENDPOINT),
        };
        let mut request = request
            .header("X-FB-User", username)
            .header("X-FB-Mode", mode);
        if let Some(auth) = auth {
            request = request.header("X-FB-Auth", auth);
        }
        for (name, value) in headers {
            request = request.header(format!("X-FB-{}", name), value.as_str());
        }
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        debug!("Fotobilder {} response:\n{}", mode, text);
        if !status.is_success() {
            return Err(quill_common::rest::status_error(mode, status, &text));
        }
        let document = Element::parse(text.trim_start().as_bytes())
            .map_err(|e| Error::invalid_response(mode, format!("malformed XML: {}", e), text))?;
        if let Some(error) = xmlutil::descendant(&document, "", "Error") {
            return Err(Self::map_fotobilder_error(error));
        }
        Ok(document)
    }

    fn map_fotobilder_error(error: &Element) -> Error {
        let code = error.attributes.get("code").cloned().unwrap_or_default();
        let message = xmlutil::text_content(error);
        match code.as_str() {
            "301" | "302" => Error::authentication(code, message),
            "303" => Error::FileUploadUnsupported { code, message },
            _ => {
                let class = match code.chars().next() {
                    Some('1') => "user error",
                    Some('2') => "client error",
                    Some('3') => "access error",
                    Some('4') => "limit error",
                    Some('5') => "server error",
                    _ => "error",
                };
                Error::provider(code, format!("picture service {}: {}", class, message))
            }
        }
    }

    async fn fotobilder_challenges(&self, quantity: usize) -> Result<Vec<String>> {
        let document = self
            .fotobilder_call(
                "GetChallenges",
                None,
                &[("GetChallenges.Qty".to_string(), quantity.to_string())],
                None,
            )
            .await?;
        let challenges: Vec<String> = collect_descendants(&document, "Challenge");
        if challenges.len() < quantity {
            return Err(Error::invalid_response(
                "GetChallenges",
                format!(
                    "asked for {} challenges, got {}",
                    quantity,
                    challenges.len()
                ),
                "",
            ));
        }
        Ok(challenges)
    }

    /// Remaining upload quota in bytes, when the service reports one.
    async fn fotobilder_login(&self, challenge: &str) -> Result<Option<u64>> {
        let auth = Self::challenge_auth(challenge, &self.core.credentials().password())?;
        let document = self
            .fotobilder_call("Login", Some(&auth), &[], None)
            .await?;
        let remaining = xmlutil::descendant(&document, "", "Quota")
            .and_then(|quota| xmlutil::child(quota, "", "Remaining"))
            .map(xmlutil::text_content)
            .and_then(|text| text.trim().parse().ok());
        Ok(remaining)
    }

    async fn fotobilder_upload(&self, upload: &dyn FileUploadContext) -> Result<String> {
        let album = self.options().image_upload_album;
        let contents = upload.contents().to_vec();
        let challenges = self.fotobilder_challenges(2).await?;

        let quota = self.fotobilder_login(&challenges[0]).await?;
        if let Some(remaining) = quota {
            if (contents.len() as u64) > remaining {
                return Err(Error::FileUploadUnsupported {
                    code: "quota".to_string(),
                    message: format!(
                        "upload of {} bytes exceeds the remaining quota of {} bytes",
                        contents.len(),
                        remaining
                    ),
                });
            }
        }

        let auth = Self::challenge_auth(&challenges[1], &self.core.credentials().password())?;
        let headers = vec![
            ("UploadPic.PicSec".to_string(), PIC_SEC_PUBLIC.to_string()),
            (
                "UploadPic.Meta.Filename".to_string(),
                upload.filename().to_string(),
            ),
            (
                "UploadPic.ImageLength".to_string(),
                contents.len().to_string(),
            ),
            ("UploadPic.Gallery._size".to_string(), "1".to_string()),
            ("UploadPic.Gallery.0.GalName".to_string(), album),
            (
                "UploadPic.Gallery.0.GalSec".to_string(),
                PIC_SEC_PUBLIC.to_string(),
            ),
        ];
        let document = self
            .fotobilder_call("UploadPic", Some(&auth), &headers, Some(contents))
            .await?;
        xmlutil::descendant(&document, "", "UploadPicResponse")
            .and_then(|response| xmlutil::child(response, "", "URL"))
            .map(|url| xmlutil::text_content(url).trim().to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                Error::invalid_response("UploadPic", "response did not include a picture URL", "")
            })
    }
}

fn collect_descendants(root: &Element, name: &str) -> Vec<String> {
    let mut out = Vec::new();
    fn walk(element: &Element, name: &str, out: &mut Vec<String>) {
        for child in xmlutil::element_children(element) {
            if child.name == name {
                out.push(xmlutil::text_content(child).trim().to_string());
            }
            walk(child, name, out);
        }
    }
    walk(root, name, &mut out);
    out
}

#[async_trait]
impl BlogClient for LiveJournalClient {
    fn protocol_name(&self) -> &'static str {
        "LiveJournal"
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
        if !publish {
            return Err(Error::PostAsDraftUnsupported);
        }
        self.core.new_post(blog_id, post, publish).await
    }

    async fn edit_post(
        &self,
        _blog_id: &str,
        post: &BlogPost,
        _new_category_context: Option<&dyn NewCategoryContext>,
        publish: bool,
    ) -> Result<EditPostResult> {
        if !publish {
            return Err(Error::PostAsDraftUnsupported);
        }
        self.core.edit_post(post, publish).await
    }

    async fn get_post(&self, _blog_id: &str, post_id: &str) -> Result<BlogPost> {
        self.core.post(post_id).await
    }

    async fn delete_post(&self, _blog_id: &str, post_id: &str, publish: bool) -> Result<()> {
        self.core.delete_post(post_id, publish).await
    }

    async fn do_before_publish_upload(&self, upload: &dyn FileUploadContext) -> Result<String> {
        self.fotobilder_upload(upload).await
    }

    async fn do_after_publish_upload(&self, _upload: &dyn FileUploadContext) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::posts::EXTENDED_ENTRY_BREAK;

    #[test]
    fn bodies_split_on_the_cut_tag() {
        let mut post = BlogPost::default();
        lj_decode("<title>Hi</title><p>teaser</p><lj-cut><p>rest</p>", &mut post);
        assert_eq!(post.title, "Hi");
        assert_eq!(post.main_contents(), "<p>teaser</p>");
        assert_eq!(post.extended_contents(), Some("<p>rest</p>"));
    }

    #[test]
    fn encoded_bodies_carry_title_and_cut() {
        let mut post = BlogPost::default();
        post.title = "Hi".to_string();
        post.contents = format!("<p>teaser</p>{}<p>rest</p>", EXTENDED_ENTRY_BREAK);
        match lj_encode(&post) {
            Value::Base64(bytes) => {
                let text = String::from_utf8(bytes).unwrap();
                assert_eq!(text, "<title>Hi</title><p>teaser</p><lj-cut><p>rest</p>");
            }
            _ => panic!("expected base64 transport"),
        }
    }

    #[test]
    fn login_faults_map_to_authentication() {
        assert!(matches!(
            lj_fault_mapper("101", "bad password"),
            Some(Error::Authentication { .. })
        ));
        assert!(matches!(
            lj_fault_mapper("SERVER", "Invalid login or password"),
            Some(Error::Authentication { .. })
        ));
        assert!(lj_fault_mapper("500", "boom").is_none());
    }

    #[test]
    fn fotobilder_errors_map_by_code() {
        let element = |code: &str| {
            Element::parse(format!(r#"<Error code="{}">details</Error>"#, code).as_bytes()).unwrap()
        };
        assert!(matches!(
            LiveJournalClient::map_fotobilder_error(&element("301")),
            Error::Authentication { .. }
        ));
        assert!(matches!(
            LiveJournalClient::map_fotobilder_error(&element("303")),
            Error::FileUploadUnsupported { .. }
        ));
        assert!(matches!(
            LiveJournalClient::map_fotobilder_error(&element("402")),
            Error::Provider { .. }
        ));
    }

    #[test]
    fn challenge_auth_has_the_crp_shape() {
        let auth = LiveJournalClient::challenge_auth("c0ffee", "hunter2").unwrap();
        assert!(auth.starts_with("crp:c0ffee:"));
        assert_eq!(auth.len(), "crp:c0ffee:".len() + 32);
    }
}
