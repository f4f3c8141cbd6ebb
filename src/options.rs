/// Capability descriptor consulted before every operation. Clients install
/// their protocol's defaults; callers may replace the whole value through
/// [`crate::clients::BlogClient::override_options`], never patch individual
/// fields in place.
#[derive(Clone, Debug)]
pub struct BlogClientOptions {
    pub supports_categories: bool,
    pub supports_multiple_categories: bool,
    pub supports_new_categories: bool,
    pub supports_keywords: bool,
    pub supports_custom_date: bool,
    pub supports_excerpt: bool,
    pub supports_slug: bool,
    pub supports_file_upload: bool,
    pub supports_extended_entries: bool,
    pub supports_pages: bool,
    pub supports_page_parent: bool,
    pub supports_post_as_draft: bool,
    pub supports_scheduled_posts: bool,
    pub supports_paging: bool,
    /// Category scheme URI the service uses; `None` accepts any scheme.
    pub category_scheme: Option<String>,
    /// Cap applied to recent-post requests; `None` means ask for whatever
    /// the caller wants.
    pub max_recent_posts: Option<usize>,
    pub character_set: String,
    /// Name of the content filter applied around wire calls; empty for
    /// none.
    pub content_filter: String,
    /// Template for permalinks when the service does not return one, with
    /// `{post-id}` substituted.
    pub permalink_format: String,
    /// Template for the service's "edit this post" web page.
    pub post_editing_url: String,
    pub admin_url: String,
    /// Regex over provider fault codes that mean "no such post id";
    /// edits failing this way are retried as new posts.
    pub invalid_post_id_fault_code_pattern: String,
    /// Same, over fault message text.
    pub invalid_post_id_fault_string_pattern: String,
    /// Template for uploaded file names, with `{name}` and `{ext}`
    /// substituted; empty keeps the original name.
    pub file_upload_name_format: String,
    /// Album or gallery uploaded images are filed under.
    pub image_upload_album: String,
    /// Rewrite linked images through the `s1600-h` full-size URL form.
    pub use_picasa_s1600h: bool,
}

impl Default for BlogClientOptions {
    fn default() -> BlogClientOptions {
        BlogClientOptions {
            supports_categories: false,
            supports_multiple_categories: false,
            supports_new_categories: false,
            supports_keywords: false,
            supports_custom_date: false,
            supports_excerpt: false,
            supports_slug: false,
            supports_file_upload: false,
            supports_extended_entries: false,
            supports_pages: false,
            supports_page_parent: false,
            supports_post_as_draft: false,
            supports_scheduled_posts: false,
            supports_paging: false,
            category_scheme: None,
            max_recent_posts: None,
            character_set: "utf-8".to_string(),
            content_filter: String::new(),
            permalink_format: String::new(),
            post_editing_url: String::new(),
            admin_url: String::new(),
            invalid_post_id_fault_code_pattern: String::new(),
            invalid_post_id_fault_string_pattern: String::new(),
            file_upload_name_format: String::new(),
            image_upload_album: "Quill".to_string(),
            use_picasa_s1600h: false,
        }
    }
}
