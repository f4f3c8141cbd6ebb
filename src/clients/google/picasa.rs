//! Image uploads for Blogger blogs, through the Picasa-compatible media
//! API. Albums are located, never created: posting into a missing album
//! would silently fork the user's library.

use atom_syndication::Feed;
use quill_common::rest;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};
use url::Url;
use xmltree::Element;

use quill_common::xmlutil;

use crate::{Error, Result};

use super::auth::GoogleAuth;
use super::api;

const ALBUM_FEED_URL: &str = "https://picasaweb.google.com/data/feed/api/user/default?kind=album";
const FEED_REL: &str = "http://schemas.google.com/g/2005#feed";
const MEDIA_NS: &str = "http://search.yahoo.com/mrss/";
const MAX_UPLOAD_RETRIES: usize = 5;

/// An uploaded (or updated) picture.
pub struct PicasaMedia {
    /// Public URL of the picture.
    pub url: String,
    /// URL a replacement upload must PUT to.
    pub edit_media_url: Option<String>,
}

pub(crate) struct PicasaService {
    http: Client,
}

fn content_type_for(filename: &str) -> &'static str {
    let extension = filename
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        _ => "application/octet-stream",
    }
}

fn file_stem(filename: &str) -> &str {
    let base = filename
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(filename);
    match base.rfind('.') {
        Some(0) | None => base,
        Some(at) => &base[..at],
    }
}

/// The `/s1600-h/` form of a hosted image URL, which links to the
/// full-size rendition.
pub fn s1600h_url(image_url: &str) -> Option<String> {
    let mut url = Url::parse(image_url).ok()?;
    let mut segments: Vec<String> = url.path_segments()?.map(str::to_string).collect();
    if segments.len() < 2 || segments.iter().any(|s| s == "s1600-h") {
        return None;
    }
    let last = segments.len() - 1;
    segments.insert(last, "s1600-h".to_string());
    url.set_path(&segments.join("/"));
    Some(url.to_string())
}

/// Fallback when the `s1600-h` form is unavailable: ask the image server
/// for the largest rendition it serves directly.
pub fn imgmax_url(image_url: &str) -> String {
    match Url::parse(image_url) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair("imgmax", "800");
            url.to_string()
        }
        Err(_) => image_url.to_string(),
    }
}

impl PicasaService {
    pub(crate) fn new(http: Client) -> PicasaService {
        PicasaService { http }
    }

    /// Feed URL of the named album. Albums with no room left are skipped,
    /// matching what the web uploader does.
    async fn album_feed_url(&self, auth: &GoogleAuth, album_name: &str) -> Result<String> {
        let token = auth.access_token().await?;
        let response = self
            .http
            .get(ALBUM_FEED_URL)
            .header("GData-Version", "2")
            .bearer_auth(&token)
            .send()
            .await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            // the media service is gone or disabled for this account;
            // treat it like a declined upload rather than a broken blog
            return Err(Error::OperationCancelled);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(rest::status_error("GET album feed", status, &body));
        }
        let body = response.text().await?;
        let feed = Feed::read_from(body.as_bytes())
            .map_err(|e| Error::invalid_response("GET album feed", e.to_string(), body))?;
        for entry in feed.entries() {
            if entry.title().value != album_name {
                continue;
            }
            let remaining = entry
                .extensions()
                .get("gphoto")
                .and_then(|m| m.get("numphotosremaining"))
                .and_then(|exts| exts.first())
                .and_then(|ext| ext.value())
                .and_then(|v| v.trim().parse::<i64>().ok());
            if matches!(remaining, Some(n) if n < 1) {
                debug!("album {} is full, skipping", album_name);
                continue;
            }
            if let Some(link) = entry
                .links()
                .iter()
                .find(|l| l.rel() == FEED_REL && l.mime_type() == Some("application/atom+xml"))
            {
                return Ok(link.href().to_string());
            }
        }
        Err(Error::provider(
            "album",
            format!(
                "could not find an album named \"{}\" to upload pictures into",
                album_name
            ),
        ))
    }

    /// Uploads a picture, POSTing a new one or PUTting over an existing
    /// edit-media URL. Stale tokens and transient conflicts are retried a
    /// bounded number of times.
    pub(crate) async fn upload(
        &self,
        auth: &GoogleAuth,
        album_name: &str,
        filename: &str,
        contents: &[u8],
        existing_url: Option<&str>,
    ) -> Result<PicasaMedia> {
        let target = match existing_url {
            Some(url) => url.to_string(),
            None => self.album_feed_url(auth, album_name).await?,
        };
        let content_type = content_type_for(filename);
        let mut last_error = None;
        for attempt in 0..MAX_UPLOAD_RETRIES {
            let token = auth.access_token().await?;
            let request = match existing_url {
                Some(_) => self.http.put(&target),
                None => self
                    .http
                    .post(&target)
                    .header("Slug", crate::clients::atom::encode_slug(file_stem(filename))),
            };
            let response = request
                .header("GData-Version", "2")
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .bearer_auth(&token)
                .body(contents.to_vec())
                .send()
                .await?;
            let status = response.status();
            if status.is_success() {
                let body = response.text().await?;
                return parse_media_entry(&body);
            }
            let body = response.text().await.unwrap_or_default();
            let error = rest::status_error("picture upload", status, &body);
            if api::is_stale_token_error(&error) {
                warn!("picture upload rejected, refreshing token (attempt {})", attempt + 1);
                auth.invalidate_access_token();
            } else if api::is_conflict_error(&error) {
                warn!("picture upload conflicted, retrying (attempt {})", attempt + 1);
            } else {
                return Err(error);
            }
            last_error = Some(error);
        }
        Err(last_error.unwrap_or(Error::OperationCancelled))
    }
}

/// Pulls the picture URL and the edit-media link out of the entry the
/// upload returns.
fn parse_media_entry(body: &str) -> Result<PicasaMedia> {
    let entry = Element::parse(body.as_bytes())
        .map_err(|e| Error::invalid_response("picture upload", format!("malformed entry: {}", e), body))?;
    let url = xmlutil::any_child(&entry, "content")
        .and_then(|content| content.attributes.get("src").cloned())
        .or_else(|| {
            xmlutil::child(&entry, MEDIA_NS, "group")
                .map(|group| xmlutil::children(group, MEDIA_NS, "content"))
                .and_then(|contents| {
                    contents
                        .into_iter()
                        .find(|c| c.attributes.get("medium").map(String::as_str) == Some("image"))
                        .and_then(|c| c.attributes.get("url").cloned())
                })
        })
        .ok_or_else(|| {
            Error::invalid_response("picture upload", "no picture URL in the returned entry", body)
        })?;
    let edit_media_url = entry
        .children
        .iter()
        .filter_map(xmltree::XMLNode::as_element)
        .filter(|e| e.name == "link")
        .find(|l| l.attributes.get("rel").map(String::as_str) == Some("edit-media"))
        .and_then(|l| l.attributes.get("href").cloned());
    Ok(PicasaMedia {
        url,
        edit_media_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s1600h_inserts_before_the_file_segment() {
        assert_eq!(
            s1600h_url("http://lh3.example.com/ann/AbC/photo.jpg").as_deref(),
            Some("http://lh3.example.com/ann/AbC/s1600-h/photo.jpg")
        );
        assert!(s1600h_url("http://lh3.example.com/ann/AbC/s1600-h/photo.jpg").is_none());
    }

    #[test]
    fn imgmax_appends_a_query() {
        assert_eq!(
            imgmax_url("http://lh3.example.com/photo.jpg"),
            "http://lh3.example.com/photo.jpg?imgmax=800"
        );
    }

    #[test]
    fn content_types_follow_the_extension() {
        assert_eq!(content_type_for("a.JPG"), "image/jpeg");
        assert_eq!(content_type_for("a.png"), "image/png");
        assert_eq!(content_type_for("archive.zip"), "application/octet-stream");
    }

    #[test]
    fn file_stems_drop_directories_and_extensions() {
        assert_eq!(file_stem("dir/photo.final.jpg"), "photo.final");
        assert_eq!(file_stem("photo"), "photo");
        assert_eq!(file_stem(".hidden"), ".hidden");
    }

    #[test]
    fn media_entries_parse_from_content_src() {
        let media = parse_media_entry(
            r#"<entry xmlns="http://www.w3.org/2005/Atom">
                <content type="image/jpeg" src="http://lh3.example.com/photo.jpg"/>
                <link rel="edit-media" href="http://picasaweb.example.com/media/1"/>
            </entry>"#,
        )
        .unwrap();
        assert_eq!(media.url, "http://lh3.example.com/photo.jpg");
        assert_eq!(
            media.edit_media_url.as_deref(),
            Some("http://picasaweb.example.com/media/1")
        );
    }

    #[test]
    fn media_entries_fall_back_to_media_group() {
        let media = parse_media_entry(
            r#"<entry xmlns="http://www.w3.org/2005/Atom" xmlns:media="http://search.yahoo.com/mrss/">
                <media:group>
                    <media:content medium="image" url="http://lh3.example.com/photo.jpg"/>
                </media:group>
            </entry>"#,
        )
        .unwrap();
        assert_eq!(media.url, "http://lh3.example.com/photo.jpg");
    }
}
