use chrono::{DateTime, Utc};
use xmltree::Element;

use crate::authors::AuthorInfo;
use crate::categories::BlogPostCategory;

/// Marker separating the above-the-fold part of a post body from its
/// extended section, for services with split entries (LiveJournal's
/// `<lj-cut>`, WordPress's "more" divider).
pub const EXTENDED_ENTRY_BREAK: &str = "<!--more-->";

/// A weblog post or page in editable form.
#[derive(Clone, Debug, Default)]
pub struct BlogPost {
    /// Empty until the first successful publish.
    pub id: String,
    pub title: String,
    /// Full HTML body; may contain [`EXTENDED_ENTRY_BREAK`].
    pub contents: String,
    pub excerpt: String,
    pub permalink: String,
    pub slug: String,
    /// Comma-delimited keyword list, as entered.
    pub keywords: String,
    pub categories: Vec<BlogPostCategory>,
    /// Categories the user typed that do not exist on the service yet.
    pub new_categories: Vec<BlogPostCategory>,
    pub date_published: Option<DateTime<Utc>>,
    /// When set, the service is asked to publish with this date instead of
    /// "now".
    pub date_published_override: Option<DateTime<Utc>>,
    /// Entity tag observed on the last fetch; sent back as a precondition
    /// on edits where the protocol supports it.
    pub etag: String,
    pub is_page: bool,
    /// Parent page id; only meaningful when `is_page` is set.
    pub page_parent_id: String,
    pub author: Option<AuthorInfo>,
    /// The full remote entry captured on the last fetch, kept so edits can
    /// send the complete representation back instead of a reconstruction.
    pub remote_entry: Option<Element>,
}

impl BlogPost {
    pub fn is_new(&self) -> bool {
        self.id.is_empty()
    }

    /// The part of the body above the extended-entry break.
    pub fn main_contents(&self) -> &str {
        match self.contents.find(EXTENDED_ENTRY_BREAK) {
            Some(at) => &self.contents[..at],
            None => &self.contents,
        }
    }

    /// The part of the body below the extended-entry break, if any.
    pub fn extended_contents(&self) -> Option<&str> {
        self.contents
            .find(EXTENDED_ENTRY_BREAK)
            .map(|at| &self.contents[at + EXTENDED_ENTRY_BREAK.len()..])
    }

    /// Joins a main and an extended section back into a single body.
    pub fn set_split_contents(&mut self, main: &str, extended: &str) {
        if extended.is_empty() {
            self.contents = main.to_string();
        } else {
            self.contents = format!("{}{}{}", main, EXTENDED_ENTRY_BREAK, extended);
        }
    }
}

/// Outcome of publishing a new post.
#[derive(Clone, Debug, Default)]
pub struct PostResult {
    pub post_id: String,
    pub etag: String,
    pub date_published: Option<DateTime<Utc>>,
    pub remote_entry: Option<Element>,
}

/// Outcome of editing an existing post.
#[derive(Clone, Debug, Default)]
pub struct EditPostResult {
    pub etag: String,
    pub remote_entry: Option<Element>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_contents_round_trip() {
        let mut post = BlogPost::default();
        post.set_split_contents("<p>teaser</p>", "<p>rest</p>");
        assert_eq!(post.main_contents(), "<p>teaser</p>");
        assert_eq!(post.extended_contents(), Some("<p>rest</p>"));

        post.set_split_contents("<p>all</p>", "");
        assert_eq!(post.main_contents(), "<p>all</p>");
        assert_eq!(post.extended_contents(), None);
    }
}
