//! Mutable view over an Atom `<entry>` document. Fetched entries are kept
//! whole and edited in place, so a PUT sends back the full representation
//! with whatever foreign markup the service included.

use chrono::{DateTime, Utc};
use guid_create::GUID;
use quill_common::xmlutil;
use xmltree::{Element, XMLNode};

use crate::categories::BlogPostCategory;
use crate::Result;

use super::version::AtomProtocolVersion;

pub struct AtomEntry {
    version: AtomProtocolVersion,
    /// Category scheme the blog uses; `None` accepts any scheme.
    category_scheme: Option<String>,
    element: Element,
}

fn ensure_child<'a>(parent: &'a mut Element, ns: &str, name: &str) -> &'a mut Element {
    if xmlutil::child(parent, ns, name).is_none() {
        xmlutil::add_child(parent, ns, None, name);
    }
    xmlutil::child_mut(parent, ns, name).unwrap_or_else(|| unreachable!())
}

impl AtomEntry {
    /// A fresh entry with the namespaces declared for its dialect.
    pub fn new(version: AtomProtocolVersion, category_scheme: Option<String>) -> AtomEntry {
        let mut element = Element::new("entry");
        element.namespace = Some(version.atom_ns().to_string());
        xmlutil::declare_namespace(&mut element, "", version.atom_ns());
        xmlutil::declare_namespace(&mut element, "app", version.pub_ns());
        AtomEntry {
            version,
            category_scheme,
            element,
        }
    }

    /// Wraps an entry fetched from the service. The `app` prefix is
    /// declared in case draft markup has to be added later.
    pub fn from_element(
        version: AtomProtocolVersion,
        category_scheme: Option<String>,
        mut element: Element,
    ) -> AtomEntry {
        xmlutil::declare_namespace(&mut element, "app", version.pub_ns());
        AtomEntry {
            version,
            category_scheme,
            element,
        }
    }

    pub fn element(&self) -> &Element {
        &self.element
    }

    pub fn into_element(self) -> Element {
        self.element
    }

    fn atom_ns(&self) -> &'static str {
        self.version.atom_ns()
    }

    fn child_text(&self, name: &str) -> String {
        xmlutil::child(&self.element, self.atom_ns(), name)
            .map(xmlutil::text_content)
            .unwrap_or_default()
    }

    pub fn id(&self) -> String {
        self.child_text("id")
    }

    /// Assigns a fresh `urn:uuid` id, required before POSTing a new entry
    /// to endpoints that echo the client id back.
    pub fn generate_id(&mut self) {
        let ns = self.atom_ns();
        let id = ensure_child(&mut self.element, ns, "id");
        xmlutil::set_text(id, &format!("urn:uuid:{}", GUID::rand().to_string().to_lowercase()));
    }

    pub fn title(&self) -> String {
        self.child_text("title")
    }

    pub fn set_title(&mut self, title: &str) {
        let ns = self.atom_ns();
        let uses_mode = self.version.uses_content_mode();
        let element = ensure_child(&mut self.element, ns, "title");
        element.attributes.insert("type".to_string(), "text".to_string());
        if uses_mode {
            element.attributes.insert("mode".to_string(), "escaped".to_string());
        }
        xmlutil::set_text(element, title);
    }

    pub fn excerpt(&self) -> String {
        self.child_text("summary")
    }

    pub fn set_excerpt(&mut self, excerpt: &str) {
        let ns = self.atom_ns();
        let element = ensure_child(&mut self.element, ns, "summary");
        element.attributes.insert("type".to_string(), "text".to_string());
        xmlutil::set_text(element, excerpt);
    }

    /// The HTML body. `type="xhtml"` content keeps its markup; everything
    /// else is treated as escaped HTML text.
    pub fn content_html(&self) -> Result<String> {
        let content = match xmlutil::child(&self.element, self.atom_ns(), "content") {
            Some(content) => content,
            None => return Ok(String::new()),
        };
        if content.attributes.get("type").map(String::as_str) == Some("xhtml") {
            let root = xmlutil::any_child(content, "div").unwrap_or(content);
            return xmlutil::inner_xml(root);
        }
        Ok(xmlutil::text_content(content))
    }

    pub fn set_content_html(&mut self, html: &str) {
        let ns = self.atom_ns();
        let uses_mode = self.version.uses_content_mode();
        let element = ensure_child(&mut self.element, ns, "content");
        element.attributes.insert("type".to_string(), "html".to_string());
        if uses_mode {
            element.attributes.insert("mode".to_string(), "escaped".to_string());
        }
        element.children.clear();
        element.children.push(XMLNode::Text(html.to_string()));
    }

    pub fn publish_date(&self) -> Option<DateTime<Utc>> {
        let text = self.child_text(self.version.published_name());
        DateTime::parse_from_rfc3339(text.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn set_publish_date(&mut self, date: DateTime<Utc>) {
        let ns = self.atom_ns();
        let name = self.version.published_name();
        let element = ensure_child(&mut self.element, ns, name);
        xmlutil::set_text(element, &date.to_rfc3339_opts(chrono::SecondsFormat::Secs, true));
    }

    fn links(&self) -> Vec<&Element> {
        xmlutil::children(&self.element, self.atom_ns(), "link")
    }

    pub fn link_href(&self, rel: &str) -> Option<String> {
        self.links()
            .into_iter()
            .find(|link| link.attributes.get("rel").map(String::as_str) == Some(rel))
            .and_then(|link| link.attributes.get("href").cloned())
    }

    pub fn edit_uri(&self) -> Option<String> {
        self.link_href("edit")
    }

    /// The human-readable permalink: an alternate link of an HTML type, or
    /// with no type at all.
    pub fn permalink(&self) -> Option<String> {
        self.links()
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

    fn category_in_scheme(&self, category: &Element) -> bool {
        match self.category_scheme.as_deref() {
            None => true,
            Some(scheme) => match category.attributes.get("scheme") {
                Some(actual) => actual == scheme,
                None => scheme.is_empty(),
            },
        }
    }

    pub fn categories(&self) -> Vec<BlogPostCategory> {
        xmlutil::children(&self.element, self.atom_ns(), "category")
            .into_iter()
            .filter(|c| self.category_in_scheme(c))
            .filter_map(|c| {
                let term = c.attributes.get("term")?.clone();
                let label = c.attributes.get("label").cloned().unwrap_or_default();
                Some(BlogPostCategory::new(term, label))
            })
            .collect()
    }

    /// Removes the categories in this blog's scheme, leaving foreign ones
    /// (service-internal markers) untouched.
    pub fn clear_categories(&mut self) {
        let scheme = self.category_scheme.clone();
        let ns = self.atom_ns().to_string();
        self.element.children.retain(|node| match node {
            XMLNode::Element(e) if e.name == "category" => {
                let same_ns = e.namespace.as_deref() == Some(ns.as_str());
                let in_scheme = match scheme.as_deref() {
                    None => true,
                    Some(s) => match e.attributes.get("scheme") {
                        Some(actual) => actual == s,
                        None => s.is_empty(),
                    },
                };
                !(same_ns && in_scheme)
            }
            _ => true,
        });
    }

    pub fn add_category(&mut self, category: &BlogPostCategory) {
        let ns = self.atom_ns();
        let scheme = self.category_scheme.clone();
        let element = xmlutil::add_child(&mut self.element, ns, None, "category");
        element
            .attributes
            .insert("term".to_string(), category.name.clone());
        if !category.label.is_empty() && category.label != category.name {
            element
                .attributes
                .insert("label".to_string(), category.label.clone());
        }
        if let Some(scheme) = scheme.filter(|s| !s.is_empty()) {
            element.attributes.insert("scheme".to_string(), scheme);
        }
    }

    pub fn is_draft(&self) -> bool {
        let pub_ns = self.version.pub_ns();
        xmlutil::child(&self.element, pub_ns, "control")
            .and_then(|control| xmlutil::child(control, pub_ns, "draft"))
            .map(|draft| xmlutil::text_content(draft).trim().eq_ignore_ascii_case("yes"))
            .unwrap_or(false)
    }

    /// Toggles `app:control/app:draft`. Any existing draft markup is
    /// removed first so repeated edits cannot accumulate conflicting
    /// flags.
    pub fn set_draft(&mut self, draft: bool) {
        let pub_ns = self.version.pub_ns().to_string();
        if let Some(control) = xmlutil::child_mut(&mut self.element, &pub_ns, "control") {
            xmlutil::remove_children(control, &pub_ns, "draft");
        }
        if draft {
            let control = ensure_child(&mut self.element, &pub_ns, "control");
            control.prefix = Some("app".to_string());
            let draft_element = xmlutil::add_child(control, &pub_ns, Some("app"), "draft");
            xmlutil::set_text(draft_element, "yes");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(xml: &str) -> AtomEntry {
        AtomEntry::from_element(
            AtomProtocolVersion::V10,
            None,
            Element::parse(xml.as_bytes()).unwrap(),
        )
    }

    const SAMPLE: &str = r#"<entry xmlns="http://www.w3.org/2005/Atom">
        <id>tag:example.com,2008:post-1</id>
        <title type="text">Hello</title>
        <published>2008-04-01T12:00:00Z</published>
        <link rel="edit" href="http://example.com/edit/1"/>
        <link rel="alternate" type="text/html" href="http://example.com/1"/>
        <link rel="alternate" type="application/atom+xml" href="http://example.com/1.atom"/>
        <category term="rust" label="Rust"/>
        <content type="html">&lt;p&gt;hi&lt;/p&gt;</content>
    </entry>"#;

    #[test]
    fn reads_the_common_fields() {
        let entry = parsed(SAMPLE);
        assert_eq!(entry.title(), "Hello");
        assert_eq!(entry.edit_uri().as_deref(), Some("http://example.com/edit/1"));
        assert_eq!(entry.permalink().as_deref(), Some("http://example.com/1"));
        assert_eq!(entry.content_html().unwrap(), "<p>hi</p>");
        assert_eq!(entry.categories(), vec![BlogPostCategory::new("rust", "Rust")]);
        assert!(entry.publish_date().is_some());
    }

    #[test]
    fn xhtml_content_keeps_markup() {
        let entry = parsed(
            r#"<entry xmlns="http://www.w3.org/2005/Atom">
                <content type="xhtml"><div xmlns="http://www.w3.org/1999/xhtml"><p>hi</p></div></content>
            </entry>"#,
        );
        assert!(entry.content_html().unwrap().contains("<p"));
    }

    #[test]
    fn draft_flag_round_trips() {
        let mut entry = AtomEntry::new(AtomProtocolVersion::V10, None);
        assert!(!entry.is_draft());
        entry.set_draft(true);
        assert!(entry.is_draft());
        entry.set_draft(false);
        assert!(!entry.is_draft());
    }

    #[test]
    fn scheme_filter_hides_foreign_categories() {
        let entry = AtomEntry::from_element(
            AtomProtocolVersion::V10,
            Some("http://example.com/cats".to_string()),
            Element::parse(
                r#"<entry xmlns="http://www.w3.org/2005/Atom">
                    <category scheme="http://example.com/cats" term="rust"/>
                    <category scheme="http://schemas.google.com/g/2005#kind" term="post"/>
                </entry>"#
                .as_bytes(),
            )
            .unwrap(),
        );
        assert_eq!(entry.categories(), vec![BlogPostCategory::new("rust", "")]);
    }

    #[test]
    fn clear_categories_only_touches_the_scheme() {
        let mut entry = AtomEntry::from_element(
            AtomProtocolVersion::V10,
            Some("http://example.com/cats".to_string()),
            Element::parse(
                r#"<entry xmlns="http://www.w3.org/2005/Atom">
                    <category scheme="http://example.com/cats" term="rust"/>
                    <category scheme="http://schemas.google.com/g/2005#kind" term="post"/>
                </entry>"#
                .as_bytes(),
            )
            .unwrap(),
        );
        entry.clear_categories();
        assert!(entry.categories().is_empty());
        assert_eq!(
            quill_common::xmlutil::children(
                entry.element(),
                AtomProtocolVersion::V10.atom_ns(),
                "category"
            )
            .len(),
            1
        );
    }

    #[test]
    fn generated_ids_are_urn_uuids() {
        let mut entry = AtomEntry::new(AtomProtocolVersion::V10, None);
        entry.generate_id();
        assert!(entry.id().starts_with("urn:uuid:"));
    }
}
