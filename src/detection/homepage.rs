//! Homepage HTML scanning. Detection only needs the `<link>` and `<meta>`
//! tags, but real homepages are rarely well-formed, so the scan runs over
//! a full browser-grade parse.

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};

#[derive(Clone, Debug, Default)]
pub struct LinkTag {
    pub rel: String,
    pub link_type: String,
    pub href: String,
    pub title: String,
}

impl LinkTag {
    /// Whether the space-delimited rel attribute contains the given token.
    pub fn rel_contains(&self, token: &str) -> bool {
        self.rel
            .split_whitespace()
            .any(|t| t.eq_ignore_ascii_case(token))
    }
}

#[derive(Clone, Debug, Default)]
pub struct MetaTag {
    pub name: String,
    pub content: String,
}

#[derive(Clone, Debug, Default)]
pub struct HeadInfo {
    pub links: Vec<LinkTag>,
    pub metas: Vec<MetaTag>,
}

impl HeadInfo {
    pub fn generator(&self) -> Option<&str> {
        self.metas
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case("generator"))
            .map(|m| m.content.as_str())
    }

    /// The RSD discovery link.
    pub fn edit_uri(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|l| l.rel_contains("EDITURI"))
            .map(|l| l.href.as_str())
            .filter(|href| !href.is_empty())
    }

    /// AtomPub service-document links, optionally restricted to ones that
    /// advertise themselves with `rel="service"`.
    pub fn atom_service_links(&self, require_service_rel: bool) -> Vec<&LinkTag> {
        self.links
            .iter()
            .filter(|l| {
                l.link_type
                    .eq_ignore_ascii_case("application/atomsvc+xml")
                    && !l.href.is_empty()
            })
            .filter(|l| !require_service_rel || l.rel_contains("service"))
            .collect()
    }
}

fn attribute(attrs: &[html5ever::Attribute], name: &str) -> String {
    attrs
        .iter()
        .find(|a| a.name.local.as_ref().eq_ignore_ascii_case(name))
        .map(|a| a.value.to_string())
        .unwrap_or_default()
}

fn walk(handle: &Handle, info: &mut HeadInfo) {
    if let NodeData::Element { name, attrs, .. } = &handle.data {
        let attrs = attrs.borrow();
        match name.local.as_ref() {
            "link" => info.links.push(LinkTag {
                rel: attribute(&attrs, "rel"),
                link_type: attribute(&attrs, "type"),
                href: attribute(&attrs, "href"),
                title: attribute(&attrs, "title"),
            }),
            "meta" => info.metas.push(MetaTag {
                name: attribute(&attrs, "name"),
                content: attribute(&attrs, "content"),
            }),
            _ => {}
        }
    }
    for child in handle.children.borrow().iter() {
        walk(child, info);
    }
}

/// Collects link and meta tags from an HTML document.
pub fn scan_head(html: &str) -> HeadInfo {
    let mut info = HeadInfo::default();
    let dom = match parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut html.as_bytes())
    {
        Ok(dom) => dom,
        Err(_) => return info,
    };
    walk(&dom.document, &mut info);
    info
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOMEPAGE: &str = r#"<!DOCTYPE html>
<html><head>
<meta name="generator" content="WordPress 6.2">
<link rel="EditURI" type="application/rsd+xml" href="http://example.com/xmlrpc.php?rsd">
<link rel="service" type="application/atomsvc+xml" href="http://example.com/atomsvc">
<link rel="stylesheet" type="text/css" href="/style.css">
</head><body><p>hi</p></body></html>"#;

    #[test]
    fn link_and_meta_tags_are_collected() {
        let head = scan_head(HOMEPAGE);
        assert_eq!(head.generator(), Some("WordPress 6.2"));
        assert_eq!(
            head.edit_uri(),
            Some("http://example.com/xmlrpc.php?rsd")
        );
        let atom = head.atom_service_links(true);
        assert_eq!(atom.len(), 1);
        assert_eq!(atom[0].href, "http://example.com/atomsvc");
    }

    #[test]
    fn rel_filter_can_be_dropped() {
        let head = scan_head(
            r#"<html><head>
            <link rel="alternate" type="application/atomsvc+xml" href="http://example.com/svc">
            </head></html>"#,
        );
        assert!(head.atom_service_links(true).is_empty());
        assert_eq!(head.atom_service_links(false).len(), 1);
    }

    #[test]
    fn broken_markup_still_scans() {
        let head = scan_head("<head><link rel=EditURI href=http://x/rsd><p>unclosed");
        assert_eq!(head.edit_uri(), Some("http://x/rsd"));
    }
}
