//! Small helpers over `xmltree` documents, shared by the XML-RPC codec,
//! the REST helper and the protocol clients.

use xmltree::{Element, EmitterConfig, Namespace, XMLNode};

use crate::error::Result;

fn ns_matches(element: &Element, ns: &str) -> bool {
    match (&element.namespace, ns) {
        (None, "") => true,
        (Some(actual), wanted) => actual == wanted,
        (None, _) => false,
    }
}

pub fn child<'a>(parent: &'a Element, ns: &str, name: &str) -> Option<&'a Element> {
    children(parent, ns, name).into_iter().next()
}

pub fn child_mut<'a>(parent: &'a mut Element, ns: &str, name: &str) -> Option<&'a mut Element> {
    parent
        .children
        .iter_mut()
        .filter_map(XMLNode::as_mut_element)
        .find(|e| e.name == name && ns_matches(e, ns))
}

pub fn children<'a>(parent: &'a Element, ns: &str, name: &str) -> Vec<&'a Element> {
    parent
        .children
        .iter()
        .filter_map(XMLNode::as_element)
        .filter(|e| e.name == name && ns_matches(e, ns))
        .collect()
}

/// First child with the given local name, in any namespace.
pub fn any_child<'a>(parent: &'a Element, name: &str) -> Option<&'a Element> {
    parent
        .children
        .iter()
        .filter_map(XMLNode::as_element)
        .find(|e| e.name == name)
}

pub fn element_children(parent: &Element) -> Vec<&Element> {
    parent
        .children
        .iter()
        .filter_map(XMLNode::as_element)
        .collect()
}

/// Depth-first search for the first descendant with the given name and
/// namespace.
pub fn descendant<'a>(root: &'a Element, ns: &str, name: &str) -> Option<&'a Element> {
    for node in root.children.iter().filter_map(XMLNode::as_element) {
        if node.name == name && ns_matches(node, ns) {
            return Some(node);
        }
        if let Some(found) = descendant(node, ns, name) {
            return Some(found);
        }
    }
    None
}

pub fn text_content(element: &Element) -> String {
    let mut out = String::new();
    collect_text(element, &mut out);
    out
}

fn collect_text(element: &Element, out: &mut String) {
    for node in &element.children {
        match node {
            XMLNode::Text(text) => out.push_str(text),
            XMLNode::CData(text) => out.push_str(text),
            XMLNode::Element(child) => collect_text(child, out),
            _ => {}
        }
    }
}

pub fn set_text(element: &mut Element, text: &str) {
    element
        .children
        .retain(|node| matches!(node, XMLNode::Element(_)));
    element.children.push(XMLNode::Text(text.to_string()));
}

pub fn remove_children(parent: &mut Element, ns: &str, name: &str) {
    parent.children.retain(|node| match node {
        XMLNode::Element(e) => !(e.name == name && ns_matches(e, ns)),
        _ => true,
    });
}

/// Creates a child element in the given namespace and appends it to
/// `parent`, returning a mutable reference to it.
pub fn add_child<'a>(
    parent: &'a mut Element,
    ns: &str,
    prefix: Option<&str>,
    name: &str,
) -> &'a mut Element {
    let mut element = Element::new(name);
    if !ns.is_empty() {
        element.namespace = Some(ns.to_string());
    }
    element.prefix = prefix.map(|p| p.to_string());
    parent.children.push(XMLNode::Element(element));
    parent
        .children
        .last_mut()
        .and_then(XMLNode::as_mut_element)
        .unwrap_or_else(|| unreachable!())
}

/// Declares a namespace prefix on the element, for prefixes introduced after
/// parsing.
pub fn declare_namespace(element: &mut Element, prefix: &str, uri: &str) {
    element
        .namespaces
        .get_or_insert_with(Namespace::empty)
        .put(prefix, uri);
}

/// Serializes the children of an element, markup included, without an XML
/// declaration. Used for `type="xhtml"` Atom content, whose markup is the
/// payload.
pub fn inner_xml(element: &Element) -> Result<String> {
    let mut out = String::new();
    for node in &element.children {
        match node {
            XMLNode::Text(text) => out.push_str(text),
            XMLNode::CData(text) => out.push_str(text),
            XMLNode::Element(child) => {
                let mut buffer = Vec::new();
                let config = EmitterConfig::new().write_document_declaration(false);
                child.write_with_config(&mut buffer, config)?;
                out.push_str(&String::from_utf8_lossy(&buffer));
            }
            _ => {}
        }
    }
    Ok(out)
}

/// Renders a document with an XML declaration and light indentation. Indented
/// output also works around servers that reject bodies whose first newline
/// comes very late.
pub fn to_xml_string(root: &Element) -> Result<String> {
    let mut buffer = Vec::new();
    let config = EmitterConfig::new()
        .perform_indent(true)
        .write_document_declaration(true);
    root.write_with_config(&mut buffer, config)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_namespaced_children() {
        let doc = Element::parse(
            r#"<root xmlns:a="urn:a"><a:item>one</a:item><item>two</item></root>"#.as_bytes(),
        )
        .unwrap();
        assert_eq!(text_content(child(&doc, "urn:a", "item").unwrap()), "one");
        assert_eq!(text_content(child(&doc, "", "item").unwrap()), "two");
        assert_eq!(children(&doc, "urn:a", "item").len(), 1);
    }

    #[test]
    fn descendant_is_depth_first() {
        let doc = Element::parse(
            r#"<root><a><hit>deep</hit></a><hit>shallow</hit></root>"#.as_bytes(),
        )
        .unwrap();
        assert_eq!(text_content(descendant(&doc, "", "hit").unwrap()), "deep");
    }

    #[test]
    fn set_text_replaces_existing_text() {
        let mut doc = Element::parse(r#"<root>old</root>"#.as_bytes()).unwrap();
        set_text(&mut doc, "new");
        assert_eq!(text_content(&doc), "new");
    }
}
