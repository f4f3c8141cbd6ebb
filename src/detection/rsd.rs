//! Really Simple Discovery documents. Servers emit RSD with stray bytes
//! after the closing tag often enough that the parser cuts the document
//! off at `</rsd>` before handing it to the XML parser.

use std::collections::HashMap;

use quill_common::xmlutil;
use url::Url;
use xmltree::Element;

use crate::{Error, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RsdApi {
    pub name: String,
    pub preferred: bool,
    pub api_link: String,
    pub blog_id: String,
    /// The `<setting name=…>` children of the api element, verbatim.
    pub settings: HashMap<String, String>,
}

#[derive(Clone, Debug, Default)]
pub struct RsdServiceDescription {
    pub source_url: String,
    pub engine_name: String,
    pub engine_link: String,
    pub homepage_link: String,
    pub apis: Vec<RsdApi>,
}

impl RsdServiceDescription {
    pub fn api(&self, name: &str) -> Option<&RsdApi> {
        self.apis
            .iter()
            .find(|api| api.name.eq_ignore_ascii_case(name))
    }

    /// The API to use when no provider matched: the best-known protocol
    /// family the document advertises, in descending order of capability.
    pub fn adhoc_api(&self) -> Option<&RsdApi> {
        ["WordPress", "MovableType", "MetaWeblog"]
            .iter()
            .find_map(|name| self.api(name))
    }
}

fn truncate_at_close_tag(body: &str) -> &str {
    let lower = body.to_ascii_lowercase();
    if let Some(at) = lower.find("</rsd") {
        if let Some(end) = body[at..].find('>') {
            return &body[..at + end + 1];
        }
    }
    body
}

fn child_text(parent: &Element, name: &str) -> String {
    xmlutil::any_child(parent, name)
        .map(|e| xmlutil::text_content(e).trim().to_string())
        .unwrap_or_default()
}

/// API links are often emitted relative to the RSD document's own URL.
fn absolutize(source_url: &str, link: &str) -> String {
    if link.is_empty() {
        return String::new();
    }
    Url::parse(source_url)
        .and_then(|base| base.join(link))
        .map(|url| url.to_string())
        .unwrap_or_else(|_| link.to_string())
}

fn api_settings(api: &Element) -> HashMap<String, String> {
    let container = xmlutil::any_child(api, "settings").unwrap_or(api);
    xmlutil::element_children(container)
        .into_iter()
        .filter(|e| e.name.eq_ignore_ascii_case("setting"))
        .filter_map(|setting| {
            let name = setting
                .attributes
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case("name"))
                .map(|(_, v)| v.clone())?;
            Some((name, xmlutil::text_content(setting).trim().to_string()))
        })
        .collect()
}

pub fn parse(source_url: &str, body: &str) -> Result<RsdServiceDescription> {
    let trimmed = truncate_at_close_tag(body.trim_start());
    let document = Element::parse(trimmed.as_bytes()).map_err(|e| {
        Error::invalid_response(source_url, format!("malformed RSD document: {}", e), body)
    })?;
    if !document.name.eq_ignore_ascii_case("rsd") {
        return Err(Error::invalid_response(
            source_url,
            format!("expected an <rsd> document, got <{}>", document.name),
            body,
        ));
    }
    let service = xmlutil::any_child(&document, "service").ok_or_else(|| {
        Error::invalid_response(source_url, "RSD document has no <service> element", body)
    })?;
    let apis = xmlutil::any_child(service, "apis")
        .map(|apis| {
            xmlutil::element_children(apis)
                .into_iter()
                .filter(|e| e.name.eq_ignore_ascii_case("api"))
                .map(|api| {
                    let attr = |name: &str| {
                        api.attributes
                            .iter()
                            .find(|(k, _)| k.eq_ignore_ascii_case(name))
                            .map(|(_, v)| v.clone())
                            .unwrap_or_default()
                    };
                    // rpcLink is the pre-1.0 spelling of apiLink
                    let mut api_link = attr("apiLink");
                    if api_link.is_empty() {
                        api_link = attr("rpcLink");
                    }
                    RsdApi {
                        name: attr("name"),
                        preferred: matches!(
                            attr("preferred").to_ascii_lowercase().as_str(),
                            "true" | "1" | "yes"
                        ),
                        api_link: absolutize(source_url, &api_link),
                        blog_id: attr("blogID"),
                        settings: api_settings(api),
                    }
                })
                .collect()
        })
        .unwrap_or_default();
    Ok(RsdServiceDescription {
        source_url: source_url.to_string(),
        engine_name: child_text(service, "engineName"),
        engine_link: child_text(service, "engineLink"),
        homepage_link: child_text(service, "homePageLink"),
        apis,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0"?>
<rsd version="1.0" xmlns="http://archipelago.phrasewise.com/rsd">
  <service>
    <engineName>WordPress</engineName>
    <engineLink>http://wordpress.org/</engineLink>
    <homePageLink>http://example.com/</homePageLink>
    <apis>
      <api name="WordPress" blogID="1" preferred="true" apiLink="http://example.com/xmlrpc.php"/>
      <api name="MetaWeblog" blogID="1" preferred="false" apiLink="http://example.com/xmlrpc.php"/>
    </apis>
  </service>
</rsd>"#;

    #[test]
    fn rsd_documents_parse() {
        let rsd = parse("http://example.com/rsd", SAMPLE).unwrap();
        assert_eq!(rsd.engine_name, "WordPress");
        assert_eq!(rsd.engine_link, "http://wordpress.org/");
        assert_eq!(rsd.apis.len(), 2);
        assert!(rsd.api("wordpress").unwrap().preferred);
    }

    #[test]
    fn trailing_garbage_is_tolerated() {
        let noisy = format!("{}\n<!-- PHP warning: things broke -->", SAMPLE);
        assert!(parse("http://example.com/rsd", &noisy).is_ok());
    }

    #[test]
    fn adhoc_choice_prefers_wordpress_over_metaweblog() {
        let rsd = parse("http://example.com/rsd", SAMPLE).unwrap();
        assert_eq!(rsd.adhoc_api().unwrap().name, "WordPress");

        let without: RsdServiceDescription = RsdServiceDescription {
            apis: vec![
                RsdApi {
                    name: "MetaWeblog".to_string(),
                    preferred: false,
                    api_link: "http://x/xmlrpc".to_string(),
                    blog_id: "1".to_string(),
                    settings: HashMap::new(),
                },
                RsdApi {
                    name: "MovableType".to_string(),
                    preferred: false,
                    api_link: "http://x/xmlrpc".to_string(),
                    blog_id: "1".to_string(),
                    settings: HashMap::new(),
                },
            ],
            ..RsdServiceDescription::default()
        };
        assert_eq!(without.adhoc_api().unwrap().name, "MovableType");
    }

    #[test]
    fn non_rsd_documents_are_rejected() {
        assert!(parse("http://example.com/rsd", "<html></html>").is_err());
    }

    #[test]
    fn api_settings_are_captured() {
        let body = r#"<rsd version="1.0">
  <service>
    <engineName>Custom</engineName>
    <apis>
      <api name="MetaWeblog" blogID="1" preferred="true" apiLink="http://example.com/xmlrpc">
        <settings>
          <setting name="docs">http://example.com/docs</setting>
          <setting name="notes"> trailing space </setting>
        </settings>
      </api>
    </apis>
  </service>
</rsd>"#;
        let rsd = parse("http://example.com/rsd", body).unwrap();
        let api = rsd.api("MetaWeblog").unwrap();
        assert_eq!(
            api.settings.get("docs").map(String::as_str),
            Some("http://example.com/docs")
        );
        assert_eq!(
            api.settings.get("notes").map(String::as_str),
            Some("trailing space")
        );
    }

    #[test]
    fn relative_and_rpc_links_normalize() {
        let body = r#"<rsd version="1.0">
  <service>
    <engineName>Custom</engineName>
    <apis>
      <api name="MetaWeblog" blogID="1" preferred="true" apiLink="xmlrpc.php"/>
      <api name="Blogger" blogID="1" preferred="false" rpcLink="http://example.com/rpc"/>
    </apis>
  </service>
</rsd>"#;
        let rsd = parse("http://example.com/blog/rsd.xml", body).unwrap();
        assert_eq!(
            rsd.api("MetaWeblog").unwrap().api_link,
            "http://example.com/blog/xmlrpc.php"
        );
        assert_eq!(rsd.api("Blogger").unwrap().api_link, "http://example.com/rpc");
    }
}
