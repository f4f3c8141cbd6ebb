//! Static knowledge about known blog services, used by detection to map a
//! homepage or an RSD document to a client type and endpoint. The catalog
//! is injected wherever it is consumed, so embedders can extend or replace
//! the built-in set.

use regex::Regex;

use crate::clients::ClientType;

/// Placeholder in provider post API URLs substituted with the account name.
pub const USERNAME_MACRO: &str = "<username>";

#[derive(Clone, Debug)]
pub struct ProviderDescriptor {
    pub id: String,
    pub name: String,
    pub client_type: ClientType,
    /// Endpoint template; may contain [`USERNAME_MACRO`].
    pub post_api_url: String,
    pub homepage_url_pattern: Option<Regex>,
    pub homepage_content_pattern: Option<Regex>,
    pub rsd_engine_name: Option<String>,
    pub rsd_engine_link: Option<String>,
}

impl ProviderDescriptor {
    /// Substitutes account macros into the endpoint template.
    pub fn resolve_post_api_url(&self, username: &str) -> String {
        self.post_api_url.replace(USERNAME_MACRO, username)
    }

    /// Whether an endpoint URL still carries unsubstituted placeholders.
    pub fn url_is_resolved(url: &str) -> bool {
        !url.contains('<') && !url.contains('{')
    }
}

#[derive(Clone, Debug, Default)]
pub struct ProviderCatalog {
    providers: Vec<ProviderDescriptor>,
}

impl ProviderCatalog {
    pub fn new(providers: Vec<ProviderDescriptor>) -> ProviderCatalog {
        ProviderCatalog { providers }
    }

    /// The services this crate knows out of the box.
    pub fn builtin() -> ProviderCatalog {
        let pattern = |p: &str| Regex::new(p).ok();
        ProviderCatalog::new(vec![
            ProviderDescriptor {
                id: "google-blogger".to_string(),
                name: "Blogger".to_string(),
                client_type: ClientType::GoogleBloggerV3,
                post_api_url: "https://www.googleapis.com/blogger/v3".to_string(),
                homepage_url_pattern: pattern(r"(?i)\.blogspot\.com"),
                homepage_content_pattern: None,
                rsd_engine_name: Some("Blogger".to_string()),
                rsd_engine_link: None,
            },
            ProviderDescriptor {
                id: "wordpress-com".to_string(),
                name: "WordPress.com".to_string(),
                client_type: ClientType::Blogger,
                post_api_url: "https://wordpress.com/xmlrpc.php".to_string(),
                homepage_url_pattern: pattern(r"(?i)\.wordpress\.com"),
                homepage_content_pattern: pattern(r"(?i)wp-content|wordpress\.com"),
                rsd_engine_name: Some("WordPress".to_string()),
                rsd_engine_link: Some("http://wordpress.org/".to_string()),
            },
            ProviderDescriptor {
                id: "livejournal".to_string(),
                name: "LiveJournal".to_string(),
                client_type: ClientType::LiveJournal,
                post_api_url: "http://www.livejournal.com/interface/blogger".to_string(),
                homepage_url_pattern: pattern(r"(?i)\.livejournal\.com"),
                homepage_content_pattern: None,
                rsd_engine_name: Some("LiveJournal".to_string()),
                rsd_engine_link: Some("http://www.livejournal.com/".to_string()),
            },
            ProviderDescriptor {
                id: "typepad".to_string(),
                name: "TypePad".to_string(),
                client_type: ClientType::Atom,
                post_api_url: "http://www.typepad.com/t/atom/weblog".to_string(),
                homepage_url_pattern: pattern(r"(?i)\.typepad\.com"),
                homepage_content_pattern: None,
                rsd_engine_name: Some("Movable Type".to_string()),
                rsd_engine_link: Some("http://www.sixapart.com/movabletype/".to_string()),
            },
        ])
    }

    pub fn providers(&self) -> &[ProviderDescriptor] {
        &self.providers
    }

    pub fn find_by_id(&self, id: &str) -> Option<&ProviderDescriptor> {
        self.providers.iter().find(|p| p.id == id)
    }

    pub fn find_by_rsd_engine_link(&self, link: &str) -> Option<&ProviderDescriptor> {
        if link.is_empty() {
            return None;
        }
        self.providers.iter().find(|p| {
            p.rsd_engine_link
                .as_deref()
                .map(|l| l.eq_ignore_ascii_case(link))
                .unwrap_or(false)
        })
    }

    pub fn find_by_rsd_engine_name(&self, name: &str) -> Option<&ProviderDescriptor> {
        if name.is_empty() {
            return None;
        }
        self.providers.iter().find(|p| {
            p.rsd_engine_name
                .as_deref()
                .map(|n| n.eq_ignore_ascii_case(name))
                .unwrap_or(false)
        })
    }

    pub fn find_by_homepage_url(&self, url: &str) -> Option<&ProviderDescriptor> {
        self.providers.iter().find(|p| {
            p.homepage_url_pattern
                .as_ref()
                .map(|pattern| pattern.is_match(url))
                .unwrap_or(false)
        })
    }

    pub fn find_by_homepage_content(&self, html: &str) -> Option<&ProviderDescriptor> {
        self.providers.iter().find(|p| {
            p.homepage_content_pattern
                .as_ref()
                .map(|pattern| pattern.is_match(html))
                .unwrap_or(false)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_macro_is_substituted() {
        let provider = ProviderDescriptor {
            id: "x".to_string(),
            name: "X".to_string(),
            client_type: ClientType::Blogger,
            post_api_url: format!("http://example.com/{}/xmlrpc", USERNAME_MACRO),
            homepage_url_pattern: None,
            homepage_content_pattern: None,
            rsd_engine_name: None,
            rsd_engine_link: None,
        };
        assert_eq!(
            provider.resolve_post_api_url("ann"),
            "http://example.com/ann/xmlrpc"
        );
        assert!(!ProviderDescriptor::url_is_resolved(&provider.post_api_url));
        assert!(ProviderDescriptor::url_is_resolved(
            "http://example.com/ann/xmlrpc"
        ));
    }

    #[test]
    fn url_patterns_pick_known_hosts() {
        let catalog = ProviderCatalog::builtin();
        assert_eq!(
            catalog
                .find_by_homepage_url("http://ann.livejournal.com/")
                .map(|p| p.id.as_str()),
            Some("livejournal")
        );
        assert!(catalog.find_by_homepage_url("http://example.com/").is_none());
    }

    #[test]
    fn rsd_engine_link_match_is_case_insensitive() {
        let catalog = ProviderCatalog::builtin();
        assert_eq!(
            catalog
                .find_by_rsd_engine_link("HTTP://WORDPRESS.ORG/")
                .map(|p| p.id.as_str()),
            Some("wordpress-com")
        );
        assert!(catalog.find_by_rsd_engine_link("").is_none());
    }
}
