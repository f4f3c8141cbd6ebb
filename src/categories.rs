/// Marker id for the "no category" choice offered by pickers. It must never
/// be transmitted to a service.
const NONE_CATEGORY: &str = "-none-";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogPostCategory {
    /// The wire identifier (Atom `term`, XML-RPC category id).
    pub name: String,
    /// Human-readable label; falls back to the name when the service does
    /// not distinguish the two.
    pub label: String,
}

impl BlogPostCategory {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> BlogPostCategory {
        let name = name.into();
        let label = label.into();
        let label = if label.is_empty() { name.clone() } else { label };
        BlogPostCategory { name, label }
    }

    pub fn none() -> BlogPostCategory {
        BlogPostCategory {
            name: NONE_CATEGORY.to_string(),
            label: String::new(),
        }
    }

    pub fn is_none_category(&self) -> bool {
        self.name == NONE_CATEGORY
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogPostKeyword {
    pub name: String,
}

impl BlogPostKeyword {
    pub fn new(name: impl Into<String>) -> BlogPostKeyword {
        BlogPostKeyword { name: name.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_none_sentinel_is_recognized() {
        assert!(BlogPostCategory::none().is_none_category());
        assert!(!BlogPostCategory::new("rust", "Rust").is_none_category());
    }

    #[test]
    fn labels_fall_back_to_the_name() {
        assert_eq!(BlogPostCategory::new("rust", "").label, "rust");
    }
}
